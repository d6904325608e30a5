use std::{collections::HashMap, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};

use crate::common;

/// Key/value storage for serialized crosswalk tables.
/// `get` returns `None` for missing (or unusable) entries; the builder then recomputes.
pub trait CrosswalkCache {
    fn get(&self, key: &str) -> Result<Option<Arc<[u8]>>>;
    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Return the cached bytes for `key`, or build, store and return them.
    /// `fresh` skips the lookup and overwrites whatever is stored.
    fn get_or_build(&mut self, key: &str, fresh: bool, build: &mut dyn FnMut() -> Result<Vec<u8>>) -> Result<Arc<[u8]>> {
        if !fresh {
            if let Some(bytes) = self.get(key)? {
                return Ok(bytes);
            }
        }
        let bytes = build()?;
        self.put(key, &bytes)?;
        Ok(Arc::from(bytes))
    }
}

/// Cache directory on disk. Each entry `key` is stored alongside a
/// `key.sha256` sidecar; an entry whose checksum does not match is stale.
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    fn full(&self, key: &str) -> PathBuf { self.root.join(key) }

    fn sidecar(&self, key: &str) -> PathBuf { self.root.join(format!("{key}.sha256")) }
}

impl CrosswalkCache for DiskCache {
    fn get(&self, key: &str) -> Result<Option<Arc<[u8]>>> {
        let path = self.full(key);
        if !path.exists() { return Ok(None) }

        let bytes = std::fs::read(&path)
            .with_context(|| format!("[DiskCache::get] Failed to read {}", path.display()))?;

        let expected = std::fs::read_to_string(self.sidecar(key)).ok();
        let actual = common::sha256_hex(&bytes);
        if expected.as_deref().map(str::trim) != Some(actual.as_str()) {
            log::warn!("[DiskCache::get] checksum mismatch for {}, treating as stale", path.display());
            return Ok(None);
        }

        Ok(Some(Arc::from(bytes)))
    }

    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        common::ensure_dir_exists(&self.root)?;
        let path = self.full(key);
        std::fs::write(&path, bytes)
            .with_context(|| format!("[DiskCache::put] Failed to write {}", path.display()))?;
        std::fs::write(self.sidecar(key), common::sha256_hex(bytes))
            .with_context(|| format!("[DiskCache::put] Failed to write checksum for {}", path.display()))?;
        Ok(())
    }
}

/// In-memory cache, mostly for tests.
#[derive(Debug, Default, Clone)]
pub struct MemCache {
    pub(crate) files: HashMap<String, Arc<[u8]>>,
}

impl MemCache {
    pub fn new() -> Self { Self::default() }
}

impl CrosswalkCache for MemCache {
    fn get(&self, key: &str) -> Result<Option<Arc<[u8]>>> {
        Ok(self.files.get(key).cloned())
    }

    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        self.files.insert(key.to_string(), Arc::from(bytes.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_build_only_builds_when_needed() {
        let mut cache = MemCache::new();
        let mut builds = 0;

        for fresh in [false, false, true] {
            let bytes = cache.get_or_build("k", fresh, &mut || { builds += 1; Ok(b"abc".to_vec()) }).unwrap();
            assert_eq!(&*bytes, b"abc");
        }
        assert_eq!(builds, 2);
    }

    #[test]
    fn disk_cache_detects_stale_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = DiskCache::new(dir.path().join("cache"));

        assert!(cache.get("k.geojson").unwrap().is_none());
        cache.put("k.geojson", b"{}").unwrap();
        assert_eq!(&*cache.get("k.geojson").unwrap().unwrap(), b"{}");

        std::fs::write(dir.path().join("cache/k.geojson"), b"{ }").unwrap();
        assert!(cache.get("k.geojson").unwrap().is_none());
    }
}
