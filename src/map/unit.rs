use std::sync::Arc;

/// Identifier and display name of one polygon in a layer.
/// Keeps the original identifier text (with leading zeros) without repeated owned Strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeoUnit {
    pub id: Arc<str>,   // e.g. "42101000100" for a tract
    pub name: Arc<str>, // e.g. "Census Tract 1"
}

impl GeoUnit {
    pub fn new(id: &str, name: &str) -> Self {
        Self { id: Arc::from(id), name: Arc::from(name) }
    }
}
