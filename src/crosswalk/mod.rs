mod build;
mod cache;
mod kind;
mod table;

pub use build::{build_crosswalk, CrosswalkBuilder};
pub use cache::{CrosswalkCache, DiskCache, MemCache};
pub use kind::CrosswalkKind;
pub use table::{Crosswalk, CrosswalkEntry, LocalId};
