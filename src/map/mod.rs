mod geo_level;
mod layer;
mod provider;
mod unit;

pub use geo_level::GeoLevel;
pub use layer::Layer;
pub use provider::{DissolvedProvider, GeometryProvider, LayerFiles, MemLayers, Membership};
pub use unit::GeoUnit;
