mod bbox;
mod dissolve;
mod geom;
mod overlay;

use bbox::BoundingBox;
pub(crate) use geom::Geometries;
pub use overlay::Overlap;
