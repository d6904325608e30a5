mod config;
mod resolver;
mod source;

pub use config::{GeometrySource, RunConfig};
pub use resolver::{GeographyResolver, LevelPlan};
pub use source::{DataSource, TableSource};
