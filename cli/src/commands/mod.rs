pub mod aggregate;
pub mod crosswalk;
pub mod median;
pub mod rank;
