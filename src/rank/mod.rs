mod label;
mod rank;

pub use label::{percentile, AverageLabel};
pub use rank::{rank_and_label, ranked_by_variable, RankedObservation};
