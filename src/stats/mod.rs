mod aggregate;
mod median;
mod observation;
mod ratio;
mod reaggregate;
mod sum;

pub use aggregate::{aggregate, Aggregation, MEDIAN_VARIABLE};
pub use median::{aggregate_median_data, approximate_median, Bin, BinSpec, BinnedDistribution, GroupMedian};
pub use observation::{Estimate, Observation};
pub use ratio::{approximate_proportion, approximate_ratio};
pub use reaggregate::{
    fine_to_coarse, observations_to_wide, sum_by, sum_over_variables,
    weighted_fine_to_coarse, weighted_mean_by, GroupBy,
};
pub use sum::approximate_sum;
