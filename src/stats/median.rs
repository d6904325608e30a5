use std::{collections::BTreeMap, path::Path};

use anyhow::{anyhow, bail, ensure, Context, Result};
use polars::{frame::DataFrame, prelude::DataType};

use crate::{common, stats::Estimate};

/// Z-score for a 90% confidence interval.
const Z_90: f64 = 1.645;

/// One contiguous range of a binned distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub min: f64,
    pub max: f64, // may be +infinity for the open-ended top bin
    pub count: f64,
}

impl Bin {
    pub fn new(min: f64, max: f64, count: f64) -> Self {
        Self { min, max, count }
    }

    /// Read bins from a CSV file with `min`, `max` and `count` columns.
    /// An empty `max` marks the open-ended top bin.
    pub fn read_csv(path: &Path) -> Result<Vec<Bin>> {
        let df = common::read_csv_file(path)?;
        let mins = common::float_column(&df, "min")?;
        let maxs = common::float_column(&df, "max")?;
        let counts = common::float_column(&df, "count")?;

        mins.into_iter().zip(maxs).zip(counts).enumerate()
            .map(|(row, ((min, max), count))| {
                let min = min.ok_or_else(|| anyhow!("[Bin::read_csv] row {row} has no minimum"))?;
                Ok(Bin::new(min, max.unwrap_or(f64::INFINITY), count.unwrap_or(0.0)))
            })
            .collect()
    }
}

/// Bin boundaries plus the name of the column (or variable) holding its counts.
#[derive(Debug, Clone, PartialEq)]
pub struct BinSpec {
    pub min: f64,
    pub max: f64,
    pub column: String,
}

impl BinSpec {
    pub fn new(min: f64, max: f64, column: &str) -> Self {
        Self { min, max, column: column.into() }
    }

    /// Parse boundaries from a label such as `"10000_to_14999"` or `"200000_or_more"`.
    pub fn from_label(label: &str) -> Result<Self> {
        let parse = |s: &str| s.parse::<f64>()
            .with_context(|| format!("[BinSpec::from_label] invalid bin boundary {s:?} in {label:?}"));

        if let Some(start) = label.strip_suffix("_or_more") {
            return Ok(Self::new(parse(start)?, f64::INFINITY, label));
        }
        let (start, end) = label.split_once("_to_")
            .ok_or_else(|| anyhow!("[BinSpec::from_label] expected `<min>_to_<max>` or `<min>_or_more`, got {label:?}"))?;
        Ok(Self::new(parse(start)?, parse(end)?, label))
    }
}

/// Bins sorted ascending by `min`, with cumulative counts along the universe's scale.
#[derive(Debug, Clone)]
pub struct BinnedDistribution {
    bins: Vec<Bin>,
    n_min: Vec<f64>,
    n_max: Vec<f64>,
    total: f64,
}

impl BinnedDistribution {
    /// Sort the bins by `min` and accumulate their counts.
    /// Counts must be finite and non-negative.
    pub fn new(mut bins: Vec<Bin>) -> Result<Self> {
        for bin in &bins {
            ensure!(bin.count.is_finite() && bin.count >= 0.0,
                "[BinnedDistribution::new] bin [{}, {}) has invalid count {}", bin.min, bin.max, bin.count);
            ensure!(bin.min.is_finite(), "[BinnedDistribution::new] bin minimum must be finite, got {}", bin.min);
        }
        bins.sort_by(|a, b| a.min.total_cmp(&b.min));

        let mut cumulative = 0.0;
        let (n_min, n_max) = bins.iter()
            .map(|bin| {
                let lo = cumulative;
                cumulative += bin.count;
                (lo, cumulative)
            })
            .unzip();

        Ok(Self { bins, n_min, n_max, total: cumulative })
    }

    #[inline] pub fn bins(&self) -> &[Bin] { &self.bins }

    /// Total count across all bins.
    #[inline] pub fn total(&self) -> f64 { self.total }

    /// Index of the first bin whose cumulative range contains `target`.
    fn locate(&self, target: f64) -> Option<usize> {
        (0..self.bins.len()).find(|&i| self.n_min[i] <= target && target <= self.n_max[i])
    }

    /// Interpolate the value at cumulative share `p`, for `p` inside bin `i`.
    /// The bin's upper edge is the next bin's minimum when there is one.
    fn interpolate(&self, i: usize, p: f64) -> f64 {
        let a1 = self.bins[i].min;
        let a2 = self.bins.get(i + 1).map_or(self.bins[i].max, |next| next.min);
        let c1 = self.n_min[i] / self.total;
        let c2 = self.n_min.get(i + 1).map_or(self.n_max[i], |&next| next) / self.total;
        (p - c1) / (c2 - c1) * (a2 - a1) + a1
    }

    /// Estimate the median by linear interpolation within the bin holding the midpoint.
    ///
    /// With a `sampling_percentage`, also approximate the 90% margin of error from the
    /// standard error `design_factor * sqrt((100 - s) / (n * s) * 50²) / 100`, locating
    /// the confidence bounds at `p = 0.5 ∓ SE` the same way.
    ///
    /// A midpoint landing in an open-ended top bin (`max = +inf`) yields a non-finite
    /// estimate rather than an error; aggregation drops such groups.
    pub fn median(&self, sampling_percentage: Option<f64>, design_factor: f64) -> Result<Estimate> {
        ensure!(self.total > 0.0, "[BinnedDistribution::median] cannot take the median of an empty distribution");
        let n = self.total;

        let midpoint = n / 2.0;
        let i = self.locate(midpoint)
            .ok_or_else(|| anyhow!("[BinnedDistribution::median] midpoint {midpoint} does not fall within a data range"))?;
        let bin = &self.bins[i];
        let gap_percent = (midpoint - self.n_min[i]) / bin.count;
        let estimate = bin.min + (bin.max - bin.min) * gap_percent;

        let Some(sampling_percentage) = sampling_percentage.filter(|&s| s != 0.0) else {
            log::debug!("[BinnedDistribution::median] no sampling percentage, skipping margin of error");
            return Ok(Estimate { estimate, margin_of_error: None });
        };

        let standard_error = design_factor
            * (((100.0 - sampling_percentage) / (n * sampling_percentage)) * 50.0_f64.powi(2)).sqrt()
            / 100.0;

        let p_lower = 0.5 - standard_error;
        let p_upper = 0.5 + standard_error;

        let Some(lower_i) = self.locate(n * p_lower) else {
            bail!("[BinnedDistribution::median] the lower p value {} does not fall within a data range", n * p_lower)
        };
        let Some(upper_i) = self.locate(n * p_upper) else {
            bail!("[BinnedDistribution::median] the upper p value {} does not fall within a data range", n * p_upper)
        };

        let lower_bound = self.interpolate(lower_i, p_lower);
        let upper_bound = self.interpolate(upper_i, p_upper);
        let standard_error_median = 0.5 * (upper_bound - lower_bound);

        Ok(Estimate { estimate, margin_of_error: Some(Z_90 * standard_error_median) })
    }
}

/// Estimate a median and its 90% margin of error from binned counts (design factor 1).
/// Bins may be given in any order. Without a sampling percentage no MOE is returned.
/// Use [`BinnedDistribution::median`] to pass another design factor.
pub fn approximate_median(bins: &[Bin], sampling_percentage: Option<f64>) -> Result<Estimate> {
    BinnedDistribution::new(bins.to_vec())?.median(sampling_percentage, 1.0)
}

/// Median of one aggregation group. A group with no counts has no estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMedian {
    pub group: String,
    pub estimate: Option<f64>,
    pub margin_of_error: Option<f64>,
}

/// Apply [`approximate_median`] once per `groupby` group of a wide table whose bin
/// columns hold counts. Each group's distribution sums every bin column within the
/// group (nulls count as zero). Groups come back sorted by key.
pub fn aggregate_median_data(
    df: &DataFrame,
    bins: &[BinSpec],
    groupby: &str,
    sampling_percentage: Option<f64>,
) -> Result<Vec<GroupMedian>> {
    let groups = df.column(groupby)
        .map_err(|_| anyhow!("[aggregate_median_data] the column to group by {groupby:?} is not in the input data"))?
        .cast(&DataType::String)?;
    let groups = groups.str()?;

    let counts = bins.iter()
        .map(|spec| {
            let col = df.column(&spec.column)
                .map_err(|_| anyhow!("[aggregate_median_data] bin column {:?} is not in the input data", spec.column))?
                .cast(&DataType::Float64)?;
            Ok(col.f64()?.into_iter().map(|v| v.unwrap_or(0.0)).collect::<Vec<_>>())
        })
        .collect::<Result<Vec<_>>>()?;

    let mut totals: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (row, group) in groups.into_iter().enumerate() {
        let sums = totals.entry(group.unwrap_or_default().to_string())
            .or_insert_with(|| vec![0.0; bins.len()]);
        for (sum, column) in sums.iter_mut().zip(&counts) {
            *sum += column[row];
        }
    }

    totals.into_iter()
        .map(|(group, sums)| {
            let distribution = BinnedDistribution::new(bins.iter().zip(sums)
                .map(|(spec, count)| Bin::new(spec.min, spec.max, count))
                .collect())?;

            if distribution.total() == 0.0 {
                return Ok(GroupMedian { group, estimate: None, margin_of_error: None });
            }

            let median = distribution.median(sampling_percentage, 1.0)
                .with_context(|| format!("[aggregate_median_data] median failed for group {group:?}"))?;
            Ok(GroupMedian { group, estimate: Some(median.estimate), margin_of_error: median.margin_of_error })
        })
        .collect()
}
