use std::collections::{BTreeMap, HashMap};

use anyhow::Result;

use crate::stats::{
    aggregate_median_data, approximate_proportion, approximate_ratio, observations_to_wide,
    sum_by, sum_over_variables, weighted_mean_by, BinSpec, GroupBy, Observation,
};

/// Output variable name of median aggregations.
pub const MEDIAN_VARIABLE: &str = "median";

/// The statistic computed per group by [`aggregate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Sum each variable, propagating MOEs.
    Sum,
    /// Weighted mean of each variable, weights keyed by input unit id. No MOE.
    WeightedMean { weights: HashMap<String, f64> },
    /// `numerator / denominator` on group sums, named `"<numerator>/<denominator>"`.
    Ratio { numerator: String, denominator: String },
    /// Like `Ratio`, for a numerator contained in the denominator.
    Proportion { numerator: String, denominator: String },
    /// Median of the distribution whose bin counts are the `bins` variables.
    Median { bins: Vec<BinSpec>, sampling_percentage: Option<f64> },
    /// Group sums, then every variable but `excluded` combined into `variable`.
    SumVariables { variable: String, excluded: Vec<String> },
}

impl Aggregation {
    /// Input variables this aggregation reads, when it reads a fixed set.
    pub fn inputs(&self) -> Option<Vec<String>> {
        match self {
            Aggregation::Ratio { numerator, denominator }
            | Aggregation::Proportion { numerator, denominator } => Some(vec![numerator.clone(), denominator.clone()]),
            Aggregation::Median { bins, .. } => Some(bins.iter().map(|bin| bin.column.clone()).collect()),
            Aggregation::Sum | Aggregation::WeightedMean { .. } | Aggregation::SumVariables { .. } => None,
        }
    }
}

/// Compute `aggregation` over `observations` grouped by `groupby`.
///
/// Groups whose statistic is undefined (zero denominators, empty distributions,
/// non-finite results) produce no row.
pub fn aggregate(observations: &[Observation], aggregation: &Aggregation, groupby: &GroupBy) -> Result<Vec<Observation>> {
    let rows = match aggregation {
        Aggregation::Sum => sum_by(observations, groupby),
        Aggregation::WeightedMean { weights } => weighted_mean_by(observations, groupby, weights),
        Aggregation::Ratio { numerator, denominator } => {
            let sums = sum_by(&select(observations, &[numerator, denominator]), groupby);
            approximate_ratio(&sums, numerator, denominator)
        }
        Aggregation::Proportion { numerator, denominator } => {
            let sums = sum_by(&select(observations, &[numerator, denominator]), groupby);
            approximate_proportion(&sums, numerator, denominator)
        }
        Aggregation::Median { bins, sampling_percentage } => median_by(observations, groupby, bins, *sampling_percentage)?,
        Aggregation::SumVariables { variable, excluded } => {
            sum_over_variables(&sum_by(observations, groupby), variable, excluded)
        }
    };

    log::debug!("[aggregate] {} input rows -> {} output rows", observations.len(), rows.len());
    Ok(rows)
}

fn select(observations: &[Observation], variables: &[&String]) -> Vec<Observation> {
    observations.iter()
        .filter(|row| variables.contains(&&row.variable))
        .cloned()
        .collect()
}

fn median_by(
    observations: &[Observation],
    groupby: &GroupBy,
    bins: &[BinSpec],
    sampling_percentage: Option<f64>,
) -> Result<Vec<Observation>> {
    let variables = bins.iter().map(|bin| bin.column.clone()).collect::<Vec<_>>();
    let wide = observations_to_wide(observations, &variables, groupby)?;

    let mut names = BTreeMap::new();
    for row in observations {
        if let Some((id, name)) = groupby.target(row) {
            names.entry(id).or_insert(name);
        }
    }

    let rows = aggregate_median_data(&wide, bins, "group_id", sampling_percentage)?
        .into_iter()
        .filter_map(|group| {
            let estimate = group.estimate.filter(|e| e.is_finite())?;
            let name = names.get(group.group.as_str()).copied().unwrap_or_default();
            let margin_of_error = group.margin_of_error.filter(|moe| moe.is_finite());
            Some(Observation::new(&group.group, name, MEDIAN_VARIABLE, estimate, margin_of_error))
        })
        .collect();

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn rows() -> Vec<Observation> {
        vec![
            Observation::new("1", "One", "poor", 20.0, Some(6.0)),
            Observation::new("1", "One", "universe", 100.0, Some(10.0)),
            Observation::new("2", "Two", "poor", 0.0, Some(3.0)),
            Observation::new("2", "Two", "universe", 0.0, Some(8.0)),
        ]
    }

    #[test]
    fn ratio_per_unit_drops_zero_denominators() {
        let aggregation = Aggregation::Ratio { numerator: "poor".into(), denominator: "universe".into() };
        let out = aggregate(&rows(), &aggregation, &GroupBy::Unit).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].variable, "poor/universe");
        assert_relative_eq!(out[0].estimate, 0.2);
    }

    #[test]
    fn median_per_unit() {
        let bins = vec![BinSpec::new(0.0, 10.0, "low"), BinSpec::new(10.0, 20.0, "high")];
        let data = vec![
            Observation::new("1", "One", "low", 5.0, Some(1.0)),
            Observation::new("1", "One", "high", 5.0, Some(1.0)),
            Observation::new("2", "Two", "low", 0.0, None),
            Observation::new("2", "Two", "high", 0.0, None),
        ];
        let aggregation = Aggregation::Median { bins, sampling_percentage: None };
        let out = aggregate(&data, &aggregation, &GroupBy::Unit).unwrap();

        // Unit 2 has no counts at all.
        assert_eq!(out, vec![Observation::new("1", "One", MEDIAN_VARIABLE, 10.0, None)]);
    }

    #[test]
    fn median_in_open_ended_bin_is_dropped() {
        let bins = vec![BinSpec::new(0.0, 10.0, "low"), BinSpec::new(10.0, f64::INFINITY, "high")];
        let data = vec![
            Observation::new("1", "One", "low", 6.0, None),
            Observation::new("1", "One", "high", 4.0, None),
            Observation::new("2", "Two", "low", 2.0, None),
            Observation::new("2", "Two", "high", 8.0, None),
        ];
        let aggregation = Aggregation::Median { bins, sampling_percentage: None };
        let out = aggregate(&data, &aggregation, &GroupBy::Unit).unwrap();

        // Unit 2's midpoint lies above the last finite boundary.
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].unit_id, "1");
        assert_relative_eq!(out[0].estimate, 5.0 / 6.0 * 10.0);
    }

    #[test]
    fn sum_variables_after_grouping() {
        let aggregation = Aggregation::SumVariables { variable: "both".into(), excluded: vec![] };
        let out = aggregate(&rows(), &aggregation, &GroupBy::Unit).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].estimate, 120.0);
        // Unit 2 only has zero rows: the largest MOE counts once.
        assert_relative_eq!(out[1].margin_of_error.unwrap(), 8.0);
    }

    #[test]
    fn inputs_name_the_variables_read() {
        let aggregation = Aggregation::Proportion { numerator: "a".into(), denominator: "b".into() };
        assert_eq!(aggregation.inputs(), Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(Aggregation::Sum.inputs(), None);
    }
}
