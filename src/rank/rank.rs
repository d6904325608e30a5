use std::collections::{BTreeMap, HashSet};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{rank::{percentile, AverageLabel}, stats::Observation};

/// An observation with its within-variable rank and average label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedObservation {
    #[serde(flatten)]
    pub observation: Observation,
    pub rank: usize,
    pub average_label: AverageLabel,
}

/// Competition ranks (`1, 2, 2, 4`) of `values`, ascending unless `descending`.
fn competition_ranks(values: &[f64], descending: bool) -> Vec<usize> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    values.iter()
        .map(|&v| 1 + if descending {
            sorted.len() - sorted.partition_point(|&x| x <= v)
        } else {
            sorted.partition_point(|&x| x < v)
        })
        .collect()
}

/// Rank and label every observation within its variable.
///
/// Ranks ascend with the estimate, or descend for variables in `inverted`; ties
/// share the lowest rank. Labels compare each estimate to the variable's 25th and
/// 75th percentiles. Rows with non-finite estimates are left out. Output is ordered
/// by variable, then input order.
pub fn rank_and_label(observations: &[Observation], inverted: &HashSet<String>) -> Result<Vec<RankedObservation>> {
    let mut seen = HashSet::new();
    let mut variables: BTreeMap<&str, Vec<&Observation>> = BTreeMap::new();
    let mut skipped = 0;

    for row in observations {
        if !seen.insert((row.unit_id.as_str(), row.variable.as_str())) {
            bail!("[rank_and_label] unit {:?} has more than one {:?} row", row.unit_id, row.variable);
        }
        if !row.estimate.is_finite() { skipped += 1; continue }
        variables.entry(row.variable.as_str()).or_default().push(row);
    }
    if skipped > 0 {
        log::debug!("[rank_and_label] skipped {skipped} rows with non-finite estimates");
    }

    let mut ranked = Vec::with_capacity(observations.len() - skipped);
    for (variable, rows) in variables {
        let is_inverted = inverted.contains(variable);
        let values = rows.iter().map(|row| row.estimate).collect::<Vec<_>>();
        let ranks = competition_ranks(&values, is_inverted);

        let mut sorted = values;
        sorted.sort_by(f64::total_cmp);
        let (Some(lower), Some(upper)) = (percentile(&sorted, 0.25), percentile(&sorted, 0.75)) else { continue };

        ranked.extend(rows.into_iter().zip(ranks).map(|(row, rank)| RankedObservation {
            observation: row.clone(),
            rank,
            average_label: AverageLabel::classify(row.estimate, lower, upper, is_inverted),
        }));
    }

    Ok(ranked)
}

/// Group ranked rows into a JSON object keyed by variable.
pub fn ranked_by_variable(rows: &[RankedObservation]) -> Result<Value> {
    let mut out = Map::new();
    for row in rows {
        let entry = out.entry(row.observation.variable.clone()).or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = entry {
            items.push(serde_json::to_value(row)?);
        }
    }
    Ok(Value::Object(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(variable: &str, values: &[f64]) -> Vec<Observation> {
        values.iter().enumerate()
            .map(|(i, &v)| Observation::new(&i.to_string(), &format!("Unit {i}"), variable, v, None))
            .collect()
    }

    #[test]
    fn competition_ranking_with_ties() {
        assert_eq!(competition_ranks(&[10.0, 20.0, 20.0, 30.0], false), vec![1, 2, 2, 4]);
        assert_eq!(competition_ranks(&[10.0, 20.0, 20.0, 30.0], true), vec![4, 2, 2, 1]);
    }

    #[test]
    fn ranks_and_labels_per_variable() {
        let mut data = rows("income", &[1.0, 2.0, 3.0, 4.0, 5.0]);
        data.extend(rows("poverty", &[1.0, 2.0, 3.0, 4.0, 5.0]));
        let inverted = HashSet::from(["poverty".to_string()]);

        let out = rank_and_label(&data, &inverted).unwrap();
        assert_eq!(out.len(), 10);

        let income = &out[..5];
        assert_eq!(income.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        // p25 = 2, p75 = 4, boundaries are inclusive.
        assert_eq!(income.iter().map(|r| r.average_label).collect::<Vec<_>>(), vec![
            AverageLabel::BelowAverage, AverageLabel::Average, AverageLabel::Average,
            AverageLabel::Average, AverageLabel::AboveAverage,
        ]);

        let poverty = &out[5..];
        assert_eq!(poverty.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![5, 4, 3, 2, 1]);
        assert_eq!(poverty[0].average_label, AverageLabel::AboveAverage);
        assert_eq!(poverty[4].average_label, AverageLabel::BelowAverage);
    }

    #[test]
    fn non_finite_rows_are_left_out() {
        let data = rows("v", &[1.0, f64::NAN, 3.0]);
        let out = rank_and_label(&data, &HashSet::new()).unwrap();
        assert_eq!(out.iter().map(|r| r.observation.unit_id.as_str()).collect::<Vec<_>>(), vec!["0", "2"]);
        assert_eq!(out[1].rank, 2);
    }

    #[test]
    fn duplicate_rows_are_rejected() {
        let mut data = rows("v", &[1.0]);
        data.extend(rows("v", &[2.0]));
        assert!(rank_and_label(&data, &HashSet::new()).is_err());
    }

    #[test]
    fn json_grouped_by_variable() {
        let out = rank_and_label(&rows("v", &[1.0, 2.0]), &HashSet::new()).unwrap();
        let json = ranked_by_variable(&out).unwrap();

        assert_eq!(json["v"][1]["rank"], 2);
        assert_eq!(json["v"][1]["unit_id"], "1");
        assert_eq!(json["v"][0]["average_label"], "Below Average");
    }
}
