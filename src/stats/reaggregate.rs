use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::Result;
use polars::{frame::DataFrame, prelude::Column};

use crate::{crosswalk::Crosswalk, stats::{approximate_sum, Observation}};

/// How observations are grouped into output units.
#[derive(Debug, Clone, Copy)]
pub enum GroupBy<'a> {
    /// Every unit is its own group.
    Unit,
    /// Fine units are grouped into the coarse unit the crosswalk assigns them to.
    Crosswalk(&'a Crosswalk),
}

impl<'a> GroupBy<'a> {
    /// The `(id, name)` of the group a row belongs to, if any.
    pub(crate) fn target<'r>(&'r self, row: &'r Observation) -> Option<(&'r str, &'r str)> {
        match self {
            GroupBy::Unit => Some((row.unit_id.as_str(), row.unit_name.as_str())),
            GroupBy::Crosswalk(crosswalk) => crosswalk.get(&row.unit_id)
                .map(|entry| (entry.coarse_id.as_str(), entry.coarse_name.as_str())),
        }
    }

    /// Group rows by `(target id, target name, variable)`, in key order.
    fn partition<'r>(&'r self, observations: &'r [Observation]) -> BTreeMap<(&'r str, &'r str, &'r str), Vec<&'r Observation>> {
        let mut groups: BTreeMap<_, Vec<_>> = BTreeMap::new();
        let mut unmatched = 0;
        for row in observations {
            let Some((id, name)) = self.target(row) else { unmatched += 1; continue };
            groups.entry((id, name, row.variable.as_str())).or_default().push(row);
        }
        if unmatched > 0 {
            log::warn!("[GroupBy] {unmatched} rows belong to units missing from the crosswalk and were skipped");
        }
        groups
    }
}

/// Sum every variable within each group using [`approximate_sum`].
/// Output rows are ordered by `(unit_id, unit_name, variable)`.
pub fn sum_by(observations: &[Observation], groupby: &GroupBy) -> Vec<Observation> {
    groupby.partition(observations).into_iter()
        .map(|((id, name, variable), rows)| Observation::from_estimate(id, name, variable, approximate_sum(rows)))
        .collect()
}

/// Aggregate fine-unit observations to the crosswalk's coarse units by summation.
pub fn fine_to_coarse(observations: &[Observation], crosswalk: &Crosswalk) -> Vec<Observation> {
    sum_by(observations, &GroupBy::Crosswalk(crosswalk))
}

/// Weighted mean `Σ(estimate·weight) / Σ(weight)` within each group, with weights
/// keyed by (fine) unit id. No margin of error is propagated. Rows without a weight
/// are skipped; groups whose weights sum to zero are dropped.
pub fn weighted_mean_by(observations: &[Observation], groupby: &GroupBy, weights: &HashMap<String, f64>) -> Vec<Observation> {
    let mut unweighted = 0;
    let rows = groupby.partition(observations).into_iter()
        .filter_map(|((id, name, variable), rows)| {
            let (weighted, total) = rows.iter()
                .filter_map(|row| {
                    let weight = weights.get(&row.unit_id).copied();
                    if weight.is_none() { unweighted += 1 }
                    weight.map(|w| (row.estimate * w, w))
                })
                .fold((0.0, 0.0), |(a, b), (x, w)| (a + x, b + w));

            if total == 0.0 { return None }
            let estimate = weighted / total;
            estimate.is_finite().then(|| Observation::new(id, name, variable, estimate, None))
        })
        .collect();

    if unweighted > 0 {
        log::warn!("[weighted_mean_by] {unweighted} rows have no weight and were skipped");
    }
    rows
}

/// Weighted variant of [`fine_to_coarse`] for quantities that must not be summed.
pub fn weighted_fine_to_coarse(observations: &[Observation], crosswalk: &Crosswalk, weights: &HashMap<String, f64>) -> Vec<Observation> {
    weighted_mean_by(observations, &GroupBy::Crosswalk(crosswalk), weights)
}

/// Per unit, combine every variable not listed in `excluded` into a single
/// `variable_name` row with [`approximate_sum`]. Excluded rows follow unchanged.
pub fn sum_over_variables(data: &[Observation], variable_name: &str, excluded: &[String]) -> Vec<Observation> {
    let excluded = excluded.iter().map(String::as_str).collect::<HashSet<_>>();
    let (kept, passthrough): (Vec<_>, Vec<_>) = data.iter()
        .partition(|row| !excluded.contains(row.variable.as_str()));

    let mut units: BTreeMap<(&str, &str), Vec<&Observation>> = BTreeMap::new();
    for row in kept {
        units.entry((row.unit_id.as_str(), row.unit_name.as_str())).or_default().push(row);
    }

    units.into_iter()
        .map(|((id, name), rows)| Observation::from_estimate(id, name, variable_name, approximate_sum(rows)))
        .chain(passthrough.into_iter().cloned())
        .collect()
}

/// Pivot long observations into a wide table: one row per unit, columns
/// `group_id, group_name, unit_id` followed by one float column per variable
/// (null where a unit lacks the variable). Units outside every group are skipped.
pub fn observations_to_wide(observations: &[Observation], variables: &[String], groupby: &GroupBy) -> Result<DataFrame> {
    let position = variables.iter().enumerate()
        .map(|(i, variable)| (variable.as_str(), i))
        .collect::<HashMap<_, _>>();

    let mut units: BTreeMap<(&str, &str, &str), Vec<Option<f64>>> = BTreeMap::new();
    for row in observations {
        let Some(&i) = position.get(row.variable.as_str()) else { continue };
        let Some((group_id, group_name)) = groupby.target(row) else { continue };
        units.entry((group_id, group_name, row.unit_id.as_str()))
            .or_insert_with(|| vec![None; variables.len()])[i] = Some(row.estimate);
    }

    let mut columns = vec![
        Column::new("group_id".into(), units.keys().map(|k| k.0).collect::<Vec<_>>()),
        Column::new("group_name".into(), units.keys().map(|k| k.1).collect::<Vec<_>>()),
        Column::new("unit_id".into(), units.keys().map(|k| k.2).collect::<Vec<_>>()),
    ];
    for (i, variable) in variables.iter().enumerate() {
        columns.push(Column::new(variable.as_str().into(), units.values().map(|v| v[i]).collect::<Vec<_>>()));
    }

    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geo::MultiPolygon;

    use super::*;
    use crate::crosswalk::{CrosswalkEntry, CrosswalkKind};

    fn crosswalk() -> Crosswalk {
        let entry = |fine: &str, coarse: &str| CrosswalkEntry {
            fine_id: fine.into(),
            fine_name: format!("Tract {fine}"),
            coarse_id: coarse.into(),
            coarse_name: format!("Hood {coarse}"),
            intersection_area: 1.0,
            fine_area: 1.0,
            local: None,
            geometry: MultiPolygon(vec![]),
        };
        Crosswalk::new(CrosswalkKind::TractPuma, vec![entry("1", "A"), entry("2", "A"), entry("3", "B")]).unwrap()
    }

    fn rows() -> Vec<Observation> {
        vec![
            Observation::new("1", "Tract 1", "pop", 100.0, Some(30.0)),
            Observation::new("2", "Tract 2", "pop", 50.0, Some(40.0)),
            Observation::new("3", "Tract 3", "pop", 0.0, Some(12.0)),
            Observation::new("9", "Tract 9", "pop", 7.0, Some(1.0)),
        ]
    }

    #[test]
    fn fine_to_coarse_sums_within_groups() {
        let out = fine_to_coarse(&rows(), &crosswalk());

        assert_eq!(out.len(), 2);
        assert_eq!((out[0].unit_id.as_str(), out[0].unit_name.as_str()), ("A", "Hood A"));
        assert_eq!(out[0].estimate, 150.0);
        assert_relative_eq!(out[0].margin_of_error.unwrap(), 50.0);
        assert_eq!(out[1].estimate, 0.0);
        assert_relative_eq!(out[1].margin_of_error.unwrap(), 12.0);
    }

    #[test]
    fn weighted_mean_ignores_moe_and_zero_weight_groups() {
        let weights = HashMap::from([("1".to_string(), 3.0), ("2".to_string(), 1.0), ("3".to_string(), 0.0)]);
        let out = weighted_fine_to_coarse(&rows(), &crosswalk(), &weights);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].unit_id, "A");
        assert_relative_eq!(out[0].estimate, (300.0 + 50.0) / 4.0);
        assert_eq!(out[0].margin_of_error, None);
    }

    #[test]
    fn sum_over_variables_keeps_excluded_rows() {
        let data = vec![
            Observation::new("1", "One", "a", 1.0, Some(3.0)),
            Observation::new("1", "One", "b", 2.0, Some(4.0)),
            Observation::new("1", "One", "total", 3.0, Some(1.0)),
        ];
        let out = sum_over_variables(&data, "a_plus_b", &["total".to_string()]);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].variable, "a_plus_b");
        assert_eq!(out[0].estimate, 3.0);
        assert_relative_eq!(out[0].margin_of_error.unwrap(), 5.0);
        assert_eq!(out[1], data[2]);
    }

    #[test]
    fn wide_table_has_one_row_per_unit() {
        let mut data = rows();
        data.push(Observation::new("1", "Tract 1", "households", 40.0, None));
        let variables = vec!["pop".to_string(), "households".to_string()];

        let df = observations_to_wide(&data, &variables, &GroupBy::Crosswalk(&crosswalk())).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.get_column_names_str(), vec!["group_id", "group_name", "unit_id", "pop", "households"]);
        assert_eq!(df.column("households").unwrap().null_count(), 2);
    }
}
