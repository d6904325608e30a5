use ahash::AHashMap;

use crate::stats::{Estimate, Observation};

/// Pair each unit's numerator row with its denominator row, in numerator order.
fn pair_rows<'a>(data: &'a [Observation], numerator: &str, denominator: &str) -> Vec<(&'a Observation, &'a Observation)> {
    let mut denominators = AHashMap::new();
    for row in data.iter().filter(|row| row.variable == denominator) {
        denominators.entry((row.unit_id.as_str(), row.unit_name.as_str())).or_insert(row);
    }

    data.iter()
        .filter(|row| row.variable == numerator)
        .filter_map(|row| denominators.get(&(row.unit_id.as_str(), row.unit_name.as_str()))
            .map(|&den| (row, den)))
        .collect()
}

/// Ratio MOE: `(1/D) * sqrt(moe_N² + R² * moe_D²)`.
#[inline]
fn ratio_moe(denominator: f64, ratio: f64, moe_n: f64, moe_d: f64) -> f64 {
    (1.0 / denominator) * (moe_n * moe_n + ratio * ratio * moe_d * moe_d).sqrt()
}

/// Proportion MOE: `(1/D) * sqrt(moe_N² - P² * moe_D²)`, falling back to the ratio
/// formula when the radicand is negative.
#[inline]
fn proportion_moe(denominator: f64, proportion: f64, moe_n: f64, moe_d: f64) -> f64 {
    let radicand = moe_n * moe_n - proportion * proportion * moe_d * moe_d;
    if radicand < 0.0 {
        ratio_moe(denominator, proportion, moe_n, moe_d)
    } else {
        (1.0 / denominator) * radicand.sqrt()
    }
}

/// Compute `N/D` per unit with the given MOE rule.
/// Units with a zero denominator, a missing side, or a non-finite result are dropped.
fn divide(
    data: &[Observation],
    numerator: &str,
    denominator: &str,
    moe_rule: fn(f64, f64, f64, f64) -> f64,
) -> Vec<Observation> {
    let variable = format!("{numerator}/{denominator}");

    pair_rows(data, numerator, denominator).into_iter()
        .filter_map(|(num, den)| {
            if den.estimate == 0.0 { return None }
            let estimate = num.estimate / den.estimate;
            if !estimate.is_finite() { return None }

            let margin_of_error = match (num.margin_of_error, den.margin_of_error) {
                (Some(moe_n), Some(moe_d)) => Some(moe_rule(den.estimate, estimate, moe_n, moe_d)),
                _ => None,
            };
            if margin_of_error.is_some_and(|moe| !moe.is_finite()) { return None }

            Some(Observation::from_estimate(&num.unit_id, &num.unit_name, &variable,
                Estimate { estimate, margin_of_error }))
        })
        .collect()
}

/// Approximate a ratio statistic `numerator / denominator` for every unit carrying both
/// variables. Output rows are named `"<numerator>/<denominator>"`.
pub fn approximate_ratio(data: &[Observation], numerator: &str, denominator: &str) -> Vec<Observation> {
    divide(data, numerator, denominator, ratio_moe)
}

/// Approximate a proportion statistic, where the numerator is a subset of the denominator.
/// Same point estimate as [`approximate_ratio`]; the MOE uses the proportion formula
/// unless its radicand is negative, in which case the ratio formula applies.
pub fn approximate_proportion(data: &[Observation], numerator: &str, denominator: &str) -> Vec<Observation> {
    divide(data, numerator, denominator, proportion_moe)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn rows() -> Vec<Observation> {
        vec![
            Observation::new("1", "One", "poor", 20.0, Some(6.0)),
            Observation::new("1", "One", "universe", 100.0, Some(10.0)),
            Observation::new("2", "Two", "poor", 5.0, Some(1.0)),
            Observation::new("2", "Two", "universe", 0.0, Some(10.0)),
            Observation::new("3", "Three", "poor", 90.0, Some(2.0)),
            Observation::new("3", "Three", "universe", 100.0, Some(30.0)),
            Observation::new("4", "Four", "universe", 50.0, Some(5.0)),
        ]
    }

    #[test]
    fn ratio_values_and_drops() {
        let out = approximate_ratio(&rows(), "poor", "universe");

        // Unit 2 has a zero denominator, unit 4 has no numerator.
        assert_eq!(out.iter().map(|r| r.unit_id.as_str()).collect::<Vec<_>>(), vec!["1", "3"]);
        assert_eq!(out[0].variable, "poor/universe");
        assert_relative_eq!(out[0].estimate, 0.2);
        // (1/100) * sqrt(36 + 0.04 * 100)
        assert_relative_eq!(out[0].margin_of_error.unwrap(), (40.0f64).sqrt() / 100.0);
    }

    #[test]
    fn ratio_of_variable_with_itself_is_one() {
        let out = approximate_ratio(&rows(), "universe", "universe");
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|r| r.estimate == 1.0));
    }

    #[test]
    fn proportion_uses_proportion_formula() {
        let out = approximate_proportion(&rows(), "poor", "universe");
        assert_relative_eq!(out[0].estimate, 0.2);
        // (1/100) * sqrt(36 - 0.04 * 100)
        assert_relative_eq!(out[0].margin_of_error.unwrap(), (32.0f64).sqrt() / 100.0);
    }

    #[test]
    fn negative_radicand_falls_back_to_ratio() {
        let data = rows();
        let proportion = approximate_proportion(&data, "poor", "universe");
        let ratio = approximate_ratio(&data, "poor", "universe");

        // Unit 3: 4 - 0.81 * 900 < 0
        assert_eq!(proportion[1].unit_id, "3");
        assert_eq!(proportion[1].margin_of_error, ratio[1].margin_of_error);
    }

    #[test]
    fn missing_moe_keeps_estimate() {
        let data = vec![
            Observation::new("1", "One", "a", 1.0, None),
            Observation::new("1", "One", "b", 4.0, Some(1.0)),
        ];
        let out = approximate_ratio(&data, "a", "b");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].estimate, 0.25);
        assert_eq!(out[0].margin_of_error, None);
    }
}
