use crate::stats::{Estimate, Observation};

/// Approximate the sum of several estimates.
///
/// MOEs combine in quadrature. Rows whose estimate is exactly zero carry a
/// censored bound rather than an additive error, so only the largest of their
/// MOEs is folded in, once. Rows without a MOE contribute nothing to it; if no
/// row has one, the sum has none either.
pub fn approximate_sum<'a>(rows: impl IntoIterator<Item = &'a Observation>) -> Estimate {
    let mut estimate = 0.0;
    let mut squared = 0.0;
    let mut zero_max: Option<f64> = None;
    let mut any_moe = false;

    for row in rows {
        estimate += row.estimate;
        let Some(moe) = row.margin_of_error else { continue };
        any_moe = true;
        if row.estimate == 0.0 {
            zero_max = Some(zero_max.map_or(moe, |max| max.max(moe)));
        } else {
            squared += moe * moe;
        }
    }

    let margin_of_error = any_moe.then(|| {
        let zero = zero_max.unwrap_or(0.0);
        (squared + zero * zero).sqrt()
    });

    Estimate { estimate, margin_of_error }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn row(estimate: f64, moe: Option<f64>) -> Observation {
        Observation::new("1", "One", "v", estimate, moe)
    }

    #[test]
    fn single_row_is_unchanged() {
        for (estimate, moe) in [(12.0, 3.5), (0.0, 11.0)] {
            let out = approximate_sum(&[row(estimate, Some(moe))]);
            assert_eq!(out.estimate, estimate);
            assert_relative_eq!(out.margin_of_error.unwrap(), moe);
        }
    }

    #[test]
    fn quadrature_without_zero_rows() {
        let out = approximate_sum(&[row(10.0, Some(3.0)), row(20.0, Some(4.0))]);
        assert_eq!(out.estimate, 30.0);
        assert_relative_eq!(out.margin_of_error.unwrap(), 5.0);
    }

    #[test]
    fn zero_rows_contribute_their_max_once() {
        let rows = [row(10.0, Some(3.0)), row(0.0, Some(4.0)), row(0.0, Some(2.0)), row(0.0, Some(4.0))];
        let out = approximate_sum(&rows);
        assert_eq!(out.estimate, 10.0);
        assert_relative_eq!(out.margin_of_error.unwrap(), 5.0);
    }

    #[test]
    fn missing_moes() {
        assert_eq!(approximate_sum(&[row(1.0, None), row(2.0, None)]).margin_of_error, None);

        let out = approximate_sum(&[row(1.0, None), row(2.0, Some(2.0))]);
        assert_eq!(out.estimate, 3.0);
        assert_relative_eq!(out.margin_of_error.unwrap(), 2.0);
    }

    #[test]
    fn empty_input_sums_to_zero() {
        let out = approximate_sum(std::iter::empty());
        assert_eq!(out.estimate, 0.0);
        assert_eq!(out.margin_of_error, None);
    }
}
