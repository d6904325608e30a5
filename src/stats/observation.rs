use std::path::Path;

use anyhow::Result;
use polars::{frame::DataFrame, prelude::Column};
use serde::{Deserialize, Serialize};

use crate::common;

/// One survey estimate for one unit and one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub unit_id: String,
    pub unit_name: String,
    pub variable: String,
    pub estimate: f64,
    pub margin_of_error: Option<f64>,
}

/// A point estimate with its (optional) margin of error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub estimate: f64,
    pub margin_of_error: Option<f64>,
}

impl Observation {
    pub fn new(unit_id: &str, unit_name: &str, variable: &str, estimate: f64, margin_of_error: Option<f64>) -> Self {
        Self {
            unit_id: unit_id.into(),
            unit_name: unit_name.into(),
            variable: variable.into(),
            estimate,
            margin_of_error,
        }
    }

    /// Build an observation for a unit from a computed estimate.
    pub(crate) fn from_estimate(unit_id: &str, unit_name: &str, variable: &str, value: Estimate) -> Self {
        Self::new(unit_id, unit_name, variable, value.estimate, value.margin_of_error)
    }

    /// Convert a table with `unit_id, unit_name, variable, estimate[, margin_of_error]`
    /// columns into observations. Rows without an estimate are skipped.
    pub fn from_dataframe(df: &DataFrame) -> Result<Vec<Observation>> {
        let ids = common::string_column(df, "unit_id")?;
        let names = common::string_column(df, "unit_name")?;
        let variables = common::string_column(df, "variable")?;
        let estimates = common::float_column(df, "estimate")?;
        let moes = match df.column("margin_of_error") {
            Ok(_) => common::float_column(df, "margin_of_error")?,
            Err(_) => vec![None; df.height()],
        };

        let rows = ids.into_iter().zip(names).zip(variables).zip(estimates).zip(moes)
            .filter_map(|((((unit_id, unit_name), variable), estimate), margin_of_error)| {
                estimate.map(|estimate| Observation { unit_id, unit_name, variable, estimate, margin_of_error })
            })
            .collect::<Vec<_>>();

        if rows.len() < df.height() {
            log::debug!("[Observation::from_dataframe] skipped {} rows without an estimate", df.height() - rows.len());
        }
        Ok(rows)
    }

    /// Convert observations into a table with the standard column layout.
    pub fn to_dataframe(rows: &[Observation]) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            Column::new("unit_id".into(), rows.iter().map(|r| r.unit_id.as_str()).collect::<Vec<_>>()),
            Column::new("unit_name".into(), rows.iter().map(|r| r.unit_name.as_str()).collect::<Vec<_>>()),
            Column::new("variable".into(), rows.iter().map(|r| r.variable.as_str()).collect::<Vec<_>>()),
            Column::new("estimate".into(), rows.iter().map(|r| r.estimate).collect::<Vec<_>>()),
            Column::new("margin_of_error".into(), rows.iter().map(|r| r.margin_of_error).collect::<Vec<_>>()),
        ])?)
    }

    /// Read observations from a CSV file.
    pub fn read_csv(path: &Path) -> Result<Vec<Observation>> {
        Self::from_dataframe(&common::read_csv_file(path)?)
    }

    /// Write observations to a CSV file.
    pub fn write_csv(path: &Path, rows: &[Observation]) -> Result<()> {
        common::write_csv_file(path, &Self::to_dataframe(rows)?)
    }
}
