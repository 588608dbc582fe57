//! Dataset view: numeric feature matrix and target vector from a table

use crate::error::{SvrError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Column roles chosen for a training run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRoles {
    pub features: Vec<String>,
    pub target: String,
}

impl ColumnRoles {
    /// Validate and build roles: at least one feature, no duplicate features,
    /// and the target must not also be a feature.
    pub fn new(features: Vec<String>, target: impl Into<String>) -> Result<Self> {
        let target = target.into();
        if features.is_empty() {
            return Err(SvrError::InvalidRequest("at least one feature column is required".to_string()));
        }
        if target.is_empty() {
            return Err(SvrError::InvalidRequest("a target column is required".to_string()));
        }
        if features.contains(&target) {
            return Err(SvrError::InvalidRequest(format!(
                "column '{}' cannot be both a feature and the target",
                target
            )));
        }
        for (i, name) in features.iter().enumerate() {
            if features[..i].contains(name) {
                return Err(SvrError::InvalidRequest(format!("feature column '{}' is listed twice", name)));
            }
        }
        Ok(Self { features, target })
    }
}

/// How missing or unparsable cells are treated during extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingValues {
    /// Fail with `NonNumericData`
    Reject,
    /// Keep the row and use NaN for the cell
    AsNan,
}

/// Labeled numeric data extracted from a table
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub roles: ColumnRoles,
}

impl Dataset {
    /// Extract features and target. The table is only read.
    pub fn from_frame(df: &DataFrame, roles: &ColumnRoles) -> Result<Self> {
        let x = feature_matrix(df, &roles.features, MissingValues::Reject)?;
        let y = Array1::from_vec(column_values(df, &roles.target, MissingValues::Reject)?);
        Ok(Self { x, y, roles: roles.clone() })
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }
}

/// Extract named columns into a row-major matrix
pub fn feature_matrix(df: &DataFrame, names: &[String], missing: MissingValues) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let col_data: Vec<Vec<f64>> = names
        .iter()
        .map(|name| column_values(df, name, missing))
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, names.len()), |(r, c)| col_refs[c][r]))
}

fn column_values(df: &DataFrame, name: &str, missing: MissingValues) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| SvrError::ColumnMissing(name.to_string()))?;

    let casted = column.cast(&DataType::Float64).map_err(|e| SvrError::NonNumericData {
        column: name.to_string(),
        reason: e.to_string(),
    })?;
    let values = casted.f64().map_err(|e| SvrError::NonNumericData {
        column: name.to_string(),
        reason: e.to_string(),
    })?;

    match missing {
        MissingValues::AsNan => Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect()),
        MissingValues::Reject => {
            let missing_count = casted.null_count();
            if missing_count > 0 {
                return Err(SvrError::NonNumericData {
                    column: name.to_string(),
                    reason: format!("{} value(s) are missing or not numbers", missing_count),
                });
            }
            let out: Vec<f64> = values.into_no_null_iter().collect();
            if out.iter().any(|v| !v.is_finite()) {
                return Err(SvrError::NonNumericData {
                    column: name.to_string(),
                    reason: "contains NaN or infinite values".to_string(),
                });
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df!(
            "x1" => &[1.0, 2.0, 3.0],
            "x2" => &[10i64, 20, 30],
            "label" => &["a", "b", "c"],
            "y" => &[0.5, 1.5, 2.5]
        )
        .unwrap()
    }

    fn roles(features: &[&str], target: &str) -> ColumnRoles {
        ColumnRoles::new(features.iter().map(|s| s.to_string()).collect(), target).unwrap()
    }

    #[test]
    fn test_extract() {
        let df = frame();
        let ds = Dataset::from_frame(&df, &roles(&["x1", "x2"], "y")).unwrap();
        assert_eq!(ds.x.shape(), &[3, 2]);
        assert_eq!(ds.x[[1, 1]], 20.0);
        assert_eq!(ds.y.to_vec(), vec![0.5, 1.5, 2.5]);
        // Source table is untouched
        assert_eq!(df.width(), 4);
    }

    #[test]
    fn test_missing_column() {
        let err = Dataset::from_frame(&frame(), &roles(&["x1", "nope"], "y")).unwrap_err();
        assert!(matches!(err, SvrError::ColumnMissing(ref c) if c == "nope"));
    }

    #[test]
    fn test_non_numeric_column() {
        let err = Dataset::from_frame(&frame(), &roles(&["label"], "y")).unwrap_err();
        assert!(matches!(err, SvrError::NonNumericData { ref column, .. } if column == "label"));
    }

    #[test]
    fn test_nulls_as_nan() {
        let df = df!("a" => &[Some(1.0), None, Some(3.0)]).unwrap();
        let names = vec!["a".to_string()];
        let m = feature_matrix(&df, &names, MissingValues::AsNan).unwrap();
        assert!(m[[1, 0]].is_nan());
        assert!(feature_matrix(&df, &names, MissingValues::Reject).is_err());
    }

    #[test]
    fn test_roles_validation() {
        assert!(ColumnRoles::new(vec![], "y").is_err());
        assert!(ColumnRoles::new(vec!["y".into()], "y").is_err());
        assert!(ColumnRoles::new(vec!["a".into(), "a".into()], "y").is_err());
        assert!(ColumnRoles::new(vec!["a".into()], "y").is_ok());
    }
}
