//! # Numeric Scaling
//!
//! The fitted standardisation applied to the continuous columns. The artifact names
//! the columns it was fit on; at load time those names are resolved against the
//! training schema once, so scaling a request only touches those positions and never
//! disturbs the one-hot columns around them.

use crate::align::ColumnIndex;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// The scaler artifact as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    /// Continuous columns the scaler was fit on, in fitting order.
    pub columns: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Error, Debug)]
pub enum ScalerError {
    #[error("Failed to read or write scaler file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML scaler file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize scaler to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Scaler lists {columns} columns but {means} means and {scales} scales.")]
    LengthMismatch {
        columns: usize,
        means: usize,
        scales: usize,
    },
    #[error("Scaler parameter for column '{0}' is not finite.")]
    NonFiniteParameter(String),
    #[error("Scaler column '{0}' is not part of the training schema.")]
    ColumnNotInSchema(String),
}

impl ScalerParams {
    pub fn save(&self, path: &Path) -> Result<(), ScalerError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ScalerError> {
        let toml_string = fs::read_to_string(path)?;
        let params: Self = toml::from_str(&toml_string)?;
        params.validate()?;
        Ok(params)
    }

    fn validate(&self) -> Result<(), ScalerError> {
        if self.mean.len() != self.columns.len() || self.scale.len() != self.columns.len() {
            return Err(ScalerError::LengthMismatch {
                columns: self.columns.len(),
                means: self.mean.len(),
                scales: self.scale.len(),
            });
        }
        for (i, column) in self.columns.iter().enumerate() {
            if !self.mean[i].is_finite() || !self.scale[i].is_finite() {
                return Err(ScalerError::NonFiniteParameter(column.clone()));
            }
        }
        Ok(())
    }

    /// Resolves the scaler's columns to positions in the aligned vector.
    pub fn bind(&self, schema: &ColumnIndex) -> Result<BoundScaler, ScalerError> {
        self.validate()?;
        let mut positions = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let position = schema
                .position(column)
                .ok_or_else(|| ScalerError::ColumnNotInSchema(column.clone()))?;
            positions.push(position);
        }
        // A zero scale means the column was constant during fitting; it is left unscaled.
        let scale = self
            .scale
            .iter()
            .map(|&s| if s == 0.0 { 1.0 } else { s })
            .collect();
        Ok(BoundScaler {
            positions,
            mean: self.mean.clone(),
            scale,
        })
    }
}

/// A scaler whose columns are resolved against a specific schema.
#[derive(Debug, Clone)]
pub struct BoundScaler {
    positions: Vec<usize>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl BoundScaler {
    pub fn num_columns(&self) -> usize {
        self.positions.len()
    }

    /// Standardises the scaler's columns in place. Non-finite inputs are read as 0
    /// before the transform.
    pub fn transform(&self, aligned: &mut Array1<f64>) {
        for (k, &i) in self.positions.iter().enumerate() {
            let raw = aligned[i];
            let value = if raw.is_finite() { raw } else { 0.0 };
            aligned[i] = (value - self.mean[k]) / self.scale[k];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tempfile::tempdir;

    fn schema() -> ColumnIndex {
        ColumnIndex::new(vec![
            "FirstTermGPA".to_string(),
            "School_1".to_string(),
            "HighSchoolAverageMark".to_string(),
        ])
        .unwrap()
    }

    fn params() -> ScalerParams {
        ScalerParams {
            columns: vec!["HighSchoolAverageMark".into(), "FirstTermGPA".into()],
            mean: vec![75.0, 2.5],
            scale: vec![10.0, 0.5],
        }
    }

    #[test]
    fn test_transform_only_touches_scaler_columns() {
        let scaler = params().bind(&schema()).unwrap();
        let mut aligned = Array1::from(vec![3.0, 1.0, 85.0]);
        scaler.transform(&mut aligned);
        assert_abs_diff_eq!(aligned[0], 1.0, epsilon = 1e-12);
        assert_eq!(aligned[1], 1.0);
        assert_abs_diff_eq!(aligned[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_non_finite_inputs_are_read_as_zero() {
        let scaler = params().bind(&schema()).unwrap();
        let mut aligned = Array1::from(vec![f64::NAN, 0.0, f64::INFINITY]);
        scaler.transform(&mut aligned);
        assert_abs_diff_eq!(aligned[0], -5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(aligned[2], -7.5, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_scale_leaves_column_centered_only() {
        let mut p = params();
        p.scale[1] = 0.0;
        let scaler = p.bind(&schema()).unwrap();
        let mut aligned = Array1::from(vec![3.0, 0.0, 75.0]);
        scaler.transform(&mut aligned);
        assert_abs_diff_eq!(aligned[0], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_bind_rejects_columns_outside_schema() {
        let mut p = params();
        p.columns[0] = "MathScore".into();
        match p.bind(&schema()).unwrap_err() {
            ScalerError::ColumnNotInSchema(name) => assert_eq!(name, "MathScore"),
            other => panic!("Expected ColumnNotInSchema, got {:?}", other),
        }
    }

    #[test]
    fn test_save_load_round_trip_and_length_check() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scaler.toml");
        params().save(&path).unwrap();
        assert_eq!(ScalerParams::load(&path).unwrap(), params());

        let mut broken = params();
        broken.mean.pop();
        broken.save(&path).unwrap();
        assert!(matches!(
            ScalerParams::load(&path).unwrap_err(),
            ScalerError::LengthMismatch {
                columns: 2,
                means: 1,
                scales: 2
            }
        ));
    }
}
