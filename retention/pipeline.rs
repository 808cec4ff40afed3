//! # Prediction Pipeline
//!
//! The single operation this service exists for: take one student record through
//!
//! 1. feature derivation,
//! 2. categorical encoding,
//! 3. schema alignment,
//! 4. numeric scaling,
//! 5. model inference,
//! 6. output sanitization,
//!
//! and return a persistence probability together with its complement risk score.
//! Every stage returns a typed error; nothing is retried except artifact loading.

use crate::align::ColumnIndex;
use crate::artifacts::{ArtifactLoadError, ArtifactStore, Artifacts};
use crate::encode::encode;
use crate::features::derive;
use crate::record::{RecordError, StudentRecord};
use log::warn;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub const PERSIST_LABEL: &str = "Persist";
pub const DROPOUT_RISK_LABEL: &str = "Dropout Risk";

/// The response for one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 1 when the student is predicted to persist, 0 otherwise.
    pub prediction: u8,
    pub label: String,
    /// Sanitized persistence probability, always finite and within `[0, 1]`.
    pub probability: f64,
    /// `1 - probability`.
    pub risk_score: f64,
}

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Model artifacts could not be loaded. Check the '{}' folder. {source}", .dir.display())]
    ArtifactsUnavailable {
        dir: PathBuf,
        source: Arc<ArtifactLoadError>,
    },
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(
        "Feature vector has {actual} columns but the classifier expects {expected}. The schema, scaler and model artifacts are out of sync."
    )]
    ShapeMismatch { expected: usize, actual: usize },
}

impl PredictError {
    /// A stable, machine-readable name for the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::ArtifactsUnavailable { .. } => "artifact_load",
            PredictError::Record(RecordError::MissingField(_)) => "missing_field",
            PredictError::Record(RecordError::InvalidField { .. }) => "invalid_field",
            PredictError::Record(RecordError::NotAnObject) => "invalid_body",
            PredictError::ShapeMismatch { .. } => "shape_mismatch",
        }
    }
}

/// Owns the artifact store and the decision threshold.
pub struct Pipeline {
    store: ArtifactStore,
    threshold: f64,
}

impl Pipeline {
    pub fn new(store: ArtifactStore, threshold: f64) -> Self {
        Self { store, threshold }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Predicts from a loose JSON body, reporting missing or ill-typed fields by name.
    pub fn predict_json(&self, body: &Value) -> Result<Prediction, PredictError> {
        let record = StudentRecord::from_json(body)?;
        self.predict(&record)
    }

    /// Runs the full pipeline for one record. Artifacts are loaded first if needed.
    pub fn predict(&self, record: &StudentRecord) -> Result<Prediction, PredictError> {
        let artifacts = self.store.ensure_loaded().map_err(|source| {
            PredictError::ArtifactsUnavailable {
                dir: self.store.dir().to_path_buf(),
                source,
            }
        })?;

        let features = feature_vector(&artifacts, record);

        let expected = artifacts.classifier.input_width();
        if features.len() != expected {
            return Err(PredictError::ShapeMismatch {
                expected,
                actual: features.len(),
            });
        }

        let probability = artifacts.classifier.predict_proba(features.view());
        Ok(decide(probability, self.threshold))
    }
}

/// Derives, encodes, aligns and scales one record into the classifier's input.
pub fn feature_vector(artifacts: &Artifacts, record: &StudentRecord) -> Array1<f64> {
    let mut aligned = align_record(&artifacts.schema, record);
    artifacts.scaler.transform(&mut aligned);
    aligned
}

/// The unscaled, schema-aligned vector for one record.
pub fn align_record(schema: &ColumnIndex, record: &StudentRecord) -> Array1<f64> {
    schema.align(&encode(&derive(record)))
}

/// Sanitizes a raw probability and applies the decision threshold.
///
/// A non-finite probability becomes 0.0 (with a warning), so the client sees the
/// most cautious answer instead of a NaN. The threshold comparison is strict.
pub fn decide(raw: f64, threshold: f64) -> Prediction {
    let probability = if raw.is_finite() {
        // `+ 0.0` turns a negative zero into a positive one.
        raw.clamp(0.0, 1.0) + 0.0
    } else {
        warn!("Classifier returned a non-finite probability ({raw}); reporting 0.0");
        0.0
    };

    let persists = probability > threshold;
    Prediction {
        prediction: u8::from(persists),
        label: if persists { PERSIST_LABEL } else { DROPOUT_RISK_LABEL }.to_string(),
        probability,
        risk_score: 1.0 - probability,
    }
}
