//! # Student Record Intake
//!
//! The flat attribute record a prediction request carries. Continuous fields are
//! `f64`, categorical fields are small integer codes. The record can only be
//! constructed complete: building it from a loose JSON mapping reports the first
//! absent or ill-typed field by name.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Code used by the `FastTrack` and `Coop` attributes for "yes".
pub const YES_CODE: i64 = 1;

/// Code used by the `Residency` attribute for international students.
pub const INTERNATIONAL_RESIDENCY_CODE: i64 = 2;

/// A single student's attributes, exactly as the training data named them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StudentRecord {
    #[serde(rename = "FirstTermGPA")]
    pub first_term_gpa: f64,
    #[serde(rename = "SecondTermGPA")]
    pub second_term_gpa: f64,
    pub high_school_average_mark: f64,
    pub math_score: f64,
    pub first_language: i64,
    pub funding: i64,
    pub school: i64,
    pub fast_track: i64,
    pub coop: i64,
    pub residency: i64,
    pub gender: i64,
    pub prev_education: i64,
    pub age_group: i64,
    pub english_grade: i64,
}

/// Failures while turning a request body into a [`StudentRecord`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Request body must be a JSON object of student attributes.")]
    NotAnObject,
    #[error("Required field '{0}' is missing from the student record.")]
    MissingField(String),
    #[error("Field '{field}' is invalid: {reason}")]
    InvalidField { field: String, reason: String },
}

impl StudentRecord {
    /// Builds a record from a loose JSON value, naming the first bad field.
    pub fn from_json(value: &Value) -> Result<Self, RecordError> {
        let fields = value.as_object().ok_or(RecordError::NotAnObject)?;
        Self::from_fields(fields)
    }

    /// Builds a record from a JSON object. Keys the record does not know are ignored.
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self, RecordError> {
        Ok(Self {
            first_term_gpa: continuous(fields, "FirstTermGPA")?,
            second_term_gpa: continuous(fields, "SecondTermGPA")?,
            high_school_average_mark: continuous(fields, "HighSchoolAverageMark")?,
            math_score: continuous(fields, "MathScore")?,
            first_language: code(fields, "FirstLanguage")?,
            funding: code(fields, "Funding")?,
            school: code(fields, "School")?,
            fast_track: code(fields, "FastTrack")?,
            coop: code(fields, "Coop")?,
            residency: code(fields, "Residency")?,
            gender: code(fields, "Gender")?,
            prev_education: code(fields, "PrevEducation")?,
            age_group: code(fields, "AgeGroup")?,
            english_grade: code(fields, "EnglishGrade")?,
        })
    }
}

fn lookup<'a>(fields: &'a Map<String, Value>, name: &str) -> Result<&'a Value, RecordError> {
    match fields.get(name) {
        None | Some(Value::Null) => Err(RecordError::MissingField(name.to_string())),
        Some(value) => Ok(value),
    }
}

fn continuous(fields: &Map<String, Value>, name: &str) -> Result<f64, RecordError> {
    lookup(fields, name)?
        .as_f64()
        .ok_or_else(|| RecordError::InvalidField {
            field: name.to_string(),
            reason: "expected a number".to_string(),
        })
}

fn code(fields: &Map<String, Value>, name: &str) -> Result<i64, RecordError> {
    let value = lookup(fields, name)?;
    if let Some(code) = value.as_i64() {
        return Ok(code);
    }
    // Integral floats such as `2.0` are accepted as codes; anything else is not.
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        Some(f) => Err(RecordError::InvalidField {
            field: name.to_string(),
            reason: format!("expected an integer code, found {f}"),
        }),
        None => Err(RecordError::InvalidField {
            field: name.to_string(),
            reason: "expected an integer code".to_string(),
        }),
    }
}
