//! # Categorical Encoding
//!
//! One-hot expansion of the designated categorical columns. Each categorical
//! column becomes a single active column named `"{field}_{value}"`; every other
//! column passes through under its own name. Whether an encoded column is known to
//! the model is not decided here: that is the aligner's job.

use crate::features::DerivedFeatures;

/// A wide record of named numeric columns, in the order they were produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedRecord {
    columns: Vec<(String, f64)>,
}

impl EncodedRecord {
    pub fn push(&mut self, name: impl Into<String>, value: f64) {
        self.columns.push((name.into(), value));
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// Value of a column by name, if the record has it.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }
}

/// The one-hot column name for a category value.
pub fn one_hot_name(field: &str, value: &str) -> String {
    format!("{field}_{value}")
}

/// Expands derived features into their encoded, model-facing columns.
pub fn encode(features: &DerivedFeatures) -> EncodedRecord {
    let mut encoded = EncodedRecord::default();

    for (name, value) in features.numeric_columns() {
        encoded.push(name, value);
    }

    for (field, value) in features.categorical_columns() {
        encoded.push(one_hot_name(field, &value), 1.0);
    }

    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{
        self, AVG_FIRST_YEAR_GPA, CATEGORICAL_COLUMN_COUNT, FIRST_TERM_GPA, NUMERIC_COLUMN_COUNT,
    };
    use crate::record::tests::reference_record;

    #[test]
    fn test_encoded_width_is_numeric_plus_one_per_categorical() {
        let encoded = encode(&features::derive(&reference_record()));
        assert_eq!(encoded.len(), NUMERIC_COLUMN_COUNT + CATEGORICAL_COLUMN_COUNT);
    }

    #[test]
    fn test_every_categorical_column_is_expanded_once() {
        let features = features::derive(&reference_record());
        let encoded = encode(&features);
        for (field, value) in features.categorical_columns() {
            let hot: Vec<_> = encoded
                .iter()
                .filter(|(name, _)| *name == one_hot_name(field, &value))
                .collect();
            assert_eq!(hot.len(), 1, "column {field}");
            assert_eq!(encoded.get(field), None, "raw {field} leaked as a number");
        }
    }

    #[test]
    fn test_numeric_columns_pass_through() {
        let encoded = encode(&features::derive(&reference_record()));
        assert_eq!(encoded.get(FIRST_TERM_GPA), Some(3.0));
        let avg = encoded.get(AVG_FIRST_YEAR_GPA).unwrap();
        assert!((avg - 3.1).abs() < 1e-12);
    }

    #[test]
    fn test_categoricals_become_named_one_hot_columns() {
        let encoded = encode(&features::derive(&reference_record()));
        for name in [
            "FirstLanguage_1",
            "Funding_1",
            "School_1",
            "FastTrack_2",
            "Coop_2",
            "Residency_1",
            "Gender_1",
            "PrevEducation_1",
            "AgeGroup_1",
            "EnglishGrade_6",
            "HSMark_Bin_3",
            "Funding_School_1_1",
            "AgeGroup_Residency_1_1",
        ] {
            assert_eq!(encoded.get(name), Some(1.0), "column {name}");
        }
        // The raw code never reaches the model as a number.
        assert_eq!(encoded.get("Funding"), None);
    }

    #[test]
    fn test_unseen_category_still_produces_a_column() {
        let mut record = reference_record();
        record.school = 42;
        let encoded = encode(&features::derive(&record));
        assert_eq!(encoded.get("School_42"), Some(1.0));
        assert_eq!(encoded.get("Funding_School_1_42"), Some(1.0));
    }
}
