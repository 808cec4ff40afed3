//! # Schema Alignment
//!
//! The training schema is the authoritative, ordered list of columns the classifier
//! consumes. It is compiled once into a [`ColumnIndex`] so that aligning a request
//! is a lookup-and-write into a zeroed vector of exactly the schema's width:
//!
//! - schema columns present in the encoded record receive their value,
//! - schema columns the request did not produce stay 0 (an unseen category
//!   contributes nothing),
//! - encoded columns unknown to the schema are dropped.

use crate::encode::EncodedRecord;
use ndarray::Array1;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("The training schema is empty.")]
    Empty,
    #[error("Column '{name}' appears more than once in the training schema (positions {first} and {second}).")]
    DuplicateColumn {
        name: String,
        first: usize,
        second: usize,
    },
}

/// Static column-name to position table built from the training schema.
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    /// Compiles an ordered schema. Names must be unique.
    pub fn new(names: Vec<String>) -> Result<Self, SchemaError> {
        if names.is_empty() {
            return Err(SchemaError::Empty);
        }
        let mut positions = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            match positions.entry(name.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(i);
                }
                Entry::Occupied(existing) => {
                    return Err(SchemaError::DuplicateColumn {
                        name: name.clone(),
                        first: *existing.get(),
                        second: i,
                    });
                }
            }
        }
        Ok(Self { names, positions })
    }

    /// Number of columns the classifier expects.
    pub fn width(&self) -> usize {
        self.names.len()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Projects an encoded record onto the schema. The result is always `width()` long.
    pub fn align(&self, encoded: &EncodedRecord) -> Array1<f64> {
        let mut aligned = Array1::zeros(self.width());
        for (name, value) in encoded.iter() {
            match self.position(name) {
                Some(i) => aligned[i] = value,
                None => log::debug!("Dropping column '{name}': not part of the training schema"),
            }
        }
        aligned
    }
}
