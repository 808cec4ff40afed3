//! # Artifact Loading
//!
//! The classifier, scaler and training schema are produced offline and read from a
//! base directory. Each artifact has a primary filename and one fallback, so a
//! re-export under the conventional name works without renaming.
//!
//! Loading is owned by [`ArtifactStore`], which tracks an explicit load state:
//!
//! - `Unloaded` to `Loaded` on success, `Unloaded` to `Failed` on any error,
//! - `Failed` to `Loaded` when a later attempt succeeds (every prediction retries
//!   while not loaded),
//! - nothing leaves `Loaded`; artifacts are immutable once in memory.
//!
//! The check-and-load runs under a mutex so concurrent first requests load once.
//! Whether the store is loaded can be read without that mutex, so status probes
//! never wait behind a load in progress.

use crate::align::{ColumnIndex, SchemaError};
use crate::classifier::{Classifier, DenseNetwork, ModelError};
use crate::scaler::{BoundScaler, ScalerError, ScalerParams};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Classifier filenames, primary first.
pub const CLASSIFIER_FILES: [&str; 2] = ["student_retention_model.toml", "model.toml"];
/// Scaler filenames, primary first.
pub const SCALER_FILES: [&str; 2] = ["scaler.toml", "feature_scaler.toml"];
/// Training schema filenames, primary first.
pub const SCHEMA_FILES: [&str; 2] = ["model_features.json", "feature_names.json"];

#[derive(Error, Debug)]
pub enum ArtifactLoadError {
    #[error("No {artifact} file found in '{}' (tried {})", .dir.display(), .tried.join(", "))]
    NotFound {
        artifact: &'static str,
        dir: PathBuf,
        tried: Vec<&'static str>,
    },
    #[error("Failed to load classifier from '{}': {source}", .path.display())]
    Classifier { path: PathBuf, source: ModelError },
    #[error("Failed to load scaler from '{}': {source}", .path.display())]
    Scaler { path: PathBuf, source: ScalerError },
    #[error("Failed to read training schema '{}': {source}", .path.display())]
    SchemaRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Training schema '{}' is not a JSON array of column names: {source}", .path.display())]
    SchemaParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Training schema '{}' is invalid: {source}", .path.display())]
    Schema { path: PathBuf, source: SchemaError },
    #[error("Scaler does not match the training schema: {0}")]
    ScalerSchemaSkew(#[source] ScalerError),
}

/// The immutable artifact triplet a pipeline predicts with.
pub struct Artifacts {
    pub classifier: Box<dyn Classifier>,
    pub schema: ColumnIndex,
    pub scaler: BoundScaler,
}

impl std::fmt::Debug for Artifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifacts")
            .field("classifier_input_width", &self.classifier.input_width())
            .field("schema_width", &self.schema.width())
            .field("scaled_columns", &self.scaler.num_columns())
            .finish()
    }
}

impl Artifacts {
    /// Assembles artifacts, resolving the scaler's columns against the schema.
    pub fn new(
        classifier: Box<dyn Classifier>,
        schema: ColumnIndex,
        scaler: &ScalerParams,
    ) -> Result<Self, ArtifactLoadError> {
        let scaler = scaler
            .bind(&schema)
            .map_err(ArtifactLoadError::ScalerSchemaSkew)?;
        Ok(Self {
            classifier,
            schema,
            scaler,
        })
    }

    /// Reads all three artifacts from `dir`, trying each primary then fallback filename.
    pub fn load(dir: &Path) -> Result<Self, ArtifactLoadError> {
        let shown = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
        info!("Loading artifacts from {}...", shown.display());

        let classifier_path = resolve(dir, "classifier", &CLASSIFIER_FILES)?;
        let scaler_path = resolve(dir, "scaler", &SCALER_FILES)?;
        let schema_path = resolve(dir, "training schema", &SCHEMA_FILES)?;

        let network =
            DenseNetwork::load(&classifier_path).map_err(|source| ArtifactLoadError::Classifier {
                path: classifier_path.clone(),
                source,
            })?;
        let scaler =
            ScalerParams::load(&scaler_path).map_err(|source| ArtifactLoadError::Scaler {
                path: scaler_path.clone(),
                source,
            })?;
        let schema = load_schema(&schema_path)?;

        info!(
            "Classifier expects {} inputs; schema has {} columns; scaler covers {} columns.",
            network.input_width,
            schema.width(),
            scaler.columns.len()
        );

        Self::new(Box::new(network), schema, &scaler)
    }
}

/// Picks the first candidate filename that exists in `dir`.
fn resolve(
    dir: &Path,
    artifact: &'static str,
    candidates: &[&'static str],
) -> Result<PathBuf, ArtifactLoadError> {
    for (i, name) in candidates.iter().enumerate() {
        let path = dir.join(name);
        if path.is_file() {
            if i > 0 {
                info!(
                    "Primary {artifact} file '{}' absent; using fallback '{name}'",
                    candidates[0]
                );
            }
            info!("Resolved {artifact}: {}", path.display());
            return Ok(path);
        }
    }
    Err(ArtifactLoadError::NotFound {
        artifact,
        dir: dir.to_path_buf(),
        tried: candidates.to_vec(),
    })
}

fn load_schema(path: &Path) -> Result<ColumnIndex, ArtifactLoadError> {
    let text = fs::read_to_string(path).map_err(|source| ArtifactLoadError::SchemaRead {
        path: path.to_path_buf(),
        source,
    })?;
    let names: Vec<String> =
        serde_json::from_str(&text).map_err(|source| ArtifactLoadError::SchemaParse {
            path: path.to_path_buf(),
            source,
        })?;
    ColumnIndex::new(names).map_err(|source| ArtifactLoadError::Schema {
        path: path.to_path_buf(),
        source,
    })
}

/// Observable load state of an [`ArtifactStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Unloaded,
    Loaded,
    Failed,
}

enum LoadState {
    Unloaded,
    Loaded(Arc<Artifacts>),
    Failed(Arc<ArtifactLoadError>),
}

/// Owns the artifact triplet and its load state for the life of the process.
pub struct ArtifactStore {
    dir: PathBuf,
    state: Mutex<LoadState>,
    loaded: AtomicBool,
}

impl ArtifactStore {
    /// A store that will load from `dir` on first use.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            state: Mutex::new(LoadState::Unloaded),
            loaded: AtomicBool::new(false),
        }
    }

    /// A store that already holds artifacts and never touches the filesystem.
    pub fn preloaded(artifacts: Artifacts) -> Self {
        Self {
            dir: PathBuf::new(),
            state: Mutex::new(LoadState::Loaded(Arc::new(artifacts))),
            loaded: AtomicBool::new(true),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn status(&self) -> LoadStatus {
        match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            LoadState::Unloaded => LoadStatus::Unloaded,
            LoadState::Loaded(_) => LoadStatus::Loaded,
            LoadState::Failed(_) => LoadStatus::Failed,
        }
    }

    /// Lock-free; safe to call from async handlers while a load is running.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Returns the loaded artifacts, attempting a load first if none are held.
    ///
    /// A failure is recorded, logged, and returned; the next call tries again.
    pub fn ensure_loaded(&self) -> Result<Arc<Artifacts>, Arc<ArtifactLoadError>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let LoadState::Loaded(artifacts) = &*state {
            return Ok(Arc::clone(artifacts));
        }

        match Artifacts::load(&self.dir) {
            Ok(artifacts) => {
                info!("Artifacts loaded successfully.");
                let artifacts = Arc::new(artifacts);
                *state = LoadState::Loaded(Arc::clone(&artifacts));
                self.loaded.store(true, Ordering::Release);
                Ok(artifacts)
            }
            Err(e) => {
                warn!("Error loading artifacts: {e}");
                let e = Arc::new(e);
                *state = LoadState::Failed(Arc::clone(&e));
                Err(e)
            }
        }
    }

    /// The error from the most recent failed attempt, if the store is in `Failed`.
    pub fn last_error(&self) -> Option<Arc<ArtifactLoadError>> {
        match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            LoadState::Failed(e) => Some(Arc::clone(e)),
            LoadState::Unloaded | LoadState::Loaded(_) => None,
        }
    }
}
