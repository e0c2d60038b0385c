//! Model artifact storage
//!
//! Files are written to a temporary sibling, synced and renamed into place,
//! so a concurrent reader sees either the previous artifact or the new one.

use crate::config::HyperparameterSet;
use crate::error::{ForecastError, Result};
use crate::models::decomposition::FittedDecomposition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bumped whenever the encoded layout of [`ModelArtifact`] changes
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Replace `path` with `bytes` via a temporary file in the same directory
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| {
            ForecastError::ValidationError(format!("'{}' is not a file path", path.display()))
        })?
        .to_string_lossy();
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;

    debug!(path = %path.display(), bytes = bytes.len(), "Atomic write complete");
    Ok(())
}

/// Persisted fitted model plus the context it was trained in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub saved_at: DateTime<Utc>,
    pub asset: String,
    pub params: HyperparameterSet,
    /// Holdout MAPE of the winning candidate before the final refit
    pub validation_mape: f64,
    pub model: FittedDecomposition,
}

impl ModelArtifact {
    pub fn new(
        asset: &str,
        params: HyperparameterSet,
        validation_mape: f64,
        model: FittedDecomposition,
    ) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            saved_at: Utc::now(),
            asset: asset.to_string(),
            params,
            validation_mape,
            model,
        }
    }
}

/// Reads and writes the artifact at a fixed location
#[derive(Debug, Clone)]
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encode and atomically replace the stored artifact
    pub fn save(&self, artifact: &ModelArtifact) -> Result<()> {
        let bytes = bincode::serialize(artifact)?;
        write_atomic(&self.path, &bytes)?;
        info!(
            path = %self.path.display(),
            asset = %artifact.asset,
            params = %artifact.params,
            "Saved model artifact"
        );
        Ok(())
    }

    /// Decode the stored artifact; every failure is reported as unavailable data
    pub fn load(&self) -> Result<ModelArtifact> {
        let file = File::open(&self.path).map_err(|e| {
            ForecastError::DataUnavailable(format!(
                "Cannot open model artifact '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        let artifact: ModelArtifact = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| {
                ForecastError::DataUnavailable(format!(
                    "Cannot decode model artifact '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ForecastError::DataUnavailable(format!(
                "Model artifact '{}' has format version {}, expected {}",
                self.path.display(),
                artifact.format_version,
                ARTIFACT_FORMAT_VERSION
            )));
        }

        Ok(artifact)
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Modification time of the artifact file, if it exists
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_temp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out.txt");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_missing_artifact_is_unavailable() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("absent.bin"));
        assert!(!store.exists());
        assert!(store.last_modified().is_none());
        assert!(matches!(
            store.load(),
            Err(ForecastError::DataUnavailable(_))
        ));
    }

    #[test]
    fn test_corrupt_artifact_is_unavailable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        fs::write(&path, b"not a model").unwrap();
        let store = ModelStore::new(&path);
        assert!(store.exists());
        assert!(matches!(
            store.load(),
            Err(ForecastError::DataUnavailable(_))
        ));
    }
}
