//! Artifact loading: trained model, feature schema and integrity manifest.
//!
//! The artifact directory holds:
//! - `heart_failure.json`: the tree ensemble (see [`crate::adapters::gbdt`])
//! - `feature_columns.json`: JSON array of the model's feature columns
//! - `manifest.json` (optional): `{"version": 1, "files": {name: sha256_hex}}`
//!
//! When a manifest is present every listed file must match its digest, and
//! both the model and the schema must be listed. Without one, loading
//! proceeds with a warning.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::adapters::gbdt::GbdtClassifier;
use crate::domain::{FeatureSchema, SchemaError};
use crate::ports::{Classifier, ModelError};

pub const MODEL_FILE: &str = "heart_failure.json";
pub const SCHEMA_FILE: &str = "feature_columns.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Errors while loading startup artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid feature schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("Model load failed: {0}")]
    Model(#[from] ModelError),

    #[error("Digest mismatch for {file}: manifest {expected}, actual {actual}")]
    DigestMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Manifest does not cover {0}")]
    NotInManifest(String),

    #[error("Unsupported manifest version {0}")]
    ManifestVersion(u32),

    #[error("Feature schema does not match model inputs: {0}")]
    SchemaModelMismatch(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub files: BTreeMap<String, String>,
}

/// Model and schema loaded from one artifact directory.
#[derive(Debug)]
pub struct Artifacts {
    pub model: GbdtClassifier,
    pub schema: FeatureSchema,
}

pub(crate) fn sha256_hex_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn read(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    std::fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn verify_manifest(dir: &Path) -> Result<bool, ArtifactError> {
    let path = dir.join(MANIFEST_FILE);
    if !path.exists() {
        tracing::warn!("No {MANIFEST_FILE} in {:?}; artifact digests not verified", dir);
        return Ok(false);
    }

    let manifest: Manifest =
        serde_json::from_slice(&read(&path)?).map_err(|source| ArtifactError::Json {
            path: path.clone(),
            source,
        })?;
    if manifest.version != 1 {
        return Err(ArtifactError::ManifestVersion(manifest.version));
    }

    for required in [MODEL_FILE, SCHEMA_FILE] {
        if !manifest.files.contains_key(required) {
            return Err(ArtifactError::NotInManifest(required.to_string()));
        }
    }

    for (file, expected) in &manifest.files {
        let actual = sha256_hex_bytes(&read(&dir.join(file))?);
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return Err(ArtifactError::DigestMismatch {
                file: file.clone(),
                expected: expected.clone(),
                actual,
            });
        }
    }

    tracing::info!("Verified {} artifact digests", manifest.files.len());
    Ok(true)
}

/// Load the feature schema file.
///
/// # Errors
/// Returns error if the file is unreadable, not a JSON string array, empty
/// or has duplicates.
pub fn load_schema(path: &Path) -> Result<FeatureSchema, ArtifactError> {
    let columns: Vec<String> =
        serde_json::from_slice(&read(path)?).map_err(|source| ArtifactError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(FeatureSchema::new(columns)?)
}

impl Artifacts {
    /// Verify and load the model and schema from `dir`.
    ///
    /// # Errors
    /// Returns error if verification fails, a file cannot be loaded, or the
    /// schema differs from the model's feature list.
    pub fn load(dir: &Path) -> Result<Self, ArtifactError> {
        verify_manifest(dir)?;

        let schema = load_schema(&dir.join(SCHEMA_FILE))?;
        let model = GbdtClassifier::load(&dir.join(MODEL_FILE))?;

        if schema.columns() != model.feature_names() {
            return Err(ArtifactError::SchemaModelMismatch(format!(
                "schema {:?} vs model {:?}",
                schema.columns(),
                model.feature_names()
            )));
        }

        tracing::info!("Loaded feature schema with {} columns", schema.len());
        Ok(Self { model, schema })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn bundled_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("artifacts")
    }

    fn copy_bundled(dir: &Path, with_manifest: bool) {
        let mut files = vec![MODEL_FILE, SCHEMA_FILE];
        if with_manifest {
            files.push(MANIFEST_FILE);
        }
        for file in files {
            std::fs::copy(bundled_dir().join(file), dir.join(file)).expect("copy artifact");
        }
    }

    #[test]
    fn test_bundled_artifacts_verify_and_load() {
        let artifacts = Artifacts::load(&bundled_dir()).expect("Bundled artifacts should load");
        assert_eq!(artifacts.schema.len(), 17);
        assert_eq!(artifacts.schema.columns()[0], "age");
        assert_eq!(artifacts.model.classes(), &[0, 1]);
    }

    #[test]
    fn test_loads_without_manifest() {
        let temp = tempdir().expect("tempdir");
        copy_bundled(temp.path(), false);
        assert!(!verify_manifest(temp.path()).expect("Should skip"));
        assert!(Artifacts::load(temp.path()).is_ok());
    }

    #[test]
    fn test_tampered_schema_fails_digest() {
        let temp = tempdir().expect("tempdir");
        copy_bundled(temp.path(), true);
        std::fs::write(temp.path().join(SCHEMA_FILE), r#"["age"]"#).expect("write schema");

        let err = Artifacts::load(temp.path()).expect_err("Should fail");
        assert!(matches!(err, ArtifactError::DigestMismatch { ref file, .. } if file == SCHEMA_FILE));
    }

    #[test]
    fn test_manifest_must_cover_model_and_schema() {
        let temp = tempdir().expect("tempdir");
        copy_bundled(temp.path(), false);
        let schema_bytes = std::fs::read(temp.path().join(SCHEMA_FILE)).expect("read schema");
        let manifest = Manifest {
            version: 1,
            files: BTreeMap::from([(SCHEMA_FILE.to_string(), sha256_hex_bytes(&schema_bytes))]),
        };
        std::fs::write(
            temp.path().join(MANIFEST_FILE),
            serde_json::to_vec(&manifest).expect("serialize manifest"),
        )
        .expect("write manifest");

        let err = Artifacts::load(temp.path()).expect_err("Should fail");
        assert!(matches!(err, ArtifactError::NotInManifest(ref f) if f == MODEL_FILE));
    }

    #[test]
    fn test_schema_must_match_model() {
        let temp = tempdir().expect("tempdir");
        copy_bundled(temp.path(), false);

        let mut columns: Vec<String> = load_schema(&bundled_dir().join(SCHEMA_FILE))
            .expect("Should load")
            .into();
        columns.swap(0, 1);
        std::fs::write(
            temp.path().join(SCHEMA_FILE),
            serde_json::to_vec(&columns).expect("serialize schema"),
        )
        .expect("write schema");

        let err = Artifacts::load(temp.path()).expect_err("Should fail");
        assert!(matches!(err, ArtifactError::SchemaModelMismatch(_)));
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let temp = tempdir().expect("tempdir");
        let err = Artifacts::load(&temp.path().join("nope")).expect_err("Should fail");
        assert!(matches!(err, ArtifactError::Io { .. }));
    }
}
