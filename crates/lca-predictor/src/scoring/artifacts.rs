//! Loading of the trained artifact bundle produced by the offline training job.
//!
//! Every file is optional. A missing file is logged and the consuming component
//! degrades; a file that exists but cannot be decoded is an error at startup.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{info, warn};

use super::model::{Calibrator, TreeEnsemble};

pub const METADATA_FILE: &str = "metadata.json";
pub const ENCODER_FILE: &str = "feature_encoder.json";
pub const SCALER_FILE: &str = "feature_scaler.json";
pub const MODEL_FILE: &str = "xgb_final.json";
pub const CALIBRATOR_FILE: &str = "prob_calibrator.json";

/// Sentinel used for absent raw values and as the vocabulary fallback key.
pub const MISSING_TOKEN: &str = "MISSING";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to read artifact {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("artifact {path} is not valid: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("feature list repeats column '{0}'")]
    DuplicateFeature(String),
    #[error("scaler lists {columns} columns but {means} means and {scales} scales")]
    ScalerShape {
        columns: usize,
        means: usize,
        scales: usize,
    },
    #[error("model artifact is inconsistent: {0}")]
    Model(String),
    #[error("calibrator artifact is inconsistent: {0}")]
    Calibrator(String),
}

/// Ordered feature columns the model was trained on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Result<Self, ArtifactError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(ArtifactError::DuplicateFeature(column.clone()));
            }
        }
        Ok(Self { columns })
    }

    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct MetadataFile {
    #[serde(default)]
    features: Vec<String>,
}

/// Closed vocabulary for one categorical column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Vocabulary {
    codes: HashMap<String, i64>,
}

impl Vocabulary {
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, i64)>,
        K: Into<String>,
    {
        Self {
            codes: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Code for `value`, else the vocabulary's own MISSING code, else 0.
    pub fn encode(&self, value: &str) -> i64 {
        self.codes
            .get(value)
            .or_else(|| self.codes.get(MISSING_TOKEN))
            .copied()
            .unwrap_or(0)
    }
}

/// Per-column categorical encoders keyed by feature column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct CategoricalEncoders {
    columns: HashMap<String, Vocabulary>,
}

impl CategoricalEncoders {
    pub fn insert(&mut self, column: impl Into<String>, vocabulary: Vocabulary) {
        self.columns.insert(column.into(), vocabulary);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Vocabulary)> {
        self.columns
            .iter()
            .map(|(column, vocabulary)| (column.as_str(), vocabulary))
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Standardizing transform fitted on the numeric training columns.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "ScalerFile")]
pub struct StandardScaler {
    columns: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ScalerFile {
    columns: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl TryFrom<ScalerFile> for StandardScaler {
    type Error = ArtifactError;

    fn try_from(file: ScalerFile) -> Result<Self, Self::Error> {
        Self::new(file.columns, file.mean, file.scale)
    }
}

impl StandardScaler {
    pub fn new(columns: Vec<String>, mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ArtifactError> {
        if columns.len() != mean.len() || columns.len() != scale.len() {
            return Err(ArtifactError::ScalerShape {
                columns: columns.len(),
                means: mean.len(),
                scales: scale.len(),
            });
        }
        Ok(Self {
            columns,
            mean,
            scale,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Standardize `value` for the column at `index`. A zero scale only centres.
    pub fn transform(&self, index: usize, value: f64) -> f64 {
        let centred = value - self.mean[index];
        let scale = self.scale[index];
        if scale == 0.0 || !scale.is_finite() {
            centred
        } else {
            centred / scale
        }
    }
}

/// Everything the offline training job hands to the serving path.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub schema: FeatureSchema,
    pub encoders: CategoricalEncoders,
    pub scaler: Option<StandardScaler>,
    pub model: Option<TreeEnsemble>,
    pub calibrator: Option<Calibrator>,
}

impl ArtifactBundle {
    pub fn empty() -> Self {
        Self {
            schema: FeatureSchema::empty(),
            encoders: CategoricalEncoders::default(),
            scaler: None,
            model: None,
            calibrator: None,
        }
    }

    /// Load whichever artifacts exist under `dir`.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let dir = dir.as_ref();

        let schema = match read_optional::<MetadataFile>(&dir.join(METADATA_FILE))? {
            Some(metadata) => FeatureSchema::new(metadata.features)?,
            None => FeatureSchema::empty(),
        };
        let encoders =
            read_optional::<CategoricalEncoders>(&dir.join(ENCODER_FILE))?.unwrap_or_default();
        let scaler = read_optional::<StandardScaler>(&dir.join(SCALER_FILE))?;
        let model = match read_optional::<serde_json::Value>(&dir.join(MODEL_FILE))? {
            Some(document) => Some(TreeEnsemble::from_xgboost_json(document)?),
            None => None,
        };
        let calibrator = read_optional::<Calibrator>(&dir.join(CALIBRATOR_FILE))?;

        info!(
            models_dir = %dir.display(),
            features = schema.columns().len(),
            encoded_columns = encoders.columns.len(),
            scaler = scaler.is_some(),
            model = model.is_some(),
            calibrator = calibrator.is_some(),
            "loaded trained artifact bundle"
        );

        Ok(Self {
            schema,
            encoders,
            scaler,
            model,
            calibrator,
        })
    }
}

fn read_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ArtifactError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(source) if source.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "artifact missing; component will degrade");
            return Ok(None);
        }
        Err(source) => {
            return Err(ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| ArtifactError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_falls_back_to_missing_then_zero() {
        let with_missing = Vocabulary::from_pairs([("H-1B", 0), ("E-3", 1), (MISSING_TOKEN, 7)]);
        assert_eq!(with_missing.encode("E-3"), 1);
        assert_eq!(with_missing.encode("H-1B1 Chile"), 7);

        let without_missing = Vocabulary::from_pairs([("CA", 3)]);
        assert_eq!(without_missing.encode("TX"), 0);
    }

    #[test]
    fn schema_rejects_duplicate_columns() {
        let error = FeatureSchema::new(vec!["JOB_TITLE".into(), "JOB_TITLE".into()])
            .expect_err("duplicates rejected");
        assert!(matches!(error, ArtifactError::DuplicateFeature(column) if column == "JOB_TITLE"));
    }

    #[test]
    fn scaler_rejects_mismatched_lengths() {
        let result: Result<StandardScaler, _> = serde_json::from_value(serde_json::json!({
            "columns": ["PREVAILING_WAGE", "DURATION_DAYS"],
            "mean": [90000.0],
            "scale": [20000.0, 300.0]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn load_dir_tolerates_missing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join(METADATA_FILE),
            r#"{"features": ["VISA_CLASS", "PREVAILING_WAGE"]}"#,
        )
        .expect("write metadata");

        let bundle = ArtifactBundle::load_dir(dir.path()).expect("bundle loads");
        assert_eq!(bundle.schema.columns(), ["VISA_CLASS", "PREVAILING_WAGE"]);
        assert!(bundle.encoders.is_empty());
        assert!(bundle.scaler.is_none());
        assert!(bundle.model.is_none());
        assert!(bundle.calibrator.is_none());
    }

    #[test]
    fn load_dir_reports_malformed_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(ENCODER_FILE), "{not json").expect("write encoder");

        let error = ArtifactBundle::load_dir(dir.path()).expect_err("decode error");
        assert!(matches!(error, ArtifactError::Decode { .. }));
    }
}
