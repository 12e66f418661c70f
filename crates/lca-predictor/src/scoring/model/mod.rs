mod attribution;
mod calibration;
mod ensemble;

pub use attribution::{
    Attribution, AttributionEngine, AttributionError, AttributionMap, AttributionSource,
    Contribution,
};
pub use calibration::{CalibrationError, Calibrator};
pub use ensemble::{Objective, TreeEnsemble};

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, warn};

use super::features::FeatureVector;
use super::status::StageStatus;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum InferenceError {
    #[error("no model loaded")]
    MissingModel,
    #[error("feature columns do not match the model ({found} given, {expected} expected; missing {missing:?})")]
    FeatureMismatch {
        expected: usize,
        found: usize,
        missing: Vec<String>,
    },
    #[error("feature vector has {found} columns but the model reads {expected}")]
    TooNarrow { expected: usize, found: usize },
    #[error("model produced a non-finite probability")]
    NonFinite,
}

/// Base approval probability with the health of the stage that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inference {
    pub probability: f64,
    #[serde(flatten)]
    pub status: StageStatus,
}

impl Inference {
    fn failed(error: &InferenceError) -> Self {
        Self {
            probability: 0.0,
            status: StageStatus::Failed(error.to_string()),
        }
    }
}

/// Scores feature vectors with the shared ensemble and optional calibrator.
#[derive(Debug, Clone, Default)]
pub struct InferenceEngine {
    model: Option<Arc<TreeEnsemble>>,
    calibrator: Option<Arc<Calibrator>>,
}

impl InferenceEngine {
    pub fn new(model: Option<Arc<TreeEnsemble>>, calibrator: Option<Arc<Calibrator>>) -> Self {
        Self { model, calibrator }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Never fails outright: problems surface as a 0.0 probability with a
    /// `failed` status, or a `degraded` one when only calibration went wrong.
    pub fn predict(&self, vector: &FeatureVector) -> Inference {
        let raw = match self.raw_probability(vector) {
            Ok(raw) => raw,
            Err(err) => {
                error!(error = %err, "inference failed; reporting zero probability");
                return Inference::failed(&err);
            }
        };

        let Some(calibrator) = self.calibrator.as_deref() else {
            return Inference {
                probability: raw,
                status: StageStatus::Ok,
            };
        };

        match calibrator.apply(raw) {
            Ok(probability) => Inference {
                probability,
                status: StageStatus::Ok,
            },
            Err(err) => {
                warn!(error = %err, method = calibrator.method(), "calibration failed; using raw probability");
                Inference {
                    probability: raw,
                    status: StageStatus::Degraded(err.to_string()),
                }
            }
        }
    }

    fn raw_probability(&self, vector: &FeatureVector) -> Result<f64, InferenceError> {
        let model = self.model.as_deref().ok_or(InferenceError::MissingModel)?;
        let row = model.align(vector)?;
        let output = model.predict(&row);
        if !output.is_finite() {
            return Err(InferenceError::NonFinite);
        }
        Ok(output.clamp(0.0, 1.0))
    }
}
