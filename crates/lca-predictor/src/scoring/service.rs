use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::artifacts::{ArtifactBundle, ArtifactError};
use super::audit::{Submission, SubmissionLog};
use super::features::FeaturePreparer;
use super::model::{Attribution, AttributionEngine, Inference, InferenceEngine};
use super::recommendations::{GuideCatalogue, RecommendationComposer};
use super::record::{ApplicationRecord, RecordFlags};
use super::rules::{self, RuleAdjustment};
use super::scorecard::{self, Scorecard};
use super::status::StageStatus;
use super::validation;
use super::wage::{round_to, WageBenchmarkIndex, WageComparison, WageIndexError};
use crate::config::ArtifactConfig;

#[derive(Debug, thiserror::Error)]
pub enum ScoringInitError {
    #[error(transparent)]
    Artifacts(#[from] ArtifactError),
    #[error(transparent)]
    WageIndex(#[from] WageIndexError),
}

/// Coarse approval outlook derived from the adjusted probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outlook {
    #[serde(rename = "High chance of approval")]
    LikelyApproved,
    #[serde(rename = "Moderate likelihood of approval")]
    Moderate,
    #[serde(rename = "High chance of denial")]
    LikelyDenied,
}

impl Outlook {
    pub fn from_probability(probability: f64) -> Self {
        if probability > 0.75 {
            Outlook::LikelyApproved
        } else if probability > 0.45 {
            Outlook::Moderate
        } else {
            Outlook::LikelyDenied
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Outlook::LikelyApproved => "High chance of approval",
            Outlook::Moderate => "Moderate likelihood of approval",
            Outlook::LikelyDenied => "High chance of denial",
        }
    }
}

/// Everything the pipeline knows about one application.
#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub features: StageStatus,
    pub inference: Inference,
    pub attribution: Attribution,
    pub adjustment: RuleAdjustment,
    pub scorecard: Scorecard,
    pub recommendations: Vec<String>,
    pub outlook: Outlook,
    pub validation: Vec<&'static str>,
}

impl Assessment {
    /// Final probability after rule adjustments.
    pub fn probability(&self) -> f64 {
        self.adjustment.probability
    }

    pub fn probability_percent(&self) -> f64 {
        round_to(self.probability() * 100.0, 2)
    }
}

/// Composes every scoring stage over immutable, shared artifacts.
pub struct ScoringService {
    preparer: FeaturePreparer,
    inference: InferenceEngine,
    attribution: AttributionEngine,
    composer: RecommendationComposer,
    wages: Arc<WageBenchmarkIndex>,
    submissions: Option<Arc<dyn SubmissionLog>>,
}

impl ScoringService {
    pub fn new(bundle: ArtifactBundle, wages: WageBenchmarkIndex, guides: GuideCatalogue) -> Self {
        let model = bundle.model.map(Arc::new);
        Self {
            preparer: FeaturePreparer::new(
                Arc::new(bundle.schema),
                Arc::new(bundle.encoders),
                bundle.scaler.map(Arc::new),
            ),
            inference: InferenceEngine::new(model.clone(), bundle.calibrator.map(Arc::new)),
            attribution: AttributionEngine::new(model),
            composer: RecommendationComposer::new(Arc::new(guides)),
            wages: Arc::new(wages),
            submissions: None,
        }
    }

    /// Load artifacts, wage index, and guides from the configured locations.
    pub fn from_config(config: &ArtifactConfig) -> Result<Self, ScoringInitError> {
        let bundle = ArtifactBundle::load_dir(&config.models_dir)?;
        let wages = WageBenchmarkIndex::load_or_empty(&config.wage_index)?;
        let guides = GuideCatalogue::from_path(&config.guides);
        Ok(Self::new(bundle, wages, guides))
    }

    pub fn with_submission_log(mut self, log: Arc<dyn SubmissionLog>) -> Self {
        self.submissions = Some(log);
        self
    }

    /// Whether a trained model is loaded; scoring still runs without one.
    pub fn is_model_loaded(&self) -> bool {
        self.inference.is_loaded()
    }

    pub fn wages(&self) -> &WageBenchmarkIndex {
        &self.wages
    }

    /// Run the full pipeline. Every stage degrades instead of failing.
    pub fn assess(&self, record: &ApplicationRecord) -> Assessment {
        let prepared = self.preparer.prepare(record);
        let inference = self.inference.predict(&prepared.vector);
        let attribution = self.attribution.explain(&prepared.vector);
        let adjustment = rules::adjust(record, inference.probability);
        let scorecard = scorecard::score(record, None);
        let flags = RecordFlags::from_record(record);
        let recommendations =
            self.composer
                .compose(&adjustment.suggestions, &attribution.contributions, &flags);

        debug!(
            features = prepared.status.label(),
            inference = inference.status.label(),
            attribution = ?attribution.source,
            base = inference.probability,
            adjusted = adjustment.probability,
            "assessed application"
        );

        Assessment {
            features: prepared.status,
            outlook: Outlook::from_probability(adjustment.probability),
            validation: validation::basic_notes(record),
            inference,
            attribution,
            adjustment,
            scorecard,
            recommendations,
        }
    }

    /// Assess a single interactive submission and append it to the audit log.
    pub fn predict(&self, record: ApplicationRecord) -> Assessment {
        let assessment = self.assess(&record);
        if let Some(log) = &self.submissions {
            let submission = Submission::new(record, assessment.probability());
            if let Err(err) = log.append(&submission) {
                warn!(error = %err, "failed to record submission");
            }
        }
        assessment
    }

    pub fn compare_wage(
        &self,
        occupation_code: &str,
        state: &str,
        offered_value: f64,
        offered_unit: &str,
    ) -> WageComparison {
        self.wages
            .compare(occupation_code, state, offered_value, offered_unit)
    }
}
