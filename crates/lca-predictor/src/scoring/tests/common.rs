use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::scoring::artifacts::{
    ArtifactBundle, CategoricalEncoders, FeatureSchema, StandardScaler, Vocabulary,
};
use crate::scoring::audit::{AuditError, Submission, SubmissionLog};
use crate::scoring::model::TreeEnsemble;
use crate::scoring::recommendations::GuideCatalogue;
use crate::scoring::record::{ApplicationRecord, Field};
use crate::scoring::service::ScoringService;
use crate::scoring::wage::{BenchmarkKey, WageBenchmarkEntry, WageBenchmarkIndex};

pub(super) const FEATURES: [&str; 4] = [
    "FULL_TIME_POSITION",
    "VISA_CLASS",
    "WAGE_RATE_OF_PAY_FROM",
    "PREVAILING_WAGE",
];

pub(super) const FULL_TIME_TIP: &str =
    "Ensure the role is full-time to improve visa approval chances.";
pub(super) const FULL_TIME_GUIDE: &str = "Offer a full-time schedule where the role allows it.";

/// Single stump on FULL_TIME_POSITION: -1 below 0.5, +1 otherwise.
pub(super) fn model_document() -> Value {
    json!({
        "learner": {
            "feature_names": FEATURES,
            "learner_model_param": { "base_score": "5E-1", "num_feature": "4" },
            "objective": { "name": "binary:logistic" },
            "gradient_booster": {
                "name": "gbtree",
                "model": {
                    "trees": [{
                        "left_children": [1, -1, -1],
                        "right_children": [2, -1, -1],
                        "split_indices": [0, 0, 0],
                        "split_conditions": [0.5, -1.0, 1.0],
                        "default_left": [1, 0, 0],
                        "sum_hessian": [100.0, 50.0, 50.0],
                        "loss_changes": [4.0, 0.0, 0.0]
                    }]
                }
            }
        }
    })
}

pub(super) fn bundle() -> ArtifactBundle {
    let mut encoders = CategoricalEncoders::default();
    encoders.insert(
        "VISA_CLASS",
        Vocabulary::from_pairs([("H-1B", 0), ("E-3 Australian", 1), ("MISSING", 2)]),
    );

    ArtifactBundle {
        schema: FeatureSchema::new(FEATURES.iter().map(|column| column.to_string()).collect())
            .expect("valid schema"),
        encoders,
        scaler: Some(
            StandardScaler::new(vec!["PREVAILING_WAGE".to_string()], vec![100_000.0], vec![20_000.0])
                .expect("valid scaler"),
        ),
        model: Some(TreeEnsemble::from_xgboost_json(model_document()).expect("valid model")),
        calibrator: None,
    }
}

pub(super) fn wage_index() -> WageBenchmarkIndex {
    WageBenchmarkIndex::from_entries([(
        BenchmarkKey::new("15-1252", "FL"),
        WageBenchmarkEntry {
            median: 100_000.0,
            p25: 90_000.0,
            p75: 130_000.0,
            n: 42,
        },
    )])
    .expect("unique keys")
}

pub(super) fn guides() -> GuideCatalogue {
    GuideCatalogue::from_map(HashMap::from([(
        "not_full_time".to_string(),
        vec![FULL_TIME_GUIDE.to_string()],
    )]))
}

pub(super) fn service() -> ScoringService {
    ScoringService::new(bundle(), wage_index(), guides())
}

pub(super) fn compliant_record() -> ApplicationRecord {
    ApplicationRecord::builder()
        .with(Field::VisaClass, "H-1B")
        .with(Field::JobTitle, "Software Engineer")
        .with(Field::SocCode, "15-1252")
        .with(Field::EmployerName, "Initech")
        .with(Field::EmployerState, "CA")
        .with(Field::WorksiteState, "FL")
        .with(Field::FullTimePosition, "Y")
        .with(Field::WageRateOfPayFrom, "120000")
        .with(Field::WageUnitOfPay, "Year")
        .with(Field::PrevailingWage, "100000")
        .with(Field::AgreeToLcStatement, "Y")
        .with(Field::BeginDate, "2025-01-01")
        .with(Field::EndDate, "2026-01-01")
        .build()
}

pub(super) fn part_time_record() -> ApplicationRecord {
    let mut builder = ApplicationRecord::builder();
    for (field, value) in compliant_record().iter() {
        builder.set(field, value);
    }
    builder.set(Field::FullTimePosition, "N");
    builder.build()
}

pub(super) fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

#[derive(Default)]
pub(super) struct MemorySubmissions {
    pub(super) rows: Mutex<Vec<Submission>>,
}

impl SubmissionLog for MemorySubmissions {
    fn append(&self, submission: &Submission) -> Result<(), AuditError> {
        self.rows
            .lock()
            .map_err(|_| AuditError::Unavailable("poisoned".to_string()))?
            .push(submission.clone());
        Ok(())
    }
}

pub(super) struct FailingSubmissions;

impl SubmissionLog for FailingSubmissions {
    fn append(&self, _submission: &Submission) -> Result<(), AuditError> {
        Err(AuditError::Unavailable("disk detached".to_string()))
    }
}

pub(super) fn shared_service_with_log() -> (Arc<ScoringService>, Arc<MemorySubmissions>) {
    let submissions = Arc::new(MemorySubmissions::default());
    let service = service().with_submission_log(submissions.clone());
    (Arc::new(service), submissions)
}
