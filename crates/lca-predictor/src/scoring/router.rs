use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::error;

use super::bulk::{BulkError, BulkProcessor, BulkResultRow};
use super::model::{Attribution, Inference};
use super::recommendations::NOTHING_TO_SUGGEST;
use super::record::{parse_number, ApplicationRecord};
use super::scorecard::Scorecard;
use super::service::{Assessment, Outlook, ScoringService};
use super::status::StageStatus;

#[derive(Clone)]
pub(crate) struct ScoringState {
    service: Arc<ScoringService>,
    bulk: Arc<BulkProcessor>,
}

/// Router exposing single predictions, wage comparisons, and bulk uploads.
pub fn scoring_router(service: Arc<ScoringService>, export_dir: impl Into<PathBuf>) -> Router {
    let state = ScoringState {
        bulk: Arc::new(BulkProcessor::new(service.clone(), export_dir)),
        service,
    };

    Router::new()
        .route("/api/v1/predict", post(predict_handler))
        .route("/api/v1/wage/compare", post(wage_compare_handler))
        .route("/api/v1/bulk", post(bulk_handler))
        .with_state(state)
}

/// Wire view of an [`Assessment`].
#[derive(Debug, Clone, Serialize)]
pub struct PredictionView {
    pub probability: f64,
    pub probability_percent: f64,
    pub outlook: Outlook,
    pub base: Inference,
    pub features: StageStatus,
    pub attribution: Attribution,
    pub rule_notes: Vec<&'static str>,
    pub scorecard: Scorecard,
    pub recommendations: Vec<String>,
    pub validation: Vec<&'static str>,
}

impl From<Assessment> for PredictionView {
    fn from(assessment: Assessment) -> Self {
        let recommendations = if assessment.recommendations.is_empty() {
            vec![NOTHING_TO_SUGGEST.to_string()]
        } else {
            assessment.recommendations.clone()
        };

        Self {
            probability: assessment.probability(),
            probability_percent: assessment.probability_percent(),
            outlook: assessment.outlook,
            rule_notes: assessment.adjustment.notes().collect(),
            base: assessment.inference,
            features: assessment.features,
            attribution: assessment.attribution,
            scorecard: assessment.scorecard,
            recommendations,
            validation: assessment.validation,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WageQuery {
    #[serde(alias = "soc", alias = "soc_code", alias = "SOC_CODE")]
    pub occupation_code: String,
    #[serde(alias = "worksite_state", alias = "WORKSITE_STATE")]
    pub state: String,
    pub wage: Value,
    #[serde(default = "default_unit", alias = "wage_unit")]
    pub unit: String,
}

fn default_unit() -> String {
    "Year".to_string()
}

impl WageQuery {
    /// Offered wage as a number; NaN when it cannot be read.
    pub fn offered_value(&self) -> f64 {
        match &self.wage {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => parse_number(text),
            _ => None,
        }
        .unwrap_or(f64::NAN)
    }
}

#[derive(Debug, Serialize)]
struct BulkView<'a> {
    file_name: &'a str,
    rows: usize,
    errors: usize,
    preview: &'a [BulkResultRow],
}

pub(crate) async fn predict_handler(
    State(state): State<ScoringState>,
    axum::Json(record): axum::Json<ApplicationRecord>,
) -> Response {
    // Scoring appends to the submission log with blocking file I/O.
    let service = state.service.clone();
    match tokio::task::spawn_blocking(move || service.predict(record)).await {
        Ok(assessment) => {
            (StatusCode::OK, axum::Json(PredictionView::from(assessment))).into_response()
        }
        Err(join_error) => {
            error!(error = %join_error, "prediction worker panicked");
            let payload = json!({
                "error": "prediction failed",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn wage_compare_handler(
    State(state): State<ScoringState>,
    axum::Json(query): axum::Json<WageQuery>,
) -> Response {
    let comparison = state.service.compare_wage(
        &query.occupation_code,
        &query.state,
        query.offered_value(),
        &query.unit,
    );
    (StatusCode::OK, axum::Json(comparison)).into_response()
}

pub(crate) async fn bulk_handler(State(state): State<ScoringState>, body: Bytes) -> Response {
    let bulk = state.bulk.clone();
    let outcome = tokio::task::spawn_blocking(move || bulk.process(&body)).await;

    match outcome {
        Ok(Ok(outcome)) => {
            let view = BulkView {
                file_name: &outcome.file_name,
                rows: outcome.rows.len(),
                errors: outcome.error_count(),
                preview: outcome.preview(),
            };
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Ok(Err(BulkError::Csv(err))) => {
            let payload = json!({
                "error": format!("invalid csv upload: {err}"),
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        Ok(Err(other)) => {
            error!(error = %other, "bulk upload failed");
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
        Err(join_error) => {
            error!(error = %join_error, "bulk worker panicked");
            let payload = json!({
                "error": "bulk processing failed",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
