use lca_predictor::config::AppConfig;
use lca_predictor::error::AppError;
use lca_predictor::scoring::{CsvSubmissionLog, ScoringService};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Build the shared scoring service, logging single predictions to the
/// configured submission file.
pub(crate) fn load_scoring_service(config: &AppConfig) -> Result<Arc<ScoringService>, AppError> {
    let artifacts = &config.artifacts;
    let submissions = Arc::new(CsvSubmissionLog::new(&artifacts.submission_log));
    let service = ScoringService::from_config(artifacts)?.with_submission_log(submissions);

    info!(
        model_loaded = service.is_model_loaded(),
        wage_benchmarks = service.wages().len(),
        submission_log = %artifacts.submission_log.display(),
        "scoring service initialised"
    );
    Ok(Arc::new(service))
}
