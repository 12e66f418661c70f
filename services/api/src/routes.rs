use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use lca_predictor::scoring::{scoring_router, ScoringService};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

pub(crate) fn with_scoring_routes(
    service: Arc<ScoringService>,
    export_dir: PathBuf,
) -> axum::Router {
    scoring_router(service, export_dir)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use lca_predictor::scoring::{ArtifactBundle, GuideCatalogue, WageBenchmarkIndex};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    fn app(readiness: Arc<AtomicBool>, export_dir: PathBuf) -> axum::Router {
        let service = Arc::new(ScoringService::new(
            ArtifactBundle::empty(),
            WageBenchmarkIndex::default(),
            GuideCatalogue::default(),
        ));
        let state = AppState {
            readiness,
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_scoring_routes(service, export_dir).layer(Extension(state))
    }

    async fn get(router: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        let export = tempfile::tempdir().expect("tempdir");
        let router = app(Arc::new(AtomicBool::new(false)), export.path().to_path_buf());

        let (status, body) = get(router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_follows_the_startup_flag() {
        let export = tempfile::tempdir().expect("tempdir");
        let readiness = Arc::new(AtomicBool::new(false));
        let router = app(readiness.clone(), export.path().to_path_buf());

        let (status, body) = get(router.clone(), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "initializing");

        readiness.store(true, Ordering::Release);
        let (status, body) = get(router, "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
    }

    #[tokio::test]
    async fn scoring_routes_are_mounted() {
        let export = tempfile::tempdir().expect("tempdir");
        let router = app(Arc::new(AtomicBool::new(true)), export.path().to_path_buf());

        let response = router
            .oneshot(
                Request::post("/api/v1/wage/compare")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"soc":"15-1252","state":"FL","wage":"100000"}"#,
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }
}
