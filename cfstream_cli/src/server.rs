use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use cfstream_core::{ExporterError, Result};
use cfstream_metrics::MetricsRegistry;
use cfstream_scheduler::{normalize_metrics_path, HEALTH_PATH};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::error;

const HEALTH_CONTENT_TYPE: &str = "application/health+json";

#[derive(Clone)]
struct AppState {
    registry: Arc<MetricsRegistry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

impl HealthStatus {
    pub fn pass() -> Self {
        Self {
            status: "pass",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

pub fn router(registry: Arc<MetricsRegistry>, metrics_path: &str) -> Router {
    Router::new()
        .route(&normalize_metrics_path(metrics_path), get(metrics_handler))
        .route(HEALTH_PATH, get(health_check))
        .with_state(AppState { registry })
}

/// Bind the listener up front so an unusable address fails startup.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ExporterError::Bind {
            addr: addr.to_string(),
            source,
        })
}

pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    axum::serve(listener, app).await?;
    Ok(())
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.registry.render_all() {
        Ok(rendered) => (
            [(header::CONTENT_TYPE, rendered.content_type().to_string())],
            rendered.into_body(),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render metrics\n").into_response()
        }
    }
}

async fn health_check() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, HEALTH_CONTENT_TYPE)],
        Json(HealthStatus::pass()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use cfstream_metrics::registry::ACCOUNT_LABEL;
    use cfstream_metrics::STREAMING_MINUTES_VIEWED;
    use tower::ServiceExt;

    async fn get_response(app: Router, uri: &str) -> (StatusCode, String, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_endpoint_renders_registry() {
        let registry = Arc::new(MetricsRegistry::new().unwrap());
        registry
            .set_gauge(STREAMING_MINUTES_VIEWED, &[(ACCOUNT_LABEL, "Acme")], 15.0)
            .await
            .unwrap();

        let (status, content_type, body) = get_response(router(registry, "/metrics"), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/plain"));
        assert!(body.contains("# TYPE cloudflare_streaming_minutes_viewed gauge"));
        assert!(body.contains("cloudflare_streaming_minutes_viewed{account=\"Acme\"} 15"));
    }

    #[tokio::test]
    async fn test_metrics_path_is_normalized() {
        let registry = Arc::new(MetricsRegistry::new().unwrap());

        let (status, _, _) = get_response(router(registry.clone(), "metrics"), "/metrics").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, _) = get_response(router(registry, "custom"), "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let registry = Arc::new(MetricsRegistry::new().unwrap());
        let (status, content_type, body) = get_response(router(registry, "/metrics"), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, HEALTH_CONTENT_TYPE);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "pass");
    }

    #[tokio::test]
    async fn test_bind_failure_is_fatal() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap();

        let err = bind(addr).await.unwrap_err();
        assert!(matches!(err, ExporterError::Bind { .. }));
        assert!(err.is_fatal());
    }
}
