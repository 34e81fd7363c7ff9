//! 看板 HTTP 路由

use crate::dashboard::render::render_page;
use crate::dashboard::state::DashboardState;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<DashboardState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/progress", get(progress))
        .route("/healthz", get(healthz))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

/// 取數失敗時回 502，頁面仍會自動重新整理
async fn index(Extension(state): Extension<Arc<DashboardState>>) -> Response {
    let snapshot = state.snapshot().await;
    let html = render_page(&snapshot, state.refresh_seconds());
    let status = if snapshot.is_error() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };
    (status, Html(html)).into_response()
}

async fn progress(Extension(state): Extension<Arc<DashboardState>>) -> Response {
    let snapshot = state.snapshot().await;
    let status = if snapshot.is_error() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };
    (status, Json(snapshot.as_ref().clone())).into_response()
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::baseline::Baseline;
    use crate::domain::model::{ApiResponse, FetchOutcome, RankOutcome};
    use crate::domain::ports::ProgressSource;
    use crate::utils::error::{MonitorError, Result};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    struct StubSource {
        body: Option<Value>,
    }

    #[async_trait]
    impl ProgressSource for StubSource {
        async fn progress_snapshot(&self, _target_date: &str) -> Result<ApiResponse> {
            match &self.body {
                Some(body) => Ok(ApiResponse {
                    http_status: 200,
                    body: body.clone(),
                    size: 0,
                    elapsed_ms: 1,
                }),
                None => Err(MonitorError::ApiResponseError {
                    message: "upstream down".to_string(),
                }),
            }
        }

        async fn fetch_progress(&self, target_date: &str) -> FetchOutcome {
            FetchOutcome::failed(target_date.to_string(), "unused".to_string())
        }

        async fn fetch_sorter_rank(&self, start: &str, end: &str) -> RankOutcome {
            RankOutcome::failed((start.to_string(), end.to_string()), "unused".to_string())
        }
    }

    fn app(body: Option<Value>) -> Router {
        let state = DashboardState::new(
            Arc::new(StubSource { body }),
            Baseline::default(),
            None,
            2.0,
            18,
            Duration::from_secs(30),
        );
        router(Arc::new(state))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn ok_body() -> Value {
        json!({"code": 0, "msg": "ok", "data": {"total_schedule": {"total_count": 50, "finished_count": 25}}})
    }

    #[tokio::test]
    async fn test_healthz() {
        let (status, body) = get(app(None), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_index_renders_html() {
        let (status, body) = get(app(Some(ok_body())), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("http-equiv=\"refresh\""));
        assert!(body.contains("50.0%"));
    }

    #[tokio::test]
    async fn test_progress_json() {
        let (status, body) = get(app(Some(ok_body())), "/api/progress").await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["stats"]["total_tasks"], 50);
        assert_eq!(json["comparison"]["status"], "NO_BASELINE");
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_returns_bad_gateway() {
        let (status, body) = get(app(None), "/").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.contains("無法取得分揀進度"));

        let (status, _) = get(app(None), "/api/progress").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
}
