//! HTTP API over the credential store

mod actor;
mod error;
mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{BoxError, Json, Router};
use serde_json::json;
use tower::timeout::error::Elapsed;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use credvault_core::Vault;

pub use actor::{RequestActor, ACTOR_HEADER};
pub use error::ApiError;
pub use handlers::DEFAULT_LOG_LIMIT;

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub vault: Arc<Vault>,
}

impl AppState {
    pub fn new(vault: Arc<Vault>) -> Self {
        Self { vault }
    }
}

/// Build the API router. Requests running longer than `request_timeout`
/// are answered with 504.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/credentials",
            get(handlers::list_credentials).post(handlers::create_credential),
        )
        .route(
            "/credentials/:id",
            get(handlers::get_credential)
                .patch(handlers::update_credential)
                .delete(handlers::delete_credential),
        )
        .route("/credentials/:id/reveal", get(handlers::reveal_credential))
        .route("/credentials/:id/validate", post(handlers::validate_credential))
        .route("/credentials/:id/test", post(handlers::test_credential))
        .route("/logs", get(handlers::list_logs))
        .route("/stats", get(handlers::usage_stats))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(HandleErrorLayer::new(handle_layer_error))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .layer(cors)
        .with_state(state)
}

async fn handle_layer_error(err: BoxError) -> Response {
    if err.is::<Elapsed>() {
        return (
            StatusCode::GATEWAY_TIMEOUT,
            Json(json!({ "error": "timeout", "message": "request timed out" })),
        )
            .into_response();
    }

    error!("Unhandled middleware error: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal", "message": err.to_string() })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use credvault_core::{Provider, ProviderProbe, Settings, StaticProbe};
    use serde_json::Value;
    use tower::ServiceExt; // for `oneshot`

    const OPENAI_KEY: &str = "sk-abcdefghijklmnopqrstuvwxyz0123456789ABCD";

    async fn test_app_with(probe: Arc<dyn ProviderProbe>, settings: Settings) -> (Router, Arc<Vault>) {
        let vault = Arc::new(Vault::in_memory(&settings, probe).await.unwrap());
        let app = router(AppState::new(vault.clone()), Duration::from_secs(60));
        (app, vault)
    }

    async fn test_app() -> Router {
        test_app_with(Arc::new(StaticProbe::accepting()), Settings::default())
            .await
            .0
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(ACTOR_HEADER, "tester@oka.tech");
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create(app: &Router, name: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/credentials",
            Some(json!({ "name": name, "provider": "openai", "secret": OPENAI_KEY })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app().await;
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vault"], "open");
    }

    #[tokio::test]
    async fn test_create_list_and_reveal() {
        let app = test_app().await;
        let id = create(&app, "Production OpenAI").await;

        let (status, list) = send(&app, Method::GET, "/credentials", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list[0]["maskedKey"], "sk-a********ABCD");
        assert!(!list.to_string().contains(OPENAI_KEY));

        let (status, revealed) =
            send(&app, Method::GET, &format!("/credentials/{id}/reveal"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(revealed["secret"], OPENAI_KEY);

        let (_, cred) = send(&app, Method::GET, &format!("/credentials/{id}"), None).await;
        assert_eq!(cred["usageCount"], 1);

        let (_, logs) = send(&app, Method::GET, &format!("/logs?credential_id={id}"), None).await;
        assert_eq!(logs[0]["action"], "used");
        assert_eq!(logs[0]["user"], "tester@oka.tech");
    }

    #[tokio::test]
    async fn test_bad_format_is_422() {
        let app = test_app().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/credentials",
            Some(json!({ "name": "bad", "provider": "openai", "secret": "short" })),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation_failed");
    }

    #[tokio::test]
    async fn test_unknown_ids() {
        let app = test_app().await;
        let id = uuid::Uuid::new_v4();

        let (status, body) = send(&app, Method::GET, &format!("/credentials/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");

        let (status, body) =
            send(&app, Method::GET, &format!("/credentials/{id}/reveal"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "unavailable");

        let (status, _) = send(&app, Method::DELETE, &format!("/credentials/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::GET, "/credentials/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_deactivate_then_reveal() {
        let app = test_app().await;
        let id = create(&app, "k").await;

        let (status, body) = send(
            &app,
            Method::PATCH,
            &format!("/credentials/{id}"),
            Some(json!({ "isActive": false, "description": "paused" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isActive"], false);
        assert_eq!(body["description"], "paused");

        let (status, body) =
            send(&app, Method::GET, &format!("/credentials/{id}/reveal"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "unavailable");
    }

    #[tokio::test]
    async fn test_delete_keeps_logs() {
        let app = test_app().await;
        let id = create(&app, "gone").await;

        let (status, body) = send(&app, Method::DELETE, &format!("/credentials/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (status, _) = send(&app, Method::GET, &format!("/credentials/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, logs) = send(&app, Method::GET, &format!("/logs?credential_id={id}"), None).await;
        let actions: Vec<_> = logs
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["action"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(actions, vec!["deleted", "created"]);
    }

    #[tokio::test]
    async fn test_logs_limit() {
        let app = test_app().await;
        for name in ["a", "b", "c"] {
            create(&app, name).await;
        }

        let (_, logs) = send(&app, Method::GET, "/logs?limit=2", None).await;
        assert_eq!(logs.as_array().unwrap().len(), 2);
        assert_eq!(logs[0]["credentialName"], "c");

        let (_, logs) = send(&app, Method::GET, "/logs", None).await;
        assert_eq!(logs.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_validate_and_test_connection() {
        let app = test_app().await;
        let id = create(&app, "k").await;

        let (status, body) =
            send(&app, Method::POST, &format!("/credentials/{id}/validate"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], true);
        assert_eq!(body["provider"], "openai");

        let (status, body) =
            send(&app, Method::POST, &format!("/credentials/{id}/test"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connected"], true);
    }

    #[tokio::test]
    async fn test_stats() {
        let app = test_app().await;
        let id = create(&app, "a").await;
        create(&app, "b").await;
        send(&app, Method::GET, &format!("/credentials/{id}/reveal"), None).await;

        let (status, stats) = send(&app, Method::GET, "/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["totalKeys"], 2);
        assert_eq!(stats["totalUsage"], 1);
        assert_eq!(stats["monthlyUsage"], 1);
        assert_eq!(stats["byProvider"]["openai"], 2);
    }

    struct HangingProbe;

    #[axum::async_trait]
    impl ProviderProbe for HangingProbe {
        async fn verify(
            &self,
            _: Provider,
            _: &str,
        ) -> credvault_core::Result<credvault_core::probe::ProbeReport> {
            std::future::pending().await
        }

        async fn ping(&self, _: Provider, _: &str) -> credvault_core::Result<bool> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_timeout_is_504() {
        let settings = Settings {
            operation_timeout_secs: 2,
            ..Settings::default()
        };
        let (app, _vault) = test_app_with(Arc::new(HangingProbe), settings).await;
        let id = create(&app, "k").await;

        let (status, body) =
            send(&app, Method::POST, &format!("/credentials/{id}/test"), None).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"], "timeout");
    }

    #[tokio::test]
    async fn test_closed_vault() {
        let (app, vault) =
            test_app_with(Arc::new(StaticProbe::accepting()), Settings::default()).await;
        vault.close().await;

        let (status, body) = send(&app, Method::GET, "/credentials", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "closed");

        let (_, health) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(health["vault"], "closed");
    }
}
