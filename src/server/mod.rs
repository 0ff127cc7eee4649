//! HTTP boundary for the ticket API.
//!
//! Exposes ticket submission and polling plus an optional WebSocket push
//! channel for completion events. Every route except the health probe
//! requires the static API key header. Clients only ever see
//! pending/ok/error and a human-readable message; internals never cross
//! this boundary.

mod auth;
mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::store::TicketStore;

/// Shared state for the ticket API.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TicketStore>,
    /// Completed ticket ids fan out to WebSocket subscribers through here.
    pub notify: broadcast::Sender<String>,
    pub api_key: Arc<String>,
}

impl AppState {
    pub fn new(store: Arc<dyn TicketStore>, api_key: String) -> Self {
        let (notify, _) = broadcast::channel(64);
        Self {
            store,
            notify,
            api_key: Arc::new(api_key),
        }
    }
}

/// Start the API server. Returns once ctrl-c is received and in-flight
/// requests have drained.
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use tower::ServiceExt;

    use crate::models::{Credentials, Target, TicketPayload, TokenBundle};
    use crate::store::MemoryTicketStore;

    const TEST_KEY: &str = "secret-key";

    fn setup_test_app() -> (axum::Router, Arc<MemoryTicketStore>) {
        let store = Arc::new(MemoryTicketStore::new());
        let state = AppState::new(store.clone(), TEST_KEY.to_string());
        (create_router(state), store)
    }

    fn creds() -> Credentials {
        Credentials::new(
            "20123456789".to_string(),
            "USUARIO1".to_string(),
            "clave123".to_string(),
        )
    }

    fn create_ticket_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/create-ticket")
            .header("x-api-key", TEST_KEY)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn valid_body() -> serde_json::Value {
        serde_json::json!({
            "ruc": "20123456789",
            "sol_username": "USUARIO1",
            "sol_key": "clave123",
            "targets": ["sire", "cpe"],
        })
    }

    fn get_token_request(ticket_id: &str) -> Request<Body> {
        Request::builder()
            .uri(format!("/get-token?ticket_id={}", ticket_id))
            .header("x-api-key", TEST_KEY)
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn missing_api_key_is_unauthorized() {
        let (app, _store) = setup_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/get-token?ticket_id=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_api_key_is_unauthorized() {
        let (app, _store) = setup_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/get-token?ticket_id=abc")
                    .header("x-api-key", "wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn healthz_needs_no_api_key() {
        let (app, _store) = setup_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["queue_depth"], 0);
    }

    #[tokio::test]
    async fn create_ticket_persists_payload_and_enqueues() {
        let (app, store) = setup_test_app();

        let response = app.oneshot(create_ticket_request(valid_body())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["status"], "pending");
        let ticket_id = json["ticket_id"].as_str().unwrap().to_string();

        let payload = store.get_payload(&ticket_id).await.unwrap().unwrap();
        assert_eq!(payload.targets, vec![Target::Sire, Target::Cpe]);
        assert_eq!(store.queue_len().await.unwrap(), 1);
        assert_eq!(store.dequeue().await.unwrap(), Some(ticket_id));
    }

    #[tokio::test]
    async fn create_ticket_rejects_bad_ruc() {
        let (app, _store) = setup_test_app();

        let mut body = valid_body();
        body["ruc"] = "123".into();
        let response = app.oneshot(create_ticket_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert!(json["error"].as_str().unwrap().contains("ruc"));
    }

    #[tokio::test]
    async fn create_ticket_rejects_unknown_target() {
        let (app, store) = setup_test_app();

        let mut body = valid_body();
        body["targets"] = serde_json::json!(["sire", "padron"]);
        let response = app.oneshot(create_ticket_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.queue_len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_ticket_rejects_empty_targets() {
        let (app, _store) = setup_test_app();

        let mut body = valid_body();
        body["targets"] = serde_json::json!([]);
        let response = app.oneshot(create_ticket_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_ticket_refused_during_portal_backoff() {
        let (app, store) = setup_test_app();
        store.set_backoff(Duration::from_secs(60)).await.unwrap();

        let response = app.oneshot(create_ticket_request(valid_body())).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(store.queue_len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_ticket_reuses_fulfilled_ticket_for_subset() {
        let (app, store) = setup_test_app();

        let payload = TicketPayload::new(creds(), vec![Target::Sire, Target::Cpe]);
        store.put_payload("old", &payload).await.unwrap();
        let mut bundle = TokenBundle::default();
        bundle.set(Target::Sire, "a".to_string());
        bundle.set(Target::Cpe, "b".to_string());
        store.put_result("old", &bundle).await.unwrap();
        store.put_shortcut(&creds(), "old").await.unwrap();

        let mut body = valid_body();
        body["targets"] = serde_json::json!(["sire"]);
        let response = app.oneshot(create_ticket_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "reused");
        assert_eq!(json["ticket_id"], "old");
        assert_eq!(store.queue_len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_ticket_superset_request_makes_fresh_ticket() {
        let (app, store) = setup_test_app();

        let payload = TicketPayload::new(creds(), vec![Target::Sire]);
        store.put_payload("old", &payload).await.unwrap();
        let mut bundle = TokenBundle::default();
        bundle.set(Target::Sire, "a".to_string());
        store.put_result("old", &bundle).await.unwrap();
        store.put_shortcut(&creds(), "old").await.unwrap();

        let response = app.oneshot(create_ticket_request(valid_body())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "pending");
        assert_ne!(json["ticket_id"], "old");
        assert_eq!(store.queue_len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_token_unknown_ticket_is_not_found() {
        let (app, _store) = setup_test_app();

        let response = app.oneshot(get_token_request("nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_token_expired_payload_is_not_found_despite_result() {
        let (app, store) = setup_test_app();

        let payload = TicketPayload::new(creds(), vec![Target::Sire]);
        store.put_payload("t1", &payload).await.unwrap();
        let mut bundle = TokenBundle::default();
        bundle.set(Target::Sire, "a".to_string());
        store.put_result("t1", &bundle).await.unwrap();
        store.expire_payload("t1").await;

        let response = app.oneshot(get_token_request("t1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_token_reports_pending_with_null_token() {
        let (app, store) = setup_test_app();

        let payload = TicketPayload::new(creds(), vec![Target::Sire]);
        store.put_payload("t1", &payload).await.unwrap();

        let response = app.oneshot(get_token_request("t1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "pending");
        assert!(json["sunat_token"].is_null());
    }

    #[tokio::test]
    async fn get_token_returns_fulfilled_bundle() {
        let (app, store) = setup_test_app();

        let payload = TicketPayload::new(creds(), vec![Target::Sire]);
        store.put_payload("t1", &payload).await.unwrap();
        let mut bundle = TokenBundle::default();
        bundle.set(Target::Sire, "tok-sire".to_string());
        store.put_result("t1", &bundle).await.unwrap();

        let response = app.oneshot(get_token_request("t1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["sunat_token"]["sire"], "tok-sire");
    }

    #[tokio::test]
    async fn get_token_surfaces_ticket_error_as_500() {
        let (app, store) = setup_test_app();

        let payload = TicketPayload::new(creds(), vec![Target::Sire]);
        store.put_payload("t1", &payload).await.unwrap();
        store
            .put_error("t1", "targets [sire] unresolved after 4 attempts")
            .await
            .unwrap();

        let response = app.oneshot(get_token_request("t1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["status"], "error");
        assert!(json["message"].as_str().unwrap().contains("unresolved"));
    }
}
