//! Request handlers for the ticket API.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::models::{Credentials, Target, Ticket, TicketPayload, TicketStatus};
use crate::queue::find_existing;
use crate::store::StoreError;

use super::AppState;

/// Map a store failure to an opaque 500.
fn internal_error(context: &str, error: StoreError) -> Response {
    warn!("{}: {}", context, error);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal error" })),
    )
        .into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub ruc: String,
    pub sol_username: String,
    pub sol_key: String,
    /// Target names; validated against the known set.
    pub targets: Vec<String>,
}

/// `POST /create-ticket` — submit a resolution request.
///
/// Returns the existing ticket id with status `reused` when a fulfilled
/// ticket for the same credentials already covers the requested targets.
pub async fn create_ticket(
    State(state): State<AppState>,
    Json(request): Json<CreateTicketRequest>,
) -> Response {
    let credentials = Credentials::new(request.ruc, request.sol_username, request.sol_key);
    if let Err(message) = credentials.validate() {
        return bad_request(message);
    }
    if request.targets.is_empty() {
        return bad_request("targets must be a non-empty array");
    }
    let mut targets: Vec<Target> = Vec::with_capacity(request.targets.len());
    for name in &request.targets {
        match name.parse::<Target>() {
            Ok(target) => {
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
            Err(message) => return bad_request(message),
        }
    }

    match state.store.in_backoff().await {
        Ok(true) => {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "portal is rate limiting logins, retry later" })),
            )
                .into_response();
        }
        Ok(false) => {}
        Err(e) => return internal_error("backoff check failed", e),
    }

    let payload = TicketPayload::new(credentials, targets);

    match find_existing(state.store.as_ref(), &payload).await {
        Ok(Some(ticket_id)) => {
            debug!(%ticket_id, "reusing fulfilled ticket");
            return Json(json!({ "ticket_id": ticket_id, "status": "reused" })).into_response();
        }
        Ok(None) => {}
        Err(e) => return internal_error("deduplication lookup failed", e),
    }

    let ticket_id = Ticket::new_id();
    if let Err(e) = state.store.put_payload(&ticket_id, &payload).await {
        return internal_error("payload write failed", e);
    }
    if let Err(e) = state.store.enqueue(&ticket_id).await {
        return internal_error("enqueue failed", e);
    }

    debug!(%ticket_id, "ticket created");
    Json(json!({ "ticket_id": ticket_id, "status": "pending" })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct GetTokenQuery {
    pub ticket_id: String,
}

/// `GET /get-token?ticket_id=` — poll a ticket.
///
/// A ticket whose payload TTL has lapsed reads as 404 even if a result
/// record still lingers.
pub async fn get_token(
    State(state): State<AppState>,
    Query(query): Query<GetTokenQuery>,
) -> Response {
    let ticket_id = &query.ticket_id;

    match state.store.get_payload(ticket_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "ticket not found" })),
            )
                .into_response();
        }
        Err(e) => return internal_error("payload load failed", e),
    }

    let result = match state.store.get_result(ticket_id).await {
        Ok(result) => result,
        Err(e) => return internal_error("result load failed", e),
    };
    let error_message = if result.is_none() {
        match state.store.get_error(ticket_id).await {
            Ok(error) => error,
            Err(e) => return internal_error("error-record load failed", e),
        }
    } else {
        None
    };

    let ticket = Ticket {
        id: ticket_id.clone(),
        status: if result.is_some() {
            TicketStatus::Ok
        } else if error_message.is_some() {
            TicketStatus::Error
        } else {
            TicketStatus::Pending
        },
        result,
        error_message,
    };

    match ticket.status {
        TicketStatus::Ok => {
            Json(json!({ "status": "ok", "sunat_token": ticket.result })).into_response()
        }
        TicketStatus::Error => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "message": ticket.error_message })),
        )
            .into_response(),
        TicketStatus::Pending => {
            Json(json!({ "status": "pending", "sunat_token": null })).into_response()
        }
    }
}

/// `GET /notify` — WebSocket push channel. Each completed ticket id is sent
/// as one text message to every connected subscriber.
pub async fn notify_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let receiver = state.notify.subscribe();
    ws.on_upgrade(move |socket| forward_completions(socket, receiver))
}

async fn forward_completions(mut socket: WebSocket, mut completions: broadcast::Receiver<String>) {
    loop {
        tokio::select! {
            completed = completions.recv() => match completed {
                Ok(ticket_id) => {
                    if socket.send(Message::Text(ticket_id)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "notify subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                // Drain pings and client chatter; drop the task on close.
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }
}

/// `GET /healthz` — liveness plus backing-store connectivity.
pub async fn healthz(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => {
            let queue_depth = state.store.queue_len().await.unwrap_or(0);
            Json(json!({ "status": "ok", "queue_depth": queue_depth })).into_response()
        }
        Err(e) => {
            warn!("store ping failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "error": "backing store unreachable" })),
            )
                .into_response()
        }
    }
}
