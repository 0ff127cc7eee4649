//! Ticket lifecycle types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Credentials, Target, TokenBundle};

/// The stored request side of a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketPayload {
    pub credentials: Credentials,
    /// Non-empty set of systems to resolve tokens for.
    pub targets: Vec<Target>,
    pub created_at: DateTime<Utc>,
}

impl TicketPayload {
    pub fn new(credentials: Credentials, targets: Vec<Target>) -> Self {
        Self {
            credentials,
            targets,
            created_at: Utc::now(),
        }
    }
}

/// Observable state of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Pending,
    Ok,
    Error,
}

/// Fully materialized view of a ticket, assembled from the store records.
#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    pub id: String,
    pub status: TicketStatus,
    pub result: Option<TokenBundle>,
    pub error_message: Option<String>,
}

impl Ticket {
    /// Mint a fresh ticket id.
    pub fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&TicketStatus::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&TicketStatus::Ok).unwrap(), "\"ok\"");
        assert_eq!(serde_json::to_string(&TicketStatus::Error).unwrap(), "\"error\"");
    }

    #[test]
    fn ticket_ids_are_unique() {
        assert_ne!(Ticket::new_id(), Ticket::new_id());
    }
}
