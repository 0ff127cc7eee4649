//! Ticket deduplication.

use crate::models::TicketPayload;
use crate::store::{StoreResult, TicketStore};

/// Find an existing ticket that already satisfies this payload.
///
/// Fast path only: the lookup shortcut maps a credential triple to the most
/// recent ticket that fully satisfied its targets. The hit is re-validated
/// against the *currently requested* target set, so a ticket created for
/// fewer targets never satisfies a broader request. Both the payload and the
/// result record must still be live; a shortcut pointing at an expired
/// ticket is treated as a miss.
pub async fn find_existing(
    store: &dyn TicketStore,
    payload: &TicketPayload,
) -> StoreResult<Option<String>> {
    let Some(ticket_id) = store.get_shortcut(&payload.credentials).await? else {
        return Ok(None);
    };

    if store.get_payload(&ticket_id).await?.is_none() {
        return Ok(None);
    }

    match store.get_result(&ticket_id).await? {
        Some(bundle) if bundle.satisfies(&payload.targets) => Ok(Some(ticket_id)),
        _ => Ok(None),
    }
}
