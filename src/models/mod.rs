//! Data models for solacquire.

mod credentials;
mod target;
mod ticket;
mod token;

pub use credentials::Credentials;
pub use target::Target;
pub use ticket::{Ticket, TicketPayload, TicketStatus};
pub use token::TokenBundle;
