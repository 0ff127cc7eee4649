//! Token resolution against the SOL portal.
//!
//! [`TokenResolver`] is the seam between the queue and the browser: the
//! production implementation drives a real login, tests substitute scripted
//! fakes. A resolution attempt never leaks a browser page and never panics
//! past this boundary; anything that goes wrong becomes a [`ResolveError`].

#[cfg(feature = "browser")]
mod portal;
#[cfg(feature = "browser")]
mod selectors;

#[cfg(feature = "browser")]
pub use portal::PortalResolver;

use async_trait::async_trait;

use crate::models::{Credentials, Target, TokenBundle};

/// Errors from one resolution attempt.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Browser could not be launched or the page could not be opened.
    #[error("browser unavailable: {0}")]
    Browser(String),
    /// Login form submitted but the expected landing page never appeared.
    #[error("login rejected by the portal")]
    LoginRejected,
    /// The portal is throttling or has locked the account out.
    #[error("portal is throttling logins")]
    Throttled,
    /// Navigation or extraction failed after a successful login.
    #[error("portal navigation failed: {0}")]
    Navigation(String),
}

/// Resolves session tokens for a credential set and target list.
///
/// Implementations may return a partial bundle: a failure on one target must
/// not abort the others. A hard error (login rejected, browser gone) applies
/// to the whole attempt.
#[async_trait]
pub trait TokenResolver: Send + Sync {
    async fn resolve(
        &self,
        credentials: &Credentials,
        targets: &[Target],
    ) -> Result<TokenBundle, ResolveError>;
}
