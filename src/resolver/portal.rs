//! Browser-driven resolver for the SOL portal.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::{Element, Page};
use tracing::{debug, info, warn};

use crate::browser::SessionManager;
use crate::models::{Credentials, Target, TokenBundle};

use super::selectors::{
    flow_for, EXPECTED_TITLE, KEY_INPUT, LOGIN_BUTTON, LOGIN_URL, MODAL_CLOSE_SELECTORS, RUC_INPUT,
    THROTTLE_MARKERS, USERNAME_INPUT,
};
use super::{ResolveError, TokenResolver};

/// How long to keep polling for a modal close button before giving up.
const MODAL_WAIT: Duration = Duration::from_secs(2);
/// Settling delay after a menu click, for the portal's frame swaps.
const MENU_SETTLE: Duration = Duration::from_millis(400);
/// Settling delay after login before the title is checked.
const LOGIN_SETTLE: Duration = Duration::from_millis(600);

/// Resolves tokens by replaying the SOL login in a shared browser.
pub struct PortalResolver {
    sessions: Arc<SessionManager>,
    action_timeout: Duration,
}

impl PortalResolver {
    pub fn new(sessions: Arc<SessionManager>, action_timeout: Duration) -> Self {
        Self {
            sessions,
            action_timeout,
        }
    }

    /// Inner resolution - page cleanup handled by the caller.
    async fn resolve_inner(
        &self,
        page: &Page,
        credentials: &Credentials,
        targets: &[Target],
    ) -> Result<TokenBundle, ResolveError> {
        self.login(page, credentials).await?;
        self.dismiss_modals(page).await;

        let mut bundle = TokenBundle::default();
        for &target in targets {
            match self.extract_target(page, target).await {
                Ok(Some(token)) => {
                    info!(target = %target, "token resolved");
                    bundle.set(target, token);
                }
                Ok(None) => {
                    warn!(target = %target, "token absent after navigation");
                }
                Err(e) => {
                    // One failed target must not abort the others.
                    warn!(target = %target, "target resolution failed: {}", e);
                }
            }
        }
        Ok(bundle)
    }

    /// Submit the login form and verify the landing page by exact title.
    async fn login(&self, page: &Page, credentials: &Credentials) -> Result<(), ResolveError> {
        self.navigate(page, LOGIN_URL).await?;

        self.fill(page, RUC_INPUT, &credentials.ruc).await?;
        self.fill(page, USERNAME_INPUT, &credentials.sol_username)
            .await?;
        self.fill(page, KEY_INPUT, &credentials.sol_key).await?;

        self.find(page, LOGIN_BUTTON)
            .await?
            .click()
            .await
            .map_err(|e| ResolveError::Navigation(format!("login submit failed: {}", e)))?;

        let _ = page.wait_for_navigation().await;
        tokio::time::sleep(LOGIN_SETTLE).await;

        let title = page.get_title().await.ok().flatten().unwrap_or_default();
        if title != EXPECTED_TITLE {
            let content = page.content().await.unwrap_or_default().to_lowercase();
            if THROTTLE_MARKERS.iter().any(|m| content.contains(m)) {
                return Err(ResolveError::Throttled);
            }
            debug!(%title, "unexpected page title after login");
            return Err(ResolveError::LoginRejected);
        }
        Ok(())
    }

    /// Close any interstitial modal the menu throws up. Best-effort: a
    /// missing modal is normal, a stuck one is logged and skipped.
    async fn dismiss_modals(&self, page: &Page) {
        for &selector in MODAL_CLOSE_SELECTORS {
            match self.find_within(page, selector, MODAL_WAIT).await {
                Ok(element) => {
                    if let Err(e) = element.click().await {
                        debug!(selector, "modal close click failed: {}", e);
                    }
                }
                Err(_) => debug!(selector, "no modal present"),
            }
        }
    }

    /// Walk the menu to the target's subsystem and read its token out of
    /// client-side storage.
    async fn extract_target(
        &self,
        page: &Page,
        target: Target,
    ) -> Result<Option<String>, ResolveError> {
        let flow = flow_for(target);

        for &selector in flow.menu_clicks {
            let element = self.find(page, selector).await?;
            element.click().await.map_err(|e| {
                ResolveError::Navigation(format!("menu click {} failed: {}", selector, e))
            })?;
            tokio::time::sleep(MENU_SETTLE).await;
        }

        // Give the subsystem a moment to persist its token.
        tokio::time::sleep(MENU_SETTLE).await;

        let value: Option<String> = page
            .evaluate(flow.token_script.to_string())
            .await
            .map_err(|e| ResolveError::Navigation(format!("token probe failed: {}", e)))?
            .into_value()
            .unwrap_or(None);
        Ok(value.filter(|t| !t.is_empty()))
    }

    /// Navigate with the per-action timeout.
    async fn navigate(&self, page: &Page, url: &str) -> Result<(), ResolveError> {
        tokio::time::timeout(self.action_timeout, page.goto(url))
            .await
            .map_err(|_| {
                ResolveError::Navigation(format!(
                    "navigation timed out after {:?} for {}",
                    self.action_timeout, url
                ))
            })?
            .map_err(|e| ResolveError::Navigation(format!("navigation failed for {}: {}", url, e)))?;
        Ok(())
    }

    /// Find a form field and type into it.
    async fn fill(&self, page: &Page, selector: &str, text: &str) -> Result<(), ResolveError> {
        let element = self.find(page, selector).await?;
        element
            .click()
            .await
            .map_err(|e| ResolveError::Navigation(format!("focus {} failed: {}", selector, e)))?;
        element
            .type_str(text)
            .await
            .map_err(|e| ResolveError::Navigation(format!("typing into {} failed: {}", selector, e)))?;
        Ok(())
    }

    /// Poll for a selector until the action timeout lapses.
    async fn find(&self, page: &Page, selector: &str) -> Result<Element, ResolveError> {
        self.find_within(page, selector, self.action_timeout).await
    }

    async fn find_within(
        &self,
        page: &Page,
        selector: &str,
        timeout: Duration,
    ) -> Result<Element, ResolveError> {
        let deadline = Instant::now() + timeout;
        loop {
            match page.find_element(selector).await {
                Ok(element) => return Ok(element),
                Err(e) => {
                    if Instant::now() >= deadline {
                        return Err(ResolveError::Navigation(format!(
                            "selector {} not found: {}",
                            selector, e
                        )));
                    }
                    tokio::time::sleep(Duration::from_millis(250)).await;
                }
            }
        }
    }
}

#[async_trait]
impl TokenResolver for PortalResolver {
    async fn resolve(
        &self,
        credentials: &Credentials,
        targets: &[Target],
    ) -> Result<TokenBundle, ResolveError> {
        let page = self
            .sessions
            .open_page()
            .await
            .map_err(|e| ResolveError::Browser(e.to_string()))?;

        // Inner call so the page is closed on every exit path.
        let result = self.resolve_inner(&page, credentials, targets).await;
        self.sessions.close_page(page).await;
        result
    }
}
