//! Idle-reclamation policy for the shared browser.

/// Decides when the shared browser should be closed, based on successive
/// observations of the open-session count.
///
/// The browser is reclaimed when no sessions are open, or when the count is
/// nonzero but has not changed since the previous check. The latter is the
/// stale-session guard: a resolution that never closed its page would
/// otherwise pin the browser forever.
#[derive(Debug, Default)]
pub struct IdlePolicy {
    last_count: Option<usize>,
}

impl IdlePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one observation of the open-session count. Returns `true` when
    /// the browser should be closed now. Observations reset after a close
    /// decision so a fresh browser gets a full grace period.
    pub fn observe(&mut self, open_sessions: usize) -> bool {
        if open_sessions == 0 {
            self.last_count = None;
            return true;
        }
        let stale = self.last_count == Some(open_sessions);
        if stale {
            self.last_count = None;
        } else {
            self.last_count = Some(open_sessions);
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sessions_reclaims_immediately() {
        let mut policy = IdlePolicy::new();
        assert!(policy.observe(0));
    }

    #[test]
    fn changing_count_is_left_alone() {
        let mut policy = IdlePolicy::new();
        assert!(!policy.observe(2));
        assert!(!policy.observe(3));
        assert!(!policy.observe(1));
    }

    #[test]
    fn unchanged_nonzero_count_reclaims_on_second_check() {
        let mut policy = IdlePolicy::new();
        assert!(!policy.observe(2));
        assert!(policy.observe(2));
    }

    #[test]
    fn observations_reset_after_reclaim() {
        let mut policy = IdlePolicy::new();
        assert!(!policy.observe(2));
        assert!(policy.observe(2));
        // A new browser with the same count gets its grace period again.
        assert!(!policy.observe(2));
        assert!(policy.observe(2));
    }
}
