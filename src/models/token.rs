//! Resolved token bundle.

use serde::{Deserialize, Serialize};

use super::Target;

/// Per-target optional tokens from one resolution.
///
/// A field stays `None` until the corresponding target has been resolved.
/// A bundle only counts as fulfilled for a request when every requested
/// target's field is populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
    pub sire: Option<String>,
    pub cpe: Option<String>,
    #[serde(rename = "unified-platform")]
    pub unified_platform: Option<String>,
}

impl TokenBundle {
    pub fn get(&self, target: Target) -> Option<&str> {
        match target {
            Target::Sire => self.sire.as_deref(),
            Target::Cpe => self.cpe.as_deref(),
            Target::UnifiedPlatform => self.unified_platform.as_deref(),
        }
    }

    pub fn set(&mut self, target: Target, token: String) {
        let slot = match target {
            Target::Sire => &mut self.sire,
            Target::Cpe => &mut self.cpe,
            Target::UnifiedPlatform => &mut self.unified_platform,
        };
        *slot = Some(token);
    }

    /// True when every requested target has a token.
    pub fn satisfies(&self, targets: &[Target]) -> bool {
        targets.iter().all(|t| self.get(*t).is_some())
    }

    /// Requested targets still lacking a token.
    pub fn missing(&self, targets: &[Target]) -> Vec<Target> {
        targets
            .iter()
            .copied()
            .filter(|t| self.get(*t).is_none())
            .collect()
    }

    /// Fill unresolved fields from another bundle. Fields already resolved
    /// here win, so a retry cannot clobber an earlier token.
    pub fn merge_missing_from(&mut self, other: &TokenBundle) {
        for target in Target::ALL {
            if self.get(target).is_none() {
                if let Some(token) = other.get(target) {
                    self.set(target, token.to_string());
                }
            }
        }
    }
}
