//! Backend systems a token can be resolved for.

use serde::{Deserialize, Serialize};

/// One of the SUNAT backend systems that issues its own session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    /// Sistema Integrado de Registros Electrónicos.
    Sire,
    /// Comprobantes de pago electrónicos.
    Cpe,
    /// Plataforma unificada (new menu shell).
    UnifiedPlatform,
}

impl Target {
    /// All known targets.
    pub const ALL: [Target; 3] = [Target::Sire, Target::Cpe, Target::UnifiedPlatform];

    /// Wire name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Sire => "sire",
            Target::Cpe => "cpe",
            Target::UnifiedPlatform => "unified-platform",
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sire" => Ok(Target::Sire),
            "cpe" => Ok(Target::Cpe),
            "unified-platform" => Ok(Target::UnifiedPlatform),
            other => Err(format!("unknown target: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_uses_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Target::UnifiedPlatform).unwrap(),
            "\"unified-platform\""
        );
        let parsed: Target = serde_json::from_str("\"sire\"").unwrap();
        assert_eq!(parsed, Target::Sire);
    }

    #[test]
    fn rejects_unknown_target() {
        assert!(serde_json::from_str::<Target>("\"padron\"").is_err());
        assert!("padron".parse::<Target>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for target in Target::ALL {
            assert_eq!(target.to_string().parse::<Target>().unwrap(), target);
        }
    }
}
