//! SOL portal credentials.

use serde::{Deserialize, Serialize};

/// Credentials for the SUNAT SOL portal.
///
/// `Debug` redacts the SOL key so credentials can appear in log context
/// without leaking secrets.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credentials {
    /// 11-digit taxpayer id.
    pub ruc: String,
    /// SOL username (3-8 characters).
    pub sol_username: String,
    /// SOL key (2-12 characters).
    pub sol_key: String,
}

impl Credentials {
    pub fn new(ruc: String, sol_username: String, sol_key: String) -> Self {
        Self {
            ruc,
            sol_username,
            sol_key,
        }
    }

    /// Validate field shapes. Returns a human-readable message on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.ruc.len() != 11 || !self.ruc.bytes().all(|b| b.is_ascii_digit()) {
            return Err("ruc must be exactly 11 digits".to_string());
        }
        if self.sol_username.len() < 3 || self.sol_username.len() > 8 {
            return Err("sol_username must be 3-8 characters".to_string());
        }
        if self.sol_key.len() < 2 || self.sol_key.len() > 12 {
            return Err("sol_key must be 2-12 characters".to_string());
        }
        Ok(())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("ruc", &self.ruc)
            .field("sol_username", &self.sol_username)
            .field("sol_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Credentials {
        Credentials::new(
            "20123456789".to_string(),
            "USUARIO1".to_string(),
            "clave123".to_string(),
        )
    }

    #[test]
    fn accepts_valid_credentials() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn rejects_short_ruc() {
        let mut creds = valid();
        creds.ruc = "2012345678".to_string();
        assert!(creds.validate().is_err());
    }

    #[test]
    fn rejects_non_numeric_ruc() {
        let mut creds = valid();
        creds.ruc = "2012345678X".to_string();
        assert!(creds.validate().is_err());
    }

    #[test]
    fn rejects_username_out_of_range() {
        let mut creds = valid();
        creds.sol_username = "AB".to_string();
        assert!(creds.validate().is_err());
        creds.sol_username = "ABCDEFGHI".to_string();
        assert!(creds.validate().is_err());
    }

    #[test]
    fn rejects_key_out_of_range() {
        let mut creds = valid();
        creds.sol_key = "x".to_string();
        assert!(creds.validate().is_err());
        creds.sol_key = "x".repeat(13);
        assert!(creds.validate().is_err());
    }

    #[test]
    fn debug_redacts_sol_key() {
        let rendered = format!("{:?}", valid());
        assert!(!rendered.contains("clave123"));
        assert!(rendered.contains("20123456789"));
    }
}
