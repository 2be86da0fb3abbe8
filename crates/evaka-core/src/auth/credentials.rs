use std::fmt;

use crate::api::ApiError;
use crate::models::Municipality;

/// Login details for one configured account.
///
/// Supplied once by the host at setup and never changed afterwards. A new
/// password means a new account configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub municipality: Municipality,
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(municipality: Municipality, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            municipality,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Build credentials from raw wizard input. The municipality is checked
    /// here so an unsupported one fails before any network traffic.
    pub fn parse(municipality: &str, username: &str, password: &str) -> Result<Self, ApiError> {
        let municipality = municipality.parse()?;
        Ok(Self::new(municipality, username.trim(), password))
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("municipality", &self.municipality)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new(Municipality::Espoo, "parent@example.com", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("parent@example.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_parse_trims_username_but_not_password() {
        let creds = Credentials::parse("oulu", "  parent@example.com ", " secret ").unwrap();
        assert_eq!(creds.municipality, Municipality::Oulu);
        assert_eq!(creds.username, "parent@example.com");
        assert_eq!(creds.password(), " secret ");
    }

    #[test]
    fn test_parse_rejects_unknown_municipality() {
        let err = Credentials::parse("vantaa", "a", "b").unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedMunicipality(_)));
    }
}
