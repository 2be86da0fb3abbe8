use anyhow::{Context, Result};
use keyring::Entry;

use crate::config::APP_NAME;

/// Passwords in the OS keychain, one entry per municipality and username.
pub struct CredentialStore;

impl CredentialStore {
    fn entry(municipality: &str, username: &str) -> Result<Entry> {
        let user = format!("{}:{}", municipality.trim().to_lowercase(), username.trim());
        Entry::new(APP_NAME, &user).context("Failed to create keyring entry")
    }

    /// Store the password for an account in the OS keychain
    pub fn store(municipality: &str, username: &str, password: &str) -> Result<()> {
        Self::entry(municipality, username)?
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Retrieve the password for an account from the OS keychain
    pub fn get_password(municipality: &str, username: &str) -> Result<String> {
        Self::entry(municipality, username)?
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Delete the stored password, e.g. when setup switches accounts
    pub fn delete(municipality: &str, username: &str) -> Result<()> {
        Self::entry(municipality, username)?
            .delete_credential()
            .context("Failed to delete credential from keychain")?;
        Ok(())
    }
}
