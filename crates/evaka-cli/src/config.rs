//! Application configuration management.
//!
//! The configuration names the account: municipality, username and an
//! optional portal URL override. The password is never written here; it lives
//! in the OS keychain.
//!
//! Configuration is stored at `~/.config/evaka-calendar/config.json`.
//! `EVAKA_MUNICIPALITY`, `EVAKA_USERNAME`, `EVAKA_BASE_URL` and
//! `EVAKA_PASSWORD` override whatever the file says.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "evaka-calendar";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_MUNICIPALITY: &str = "EVAKA_MUNICIPALITY";
const ENV_USERNAME: &str = "EVAKA_USERNAME";
const ENV_PASSWORD: &str = "EVAKA_PASSWORD";
const ENV_BASE_URL: &str = "EVAKA_BASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub municipality: Option<String>,
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// A fully specified account, ready to build a client from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub municipality: String,
    pub username: String,
    pub base_url: Option<String>,
}

impl Account {
    /// Same municipality (any case) and username (surrounding whitespace ignored)
    pub fn is_same_account(&self, municipality: &str, username: &str) -> bool {
        self.municipality.trim().eq_ignore_ascii_case(municipality.trim())
            && self.username.trim() == username.trim()
    }
}

impl Config {
    /// Load the config file and apply environment overrides.
    pub fn load() -> Result<Self> {
        let config = Self::load_from(&Self::config_path()?)?;
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Replace fields with non-empty values from `lookup`.
    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(ENV_MUNICIPALITY) {
            self.municipality = Some(v);
        }
        if let Some(v) = get(ENV_USERNAME) {
            self.username = Some(v);
        }
        if let Some(v) = get(ENV_BASE_URL) {
            self.base_url = Some(v);
        }
        self
    }

    /// The configured account, or an error telling the user to run setup.
    pub fn account(&self) -> Result<Account> {
        match (&self.municipality, &self.username) {
            (Some(municipality), Some(username)) => Ok(Account {
                municipality: municipality.clone(),
                username: username.clone(),
                base_url: self.base_url.clone(),
            }),
            _ => anyhow::bail!(
                "No account configured. Run `{} setup` or set {} and {}",
                APP_NAME,
                ENV_MUNICIPALITY,
                ENV_USERNAME
            ),
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

/// Password from the environment, for hosts without a keychain
pub fn env_password() -> Option<String> {
    std::env::var(ENV_PASSWORD).ok().filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.account().is_err());
    }

    #[test]
    fn test_save_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            municipality: Some("espoo".into()),
            username: Some("parent@example.com".into()),
            base_url: None,
        };
        config.save_to(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("base_url"));
        assert!(!contents.contains("password"));
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("EVAKA_MUNICIPALITY", "oulu"),
            ("EVAKA_BASE_URL", "http://localhost:8080"),
            ("EVAKA_USERNAME", " "),
        ]
        .into_iter()
        .collect();

        let config = Config {
            municipality: Some("espoo".into()),
            username: Some("parent@example.com".into()),
            base_url: None,
        }
        .with_overrides(|key| env.get(key).map(|v| v.to_string()));

        let account = config.account().unwrap();
        assert_eq!(account.municipality, "oulu");
        // Blank values do not override
        assert_eq!(account.username, "parent@example.com");
        assert_eq!(account.base_url.as_deref(), Some("http://localhost:8080"));
    }

    #[test]
    fn test_same_account_comparison() {
        let account = Account {
            municipality: "Espoo".into(),
            username: " parent@example.com".into(),
            base_url: None,
        };
        assert!(account.is_same_account("espoo", "parent@example.com"));
        assert!(!account.is_same_account("espoo", "other@example.com"));
        assert!(!account.is_same_account("oulu", "parent@example.com"));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
