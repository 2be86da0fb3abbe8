use std::time::Duration;

use thiserror::Error;

/// Everything that can go wrong between the host and the eVaka citizen API.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error(
        "Password login is not enabled for this account. \
         Enable \"{}\" in your eVaka profile settings and try again",
        WEAK_LOGIN_SETTING
    )]
    WeakLoginDisabled,

    #[error("Too many login attempts - account temporarily locked, retry in {} minutes", .retry_after.as_secs().div_ceil(60))]
    RateLimited { retry_after: Duration },

    #[error("Unexpected login response: {0}")]
    AuthenticationProtocol(String),

    #[error("Session was rejected again after re-login: {0}")]
    PersistentAuthFailure(String),

    #[error("Unsupported municipality: {0} (supported: Espoo, Oulu, Tampere, Turku)")]
    UnsupportedMunicipality(String),

    #[error("Invalid portal URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Name of the eVaka profile setting that turns on username/password login.
pub const WEAK_LOGIN_SETTING: &str = "Email login (kirjautuminen sähköpostilla)";

/// Cooldown used when a 429 carries no usable `Retry-After`.
pub const DEFAULT_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(15 * 60);

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Map a non-success status on a data request. Authorization statuses are
    /// handled by the caller before this is reached.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited {
                retry_after: DEFAULT_RATE_LIMIT_COOLDOWN,
            },
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// True for failures the user has to fix before another login can work.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ApiError::InvalidCredentials
                | ApiError::WeakLoginDisabled
                | ApiError::RateLimited { .. }
                | ApiError::PersistentAuthFailure(_)
        )
    }

    /// Stable key the setup wizard uses to pick a localized message.
    pub fn setup_error_key(&self) -> &'static str {
        match self {
            ApiError::InvalidCredentials | ApiError::PersistentAuthFailure(_) => "invalid_auth",
            ApiError::WeakLoginDisabled => "weak_login_disabled",
            ApiError::RateLimited { .. } => "rate_limited",
            ApiError::NetworkError(_) | ApiError::ServerError(_) => "cannot_connect",
            ApiError::UnsupportedMunicipality(_) => "unsupported_municipality",
            ApiError::InvalidBaseUrl(_) => "invalid_base_url",
            ApiError::MalformedResponse(_)
            | ApiError::AuthenticationProtocol(_)
            | ApiError::NotFound(_)
            | ApiError::InvalidResponse(_) => "unknown",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_truncate_body_short() {
        assert_eq!(ApiError::truncate_body("oops"), "oops");
    }

    #[test]
    fn test_truncate_body_long() {
        let body = "x".repeat(600);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.starts_with(&"x".repeat(500)));
        assert!(truncated.ends_with("(truncated, 600 total bytes)"));
    }

    #[test]
    fn test_truncate_body_respects_char_boundary() {
        let body = "ä".repeat(400);
        // Must not panic on a multi-byte boundary
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.contains("truncated"));
    }

    #[test]
    fn test_from_status() {
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, ""),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, "down"),
            ApiError::ServerError(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited { .. }
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::IM_A_TEAPOT, ""),
            ApiError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_weak_login_message_names_setting() {
        let message = ApiError::WeakLoginDisabled.to_string();
        assert!(message.contains(WEAK_LOGIN_SETTING));
        assert!(message.contains("profile settings"));
    }

    #[test]
    fn test_rate_limited_message_rounds_up_minutes() {
        let err = ApiError::RateLimited {
            retry_after: Duration::from_secs(61),
        };
        assert!(err.to_string().contains("retry in 2 minutes"));
    }

    #[test]
    fn test_setup_error_keys_are_distinct_for_user_facing_cases() {
        assert_eq!(ApiError::InvalidCredentials.setup_error_key(), "invalid_auth");
        assert_eq!(ApiError::WeakLoginDisabled.setup_error_key(), "weak_login_disabled");
        assert_eq!(
            ApiError::RateLimited {
                retry_after: Duration::from_secs(1)
            }
            .setup_error_key(),
            "rate_limited"
        );
        assert_eq!(
            ApiError::UnsupportedMunicipality("helsinki".into()).setup_error_key(),
            "unsupported_municipality"
        );
        assert_eq!(
            ApiError::InvalidBaseUrl("ftp://x".into()).setup_error_key(),
            "invalid_base_url"
        );
    }
}
