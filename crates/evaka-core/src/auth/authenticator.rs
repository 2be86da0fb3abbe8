use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::error::DEFAULT_RATE_LIMIT_COOLDOWN;
use crate::api::{ApiError, ApiPath, ApiResponse, Transport};

use super::{Credentials, Session};

/// Performs the weak-login handshake. Never retries on its own.
#[derive(Clone)]
pub struct Authenticator {
    transport: Transport,
}

impl Authenticator {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Log in with username and password and return a fresh session.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, ApiError> {
        let body = json!({
            "username": credentials.username,
            "password": credentials.password(),
        });

        let response = match self
            .transport
            .request(ApiPath::WeakLogin, &[], Some(&body), None)
            .await
        {
            Ok(response) => response,
            Err(ApiError::MalformedResponse(message)) => {
                return Err(ApiError::AuthenticationProtocol(message));
            }
            Err(e) => return Err(e),
        };

        let session = Self::interpret(response)?;
        info!(
            municipality = %credentials.municipality,
            cookies = session.cookies().len(),
            "Weak login succeeded"
        );
        Ok(session)
    }

    /// Map a weak-login response to a session or exactly one error kind.
    fn interpret(response: ApiResponse) -> Result<Session, ApiError> {
        match response.status {
            StatusCode::OK => {
                if Self::reports_failure(&response.body) {
                    return Err(ApiError::AuthenticationProtocol(format!(
                        "login returned 200 but reported failure: {}",
                        response.body
                    )));
                }
                if response.cookies.is_empty() {
                    return Err(ApiError::AuthenticationProtocol(
                        "login returned 200 without a session cookie".to_string(),
                    ));
                }
                Ok(Session::new(response.cookies))
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                warn!(status = %response.status, "Weak login rejected credentials");
                Err(ApiError::InvalidCredentials)
            }
            StatusCode::FORBIDDEN => {
                warn!("Weak login is disabled for this account");
                Err(ApiError::WeakLoginDisabled)
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response.retry_after.unwrap_or(DEFAULT_RATE_LIMIT_COOLDOWN);
                warn!(retry_after_secs = retry_after.as_secs(), "Weak login rate limited");
                Err(ApiError::RateLimited { retry_after })
            }
            status => Err(ApiError::AuthenticationProtocol(format!(
                "unexpected status {}: {}",
                status,
                Self::body_text(&response.body)
            ))),
        }
    }

    /// A 200 body may be empty, or JSON. An explicit `false` in the usual
    /// success fields means the login did not take.
    fn reports_failure(body: &Value) -> bool {
        match body {
            Value::Null => false,
            Value::Object(map) => ["loggedIn", "success"]
                .iter()
                .any(|key| map.get(*key) == Some(&Value::Bool(false))),
            Value::Bool(ok) => !ok,
            _ => false,
        }
    }

    fn body_text(body: &Value) -> String {
        match body {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => ApiError::truncate_body(&other.to_string()),
        }
    }
}
