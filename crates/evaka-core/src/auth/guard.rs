use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::ApiError;

use super::{Authenticator, Credentials, Session, SessionCookie};

/// Why the guard refuses to attempt another login.
#[derive(Debug, Clone, Copy)]
enum LoginBlock {
    /// Server asked us to back off.
    CoolingDown { until: Instant },
    /// Credentials were rejected on the first login.
    InvalidCredentials,
    WeakLoginDisabled,
}

/// Owns the single session of one account and logs in lazily.
///
/// The guard never refreshes ahead of time. A session is replaced only after
/// a caller reports it rejected via [`SessionGuard::invalidate`].
pub struct SessionGuard {
    authenticator: Authenticator,
    credentials: Credentials,
    session: Option<Session>,
    block: Option<LoginBlock>,
    /// Set once a login with these credentials has succeeded.
    verified: bool,
    login_attempts: u64,
}

impl SessionGuard {
    pub fn new(authenticator: Authenticator, credentials: Credentials) -> Self {
        Self {
            authenticator,
            credentials,
            session: None,
            block: None,
            verified: false,
            login_attempts: 0,
        }
    }

    /// Start from a session obtained elsewhere, e.g. the setup login.
    pub fn with_session(authenticator: Authenticator, credentials: Credentials, session: Session) -> Self {
        Self {
            session: Some(session),
            verified: true,
            ..Self::new(authenticator, credentials)
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Number of login requests this guard has sent
    pub fn login_attempts(&self) -> u64 {
        self.login_attempts
    }

    pub fn has_valid_session(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_valid)
    }

    /// Return the held session, logging in first if there is none or it was
    /// invalidated. Login failures are returned unchanged.
    pub async fn ensure_session(&mut self) -> Result<&Session, ApiError> {
        if !self.has_valid_session() {
            self.check_block()?;

            // Never reuse an invalidated session
            self.session = None;
            self.login_attempts += 1;
            debug!(attempt = self.login_attempts, "Logging in");

            match self.authenticator.login(&self.credentials).await {
                Ok(session) => {
                    self.block = None;
                    self.verified = true;
                    self.session = Some(session);
                }
                Err(e) => {
                    self.record_failure(&e);
                    return Err(e);
                }
            }
        }

        self.session
            .as_ref()
            .ok_or_else(|| ApiError::AuthenticationProtocol("no session after login".to_string()))
    }

    /// Mark the held session as rejected by the server.
    pub fn invalidate(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if session.is_valid() {
                info!(age_minutes = session.age().num_minutes(), "Session invalidated");
            }
            session.invalidate();
        }
    }

    /// Fold cookies re-issued on a successful request into the held session.
    pub fn absorb_cookies(&mut self, cookies: Vec<SessionCookie>) {
        if cookies.is_empty() {
            return;
        }
        if let Some(session) = self.session.as_mut().filter(|s| s.is_valid()) {
            session.absorb(cookies);
        }
    }

    fn check_block(&self) -> Result<(), ApiError> {
        match self.block {
            None => Ok(()),
            Some(LoginBlock::CoolingDown { until }) => {
                let now = Instant::now();
                if now >= until {
                    Ok(())
                } else {
                    Err(ApiError::RateLimited {
                        retry_after: until - now,
                    })
                }
            }
            Some(LoginBlock::InvalidCredentials) => Err(ApiError::InvalidCredentials),
            Some(LoginBlock::WeakLoginDisabled) => Err(ApiError::WeakLoginDisabled),
        }
    }

    /// Credentials that never worked stay blocked. Once they have worked, a
    /// rejection is not blocked so the next fetch may log in again.
    fn record_failure(&mut self, error: &ApiError) {
        self.block = match error {
            ApiError::RateLimited { retry_after } => Some(LoginBlock::CoolingDown {
                until: Instant::now() + *retry_after,
            }),
            ApiError::InvalidCredentials if self.verified => {
                warn!("Re-login rejected for previously working credentials");
                None
            }
            ApiError::InvalidCredentials => Some(LoginBlock::InvalidCredentials),
            ApiError::WeakLoginDisabled => Some(LoginBlock::WeakLoginDisabled),
            // Transient or protocol trouble: the next cycle may try again
            _ => None,
        };
        if self.block.is_some() {
            warn!(error = %error, "Further logins blocked");
        }
    }

    /// Time left before another login may be attempted
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        match self.block {
            Some(LoginBlock::CoolingDown { until }) => until.checked_duration_since(Instant::now()),
            _ => None,
        }
    }
}
