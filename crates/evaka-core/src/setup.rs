//! The setup boundary: validate what the user typed by logging in once.

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiError, Transport};
use crate::auth::{Authenticator, Credentials, SessionGuard};
use crate::calendar::CalendarFetcher;
use crate::models::MunicipalityEndpoint;

/// Setup failure with a stable key for the host's localized messages.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct SetupError(#[from] ApiError);

impl SetupError {
    /// One of `invalid_auth`, `weak_login_disabled`, `rate_limited`,
    /// `cannot_connect`, `unsupported_municipality`, `invalid_base_url` or
    /// `unknown`.
    pub fn key(&self) -> &'static str {
        self.0.setup_error_key()
    }

    pub fn api_error(&self) -> &ApiError {
        &self.0
    }
}

/// Log in with freshly entered details and return a client that reuses the
/// resulting session for its first fetch.
///
/// An unsupported municipality fails before any network traffic.
pub async fn connect(
    municipality: &str,
    username: &str,
    password: &str,
    base_url: Option<&str>,
) -> Result<CalendarFetcher, SetupError> {
    let (credentials, transport) = prepare(municipality, username, password, base_url)?;
    let authenticator = Authenticator::new(transport.clone());

    let session = match authenticator.login(&credentials).await {
        Ok(session) => session,
        Err(e) => {
            warn!(municipality = %credentials.municipality, error = %e, "Setup login failed");
            return Err(e.into());
        }
    };
    info!(municipality = %credentials.municipality, "Account verified");

    let guard = SessionGuard::with_session(authenticator, credentials, session);
    Ok(CalendarFetcher::new(transport, guard))
}

/// Build a client for an account verified earlier, e.g. after a host
/// restart. No request is sent; the first fetch logs in.
pub fn from_stored(
    municipality: &str,
    username: &str,
    password: &str,
    base_url: Option<&str>,
) -> Result<CalendarFetcher, SetupError> {
    let (credentials, transport) = prepare(municipality, username, password, base_url)?;
    let guard = SessionGuard::new(Authenticator::new(transport.clone()), credentials);
    Ok(CalendarFetcher::new(transport, guard))
}

fn prepare(
    municipality: &str,
    username: &str,
    password: &str,
    base_url: Option<&str>,
) -> Result<(Credentials, Transport), ApiError> {
    let credentials = Credentials::parse(municipality, username, password)?;
    let endpoint = match base_url {
        Some(url) => MunicipalityEndpoint::with_base_url(credentials.municipality, url)?,
        None => MunicipalityEndpoint::for_municipality(credentials.municipality),
    };
    let transport = Transport::new(endpoint)?;
    Ok((credentials, transport))
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::models::Municipality;

    const LOGIN_PATH: &str = "/api/citizen/auth/weak-login";

    async fn server_answering(template: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(template)
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_connect_success_reuses_setup_session() {
        let server = server_answering(
            ResponseTemplate::new(200).append_header("set-cookie", "evaka.eugw.session=s1; Path=/"),
        )
        .await;

        let fetcher = connect("Espoo", " parent@example.com ", "pw", Some(&server.uri()))
            .await
            .unwrap();
        assert_eq!(fetcher.municipality(), Municipality::Espoo);
        assert!(fetcher.guard().has_valid_session());
        assert_eq!(fetcher.guard().login_attempts(), 0);
        assert_eq!(fetcher.guard().credentials().username, "parent@example.com");
    }

    #[tokio::test]
    async fn test_wrong_password_blocks_setup() {
        let server = server_answering(ResponseTemplate::new(401)).await;
        let err = connect("oulu", "parent@example.com", "wrong", Some(&server.uri()))
            .await
            .err()
            .unwrap();
        assert_eq!(err.key(), "invalid_auth");
        assert!(matches!(err.api_error(), ApiError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_weak_login_disabled_key() {
        let server = server_answering(ResponseTemplate::new(403)).await;
        let err = connect("tampere", "u", "p", Some(&server.uri())).await.err().unwrap();
        assert_eq!(err.key(), "weak_login_disabled");
        assert!(err.to_string().contains("profile settings"));
    }

    #[tokio::test]
    async fn test_rate_limited_key() {
        let server = server_answering(ResponseTemplate::new(429)).await;
        let err = connect("turku", "u", "p", Some(&server.uri())).await.err().unwrap();
        assert_eq!(err.key(), "rate_limited");
    }

    #[tokio::test]
    async fn test_unsupported_municipality_fails_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = connect("helsinki", "u", "p", Some(&server.uri())).await.err().unwrap();
        assert_eq!(err.key(), "unsupported_municipality");
    }

    #[test]
    fn test_from_stored_defers_login() {
        let fetcher = from_stored("Turku", "u", "p", None).unwrap();
        assert_eq!(fetcher.municipality(), Municipality::Turku);
        assert!(!fetcher.guard().has_valid_session());
        assert_eq!(fetcher.guard().login_attempts(), 0);

        let err = from_stored("vantaa", "u", "p", None).err().unwrap();
        assert_eq!(err.key(), "unsupported_municipality");
    }

    #[tokio::test]
    async fn test_bad_base_url_is_a_configuration_error() {
        let err = connect("espoo", "u", "p", Some("not a url")).await.err().unwrap();
        assert_eq!(err.key(), "invalid_base_url");
        assert!(matches!(err.api_error(), ApiError::InvalidBaseUrl(_)));
    }

    #[tokio::test]
    async fn test_unreachable_portal_is_cannot_connect() {
        let err = connect("espoo", "u", "p", Some("http://127.0.0.1:9")).await.err().unwrap();
        assert_eq!(err.key(), "cannot_connect");
    }
}
