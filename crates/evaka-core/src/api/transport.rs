//! HTTP transport for the eVaka citizen API.
//!
//! The transport knows exactly two endpoints. It carries session cookies on
//! requests and hands back any cookies the server sets, but it never decides
//! what a status code means; that is up to the authenticator and fetcher.

use std::time::Duration;

use reqwest::{header, Client, Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::auth::{Session, SessionCookie};
use crate::models::MunicipalityEndpoint;

use super::ApiError;

/// HTTP request timeout in seconds.
/// The portal is slow at peak times but a hung request must not block a cycle.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// eVaka rejects state-changing requests without this header.
const CSRF_HEADER: &str = "x-evaka-csrf";

/// The API paths this client is allowed to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiPath {
    WeakLogin,
    CalendarEvents,
}

impl ApiPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiPath::WeakLogin => "/api/citizen/auth/weak-login",
            ApiPath::CalendarEvents => "/api/citizen/calendar-events",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            ApiPath::WeakLogin => Method::POST,
            ApiPath::CalendarEvents => Method::GET,
        }
    }
}

/// Status, parsed body and session material of one response.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    /// JSON body; `Null` when empty. Non-JSON error bodies are kept as a
    /// truncated string.
    pub body: Value,
    pub cookies: Vec<SessionCookie>,
    pub retry_after: Option<Duration>,
}

impl ApiResponse {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
    }
}

/// Transport for one municipality.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct Transport {
    client: Client,
    endpoint: MunicipalityEndpoint,
}

impl Transport {
    pub fn new(endpoint: MunicipalityEndpoint) -> Result<Self, ApiError> {
        Self::with_timeout(endpoint, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(endpoint: MunicipalityEndpoint, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("evaka-calendar/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &MunicipalityEndpoint {
        &self.endpoint
    }

    /// Send one request. The method is fixed by the path.
    ///
    /// Connection failures and timeouts come back as `NetworkError`. A
    /// successful status with a body that is not JSON is `MalformedResponse`.
    /// Every other status is returned to the caller untouched.
    pub async fn request(
        &self,
        path: ApiPath,
        query: &[(&str, String)],
        body: Option<&Value>,
        session: Option<&Session>,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.endpoint.url(path.as_str());

        let mut request = self
            .client
            .request(path.method(), &url)
            .header(header::ACCEPT, "application/json")
            .header(CSRF_HEADER, "1");

        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(session) = session {
            request = request.header(header::COOKIE, session.cookie_header());
        }

        let response = request.send().await?;
        let status = response.status();
        let cookies = Self::session_cookies(response.headers());
        let retry_after = Self::retry_after(response.headers());

        let text = response.text().await?;
        debug!(path = path.as_str(), status = %status, bytes = text.len(), "API response");

        let body = Self::parse_body(status, &text)?;

        Ok(ApiResponse {
            status,
            body,
            cookies,
            retry_after,
        })
    }

    fn parse_body(status: StatusCode, text: &str) -> Result<Value, ApiError> {
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        match serde_json::from_str(text) {
            Ok(value) => Ok(value),
            Err(e) if status.is_success() => Err(ApiError::MalformedResponse(format!(
                "{} (body: {})",
                e,
                ApiError::truncate_body(text)
            ))),
            Err(_) => Ok(Value::String(ApiError::truncate_body(text))),
        }
    }

    fn session_cookies(headers: &header::HeaderMap) -> Vec<SessionCookie> {
        headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(SessionCookie::parse)
            .collect()
    }

    fn retry_after(headers: &header::HeaderMap) -> Option<Duration> {
        headers
            .get(header::RETRY_AFTER)?
            .to_str()
            .ok()?
            .trim()
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header as header_is, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::models::Municipality;

    fn transport_for(server: &MockServer) -> Transport {
        let endpoint = MunicipalityEndpoint::with_base_url(Municipality::Espoo, &server.uri()).unwrap();
        Transport::new(endpoint).unwrap()
    }

    #[tokio::test]
    async fn test_login_request_shape_and_cookies() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/citizen/auth/weak-login"))
            .and(header_is("x-evaka-csrf", "1"))
            .and(body_json(json!({"username": "u", "password": "p"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .append_header("set-cookie", "evaka.session=abc; Path=/; HttpOnly"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let body = json!({"username": "u", "password": "p"});
        let response = transport
            .request(ApiPath::WeakLogin, &[], Some(&body), None)
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, Value::Null);
        assert_eq!(response.cookies.len(), 1);
        assert_eq!(response.cookies[0].name, "evaka.session");
    }

    #[tokio::test]
    async fn test_session_cookie_and_query_sent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/citizen/calendar-events"))
            .and(query_param("start", "2025-06-02"))
            .and(header_is("cookie", "evaka.session=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let session = Session::new(vec![SessionCookie::parse("evaka.session=abc").unwrap()]);
        let response = transport
            .request(
                ApiPath::CalendarEvents,
                &[("start", "2025-06-02".to_string())],
                None,
                Some(&session),
            )
            .await
            .unwrap();

        assert_eq!(response.body, json!([]));
    }

    #[tokio::test]
    async fn test_malformed_success_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let result = transport_for(&server)
            .request(ApiPath::CalendarEvents, &[], None, None)
            .await;
        assert!(matches!(result, Err(ApiError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_non_json_error_body_is_kept_as_text() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let response = transport_for(&server)
            .request(ApiPath::CalendarEvents, &[], None, None)
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::BAD_GATEWAY);
        assert_eq!(response.body, Value::String("Bad Gateway".into()));
    }

    #[tokio::test]
    async fn test_retry_after_header() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).append_header("retry-after", "120"))
            .mount(&server)
            .await;

        let response = transport_for(&server)
            .request(ApiPath::WeakLogin, &[], None, None)
            .await
            .unwrap();
        assert_eq!(response.retry_after, Some(Duration::from_secs(120)));
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let endpoint = MunicipalityEndpoint::with_base_url(Municipality::Oulu, &server.uri()).unwrap();
        let transport = Transport::with_timeout(endpoint, Duration::from_millis(50)).unwrap();
        let result = transport.request(ApiPath::CalendarEvents, &[], None, None).await;
        assert!(matches!(result, Err(ApiError::NetworkError(_))));
    }

    #[test]
    fn test_paths_are_fixed() {
        assert_eq!(ApiPath::WeakLogin.method(), Method::POST);
        assert_eq!(ApiPath::CalendarEvents.method(), Method::GET);
        assert_eq!(ApiPath::CalendarEvents.as_str(), "/api/citizen/calendar-events");
    }
}
