use chrono::{DateTime, Duration, Utc};

/// One cookie the server set on a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

impl SessionCookie {
    /// Parse the leading `name=value` pair of a `Set-Cookie` header.
    /// Attributes (`Path`, `HttpOnly`, ...) are ignored.
    pub fn parse(set_cookie: &str) -> Option<Self> {
        let pair = set_cookie.split(';').next()?.trim();
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            value: value.trim().trim_matches('"').to_string(),
        })
    }
}

/// Proof of a successful weak login.
///
/// Sessions are never repaired: once invalidated the owner discards the value
/// and logs in again.
#[derive(Debug, Clone)]
pub struct Session {
    cookies: Vec<SessionCookie>,
    created_at: DateTime<Utc>,
    valid: bool,
}

impl Session {
    pub fn new(cookies: Vec<SessionCookie>) -> Self {
        Self {
            cookies,
            created_at: Utc::now(),
            valid: true,
        }
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.created_at
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    pub fn cookies(&self) -> &[SessionCookie] {
        &self.cookies
    }

    /// Value for the `Cookie` request header
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Take over cookies the server re-issued on a later response. Cookies
    /// with the same name are replaced, an empty value removes the cookie.
    pub fn absorb(&mut self, cookies: Vec<SessionCookie>) {
        for cookie in cookies {
            self.cookies.retain(|c| c.name != cookie.name);
            if !cookie.value.is_empty() {
                self.cookies.push(cookie);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_cookie() {
        let cookie = SessionCookie::parse("evaka.eugw.session=abc123; Path=/; HttpOnly; Secure").unwrap();
        assert_eq!(cookie.name, "evaka.eugw.session");
        assert_eq!(cookie.value, "abc123");
    }

    #[test]
    fn test_parse_set_cookie_rejects_garbage() {
        assert!(SessionCookie::parse("").is_none());
        assert!(SessionCookie::parse("novalue").is_none());
        assert!(SessionCookie::parse("=abc").is_none());
    }

    #[test]
    fn test_new_session_is_valid_until_invalidated() {
        let mut session = Session::new(vec![SessionCookie::parse("s=1").unwrap()]);
        assert!(session.is_valid());
        assert!(session.age() < Duration::minutes(1));
        session.invalidate();
        assert!(!session.is_valid());
    }

    #[test]
    fn test_cookie_header_joins_pairs() {
        let session = Session::new(vec![
            SessionCookie::parse("a=1").unwrap(),
            SessionCookie::parse("b=2").unwrap(),
        ]);
        assert_eq!(session.cookie_header(), "a=1; b=2");
    }

    #[test]
    fn test_absorb_replaces_and_removes() {
        let mut session = Session::new(vec![
            SessionCookie::parse("a=1").unwrap(),
            SessionCookie::parse("b=2").unwrap(),
        ]);
        session.absorb(vec![
            SessionCookie::parse("a=9").unwrap(),
            SessionCookie::parse("b=").unwrap(),
        ]);
        assert_eq!(session.cookie_header(), "a=9");
    }
}
