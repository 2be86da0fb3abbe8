use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::api::ApiError;

/// Municipalities running eVaka with weak login enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Municipality {
    Espoo,
    Oulu,
    Tampere,
    Turku,
}

impl Municipality {
    pub const ALL: [Municipality; 4] = [
        Municipality::Espoo,
        Municipality::Oulu,
        Municipality::Tampere,
        Municipality::Turku,
    ];

    /// Identifier used in configuration
    pub fn id(&self) -> &'static str {
        match self {
            Municipality::Espoo => "espoo",
            Municipality::Oulu => "oulu",
            Municipality::Tampere => "tampere",
            Municipality::Turku => "turku",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Municipality::Espoo => "Espoo",
            Municipality::Oulu => "Oulu",
            Municipality::Tampere => "Tampere",
            Municipality::Turku => "Turku",
        }
    }

    /// Citizen portal base URL
    pub fn base_url(&self) -> &'static str {
        match self {
            Municipality::Espoo => "https://espoonvarhaiskasvatus.fi",
            Municipality::Oulu => "https://varhaiskasvatus.ouka.fi",
            Municipality::Tampere => "https://varhaiskasvatus.tampere.fi",
            Municipality::Turku => "https://varhaiskasvatus.turku.fi",
        }
    }
}

impl fmt::Display for Municipality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Municipality {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Municipality::ALL
            .into_iter()
            .find(|m| m.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ApiError::UnsupportedMunicipality(wanted.to_string()))
    }
}

/// Where requests for one municipality are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MunicipalityEndpoint {
    pub municipality: Municipality,
    pub base_url: String,
}

impl MunicipalityEndpoint {
    pub fn for_municipality(municipality: Municipality) -> Self {
        Self {
            municipality,
            base_url: municipality.base_url().to_string(),
        }
    }

    /// Same municipality, different host. Used for proxies and mock servers.
    pub fn with_base_url(municipality: Municipality, base_url: &str) -> Result<Self, ApiError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidBaseUrl(format!("{base_url}: must be http or https")));
        }
        Ok(Self {
            municipality,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("espoo".parse::<Municipality>().unwrap(), Municipality::Espoo);
        assert_eq!("Oulu".parse::<Municipality>().unwrap(), Municipality::Oulu);
        assert_eq!(" TAMPERE ".parse::<Municipality>().unwrap(), Municipality::Tampere);
        assert_eq!("turku".parse::<Municipality>().unwrap(), Municipality::Turku);
    }

    #[test]
    fn test_parse_unsupported_fails_fast() {
        let err = "helsinki".parse::<Municipality>().unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedMunicipality(ref m) if m == "helsinki"));
        assert!("".parse::<Municipality>().is_err());
    }

    #[test]
    fn test_every_base_url_parses() {
        for municipality in Municipality::ALL {
            let endpoint = MunicipalityEndpoint::for_municipality(municipality);
            let parsed = Url::parse(&endpoint.base_url).unwrap();
            assert_eq!(parsed.scheme(), "https");
        }
    }

    #[test]
    fn test_with_base_url_rejects_garbage() {
        assert!(matches!(
            MunicipalityEndpoint::with_base_url(Municipality::Espoo, "not a url"),
            Err(ApiError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            MunicipalityEndpoint::with_base_url(Municipality::Oulu, "ftp://example.com"),
            Err(ApiError::InvalidBaseUrl(_))
        ));
        let endpoint =
            MunicipalityEndpoint::with_base_url(Municipality::Turku, "http://127.0.0.1:8080/").unwrap();
        assert_eq!(endpoint.municipality, Municipality::Turku);
        assert_eq!(
            endpoint.url("/api/citizen/calendar-events"),
            "http://127.0.0.1:8080/api/citizen/calendar-events"
        );
    }
}
