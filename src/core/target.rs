//! Request targets and the matcher that scopes authentication challenges.
use std::{fmt, str::FromStr};

use url::Url;

use crate::ports::message_producer::{ProduceError, ProduceResult};

/// Port used when a URL does not carry one and its scheme has no well known default.
fn default_port(scheme: &str) -> Option<u16> {
    match scheme.to_ascii_lowercase().as_str() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// A resolved absolute URL with its derived host, port and scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    url: Url,
    host: String,
    port: u16,
}

impl RequestTarget {
    /// Derive a target from a URL string.
    ///
    /// # Errors
    /// A configuration error when the URL does not parse, has no host, or uses a
    /// scheme without a known default port.
    pub fn parse(url: &str) -> ProduceResult<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| ProduceError::Configuration(format!("Invalid URL '{url}': {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| ProduceError::Configuration(format!("URL '{url}' has no host")))?
            .to_ascii_lowercase();
        let port = parsed
            .port_or_known_default()
            .or_else(|| default_port(parsed.scheme()))
            .ok_or_else(|| {
                ProduceError::Configuration(format!(
                    "URL '{url}' has no port and scheme '{}' has no default",
                    parsed.scheme()
                ))
            })?;
        Ok(Self {
            url: parsed,
            host,
            port,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// The explicit port, or the scheme default (80 for http, 443 for https).
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }
}

impl FromStr for RequestTarget {
    type Err = ProduceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RequestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// A credential challenge raised while a request was in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    /// The challenge names the URL that was being requested.
    Url(String),
    /// Only the origin of the challenge is known (proxies, legacy transports).
    Origin {
        host: String,
        port: Option<u16>,
        scheme: String,
    },
}

impl Challenge {
    pub fn for_url(url: impl Into<String>) -> Self {
        Challenge::Url(url.into())
    }

    pub fn for_origin(host: impl Into<String>, port: Option<u16>, scheme: impl Into<String>) -> Self {
        Challenge::Origin {
            host: host.into(),
            port,
            scheme: scheme.into(),
        }
    }
}

/// Decides whether a challenge belongs to the request it was built for.
///
/// URL challenges match when they name the same resource: scheme, host and
/// port (defaults applied) compared separately, then path and query compared
/// exactly. Origin challenges match on host (case-insensitive) and port; the
/// scheme is not compared because login realms are not assumed to differ by
/// scheme. Anything that fails to parse does not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTargetMatcher {
    target: RequestTarget,
}

impl ResourceTargetMatcher {
    pub fn new(target: RequestTarget) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &RequestTarget {
        &self.target
    }

    pub fn matches(&self, challenge: &Challenge) -> bool {
        match challenge {
            Challenge::Url(url) => self.same_resource(url),
            Challenge::Origin { host, port, scheme } => {
                let port = port.or_else(|| default_port(scheme));
                host.eq_ignore_ascii_case(self.target.host()) && port == Some(self.target.port())
            }
        }
    }

    fn same_resource(&self, url: &str) -> bool {
        let Ok(other) = Url::parse(url) else {
            return false;
        };
        let ours = self.target.url();
        other.scheme().eq_ignore_ascii_case(ours.scheme())
            && other
                .host_str()
                .is_some_and(|h| h.eq_ignore_ascii_case(self.target.host()))
            && other.port_or_known_default() == Some(self.target.port())
            && other.path() == ours.path()
            && other.query() == ours.query()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(url: &str) -> ResourceTargetMatcher {
        ResourceTargetMatcher::new(RequestTarget::parse(url).unwrap())
    }

    #[test]
    fn test_target_defaults_port_from_scheme() {
        let http = RequestTarget::parse("http://Example.com/a").unwrap();
        assert_eq!(http.host(), "example.com");
        assert_eq!(http.port(), 80);
        assert_eq!(http.scheme(), "http");

        let https = RequestTarget::parse("https://example.com").unwrap();
        assert_eq!(https.port(), 443);

        let explicit = RequestTarget::parse("http://example.com:8080/").unwrap();
        assert_eq!(explicit.port(), 8080);
    }

    #[test]
    fn test_target_rejects_invalid_urls() {
        assert!(RequestTarget::parse("not a url").unwrap_err().is_configuration());
        assert!(RequestTarget::parse("mailto:someone@example.com").is_err());
    }

    #[test]
    fn test_url_challenge_is_reflexive() {
        let url = "http://localhost:8080/some/path?x=1";
        assert!(matcher(url).matches(&Challenge::for_url(url)));
    }

    #[test]
    fn test_url_challenge_tolerates_default_port_and_case() {
        let m = matcher("http://example.com/resource");
        assert!(m.matches(&Challenge::for_url("http://EXAMPLE.com:80/resource")));
    }

    #[test]
    fn test_url_challenge_rejects_other_resources() {
        let m = matcher("http://example.com:8080/resource?a=1");
        assert!(!m.matches(&Challenge::for_url("http://example.com:8080/other?a=1")));
        assert!(!m.matches(&Challenge::for_url("http://example.com:8080/resource?a=2")));
        assert!(!m.matches(&Challenge::for_url("http://example.com:9090/resource?a=1")));
        assert!(!m.matches(&Challenge::for_url("http://other.com:8080/resource?a=1")));
        assert!(!m.matches(&Challenge::for_url("https://example.com:8080/resource?a=1")));
    }

    #[test]
    fn test_unparseable_challenge_does_not_match() {
        let m = matcher("http://example.com/");
        assert!(!m.matches(&Challenge::for_url("::not a url::")));
    }

    #[test]
    fn test_origin_challenge_ignores_scheme() {
        let m = matcher("http://example.com:8443/x");
        assert!(m.matches(&Challenge::for_origin("EXAMPLE.COM", Some(8443), "https")));
    }

    #[test]
    fn test_origin_challenge_applies_default_port() {
        let m = matcher("https://example.com/x");
        assert!(m.matches(&Challenge::for_origin("example.com", None, "https")));
        assert!(!m.matches(&Challenge::for_origin("example.com", None, "http")));
    }

    #[test]
    fn test_origin_challenge_rejects_other_host_or_port() {
        let m = matcher("http://example.com:8080/");
        assert!(!m.matches(&Challenge::for_origin("example.org", Some(8080), "http")));
        assert!(!m.matches(&Challenge::for_origin("example.com", Some(8081), "http")));
    }
}
