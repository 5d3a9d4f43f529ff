//! Reactive answer to `401` Basic challenges.
//!
//! Authenticators backed by the [`AuthenticatorRegistry`] never touch the
//! outgoing request. When the server challenges, the responder looks up the
//! registration whose matcher claims the challenged URL and hands back the
//! credentials for a single re-send.
use std::sync::Arc;

use http::{HeaderMap, StatusCode, header};
use url::Url;

use crate::core::{
    auth::{AuthenticatorRegistry, Credentials},
    target::Challenge,
};

/// Whether any `WWW-Authenticate` header offers the Basic scheme.
pub fn offers_basic(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|part| part.split_whitespace().next())
        .any(|scheme| scheme.eq_ignore_ascii_case("basic"))
}

#[derive(Clone)]
pub struct ChallengeResponder {
    registry: Arc<AuthenticatorRegistry>,
}

impl ChallengeResponder {
    pub fn new(registry: Arc<AuthenticatorRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<AuthenticatorRegistry> {
        &self.registry
    }

    /// Credentials to answer a response with, if it is an unanswered Basic
    /// challenge for `url` claimed by a registration.
    pub fn respond(
        &self,
        status: StatusCode,
        headers: &HeaderMap,
        url: &Url,
        sent_authorization: bool,
    ) -> Option<Credentials> {
        if sent_authorization || status != StatusCode::UNAUTHORIZED || !offers_basic(headers) {
            return None;
        }
        let credentials = self.registry.resolve(&Challenge::for_url(url.as_str()));
        match &credentials {
            Some(found) => tracing::debug!(
                url = %url,
                username = found.username(),
                "Answering Basic challenge"
            ),
            None => tracing::debug!(url = %url, "No credentials claim this challenge"),
        }
        credentials
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;
    use crate::core::target::{RequestTarget, ResourceTargetMatcher};

    fn challenge(www_authenticate: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(www_authenticate));
        headers
    }

    fn url(raw: &str) -> Url {
        raw.parse().unwrap()
    }

    fn responder_for(url: &str) -> ChallengeResponder {
        let registry = Arc::new(AuthenticatorRegistry::new());
        registry.install(
            ResourceTargetMatcher::new(RequestTarget::parse(url).unwrap()),
            Credentials::new("user", "secret"),
        );
        ChallengeResponder::new(registry)
    }

    #[test]
    fn test_offers_basic() {
        let mut headers = HeaderMap::new();
        assert!(!offers_basic(&headers));
        headers.append(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Bearer realm=\"api\""),
        );
        assert!(!offers_basic(&headers));
        headers.append(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("basic realm=\"api\""),
        );
        assert!(offers_basic(&headers));
    }

    #[test]
    fn test_responds_to_claimed_challenge() {
        let responder = responder_for("http://localhost:8080/secure");
        let creds = responder
            .respond(
                StatusCode::UNAUTHORIZED,
                &challenge("Basic realm=\"x\""),
                &url("http://localhost:8080/secure"),
                false,
            )
            .unwrap();
        assert_eq!(creds.username(), "user");
    }

    #[test]
    fn test_ignores_other_resources_and_repeats() {
        let responder = responder_for("http://localhost:8080/secure");
        let basic = challenge("Basic realm=\"x\"");
        let other = url("http://localhost:8080/other");
        assert!(responder.respond(StatusCode::UNAUTHORIZED, &basic, &other, false).is_none());

        let same = url("http://localhost:8080/secure");
        assert!(responder.respond(StatusCode::UNAUTHORIZED, &basic, &same, true).is_none());
        assert!(responder.respond(StatusCode::FORBIDDEN, &basic, &same, false).is_none());
    }

    #[test]
    fn test_ignores_non_basic_schemes() {
        let responder = responder_for("http://localhost:8080/secure");
        let digest = challenge("Digest realm=\"x\"");
        let secure = url("http://localhost:8080/secure");
        assert!(responder.respond(StatusCode::UNAUTHORIZED, &digest, &secure, false).is_none());
    }
}
