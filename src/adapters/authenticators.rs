//! Built-in authenticators.
//!
//! Two families exist. Registry authenticators install credentials into an
//! [`AuthenticatorRegistry`] for the lifetime of the request and answer
//! challenges reactively. Header authenticators put an `Authorization` header
//! straight onto the outgoing request.
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use http::{HeaderValue, header};

use crate::{
    core::{
        auth::{AuthenticatorRegistry, Credentials, NoopContext, RegisteredCredentials},
        message::Message,
        target::{RequestTarget, ResourceTargetMatcher},
    },
    ports::{
        authenticator::{AuthenticationContext, HttpAuthenticator},
        message_producer::{ProduceError, ProduceResult},
    },
};

/// Prefix marking a base64 encoded secret.
pub const ENCODED_PREFIX: &str = "b64:";

/// Decode a configured secret; plain text unless prefixed with [`ENCODED_PREFIX`].
pub fn decode_password(raw: &str) -> ProduceResult<String> {
    let Some(encoded) = raw.strip_prefix(ENCODED_PREFIX) else {
        return Ok(raw.to_string());
    };
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ProduceError::Configuration(format!("Malformed encoded password: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|_| ProduceError::Configuration("Encoded password is not valid UTF-8".to_string()))
}

fn required_metadata<'a>(message: &'a Message, key: &str) -> ProduceResult<&'a str> {
    message.metadata_value(key).ok_or_else(|| {
        ProduceError::Configuration(format!("Message has no '{key}' metadata for authentication"))
    })
}

/// No credentials at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthentication;

impl HttpAuthenticator for NoAuthentication {
    fn setup(
        &self,
        _target: &RequestTarget,
        _message: &Message,
        _matcher: ResourceTargetMatcher,
    ) -> ProduceResult<Box<dyn AuthenticationContext>> {
        Ok(Box::new(NoopContext))
    }
}

/// Static username/password answered on challenge.
pub struct ConfiguredUsernamePassword {
    username: String,
    password: String,
    registry: Arc<AuthenticatorRegistry>,
}

impl ConfiguredUsernamePassword {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            registry: AuthenticatorRegistry::global(),
        }
    }

    /// Use a private registry instead of the process-wide one.
    pub fn with_registry(mut self, registry: Arc<AuthenticatorRegistry>) -> Self {
        self.registry = registry;
        self
    }
}

impl HttpAuthenticator for ConfiguredUsernamePassword {
    fn setup(
        &self,
        _target: &RequestTarget,
        _message: &Message,
        matcher: ResourceTargetMatcher,
    ) -> ProduceResult<Box<dyn AuthenticationContext>> {
        let credentials = Credentials::new(&self.username, decode_password(&self.password)?);
        Ok(Box::new(RegisteredCredentials::install(
            self.registry.clone(),
            matcher,
            credentials,
        )))
    }
}

/// Username/password read from message metadata, answered on challenge.
pub struct MetadataUsernamePassword {
    username_key: String,
    password_key: String,
    registry: Arc<AuthenticatorRegistry>,
}

impl MetadataUsernamePassword {
    pub fn new(username_key: impl Into<String>, password_key: impl Into<String>) -> Self {
        Self {
            username_key: username_key.into(),
            password_key: password_key.into(),
            registry: AuthenticatorRegistry::global(),
        }
    }

    pub fn with_registry(mut self, registry: Arc<AuthenticatorRegistry>) -> Self {
        self.registry = registry;
        self
    }
}

impl HttpAuthenticator for MetadataUsernamePassword {
    fn setup(
        &self,
        _target: &RequestTarget,
        message: &Message,
        matcher: ResourceTargetMatcher,
    ) -> ProduceResult<Box<dyn AuthenticationContext>> {
        let username = required_metadata(message, &self.username_key)?;
        let password = decode_password(required_metadata(message, &self.password_key)?)?;
        Ok(Box::new(RegisteredCredentials::install(
            self.registry.clone(),
            matcher,
            Credentials::new(username, password),
        )))
    }
}

/// Context that stamps an `Authorization` header on the request.
struct AuthorizationHeaderContext {
    value: HeaderValue,
}

impl AuthorizationHeaderContext {
    fn new(value: &str) -> ProduceResult<Self> {
        let mut value = HeaderValue::from_str(value).map_err(|e| {
            ProduceError::Configuration(format!("Invalid Authorization header value: {e}"))
        })?;
        value.set_sensitive(true);
        Ok(Self { value })
    }
}

impl AuthenticationContext for AuthorizationHeaderContext {
    fn configure(&self, request: &mut reqwest::Request) -> ProduceResult<()> {
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, self.value.clone());
        Ok(())
    }

    fn close(&mut self) {}
}

/// A fixed `Authorization` header value.
#[derive(Clone)]
pub struct ConfiguredAuthorizationHeader {
    value: String,
}

impl ConfiguredAuthorizationHeader {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Preemptive HTTP Basic credentials.
    pub fn basic(username: &str, password: &str) -> ProduceResult<Self> {
        let credentials = Credentials::new(username, decode_password(password)?);
        Ok(Self::new(credentials.basic_authorization()))
    }
}

impl HttpAuthenticator for ConfiguredAuthorizationHeader {
    fn setup(
        &self,
        _target: &RequestTarget,
        _message: &Message,
        _matcher: ResourceTargetMatcher,
    ) -> ProduceResult<Box<dyn AuthenticationContext>> {
        Ok(Box::new(AuthorizationHeaderContext::new(&self.value)?))
    }
}

/// `Authorization` header value read from a metadata key.
#[derive(Debug, Clone)]
pub struct MetadataAuthorizationHeader {
    key: String,
}

impl MetadataAuthorizationHeader {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl HttpAuthenticator for MetadataAuthorizationHeader {
    fn setup(
        &self,
        _target: &RequestTarget,
        message: &Message,
        _matcher: ResourceTargetMatcher,
    ) -> ProduceResult<Box<dyn AuthenticationContext>> {
        let value = required_metadata(message, &self.key)?;
        Ok(Box::new(AuthorizationHeaderContext::new(value)?))
    }
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;
    use crate::core::target::Challenge;

    const URL: &str = "http://localhost:8080/secure";

    fn target() -> RequestTarget {
        RequestTarget::parse(URL).unwrap()
    }

    fn matcher() -> ResourceTargetMatcher {
        ResourceTargetMatcher::new(target())
    }

    fn request() -> reqwest::Request {
        reqwest::Request::new(Method::GET, URL.parse().unwrap())
    }

    #[test]
    fn test_decode_password() {
        assert_eq!(decode_password("plain").unwrap(), "plain");
        assert_eq!(decode_password("b64:c2VjcmV0").unwrap(), "secret");
        assert!(decode_password("b64:!!!").unwrap_err().is_configuration());
    }

    #[test]
    fn test_configured_credentials_installed_until_close() {
        let registry = Arc::new(AuthenticatorRegistry::new());
        let auth = ConfiguredUsernamePassword::new("user", "b64:cGFzcw==")
            .with_registry(registry.clone());

        let mut ctx = auth.setup(&target(), &Message::new(), matcher()).unwrap();
        let creds = registry.resolve(&Challenge::for_url(URL)).unwrap();
        assert_eq!(creds.username(), "user");
        assert_eq!(creds.password(), "pass");

        ctx.close();
        ctx.close();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_malformed_password_installs_nothing() {
        let registry = Arc::new(AuthenticatorRegistry::new());
        let auth =
            ConfiguredUsernamePassword::new("user", "b64:%%%").with_registry(registry.clone());
        let err = auth.setup(&target(), &Message::new(), matcher()).err().unwrap();
        assert!(err.is_configuration());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_metadata_credentials_required() {
        let registry = Arc::new(AuthenticatorRegistry::new());
        let auth = MetadataUsernamePassword::new("user", "pass").with_registry(registry.clone());

        let mut msg = Message::new();
        msg.add_metadata("user", "alice");
        assert!(auth.setup(&target(), &msg, matcher()).is_err());

        msg.add_metadata("pass", "wonderland");
        let _ctx = auth.setup(&target(), &msg, matcher()).unwrap();
        assert_eq!(
            registry
                .resolve(&Challenge::for_url(URL))
                .unwrap()
                .password(),
            "wonderland"
        );
    }

    #[test]
    fn test_configured_header_configures_request() {
        let auth = ConfiguredAuthorizationHeader::basic("Aladdin", "open sesame").unwrap();
        let ctx = auth.setup(&target(), &Message::new(), matcher()).unwrap();
        let mut req = request();
        ctx.configure(&mut req).unwrap();
        let value = &req.headers()[header::AUTHORIZATION];
        assert_eq!(value, "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
        assert!(value.is_sensitive());
    }

    #[test]
    fn test_metadata_header() {
        let auth = MetadataAuthorizationHeader::new("token");
        assert!(auth.setup(&target(), &Message::new(), matcher()).is_err());

        let mut msg = Message::new();
        msg.add_metadata("token", "Bearer abc");
        let ctx = auth.setup(&target(), &msg, matcher()).unwrap();
        let mut req = request();
        ctx.configure(&mut req).unwrap();
        assert_eq!(req.headers()[header::AUTHORIZATION], "Bearer abc");
    }

    #[test]
    fn test_invalid_header_value_is_configuration_error() {
        let auth = ConfiguredAuthorizationHeader::new("bad\nvalue");
        let err = auth.setup(&target(), &Message::new(), matcher()).err().unwrap();
        assert!(err.is_configuration());
    }
}
