use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD};
use http::{HeaderName, HeaderValue, Method};
use regex::Regex;
use url::Url;

use crate::config::models::{
    AuthenticationConfig, ClientConfiguratorConfig, ContentTypeConfig, MessageFactoryConfig,
    MethodConfig, ProducerConfig, ProxyConfig, RequestHeadersConfig, ResponseBodyConfig,
    parse_duration,
};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Producer configuration validator
pub struct ProducerConfigValidator;

impl ProducerConfigValidator {
    /// Validate the entire producer configuration, reporting every problem at once
    pub fn validate(config: &ProducerConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        match &config.url {
            Some(url) => {
                if let Err(e) = Self::validate_url(url) {
                    errors.push(e);
                }
            }
            None => errors.push(ValidationError::MissingField {
                field: "url".to_string(),
            }),
        }

        if let Err(e) = Self::validate_method(&config.method) {
            errors.push(e);
        }
        if let Err(e) = Self::validate_content_type(&config.content_type) {
            errors.push(e);
        }
        for (index, headers) in config.request_headers.iter().enumerate() {
            if let Err(mut header_errors) = Self::validate_request_headers(index, headers) {
                errors.append(&mut header_errors);
            }
        }
        if let ResponseBodyConfig::Metadata { key } = &config.response_body {
            if key.trim().is_empty() {
                errors.push(ValidationError::MissingField {
                    field: "response_body.key".to_string(),
                });
            }
        }
        if let Err(e) = Self::validate_authentication(&config.authentication) {
            errors.push(e);
        }
        for (index, configurator) in config.client.iter().enumerate() {
            if let Err(mut client_errors) = Self::validate_client(index, configurator) {
                errors.append(&mut client_errors);
            }
        }
        if let Some(timeout) = &config.timeout {
            if let Err(e) = Self::validate_duration("timeout", timeout) {
                errors.push(e);
            }
        }
        if let MessageFactoryConfig::FileBacked { directory } = &config.message_factory {
            if !Path::new(directory).is_dir() {
                errors.push(ValidationError::InvalidField {
                    field: "message_factory.directory".to_string(),
                    message: format!("'{directory}' is not a directory"),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// URLs must be absolute http(s); `%message{..}` tokens are checked with a
    /// placeholder substituted.
    fn validate_url(url: &str) -> ValidationResult<()> {
        let sample_url = Regex::new(r"%message\{[^}]+\}")
            .map(|re| re.replace_all(url, "placeholder").into_owned())
            .unwrap_or_else(|_| url.to_string());
        let parsed = Url::parse(&sample_url).map_err(|e| ValidationError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ValidationError::InvalidUrl {
                url: url.to_string(),
                reason: "URL must start with http:// or https://".to_string(),
            });
        }
        if parsed.host_str().is_none() {
            return Err(ValidationError::InvalidUrl {
                url: url.to_string(),
                reason: "URL has no host".to_string(),
            });
        }
        Ok(())
    }

    fn check_method(field: &str, method: &str) -> ValidationResult<()> {
        Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
            .map(|_| ())
            .map_err(|e| ValidationError::InvalidField {
                field: field.to_string(),
                message: format!("'{method}' is not an HTTP method: {e}"),
            })
    }

    fn validate_method(method: &MethodConfig) -> ValidationResult<()> {
        match method {
            MethodConfig::Configured { method } => Self::check_method("method.method", method),
            MethodConfig::Metadata { key, default } => {
                if key.trim().is_empty() {
                    return Err(ValidationError::MissingField {
                        field: "method.key".to_string(),
                    });
                }
                Self::check_method("method.default", default)
            }
        }
    }

    fn validate_content_type(content_type: &ContentTypeConfig) -> ValidationResult<()> {
        let (field, value) = match content_type {
            ContentTypeConfig::Configured { mime_type } => ("content_type.mime_type", mime_type),
            ContentTypeConfig::Metadata { default, .. } => ("content_type.default", default),
        };
        value
            .parse::<mime::Mime>()
            .map(|_| ())
            .map_err(|e| ValidationError::InvalidField {
                field: field.to_string(),
                message: format!("'{value}' is not a MIME type: {e}"),
            })
    }

    fn validate_request_headers(
        index: usize,
        headers: &RequestHeadersConfig,
    ) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        match headers {
            RequestHeadersConfig::Configured { headers } => {
                for (name, value) in headers {
                    if HeaderName::from_bytes(name.as_bytes()).is_err() {
                        errors.push(ValidationError::InvalidField {
                            field: format!("request_headers[{index}].headers"),
                            message: format!("'{name}' is not a valid header name"),
                        });
                    }
                    if HeaderValue::from_str(value).is_err() {
                        errors.push(ValidationError::InvalidField {
                            field: format!("request_headers[{index}].headers.{name}"),
                            message: "value contains invalid characters".to_string(),
                        });
                    }
                }
            }
            RequestHeadersConfig::Metadata {
                filter: Some(filter),
            } => {
                if let Err(e) = Regex::new(filter) {
                    errors.push(ValidationError::InvalidField {
                        field: format!("request_headers[{index}].filter"),
                        message: format!("Invalid regex: {e}"),
                    });
                }
            }
            _ => {}
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn check_password(password: &str) -> ValidationResult<()> {
        if let Some(encoded) = password.strip_prefix("b64:") {
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| ValidationError::InvalidCredentials {
                    message: format!("Malformed encoded password: {e}"),
                })?;
        }
        Ok(())
    }

    fn validate_authentication(authentication: &AuthenticationConfig) -> ValidationResult<()> {
        match authentication {
            AuthenticationConfig::None => Ok(()),
            AuthenticationConfig::UsernamePassword { username, password } => {
                if username.is_empty() {
                    return Err(ValidationError::MissingField {
                        field: "authentication.username".to_string(),
                    });
                }
                Self::check_password(password)
            }
            AuthenticationConfig::MetadataUsernamePassword {
                username_key,
                password_key,
            } => {
                if username_key.is_empty() || password_key.is_empty() {
                    return Err(ValidationError::MissingField {
                        field: "authentication.username_key/password_key".to_string(),
                    });
                }
                Ok(())
            }
            AuthenticationConfig::AuthorizationHeader { value } => HeaderValue::from_str(value)
                .map(|_| ())
                .map_err(|_| ValidationError::InvalidCredentials {
                    message: "Authorization header value contains invalid characters".to_string(),
                }),
            AuthenticationConfig::MetadataAuthorizationHeader { key } => {
                if key.is_empty() {
                    return Err(ValidationError::MissingField {
                        field: "authentication.key".to_string(),
                    });
                }
                Ok(())
            }
        }
    }

    fn validate_duration(field: &str, value: &str) -> ValidationResult<()> {
        parse_duration(value)
            .map(|_| ())
            .map_err(|e| ValidationError::InvalidField {
                field: field.to_string(),
                message: format!("Invalid duration '{value}': {e}. Use formats like '5s', '1m'"),
            })
    }

    fn validate_client(
        index: usize,
        configurator: &ClientConfiguratorConfig,
    ) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut check_duration = |name: &str, value: &Option<String>| {
            if let Some(value) = value {
                if let Err(e) = Self::validate_duration(&format!("client[{index}].{name}"), value) {
                    errors.push(e);
                }
            }
        };

        match configurator {
            ClientConfiguratorConfig::Default {
                proxy,
                connect_timeout,
                read_timeout,
                ..
            } => {
                check_duration("connect_timeout", connect_timeout);
                check_duration("read_timeout", read_timeout);
                if let ProxyConfig::Custom { url, password, .. } = proxy {
                    if let Err(e) = Url::parse(url) {
                        errors.push(ValidationError::InvalidUrl {
                            url: url.clone(),
                            reason: e.to_string(),
                        });
                    }
                    if let Some(Err(e)) = password.as_deref().map(Self::check_password) {
                        errors.push(e);
                    }
                }
            }
            ClientConfiguratorConfig::Tls {
                native_roots,
                ca_bundle,
            } => {
                if let Some(path) = ca_bundle {
                    if !Path::new(path).is_file() {
                        errors.push(ValidationError::InvalidField {
                            field: format!("client[{index}].ca_bundle"),
                            message: format!("CA bundle '{path}' does not exist"),
                        });
                    }
                } else if !native_roots {
                    errors.push(ValidationError::InvalidField {
                        field: format!("client[{index}]"),
                        message: "TLS needs native_roots or a ca_bundle".to_string(),
                    });
                }
            }
            ClientConfiguratorConfig::ConnectionPool {
                idle_timeout,
                tcp_keepalive,
                ..
            } => {
                check_duration("idle_timeout", idle_timeout);
                check_duration("tcp_keepalive", tcp_keepalive);
            }
            ClientConfiguratorConfig::Interceptors { remove_headers, .. } => {
                for name in remove_headers {
                    if HeaderName::from_bytes(name.as_bytes()).is_err() {
                        errors.push(ValidationError::InvalidField {
                            field: format!("client[{index}].remove_headers"),
                            message: format!("'{name}' is not a valid header name"),
                        });
                    }
                }
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Format multiple validation errors into a user-friendly message
    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} configuration errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn valid() -> ProducerConfig {
        ProducerConfig::builder()
            .url("http://localhost:8080/items/%message{id}")
            .build()
            .unwrap()
    }

    #[test]
    fn test_minimal_config_is_valid() {
        assert!(ProducerConfigValidator::validate(&valid()).is_ok());
    }

    #[test]
    fn test_missing_url() {
        let err = ProducerConfigValidator::validate(&ProducerConfig::default()).unwrap_err();
        assert!(err.to_string().contains("url"));
    }

    #[test]
    fn test_rejects_non_http_url() {
        let mut config = valid();
        config.url = Some("ftp://localhost/".to_string());
        assert!(ProducerConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = valid();
        config.method = MethodConfig::Configured {
            method: "NOT A METHOD".to_string(),
        };
        config.authentication = AuthenticationConfig::UsernamePassword {
            username: "u".to_string(),
            password: "b64:%%%".to_string(),
        };
        config.request_headers.push(RequestHeadersConfig::Metadata {
            filter: Some("(".to_string()),
        });
        config.client.push(ClientConfiguratorConfig::Default {
            proxy: ProxyConfig::System,
            follow_redirects: true,
            max_redirects: None,
            connect_timeout: Some("forever".to_string()),
            read_timeout: None,
            user_agent: None,
        });

        let message = ProducerConfigValidator::validate(&config)
            .unwrap_err()
            .to_string();
        assert!(message.contains("Found 4 configuration errors"), "{message}");
    }

    #[test]
    fn test_rejects_bad_configured_header() {
        let mut config = valid();
        let mut headers = HashMap::new();
        headers.insert("bad header".to_string(), "value".to_string());
        config
            .request_headers
            .push(RequestHeadersConfig::Configured { headers });
        assert!(ProducerConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_tls_without_trust_anchors() {
        let mut config = valid();
        config.client.push(ClientConfiguratorConfig::Tls {
            native_roots: false,
            ca_bundle: None,
        });
        assert!(ProducerConfigValidator::validate(&config).is_err());
    }
}
