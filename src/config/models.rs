//! Configuration data structures for a courier producer.
//!
//! These types map directly to YAML (also JSON / TOML / INI) configuration files.
//! Every pluggable strategy is a tagged enum selected by its `type` field, and
//! defaults keep minimal configs short: a producer only needs a `url`.
use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_content_type() -> String {
    "text/plain".to_string()
}

/// Parse a human readable duration such as `"30s"` or `"1m 30s"`.
pub fn parse_duration(value: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(value.trim())
}

/// How the HTTP method of each request is chosen.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum MethodConfig {
    Configured {
        #[serde(default = "default_method")]
        method: String,
    },
    /// Method name read from a metadata key, falling back to `default`.
    Metadata {
        key: String,
        #[serde(default = "default_method")]
        default: String,
    },
}

impl Default for MethodConfig {
    fn default() -> Self {
        MethodConfig::Configured {
            method: default_method(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum ContentTypeConfig {
    Configured {
        #[serde(default = "default_content_type")]
        mime_type: String,
    },
    Metadata {
        key: String,
        #[serde(default = "default_content_type")]
        default: String,
    },
}

impl Default for ContentTypeConfig {
    fn default() -> Self {
        ContentTypeConfig::Configured {
            mime_type: default_content_type(),
        }
    }
}

/// Headers added to each outgoing request. Several entries are applied in order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum RequestHeadersConfig {
    Configured {
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    /// Every metadata entry whose key matches `filter` (all when unset).
    Metadata {
        #[serde(default)]
        filter: Option<String>,
    },
    /// Raw header values stored in object metadata under `prefix`.
    ObjectMetadata {
        #[serde(default)]
        prefix: String,
    },
}

/// Where response headers end up. An empty list discards them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum ResponseHeadersConfig {
    Discard,
    Metadata {
        #[serde(default)]
        prefix: Option<String>,
    },
    ObjectMetadata {
        #[serde(default)]
        prefix: Option<String>,
    },
}

/// What happens to a successful response body.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum ResponseBodyConfig {
    /// Replace the message payload with the body.
    #[default]
    Payload,
    /// Store the body as text under a metadata key.
    Metadata { key: String },
}

/// Credentials attached to each request.
///
/// Passwords may be written as `b64:<base64>`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationConfig {
    #[default]
    None,
    /// Answered when the server issues a Basic challenge.
    UsernamePassword { username: String, password: String },
    MetadataUsernamePassword {
        username_key: String,
        password_key: String,
    },
    /// Sent up front as the `Authorization` header.
    AuthorizationHeader { value: String },
    MetadataAuthorizationHeader { key: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(tag = "mode")]
#[serde(rename_all = "snake_case")]
pub enum ProxyConfig {
    #[default]
    System,
    #[serde(alias = "none")]
    Direct,
    Custom {
        url: String,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
}

/// One step of the client builder chain. Steps are applied in list order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum ClientConfiguratorConfig {
    Default {
        #[serde(default)]
        proxy: ProxyConfig,
        #[serde(default = "default_true")]
        follow_redirects: bool,
        #[serde(default)]
        max_redirects: Option<usize>,
        /// Parsed by humantime, e.g. "5s"
        #[serde(default)]
        connect_timeout: Option<String>,
        #[serde(default)]
        read_timeout: Option<String>,
        #[serde(default)]
        user_agent: Option<String>,
    },
    Tls {
        #[serde(default = "default_true")]
        native_roots: bool,
        /// PEM file with extra CA certificates
        #[serde(default)]
        ca_bundle: Option<String>,
    },
    ConnectionPool {
        #[serde(default)]
        max_idle_per_host: Option<usize>,
        #[serde(default)]
        idle_timeout: Option<String>,
        #[serde(default)]
        tcp_keepalive: Option<String>,
    },
    Interceptors {
        #[serde(default)]
        remove_headers: Vec<String>,
        #[serde(default)]
        default_headers: bool,
        #[serde(default)]
        log_requests: bool,
        #[serde(default)]
        log_headers: bool,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum MessageFactoryConfig {
    #[default]
    InMemory,
    /// Reply payloads are streamed into files under `directory`.
    FileBacked { directory: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProducerConfig {
    /// Target URL; may contain `%message{key}` tokens.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub method: MethodConfig,
    #[serde(default)]
    pub content_type: ContentTypeConfig,
    #[serde(default)]
    pub request_headers: Vec<RequestHeadersConfig>,
    #[serde(default)]
    pub response_headers: Vec<ResponseHeadersConfig>,
    #[serde(default)]
    pub response_body: ResponseBodyConfig,
    #[serde(default)]
    pub authentication: AuthenticationConfig,
    #[serde(default)]
    pub client: Vec<ClientConfiguratorConfig>,
    #[serde(default)]
    pub ignore_server_response_code: bool,
    #[serde(default = "default_true")]
    pub cache_clients: bool,
    #[serde(default)]
    pub message_factory: MessageFactoryConfig,
    /// Default per-call timeout, parsed by humantime.
    #[serde(default)]
    pub timeout: Option<String>,
}

impl ProducerConfig {
    /// Create a new producer configuration builder
    pub fn builder() -> ProducerConfigBuilder {
        ProducerConfigBuilder::default()
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            url: None,
            method: MethodConfig::default(),
            content_type: ContentTypeConfig::default(),
            request_headers: Vec::new(),
            response_headers: Vec::new(),
            response_body: ResponseBodyConfig::default(),
            authentication: AuthenticationConfig::default(),
            client: Vec::new(),
            ignore_server_response_code: false,
            cache_clients: true,
            message_factory: MessageFactoryConfig::default(),
            timeout: None,
        }
    }
}

/// Builder for ProducerConfig to allow for cleaner configuration creation
#[derive(Default)]
pub struct ProducerConfigBuilder {
    config: ProducerConfig,
}

impl ProducerConfigBuilder {
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = Some(url.into());
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.config.method = MethodConfig::Configured {
            method: method.into(),
        };
        self
    }

    pub fn method_config(mut self, method: MethodConfig) -> Self {
        self.config.method = method;
        self
    }

    pub fn content_type(mut self, mime_type: impl Into<String>) -> Self {
        self.config.content_type = ContentTypeConfig::Configured {
            mime_type: mime_type.into(),
        };
        self
    }

    pub fn request_headers(mut self, headers: RequestHeadersConfig) -> Self {
        self.config.request_headers.push(headers);
        self
    }

    pub fn response_headers(mut self, handler: ResponseHeadersConfig) -> Self {
        self.config.response_headers.push(handler);
        self
    }

    pub fn response_body(mut self, body: ResponseBodyConfig) -> Self {
        self.config.response_body = body;
        self
    }

    pub fn authentication(mut self, authentication: AuthenticationConfig) -> Self {
        self.config.authentication = authentication;
        self
    }

    /// Append a step to the client builder chain
    pub fn client(mut self, configurator: ClientConfiguratorConfig) -> Self {
        self.config.client.push(configurator);
        self
    }

    pub fn ignore_server_response_code(mut self, ignore: bool) -> Self {
        self.config.ignore_server_response_code = ignore;
        self
    }

    pub fn cache_clients(mut self, cache: bool) -> Self {
        self.config.cache_clients = cache;
        self
    }

    pub fn message_factory(mut self, factory: MessageFactoryConfig) -> Self {
        self.config.message_factory = factory;
        self
    }

    pub fn timeout(mut self, timeout: impl Into<String>) -> Self {
        self.config.timeout = Some(timeout.into());
        self
    }

    /// Build the final ProducerConfig
    pub fn build(self) -> Result<ProducerConfig, String> {
        if self.config.url.is_none() {
            return Err("url is required".to_string());
        }
        Ok(self.config)
    }
}
