//! Turns a [`ProducerConfig`] into a ready [`HttpRequestExecutor`].
use std::{path::PathBuf, sync::Arc, time::Duration};

use regex::Regex;

use crate::{
    adapters::{
        authenticators::{
            ConfiguredAuthorizationHeader, ConfiguredUsernamePassword, MetadataAuthorizationHeader,
            MetadataUsernamePassword, NoAuthentication,
        },
        client_configurators::{
            ConnectionPoolConfigurator, DefaultClientConfigurator, InterceptorConfigurator,
            ProxyMode, RedirectMode, TlsClientConfigurator,
        },
        entity_consumers::{MetadataEntityConsumer, PayloadEntityConsumer},
        interceptors::{DefaultHeadersInterceptor, RemoveHeadersInterceptor, RequestLoggingInterceptor},
        request_headers::{
            CompositeRequestHeaders, ConfiguredRequestHeaders, MetadataRequestHeaders,
            NoRequestHeaders, ObjectMetadataRequestHeaders,
        },
        request_properties::{
            ConfiguredContentType, ConfiguredMethod, MetadataContentType, MetadataMethod,
            parse_method,
        },
        response_headers::{
            CompositeResponseHeaders, DiscardResponseHeaders, ResponseHeadersAsMetadata,
            ResponseHeadersAsObjectMetadata,
        },
    },
    config::models::{
        AuthenticationConfig, ClientConfiguratorConfig, ContentTypeConfig, MessageFactoryConfig,
        MethodConfig, ProducerConfig, ProxyConfig, RequestHeadersConfig, ResponseBodyConfig,
        ResponseHeadersConfig, parse_duration,
    },
    core::{
        auth::AuthenticatorRegistry,
        client_builder::ClientBuilderChain,
        executor::{HttpRequestExecutor, HttpRequestExecutorBuilder},
        message::MessageFactory,
    },
    ports::{
        client_configurator::{ClientConfigurator, RequestInterceptor},
        headers::{RequestHeaderProvider, ResponseHeaderHandler},
        message_producer::{ProduceError, ProduceResult},
    },
};

fn duration(field: &str, value: Option<&str>) -> ProduceResult<Option<Duration>> {
    value
        .map(|v| {
            parse_duration(v).map_err(|e| {
                ProduceError::Configuration(format!("Invalid duration for {field} '{v}': {e}"))
            })
        })
        .transpose()
}

/// The default per-call timeout declared by `config`, if any.
pub fn default_timeout(config: &ProducerConfig) -> ProduceResult<Option<Duration>> {
    duration("timeout", config.timeout.as_deref())
}

/// Builds executors from configuration.
///
/// Registry-backed authenticators and the challenge responder share one
/// registry, the process-wide one unless [`ExecutorFactory::with_registry`]
/// says otherwise.
pub struct ExecutorFactory {
    registry: Arc<AuthenticatorRegistry>,
}

impl Default for ExecutorFactory {
    fn default() -> Self {
        Self {
            registry: AuthenticatorRegistry::global(),
        }
    }
}

impl ExecutorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: Arc<AuthenticatorRegistry>) -> Self {
        Self { registry }
    }

    pub fn build(&self, config: &ProducerConfig) -> ProduceResult<HttpRequestExecutor> {
        let mut builder = HttpRequestExecutor::builder()
            .registry(self.registry.clone())
            .ignore_server_response_code(config.ignore_server_response_code)
            .cache_clients(config.cache_clients)
            .client_chain(Self::client_chain(&config.client)?)
            .message_factory(Self::message_factory(&config.message_factory))
            .default_timeout(default_timeout(config)?);

        if let Some(url) = &config.url {
            builder = builder.url(url.clone());
        }
        builder = Self::method(builder, &config.method)?;
        builder = match &config.content_type {
            ContentTypeConfig::Configured { mime_type } => {
                builder.content_type_provider(ConfiguredContentType::new(mime_type.clone()))
            }
            ContentTypeConfig::Metadata { key, default } => builder
                .content_type_provider(MetadataContentType::new(key.clone(), default.clone())),
        };
        builder = match Self::request_headers(&config.request_headers)? {
            Some(headers) => builder.request_headers(headers),
            None => builder.request_headers(NoRequestHeaders),
        };
        builder = match Self::response_headers(&config.response_headers) {
            Some(handler) => builder.response_headers(handler),
            None => builder.response_headers(DiscardResponseHeaders),
        };
        builder = match &config.response_body {
            ResponseBodyConfig::Payload => builder.entity_consumer(PayloadEntityConsumer),
            ResponseBodyConfig::Metadata { key } => {
                builder.entity_consumer(MetadataEntityConsumer::new(key.clone()))
            }
        };
        builder = self.authenticator(builder, &config.authentication)?;

        let executor = builder.build();
        tracing::debug!(
            url = ?executor.url(),
            configurators = config.client.len(),
            "Built HTTP request executor"
        );
        Ok(executor)
    }

    fn method(
        builder: HttpRequestExecutorBuilder,
        method: &MethodConfig,
    ) -> ProduceResult<HttpRequestExecutorBuilder> {
        Ok(match method {
            MethodConfig::Configured { method } => {
                builder.method_provider(ConfiguredMethod::parse(method)?)
            }
            MethodConfig::Metadata { key, default } => {
                builder.method_provider(MetadataMethod::new(key.clone(), parse_method(default)?))
            }
        })
    }

    fn authenticator(
        &self,
        builder: HttpRequestExecutorBuilder,
        authentication: &AuthenticationConfig,
    ) -> ProduceResult<HttpRequestExecutorBuilder> {
        Ok(match authentication {
            AuthenticationConfig::None => builder.authenticator(NoAuthentication),
            AuthenticationConfig::UsernamePassword { username, password } => builder.authenticator(
                ConfiguredUsernamePassword::new(username.clone(), password.clone())
                    .with_registry(self.registry.clone()),
            ),
            AuthenticationConfig::MetadataUsernamePassword {
                username_key,
                password_key,
            } => builder.authenticator(
                MetadataUsernamePassword::new(username_key.clone(), password_key.clone())
                    .with_registry(self.registry.clone()),
            ),
            AuthenticationConfig::AuthorizationHeader { value } => {
                builder.authenticator(ConfiguredAuthorizationHeader::new(value.clone()))
            }
            AuthenticationConfig::MetadataAuthorizationHeader { key } => {
                builder.authenticator(MetadataAuthorizationHeader::new(key.clone()))
            }
        })
    }

    fn request_headers(
        configs: &[RequestHeadersConfig],
    ) -> ProduceResult<Option<CompositeRequestHeaders>> {
        if configs.is_empty() {
            return Ok(None);
        }
        let mut providers: Vec<Arc<dyn RequestHeaderProvider>> = Vec::with_capacity(configs.len());
        for config in configs {
            match config {
                RequestHeadersConfig::Configured { headers } => {
                    let mut headers: Vec<_> = headers
                        .iter()
                        .map(|(name, value)| (name.clone(), value.clone()))
                        .collect();
                    headers.sort();
                    providers.push(Arc::new(ConfiguredRequestHeaders::new(headers)));
                }
                RequestHeadersConfig::Metadata { filter } => {
                    let filter = filter
                        .as_deref()
                        .map(Regex::new)
                        .transpose()
                        .map_err(|e| {
                            ProduceError::Configuration(format!("Invalid header filter: {e}"))
                        })?;
                    providers.push(Arc::new(MetadataRequestHeaders::new(filter)));
                }
                RequestHeadersConfig::ObjectMetadata { prefix } => {
                    providers.push(Arc::new(ObjectMetadataRequestHeaders::new(prefix.clone())));
                }
            }
        }
        Ok(Some(CompositeRequestHeaders::new(providers)))
    }

    fn response_headers(configs: &[ResponseHeadersConfig]) -> Option<CompositeResponseHeaders> {
        if configs.is_empty() {
            return None;
        }
        let handlers = configs
            .iter()
            .map(|config| -> Arc<dyn ResponseHeaderHandler> {
                match config {
                    ResponseHeadersConfig::Discard => Arc::new(DiscardResponseHeaders),
                    ResponseHeadersConfig::Metadata { prefix } => {
                        Arc::new(ResponseHeadersAsMetadata::new(prefix.clone()))
                    }
                    ResponseHeadersConfig::ObjectMetadata { prefix } => {
                        Arc::new(ResponseHeadersAsObjectMetadata::new(prefix.clone()))
                    }
                }
            })
            .collect();
        Some(CompositeResponseHeaders::new(handlers))
    }

    /// Build the configurator chain in the order it is declared.
    pub fn client_chain(configs: &[ClientConfiguratorConfig]) -> ProduceResult<ClientBuilderChain> {
        let mut configurators: Vec<Arc<dyn ClientConfigurator>> = Vec::with_capacity(configs.len());
        for config in configs {
            let configurator: Arc<dyn ClientConfigurator> = match config {
                ClientConfiguratorConfig::Default {
                    proxy,
                    follow_redirects,
                    max_redirects,
                    connect_timeout,
                    read_timeout,
                    user_agent,
                } => Arc::new(DefaultClientConfigurator {
                    proxy: match proxy {
                        ProxyConfig::System => ProxyMode::System,
                        ProxyConfig::Direct => ProxyMode::Direct,
                        ProxyConfig::Custom {
                            url,
                            username,
                            password,
                        } => ProxyMode::Custom {
                            url: url.clone(),
                            username: username.clone(),
                            password: password.clone(),
                        },
                    },
                    redirects: match (follow_redirects, max_redirects) {
                        (false, _) => RedirectMode::None,
                        (true, Some(max)) => RedirectMode::Limited(*max),
                        (true, None) => RedirectMode::Follow,
                    },
                    connect_timeout: duration("connect_timeout", connect_timeout.as_deref())?,
                    read_timeout: duration("read_timeout", read_timeout.as_deref())?,
                    user_agent: user_agent.clone(),
                }),
                ClientConfiguratorConfig::Tls {
                    native_roots,
                    ca_bundle,
                } => Arc::new(TlsClientConfigurator {
                    native_roots: *native_roots,
                    ca_bundle: ca_bundle.as_ref().map(PathBuf::from),
                }),
                ClientConfiguratorConfig::ConnectionPool {
                    max_idle_per_host,
                    idle_timeout,
                    tcp_keepalive,
                } => Arc::new(ConnectionPoolConfigurator {
                    max_idle_per_host: *max_idle_per_host,
                    idle_timeout: duration("idle_timeout", idle_timeout.as_deref())?,
                    tcp_keepalive: duration("tcp_keepalive", tcp_keepalive.as_deref())?,
                }),
                ClientConfiguratorConfig::Interceptors {
                    remove_headers,
                    default_headers,
                    log_requests,
                    log_headers,
                } => {
                    let mut interceptors: Vec<Arc<dyn RequestInterceptor>> = Vec::new();
                    if *default_headers {
                        interceptors.push(Arc::new(DefaultHeadersInterceptor::standard()));
                    }
                    if !remove_headers.is_empty() {
                        interceptors.push(Arc::new(RemoveHeadersInterceptor::new(remove_headers)?));
                    }
                    if *log_requests {
                        interceptors.push(Arc::new(RequestLoggingInterceptor::new(*log_headers)));
                    }
                    Arc::new(InterceptorConfigurator::new(interceptors))
                }
            };
            configurators.push(configurator);
        }
        Ok(ClientBuilderChain::new(configurators))
    }

    fn message_factory(config: &MessageFactoryConfig) -> MessageFactory {
        match config {
            MessageFactoryConfig::InMemory => MessageFactory::InMemory,
            MessageFactoryConfig::FileBacked { directory } => MessageFactory::FileBacked {
                directory: PathBuf::from(directory),
            },
        }
    }
}
