//! The request pipeline: one message in, one HTTP exchange, one enriched message out.
//!
//! Per call the executor resolves the URL and method, arms the authenticator
//! inside an [`AuthenticationScope`], acquires a client from the configurator
//! chain, builds the request (authentication hook, headers, streaming entity),
//! sends it once and classifies the response. The original payload is kept
//! whenever the response did not replace it. The scope is released on every
//! path, including errors.
use std::{sync::Arc, time::Duration, time::Instant};

use async_trait::async_trait;
use http::{HeaderValue, Method, header};
use tracing::Instrument;

use crate::{
    adapters::{
        authenticators::NoAuthentication,
        entity_consumers::PayloadEntityConsumer,
        request_headers::NoRequestHeaders,
        request_properties::{ConfiguredContentType, ConfiguredMethod, method_allows_body},
        response_headers::DiscardResponseHeaders,
    },
    core::{
        auth::{AuthenticationScope, AuthenticatorRegistry},
        challenge::ChallengeResponder,
        client_builder::{ClientBuilderChain, ClientCache, ConfiguredClient},
        entity::StreamingRequestEntity,
        message::{Message, MessageFactory},
        response::{ResponseClassifier, ResponseOutcome},
        target::{RequestTarget, ResourceTargetMatcher},
    },
    ports::{
        authenticator::HttpAuthenticator,
        entity_consumer::EntityConsumer,
        headers::{RequestHeaderProvider, ResponseHeaderHandler},
        message_producer::{MessageProducer, ProduceError, ProduceResult},
        request_properties::{ContentTypeProvider, RequestMethodProvider},
    },
    tracing_setup::create_request_span,
};

pub struct HttpRequestExecutor {
    url: Option<String>,
    method_provider: Arc<dyn RequestMethodProvider>,
    content_type_provider: Arc<dyn ContentTypeProvider>,
    request_headers: Arc<dyn RequestHeaderProvider>,
    authenticator: Arc<dyn HttpAuthenticator>,
    chain: ClientBuilderChain,
    client_cache: Option<ClientCache>,
    classifier: ResponseClassifier,
    message_factory: MessageFactory,
    challenge_responder: ChallengeResponder,
    default_timeout: Option<Duration>,
}

impl HttpRequestExecutor {
    pub fn builder() -> HttpRequestExecutorBuilder {
        HttpRequestExecutorBuilder::default()
    }

    /// The configured URL template, if any.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn message_factory(&self) -> &MessageFactory {
        &self.message_factory
    }

    /// Timeout applied when a call does not supply one.
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Drop cached clients. Returns how many were closed.
    pub fn shutdown(&self) -> usize {
        let closed = self
            .client_cache
            .as_ref()
            .map(ClientCache::shutdown)
            .unwrap_or_default();
        tracing::debug!(closed, "HTTP request executor shut down");
        closed
    }

    fn resolve_url(&self, message: &Message, target: Option<&str>) -> ProduceResult<String> {
        match (target, &self.url) {
            (Some(target), _) => message.resolve(target),
            (None, Some(template)) => message.resolve(template),
            (None, None) => Err(ProduceError::Configuration(
                "No target URL configured or supplied".to_string(),
            )),
        }
    }

    fn client(&self, timeout: Option<Duration>) -> ProduceResult<ConfiguredClient> {
        match &self.client_cache {
            Some(cache) => cache.get_or_build(&self.chain, timeout),
            None => self.chain.build_client(timeout),
        }
    }

    async fn build_request(
        &self,
        method: &Method,
        target: &RequestTarget,
        message: &Message,
        scope: &AuthenticationScope,
        entity: Option<&StreamingRequestEntity>,
        timeout: Option<Duration>,
    ) -> ProduceResult<reqwest::Request> {
        let mut request = reqwest::Request::new(method.clone(), target.url().clone());
        *request.timeout_mut() = timeout;
        scope.configure(&mut request)?;
        self.request_headers.add_headers(message, &mut request)?;
        if let Some(entity) = entity {
            entity.attach(&mut request).await?;
        }
        Ok(request)
    }

    /// Send once, answering a single Basic challenge if a registration claims it.
    async fn send(
        &self,
        client: &ConfiguredClient,
        method: &Method,
        target: &RequestTarget,
        message: &Message,
        scope: &AuthenticationScope,
        entity: Option<&StreamingRequestEntity>,
        timeout: Option<Duration>,
    ) -> ProduceResult<reqwest::Response> {
        let request = self
            .build_request(method, target, message, scope, entity, timeout)
            .await?;
        let sent_authorization = request.headers().contains_key(header::AUTHORIZATION);
        let response = client.execute(request).await?;

        let Some(credentials) = self.challenge_responder.respond(
            response.status(),
            response.headers(),
            response.url(),
            sent_authorization,
        ) else {
            return Ok(response);
        };
        drop(response);

        let mut authorization = HeaderValue::from_str(&credentials.basic_authorization())
            .map_err(|e| ProduceError::Configuration(format!("Invalid credentials: {e}")))?;
        authorization.set_sensitive(true);
        let mut request = self
            .build_request(method, target, message, scope, entity, timeout)
            .await?;
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, authorization);
        client.execute(request).await
    }

    async fn exchange(
        &self,
        message: &mut Message,
        url: &str,
        method: Method,
        timeout: Option<Duration>,
    ) -> ProduceResult<ResponseOutcome> {
        let target = RequestTarget::parse(url)?;
        let matcher = ResourceTargetMatcher::new(target.clone());
        let scope = AuthenticationScope::new(self.authenticator.setup(&target, message, matcher)?);

        let client = self.client(timeout)?;
        let entity = if method_allows_body(&method) {
            Some(StreamingRequestEntity::new(message, self.content_type_provider.as_ref()).await?)
        } else {
            None
        };

        let response = self
            .send(&client, &method, &target, message, &scope, entity.as_ref(), timeout)
            .await?;

        let mut reply = self.message_factory.new_message();
        let outcome = self
            .classifier
            .classify(response, &mut reply, &self.message_factory)
            .await?;
        if !outcome.payload_replaced {
            reply.set_payload(message.payload().clone());
        }
        message.merge_reply(reply);

        scope.release();
        Ok(outcome)
    }
}

#[async_trait]
impl MessageProducer for HttpRequestExecutor {
    async fn request(
        &self,
        mut message: Message,
        target: Option<&str>,
        timeout: Option<Duration>,
    ) -> ProduceResult<Message> {
        let url = self.resolve_url(&message, target)?;
        let method = self.method_provider.method(&message)?;
        let timeout = timeout.or(self.default_timeout);
        let span = create_request_span(method.as_str(), &url, message.id());

        async {
            let started = Instant::now();
            let result = self.exchange(&mut message, &url, method, timeout).await;
            let span = tracing::Span::current();
            span.record("duration_ms", started.elapsed().as_millis() as u64);
            match result {
                Ok(outcome) => {
                    span.record("http.status_code", outcome.status.as_u16());
                    tracing::debug!(status = %outcome.status, replaced = outcome.payload_replaced, "Request completed");
                    Ok(message)
                }
                Err(e) => {
                    if let Some(status) = e.status() {
                        span.record("http.status_code", status.as_u16());
                    }
                    tracing::warn!(error = %e, "Request failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Builder for [`HttpRequestExecutor`].
///
/// Unset strategies fall back to: POST, `text/plain`, no extra headers, no
/// authentication, an empty configurator chain, cached clients, payload
/// replaced by the response body, response headers discarded, in-memory
/// replies, no default timeout.
pub struct HttpRequestExecutorBuilder {
    url: Option<String>,
    method_provider: Arc<dyn RequestMethodProvider>,
    content_type_provider: Arc<dyn ContentTypeProvider>,
    request_headers: Arc<dyn RequestHeaderProvider>,
    authenticator: Arc<dyn HttpAuthenticator>,
    chain: ClientBuilderChain,
    cache_clients: bool,
    entity_consumer: Arc<dyn EntityConsumer>,
    response_headers: Arc<dyn ResponseHeaderHandler>,
    ignore_server_response_code: bool,
    message_factory: MessageFactory,
    registry: Arc<AuthenticatorRegistry>,
    default_timeout: Option<Duration>,
}

impl Default for HttpRequestExecutorBuilder {
    fn default() -> Self {
        Self {
            url: None,
            method_provider: Arc::new(ConfiguredMethod::default()),
            content_type_provider: Arc::new(ConfiguredContentType::default()),
            request_headers: Arc::new(NoRequestHeaders),
            authenticator: Arc::new(NoAuthentication),
            chain: ClientBuilderChain::default(),
            cache_clients: true,
            entity_consumer: Arc::new(PayloadEntityConsumer),
            response_headers: Arc::new(DiscardResponseHeaders),
            ignore_server_response_code: false,
            message_factory: MessageFactory::default(),
            registry: AuthenticatorRegistry::global(),
            default_timeout: None,
        }
    }
}

impl HttpRequestExecutorBuilder {
    /// URL template; `%message{key}` tokens are resolved per message.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn method_provider(mut self, provider: impl RequestMethodProvider + 'static) -> Self {
        self.method_provider = Arc::new(provider);
        self
    }

    pub fn method(self, method: Method) -> Self {
        self.method_provider(ConfiguredMethod::new(method))
    }

    pub fn content_type_provider(mut self, provider: impl ContentTypeProvider + 'static) -> Self {
        self.content_type_provider = Arc::new(provider);
        self
    }

    pub fn request_headers(mut self, provider: impl RequestHeaderProvider + 'static) -> Self {
        self.request_headers = Arc::new(provider);
        self
    }

    pub fn authenticator(mut self, authenticator: impl HttpAuthenticator + 'static) -> Self {
        self.authenticator = Arc::new(authenticator);
        self
    }

    pub fn client_chain(mut self, chain: ClientBuilderChain) -> Self {
        self.chain = chain;
        self
    }

    /// Reuse built clients across calls (on by default).
    pub fn cache_clients(mut self, cache: bool) -> Self {
        self.cache_clients = cache;
        self
    }

    pub fn entity_consumer(mut self, consumer: impl EntityConsumer + 'static) -> Self {
        self.entity_consumer = Arc::new(consumer);
        self
    }

    pub fn response_headers(mut self, handler: impl ResponseHeaderHandler + 'static) -> Self {
        self.response_headers = Arc::new(handler);
        self
    }

    pub fn ignore_server_response_code(mut self, ignore: bool) -> Self {
        self.ignore_server_response_code = ignore;
        self
    }

    pub fn message_factory(mut self, factory: MessageFactory) -> Self {
        self.message_factory = factory;
        self
    }

    /// Registry consulted when answering Basic challenges. Must be the one
    /// the authenticator installs into.
    pub fn registry(mut self, registry: Arc<AuthenticatorRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Timeout for calls that pass `None`.
    pub fn default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn build(self) -> HttpRequestExecutor {
        HttpRequestExecutor {
            url: self.url,
            method_provider: self.method_provider,
            content_type_provider: self.content_type_provider,
            request_headers: self.request_headers,
            authenticator: self.authenticator,
            chain: self.chain,
            client_cache: self.cache_clients.then(ClientCache::new),
            classifier: ResponseClassifier::new(self.entity_consumer, self.response_headers)
                .ignore_server_response_code(self.ignore_server_response_code),
            message_factory: self.message_factory,
            challenge_responder: ChallengeResponder::new(self.registry),
            default_timeout: self.default_timeout,
        }
    }
}
