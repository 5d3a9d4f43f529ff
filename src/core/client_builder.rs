//! Composition of client configurators into a concrete HTTP client.
//!
//! A [`ClientBuilderChain`] left-folds its configurators over a
//! [`ClientBuilderState`] and builds a [`ConfiguredClient`]. Built clients pool
//! connections internally and are safe to share between concurrent calls; the
//! [`ClientCache`] keeps one per recently used per-call timeout.
use std::{collections::VecDeque, sync::Arc, sync::Mutex, time::Duration};

use crate::ports::{
    client_configurator::{ClientConfigurator, RequestInterceptor},
    message_producer::{ProduceError, ProduceResult},
};

/// Mutable state threaded through the configurator chain.
pub struct ClientBuilderState {
    builder: reqwest::ClientBuilder,
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
}

impl ClientBuilderState {
    /// Start from the transport defaults: system proxy settings, redirects
    /// followed, no timeouts.
    pub fn new() -> Self {
        Self {
            builder: reqwest::Client::builder(),
            interceptors: Vec::new(),
        }
    }

    /// Apply a mutation to the underlying transport builder.
    pub fn map_builder<F>(mut self, f: F) -> Self
    where
        F: FnOnce(reqwest::ClientBuilder) -> reqwest::ClientBuilder,
    {
        self.builder = f(self.builder);
        self
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn interceptor_count(&self) -> usize {
        self.interceptors.len()
    }

    pub fn build(self) -> ProduceResult<ConfiguredClient> {
        let client = self
            .builder
            .build()
            .map_err(|e| ProduceError::Configuration(format!("Failed to build HTTP client: {e}")))?;
        Ok(ConfiguredClient {
            client,
            interceptors: self.interceptors.into(),
        })
    }
}

impl Default for ClientBuilderState {
    fn default() -> Self {
        Self::new()
    }
}

/// A built HTTP client plus the interceptors run before every send.
#[derive(Clone)]
pub struct ConfiguredClient {
    client: reqwest::Client,
    interceptors: Arc<[Arc<dyn RequestInterceptor>]>,
}

impl ConfiguredClient {
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn apply_interceptors(&self, request: &mut reqwest::Request) -> ProduceResult<()> {
        for interceptor in self.interceptors.iter() {
            interceptor.intercept(request)?;
        }
        Ok(())
    }

    /// Run the interceptors and send the request once.
    pub async fn execute(&self, mut request: reqwest::Request) -> ProduceResult<reqwest::Response> {
        self.apply_interceptors(&mut request)?;
        let url = request.url().to_string();
        self.client
            .execute(request)
            .await
            .map_err(|source| ProduceError::Transport { url, source })
    }
}

/// Ordered configurators applied as a left fold. An empty chain leaves the
/// state untouched.
#[derive(Clone, Default)]
pub struct ClientBuilderChain {
    configurators: Vec<Arc<dyn ClientConfigurator>>,
}

impl ClientBuilderChain {
    pub fn new(configurators: Vec<Arc<dyn ClientConfigurator>>) -> Self {
        Self { configurators }
    }

    /// Append a configurator to the end of the chain.
    pub fn with(mut self, configurator: impl ClientConfigurator + 'static) -> Self {
        self.configurators.push(Arc::new(configurator));
        self
    }

    pub fn len(&self) -> usize {
        self.configurators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurators.is_empty()
    }

    /// Fold the chain over a fresh state and build the client.
    pub fn build_client(&self, timeout: Option<Duration>) -> ProduceResult<ConfiguredClient> {
        self.configure_with_timeout(ClientBuilderState::new(), timeout)?
            .build()
    }
}

impl ClientConfigurator for ClientBuilderChain {
    fn configure(&self, state: ClientBuilderState) -> ProduceResult<ClientBuilderState> {
        self.configurators
            .iter()
            .try_fold(state, |state, configurator| configurator.configure(state))
    }

    fn configure_with_timeout(
        &self,
        state: ClientBuilderState,
        timeout: Option<Duration>,
    ) -> ProduceResult<ClientBuilderState> {
        match timeout {
            None => self.configure(state),
            Some(_) => self.configurators.iter().try_fold(state, |state, configurator| {
                configurator.configure_with_timeout(state, timeout)
            }),
        }
    }
}

/// Clients kept by a cache unless configured otherwise.
pub const DEFAULT_CACHE_CAPACITY: usize = 8;

/// Built clients keyed by per-call timeout, least recently used first.
///
/// Building happens under the lock so two concurrent first calls never build
/// the same client twice. Once `capacity` clients are cached the least
/// recently used one is dropped, so callers passing ever-changing timeouts
/// cannot grow the cache without bound.
pub struct ClientCache {
    capacity: usize,
    clients: Mutex<VecDeque<(Option<Duration>, ConfiguredClient)>>,
}

impl Default for ClientCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl ClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache holding at most `capacity` clients (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            clients: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<(Option<Duration>, ConfiguredClient)>> {
        self.clients.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Client cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn get_or_build(
        &self,
        chain: &ClientBuilderChain,
        timeout: Option<Duration>,
    ) -> ProduceResult<ConfiguredClient> {
        let mut clients = self.lock();
        if let Some(index) = clients.iter().position(|(key, _)| *key == timeout) {
            if let Some(entry) = clients.remove(index) {
                let client = entry.1.clone();
                clients.push_back(entry);
                return Ok(client);
            }
        }
        let client = chain.build_client(timeout)?;
        if clients.len() >= self.capacity {
            if let Some((evicted, _)) = clients.pop_front() {
                tracing::debug!(timeout = ?evicted, "Evicted cached HTTP client");
            }
        }
        clients.push_back((timeout, client.clone()));
        tracing::debug!(?timeout, cached = clients.len(), "Built and cached HTTP client");
        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached client, closing their idle connections.
    pub fn shutdown(&self) -> usize {
        let mut clients = self.lock();
        let count = clients.len();
        clients.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http::{HeaderValue, Method};

    use super::*;

    struct AppendHeader(&'static str);

    impl RequestInterceptor for AppendHeader {
        fn intercept(&self, request: &mut reqwest::Request) -> ProduceResult<()> {
            request
                .headers_mut()
                .append("x-order", HeaderValue::from_static(self.0));
            Ok(())
        }
    }

    fn request() -> reqwest::Request {
        reqwest::Request::new(Method::GET, "http://localhost/".parse().unwrap())
    }

    #[test]
    fn test_chain_applies_configurators_in_order() {
        let chain = ClientBuilderChain::default()
            .with(|state: ClientBuilderState| -> ProduceResult<ClientBuilderState> {
                Ok(state.with_interceptor(Arc::new(AppendHeader("first"))))
            })
            .with(|state: ClientBuilderState| -> ProduceResult<ClientBuilderState> {
                Ok(state.with_interceptor(Arc::new(AppendHeader("second"))))
            });
        assert_eq!(chain.len(), 2);

        let client = chain.build_client(None).unwrap();
        let mut req = request();
        client.apply_interceptors(&mut req).unwrap();
        let order: Vec<_> = req
            .headers()
            .get_all("x-order")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(order, vec!["first", "second"]);
    }

    #[test]
    fn test_empty_chain_is_noop() {
        let chain = ClientBuilderChain::default();
        assert!(chain.is_empty());
        let state = chain.configure(ClientBuilderState::new()).unwrap();
        assert_eq!(state.interceptor_count(), 0);
        assert!(state.build().is_ok());
    }

    #[test]
    fn test_chain_stops_at_first_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let chain = ClientBuilderChain::default()
            .with(|_state: ClientBuilderState| -> ProduceResult<ClientBuilderState> {
                Err(ProduceError::Configuration("broken".to_string()))
            })
            .with(move |state: ClientBuilderState| -> ProduceResult<ClientBuilderState> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(state)
            });
        let err = chain.build_client(None).err().unwrap();
        assert!(err.is_configuration());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cache_reuses_clients_per_timeout() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let chain = ClientBuilderChain::default().with(
            move |state: ClientBuilderState| -> ProduceResult<ClientBuilderState> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(state)
            },
        );
        let cache = ClientCache::new();

        cache.get_or_build(&chain, None).unwrap();
        cache.get_or_build(&chain, None).unwrap();
        cache.get_or_build(&chain, Some(Duration::from_secs(1))).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.shutdown(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_is_bounded_by_capacity() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let chain = ClientBuilderChain::default().with(
            move |state: ClientBuilderState| -> ProduceResult<ClientBuilderState> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(state)
            },
        );
        let cache = ClientCache::with_capacity(4);

        for millis in 1..=200 {
            cache
                .get_or_build(&chain, Some(Duration::from_millis(millis)))
                .unwrap();
        }
        assert_eq!(cache.len(), 4);
        assert_eq!(builds.load(Ordering::SeqCst), 200);

        // The most recent timeouts are still cached, the oldest were evicted.
        cache.get_or_build(&chain, Some(Duration::from_millis(200))).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 200);
        cache.get_or_build(&chain, Some(Duration::from_millis(1))).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 201);
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_cache_refreshes_recently_used_clients() {
        let chain = ClientBuilderChain::default();
        let cache = ClientCache::with_capacity(2);
        let short = Some(Duration::from_secs(1));
        let long = Some(Duration::from_secs(2));

        cache.get_or_build(&chain, short).unwrap();
        cache.get_or_build(&chain, long).unwrap();
        cache.get_or_build(&chain, short).unwrap();
        cache.get_or_build(&chain, None).unwrap();

        let keys: Vec<_> = cache.lock().iter().map(|(key, _)| *key).collect();
        assert_eq!(keys, vec![short, None]);
    }
}
