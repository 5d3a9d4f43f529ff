//! Process-wide credential registry and per-request authentication scopes.
//!
//! Authenticators that answer challenges reactively install their credentials
//! into an [`AuthenticatorRegistry`] for the duration of one request. Each
//! registration is keyed by the [`ResourceTargetMatcher`] of that request, so a
//! challenge raised by one request can never be answered with the credentials
//! of another unless the matcher accepts it.
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use arc_swap::ArcSwap;
use base64::{Engine, engine::general_purpose::STANDARD};
use once_cell::sync::Lazy;

use crate::{
    core::target::{Challenge, ResourceTargetMatcher},
    ports::{authenticator::AuthenticationContext, message_producer::ProduceResult},
};

static GLOBAL_REGISTRY: Lazy<Arc<AuthenticatorRegistry>> =
    Lazy::new(|| Arc::new(AuthenticatorRegistry::new()));

/// Username and password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// `Basic <base64(user:password)>`
    pub fn basic_authorization(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Handle returned by [`AuthenticatorRegistry::install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

#[derive(Debug)]
struct Registration {
    id: RegistrationId,
    matcher: ResourceTargetMatcher,
    credentials: Credentials,
}

/// Registry of the credentials currently armed by in-flight requests.
///
/// Readers take a lock-free snapshot; installs and removals swap the whole
/// list atomically so concurrent requests never observe a torn update.
pub struct AuthenticatorRegistry {
    entries: ArcSwap<Vec<Arc<Registration>>>,
    next_id: AtomicU64,
}

impl AuthenticatorRegistry {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The registry shared by every producer in the process.
    pub fn global() -> Arc<Self> {
        GLOBAL_REGISTRY.clone()
    }

    pub fn install(&self, matcher: ResourceTargetMatcher, credentials: Credentials) -> RegistrationId {
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let registration = Arc::new(Registration {
            id,
            matcher,
            credentials,
        });
        self.entries.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(registration.clone());
            next
        });
        tracing::debug!(
            registration = id.0,
            target = %registration.matcher.target(),
            "Installed credentials"
        );
        id
    }

    /// Remove a registration. Returns false if it was already gone.
    pub fn remove(&self, id: RegistrationId) -> bool {
        let mut removed = false;
        self.entries.rcu(|current| {
            removed = current.iter().any(|r| r.id == id);
            current
                .iter()
                .filter(|r| r.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        if removed {
            tracing::debug!(registration = id.0, "Removed credentials");
        }
        removed
    }

    /// Credentials of the most recent registration whose matcher accepts `challenge`.
    pub fn resolve(&self, challenge: &Challenge) -> Option<Credentials> {
        self.entries
            .load()
            .iter()
            .rev()
            .find(|r| r.matcher.matches(challenge))
            .map(|r| r.credentials.clone())
    }

    pub fn contains(&self, id: RegistrationId) -> bool {
        self.entries.load().iter().any(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AuthenticatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Context that keeps one registry entry alive until closed.
pub struct RegisteredCredentials {
    registry: Arc<AuthenticatorRegistry>,
    id: Option<RegistrationId>,
}

impl RegisteredCredentials {
    pub fn install(
        registry: Arc<AuthenticatorRegistry>,
        matcher: ResourceTargetMatcher,
        credentials: Credentials,
    ) -> Self {
        let id = registry.install(matcher, credentials);
        Self {
            registry,
            id: Some(id),
        }
    }

    pub fn id(&self) -> Option<RegistrationId> {
        self.id
    }
}

impl AuthenticationContext for RegisteredCredentials {
    fn close(&mut self) {
        if let Some(id) = self.id.take() {
            self.registry.remove(id);
        }
    }
}

impl Drop for RegisteredCredentials {
    fn drop(&mut self) {
        self.close();
    }
}

/// Context for authenticators that have nothing to arm.
#[derive(Debug, Default)]
pub struct NoopContext;

impl AuthenticationContext for NoopContext {
    fn close(&mut self) {}
}

/// Scoped owner of an armed [`AuthenticationContext`].
///
/// The context is closed exactly once: either by [`AuthenticationScope::release`]
/// or, on every early-return and error path, when the scope is dropped.
pub struct AuthenticationScope {
    context: Option<Box<dyn AuthenticationContext>>,
}

impl AuthenticationScope {
    pub fn new(context: Box<dyn AuthenticationContext>) -> Self {
        Self {
            context: Some(context),
        }
    }

    pub fn configure(&self, request: &mut reqwest::Request) -> ProduceResult<()> {
        match &self.context {
            Some(context) => context.configure(request),
            None => Ok(()),
        }
    }

    pub fn release(mut self) {
        self.close_inner();
    }

    fn close_inner(&mut self) {
        if let Some(mut context) = self.context.take() {
            context.close();
        }
    }
}

impl Drop for AuthenticationScope {
    fn drop(&mut self) {
        self.close_inner();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::core::target::RequestTarget;

    fn matcher(url: &str) -> ResourceTargetMatcher {
        ResourceTargetMatcher::new(RequestTarget::parse(url).unwrap())
    }

    #[test]
    fn test_basic_authorization_header() {
        let creds = Credentials::new("Aladdin", "open sesame");
        assert_eq!(
            creds.basic_authorization(),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
        assert!(!format!("{creds:?}").contains("open sesame"));
    }

    #[test]
    fn test_registry_resolves_only_matching_targets() {
        let registry = AuthenticatorRegistry::new();
        registry.install(matcher("http://a.example.com/x"), Credentials::new("a", "1"));
        registry.install(matcher("http://b.example.com/y"), Credentials::new("b", "2"));

        let a = registry.resolve(&Challenge::for_url("http://a.example.com/x"));
        assert_eq!(a.unwrap().username(), "a");
        let b = registry.resolve(&Challenge::for_origin("b.example.com", None, "http"));
        assert_eq!(b.unwrap().username(), "b");
        assert!(registry.resolve(&Challenge::for_url("http://c.example.com/")).is_none());
    }

    #[test]
    fn test_registry_remove_is_idempotent() {
        let registry = AuthenticatorRegistry::new();
        let id = registry.install(matcher("http://example.com/"), Credentials::new("u", "p"));
        assert!(registry.contains(id));
        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registered_credentials_released_on_drop() {
        let registry = Arc::new(AuthenticatorRegistry::new());
        let id = {
            let ctx = RegisteredCredentials::install(
                registry.clone(),
                matcher("http://example.com/"),
                Credentials::new("u", "p"),
            );
            ctx.id().unwrap()
        };
        assert!(!registry.contains(id));
    }

    #[test]
    fn test_concurrent_install_and_remove() {
        let registry = Arc::new(AuthenticatorRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let id = registry.install(
                            matcher(&format!("http://host{i}.example.com/")),
                            Credentials::new(format!("user{i}"), "p"),
                        );
                        let found = registry
                            .resolve(&Challenge::for_url(format!("http://host{i}.example.com/")))
                            .unwrap();
                        assert_eq!(found.username(), format!("user{i}"));
                        assert!(registry.remove(id));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.is_empty());
    }

    struct CountingContext(Arc<AtomicUsize>);

    impl AuthenticationContext for CountingContext {
        fn close(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_scope_closes_once_on_release() {
        let closes = Arc::new(AtomicUsize::new(0));
        let scope = AuthenticationScope::new(Box::new(CountingContext(closes.clone())));
        scope.release();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scope_closes_once_on_drop() {
        let closes = Arc::new(AtomicUsize::new(0));
        {
            let _scope = AuthenticationScope::new(Box::new(CountingContext(closes.clone())));
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
