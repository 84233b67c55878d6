//! Provider registry.
//!
//! Maps provider names to lazily-constructed providers. Registration order is
//! kept because it is the chain order for routes that do not restrict
//! providers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::debug;

use super::Provider;
use crate::error::AuthError;
use crate::types::ProviderName;

/// Constructor for a named provider. Runs at most once per registration.
pub type ProviderFactory = Box<dyn Fn() -> anyhow::Result<Arc<dyn Provider>> + Send + Sync>;

struct Entry {
    name: ProviderName,
    factory: ProviderFactory,
    instance: OnceCell<Arc<dyn Provider>>,
}

/// Registry of named provider factories with memoized instances.
///
/// Re-registering a name replaces its factory in place (last write wins) and
/// keeps the name's original position in the chain order.
pub struct ProviderRegistry {
    entries: Vec<Entry>,
    index: HashMap<ProviderName, usize>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a provider factory.
    pub fn register<F>(mut self, name: impl Into<ProviderName>, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn Provider>> + Send + Sync + 'static,
    {
        self.insert(name.into(), Box::new(factory));
        self
    }

    /// Register an already-built provider.
    pub fn register_provider<P: Provider + 'static>(
        self,
        name: impl Into<ProviderName>,
        provider: P,
    ) -> Self {
        let provider: Arc<dyn Provider> = Arc::new(provider);
        self.register(name, move || Ok(provider.clone()))
    }

    /// Register a factory through a mutable reference.
    pub fn insert(&mut self, name: ProviderName, factory: ProviderFactory) {
        match self.index.get(&name) {
            Some(&idx) => {
                debug!(provider = %name, "replacing registered authentication provider");
                self.entries[idx] = Entry {
                    name,
                    factory,
                    instance: OnceCell::new(),
                };
            }
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push(Entry {
                    name,
                    factory,
                    instance: OnceCell::new(),
                });
            }
        }
    }

    /// Get the provider for `name`, constructing it on first access.
    ///
    /// Concurrent first calls construct the provider once; a failed
    /// construction is not memoized.
    pub async fn resolve(&self, name: &str) -> Result<Arc<dyn Provider>, AuthError> {
        let idx = *self
            .index
            .get(name)
            .ok_or_else(|| AuthError::UnknownProvider(ProviderName::new(name)))?;
        let entry = &self.entries[idx];

        entry
            .instance
            .get_or_try_init(|| async {
                debug!(provider = %entry.name, "constructing authentication provider");
                (entry.factory)().map_err(|e| AuthError::ProviderConstruction {
                    provider: entry.name.clone(),
                    message: e.to_string(),
                })
            })
            .await
            .cloned()
    }

    /// All registered names, in registration order.
    pub fn all(&self) -> Vec<ProviderName> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Registered names in registration order, without cloning.
    pub fn names(&self) -> impl Iterator<Item = &ProviderName> {
        self.entries.iter().map(|e| &e.name)
    }

    /// Check if a provider with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Return the number of registered providers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return `true` if no providers are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.all())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_factory(
        counter: Arc<AtomicUsize>,
    ) -> impl Fn() -> anyhow::Result<Arc<dyn Provider>> + Send + Sync + 'static {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StubProvider::accept("alice")) as Arc<dyn Provider>)
        }
    }

    #[test]
    fn test_all_keeps_registration_order() {
        let registry = ProviderRegistry::new()
            .register_provider("jwt", StubProvider::accept("a"))
            .register_provider("basic", StubProvider::accept("b"))
            .register_provider("api_key", StubProvider::accept("c"));

        let names: Vec<_> = registry.all().into_iter().map(|n| n.into_inner()).collect();
        assert_eq!(names, vec!["jwt", "basic", "api_key"]);
        assert_eq!(registry.len(), 3);
        assert!(registry.contains("basic"));
        assert!(!registry.contains("oauth"));
    }

    #[tokio::test]
    async fn test_resolve_constructs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = ProviderRegistry::new().register("basic", counting_factory(counter.clone()));

        let first = registry.resolve("basic").await.unwrap();
        let second = registry.resolve("basic").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolve_constructs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(
            ProviderRegistry::new().register("basic", counting_factory(counter.clone())),
        );

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.resolve("basic").await.map(|_| ())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolve_unknown_provider() {
        let registry = ProviderRegistry::new();
        let err = registry.resolve("oauth").await.err().unwrap();
        assert!(matches!(err, AuthError::UnknownProvider(name) if name.as_str() == "oauth"));
    }

    #[tokio::test]
    async fn test_override_replaces_in_place() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let registry = ProviderRegistry::new()
            .register("basic", counting_factory(first.clone()))
            .register_provider("jwt", StubProvider::accept("b"))
            .register("basic", counting_factory(second.clone()));

        let names: Vec<_> = registry.all().into_iter().map(|n| n.into_inner()).collect();
        assert_eq!(names, vec!["basic", "jwt"]);

        registry.resolve("basic").await.unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_construction_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let registry = ProviderRegistry::new().register("flaky", move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("verifier not ready");
            }
            Ok(Arc::new(StubProvider::accept("alice")) as Arc<dyn Provider>)
        });

        let err = registry.resolve("flaky").await.err().unwrap();
        assert!(matches!(err, AuthError::ProviderConstruction { ref message, .. } if message == "verifier not ready"));

        assert!(registry.resolve("flaky").await.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
