//! Instance providers for container types.
//!
//! Deserializers that need to build a caller-specified container kind
//! (a named list, set, or any custom accumulator) look its factory up
//! here by name instead of reflecting over types.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type Factory = Arc<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>;

/// Registry mapping container type names to zero-arg factories.
///
/// # Example
///
/// ```rust
/// use courier_core::serialization::ProviderRegistry;
///
/// let providers = ProviderRegistry::new();
/// providers.register("list", Vec::<String>::new);
/// let list: Vec<String> = providers.instance("list").unwrap();
/// assert!(list.is_empty());
/// ```
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: Arc<RwLock<HashMap<String, Factory>>>,
}

impl ProviderRegistry {
    /// Creates an empty provider registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under a container name. Re-registering a name
    /// replaces the previous factory.
    pub fn register<C, F>(&self, name: impl Into<String>, factory: F)
    where
        C: Send + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move || Box::new(factory()));
        self.factories
            .write()
            .expect("provider lock poisoned")
            .insert(name.into(), factory);
    }

    /// Instantiates the container registered under `name`, if its factory
    /// exists and produces the requested type.
    pub fn instance<C: Send + 'static>(&self, name: &str) -> Option<C> {
        let factory = self
            .factories
            .read()
            .expect("provider lock poisoned")
            .get(name)
            .cloned()?;
        factory().downcast::<C>().ok().map(|boxed| *boxed)
    }

    /// Whether a factory is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .expect("provider lock poisoned")
            .contains_key(name)
    }
}
