//! Service provider contract and in-container provider registry.
//!
//! # Responsibility
//! - Define the provider lifecycle hooks (`register`, `load`).
//! - Keep providers in registration order, keyed by provider name.
//!
//! # Invariants
//! - One slot per provider name; re-registering replaces in place.
//! - `register` and `load` run at most once per slot.

use crate::container::error::ContainerResult;
use crate::container::service_container::Container;
use std::collections::BTreeMap;

/// Unit of binding setup plugged into a container.
pub trait ServiceProvider {
    /// Registry key. Defaults to the provider's Rust type name.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Wires bindings. Called once, during `boot_providers`.
    fn register(&mut self, container: &mut Container);

    /// Boot-time side effects. Called once: during `boot_providers` for eager
    /// providers, on first resolution of a provided alias for deferred ones.
    fn load(&mut self, _container: &mut Container) -> ContainerResult<()> {
        Ok(())
    }

    fn is_deferred(&self) -> bool {
        false
    }

    /// Aliases this provider can supply.
    fn provides(&self) -> &[String] {
        &[]
    }
}

struct ProviderSlot {
    name: String,
    provides: Vec<String>,
    deferred: bool,
    provider: Option<Box<dyn ServiceProvider>>,
    registered: bool,
    loaded: bool,
}

/// Ordered provider storage.
///
/// Providers are lent out while their hooks run, so a hook can mutate the
/// owning container without aliasing the registry. `provides` and `deferred`
/// are captured at insertion and stay readable while a provider is lent.
#[derive(Default)]
pub(crate) struct ProviderRegistry {
    slots: Vec<ProviderSlot>,
    index: BTreeMap<String, usize>,
}

/// Which lifecycle hook a lent provider is about to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProviderPhase {
    Register,
    Load,
}

impl ProviderRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores one provider. Returns `true` when an existing slot was replaced.
    pub(crate) fn insert(&mut self, provider: Box<dyn ServiceProvider>) -> bool {
        let name = provider.name().to_string();
        let provides = provider.provides().to_vec();
        let deferred = provider.is_deferred();
        if let Some(&position) = self.index.get(name.as_str()) {
            let slot = &mut self.slots[position];
            slot.provides = provides;
            slot.deferred = deferred;
            slot.provider = Some(provider);
            slot.registered = false;
            slot.loaded = false;
            return true;
        }

        self.index.insert(name.clone(), self.slots.len());
        self.slots.push(ProviderSlot {
            name,
            provides,
            deferred,
            provider: Some(provider),
            registered: false,
            loaded: false,
        });
        false
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Provider names in registration order.
    pub(crate) fn names(&self) -> Vec<String> {
        self.slots.iter().map(|slot| slot.name.clone()).collect()
    }

    /// First provider, in registration order, that lists `alias`.
    pub(crate) fn position_providing(&self, alias: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.provides.iter().any(|provided| provided == alias))
    }

    pub(crate) fn is_deferred_at(&self, position: usize) -> bool {
        self.slots.get(position).is_some_and(|slot| slot.deferred)
    }

    pub(crate) fn is_loaded_at(&self, position: usize) -> bool {
        self.slots.get(position).is_some_and(|slot| slot.loaded)
    }

    /// Lends the provider at `position` for `phase`, marking the phase done.
    ///
    /// Returns `None` when the phase already ran or the provider is lent out.
    pub(crate) fn lend(
        &mut self,
        position: usize,
        phase: ProviderPhase,
    ) -> Option<(String, Box<dyn ServiceProvider>)> {
        let slot = self.slots.get_mut(position)?;
        let done = match phase {
            ProviderPhase::Register => &mut slot.registered,
            ProviderPhase::Load => &mut slot.loaded,
        };
        if *done {
            return None;
        }
        let provider = slot.provider.take()?;
        *done = true;
        Some((slot.name.clone(), provider))
    }

    /// Returns a lent provider to its slot.
    ///
    /// A replacement registered while the provider was lent out wins.
    pub(crate) fn restore(&mut self, position: usize, provider: Box<dyn ServiceProvider>) {
        if let Some(slot) = self.slots.get_mut(position) {
            if slot.provider.is_none() {
                slot.provider = Some(provider);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ProviderPhase, ProviderRegistry, ServiceProvider};
    use crate::container::service_container::Container;

    struct NamedProvider {
        name: &'static str,
        provides: Vec<String>,
        deferred: bool,
    }

    impl NamedProvider {
        fn new(name: &'static str, provides: &[&str], deferred: bool) -> Self {
            Self {
                name,
                provides: provides.iter().map(|alias| alias.to_string()).collect(),
                deferred,
            }
        }
    }

    impl ServiceProvider for NamedProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn register(&mut self, _container: &mut Container) {}

        fn is_deferred(&self) -> bool {
            self.deferred
        }

        fn provides(&self) -> &[String] {
            &self.provides
        }
    }

    struct Unnamed;

    impl ServiceProvider for Unnamed {
        fn register(&mut self, _container: &mut Container) {}
    }

    #[test]
    fn default_name_is_type_name() {
        assert!(Unnamed.name().ends_with("Unnamed"));
    }

    #[test]
    fn reinsert_replaces_in_place() {
        let mut registry = ProviderRegistry::new();
        assert!(!registry.insert(Box::new(NamedProvider::new("cache", &[], false))));
        assert!(!registry.insert(Box::new(NamedProvider::new("queue", &[], false))));
        assert!(registry.insert(Box::new(NamedProvider::new("cache", &["redis"], true))));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["cache", "queue"]);
        assert!(registry.is_deferred_at(0));
        assert!(registry.contains("queue"));
    }

    #[test]
    fn finds_first_provider_in_registration_order() {
        let mut registry = ProviderRegistry::new();
        registry.insert(Box::new(NamedProvider::new("first", &["db"], true)));
        registry.insert(Box::new(NamedProvider::new("second", &["db", "log"], false)));

        assert_eq!(registry.position_providing("db"), Some(0));
        assert_eq!(registry.position_providing("log"), Some(1));
        assert_eq!(registry.position_providing("mail"), None);
    }

    #[test]
    fn lends_each_phase_once() {
        let mut registry = ProviderRegistry::new();
        registry.insert(Box::new(NamedProvider::new("cache", &[], false)));

        let (name, provider) = registry
            .lend(0, ProviderPhase::Load)
            .expect("first load lend");
        assert_eq!(name, "cache");
        assert!(registry.lend(0, ProviderPhase::Register).is_none());
        registry.restore(0, provider);

        assert!(registry.is_loaded_at(0));
        assert!(registry.lend(0, ProviderPhase::Load).is_none());
        assert!(registry.lend(0, ProviderPhase::Register).is_some());
    }
}
