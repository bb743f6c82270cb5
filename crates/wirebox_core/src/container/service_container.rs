//! Service container: bindings, resolution and provider lifecycle.
//!
//! # Responsibility
//! - Own every container map (bindings, resolved, sharable, shared, providers).
//! - Resolve aliases depth-first in declared dependency order.
//! - Route every failure through the installed `ErrorHandler`.
//!
//! # Invariants
//! - A resolved instance exists only while its alias is bound.
//! - Only sharable aliases are cached.
//! - An alias never appears twice in one resolution's injection stack.

use crate::config::ContainerConfig;
use crate::container::binding::{Arguments, Binding, Instance};
use crate::container::error::{ContainerError, ContainerErrorKind, ContainerResult, ErrorHandler};
use crate::container::provider::{ProviderPhase, ProviderRegistry, ServiceProvider};
use crate::container::sharing::{ShareBuilder, SharedRegistry, TargetId};
use crate::container::trace::DebugTrace;
use log::{info, warn};
use std::any::{type_name, Any};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Aliases in flight during one top-level resolution.
#[derive(Debug)]
struct InjectionStack {
    aliases: Vec<String>,
}

impl InjectionStack {
    fn new(root: &str) -> Self {
        Self {
            aliases: vec![root.to_string()],
        }
    }

    fn contains(&self, alias: &str) -> bool {
        self.aliases.iter().any(|in_flight| in_flight == alias)
    }

    fn push(&mut self, alias: &str) {
        self.aliases.push(alias.to_string());
    }

    fn pop(&mut self) {
        self.aliases.pop();
    }

    /// Current chain closed by `alias`, e.g. `a -> b -> a`.
    fn chain_with(&self, alias: &str) -> String {
        let mut chain = self.aliases.clone();
        chain.push(alias.to_string());
        chain.join(" -> ")
    }
}

/// Inversion-of-control container.
pub struct Container {
    name: String,
    bindings: BTreeMap<String, Binding>,
    resolved: BTreeMap<String, Instance>,
    sharable: BTreeSet<String>,
    shared: SharedRegistry,
    providers: ProviderRegistry,
    handler: Option<Box<dyn ErrorHandler>>,
    trace: DebugTrace,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Container {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.name)
            .field("bindings", &self.bindings.keys().collect::<Vec<_>>())
            .field("resolved", &self.resolved.keys().collect::<Vec<_>>())
            .field("providers", &self.providers.names())
            .field("debugging", &self.trace.enabled())
            .finish()
    }
}

impl Container {
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::with_config(ContainerConfig::named(name))
    }

    pub fn with_config(config: ContainerConfig) -> Self {
        Self {
            name: config.normalized_name(),
            bindings: BTreeMap::new(),
            resolved: BTreeMap::new(),
            sharable: BTreeSet::new(),
            shared: SharedRegistry::default(),
            providers: ProviderRegistry::new(),
            handler: None,
            trace: DebugTrace::new(config.debug),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ---- bindings ----------------------------------------------------------

    /// Binds `alias` as a shared (cacheable) service. Rebinding overwrites.
    pub fn bind(&mut self, alias: impl Into<String>, binding: Binding) -> &mut Self {
        self.bind_with(alias.into(), binding, true)
    }

    /// Binds `alias` without caching: every `make` re-runs the binding.
    pub fn bind_transient(&mut self, alias: impl Into<String>, binding: Binding) -> &mut Self {
        self.bind_with(alias.into(), binding, false)
    }

    fn bind_with(&mut self, alias: String, binding: Binding, shared: bool) -> &mut Self {
        self.trace(|| format!("bind `{alias}` as {:?} (shared={shared})", binding.kind()));
        // The previous binding's cached instance no longer describes this alias.
        self.resolved.remove(&alias);
        if shared {
            self.sharable.insert(alias.clone());
        } else {
            self.sharable.remove(&alias);
        }
        self.bindings.insert(alias, binding);
        self
    }

    /// Destroys any resolved instance, then forgets the binding. Idempotent.
    pub fn un_bind(&mut self, alias: &str) -> &mut Self {
        self.trace(|| format!("unbind `{alias}`"));
        self.destroy(alias);
        self.un_share(alias);
        self.bindings.remove(alias);
        self.sharable.remove(alias);
        self
    }

    /// Caches `instance` for `alias` without resolving, marking it sharable.
    pub fn set_instance(&mut self, alias: impl Into<String>, instance: Instance) -> Instance {
        self.set_instance_with(alias.into(), instance, true)
    }

    /// Records `instance` for `alias` without marking it sharable.
    pub fn set_transient_instance(
        &mut self,
        alias: impl Into<String>,
        instance: Instance,
    ) -> Instance {
        self.set_instance_with(alias.into(), instance, false)
    }

    fn set_instance_with(&mut self, alias: String, instance: Instance, shared: bool) -> Instance {
        self.trace(|| format!("set instance `{alias}` (shared={shared})"));
        if !self.bindings.contains_key(&alias) {
            self.bindings
                .insert(alias.clone(), Binding::instance(instance.clone()));
        }
        if shared {
            self.sharable.insert(alias.clone());
        }
        self.resolved.insert(alias, instance.clone());
        instance
    }

    /// Unshares, then clears the resolved instance of `alias`.
    ///
    /// Returns whether anything was destroyed.
    pub fn destroy(&mut self, alias: &str) -> bool {
        if !self.resolved.contains_key(alias) {
            return false;
        }
        self.un_share(alias);
        self.resolved.remove(alias);
        self.trace(|| format!("destroy `{alias}`"));
        true
    }

    // ---- resolution --------------------------------------------------------

    /// Resolves `alias`, returning the cached instance when shared.
    pub fn make(&mut self, alias: &str) -> ContainerResult<Instance> {
        self.resolve(alias, false)
    }

    /// Destroys any cached instance of `alias` and resolves it afresh.
    pub fn rebound(&mut self, alias: &str) -> ContainerResult<Instance> {
        self.resolve(alias, true)
    }

    /// Resolves `alias` and downcasts it to `T`.
    ///
    /// A type mismatch is returned as a Binding error without consulting the handler.
    pub fn make_as<T: Any>(&mut self, alias: &str) -> ContainerResult<Rc<T>> {
        let instance = self.make(alias)?;
        instance.downcast::<T>().map_err(|_| {
            self.error(
                ContainerErrorKind::Binding,
                format!("`{alias}` does not resolve to a `{}`", type_name::<T>()),
            )
        })
    }

    fn resolve(&mut self, alias: &str, rebound: bool) -> ContainerResult<Instance> {
        let mut stack = InjectionStack::new(alias);
        self.resolve_in(alias, rebound, &mut stack)
    }

    fn resolve_in(
        &mut self,
        alias: &str,
        rebound: bool,
        stack: &mut InjectionStack,
    ) -> ContainerResult<Instance> {
        if !rebound && self.sharable.contains(alias) {
            if let Some(instance) = self.resolved.get(alias).cloned() {
                self.trace(|| format!("make `{alias}` from cache"));
                return Ok(instance);
            }
        }
        if rebound {
            self.destroy(alias);
        }
        if !self.bindings.contains_key(alias) {
            let err = self.error(
                ContainerErrorKind::Binding,
                format!("no binding registered for `{alias}`"),
            );
            return self.handle_error(err);
        }

        // A failing `load()` is a failure site of its own.
        if let Err(err) = self.boot_deferred_provider(alias) {
            return self.handle_error(err);
        }

        // `load()` may have resolved the alias itself; that instance is the singleton.
        if self.sharable.contains(alias) {
            if let Some(instance) = self.resolved.get(alias).cloned() {
                self.trace(|| format!("make `{alias}` from cache after provider boot"));
                return Ok(instance);
            }
        }

        // `load()` of a deferred provider may have rebound or dropped the alias.
        let Some(binding) = self.bindings.get(alias).cloned() else {
            let err = self.error(
                ContainerErrorKind::Binding,
                format!("binding for `{alias}` was removed while booting its provider"),
            );
            return self.handle_error(err);
        };

        let instance = match binding {
            Binding::Value(value) => value,
            Binding::Constructor {
                dependencies,
                build,
            } => {
                let args = self.resolve_dependencies(&dependencies, stack)?;
                build(&args)
            }
            Binding::Factory {
                dependencies,
                build,
            } => {
                let args = self.resolve_dependencies(&dependencies, stack)?;
                match build(&args) {
                    Ok(Some(instance)) => instance,
                    Ok(None) => {
                        let err = self.error(
                            ContainerErrorKind::Binding,
                            format!("binding `{alias}` failed: factory produced no instance"),
                        );
                        return self.handle_error(err);
                    }
                    Err(source) => {
                        let err = self
                            .error(
                                ContainerErrorKind::Instantiation,
                                format!("binding `{alias}` failed: {source}"),
                            )
                            .with_source(source);
                        return self.handle_error(err);
                    }
                }
            }
        };

        if self.sharable.contains(alias) {
            self.resolved.insert(alias.to_string(), instance.clone());
        }
        self.trace(|| format!("make `{alias}` resolved"));
        Ok(instance)
    }

    fn resolve_dependencies(
        &mut self,
        dependencies: &[String],
        stack: &mut InjectionStack,
    ) -> ContainerResult<Arguments> {
        let mut values = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            if stack.contains(dependency) {
                let err = self.error(
                    ContainerErrorKind::CircularDependency,
                    format!(
                        "circular dependency detected: {}",
                        stack.chain_with(dependency)
                    ),
                );
                values.push(self.handle_error(err)?);
                continue;
            }
            stack.push(dependency);
            let resolved = self.resolve_in(dependency, false, stack);
            stack.pop();
            values.push(resolved?);
        }
        Ok(Arguments::new(values))
    }

    // ---- providers ---------------------------------------------------------

    /// Stores `provider` under its name. Re-registering a name replaces it.
    pub fn register<P: ServiceProvider + 'static>(&mut self, provider: P) -> &mut Self {
        let name = provider.name().to_string();
        let replaced = self.providers.insert(Box::new(provider));
        self.trace(|| format!("register provider `{name}` (replaced={replaced})"));
        self
    }

    /// Runs `register()` on every provider, then `load()` on eager ones.
    ///
    /// Deferred providers boot on first resolution of an alias they provide.
    pub fn boot_providers(&mut self) -> ContainerResult<()> {
        let mut position = 0;
        while position < self.providers.len() {
            self.run_provider(position, ProviderPhase::Register)?;
            position += 1;
        }
        for position in 0..self.providers.len() {
            if self.providers.is_deferred_at(position) {
                continue;
            }
            self.run_provider(position, ProviderPhase::Load)?;
        }
        info!(
            "event=providers_boot module=container status=ok container={} providers={}",
            self.name,
            self.providers.len()
        );
        Ok(())
    }

    fn boot_deferred_provider(&mut self, alias: &str) -> ContainerResult<()> {
        let Some(position) = self.providers.position_providing(alias) else {
            return Ok(());
        };
        if !self.providers.is_deferred_at(position) || self.providers.is_loaded_at(position) {
            return Ok(());
        }
        self.trace(|| format!("boot deferred provider for `{alias}`"));
        self.run_provider(position, ProviderPhase::Load)
    }

    fn run_provider(&mut self, position: usize, phase: ProviderPhase) -> ContainerResult<()> {
        let Some((name, mut provider)) = self.providers.lend(position, phase) else {
            return Ok(());
        };
        let result = match phase {
            ProviderPhase::Register => {
                self.trace(|| format!("provider `{name}` register"));
                provider.register(self);
                Ok(())
            }
            ProviderPhase::Load => {
                self.trace(|| format!("provider `{name}` load"));
                provider.load(self)
            }
        };
        self.providers.restore(position, provider);
        if let Err(err) = &result {
            warn!(
                "event=provider_boot module=container status=error container={} provider={} phase={:?} error={}",
                self.name, name, phase, err
            );
        }
        result
    }

    // ---- sharing -----------------------------------------------------------

    /// Stages `aliases` for `with_others`.
    ///
    /// Each alias must be bound and sharable; rejected aliases go through
    /// `handle_error` and are not staged.
    pub fn share(&mut self, aliases: &[&str]) -> ContainerResult<ShareBuilder<'_>> {
        let mut staged: Vec<String> = Vec::with_capacity(aliases.len());
        for alias in aliases.iter().map(|alias| alias.trim()) {
            let rejection = if !self.is_bound(alias) {
                Some("it is not bound")
            } else if !self.sharable.contains(alias) {
                Some("it is not sharable")
            } else {
                None
            };
            match rejection {
                Some(reason) => {
                    let err = self.error(
                        ContainerErrorKind::Sharing,
                        format!("cannot share `{alias}`: {reason}"),
                    );
                    self.handle_error(err)?;
                }
                None if staged.iter().any(|existing| existing == alias) => {}
                None => staged.push(alias.to_string()),
            }
        }
        self.trace(|| format!("share staged {staged:?}"));
        Ok(ShareBuilder::new(self, staged))
    }

    pub(crate) fn attach_shared(&mut self, aliases: &[String], targets: &[TargetId]) -> usize {
        let mut attached = 0;
        for alias in aliases {
            for target in targets {
                if self.shared.attach(alias, target) {
                    attached += 1;
                    self.trace(|| format!("share `{alias}` with `{target}`"));
                }
            }
        }
        attached
    }

    /// Removes the accessor for `alias` from every target it was shared with.
    pub fn un_share(&mut self, alias: &str) -> bool {
        let targets = self.shared.detach(alias);
        if targets.is_empty() {
            return false;
        }
        self.trace(|| format!("unshare `{alias}` from {} target(s)", targets.len()));
        true
    }

    /// Runs the accessor `property` attached to `target`, i.e. `make(alias)`.
    pub fn invoke_accessor(
        &mut self,
        target: &TargetId,
        property: &str,
    ) -> ContainerResult<Instance> {
        let Some(alias) = self.shared.alias_for(target, property).map(str::to_string) else {
            let err = self.error(
                ContainerErrorKind::Sharing,
                format!("target `{target}` has no accessor `{property}`"),
            );
            return self.handle_error(err);
        };
        self.make(&alias)
    }

    pub fn has_accessor(&self, target: &TargetId, property: &str) -> bool {
        self.shared.alias_for(target, property).is_some()
    }

    /// Accessor names attached to `target`, sorted.
    pub fn accessors(&self, target: &TargetId) -> Vec<String> {
        self.shared.accessors(target)
    }

    /// Targets `alias` is shared with, in attachment order.
    pub fn shared_with(&self, alias: &str) -> &[TargetId] {
        self.shared.targets(alias)
    }

    // ---- predicates --------------------------------------------------------

    pub fn is_bound(&self, alias: &str) -> bool {
        self.bindings.contains_key(alias)
    }

    pub fn is_resolved(&self, alias: &str) -> bool {
        self.resolved.contains_key(alias)
    }

    pub fn is_shared(&self, alias: &str) -> bool {
        self.shared.is_shared(alias)
    }

    pub fn can_share(&self, alias: &str) -> bool {
        self.is_bound(alias) && self.sharable.contains(alias)
    }

    pub fn is_registered(&self, provider_name: &str) -> bool {
        self.providers.contains(provider_name)
    }

    /// Registered provider names in registration order.
    pub fn providers(&self) -> Vec<String> {
        self.providers.names()
    }

    // ---- errors ------------------------------------------------------------

    /// Installs the handler consulted at every failure site.
    pub fn error_handler(&mut self, handler: impl ErrorHandler + 'static) -> &mut Self {
        self.trace(|| "install error handler".to_string());
        self.handler = Some(Box::new(handler));
        self
    }

    /// Delegates `error` to the installed handler, or re-raises it.
    pub fn handle_error(&mut self, error: ContainerError) -> ContainerResult<Instance> {
        self.trace(|| format!("error {error}"));
        match &self.handler {
            Some(handler) => {
                warn!(
                    "event=container_error module=container status=handled name=\"{}\" message=\"{}\"",
                    error.name(),
                    error.message()
                );
                handler.handle(error)
            }
            None => {
                warn!(
                    "event=container_error module=container status=raised name=\"{}\" message=\"{}\"",
                    error.name(),
                    error.message()
                );
                Err(error)
            }
        }
    }

    fn error(&self, kind: ContainerErrorKind, message: impl Into<String>) -> ContainerError {
        ContainerError::new(&self.name, kind, message)
    }

    // ---- debug trace -------------------------------------------------------

    pub fn debug(&mut self, enabled: bool) -> &mut Self {
        self.trace.set_enabled(enabled);
        self
    }

    pub fn debugging(&self) -> bool {
        self.trace.enabled()
    }

    /// Trace lines recorded while debugging.
    pub fn log_output(&self) -> &[String] {
        self.trace.lines()
    }

    /// Clears the trace buffer, returning what it held.
    pub fn flush_logs(&mut self) -> Vec<String> {
        self.trace.flush()
    }

    fn trace(&mut self, message: impl FnOnce() -> String) {
        if self.trace.enabled() {
            self.trace.record(&self.name, message());
        }
    }
}
