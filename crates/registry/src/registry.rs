//! The registry: bindings, the singleton cache, scopes and notifications.

use std::any::type_name;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::binding::{Binding, Instance};
use crate::config::RegistryConfig;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::events::{ErrorEvent, ErrorKind, EventChannel, InstanceEvent};
use crate::identifier::{AnyIdentifier, Identifier, Key};
use crate::lifecycle::Lifecycle;
use crate::mode::Mode;
use crate::params::{Arguments, Construct, Param, validate};
use crate::scope::{Scope, ScopeKey, Shape};

/// Lookup into the owning registry, used by inherited children.
type Fallback = Box<dyn Fn(&AnyIdentifier, Mode) -> Result<Option<Instance>> + Send + Sync>;

struct Entry {
    identifier: AnyIdentifier,
    binding: Binding,
}

struct Inner {
    config: RegistryConfig,
    bindings: RwLock<IndexMap<Key, Entry>>,
    singletons: RwLock<IndexMap<Key, Instance>>,
    scopes: RwLock<IndexMap<ScopeKey, Scope>>,
    fallback: Option<Fallback>,
    errors: EventChannel<ErrorEvent>,
    created: EventChannel<InstanceEvent>,
    resolved: EventChannel<InstanceEvent>,
    lifecycle: Lifecycle,
}

/// Counts describing a registry's current contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    /// Identifiers with a binding.
    pub bindings: usize,
    /// Cached singleton values.
    pub singletons: usize,
    /// Scopes created so far.
    pub scopes: usize,
    /// Child registries created so far across all live scopes.
    pub children: usize,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Instance registry with lazy, mode-aware resolution.
///
/// Bindings are write-once per registry. Values are built on demand; in
/// [`Mode::Singleton`] the first value is cached and handed out from then
/// on. `Registry` is a cheap handle: clones share the same state.
///
/// No lock is held while a builder runs, so builders may freely resolve
/// other identifiers (including from other threads). When two threads race
/// to build the same singleton, both builders run and the first value to
/// reach the cache is the one every caller receives.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Inner>,
}

impl Registry {
    /// Create a root registry with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(RegistryConfig::default(), None)
    }

    /// Create a root registry from a validated configuration.
    pub fn with_config(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, None))
    }

    fn build(config: RegistryConfig, fallback: Option<Fallback>) -> Self {
        let name = &config.name;
        let capacity = config.event_capacity;
        let inner = Arc::new(Inner {
            errors: EventChannel::new(format!("error channel of registry '{name}'"), capacity),
            created: EventChannel::new(format!("created channel of registry '{name}'"), capacity),
            resolved: EventChannel::new(format!("resolved channel of registry '{name}'"), capacity),
            lifecycle: Lifecycle::new(format!("registry '{name}'")),
            bindings: RwLock::new(IndexMap::new()),
            singletons: RwLock::new(IndexMap::new()),
            scopes: RwLock::new(IndexMap::new()),
            fallback,
            config,
        });

        let weak = Arc::downgrade(&inner);
        inner.lifecycle.on_dispose(move || {
            if let Some(inner) = weak.upgrade() {
                Self { inner }.teardown();
            }
        });

        Self { inner }
    }

    /// Child registry for `key`/`shape` of the registry behind `owner`.
    fn child(owner: &Weak<Inner>, key: &ScopeKey, shape: Shape) -> Result<Self> {
        let parent = owner.upgrade().map(|inner| Self { inner }).ok_or_else(|| Error::Disposed {
            target: format!("owner of scope '{key}'"),
        })?;
        parent.guard()?;

        let config = RegistryConfig {
            name: format!("{}/{key}:{shape}", parent.name()),
            ..parent.inner.config.clone()
        };
        let fallback: Option<Fallback> = match shape {
            Shape::Isolated => None,
            Shape::Inherited => {
                let owner = owner.clone();
                Some(Box::new(move |identifier: &AnyIdentifier, mode: Mode| {
                    match owner.upgrade() {
                        Some(inner) => {
                            let parent = Self { inner };
                            parent.guard()?;
                            parent.lookup(identifier, mode)
                        }
                        None => Ok(None),
                    }
                }))
            }
        };

        tracing::debug!(
            registry = %parent.name(),
            scope = %key,
            %shape,
            "Created scope registry"
        );
        Ok(Self::build(config, fallback))
    }

    /// The registry's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// The configuration this registry was created with.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Whether both handles point to the same registry.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn guard(&self) -> Result<()> {
        self.inner.lifecycle.guard()
    }

    // -----------------------------------------------------------------------
    // Binding
    // -----------------------------------------------------------------------

    /// Bind `identifier` to a builder function.
    ///
    /// The builder runs each time a value must be constructed. It receives
    /// a [`Context`] to resolve its own dependencies through.
    pub fn define<T, F>(&self, identifier: &Identifier<T>, builder: F) -> Result<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&Context<'_>) -> Result<T> + Send + Sync + 'static,
    {
        let build = Arc::new(move |ctx: &Context<'_>| builder(ctx).map(|value| Arc::new(value) as Instance));
        self.bind(identifier.erased(), Binding::Builder(build))
    }

    /// Bind `identifier` to whatever `target` resolves to.
    pub fn alias<T>(&self, identifier: &Identifier<T>, target: &Identifier<T>) -> Result<()> {
        self.bind(identifier.erased(), Binding::Alias(target.erased().clone()))
    }

    /// Bind the type `T` to its own constructor with `params`.
    pub fn provide<T: Construct>(&self, params: impl IntoIterator<Item = Param>) -> Result<()> {
        self.provide_as(&Identifier::<T>::of(), params)
    }

    /// Bind `identifier` to the constructor of `T` with `params`.
    ///
    /// `params` must match [`Construct::parameters`] in count and type;
    /// otherwise nothing is bound and [`Error::Parameters`] is returned.
    pub fn provide_as<T: Construct>(
        &self,
        identifier: &Identifier<T>,
        params: impl IntoIterator<Item = Param>,
    ) -> Result<()> {
        self.guard()?;
        if self.inner.bindings.read().contains_key(&identifier.key()) {
            return Err(self.fail(identifier.erased(), ErrorKind::Duplicate));
        }
        let params: Vec<Param> = params.into_iter().collect();
        validate(identifier.erased(), &T::parameters(), &params)?;
        let build = Arc::new(|args: &mut Arguments| {
            T::construct(args).map(|value| Arc::new(value) as Instance)
        });
        self.bind(identifier.erased(), Binding::Recipe { build, params })
    }

    fn bind(&self, identifier: &AnyIdentifier, binding: Binding) -> Result<()> {
        self.guard()?;
        {
            let mut bindings = self.inner.bindings.write();
            if !bindings.contains_key(&identifier.key()) {
                tracing::debug!(
                    registry = %self.name(),
                    identifier = %identifier,
                    kind = binding.kind(),
                    "Registered binding"
                );
                bindings.insert(
                    identifier.key(),
                    Entry {
                        identifier: identifier.clone(),
                        binding,
                    },
                );
                return Ok(());
            }
        }
        Err(self.fail(identifier, ErrorKind::Duplicate))
    }

    /// Log, publish and build a duplicate or missing error.
    fn fail(&self, identifier: &AnyIdentifier, kind: ErrorKind) -> Error {
        tracing::warn!(registry = %self.name(), identifier = %identifier, %kind, "Registry error");
        self.inner.errors.publish(&ErrorEvent {
            identifier: identifier.clone(),
            kind,
        });
        let identifier = identifier.name().to_owned();
        match kind {
            ErrorKind::Duplicate => Error::Duplicate { identifier },
            ErrorKind::Missing => Error::Missing { identifier },
        }
    }

    /// Whether `identifier` is bound in this registry itself.
    pub fn has<T>(&self, identifier: &Identifier<T>) -> Result<bool> {
        self.guard()?;
        Ok(self.inner.bindings.read().contains_key(&identifier.key()))
    }

    /// Whether this registry holds a cached singleton for `identifier`.
    pub fn is_cached<T>(&self, identifier: &Identifier<T>) -> Result<bool> {
        self.guard()?;
        Ok(self.inner.singletons.read().contains_key(&identifier.key()))
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Resolve `identifier` as a singleton.
    pub fn resolve<T: Send + Sync + 'static>(&self, identifier: &Identifier<T>) -> Result<Arc<T>> {
        self.resolve_with(identifier, Mode::Singleton)
    }

    /// Resolve `identifier` in `mode`.
    pub fn resolve_with<T: Send + Sync + 'static>(
        &self,
        identifier: &Identifier<T>,
        mode: Mode,
    ) -> Result<Arc<T>> {
        let instance = self.resolve_any(identifier.erased(), mode)?;
        instance.downcast::<T>().map_err(|_| Error::TypeMismatch {
            identifier: identifier.name().to_owned(),
            expected: type_name::<T>(),
        })
    }

    /// Type-erased resolution.
    ///
    /// Publishes a resolved event on success, or an error event followed by
    /// [`Error::Missing`] when nothing along the fallback chain binds
    /// `identifier`. Errors raised by builders propagate unchanged.
    pub fn resolve_any(&self, identifier: &AnyIdentifier, mode: Mode) -> Result<Instance> {
        self.guard()?;
        match self.lookup(identifier, mode)? {
            Some(instance) => {
                self.inner.resolved.publish(&InstanceEvent {
                    identifier: identifier.clone(),
                    instance: Arc::clone(&instance),
                });
                Ok(instance)
            }
            None => Err(self.fail(identifier, ErrorKind::Missing)),
        }
    }

    /// Produce a value without publishing resolved or missing events.
    ///
    /// Returns `Ok(None)` when neither this registry nor its fallback chain
    /// binds `identifier`.
    fn lookup(&self, identifier: &AnyIdentifier, mode: Mode) -> Result<Option<Instance>> {
        let key = identifier.key();

        if mode.is_cached() {
            let cached = self.inner.singletons.read().get(&key).cloned();
            if let Some(instance) = cached {
                tracing::trace!(
                    registry = %self.name(),
                    identifier = %identifier,
                    %mode,
                    cache_hit = true,
                    "Resolved"
                );
                return Ok(Some(instance));
            }
        }

        let binding = self
            .inner
            .bindings
            .read()
            .get(&key)
            .map(|entry| entry.binding.clone());

        let Some(binding) = binding else {
            return match &self.inner.fallback {
                Some(fallback) => fallback(identifier, mode.nested()),
                None => Ok(None),
            };
        };

        let instance = binding.invoke(identifier, self, mode.nested())?;
        tracing::debug!(
            registry = %self.name(),
            identifier = %identifier,
            %mode,
            "Constructed instance"
        );
        self.inner.created.publish(&InstanceEvent {
            identifier: identifier.clone(),
            instance: Arc::clone(&instance),
        });

        let instance = if mode.is_cached() {
            Arc::clone(
                self.inner
                    .singletons
                    .write()
                    .entry(key)
                    .or_insert(instance),
            )
        } else {
            instance
        };

        tracing::trace!(
            registry = %self.name(),
            identifier = %identifier,
            %mode,
            cache_hit = false,
            "Resolved"
        );
        Ok(Some(instance))
    }

    /// Resolve several identifiers of the same type as singletons, in order.
    pub fn inject<T: Send + Sync + 'static>(&self, identifiers: &[Identifier<T>]) -> Result<Vec<Arc<T>>> {
        self.inject_with(identifiers, Mode::Singleton)
    }

    /// Resolve several identifiers of the same type in `mode`, in order.
    pub fn inject_with<T: Send + Sync + 'static>(
        &self,
        identifiers: &[Identifier<T>],
        mode: Mode,
    ) -> Result<Vec<Arc<T>>> {
        identifiers
            .iter()
            .map(|identifier| self.resolve_with(identifier, mode))
            .collect()
    }

    /// Resolve every bound identifier as a singleton, then presolve every
    /// child registry.
    ///
    /// Stops at the first failure; values cached before it stay cached.
    pub fn presolve(&self) -> Result<()> {
        self.guard()?;
        let identifiers: Vec<AnyIdentifier> = self
            .inner
            .bindings
            .read()
            .values()
            .map(|entry| entry.identifier.clone())
            .collect();

        tracing::debug!(registry = %self.name(), count = identifiers.len(), "Presolving");
        for identifier in &identifiers {
            self.resolve_any(identifier, Mode::Singleton)?;
        }
        for child in self.scope_instances()? {
            child.presolve()?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Cache management
    // -----------------------------------------------------------------------

    /// Drop the cached singleton for `identifier`. With `include_scopes`,
    /// also drop it from every descendant registry.
    ///
    /// Returns whether this registry held a cached value. The binding is
    /// kept, so the next singleton request builds a new value.
    pub fn remove_singleton<T>(&self, identifier: &Identifier<T>, include_scopes: bool) -> Result<bool> {
        self.remove_cached(identifier.erased(), include_scopes)
    }

    fn remove_cached(&self, identifier: &AnyIdentifier, include_scopes: bool) -> Result<bool> {
        self.guard()?;
        let removed = self
            .inner
            .singletons
            .write()
            .shift_remove(&identifier.key())
            .is_some();
        tracing::debug!(registry = %self.name(), identifier = %identifier, removed, "Removed singleton");

        if include_scopes {
            for child in self.scope_instances()? {
                child.remove_cached(identifier, true)?;
            }
        }
        Ok(removed)
    }

    /// Drop the cached singleton for `identifier` in this registry only.
    pub fn flush<T>(&self, identifier: &Identifier<T>) -> Result<bool> {
        self.remove_singleton(identifier, false)
    }

    /// Drop every cached singleton. With `include_scopes`, recurse into
    /// every descendant registry.
    pub fn clear_singletons(&self, include_scopes: bool) -> Result<()> {
        self.guard()?;
        let cleared = {
            let mut singletons = self.inner.singletons.write();
            let cleared = singletons.len();
            singletons.clear();
            cleared
        };
        tracing::debug!(registry = %self.name(), cleared, "Cleared singletons");

        if include_scopes {
            for child in self.scope_instances()? {
                child.clear_singletons(true)?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Scopes
    // -----------------------------------------------------------------------

    /// The scope stored under `key`, created on first request.
    pub fn scope(&self, key: impl Into<ScopeKey>) -> Result<Scope> {
        self.guard()?;
        let key = key.into();
        let mut scopes = self.inner.scopes.write();
        let scope = scopes.entry(key.clone()).or_insert_with(|| {
            let owner = Arc::downgrade(&self.inner);
            Scope::new(
                key,
                self.name(),
                Box::new(move |key: &ScopeKey, shape: Shape| Self::child(&owner, key, shape)),
            )
        });
        Ok(scope.clone())
    }

    /// Every scope created so far, in creation order.
    pub fn scopes(&self) -> Result<Vec<Scope>> {
        self.guard()?;
        Ok(self.inner.scopes.read().values().cloned().collect())
    }

    /// Every live child registry across live scopes.
    pub fn scope_instances(&self) -> Result<Vec<Registry>> {
        let mut instances = Vec::new();
        for scope in self.scopes()? {
            if !scope.is_disposed() {
                instances.extend(
                    scope
                        .instances()?
                        .into_iter()
                        .filter(|child| !child.is_disposed()),
                );
            }
        }
        Ok(instances)
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    /// Channel for duplicate and missing errors.
    pub fn on_error(&self) -> Result<&EventChannel<ErrorEvent>> {
        self.guard()?;
        Ok(&self.inner.errors)
    }

    /// Channel for constructed values. Fires in the registry that ran the
    /// builder.
    pub fn on_created(&self) -> Result<&EventChannel<InstanceEvent>> {
        self.guard()?;
        Ok(&self.inner.created)
    }

    /// Channel for resolved values. Fires once per resolve request made on
    /// this registry, including nested dependency requests.
    pub fn on_resolved(&self) -> Result<&EventChannel<InstanceEvent>> {
        self.guard()?;
        Ok(&self.inner.resolved)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Current contents.
    pub fn stats(&self) -> Result<RegistryStats> {
        self.guard()?;
        Ok(RegistryStats {
            bindings: self.inner.bindings.read().len(),
            singletons: self.inner.singletons.read().len(),
            scopes: self.inner.scopes.read().len(),
            children: self.scope_instances()?.len(),
        })
    }

    /// Whether the registry has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.lifecycle.is_disposed()
    }

    /// Dispose the registry, its scopes and every child registry.
    ///
    /// Afterwards every operation fails with [`Error::Disposed`], and so
    /// does a second `dispose`.
    pub fn dispose(&self) -> Result<()> {
        self.inner.lifecycle.dispose()
    }

    fn teardown(&self) {
        let scopes: Vec<Scope> = self
            .inner
            .scopes
            .write()
            .drain(..)
            .map(|(_, scope)| scope)
            .collect();
        for scope in scopes {
            if scope.is_disposed() {
                continue;
            }
            if let Err(error) = scope.dispose() {
                tracing::warn!(registry = %self.name(), scope = %scope.key(), %error, "Failed to dispose scope");
            }
        }

        self.inner.singletons.write().clear();
        self.inner.bindings.write().clear();
        // Channels are only disposed here, so these cannot fail.
        let _ = self.inner.errors.dispose();
        let _ = self.inner.created.dispose();
        let _ = self.inner.resolved.dispose();
        tracing::debug!(registry = %self.name(), "Tore down registry");
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.name())
            .field("bindings", &self.inner.bindings.read().len())
            .field("singletons", &self.inner.singletons.read().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
