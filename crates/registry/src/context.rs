//! Context handed to builder functions.

use std::sync::Arc;

use crate::error::Result;
use crate::identifier::{AnyIdentifier, Identifier};
use crate::mode::Mode;
use crate::registry::Registry;

/// What a builder sees while it runs: the registry that owns the binding
/// and the mode the value is being constructed in.
///
/// Builders resolve their own dependencies through [`Context::resolve`] so
/// that deep-unique requests propagate.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    registry: &'a Registry,
    identifier: &'a AnyIdentifier,
    mode: Mode,
}

impl<'a> Context<'a> {
    pub(crate) fn new(registry: &'a Registry, identifier: &'a AnyIdentifier, mode: Mode) -> Self {
        Self {
            registry,
            identifier,
            mode,
        }
    }

    /// The registry that owns the binding being built.
    #[must_use]
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// The identifier being built.
    #[must_use]
    pub fn identifier(&self) -> &'a AnyIdentifier {
        self.identifier
    }

    /// The construction mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Resolve a dependency in the mode appropriate for this construction.
    pub fn resolve<T: Send + Sync + 'static>(&self, identifier: &Identifier<T>) -> Result<Arc<T>> {
        self.registry.resolve_with(identifier, self.mode.nested())
    }
}
