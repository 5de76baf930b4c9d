//! Bindings: how a registry produces the value for an identifier.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Result;
use crate::identifier::AnyIdentifier;
use crate::mode::Mode;
use crate::params::{Arguments, Param};
use crate::registry::Registry;

/// A resolved value, type-erased. Identity is `Arc::ptr_eq`.
pub type Instance = Arc<dyn Any + Send + Sync>;

pub(crate) type Builder = Arc<dyn Fn(&Context<'_>) -> Result<Instance> + Send + Sync>;
pub(crate) type Recipe = Arc<dyn Fn(&mut Arguments) -> Result<Instance> + Send + Sync>;

/// The three binding forms. All of them collapse into "build a value given
/// the registry and a mode" through [`Binding::invoke`].
#[derive(Clone)]
pub(crate) enum Binding {
    /// Caller-supplied builder function.
    Builder(Builder),
    /// Delegates to another identifier.
    Alias(AnyIdentifier),
    /// A constructor plus its parameter list.
    Recipe { build: Recipe, params: Vec<Param> },
}

impl Binding {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Builder(_) => "builder",
            Self::Alias(_) => "alias",
            Self::Recipe { .. } => "recipe",
        }
    }

    /// Build a value for `identifier` in `registry`.
    ///
    /// `mode` is the construction mode: never `Unique`, since a unique
    /// request constructs its own value as a singleton would.
    pub(crate) fn invoke(
        &self,
        identifier: &AnyIdentifier,
        registry: &Registry,
        mode: Mode,
    ) -> Result<Instance> {
        match self {
            Self::Builder(build) => build(&Context::new(registry, identifier, mode)),
            Self::Alias(target) => registry.resolve_any(target, mode),
            Self::Recipe { build, params } => {
                let nested = mode.nested();
                let mut values = Vec::with_capacity(params.len());
                for param in params {
                    values.push(match param {
                        Param::Dependency(dependency) => registry.resolve_any(dependency, nested)?,
                        Param::Value { value, .. } => Arc::clone(value),
                    });
                }
                build(&mut Arguments::new(identifier.clone(), values))
            }
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builder(_) => f.write_str("Builder"),
            Self::Alias(target) => f.debug_tuple("Alias").field(target).finish(),
            Self::Recipe { params, .. } => f.debug_struct("Recipe").field("params", params).finish(),
        }
    }
}
