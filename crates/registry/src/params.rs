//! Recipe parameters.
//!
//! A recipe binding pairs a [`Construct`] type with an ordered parameter
//! list. Each [`Param`] is either another identifier, resolved when the
//! value is built, or a literal value passed through verbatim. The list is
//! checked against [`Construct::parameters`] when the binding is made.

use std::any::{TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use crate::binding::Instance;
use crate::error::{Error, Result};
use crate::identifier::{AnyIdentifier, Identifier};

/// A type the registry can build from an ordered parameter list.
///
/// ```
/// use lazy_registry::prelude::*;
///
/// struct Clock;
/// struct Scheduler {
///     clock: std::sync::Arc<Clock>,
///     workers: usize,
/// }
///
/// impl Construct for Scheduler {
///     fn parameters() -> Vec<ParamSlot> {
///         vec![ParamSlot::of::<Clock>("clock"), ParamSlot::of::<usize>("workers")]
///     }
///
///     fn construct(args: &mut Arguments) -> Result<Self> {
///         Ok(Self {
///             clock: args.take()?,
///             workers: *args.take::<usize>()?,
///         })
///     }
/// }
///
/// let registry = Registry::new();
/// registry.define(&Identifier::<Clock>::of(), |_| Ok(Clock))?;
/// registry.provide::<Scheduler>([
///     Param::dependency(&Identifier::<Clock>::of()),
///     Param::value(4usize),
/// ])?;
/// assert_eq!(registry.resolve(&Identifier::<Scheduler>::of())?.workers, 4);
/// # Ok::<(), lazy_registry::Error>(())
/// ```
pub trait Construct: Sized + Send + Sync + 'static {
    /// Declared constructor slots, in order.
    fn parameters() -> Vec<ParamSlot>;

    /// Build the value from resolved arguments, taken in slot order.
    fn construct(args: &mut Arguments) -> Result<Self>;
}

// ---------------------------------------------------------------------------
// ParamSlot
// ---------------------------------------------------------------------------

/// One declared constructor slot: a name and the value type it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSlot {
    name: &'static str,
    type_id: TypeId,
    type_name: &'static str,
}

impl ParamSlot {
    /// Slot named `name` accepting values of type `V`.
    #[must_use]
    pub fn of<V: Send + Sync + 'static>(name: &'static str) -> Self {
        Self {
            name,
            type_id: TypeId::of::<V>(),
            type_name: type_name::<V>(),
        }
    }

    /// Slot name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Accepted value type.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Accepted value type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

// ---------------------------------------------------------------------------
// Param
// ---------------------------------------------------------------------------

/// One entry of a recipe parameter list.
#[derive(Clone)]
pub enum Param {
    /// Resolved from the registry each time the value is built.
    Dependency(AnyIdentifier),
    /// Passed through as-is.
    Value {
        /// The value.
        value: Instance,
        /// Its concrete type.
        type_id: TypeId,
        /// Its concrete type name.
        type_name: &'static str,
    },
}

impl Param {
    /// Parameter resolved from `identifier`.
    #[must_use]
    pub fn dependency<T>(identifier: &Identifier<T>) -> Self {
        Self::Dependency(identifier.erased().clone())
    }

    /// Literal parameter. Callables are passed as boxed `Fn` trait objects
    /// whose type matches the slot.
    #[must_use]
    pub fn value<V: Send + Sync + 'static>(value: V) -> Self {
        Self::Value {
            value: Arc::new(value),
            type_id: TypeId::of::<V>(),
            type_name: type_name::<V>(),
        }
    }

    fn type_id(&self) -> TypeId {
        match self {
            Self::Dependency(identifier) => identifier.value_type(),
            Self::Value { type_id, .. } => *type_id,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Dependency(identifier) => identifier.value_type_name(),
            Self::Value { type_name, .. } => type_name,
        }
    }
}

impl<T> From<&Identifier<T>> for Param {
    fn from(identifier: &Identifier<T>) -> Self {
        Self::dependency(identifier)
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dependency(identifier) => f.debug_tuple("Dependency").field(identifier).finish(),
            Self::Value { type_name, .. } => f.debug_tuple("Value").field(type_name).finish(),
        }
    }
}

/// Check `params` against the declared `slots` of `identifier`.
pub(crate) fn validate(identifier: &AnyIdentifier, slots: &[ParamSlot], params: &[Param]) -> Result<()> {
    if slots.len() != params.len() {
        return Err(Error::Parameters {
            identifier: identifier.name().to_owned(),
            reason: format!(
                "expected {} parameter(s), got {}",
                slots.len(),
                params.len()
            ),
        });
    }

    for (slot, param) in slots.iter().zip(params) {
        if slot.type_id() != param.type_id() {
            return Err(Error::Parameters {
                identifier: identifier.name().to_owned(),
                reason: format!(
                    "parameter '{}' expects {}, got {}",
                    slot.name(),
                    slot.type_name(),
                    param.type_name()
                ),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// Resolved parameter values handed to [`Construct::construct`].
pub struct Arguments {
    identifier: AnyIdentifier,
    values: std::vec::IntoIter<Instance>,
    position: usize,
}

impl Arguments {
    pub(crate) fn new(identifier: AnyIdentifier, values: Vec<Instance>) -> Self {
        Self {
            identifier,
            values: values.into_iter(),
            position: 0,
        }
    }

    /// Take the next argument as `V`.
    ///
    /// Dependencies arrive as the shared instance the registry produced,
    /// so identity is preserved.
    pub fn take<V: Send + Sync + 'static>(&mut self) -> Result<Arc<V>> {
        let position = self.position;
        let value = self.values.next().ok_or_else(|| Error::Parameters {
            identifier: self.identifier.name().to_owned(),
            reason: format!("no argument at position {position}"),
        })?;
        self.position += 1;
        value.downcast::<V>().map_err(|_| Error::TypeMismatch {
            identifier: self.identifier.name().to_owned(),
            expected: type_name::<V>(),
        })
    }

    /// Take the next argument and clone it out of its `Arc`.
    pub fn take_cloned<V: Clone + Send + Sync + 'static>(&mut self) -> Result<V> {
        self.take::<V>().map(|value| V::clone(&value))
    }

    /// Arguments not taken yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    /// The identifier being built.
    #[must_use]
    pub fn identifier(&self) -> &AnyIdentifier {
        &self.identifier
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("identifier", &self.identifier)
            .field("position", &self.position)
            .field("remaining", &self.remaining())
            .finish()
    }
}
