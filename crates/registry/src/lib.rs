//! # Lazy Registry
//!
//! Runtime instance registry with lazy, mode-aware resolution.
//! Callers bind *how* to build a value for an [`Identifier`], then ask the
//! [`Registry`] to produce it. The registry decides whether to hand out a
//! cached singleton or to build a fresh value, and scopes compose child
//! registries that are either isolated from or inherit from their owner.
//!
//! ```
//! use lazy_registry::prelude::*;
//!
//! struct Greeting(String);
//!
//! let registry = Registry::new();
//! let key = injection_key::<Greeting>("greeting");
//! registry.define(&key, |_ctx| Ok(Greeting("hello".into())))?;
//!
//! let first = registry.resolve(&key)?;
//! let second = registry.resolve(&key)?;
//! assert!(std::sync::Arc::ptr_eq(&first, &second));
//! # Ok::<(), lazy_registry::Error>(())
//! ```

pub mod binding;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod identifier;
pub mod lifecycle;
pub mod mode;
pub mod params;
pub mod registry;
pub mod scope;

pub use binding::Instance;
pub use config::RegistryConfig;
pub use context::Context;
pub use error::{Error, Result};
pub use events::{ErrorEvent, ErrorKind, EventChannel, InstanceEvent};
pub use identifier::{AnyIdentifier, Identifier, Key, injection_key, is_injection_key};
pub use lifecycle::Lifecycle;
pub use mode::Mode;
pub use params::{Arguments, Construct, Param, ParamSlot};
pub use registry::{Registry, RegistryStats};
pub use scope::{Scope, ScopeKey, Shape};

/// Common imports for registry users.
pub mod prelude {
    pub use crate::context::Context;
    pub use crate::error::{Error, Result};
    pub use crate::identifier::{Identifier, injection_key};
    pub use crate::mode::Mode;
    pub use crate::params::{Arguments, Construct, Param, ParamSlot};
    pub use crate::registry::Registry;
    pub use crate::scope::{Scope, ScopeKey, Shape};
}
