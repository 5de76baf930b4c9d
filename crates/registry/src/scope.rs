//! Scopes: lazily created child registries keyed under their owner.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lifecycle::Lifecycle;
use crate::registry::Registry;

/// Key a scope is stored under in its owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum ScopeKey {
    /// Numeric key, e.g. a request or tenant number.
    Index(u64),
    /// String key.
    Name(String),
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for ScopeKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for ScopeKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<u64> for ScopeKey {
    fn from(index: u64) -> Self {
        Self::Index(index)
    }
}

impl From<u32> for ScopeKey {
    fn from(index: u32) -> Self {
        Self::Index(u64::from(index))
    }
}

/// The two kinds of child registry a scope can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Shape {
    /// No fallback: sees only its own bindings.
    Isolated,
    /// Falls back to the owner for identifiers it does not bind itself.
    Inherited,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Isolated => "isolated",
            Self::Inherited => "inherited",
        })
    }
}

pub(crate) type Factory = Box<dyn Fn(&ScopeKey, Shape) -> Result<Registry> + Send + Sync>;

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Handle to one keyed scope of a registry.
///
/// Each shape's child registry is created on first access and reused
/// afterwards. Cloning the handle is cheap and every clone sees the same
/// children.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    key: ScopeKey,
    factory: Factory,
    children: RwLock<IndexMap<Shape, Registry>>,
    lifecycle: Lifecycle,
}

impl Scope {
    pub(crate) fn new(key: ScopeKey, owner: &str, factory: Factory) -> Self {
        let lifecycle = Lifecycle::new(format!("scope '{key}' of registry '{owner}'"));
        Self {
            inner: Arc::new(ScopeInner {
                key,
                factory,
                children: RwLock::new(IndexMap::new()),
                lifecycle,
            }),
        }
    }

    /// The key this scope is stored under.
    #[must_use]
    pub fn key(&self) -> &ScopeKey {
        &self.inner.key
    }

    /// Child registry without a fallback.
    pub fn isolated(&self) -> Result<Registry> {
        self.get(Shape::Isolated)
    }

    /// Child registry that falls back to the owner.
    pub fn inherited(&self) -> Result<Registry> {
        self.get(Shape::Inherited)
    }

    /// Child registry of the given shape, created on first access.
    pub fn get(&self, shape: Shape) -> Result<Registry> {
        self.inner.lifecycle.guard()?;
        if let Some(child) = self.inner.children.read().get(&shape) {
            return Ok(child.clone());
        }

        let mut children = self.inner.children.write();
        if let Some(child) = children.get(&shape) {
            return Ok(child.clone());
        }
        let child = (self.inner.factory)(&self.inner.key, shape)?;
        children.insert(shape, child.clone());
        Ok(child)
    }

    /// The child registries created so far, in creation order.
    pub fn instances(&self) -> Result<Vec<Registry>> {
        self.inner.lifecycle.guard()?;
        Ok(self.inner.children.read().values().cloned().collect())
    }

    /// Whether the scope has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.lifecycle.is_disposed()
    }

    /// Dispose every child registry created so far. Later access fails.
    pub fn dispose(&self) -> Result<()> {
        self.inner.lifecycle.dispose()?;
        let children: Vec<Registry> = self.inner.children.write().drain(..).map(|(_, child)| child).collect();
        for child in children {
            if child.is_disposed() {
                continue;
            }
            if let Err(error) = child.dispose() {
                tracing::warn!(scope = %self.inner.key, child = %child.name(), %error, "Failed to dispose child registry");
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("key", &self.inner.key)
            .field("children", &self.inner.children.read().keys().collect::<Vec<_>>())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
