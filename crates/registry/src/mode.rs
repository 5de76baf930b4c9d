//! Resolution modes.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// How a registry satisfies a resolve request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Mode {
    /// Hand out the cached value, building and caching it on first use.
    #[default]
    Singleton,
    /// Build a fresh value without caching it. Its dependencies resolve as
    /// singletons.
    Unique,
    /// Build a fresh value and fresh dependencies at every level.
    DeepUnique,
}

impl Mode {
    /// All modes, in declaration order.
    pub const ALL: [Self; 3] = [Self::Singleton, Self::Unique, Self::DeepUnique];

    /// Mode used below the top-level value: for its own construction, its
    /// parameters, alias targets and the parent fallback.
    ///
    /// `Unique` only applies to the requested value, so it drops to
    /// `Singleton`; the other modes propagate unchanged.
    #[must_use]
    pub fn nested(self) -> Self {
        match self {
            Self::Unique => Self::Singleton,
            other => other,
        }
    }

    /// Whether values produced in this mode are read from and written to
    /// the singleton cache.
    #[must_use]
    pub fn is_cached(self) -> bool {
        self == Self::Singleton
    }

    /// Canonical lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Singleton => "singleton",
            Self::Unique => "unique",
            Self::DeepUnique => "deep-unique",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| Error::configuration(format!("unknown resolution mode '{s}'")))
    }
}
