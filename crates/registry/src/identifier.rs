//! Identifiers naming the values a registry can produce.
//!
//! An identifier is either a concrete type ([`Identifier::of`]) or an
//! opaque injection key ([`injection_key`]). Both erase to a [`Key`], and
//! registries compare identifiers by that key only: two injection keys
//! declared for the same type are still distinct.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Label used for injection keys created without one.
const UNNAMED: &str = "unnamed";

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Erased identity of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A concrete type.
    Type(TypeId),
    /// An injection key token, unique per [`injection_key`] call.
    Token(u64),
}

// ---------------------------------------------------------------------------
// AnyIdentifier
// ---------------------------------------------------------------------------

/// Type-erased identifier.
///
/// Carries the [`Key`] used for lookups plus the display name and the
/// declared value type, which recipe bindings check parameters against.
#[derive(Clone)]
pub struct AnyIdentifier {
    key: Key,
    name: Arc<str>,
    value_type: TypeId,
    value_type_name: &'static str,
}

impl AnyIdentifier {
    /// The lookup key.
    #[must_use]
    pub fn key(&self) -> Key {
        self.key
    }

    /// Display name: the short type name, or the injection key's label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this identifier was minted by [`injection_key`].
    #[must_use]
    pub fn is_injection_key(&self) -> bool {
        matches!(self.key, Key::Token(_))
    }

    /// `TypeId` of the value this identifier produces.
    #[must_use]
    pub fn value_type(&self) -> TypeId {
        self.value_type
    }

    /// Full type name of the value this identifier produces.
    #[must_use]
    pub fn value_type_name(&self) -> &'static str {
        self.value_type_name
    }
}

impl PartialEq for AnyIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for AnyIdentifier {}

impl Hash for AnyIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Debug for AnyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyIdentifier")
            .field("name", &self.name)
            .field("key", &self.key)
            .finish()
    }
}

impl fmt::Display for AnyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ---------------------------------------------------------------------------
// Identifier<T>
// ---------------------------------------------------------------------------

/// Typed identifier for values of type `T`.
///
/// The type parameter exists for static checking only; at runtime the
/// identifier is its erased [`AnyIdentifier`].
pub struct Identifier<T> {
    erased: AnyIdentifier,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Identifier<T> {
    /// Identifier for the concrete type `T`.
    ///
    /// Every call returns an identifier equal to the previous ones.
    #[must_use]
    pub fn of() -> Self {
        Self::from_parts(Key::Type(TypeId::of::<T>()), short_type_name::<T>().into())
    }

    fn from_parts(key: Key, name: Arc<str>) -> Self {
        Self {
            erased: AnyIdentifier {
                key,
                name,
                value_type: TypeId::of::<T>(),
                value_type_name: type_name::<T>(),
            },
            _marker: PhantomData,
        }
    }
}

impl<T> Identifier<T> {
    /// The type-erased form used inside registries.
    #[must_use]
    pub fn erased(&self) -> &AnyIdentifier {
        &self.erased
    }

    /// The lookup key.
    #[must_use]
    pub fn key(&self) -> Key {
        self.erased.key
    }

    /// Display name used in errors and logs.
    #[must_use]
    pub fn name(&self) -> &str {
        self.erased.name()
    }

    /// Whether this identifier was minted by [`injection_key`].
    #[must_use]
    pub fn is_injection_key(&self) -> bool {
        self.erased.is_injection_key()
    }
}

impl<T> Clone for Identifier<T> {
    fn clone(&self) -> Self {
        Self {
            erased: self.erased.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for Identifier<T> {
    fn eq(&self, other: &Self) -> bool {
        self.erased == other.erased
    }
}

impl<T> Eq for Identifier<T> {}

impl<T> Hash for Identifier<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.erased.hash(state);
    }
}

impl<T> fmt::Debug for Identifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identifier")
            .field("name", &self.erased.name)
            .field("key", &self.erased.key)
            .finish()
    }
}

impl<T> fmt::Display for Identifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.erased, f)
    }
}

impl<T> AsRef<AnyIdentifier> for Identifier<T> {
    fn as_ref(&self) -> &AnyIdentifier {
        &self.erased
    }
}

/// Mint a new injection key for values of type `T`.
///
/// The label only shows up in errors and logs; pass `None` for an
/// unnamed key. Every call yields a distinct identifier.
///
/// ```
/// use lazy_registry::injection_key;
///
/// let primary = injection_key::<String>("primary");
/// let replica = injection_key::<String>("primary");
/// assert_ne!(primary, replica);
/// ```
#[must_use]
pub fn injection_key<'a, T: Send + Sync + 'static>(label: impl Into<Option<&'a str>>) -> Identifier<T> {
    let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
    let label = label.into().unwrap_or(UNNAMED);
    Identifier::from_parts(Key::Token(token), label.into())
}

/// Whether `identifier` is an injection key rather than a type identifier.
#[must_use]
pub fn is_injection_key<T>(identifier: &Identifier<T>) -> bool {
    identifier.is_injection_key()
}

/// Type name without its module path; generic arguments are kept as-is.
/// Tuples, arrays, slices and references keep their full name.
fn short_type_name<T: ?Sized>() -> String {
    let full = type_name::<T>();
    if full.starts_with(['(', '[', '&']) {
        return full.to_owned();
    }
    let (path, generics) = full.split_at(full.find('<').unwrap_or(full.len()));
    let base = path.rsplit("::").next().unwrap_or(path);
    format!("{base}{generics}")
}
