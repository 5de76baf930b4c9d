//! Dispose-once lifecycle shared by registries, scopes and event channels.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::{Error, Result};

type Cleanup = Box<dyn FnOnce() + Send>;

/// Disposed flag plus an ordered list of cleanup callbacks.
///
/// Every public operation of the owning object calls [`Lifecycle::guard`]
/// first. [`Lifecycle::dispose`] flips the flag and runs the callbacks in
/// registration order, exactly once.
pub struct Lifecycle {
    label: String,
    disposed: AtomicBool,
    cleanups: Mutex<Vec<Cleanup>>,
}

impl Lifecycle {
    /// Create a live lifecycle. `label` names the owner in
    /// [`Error::Disposed`].
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            disposed: AtomicBool::new(false),
            cleanups: Mutex::new(Vec::new()),
        }
    }

    /// Name of the owning object.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether [`Lifecycle::dispose`] has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Register a callback to run on disposal.
    ///
    /// Callbacks registered after disposal are dropped without running.
    pub fn on_dispose<F>(&self, cleanup: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut cleanups = self.cleanups.lock();
        if !self.is_disposed() {
            cleanups.push(Box::new(cleanup));
        }
    }

    /// Fail with [`Error::Disposed`] once disposed.
    pub fn guard(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        Ok(())
    }

    /// Mark as disposed and run the cleanup callbacks.
    ///
    /// A second call fails with [`Error::Disposed`] and runs nothing.
    pub fn dispose(&self) -> Result<()> {
        let cleanups = {
            let mut cleanups = self.cleanups.lock();
            if self.disposed.swap(true, Ordering::AcqRel) {
                return Err(self.disposed_error());
            }
            std::mem::take(&mut *cleanups)
        };
        for cleanup in cleanups {
            cleanup();
        }
        Ok(())
    }

    fn disposed_error(&self) -> Error {
        Error::Disposed {
            target: self.label.clone(),
        }
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("label", &self.label)
            .field("disposed", &self.is_disposed())
            .field("cleanups", &self.cleanups.lock().len())
            .finish()
    }
}
