//! Registry notifications.
//!
//! Each registry owns three [`EventChannel`]s: errors, constructions and
//! resolutions. Handlers are registered under a name and invoked
//! synchronously, in subscription order, on the thread that published the
//! event. With the `tokio` feature a channel can also be watched through a
//! `tokio::sync::broadcast` receiver.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
#[cfg(feature = "tokio")]
use tokio::sync::broadcast;

use crate::binding::Instance;
use crate::error::Result;
use crate::identifier::AnyIdentifier;
use crate::lifecycle::Lifecycle;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Which failure an [`ErrorEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ErrorKind {
    /// A second binding was attempted for the same identifier.
    Duplicate,
    /// Nothing along the fallback chain could produce the identifier.
    Missing,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Duplicate => "duplicate",
            Self::Missing => "missing",
        })
    }
}

/// Published right before a duplicate or missing error is raised.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    /// The identifier the failed operation was about.
    pub identifier: AnyIdentifier,
    /// What went wrong.
    pub kind: ErrorKind,
}

/// Published when a value is constructed or handed out.
#[derive(Clone)]
pub struct InstanceEvent {
    /// The identifier the value was produced for.
    pub identifier: AnyIdentifier,
    /// The value itself.
    pub instance: Instance,
}

impl InstanceEvent {
    /// The instance as `T`, if it has that type.
    #[must_use]
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.instance).downcast::<T>().ok()
    }
}

impl fmt::Debug for InstanceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceEvent")
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// EventChannel
// ---------------------------------------------------------------------------

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Named-handler notification channel.
///
/// Publishing is fire-and-forget: with no handlers and no watchers the
/// event is dropped. Handlers run outside the channel's lock, so a handler
/// may subscribe or unsubscribe others; those changes apply from the next
/// publish on.
pub struct EventChannel<E> {
    handlers: RwLock<IndexMap<String, Handler<E>>>,
    #[cfg(feature = "tokio")]
    sender: RwLock<Option<broadcast::Sender<E>>>,
    lifecycle: Lifecycle,
}

impl<E: Clone + Send + Sync + 'static> EventChannel<E> {
    /// Create a channel. `capacity` bounds the broadcast buffer seen by
    /// [`EventChannel::watch`] receivers.
    #[must_use]
    pub fn new(label: impl Into<String>, capacity: usize) -> Self {
        #[cfg(not(feature = "tokio"))]
        let _ = capacity;
        Self {
            handlers: RwLock::new(IndexMap::new()),
            #[cfg(feature = "tokio")]
            sender: RwLock::new(Some(broadcast::channel(capacity.max(1)).0)),
            lifecycle: Lifecycle::new(label),
        }
    }

    /// Register `handler` under `name`.
    ///
    /// Subscribing again with the same name replaces the previous handler
    /// and keeps its position.
    pub fn subscribe<F>(&self, name: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.lifecycle.guard()?;
        self.handlers.write().insert(name.into(), Arc::new(handler));
        Ok(())
    }

    /// Remove the handler registered under `name`. Returns whether one was
    /// registered.
    pub fn unsubscribe(&self, name: &str) -> Result<bool> {
        self.lifecycle.guard()?;
        Ok(self.handlers.write().shift_remove(name).is_some())
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Invoke every handler with `event`, then forward it to watchers.
    pub fn publish(&self, event: &E) {
        let handlers: Vec<Handler<E>> = self.handlers.read().values().cloned().collect();
        for handler in handlers {
            handler(event);
        }

        #[cfg(feature = "tokio")]
        if let Some(sender) = self.sender.read().as_ref() {
            // No receivers is fine.
            let _ = sender.send(event.clone());
        }
    }

    /// Receive every event published after this call.
    ///
    /// Receivers see `Closed` once the channel is disposed.
    #[cfg(feature = "tokio")]
    pub fn watch(&self) -> Result<broadcast::Receiver<E>> {
        self.lifecycle.guard()?;
        match self.sender.read().as_ref() {
            Some(sender) => Ok(sender.subscribe()),
            None => Err(crate::error::Error::Disposed {
                target: self.lifecycle.label().to_owned(),
            }),
        }
    }

    /// Whether the channel has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_disposed()
    }

    /// Detach every handler and close watchers. Later subscriptions fail.
    pub fn dispose(&self) -> Result<()> {
        self.lifecycle.dispose()?;
        self.handlers.write().clear();
        #[cfg(feature = "tokio")]
        {
            *self.sender.write() = None;
        }
        Ok(())
    }
}

impl<E> fmt::Debug for EventChannel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("label", &self.lifecycle.label())
            .field("handlers", &self.handlers.read().keys().collect::<Vec<_>>())
            .field("disposed", &self.lifecycle.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::Identifier;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn missing() -> ErrorEvent {
        ErrorEvent {
            identifier: Identifier::<String>::of().erased().clone(),
            kind: ErrorKind::Missing,
        }
    }

    #[test]
    fn publish_without_handlers_does_not_panic() {
        let channel = EventChannel::<ErrorEvent>::new("errors", 16);
        channel.publish(&missing());
    }

    #[test]
    fn handlers_run_in_subscription_order() {
        let channel = EventChannel::<ErrorEvent>::new("errors", 16);
        let order = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            channel
                .subscribe(name, move |_| order.lock().push(name))
                .unwrap();
        }

        channel.publish(&missing());
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn same_name_replaces_handler() {
        let channel = EventChannel::<ErrorEvent>::new("errors", 16);
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            channel
                .subscribe("count", move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        channel.publish(&missing());
        assert_eq!(channel.handler_count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_reports_presence() {
        let channel = EventChannel::<ErrorEvent>::new("errors", 16);
        channel.subscribe("log", |_| {}).unwrap();
        assert!(channel.unsubscribe("log").unwrap());
        assert!(!channel.unsubscribe("log").unwrap());
    }

    #[test]
    fn dispose_detaches_and_rejects_subscriptions() {
        let channel = EventChannel::<ErrorEvent>::new("errors", 16);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_c = Arc::clone(&calls);
        channel
            .subscribe("count", move |_| {
                calls_c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        channel.dispose().unwrap();
        channel.publish(&missing());

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(channel.subscribe("late", |_| {}).unwrap_err().is_disposed());
        assert!(channel.dispose().is_err());
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn watcher_receives_published_event() {
        let channel = EventChannel::<ErrorEvent>::new("errors", 16);
        let mut rx = channel.watch().unwrap();

        channel.publish(&missing());

        let event = rx.recv().await.expect("should receive event");
        assert_eq!(event.kind, ErrorKind::Missing);
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn watcher_is_closed_on_dispose() {
        let channel = EventChannel::<ErrorEvent>::new("errors", 16);
        let mut rx = channel.watch().unwrap();
        channel.dispose().unwrap();

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }
}
