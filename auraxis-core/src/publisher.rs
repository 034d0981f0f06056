//! Type-keyed broadcast publisher.
//!
//! A [`Publisher`] fans each published value out to every sink registered for
//! the value's key. Two kinds of sinks exist:
//!
//! - **handlers**, closures invoked synchronously on the publishing task in
//!   registration order, and
//! - **subscriptions**, bounded per-subscriber queues fed with `try_send` so a
//!   slow consumer never stalls the publishing task. Batch producers that
//!   must not lose values use [`Publisher::publish_wait`] instead.
//!
//! The handler table sits behind its own lock. `publish` clones the matching
//! sink list under a read lock and releases it before delivering, so handlers
//! may register or unregister other handlers without deadlocking. Delivery is
//! at-most-once per sink per published value.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A value that can be routed by a [`Publisher`].
pub trait Keyed {
    type Key: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    fn key(&self) -> Self::Key;
}

/// Error a handler may return. It is logged and never reaches the publisher.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type Handler<E> = Arc<dyn Fn(&E) -> Result<(), HandlerError> + Send + Sync>;

enum Sink<E> {
    Handler(Handler<E>),
    Queue(mpsc::Sender<E>),
}

impl<E> Clone for Sink<E> {
    fn clone(&self) -> Self {
        match self {
            Sink::Handler(handler) => Sink::Handler(Arc::clone(handler)),
            Sink::Queue(tx) => Sink::Queue(tx.clone()),
        }
    }
}

struct Registration<E> {
    id: u64,
    sink: Sink<E>,
}

struct PublisherInner<E: Keyed> {
    name: &'static str,
    sinks: RwLock<HashMap<E::Key, Vec<Registration<E>>>>,
    next_id: AtomicU64,
}

/// Broadcast publisher routing values by [`Keyed::key`].
///
/// Cloning is cheap and every clone shares the same sink table.
pub struct Publisher<E: Keyed> {
    inner: Arc<PublisherInner<E>>,
}

impl<E: Keyed> Clone for Publisher<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Keyed + Clone + Send + 'static> Publisher<E> {
    /// Create a publisher. `name` only shows up in logs.
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                name,
                sinks: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a synchronous handler for every key in `keys`.
    ///
    /// Keep handlers short: they run on the publishing task.
    pub fn add_handler<F>(&self, keys: &[E::Key], handler: F) -> Unsubscribe<E>
    where
        F: Fn(&E) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(keys, Sink::Handler(Arc::new(handler)))
    }

    /// Open a bounded queue receiving every value published under `keys`.
    ///
    /// Values arriving while the queue is full are dropped with a warning.
    /// Dropping the [`Subscription`] unregisters it.
    pub fn subscribe(&self, keys: &[E::Key], capacity: usize) -> Subscription<E> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = self.register(keys, Sink::Queue(tx));
        Subscription { rx, handle }
    }

    fn register(&self, keys: &[E::Key], sink: Sink<E>) -> Unsubscribe<E> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut sinks = self
                .inner
                .sinks
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for key in keys {
                sinks.entry(*key).or_default().push(Registration {
                    id,
                    sink: sink.clone(),
                });
            }
        }
        debug!(publisher = self.inner.name, id, keys = ?keys, "Registered sink");
        Unsubscribe {
            inner: Arc::downgrade(&self.inner),
            keys: keys.to_vec(),
            id,
        }
    }

    fn snapshot(&self, key: E::Key) -> Vec<Sink<E>> {
        let sinks = self
            .inner
            .sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        sinks
            .get(&key)
            .map(|registrations| registrations.iter().map(|r| r.sink.clone()).collect())
            .unwrap_or_default()
    }

    fn call_handler(&self, key: E::Key, handler: &Handler<E>, event: &E) -> bool {
        match handler(event) {
            Ok(()) => true,
            Err(e) => {
                warn!(publisher = self.inner.name, key = ?key, error = %e, "Handler failed");
                false
            }
        }
    }

    /// Deliver `event` to every sink registered for its key.
    ///
    /// Returns the number of sinks that accepted the value.
    pub fn publish(&self, event: &E) -> usize {
        let key = event.key();
        let mut delivered = 0;
        for sink in self.snapshot(key) {
            match sink {
                Sink::Handler(handler) => {
                    if self.call_handler(key, &handler, event) {
                        delivered += 1;
                    }
                }
                Sink::Queue(tx) => match tx.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(publisher = self.inner.name, key = ?key, "Subscriber queue full, dropping event");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!(publisher = self.inner.name, key = ?key, "Subscriber gone");
                    }
                },
            }
        }
        delivered
    }

    /// Like [`publish`](Self::publish), but waits for room in full
    /// subscriber queues instead of dropping the value.
    ///
    /// Only call this from a task that is not itself draining one of the
    /// subscriptions, or it can wait forever.
    pub async fn publish_wait(&self, event: &E) -> usize {
        let key = event.key();
        let mut delivered = 0;
        for sink in self.snapshot(key) {
            match sink {
                Sink::Handler(handler) => {
                    if self.call_handler(key, &handler, event) {
                        delivered += 1;
                    }
                }
                Sink::Queue(tx) => match tx.send(event.clone()).await {
                    Ok(()) => delivered += 1,
                    Err(_) => {
                        debug!(publisher = self.inner.name, key = ?key, "Subscriber gone");
                    }
                },
            }
        }
        delivered
    }

    /// Number of sinks currently registered for `key`.
    pub fn sink_count(&self, key: E::Key) -> usize {
        self.inner
            .sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .map_or(0, Vec::len)
    }
}

/// Handle returned by registration. Call [`unsubscribe`](Unsubscribe::unsubscribe)
/// to remove the sink; dropping the handle alone keeps handlers registered.
pub struct Unsubscribe<E: Keyed> {
    inner: Weak<PublisherInner<E>>,
    keys: Vec<E::Key>,
    id: u64,
}

impl<E: Keyed> Unsubscribe<E> {
    pub fn unsubscribe(self) {
        self.remove();
    }

    fn remove(&self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut sinks = inner.sinks.write().unwrap_or_else(PoisonError::into_inner);
        for key in &self.keys {
            if let Some(registrations) = sinks.get_mut(key) {
                registrations.retain(|r| r.id != self.id);
                if registrations.is_empty() {
                    sinks.remove(key);
                }
            }
        }
    }
}

/// Queue-backed subscriber. Unregisters itself on drop.
pub struct Subscription<E: Keyed> {
    rx: mpsc::Receiver<E>,
    handle: Unsubscribe<E>,
}

impl<E: Keyed> Subscription<E> {
    /// Wait for the next value. `None` once the publisher is gone.
    pub async fn recv(&mut self) -> Option<E> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<E> {
        self.rx.try_recv().ok()
    }
}

impl<E: Keyed> Drop for Subscription<E> {
    fn drop(&mut self) {
        self.handle.remove();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Note {
        Ping(u32),
        Pong(u32),
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum NoteKind {
        Ping,
        Pong,
    }

    impl Keyed for Note {
        type Key = NoteKind;

        fn key(&self) -> NoteKind {
            match self {
                Note::Ping(_) => NoteKind::Ping,
                Note::Pong(_) => NoteKind::Pong,
            }
        }
    }

    #[test]
    fn test_handlers_run_in_registration_order_for_their_key() {
        let publisher = Publisher::<Note>::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            publisher.add_handler(&[NoteKind::Ping], move |note| {
                seen.lock().unwrap().push((tag, note.clone()));
                Ok(())
            });
        }

        assert_eq!(publisher.publish(&Note::Ping(1)), 2);
        assert_eq!(publisher.publish(&Note::Pong(2)), 0);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("first", Note::Ping(1)), ("second", Note::Ping(1))]
        );
    }

    #[test]
    fn test_handler_error_is_not_propagated() {
        let publisher = Publisher::<Note>::new("test");
        let calls = Arc::new(Mutex::new(0));
        publisher.add_handler(&[NoteKind::Ping], |_| Err("boom".into()));
        let counter = Arc::clone(&calls);
        publisher.add_handler(&[NoteKind::Ping], move |_| {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        assert_eq!(publisher.publish(&Note::Ping(7)), 1);
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_unsubscribe_removes_handler() {
        let publisher = Publisher::<Note>::new("test");
        let handle = publisher.add_handler(&[NoteKind::Ping, NoteKind::Pong], |_| Ok(()));
        assert_eq!(publisher.sink_count(NoteKind::Pong), 1);
        handle.unsubscribe();
        assert_eq!(publisher.sink_count(NoteKind::Ping), 0);
        assert_eq!(publisher.publish(&Note::Pong(1)), 0);
    }

    #[test]
    fn test_handler_may_register_during_publish() {
        let publisher = Publisher::<Note>::new("test");
        let inner = publisher.clone();
        publisher.add_handler(&[NoteKind::Ping], move |_| {
            inner.add_handler(&[NoteKind::Pong], |_| Ok(()));
            Ok(())
        });
        publisher.publish(&Note::Ping(1));
        assert_eq!(publisher.sink_count(NoteKind::Pong), 1);
    }

    #[tokio::test]
    async fn test_subscription_queue_drops_on_overflow() {
        let publisher = Publisher::<Note>::new("test");
        let mut sub = publisher.subscribe(&[NoteKind::Ping], 1);

        assert_eq!(publisher.publish(&Note::Ping(1)), 1);
        assert_eq!(publisher.publish(&Note::Ping(2)), 0);
        assert_eq!(sub.recv().await, Some(Note::Ping(1)));
        assert_eq!(sub.try_recv(), None);

        drop(sub);
        assert_eq!(publisher.sink_count(NoteKind::Ping), 0);
    }

    #[tokio::test]
    async fn test_publish_wait_blocks_until_queue_has_room() {
        let publisher = Publisher::<Note>::new("test");
        let mut sub = publisher.subscribe(&[NoteKind::Ping], 2);

        let consumer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(Note::Ping(n)) = sub.recv().await {
                seen.push(n);
                if seen.len() == 10 {
                    break;
                }
            }
            seen
        });

        for n in 0..10 {
            assert_eq!(publisher.publish_wait(&Note::Ping(n)).await, 1);
        }
        assert_eq!(consumer.await.unwrap(), (0..10u32).collect::<Vec<_>>());
    }
}
