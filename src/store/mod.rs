//! Holding and broadcasting the current flag tree.

mod gate;

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::compute::{resolve, Computable, ResolveError};
use crate::tree::{Path, Value};

pub use gate::should_publish;

type Subscriber = Rc<dyn Fn(&Value)>;

/// What a call to [`FlagStore::publish`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The tree changed and every subscriber was notified.
    Published,
    /// The tree was recomputed but the change gate held it back.
    Unchanged,
    /// Called from inside a broadcast; applied once the broadcast finishes.
    Queued,
}

/// Single source of truth for the materialized flag tree.
///
/// Cloning is cheap and yields another handle to the same store. All access
/// is single-threaded: a publish resolves, gates, stores and notifies as one
/// step, and a publish requested by a subscriber while that happens is queued
/// behind it.
#[derive(Clone, Default)]
pub struct FlagStore {
    inner: Rc<Inner>,
}

#[derive(Default)]
struct Inner {
    current: RefCell<Option<Value>>,
    subscribers: RefCell<BTreeMap<u64, Subscriber>>,
    next_id: Cell<u64>,
    broadcasting: Cell<bool>,
    pending: RefCell<VecDeque<Computable>>,
}

impl FlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `spec` and broadcasts the result if the change gate lets it
    /// through.
    ///
    /// The tree is recomputed on every call. A resolution error leaves the
    /// store and its subscribers untouched.
    ///
    /// Publishes queued by subscribers are applied before this returns, and
    /// the result describes `spec` alone. A queued publish that fails is
    /// logged and discards whatever was queued after it; it does not turn
    /// this call into an error, since `spec` has already been stored.
    pub fn publish(&self, spec: &Computable) -> Result<PublishOutcome, ResolveError> {
        if self.inner.broadcasting.get() {
            debug!("publish requested during broadcast, queueing");
            self.inner.pending.borrow_mut().push_back(spec.clone());
            return Ok(PublishOutcome::Queued);
        }

        let outcome = self.apply(spec)?;
        self.drain_pending();
        Ok(outcome)
    }

    /// Returns the latest published tree.
    pub fn current(&self) -> Option<Value> {
        self.inner.current.borrow().clone()
    }

    /// Looks up a single flag in the latest published tree.
    pub fn flag(&self, path: impl Into<Path>) -> Option<Value> {
        let path = path.into();
        let current = self.inner.current.borrow();
        current.as_ref().and_then(|root| root.get(&path)).cloned()
    }

    /// Registers `subscriber` for every future broadcast.
    ///
    /// The subscriber stays registered until the returned guard is dropped.
    pub fn subscribe<F>(&self, subscriber: F) -> Subscription
    where
        F: Fn(&Value) + 'static,
    {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .subscribers
            .borrow_mut()
            .insert(id, Rc::new(subscriber));

        Subscription {
            id,
            store: Rc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Drops every subscriber, the stored tree and any queued publish.
    pub fn clear(&self) {
        // Released after the borrow ends: a subscriber may own other guards.
        let subscribers = std::mem::take(&mut *self.inner.subscribers.borrow_mut());
        self.inner.pending.borrow_mut().clear();
        self.inner.current.borrow_mut().take();
        drop(subscribers);
    }

    fn apply(&self, spec: &Computable) -> Result<PublishOutcome, ResolveError> {
        let next = resolve(spec)?;

        if !should_publish(self.inner.current.borrow().as_ref(), &next) {
            debug!("flag tree unchanged, skipping broadcast");
            return Ok(PublishOutcome::Unchanged);
        }

        *self.inner.current.borrow_mut() = Some(next.clone());
        self.broadcast(&next);
        Ok(PublishOutcome::Published)
    }

    fn broadcast(&self, tree: &Value) {
        let _guard = Broadcasting::enter(&self.inner.broadcasting);
        let ids: Vec<u64> = self.inner.subscribers.borrow().keys().copied().collect();
        debug!(subscribers = ids.len(), "broadcasting flag tree");

        for id in ids {
            // Skips subscribers dropped by an earlier callback.
            let subscriber = self.inner.subscribers.borrow().get(&id).cloned();
            if let Some(subscriber) = subscriber {
                subscriber(tree);
            }
        }
    }

    fn drain_pending(&self) {
        loop {
            let next = self.inner.pending.borrow_mut().pop_front();
            let Some(spec) = next else {
                return;
            };

            if let Err(err) = self.apply(&spec) {
                let dropped = std::mem::take(&mut *self.inner.pending.borrow_mut()).len();
                warn!(error = %err, dropped, "queued publish failed");
                return;
            }
        }
    }
}

impl fmt::Debug for FlagStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagStore")
            .field("current", &self.inner.current.borrow())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

struct Broadcasting<'a>(&'a Cell<bool>);

impl<'a> Broadcasting<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for Broadcasting<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Keeps a subscriber registered with a [`FlagStore`].
///
/// Dropping the guard deregisters the subscriber, including from inside a
/// broadcast, in which case it is not called again.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    store: Weak<Inner>,
}

impl Subscription {
    /// Deregisters now. Equivalent to dropping the guard.
    pub fn unsubscribe(self) {}
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            let removed = inner.subscribers.borrow_mut().remove(&self.id);
            drop(removed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(store: &FlagStore) -> (Rc<RefCell<Vec<Value>>>, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let subscription = store.subscribe(move |tree| sink.borrow_mut().push(tree.clone()));
        (seen, subscription)
    }

    fn beta(on: bool) -> Computable {
        Computable::table().with("beta", on)
    }

    #[test]
    fn test_first_publish_notifies() {
        let store = FlagStore::new();
        let (seen, _sub) = recorder(&store);

        let outcome = store.publish(&beta(true)).unwrap();

        assert_eq!(outcome, PublishOutcome::Published);
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(store.flag("beta"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_equal_scalars_are_gated() {
        let store = FlagStore::new();
        let (seen, _sub) = recorder(&store);

        store.publish(&beta(true)).unwrap();
        let outcome = store.publish(&beta(true)).unwrap();

        assert_eq!(outcome, PublishOutcome::Unchanged);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_change_notifies_every_subscriber() {
        let store = FlagStore::new();
        let (first, _a) = recorder(&store);
        let (second, _b) = recorder(&store);

        store.publish(&beta(true)).unwrap();
        store.publish(&beta(false)).unwrap();

        assert_eq!(first.borrow().len(), 2);
        assert_eq!(second.borrow().len(), 2);
        assert!(first.borrow()[1].same(&second.borrow()[1]));
    }

    #[test]
    fn test_dropped_subscription_stops_notifications() {
        let store = FlagStore::new();
        let (seen, sub) = recorder(&store);

        store.publish(&beta(true)).unwrap();
        sub.unsubscribe();
        store.publish(&beta(false)).unwrap();

        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_failed_resolution_leaves_store_untouched() {
        let store = FlagStore::new();
        let (seen, _sub) = recorder(&store);
        store.publish(&beta(true)).unwrap();

        let broken = Computable::table()
            .with("a", Computable::compute(|scope| scope.value("b")))
            .with("b", Computable::compute(|scope| scope.value("a")));
        let result = store.publish(&broken);

        assert!(matches!(result, Err(ResolveError::Cyclic { .. })));
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(store.flag("beta"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_reentrant_publish_is_queued() {
        let store = FlagStore::new();
        let (seen, _sub) = recorder(&store);

        let handle = store.clone();
        let outcomes = Rc::new(RefCell::new(Vec::new()));
        let sink = outcomes.clone();
        let _reentrant = store.subscribe(move |tree| {
            if tree.get(&"beta".into()) == Some(&Value::Bool(true)) {
                sink.borrow_mut().push(handle.publish(&beta(false)).unwrap());
            }
        });

        let outcome = store.publish(&beta(true)).unwrap();

        assert_eq!(outcome, PublishOutcome::Published);
        assert_eq!(*outcomes.borrow(), [PublishOutcome::Queued]);
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(store.flag("beta"), Some(Value::Bool(false)));
    }

    #[test]
    fn test_failed_queued_publish_keeps_outer_result() {
        let store = FlagStore::new();
        let (seen, _sub) = recorder(&store);

        let handle = store.clone();
        let _reentrant = store.subscribe(move |tree| {
            if tree.get(&"beta".into()) == Some(&Value::Bool(true)) {
                let broken = Computable::table()
                    .with("beta", Computable::compute(|scope| Err(scope.fail("no bucket"))));
                handle.publish(&broken).unwrap();
                handle.publish(&beta(false)).unwrap();
            }
        });

        let outcome = store.publish(&beta(true));

        assert_eq!(outcome, Ok(PublishOutcome::Published));
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(store.flag("beta"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_unsubscribe_during_broadcast() {
        let store = FlagStore::new();
        let late = Rc::new(RefCell::new(None::<Subscription>));
        let calls = Rc::new(Cell::new(0));

        let slot = late.clone();
        let _killer = store.subscribe(move |_| {
            slot.borrow_mut().take();
        });
        let counter = calls.clone();
        *late.borrow_mut() = Some(store.subscribe(move |_| counter.set(counter.get() + 1)));

        store.publish(&beta(true)).unwrap();

        assert_eq!(calls.get(), 0);
        assert_eq!(store.subscriber_count(), 1);
    }

    fn nested_guards(store: &FlagStore) -> Subscription {
        let child = store.subscribe(|_| {});
        store.subscribe(move |_| {
            let _keep = &child;
        })
    }

    #[test]
    fn test_dropping_guard_that_owns_another_guard() {
        let store = FlagStore::new();
        let parent = nested_guards(&store);
        assert_eq!(store.subscriber_count(), 2);

        drop(parent);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_clear_with_nested_guards() {
        let store = FlagStore::new();
        let _parent = nested_guards(&store);
        store.publish(&beta(true)).unwrap();

        store.clear();
        assert_eq!(store.subscriber_count(), 0);
        assert_eq!(store.current(), None);
    }

    #[test]
    fn test_clear_drops_everything() {
        let store = FlagStore::new();
        let (seen, _sub) = recorder(&store);
        store.publish(&beta(true)).unwrap();

        store.clear();
        assert_eq!(store.current(), None);
        assert_eq!(store.subscriber_count(), 0);

        store.publish(&beta(true)).unwrap();
        assert_eq!(seen.borrow().len(), 1);
    }
}
