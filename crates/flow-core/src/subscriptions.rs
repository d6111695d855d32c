//! Change subscriptions.
//!
//! Subscribers register a zero-argument callback and get back a [`Subscription`] handle.
//! Notifications carry no payload; a subscriber that wants to know what changed re-reads the
//! store.
//!
//! Delivery guarantees:
//! - every registered callback is invoked once per notification, in no particular order;
//! - a callback that panics is logged and skipped; the others still run;
//! - once [`Subscription::unsubscribe`] (or drop) returns, the callback will not run again.
//!   If another thread is inside the callback at that moment, unsubscribe waits for it.
//!
//! A callback may unsubscribe itself or any other subscriber, or mutate the store (which
//! notifies again), without deadlocking. Unsubscribing from inside a callback does not wait
//! for other threads: no new invocation starts once it returns, but one already running
//! elsewhere may still finish.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

type Callback = Box<dyn Fn() + Send + Sync>;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    // Subscribers whose callback is currently executing on this thread.
    static RUNNING: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

fn running_here(id: u64) -> bool {
    RUNNING.with(|running| running.borrow().contains(&id))
}

fn inside_any_callback() -> bool {
    RUNNING.with(|running| !running.borrow().is_empty())
}

struct Subscriber {
    id: u64,
    callback: Callback,
    active: AtomicBool,
    // Held shared while the callback runs; taken exclusively by unsubscribe to wait it out.
    gate: RwLock<()>,
}

impl Subscriber {
    /// Runs the callback if still active. Returns whether it ran.
    fn invoke(&self) -> bool {
        let _gate = if running_here(self.id) {
            None
        } else {
            Some(self.gate.read().unwrap_or_else(PoisonError::into_inner))
        };

        if !self.active.load(Ordering::Acquire) {
            return false;
        }

        RUNNING.with(|running| running.borrow_mut().push(self.id));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.callback)()));
        RUNNING.with(|running| {
            let mut running = running.borrow_mut();
            if let Some(pos) = running.iter().rposition(|id| *id == self.id) {
                running.remove(pos);
            }
        });

        if outcome.is_err() {
            tracing::error!(subscriber = self.id, "flow subscriber panicked");
        }
        true
    }
}

/// Registry of live subscribers for one store.
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    entries: Mutex<BTreeMap<u64, Arc<Subscriber>>>,
}

impl SubscriberRegistry {
    pub(crate) fn subscribe(
        self: &Arc<Self>,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        let subscriber = Arc::new(Subscriber {
            id: NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed),
            callback: Box::new(callback),
            active: AtomicBool::new(true),
            gate: RwLock::new(()),
        });

        self.lock_entries()
            .insert(subscriber.id, Arc::clone(&subscriber));
        tracing::debug!(subscriber = subscriber.id, "flow subscriber registered");

        Subscription {
            registry: Arc::downgrade(self),
            subscriber,
        }
    }

    /// Invokes every active subscriber. Returns how many callbacks ran.
    pub(crate) fn notify(&self) -> usize {
        // Snapshot so callbacks can (un)subscribe without holding the registry lock.
        let snapshot: Vec<Arc<Subscriber>> = self.lock_entries().values().cloned().collect();
        snapshot.iter().filter(|s| s.invoke()).count()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock_entries().len()
    }

    fn remove(&self, id: u64) {
        self.lock_entries().remove(&id);
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<u64, Arc<Subscriber>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle for a registered change callback. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    registry: Weak<SubscriberRegistry>,
    subscriber: Arc<Subscriber>,
}

impl Subscription {
    /// Deregisters the callback. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}

    pub fn is_active(&self) -> bool {
        self.subscriber.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let id = self.subscriber.id;
        self.subscriber.active.store(false, Ordering::Release);

        if let Some(registry) = self.registry.upgrade() {
            registry.remove(id);
        }

        // Wait for in-flight invocations on other threads. Skipped inside any callback: this
        // thread holds a gate already, and two callbacks dropping each other would deadlock.
        if !inside_any_callback() {
            drop(
                self.subscriber
                    .gate
                    .write()
                    .unwrap_or_else(PoisonError::into_inner),
            );
        }
        tracing::debug!(subscriber = id, "flow subscriber removed");
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.subscriber.id)
            .field("active", &self.is_active())
            .finish()
    }
}
