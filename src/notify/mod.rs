//! State change notification - selector-based subscriptions.
//!
//! Observers subscribe to a slice of some state `S` via a selector. After each
//! transition the owner calls [`StateChangeNotifier::notify`]; a subscriber's
//! callback runs only when its selected slice differs from the previous one.
//!
//! Callbacks run synchronously on the notifying thread, in registration order.
//! A subscription added or removed while a pass is running does not change
//! which subscribers that pass visits. Queued states are delivered one pass
//! at a time, oldest first.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

trait Watch<S>: Send + Sync {
    fn check(&self, state: &S);
}

struct Watcher<T, F, C, Q> {
    selector: F,
    on_change: C,
    equals: Q,
    last: Mutex<T>,
}

impl<S, T, F, C, Q> Watch<S> for Watcher<T, F, C, Q>
where
    T: Send,
    F: Fn(&S) -> T + Send + Sync,
    C: Fn(&T) + Send + Sync,
    Q: Fn(&T, &T) -> bool + Send + Sync,
{
    fn check(&self, state: &S) {
        let next = (self.selector)(state);
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if (self.equals)(&*last, &next) {
            return;
        }
        *last = next;
        (self.on_change)(&*last);
    }
}

struct Slot<S> {
    id: u64,
    /// Last queued sequence number visible when this slot was added.
    since: u64,
    watcher: Arc<dyn Watch<S>>,
}

type Slots<S> = Mutex<Vec<Slot<S>>>;

trait Registry: Send + Sync {
    fn remove(&self, id: u64) -> bool;
}

impl<S: 'static> Registry for Slots<S> {
    fn remove(&self, id: u64) -> bool {
        let mut slots = self.lock().unwrap_or_else(PoisonError::into_inner);
        let before = slots.len();
        slots.retain(|slot| slot.id != id);
        slots.len() != before
    }
}

/// States waiting for delivery, tagged with increasing sequence numbers.
struct Queue<S> {
    states: VecDeque<(u64, S)>,
    last_seq: u64,
}

/// Fan-out of state transitions to selector subscriptions.
///
/// Owners either call [`notify`](Self::notify) directly, or [`enqueue`](Self::enqueue)
/// while holding their own lock and [`flush`](Self::flush) after releasing it,
/// so callbacks may read or subscribe to the owner.
pub struct StateChangeNotifier<S> {
    slots: Arc<Slots<S>>,
    next_id: AtomicU64,
    queue: Mutex<Queue<S>>,
    draining: AtomicBool,
}

impl<S: 'static> Default for StateChangeNotifier<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: 'static> StateChangeNotifier<S> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
            queue: Mutex::new(Queue {
                states: VecDeque::new(),
                last_seq: 0,
            }),
            draining: AtomicBool::new(false),
        }
    }

    /// Subscribe with `PartialEq` as the change test.
    ///
    /// `current` seeds the cached slice; no callback runs at subscribe time.
    /// States queued before this call are not delivered to the new subscriber.
    pub fn subscribe<T, F, C>(&self, current: &S, selector: F, on_change: C) -> Subscription
    where
        T: PartialEq + Send + 'static,
        F: Fn(&S) -> T + Send + Sync + 'static,
        C: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe_with(current, selector, on_change, |a: &T, b: &T| a == b)
    }

    /// Subscribe with a custom equality function.
    pub fn subscribe_with<T, F, C, Q>(
        &self,
        current: &S,
        selector: F,
        on_change: C,
        equals: Q,
    ) -> Subscription
    where
        T: Send + 'static,
        F: Fn(&S) -> T + Send + Sync + 'static,
        C: Fn(&T) + Send + Sync + 'static,
        Q: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        let seed = selector(current);
        let watcher = Watcher {
            selector,
            on_change,
            equals,
            last: Mutex::new(seed),
        };

        let since = self.lock_queue().last_seq;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock_slots().push(Slot {
            id,
            since,
            watcher: Arc::new(watcher),
        });

        let slots: Arc<Slots<S>> = Arc::clone(&self.slots);
        let registry: Arc<dyn Registry> = slots;
        Subscription {
            id,
            registry: Arc::downgrade(&registry),
            active: AtomicBool::new(true),
        }
    }

    /// Run every subscription registered at the start of this call against `state`.
    pub fn notify(&self, state: &S) {
        self.deliver(u64::MAX, state);
    }

    /// Queue `state` for the next [`flush`](Self::flush).
    pub fn enqueue(&self, state: S) {
        let mut queue = self.lock_queue();
        queue.last_seq += 1;
        let seq = queue.last_seq;
        queue.states.push_back((seq, state));
    }

    /// Deliver queued states in order.
    ///
    /// If another call is already delivering (on another thread, or further up
    /// this thread's stack from inside a callback), that call delivers the
    /// newly queued states and this one returns at once.
    pub fn flush(&self) {
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            {
                let _draining = DrainFlag(&self.draining);
                while let Some((seq, state)) = self.pop() {
                    self.deliver(seq, &state);
                }
            }
            if self.lock_queue().states.is_empty() {
                return;
            }
        }
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.lock_slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn deliver(&self, seq: u64, state: &S) {
        let watchers: Vec<Arc<dyn Watch<S>>> = self
            .lock_slots()
            .iter()
            .filter(|slot| slot.since < seq)
            .map(|slot| Arc::clone(&slot.watcher))
            .collect();

        for watcher in watchers {
            watcher.check(state);
        }
    }

    fn pop(&self) -> Option<(u64, S)> {
        self.lock_queue().states.pop_front()
    }

    fn lock_slots(&self) -> MutexGuard<'_, Vec<Slot<S>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_queue(&self) -> MutexGuard<'_, Queue<S>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// Clears the draining flag even if a callback panics.
struct DrainFlag<'a>(&'a AtomicBool);

impl Drop for DrainFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Handle returned by `subscribe`.
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
pub struct Subscription {
    id: u64,
    registry: Weak<dyn Registry>,
    active: AtomicBool,
}

impl Subscription {
    /// Remove the subscription. Returns true only for the call that removed it.
    pub fn unsubscribe(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.id),
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) && self.registry.strong_count() > 0
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
