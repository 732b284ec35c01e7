//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive: a mutable value cell
//! with a subscriber set and equality-gated notification.
//!
//! # How Signals Work
//!
//! 1. Reading a signal inside an evaluating effect adds that effect's
//!    identity token to the signal's subscriber set.
//!
//! 2. Writing a value that compares equal to the current one (under the
//!    value type's `PartialEq`; for [`Value`](crate::value::Value) that is
//!    the strict/structural equality rule) notifies nobody.
//!
//! 3. A material change notifies every subscriber synchronously, in
//!    subscription order. Each invocation is individually contained: one
//!    failing subscriber is logged and the rest still run.
//!
//! # Identity
//!
//! A signal is its shared cell: clones (and the read/write halves from
//! [`Signal::split`]) alias the same cell. Equality of signals is handle
//! identity, never value.
//!
//! # Cycle guard
//!
//! Setter calls made while a notification is already running on the
//! current thread (an effect writing a signal mid-run) do not recurse.
//! They queue their subscribers on a thread-local delivery queue, and the
//! outermost setter drains it in rounds, so a runaway effect/setter cycle
//! burns the round cap instead of the thread stack. Past
//! [`MAX_SETTER_DEPTH`] rounds the chain is assumed to be an infinite
//! loop; pending notifications are dropped and the overflow is logged.
//! This is a safety valve, not cycle detection.

use std::cell::RefCell;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use indexmap::IndexSet;
use tracing::{debug, error};

use super::batch;
use super::context::{self, SubscriberId};
use super::runtime;
use crate::error::Error;

/// Maximum cascaded notification rounds per setter call before the cycle
/// guard trips.
pub const MAX_SETTER_DEPTH: u32 = 1000;

thread_local! {
    static DELIVERY: RefCell<Option<Vec<SubscriberId>>> = const { RefCell::new(None) };
}

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Bound alias for types a signal can hold.
pub trait SignalValue: Clone + PartialEq + Debug + Send + Sync + 'static {}

impl<T: Clone + PartialEq + Debug + Send + Sync + 'static> SignalValue for T {}

/// Creation-time options: debug logging and a label for it.
#[derive(Debug, Clone, Default)]
pub struct SignalOptions {
    pub debug_mode: bool,
    pub label: Option<String>,
}

/// Per-call options accepted by individual getter/setter invocations.
///
/// A call-level label does not replace a creation-level one; the creation
/// label is wrapped in parentheses and the call label appended.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub debug_mode: bool,
    pub label: Option<String>,
}

/// A reactive signal holding a value of type `T`.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
/// let value = count.get(); // subscribes the active effect, if any
/// count.set(5);            // notifies subscribers
/// ```
pub struct Signal<T: SignalValue> {
    id: u64,
    value: Arc<RwLock<T>>,
    /// Insertion order is notification order.
    subscribers: Arc<RwLock<IndexSet<SubscriberId>>>,
    options: Arc<SignalOptions>,
}

impl<T: SignalValue> Signal<T> {
    pub fn new(value: T) -> Self {
        Self::with_options(value, SignalOptions::default())
    }

    pub fn with_options(value: T, options: SignalOptions) -> Self {
        Self {
            id: next_signal_id(),
            value: Arc::new(RwLock::new(value)),
            subscribers: Arc::new(RwLock::new(IndexSet::new())),
            options: Arc::new(options),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Read the value, registering the active effect as a subscriber.
    pub fn get(&self) -> T {
        self.read(None)
    }

    /// Read with per-call debug options.
    pub fn get_with(&self, options: &CallOptions) -> T {
        self.read(Some(options))
    }

    /// Read without registering any dependency.
    pub fn get_untracked(&self) -> T {
        self.value.read().expect("value lock poisoned").clone()
    }

    fn read(&self, call: Option<&CallOptions>) -> T {
        if let Some(subscriber) = context::current_subscriber() {
            self.subscribers
                .write()
                .expect("subscriber lock poisoned")
                .insert(subscriber);
        }

        let value = self.value.read().expect("value lock poisoned").clone();

        if self.options.debug_mode || call.is_some_and(|c| c.debug_mode) {
            debug!(
                value = ?value,
                subscribers = self.subscriber_count(),
                label = %self.debug_label(call),
                "signal read"
            );
        }

        value
    }

    /// Write a new value and notify subscribers on material change.
    pub fn set(&self, value: T) {
        self.write(value, None);
    }

    /// Write with per-call debug options.
    pub fn set_with(&self, value: T, options: &CallOptions) {
        self.write(value, Some(options));
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.value.read().expect("value lock poisoned");
            f(&guard)
        };
        self.set(new_value);
    }

    fn write(&self, new_value: T, call: Option<&CallOptions>) {
        let old_value = {
            let mut guard = self.value.write().expect("value lock poisoned");
            if *guard == new_value {
                return;
            }
            std::mem::replace(&mut *guard, new_value.clone())
        };

        // Snapshot so subscribers registered mid-notification (e.g. by a
        // replacement effect) are not notified for this change.
        let subscribers: Vec<SubscriberId> = self
            .subscribers
            .read()
            .expect("subscriber lock poisoned")
            .iter()
            .copied()
            .collect();

        // If a delivery loop is already draining on this thread, this call
        // came from inside a notified effect; queueing keeps the chain flat.
        let outermost = DELIVERY.with(|queue| {
            let mut queue = queue.borrow_mut();
            if queue.is_none() {
                *queue = Some(Vec::new());
                true
            } else {
                false
            }
        });

        let mut stale: Vec<SubscriberId> = Vec::new();
        for id in subscribers {
            if batch::enqueue(id) {
                continue;
            }
            if runtime::get(id).is_some() {
                DELIVERY.with(|queue| {
                    queue
                        .borrow_mut()
                        .as_mut()
                        .expect("delivery queue missing")
                        .push(id);
                });
            } else {
                stale.push(id);
            }
        }

        if !stale.is_empty() {
            let mut subscribers = self.subscribers.write().expect("subscriber lock poisoned");
            for id in stale {
                subscribers.shift_remove(&id);
            }
        }

        if self.options.debug_mode || call.is_some_and(|c| c.debug_mode) {
            debug!(
                old_value = ?old_value,
                new_value = ?new_value,
                subscribers = self.subscriber_count(),
                label = %self.debug_label(call),
                "signal set"
            );
        }

        if outermost {
            drain_delivery_queue();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().expect("subscriber lock poisoned").len()
    }

    /// Split into the getter/setter pair of the authoring contract.
    pub fn split(&self) -> (ReadSignal<T>, WriteSignal<T>) {
        (ReadSignal(self.clone()), WriteSignal(self.clone()))
    }

    fn debug_label(&self, call: Option<&CallOptions>) -> String {
        let call_label = call.and_then(|c| c.label.as_deref());
        match (self.options.label.as_deref(), call_label) {
            (Some(created), Some(called)) => format!("({created}) {called}"),
            (Some(created), None) => format!("({created})"),
            (None, Some(called)) => called.to_owned(),
            (None, None) => "anonymous signal".to_owned(),
        }
    }
}

/// Run queued notifications in rounds until the queue settles.
///
/// Each round takes the queue as it stands and runs those effects; writes
/// they make enqueue into the next round. A chain still growing after
/// [`MAX_SETTER_DEPTH`] rounds is treated as an infinite loop: the pending
/// notifications are dropped and the overflow logged.
fn drain_delivery_queue() {
    for _round in 0..MAX_SETTER_DEPTH {
        let ready: Vec<SubscriberId> = DELIVERY.with(|queue| {
            queue
                .borrow_mut()
                .as_mut()
                .map(std::mem::take)
                .unwrap_or_default()
        });
        if ready.is_empty() {
            DELIVERY.with(|queue| *queue.borrow_mut() = None);
            return;
        }
        for id in ready {
            runtime::run(id);
        }
    }

    let dropped = DELIVERY.with(|queue| {
        let mut queue = queue.borrow_mut();
        let len = queue.as_ref().map_or(0, Vec::len);
        *queue = None;
        len
    });
    error!(
        error = %Error::CycleOverflow,
        dropped,
        "signal update chain bailing out"
    );
}

impl<T: SignalValue> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
            subscribers: Arc::clone(&self.subscribers),
            options: Arc::clone(&self.options),
        }
    }
}

impl<T: SignalValue> Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Read half of a signal: the getter of the authoring contract.
#[derive(Clone, Debug)]
pub struct ReadSignal<T: SignalValue>(Signal<T>);

impl<T: SignalValue> ReadSignal<T> {
    pub fn get(&self) -> T {
        self.0.get()
    }

    pub fn get_with(&self, options: &CallOptions) -> T {
        self.0.get_with(options)
    }

    pub fn get_untracked(&self) -> T {
        self.0.get_untracked()
    }

    pub fn id(&self) -> u64 {
        self.0.id()
    }
}

/// Write half of a signal: the setter of the authoring contract.
#[derive(Clone, Debug)]
pub struct WriteSignal<T: SignalValue>(Signal<T>);

impl<T: SignalValue> WriteSignal<T> {
    pub fn set(&self, value: T) {
        self.0.set(value);
    }

    pub fn set_with(&self, value: T, options: &CallOptions) {
        self.0.set_with(value, options);
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        self.0.update(f);
    }
}

/// Create a signal and return its getter/setter pair.
pub fn create_signal<T: SignalValue>(initial: T) -> (ReadSignal<T>, WriteSignal<T>) {
    Signal::new(initial).split()
}

/// Create a signal with options (debug mode, label).
pub fn create_signal_with<T: SignalValue>(
    initial: T,
    options: SignalOptions,
) -> (ReadSignal<T>, WriteSignal<T>) {
    Signal::with_options(initial, options).split()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use crate::value::Value;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn effect_runs_once_per_material_change() {
        let (count, set_count) = create_signal(0);
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();

        let _effect = Effect::new(move |_scope| {
            let _ = count.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        set_count.set(1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        // no-op write: equality gate suppresses notification
        set_count.set(1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn deep_equal_plain_data_suppresses_notification() {
        let signal = Signal::new(Value::Data(serde_json::json!({ "a": [1, 2] })));
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();
        let signal_clone = signal.clone();

        let _effect = Effect::new(move |_scope| {
            let _ = signal_clone.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        signal.set(Value::Data(serde_json::json!({ "a": [1, 2] })));
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        signal.set(Value::Data(serde_json::json!({ "a": [1, 2, 3] })));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn subscribers_notified_in_subscription_order() {
        let signal = Signal::new(0);
        let order = Arc::new(RwLock::new(Vec::new()));

        for tag in 1..=3 {
            let signal_clone = signal.clone();
            let order_clone = order.clone();
            let _effect = Effect::new(move |_scope| {
                let value = signal_clone.get();
                if value != 0 {
                    order_clone.write().unwrap().push(tag);
                }
                Ok(())
            });
        }

        signal.set(1);
        assert_eq!(*order.read().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn failing_subscriber_does_not_stop_the_rest() {
        let signal = Signal::new(0);
        let runs = Arc::new(AtomicI32::new(0));

        let signal_clone = signal.clone();
        let _failing = Effect::new(move |_scope| {
            let _ = signal_clone.get();
            Err(Error::Effect("deliberate".into()))
        });

        let signal_clone = signal.clone();
        let runs_clone = runs.clone();
        let _counting = Effect::new(move |_scope| {
            let _ = signal_clone.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        signal.set(1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn destroyed_subscribers_are_pruned_lazily() {
        let signal = Signal::new(0);
        let signal_clone = signal.clone();
        let effect = Effect::new(move |_scope| {
            let _ = signal_clone.get();
            Ok(())
        });
        assert_eq!(signal.subscriber_count(), 1);

        effect.destroy();
        // Still in the set until the next notification prunes it.
        assert_eq!(signal.subscriber_count(), 1);

        signal.set(1);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn cycle_guard_aborts_runaway_update_loops() {
        let signal = Signal::new(0i64);
        let runs = Arc::new(AtomicI32::new(0));

        let signal_clone = signal.clone();
        let runs_clone = runs.clone();
        let _effect = Effect::new(move |_scope| {
            let value = signal_clone.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
            // Unconditional write of a fresh value: an infinite loop
            // without the guard.
            signal_clone.set(value + 1);
            Ok(())
        });

        // The creation run starts one chain; this set starts another. Each
        // chain runs the effect once per delivery round, so queueing (not
        // recursing) is what keeps the stack flat here.
        signal.set(signal.get_untracked() + 1);

        // Both chains hit the round cap and stopped.
        let total = runs.load(Ordering::SeqCst);
        assert!(total > 0);
        assert!(total <= 2 * (MAX_SETTER_DEPTH as i32 + 1));
        assert!(signal.get_untracked() >= 1);
    }

    #[test]
    fn deep_finite_update_chains_settle() {
        let signal = Signal::new(0i64);
        let signal_clone = signal.clone();
        let _effect = Effect::new(move |_scope| {
            let value = signal_clone.get();
            if value < 500 {
                signal_clone.set(value + 1);
            }
            Ok(())
        });

        assert_eq!(signal.get_untracked(), 500);
    }

    #[test]
    fn clone_shares_state() {
        let a = Signal::new(0);
        let b = a.clone();

        a.set(42);
        assert_eq!(b.get(), 42);

        b.set(100);
        assert_eq!(a.get(), 100);
    }

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let signal = Signal::new(0);
        let signal_clone = signal.clone();
        let _effect = Effect::new(move |_scope| {
            let _ = signal_clone.get_untracked();
            Ok(())
        });
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn signal_ids_are_unique() {
        let a = Signal::new(0);
        let b = Signal::new(0);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn debug_label_merging() {
        let signal = Signal::with_options(
            0,
            SignalOptions { debug_mode: false, label: Some("count".into()) },
        );
        let call = CallOptions { debug_mode: false, label: Some("in render".into()) };
        assert_eq!(signal.debug_label(Some(&call)), "(count) in render");
        assert_eq!(signal.debug_label(None), "(count)");

        let unlabeled = Signal::new(0);
        assert_eq!(unlabeled.debug_label(Some(&call)), "in render");
        assert_eq!(unlabeled.debug_label(None), "anonymous signal");
    }
}
