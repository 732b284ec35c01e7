//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, effects, and
//! derived signals. These primitives form the foundation of Filament's
//! fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is
//! read within a tracking context (an effect's run), the signal registers
//! that effect as a subscriber. When the value materially changes (under
//! the equality rule of the value type) all subscribers are notified
//! synchronously, in subscription order.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that re-runs whenever a
//! dependency changes. Effects synchronize reactive state with the node
//! tree; they can destroy themselves and hand their work to a replacement
//! effect, which is how bindings change strategy at runtime.
//!
//! ## Derived signals
//!
//! A derived signal is a read-only projection recomputed from other
//! signals through an effect.
//!
//! # Implementation Notes
//!
//! Dependency detection is automatic: a thread-local tracking context
//! records the evaluating effect, and signal reads consult it. This
//! "transparent reactivity" approach is used by SolidJS, Vue 3, and
//! Leptos. Notification is synchronous within a setter call, except under
//! [`batch`], which coalesces to one run per effect at the end of the
//! block.

mod batch;
mod context;
mod derived;
mod effect;
mod runtime;
mod signal;

pub use batch::batch;
pub use context::{is_tracking, untrack, SubscriberId};
pub use derived::{derived, derived_with, try_derived};
pub use effect::{Effect, EffectScope};
pub use runtime::live_effect_count;
pub use signal::{
    create_signal, create_signal_with, CallOptions, ReadSignal, Signal, SignalOptions, SignalValue,
    WriteSignal, MAX_SETTER_DEPTH,
};
