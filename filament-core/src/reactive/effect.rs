//! Effect Implementation
//!
//! An Effect is a unit of reactive work that runs whenever one of the
//! signals it read during execution changes.
//!
//! # Lifecycle
//!
//! 1. Creation runs the closure synchronously, under a freshly pushed
//!    tracking context; every signal read during that run subscribes the
//!    effect's identity token.
//!
//! 2. A signal setter re-runs the closure on change, again under the
//!    effect's tracking context.
//!
//! 3. The closure may call [`EffectScope::destroy`] to remove itself from
//!    the runtime registry. Notifications addressed to a destroyed effect
//!    are stale and get lazily pruned from signal subscriber sets. An
//!    effect that destroys itself is free to create a replacement effect
//!    before returning; this is how a binding switches strategy when a
//!    signal's value changes shape.
//!
//! # The `last_value` channel
//!
//! A closure can retain a [`Value`] across runs via
//! [`EffectScope::retain`]; the next run sees it as
//! [`EffectScope::last_value`]. Incremental strategies (e.g. diffing
//! against a previously rendered list) hang their state here.
//!
//! # Failure containment
//!
//! The closure returns `Result`; an `Err` is logged by whoever invoked the
//! effect (creation or a signal setter) and never propagates further.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use tracing::error;

use super::context::{SubscriberId, TrackingGuard};
use super::runtime;
use crate::error::Error;
use crate::value::Value;

/// The view of an effect handed to its own closure.
pub struct EffectScope {
    id: SubscriberId,
    last_value: Option<Value>,
    retained: Option<Value>,
    destroy_requested: bool,
}

impl EffectScope {
    /// This effect's identity token.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// The value retained by the previous run, if any.
    pub fn last_value(&self) -> Option<&Value> {
        self.last_value.as_ref()
    }

    /// Take ownership of the previous run's value.
    pub fn take_last_value(&mut self) -> Option<Value> {
        self.last_value.take()
    }

    /// Retain a value for the next run.
    pub fn retain(&mut self, value: Value) {
        self.retained = Some(value);
    }

    /// Destroy this effect: once the current run returns, its registry
    /// entry is removed and it never runs again.
    pub fn destroy(&mut self) {
        self.destroy_requested = true;
    }
}

pub(crate) struct EffectInner {
    id: SubscriberId,
    run: Box<dyn Fn(&mut EffectScope) -> Result<(), Error> + Send + Sync>,
    last_value: RwLock<Option<Value>>,
    destroyed: AtomicBool,
    run_count: AtomicUsize,
}

impl EffectInner {
    /// Run the closure under this effect's tracking context.
    ///
    /// Returns the closure's result so the caller can log the failure with
    /// its own context. Destroyed effects are a no-op.
    pub(crate) fn execute(&self) -> Result<(), Error> {
        if self.is_destroyed() {
            return Ok(());
        }

        let mut scope = EffectScope {
            id: self.id,
            last_value: self.last_value.read().expect("last_value lock poisoned").clone(),
            retained: None,
            destroy_requested: false,
        };

        let result = {
            let _guard = TrackingGuard::enter(self.id);
            (self.run)(&mut scope)
        };

        if let Some(retained) = scope.retained {
            *self.last_value.write().expect("last_value lock poisoned") = Some(retained);
        }
        self.run_count.fetch_add(1, Ordering::Relaxed);

        if scope.destroy_requested {
            self.destroyed.store(true, Ordering::SeqCst);
            runtime::unregister(self.id);
        }

        result
    }

    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_destroyed(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

/// Handle to a registered effect.
///
/// Effects are fire-and-forget: the runtime keeps them alive until
/// destroyed, so dropping this handle does not stop the effect. It exists
/// so hosts and tests can destroy or inspect an effect from outside.
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create an effect and run it immediately to establish dependencies.
    ///
    /// A failure of the first run is logged, not returned; creation
    /// always succeeds.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(&mut EffectScope) -> Result<(), Error> + Send + Sync + 'static,
    {
        let inner = Arc::new(EffectInner {
            id: SubscriberId::new(),
            run: Box::new(run),
            last_value: RwLock::new(None),
            destroyed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        });

        runtime::register(Arc::clone(&inner));

        if let Err(err) = inner.execute() {
            error!(error = %err, "error in effect");
        }

        Self { inner }
    }

    /// The effect's identity token.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Destroy the effect from outside. Idempotent.
    pub fn destroy(&self) {
        self.inner.mark_destroyed();
        runtime::unregister(self.inner.id);
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }

    /// Number of completed runs.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
