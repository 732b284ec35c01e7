//! Effect Registry
//!
//! The registry is the process-wide table resolving subscriber identity
//! tokens to live effects. Signals store only tokens; at notification time
//! they ask the registry for the effect behind each one. A token with no
//! entry is stale (the effect destroyed itself) and the signal prunes it
//! from its subscriber set.
//!
//! Entries are strong references: effects are fire-and-forget and stay
//! alive until [`destroy`](crate::reactive::Effect::destroy) removes them.
//! The registry lock is never held while an effect runs, so effects are
//! free to create or destroy other effects.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::error;

use super::context::SubscriberId;
use super::effect::EffectInner;

static REGISTRY: OnceLock<RwLock<HashMap<SubscriberId, Arc<EffectInner>>>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<SubscriberId, Arc<EffectInner>>> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register an effect under its identity token.
pub(crate) fn register(effect: Arc<EffectInner>) {
    registry()
        .write()
        .expect("registry lock poisoned")
        .insert(effect.id(), effect);
}

/// Remove an effect. Later notifications to this token are stale.
pub(crate) fn unregister(id: SubscriberId) {
    registry().write().expect("registry lock poisoned").remove(&id);
}

/// Resolve a token to its live effect, if it still exists.
pub(crate) fn get(id: SubscriberId) -> Option<Arc<EffectInner>> {
    registry().read().expect("registry lock poisoned").get(&id).cloned()
}

/// Run the effect behind a token, containing and logging any failure.
/// Used by the batch flusher and the setter delivery loop.
pub(crate) fn run(id: SubscriberId) {
    let Some(effect) = get(id) else {
        return;
    };
    if effect.is_destroyed() {
        return;
    }
    if let Err(err) = effect.execute() {
        error!(error = %err, subscriber = ?id, "error in effect");
    }
}

/// Number of live effects; diagnostics only.
pub fn live_effect_count() -> usize {
    registry().read().expect("registry lock poisoned").len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn registry_resolves_live_effects() {
        let effect = Effect::new(|_scope| Ok(()));
        assert!(get(effect.subscriber_id()).is_some());

        effect.destroy();
        assert!(get(effect.subscriber_id()).is_none());
    }

    #[test]
    fn run_is_a_no_op_for_stale_tokens() {
        let id = SubscriberId::new();
        run(id); // must not panic
    }

    #[test]
    fn run_executes_live_effects() {
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();
        let effect = Effect::new(move |_scope| {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        run(effect.subscriber_id());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
