//! Derived Signals
//!
//! A derived signal composes a private signal with an effect: the effect
//! recomputes the value whenever a dependency changes and writes it
//! through the private setter. The caller only ever sees the read half,
//! a derived signal is a read-only projection with the same identity and
//! equality semantics as a plain signal.
//!
//! Recomputation is eager (push), unlike a lazily pulled memo: the binding
//! engine depends on derived values propagating the moment their inputs
//! change.

use std::sync::{Arc, RwLock};

use tracing::error;

use super::effect::Effect;
use super::signal::{ReadSignal, Signal, SignalOptions, SignalValue};
use crate::error::Error;

/// Create a read-only signal recomputed from other signals.
///
/// ```rust,ignore
/// let (count, set_count) = create_signal(1);
/// let doubled = derived(move || count.get() * 2);
/// assert_eq!(doubled.get(), 2);
/// ```
pub fn derived<T, F>(f: F) -> ReadSignal<T>
where
    T: SignalValue,
    F: Fn() -> T + Send + Sync + 'static,
{
    derived_with(f, SignalOptions::default())
}

/// [`derived`] with signal options (debug mode, label).
pub fn derived_with<T, F>(f: F, options: SignalOptions) -> ReadSignal<T>
where
    T: SignalValue,
    F: Fn() -> T + Send + Sync + 'static,
{
    let cell: Arc<RwLock<Option<Signal<T>>>> = Arc::new(RwLock::new(None));
    let effect_cell = Arc::clone(&cell);

    Effect::new(move |_scope| {
        let value = f();
        let existing = effect_cell.read().expect("derived cell lock poisoned").clone();
        match existing {
            Some(signal) => signal.set(value),
            None => {
                *effect_cell.write().expect("derived cell lock poisoned") =
                    Some(Signal::with_options(value, options.clone()));
            }
        }
        Ok(())
    });

    let signal = cell
        .read()
        .expect("derived cell lock poisoned")
        .clone()
        .expect("derived effect ran at creation");
    signal.split().0
}

/// Fallible derivation: a recompute returning `Err` is logged and leaves
/// the previous value in place. The first compute failing seeds the
/// signal with `T::default()`.
pub fn try_derived<T, F>(f: F) -> ReadSignal<T>
where
    T: SignalValue + Default,
    F: Fn() -> Result<T, Error> + Send + Sync + 'static,
{
    let cell: Arc<RwLock<Option<Signal<T>>>> = Arc::new(RwLock::new(None));
    let effect_cell = Arc::clone(&cell);

    Effect::new(move |_scope| {
        let value = match f() {
            Ok(value) => value,
            Err(err) => {
                error!(error = %err, "error in derived signal");
                if effect_cell.read().expect("derived cell lock poisoned").is_none() {
                    *effect_cell.write().expect("derived cell lock poisoned") =
                        Some(Signal::new(T::default()));
                }
                return Ok(());
            }
        };
        let existing = effect_cell.read().expect("derived cell lock poisoned").clone();
        match existing {
            Some(signal) => signal.set(value),
            None => {
                *effect_cell.write().expect("derived cell lock poisoned") = Some(Signal::new(value));
            }
        }
        Ok(())
    });

    let signal = cell
        .read()
        .expect("derived cell lock poisoned")
        .clone()
        .expect("derived effect ran at creation");
    signal.split().0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::create_signal;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn derived_computes_immediately() {
        let (count, _set_count) = create_signal(3);
        let doubled = derived(move || count.get() * 2);
        assert_eq!(doubled.get(), 6);
    }

    #[test]
    fn derived_recomputes_on_dependency_change() {
        let (count, set_count) = create_signal(1);
        let doubled = derived(move || count.get() * 2);

        set_count.set(5);
        assert_eq!(doubled.get(), 10);
    }

    #[test]
    fn derived_recomputes_only_on_material_change() {
        let (count, set_count) = create_signal(1);
        let computes = Arc::new(AtomicI32::new(0));
        let computes_clone = computes.clone();

        let _doubled = derived(move || {
            computes_clone.fetch_add(1, Ordering::SeqCst);
            count.get() * 2
        });
        assert_eq!(computes.load(Ordering::SeqCst), 1);

        set_count.set(1); // no-op write
        assert_eq!(computes.load(Ordering::SeqCst), 1);

        set_count.set(2);
        assert_eq!(computes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn derived_chains() {
        let (count, set_count) = create_signal(1);
        let doubled = derived(move || count.get() * 2);
        let doubled_clone = doubled.clone();
        let plus_ten = derived(move || doubled_clone.get() + 10);

        assert_eq!(plus_ten.get(), 12);
        set_count.set(5);
        assert_eq!(plus_ten.get(), 20);
    }

    #[test]
    fn failing_recompute_keeps_previous_value() {
        let (count, set_count) = create_signal(1);
        let safe = try_derived(move || {
            let value = count.get();
            if value > 10 {
                Err(Error::Effect("out of range".into()))
            } else {
                Ok(value * 2)
            }
        });
        assert_eq!(safe.get(), 2);

        set_count.set(50); // recompute fails, value stays
        assert_eq!(safe.get(), 2);

        set_count.set(4);
        assert_eq!(safe.get(), 8);
    }
}
