//! Events and Callbacks
//!
//! Callback placeholders never become attribute text directly. The bound
//! element stores the closure in its own token table and the DOM-visible
//! attribute becomes a small dispatch expression that looks the token up at
//! event time, so a callback can be swapped without re-parsing markup.

use std::sync::Arc;

use crate::value::Value;

/// Shared event-handler closure.
pub type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

/// A minimal event delivered to bound callbacks.
#[derive(Debug, Clone)]
pub struct Event {
    name: String,
    detail: Value,
}

impl Event {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_owned(), detail: Value::Null }
    }

    pub fn with_detail(name: &str, detail: Value) -> Self {
        Self { name: name.to_owned(), detail }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn detail(&self) -> &Value {
        &self.detail
    }
}

/// Wrap a closure as a [`Callback`].
pub fn callback<F>(f: F) -> Callback
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn callback_invokes_closure() {
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        let cb = callback(move |_event| {
            fired_clone.store(true, Ordering::SeqCst);
        });
        cb(&Event::new("click"));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn event_carries_detail() {
        let event = Event::with_detail("input", Value::Text("abc".into()));
        assert_eq!(event.name(), "input");
        assert_eq!(*event.detail(), Value::Text("abc".into()));
    }
}
