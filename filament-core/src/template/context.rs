//! Render Context
//!
//! The render context carries the server/client mode switch and the
//! placeholder tables that connect the compiler to the binding engine:
//! signal-token → getter, callback-token → closure, fragment-token →
//! fragment, property-marker → property name.
//!
//! The tables are deliberately *not* module-level singletons: they live in
//! the context object, and dropping the context drops every table. Hosts
//! scope a context to whatever unit of work they render (a component
//! instance, a request); tokens are only meaningful within their own
//! context. Entries are appended during compilation and consulted once
//! during binding; nothing evicts them mid-render.
//!
//! Tokens are sequential indices, not random identifiers; the string
//! placeholder grammar (`{{signal:<token>}}`) survives only because the
//! compiler's intermediate form is a string.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::dom::{Callback, Fragment};
use crate::reactive::{ReadSignal, SignalValue};
use crate::value::Value;

/// Compilation/binding mode: the single switch that changes the
/// compiler's exit point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Resolve placeholders immediately and return a plain string.
    Server,
    /// Parse the intermediate markup and wire live bindings.
    Client,
}

/// Type-erased signal read: what the binding engine holds per signal
/// placeholder. Calling [`get`](ValueGetter::get) inside an effect
/// subscribes that effect, exactly like the underlying signal getter.
#[derive(Clone)]
pub struct ValueGetter(Arc<dyn Fn() -> Value + Send + Sync>);

impl ValueGetter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn get(&self) -> Value {
        (self.0)()
    }
}

impl<T> From<ReadSignal<T>> for ValueGetter
where
    T: SignalValue + Into<Value>,
{
    fn from(signal: ReadSignal<T>) -> Self {
        Self::new(move || signal.get().into())
    }
}

impl std::fmt::Debug for ValueGetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ValueGetter({:p})", Arc::as_ptr(&self.0))
    }
}

#[derive(Default)]
struct ContextState {
    signals: HashMap<u64, ValueGetter>,
    callbacks: HashMap<u64, Callback>,
    fragments: HashMap<u64, Fragment>,
    properties: HashMap<u64, String>,
    next_token: u64,
}

/// Shared compilation state for one render scope.
#[derive(Clone)]
pub struct RenderContext {
    mode: Mode,
    state: Arc<RwLock<ContextState>>,
}

impl RenderContext {
    pub fn new(mode: Mode) -> Self {
        Self { mode, state: Arc::new(RwLock::new(ContextState::default())) }
    }

    pub fn server() -> Self {
        Self::new(Mode::Server)
    }

    pub fn client() -> Self {
        Self::new(Mode::Client)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_server(&self) -> bool {
        self.mode == Mode::Server
    }

    fn next_token(&self) -> u64 {
        let mut state = self.state.write().expect("render context lock poisoned");
        let token = state.next_token;
        state.next_token += 1;
        token
    }

    pub(crate) fn register_signal(&self, getter: ValueGetter) -> u64 {
        let token = self.next_token();
        self.state
            .write()
            .expect("render context lock poisoned")
            .signals
            .insert(token, getter);
        token
    }

    pub(crate) fn signal(&self, token: u64) -> Option<ValueGetter> {
        self.state
            .read()
            .expect("render context lock poisoned")
            .signals
            .get(&token)
            .cloned()
    }

    pub(crate) fn register_callback(&self, callback: Callback) -> u64 {
        let token = self.next_token();
        self.state
            .write()
            .expect("render context lock poisoned")
            .callbacks
            .insert(token, callback);
        token
    }

    pub(crate) fn callback(&self, token: u64) -> Option<Callback> {
        self.state
            .read()
            .expect("render context lock poisoned")
            .callbacks
            .get(&token)
            .cloned()
    }

    pub(crate) fn register_fragment(&self, fragment: Fragment) -> u64 {
        let token = self.next_token();
        self.state
            .write()
            .expect("render context lock poisoned")
            .fragments
            .insert(token, fragment);
        token
    }

    pub(crate) fn fragment(&self, token: u64) -> Option<Fragment> {
        self.state
            .read()
            .expect("render context lock poisoned")
            .fragments
            .get(&token)
            .cloned()
    }

    pub(crate) fn register_property(&self, name: &str) -> u64 {
        let token = self.next_token();
        self.state
            .write()
            .expect("render context lock poisoned")
            .properties
            .insert(token, name.to_owned());
        token
    }

    pub(crate) fn property_name(&self, token: u64) -> Option<String> {
        self.state
            .read()
            .expect("render context lock poisoned")
            .properties
            .get(&token)
            .cloned()
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("render context lock poisoned");
        f.debug_struct("RenderContext")
            .field("mode", &self.mode)
            .field("signals", &state.signals.len())
            .field("callbacks", &state.callbacks.len())
            .field("fragments", &state.fragments.len())
            .field("properties", &state.properties.len())
            .finish()
    }
}
