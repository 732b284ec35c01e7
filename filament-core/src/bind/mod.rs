//! Binding
//!
//! Connects compiled client-mode fragments to the reactive system: one
//! walk wires placeholders to effects ([`engine`]), and list-valued
//! bindings reconcile by key ([`keyed`]).

mod engine;
mod keyed;

pub use engine::bind;
