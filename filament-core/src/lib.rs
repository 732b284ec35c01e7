//! Filament Core
//!
//! This crate provides the core runtime for the Filament reactive UI
//! library. It implements:
//!
//! - Reactive primitives (signals, derived signals, effects, batching)
//! - A markup/style template compiler with server and client modes
//! - A binding engine that keeps a node tree in sync with signals
//! - Keyed list reconciliation
//!
//! The same template compiles to a finished string on the server or to a
//! live tree on the client; the [`template::RenderContext`] decides which.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: signals, effects, and dependency tracking
//! - `value`: the dynamic value type bindings resolve to
//! - `dom`: the node tree, markup parser, and event dispatch
//! - `template`: the `html!`/`css!` compilers and the render context
//! - `bind`: placeholder wiring and keyed reconciliation
//!
//! # Example
//!
//! ```rust,ignore
//! use filament_core::html;
//! use filament_core::dom::callback;
//! use filament_core::reactive::create_signal;
//! use filament_core::template::RenderContext;
//!
//! let ctx = RenderContext::client();
//! let (count, set_count) = create_signal(0);
//!
//! let on_click = callback(move |_event| set_count.update(|n| n + 1));
//! let view = html!(&ctx,
//!     "<button onclick=\"" { on_click } "\">clicks: " { count } "</button>"
//! );
//!
//! // the view's text region now follows the signal
//! set_count.set(3);
//! assert!(view.to_html().contains("clicks: "));
//! ```

pub mod bind;
pub mod dom;
pub mod error;
pub mod reactive;
pub mod template;
pub mod value;

pub use error::Error;
pub use value::Value;
