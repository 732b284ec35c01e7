//! Node Tree, Events, and Parsing
//!
//! This module is the stand-in for the host environment's document tree:
//! the structure the binding engine materializes templates into and then
//! mutates through targeted, marker-bounded splices.
//!
//! It implements only what the explicit dynamic slots need; it is not a
//! general virtual-DOM layer and performs no tree diffing of its own.

mod event;
mod node;
mod parser;

pub use event::{callback, Callback, Event};
pub use node::{Fragment, Node, NodeRef};
pub use parser::parse_fragment;

pub(crate) use node::{dispatch_expression, dispatch_token};
