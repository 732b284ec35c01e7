//! Binding Engine
//!
//! One depth-first walk over a freshly parsed fragment finds every
//! placeholder the compiler left behind and wires it up:
//!
//! * signal tokens in text become comment-marker-bounded regions owned by
//!   a binding effect;
//! * signal tokens in attribute values become an effect that recomputes
//!   the whole attribute string;
//! * callback tokens become a dispatch-expression attribute plus an entry
//!   in the element's callback table;
//! * property markers become a property assignment (live when the value
//!   is a single signal);
//! * fragment carriers are swapped for the already-bound fragment they
//!   stand in for.
//!
//! The walk runs once per compilation. After it returns, only the effects
//! touch the tree, and each effect touches nothing outside its own region
//! or attribute.

use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{debug, error, warn};

use crate::dom::{dispatch_expression, Fragment, Node, NodeRef};
use crate::error::Error;
use crate::reactive::{untrack, Effect};
use crate::template::{
    display_value, RenderContext, ValueGetter, FRAGMENT_CARRIER_ATTR, PROPERTY_MARKER_PREFIX,
};
use crate::value::Value;

use super::keyed::reconcile_keyed;

/// One piece of a tokenized text or attribute value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Part {
    Static(String),
    Signal(u64),
    Callback(u64),
}

pub(crate) type Parts = SmallVec<[Part; 4]>;

/// The strategy a binding effect applies to its region. Decided from the
/// value's shape; when the shape changes at runtime the effect destroys
/// itself and hands the region to a replacement with the right strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindingKind {
    Text,
    Fragment,
    KeyedList,
}

impl BindingKind {
    fn of(value: &Value) -> Self {
        match value {
            Value::Fragment(_) => BindingKind::Fragment,
            Value::List(_) => BindingKind::KeyedList,
            _ => BindingKind::Text,
        }
    }
}

/// Wire every placeholder in `fragment` to its context table entry.
pub fn bind(ctx: &RenderContext, fragment: &Fragment) {
    bind_children(ctx, fragment.root());
}

fn bind_children(ctx: &RenderContext, parent: &NodeRef) {
    for child in parent.children() {
        if child.is_text() {
            bind_text(ctx, parent, &child);
        } else if child.is_element() {
            if let Some(raw) = child.attribute(FRAGMENT_CARRIER_ATTR) {
                resolve_carrier(ctx, &child, &raw);
                // carrier contents were bound by their own compilation
                continue;
            }
            bind_attributes(ctx, &child);
            bind_children(ctx, &child);
        }
    }
}

/// Replace a carrier element with the fragment it stands in for.
fn resolve_carrier(ctx: &RenderContext, carrier: &NodeRef, raw_token: &str) {
    let fragment = raw_token
        .parse::<u64>()
        .ok()
        .and_then(|token| ctx.fragment(token));
    match fragment {
        Some(fragment) => {
            carrier.replace_with(&fragment.children());
        }
        None => {
            let token = raw_token.parse::<u64>().unwrap_or(u64::MAX);
            error!(
                error = %Error::MissingBinding(token),
                "no fragment registered for carrier; leaving it in place"
            );
        }
    }
}

fn bind_text(ctx: &RenderContext, parent: &NodeRef, node: &NodeRef) {
    let Some(data) = node.text_data() else {
        return;
    };
    let parts = split_parts(&data);
    if !parts.iter().any(|p| matches!(p, Part::Signal(_))) {
        return;
    }

    let mut replacements: Vec<NodeRef> = Vec::new();
    let mut pending: Vec<(NodeRef, NodeRef, u64)> = Vec::new();
    for part in parts {
        match part {
            Part::Static(text) => replacements.push(Node::text(&text)),
            // callback tokens are attribute-only; in text they stay literal
            Part::Callback(token) => {
                replacements.push(Node::text(&callback_token_text(token)));
            }
            Part::Signal(token) => {
                let start = Node::comment(&format!("signal:{token}"));
                let end = Node::comment(&format!("/signal:{token}"));
                replacements.push(Arc::clone(&start));
                replacements.push(Arc::clone(&end));
                pending.push((start, end, token));
            }
        }
    }
    node.replace_with(&replacements);

    for (start, end, token) in pending {
        match ctx.signal(token) {
            Some(getter) => {
                let kind = BindingKind::of(&untrack(|| getter.get()));
                spawn_binding(Arc::clone(parent), start, end, getter, kind);
            }
            None => {
                error!(
                    error = %Error::MissingBinding(token),
                    "no signal registered for placeholder; leaving it as text"
                );
                parent.insert_before(&Node::text(&signal_token_text(token)), Some(&end));
            }
        }
    }
}

/// Create the effect that owns the region between `start` and `end`.
///
/// A shape mismatch between the strategy and the current value destroys
/// this effect and spawns a replacement over the same region; subscriber
/// state starts clean, so the new strategy tracks exactly what it reads.
fn spawn_binding(
    parent: NodeRef,
    start: NodeRef,
    end: NodeRef,
    getter: ValueGetter,
    kind: BindingKind,
) {
    Effect::new(move |scope| {
        let value = getter.get();
        let shape = BindingKind::of(&value);
        if shape != kind {
            debug!(from = ?kind, to = ?shape, "binding value changed shape; rebinding region");
            scope.destroy();
            spawn_binding(
                Arc::clone(&parent),
                Arc::clone(&start),
                Arc::clone(&end),
                getter.clone(),
                shape,
            );
            return Ok(());
        }
        match kind {
            BindingKind::Text => apply_text(&parent, &start, &end, &value),
            BindingKind::Fragment => {
                if let Value::Fragment(fragment) = &value {
                    // Retained from the previous run: the fragment whose
                    // children currently occupy the region.
                    let occupies_region = matches!(
                        scope.last_value(),
                        Some(Value::Fragment(prev)) if Arc::ptr_eq(prev.root(), fragment.root())
                    );
                    apply_fragment(&parent, &start, &end, fragment, occupies_region);
                    scope.retain(Value::Fragment(fragment.clone()));
                }
            }
            BindingKind::KeyedList => {
                if let Value::List(items) = &value {
                    reconcile_keyed(&parent, &start, &end, items);
                }
            }
        }
        Ok(())
    });
}

fn apply_text(parent: &NodeRef, start: &NodeRef, end: &NodeRef, value: &Value) {
    let text = display_value(value);
    let region = children_between(parent, start, end);
    if region.len() == 1 && region[0].is_text() {
        region[0].set_text_data(&text);
        return;
    }
    for node in region {
        node.detach();
    }
    parent.insert_before(&Node::text(&text), Some(end));
}

fn apply_fragment(
    parent: &NodeRef,
    start: &NodeRef,
    end: &NodeRef,
    fragment: &Fragment,
    occupies_region: bool,
) {
    let incoming = fragment.children();
    if incoming.is_empty() && occupies_region {
        // re-set of the fragment whose children already live between the
        // markers; nothing to move
        return;
    }
    // A different fragment with no children clears the region: its content,
    // if it ever had any, lives elsewhere now.
    for node in children_between(parent, start, end) {
        node.detach();
    }
    for node in incoming {
        parent.insert_before(&node, Some(end));
    }
}

/// The nodes strictly between the `start` and `end` markers. Empty when
/// either marker is no longer a child of `parent`.
pub(crate) fn children_between(parent: &NodeRef, start: &NodeRef, end: &NodeRef) -> Vec<NodeRef> {
    let children = parent.children();
    let Some(s) = children.iter().position(|c| Arc::ptr_eq(c, start)) else {
        return Vec::new();
    };
    let Some(e) = children.iter().position(|c| Arc::ptr_eq(c, end)) else {
        return Vec::new();
    };
    if e <= s + 1 {
        return Vec::new();
    }
    children[s + 1..e].to_vec()
}

fn bind_attributes(ctx: &RenderContext, element: &NodeRef) {
    for (name, raw) in element.attributes() {
        if let Some(digits) = name.strip_prefix(PROPERTY_MARKER_PREFIX) {
            if let Ok(token) = digits.parse::<u64>() {
                bind_property(ctx, element, &name, token, &raw);
                continue;
            }
        }
        let parts = split_parts(&raw);
        let callback_token = parts.iter().find_map(|p| match p {
            Part::Callback(token) => Some(*token),
            _ => None,
        });
        if let Some(token) = callback_token {
            bind_callback(ctx, element, &name, token);
        } else if parts.iter().any(|p| matches!(p, Part::Signal(_))) {
            bind_attribute(ctx, element, &name, parts);
        }
    }
}

/// Event attributes do not get an effect: the closure is registered on the
/// element and the attribute value becomes the dispatch expression hosts
/// evaluate when the event fires.
fn bind_callback(ctx: &RenderContext, element: &NodeRef, name: &str, token: u64) {
    match ctx.callback(token) {
        Some(callback) => {
            element.register_callback(token, callback);
            element.set_attribute(name, &dispatch_expression(token));
        }
        None => {
            error!(
                error = %Error::MissingBinding(token),
                attribute = name,
                "no callback registered for placeholder"
            );
        }
    }
}

/// Recompute `parts` into one string. The bool is true when any signal
/// part resolved to null.
fn compose_parts(ctx: &RenderContext, parts: &Parts) -> (String, bool) {
    let mut text = String::new();
    let mut saw_null = false;
    for part in parts {
        match part {
            Part::Static(literal) => text.push_str(literal),
            Part::Signal(token) => match ctx.signal(*token) {
                Some(getter) => {
                    let value = getter.get();
                    if value.is_null() {
                        saw_null = true;
                    }
                    text.push_str(&value.to_string());
                }
                None => text.push_str(&signal_token_text(*token)),
            },
            Part::Callback(token) => text.push_str(&callback_token_text(*token)),
        }
    }
    (text, saw_null)
}

fn bind_attribute(ctx: &RenderContext, element: &NodeRef, name: &str, parts: Parts) {
    report_unregistered_signals(ctx, &parts, name);
    let ctx = ctx.clone();
    let element = Arc::clone(element);
    let name = name.to_owned();
    Effect::new(move |_scope| {
        let (text, saw_null) = compose_parts(&ctx, &parts);
        // a lone null placeholder means "unset", not the literal string
        if saw_null && text == "null" {
            element.remove_attribute(&name);
        } else {
            element.set_attribute(&name, &text);
        }
        Ok(())
    });
}

fn bind_property(
    ctx: &RenderContext,
    element: &NodeRef,
    marker_name: &str,
    token: u64,
    raw: &str,
) {
    element.remove_attribute(marker_name);
    let Some(property) = ctx.property_name(token) else {
        error!(error = %Error::MissingBinding(token), "no property name registered for marker");
        return;
    };
    let parts = split_parts(raw);

    if let [Part::Signal(signal_token)] = parts.as_slice() {
        // single-signal form keeps the value's type
        let Some(getter) = ctx.signal(*signal_token) else {
            error!(
                error = %Error::MissingBinding(*signal_token),
                property = %property,
                "no signal registered for property binding"
            );
            return;
        };
        let element = Arc::clone(element);
        Effect::new(move |_scope| {
            if !element.has_property(&property) {
                warn!(property = %property, "assigning a property the element does not define");
            }
            element.set_property(&property, getter.get());
            Ok(())
        });
        return;
    }

    if parts.iter().any(|p| matches!(p, Part::Signal(_))) {
        report_unregistered_signals(ctx, &parts, &property);
        let ctx = ctx.clone();
        let element = Arc::clone(element);
        Effect::new(move |_scope| {
            let (text, _) = compose_parts(&ctx, &parts);
            element.set_property(&property, Value::Text(text));
            Ok(())
        });
        return;
    }

    element.set_property(&property, Value::Text(raw.to_owned()));
}

fn report_unregistered_signals(ctx: &RenderContext, parts: &Parts, slot: &str) {
    for part in parts {
        if let Part::Signal(token) = part {
            if ctx.signal(*token).is_none() {
                error!(
                    error = %Error::MissingBinding(*token),
                    slot,
                    "no signal registered for placeholder; keeping it literal"
                );
            }
        }
    }
}

fn signal_token_text(token: u64) -> String {
    format!("{{{{signal:{token}}}}}")
}

fn callback_token_text(token: u64) -> String {
    format!("{{{{callback:{token}}}}}")
}

/// Split a string on `{{signal:N}}` and `{{callback:N}}` tokens.
/// Anything malformed stays literal.
pub(crate) fn split_parts(input: &str) -> Parts {
    let mut parts = Parts::new();
    let mut literal = String::new();
    let mut rest = input;
    while let Some(open) = rest.find("{{") {
        let (before, candidate) = rest.split_at(open);
        let token = parse_token(candidate);
        match token {
            Some((part, consumed)) => {
                literal.push_str(before);
                if !literal.is_empty() {
                    parts.push(Part::Static(std::mem::take(&mut literal)));
                }
                parts.push(part);
                rest = &candidate[consumed..];
            }
            None => {
                literal.push_str(before);
                literal.push_str("{{");
                rest = &candidate[2..];
            }
        }
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        parts.push(Part::Static(literal));
    }
    parts
}

/// Parse a token at the start of `input` (which begins with `{{`).
/// Returns the part and the number of bytes consumed.
fn parse_token(input: &str) -> Option<(Part, usize)> {
    let body = input.strip_prefix("{{")?;
    let (make, digits_on): (fn(u64) -> Part, &str) = if let Some(rest) = body.strip_prefix("signal:") {
        (Part::Signal, rest)
    } else if let Some(rest) = body.strip_prefix("callback:") {
        (Part::Callback, rest)
    } else {
        return None;
    };
    let digit_len = digits_on
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits_on.len());
    if digit_len == 0 || !digits_on[digit_len..].starts_with("}}") {
        return None;
    }
    let token: u64 = digits_on[..digit_len].parse().ok()?;
    let consumed = input.len() - digits_on.len() + digit_len + 2;
    Some((make(token), consumed))
}
