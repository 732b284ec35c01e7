//! Keyed List Reconciliation
//!
//! A list-valued binding keeps the region between its markers in sync by
//! key, not by position: items whose `key` attribute matches an element
//! already in the region keep that element (preserving node identity and
//! wired callbacks) and only take updated attributes and children from
//! the incoming render. Items without a match enter fresh; elements whose
//! key disappeared leave.
//!
//! When the reconciled sequence is node-for-node identical to what is
//! already in the region, nothing structural happens at all.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{error, warn};

use crate::dom::{dispatch_token, Node, NodeRef};
use crate::error::Error;
use crate::template::display_value;
use crate::value::Value;

use super::engine::children_between;

/// Reconcile the region between `start` and `end` against `items`.
pub(crate) fn reconcile_keyed(parent: &NodeRef, start: &NodeRef, end: &NodeRef, items: &[Value]) {
    let current = children_between(parent, start, end);
    let existing: IndexMap<String, NodeRef> = current
        .iter()
        .filter(|node| node.is_element())
        .filter_map(|node| node.attribute("key").map(|key| (key, Arc::clone(node))))
        .collect();

    let mut desired: Vec<NodeRef> = Vec::new();
    let mut seen_keys: HashSet<String> = HashSet::new();
    let mut position = 0usize;
    collect_items(items, &existing, &mut seen_keys, &mut position, &mut desired);

    let unchanged = current.len() == desired.len()
        && current.iter().zip(&desired).all(|(a, b)| Arc::ptr_eq(a, b));
    if unchanged {
        return;
    }

    for node in current {
        node.detach();
    }
    for node in &desired {
        parent.insert_before(node, Some(end));
    }
}

fn collect_items(
    items: &[Value],
    existing: &IndexMap<String, NodeRef>,
    seen_keys: &mut HashSet<String>,
    position: &mut usize,
    desired: &mut Vec<NodeRef>,
) {
    for item in items {
        match item {
            Value::List(nested) => collect_items(nested, existing, seen_keys, position, desired),
            Value::Fragment(fragment) => {
                collect_fragment_item(fragment, existing, seen_keys, *position, desired);
            }
            Value::Null => {}
            Value::Data(data) => {
                error!(
                    error = %Error::InvalidValue,
                    %data,
                    "plain data cannot be rendered as a list item; skipping"
                );
            }
            scalar => desired.push(Node::text(&display_value(scalar))),
        }
        *position += 1;
    }
}

fn collect_fragment_item(
    fragment: &crate::dom::Fragment,
    existing: &IndexMap<String, NodeRef>,
    seen_keys: &mut HashSet<String>,
    position: usize,
    desired: &mut Vec<NodeRef>,
) {
    if fragment.root().element_children().len() > 1 {
        error!(
            error = %Error::ShapeMismatch(
                "list items must have exactly one top-level element".into()
            ),
            "extra top-level elements in a list item are ignored"
        );
    }
    let Some(element) = fragment.first_element_child() else {
        // text-only item, nothing to key on
        for child in fragment.children() {
            desired.push(child);
        }
        return;
    };

    let key = match element.attribute("key") {
        Some(key) => key,
        None => {
            warn!(position, "list item has no key attribute; falling back to its position");
            let key = position.to_string();
            element.set_attribute("key", &key);
            key
        }
    };
    if !seen_keys.insert(key.clone()) {
        warn!(key = %key, "duplicate key in list; item identity is unreliable");
    }

    match existing.get(&key) {
        Some(persisted) => {
            copy_attributes(persisted, &element);
            persisted.replace_children(element.take_children());
            desired.push(Arc::clone(persisted));
        }
        None => desired.push(element),
    }
}

/// Copy attributes from the incoming element onto the persisted one,
/// skipping dispatch expressions so the persisted element keeps the
/// callbacks that are actually registered on it.
fn copy_attributes(persisted: &NodeRef, incoming: &NodeRef) {
    for (name, value) in incoming.attributes() {
        if dispatch_token(&value).is_some() {
            continue;
        }
        persisted.set_attribute(&name, &value);
    }
}
