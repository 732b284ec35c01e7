//! Node Tree
//!
//! A small mutable tree standing in for the host environment's DOM. The
//! binding engine only ever touches the explicit dynamic slots it
//! discovered at parse time, so this tree implements exactly the mutation
//! surface those slots need (targeted splices, attribute writes, text
//! rewrites) and nothing resembling whole-tree diffing.
//!
//! # Sharing and identity
//!
//! Nodes are shared through `Arc` (`NodeRef`); identity is pointer
//! identity, which is what keyed reconciliation uses to decide whether a
//! splice is structural or a no-op. Interior state sits behind `RwLock`s so
//! effects can mutate nodes they captured at bind time.
//!
//! # Elements
//!
//! Besides attributes, an element carries two side tables invisible to
//! serialization: a property map (direct property assignment, the
//! `prop:` binding target) and a callback table keyed by placeholder token
//! (the event-dispatch indirection).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use indexmap::IndexMap;

use super::event::{Callback, Event};
use crate::value::Value;

/// Shared handle to a node.
pub type NodeRef = Arc<Node>;

/// Counter for generating unique node IDs.
static NODE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_node_id() -> u64 {
    NODE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Attribute value prefix of the callback dispatch expression.
///
/// Keyed reconciliation must recognize these to avoid copying a stale
/// dispatch expression onto a persisted element.
pub(crate) const DISPATCH_PREFIX: &str = "this.__callbacks.get('";

/// Render the dispatch expression for a callback token.
pub(crate) fn dispatch_expression(token: u64) -> String {
    format!("{DISPATCH_PREFIX}{token}')(event)")
}

/// Extract the callback token from a dispatch expression, if the value is one.
pub(crate) fn dispatch_token(attr_value: &str) -> Option<u64> {
    let rest = attr_value.strip_prefix(DISPATCH_PREFIX)?;
    let end = rest.find('\'')?;
    rest[..end].parse().ok()
}

/// Tag names that never have children and serialize without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub(crate) fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

struct ElementData {
    tag: String,
    attributes: IndexMap<String, String>,
    properties: IndexMap<String, Value>,
    callbacks: IndexMap<u64, Callback>,
}

enum Payload {
    Element(ElementData),
    Text(String),
    Comment(String),
    Fragment,
}

/// A node in the tree: element, text, comment, or fragment root.
pub struct Node {
    id: u64,
    payload: RwLock<Payload>,
    parent: RwLock<Weak<Node>>,
    children: RwLock<Vec<NodeRef>>,
}

impl Node {
    fn new(payload: Payload) -> NodeRef {
        Arc::new(Self {
            id: next_node_id(),
            payload: RwLock::new(payload),
            parent: RwLock::new(Weak::new()),
            children: RwLock::new(Vec::new()),
        })
    }

    /// Create an element node. Tag names are stored lowercased, matching
    /// what the parser produces.
    pub fn element(tag: &str) -> NodeRef {
        Self::new(Payload::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attributes: IndexMap::new(),
            properties: IndexMap::new(),
            callbacks: IndexMap::new(),
        }))
    }

    pub fn text(data: &str) -> NodeRef {
        Self::new(Payload::Text(data.to_owned()))
    }

    pub fn comment(data: &str) -> NodeRef {
        Self::new(Payload::Comment(data.to_owned()))
    }

    pub fn fragment_root() -> NodeRef {
        Self::new(Payload::Fragment)
    }

    /// Unique node id, for diagnostics only. Node identity is `Arc::ptr_eq`.
    pub fn id(&self) -> u64 {
        self.id
    }

    // ---- kind probes -----------------------------------------------------

    pub fn is_element(&self) -> bool {
        matches!(*self.payload.read().expect("payload lock poisoned"), Payload::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(*self.payload.read().expect("payload lock poisoned"), Payload::Text(_))
    }

    pub fn is_comment(&self) -> bool {
        matches!(*self.payload.read().expect("payload lock poisoned"), Payload::Comment(_))
    }

    pub fn is_fragment(&self) -> bool {
        matches!(*self.payload.read().expect("payload lock poisoned"), Payload::Fragment)
    }

    pub fn tag(&self) -> Option<String> {
        match &*self.payload.read().expect("payload lock poisoned") {
            Payload::Element(data) => Some(data.tag.clone()),
            _ => None,
        }
    }

    // ---- text / comment data ---------------------------------------------

    pub fn text_data(&self) -> Option<String> {
        match &*self.payload.read().expect("payload lock poisoned") {
            Payload::Text(data) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn set_text_data(&self, data: &str) {
        if let Payload::Text(existing) = &mut *self.payload.write().expect("payload lock poisoned") {
            *existing = data.to_owned();
        }
    }

    pub fn comment_data(&self) -> Option<String> {
        match &*self.payload.read().expect("payload lock poisoned") {
            Payload::Comment(data) => Some(data.clone()),
            _ => None,
        }
    }

    // ---- attributes ------------------------------------------------------

    pub fn attribute(&self, name: &str) -> Option<String> {
        match &*self.payload.read().expect("payload lock poisoned") {
            Payload::Element(data) => data.attributes.get(name).cloned(),
            _ => None,
        }
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        if let Payload::Element(data) = &mut *self.payload.write().expect("payload lock poisoned") {
            data.attributes.insert(name.to_ascii_lowercase(), value.to_owned());
        }
    }

    pub fn remove_attribute(&self, name: &str) {
        if let Payload::Element(data) = &mut *self.payload.write().expect("payload lock poisoned") {
            data.attributes.shift_remove(name);
        }
    }

    /// Snapshot of the attribute list in insertion order.
    pub fn attributes(&self) -> Vec<(String, String)> {
        match &*self.payload.read().expect("payload lock poisoned") {
            Payload::Element(data) => data
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    // ---- properties ------------------------------------------------------

    pub fn property(&self, name: &str) -> Option<Value> {
        match &*self.payload.read().expect("payload lock poisoned") {
            Payload::Element(data) => data.properties.get(name).cloned(),
            _ => None,
        }
    }

    pub fn has_property(&self, name: &str) -> bool {
        match &*self.payload.read().expect("payload lock poisoned") {
            Payload::Element(data) => data.properties.contains_key(name),
            _ => false,
        }
    }

    /// Assign a property. Returns whether the property already existed.
    pub fn set_property(&self, name: &str, value: Value) -> bool {
        if let Payload::Element(data) = &mut *self.payload.write().expect("payload lock poisoned") {
            data.properties.insert(name.to_owned(), value).is_some()
        } else {
            false
        }
    }

    /// Pre-declare a property so later assignment does not warn.
    pub fn define_property(&self, name: &str) {
        if let Payload::Element(data) = &mut *self.payload.write().expect("payload lock poisoned") {
            data.properties.entry(name.to_owned()).or_insert(Value::Null);
        }
    }

    // ---- callbacks -------------------------------------------------------

    pub fn register_callback(&self, token: u64, callback: Callback) {
        if let Payload::Element(data) = &mut *self.payload.write().expect("payload lock poisoned") {
            data.callbacks.insert(token, callback);
        }
    }

    pub fn callback(&self, token: u64) -> Option<Callback> {
        match &*self.payload.read().expect("payload lock poisoned") {
            Payload::Element(data) => data.callbacks.get(&token).cloned(),
            _ => None,
        }
    }

    /// Fire the callback wired to an event attribute (e.g. `"onclick"`).
    ///
    /// Reads the attribute, extracts the token from the dispatch
    /// expression, and invokes the registered closure. Returns false when
    /// no live callback is wired.
    pub fn trigger(&self, event_attribute: &str, event: &Event) -> bool {
        let Some(attr_value) = self.attribute(event_attribute) else {
            return false;
        };
        let Some(token) = dispatch_token(&attr_value) else {
            return false;
        };
        match self.callback(token) {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }

    // ---- tree structure --------------------------------------------------

    pub fn parent(&self) -> Option<NodeRef> {
        self.parent.read().expect("parent lock poisoned").upgrade()
    }

    /// Snapshot of the children.
    pub fn children(&self) -> Vec<NodeRef> {
        self.children.read().expect("children lock poisoned").clone()
    }

    pub fn child_count(&self) -> usize {
        self.children.read().expect("children lock poisoned").len()
    }

    pub fn first_element_child(&self) -> Option<NodeRef> {
        self.children
            .read()
            .expect("children lock poisoned")
            .iter()
            .find(|c| c.is_element())
            .cloned()
    }

    pub fn element_children(&self) -> Vec<NodeRef> {
        self.children
            .read()
            .expect("children lock poisoned")
            .iter()
            .filter(|c| c.is_element())
            .cloned()
            .collect()
    }

    fn index_of(&self, child: &NodeRef) -> Option<usize> {
        self.children
            .read()
            .expect("children lock poisoned")
            .iter()
            .position(|c| Arc::ptr_eq(c, child))
    }

    /// The sibling immediately after `child`, if any.
    pub fn next_sibling_of(&self, child: &NodeRef) -> Option<NodeRef> {
        let children = self.children.read().expect("children lock poisoned");
        let idx = children.iter().position(|c| Arc::ptr_eq(c, child))?;
        children.get(idx + 1).cloned()
    }

    /// Append a child, detaching it from any previous parent. Appending a
    /// fragment root moves the fragment's children, like the DOM.
    pub fn append_child(self: &Arc<Self>, child: &NodeRef) {
        self.insert_before(child, None);
    }

    /// Insert `child` before `anchor` (or append when `anchor` is `None`).
    ///
    /// Fragment roots are flattened: their children move in, the root
    /// itself never enters the tree.
    pub fn insert_before(self: &Arc<Self>, child: &NodeRef, anchor: Option<&NodeRef>) {
        if child.is_fragment() {
            for grandchild in child.take_children() {
                self.insert_before(&grandchild, anchor);
            }
            return;
        }
        child.detach();
        let index = match anchor {
            Some(anchor) => self.index_of(anchor),
            None => None,
        };
        {
            let mut children = self.children.write().expect("children lock poisoned");
            match index {
                Some(i) => children.insert(i, Arc::clone(child)),
                None => children.push(Arc::clone(child)),
            }
        }
        *child.parent.write().expect("parent lock poisoned") = Arc::downgrade(self);
    }

    /// Remove this node from its parent, if attached.
    pub fn detach(self: &Arc<Self>) {
        let Some(parent) = self.parent() else {
            return;
        };
        {
            let mut children = parent.children.write().expect("children lock poisoned");
            children.retain(|c| !Arc::ptr_eq(c, self));
        }
        *self.parent.write().expect("parent lock poisoned") = Weak::new();
    }

    /// Replace this node in its parent with the given nodes.
    pub fn replace_with(self: &Arc<Self>, replacements: &[NodeRef]) {
        let Some(parent) = self.parent() else {
            return;
        };
        let anchor = parent.next_sibling_of(self);
        self.detach();
        for node in replacements {
            parent.insert_before(node, anchor.as_ref());
        }
    }

    /// Drop all current children and adopt the given ones.
    pub fn replace_children(self: &Arc<Self>, new_children: Vec<NodeRef>) {
        for child in self.take_children() {
            *child.parent.write().expect("parent lock poisoned") = Weak::new();
        }
        for child in new_children {
            self.append_child(&child);
        }
    }

    /// Detach and return all children.
    pub fn take_children(self: &Arc<Self>) -> Vec<NodeRef> {
        let children = {
            let mut guard = self.children.write().expect("children lock poisoned");
            std::mem::take(&mut *guard)
        };
        for child in &children {
            *child.parent.write().expect("parent lock poisoned") = Weak::new();
        }
        children
    }

    /// Deep copy of this node and its subtree. Callback closures are shared
    /// (cloned by handle), properties and attributes are copied.
    pub fn deep_clone(&self) -> NodeRef {
        let payload = match &*self.payload.read().expect("payload lock poisoned") {
            Payload::Element(data) => Payload::Element(ElementData {
                tag: data.tag.clone(),
                attributes: data.attributes.clone(),
                properties: data.properties.clone(),
                callbacks: data.callbacks.clone(),
            }),
            Payload::Text(data) => Payload::Text(data.clone()),
            Payload::Comment(data) => Payload::Comment(data.clone()),
            Payload::Fragment => Payload::Fragment,
        };
        let clone = Self::new(payload);
        for child in self.children() {
            clone.append_child(&child.deep_clone());
        }
        clone
    }

    // ---- serialization ---------------------------------------------------

    /// Serialize the subtree to markup. Fragment roots serialize their
    /// children only.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match &*self.payload.read().expect("payload lock poisoned") {
            Payload::Text(data) => out.push_str(&escape_text(data)),
            Payload::Comment(data) => {
                out.push_str("<!--");
                out.push_str(data);
                out.push_str("-->");
            }
            Payload::Element(data) => {
                out.push('<');
                out.push_str(&data.tag);
                for (name, value) in &data.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if is_void_element(&data.tag) {
                    return;
                }
                let tag = data.tag.clone();
                write_children(self, out);
                out.push_str("</");
                out.push_str(&tag);
                out.push('>');
            }
            Payload::Fragment => write_children(self, out),
        }
    }
}

// Child serialization goes through a snapshot so recursion never holds the
// payload lock of an ancestor.
fn write_children(node: &Node, out: &mut String) {
    for child in node.children() {
        child.write_html(out);
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;")
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &*self.payload.read().expect("payload lock poisoned") {
            Payload::Element(data) => format!("Element(<{}>)", data.tag),
            Payload::Text(data) => format!("Text({data:?})"),
            Payload::Comment(data) => format!("Comment({data:?})"),
            Payload::Fragment => "Fragment".to_owned(),
        };
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &kind)
            .field("children", &self.child_count())
            .finish()
    }
}

/// A detached tree root: what a client-mode template invocation returns.
///
/// Cloning a `Fragment` clones the handle; the underlying tree is shared.
/// Use [`Fragment::deep_clone`] for an independent copy.
#[derive(Clone)]
pub struct Fragment {
    root: NodeRef,
}

impl Fragment {
    pub fn new() -> Self {
        Self { root: Node::fragment_root() }
    }

    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    pub fn children(&self) -> Vec<NodeRef> {
        self.root.children()
    }

    pub fn first_element_child(&self) -> Option<NodeRef> {
        self.root.first_element_child()
    }

    pub fn to_html(&self) -> String {
        self.root.to_html()
    }

    pub fn deep_clone(&self) -> Fragment {
        Fragment { root: self.root.deep_clone() }
    }
}

impl Default for Fragment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fragment")
            .field("children", &self.root.child_count())
            .finish()
    }
}
