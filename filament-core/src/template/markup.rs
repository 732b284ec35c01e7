//! Template Compiler
//!
//! Compiles a template (alternating literal markup segments and dynamic
//! values) into either a finished string (server mode) or a live,
//! bound fragment (client mode). The intermediate form in both modes is a
//! single markup string; the modes differ only in how dynamic values are
//! spliced into it:
//!
//! * server: resolve every value to text now, outside any tracking
//!   context, and return the concatenation;
//! * client: replace each value with a placeholder token
//!   (`{{signal:N}}`, `{{callback:N}}`, a fragment carrier element, a
//!   property marker attribute), parse the string, and hand the tree to
//!   the binding engine.
//!
//! Interpolated values are spliced into the markup verbatim. Templates
//! are trusted input; this is not an escaping layer.

use tracing::error;

use crate::bind::bind;
use crate::dom::{parse_fragment, Callback, Event, Fragment};
use crate::error::Error;
use crate::reactive::{untrack, ReadSignal, Signal, SignalValue};
use crate::value::Value;

use super::context::{RenderContext, ValueGetter};

/// Attribute naming the fragment-table entry a carrier element stands
/// in for. Carriers survive the markup round trip because they are real
/// elements, unlike text tokens.
pub(crate) const FRAGMENT_CARRIER_ATTR: &str = "data-fragment-id";

/// Attribute-name prefix marking a rewritten `prop:` binding.
pub(crate) const PROPERTY_MARKER_PREFIX: &str = "data-prop-";

/// Output of [`html`]: a plain string on the server, a bound fragment on
/// the client.
#[derive(Debug, Clone)]
pub enum Rendered {
    Markup(String),
    Fragment(Fragment),
}

impl Rendered {
    /// Serialized form, regardless of mode.
    pub fn to_html(&self) -> String {
        match self {
            Rendered::Markup(markup) => markup.clone(),
            Rendered::Fragment(fragment) => fragment.to_html(),
        }
    }

    pub fn fragment(&self) -> Option<&Fragment> {
        match self {
            Rendered::Markup(_) => None,
            Rendered::Fragment(fragment) => Some(fragment),
        }
    }

    pub fn into_fragment(self) -> Option<Fragment> {
        match self {
            Rendered::Markup(_) => None,
            Rendered::Fragment(fragment) => Some(fragment),
        }
    }
}

impl std::fmt::Display for Rendered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_html())
    }
}

/// A dynamic template value: everything the `{...}` slots of [`html!`]
/// accept.
///
/// [`html!`]: crate::html!
pub enum Dynamic {
    /// A reactive read; stays live in client mode.
    Getter(ValueGetter),
    /// An event callback.
    Callback(Callback),
    /// A nested [`html`] result.
    Nested(Rendered),
    /// A list of dynamics, spliced in order.
    List(Vec<Dynamic>),
    /// A plain value, resolved once.
    Value(Value),
}

impl Dynamic {
    /// Wrap a closure as a reactive read.
    pub fn getter<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Dynamic::Getter(ValueGetter::new(f))
    }

    /// Wrap a closure as an event callback.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        Dynamic::Callback(crate::dom::callback(f))
    }
}

impl std::fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dynamic::Getter(getter) => f.debug_tuple("Getter").field(getter).finish(),
            Dynamic::Callback(_) => f.write_str("Callback(..)"),
            Dynamic::Nested(rendered) => f.debug_tuple("Nested").field(rendered).finish(),
            Dynamic::List(items) => f.debug_tuple("List").field(items).finish(),
            Dynamic::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

impl From<ValueGetter> for Dynamic {
    fn from(getter: ValueGetter) -> Self {
        Dynamic::Getter(getter)
    }
}

impl<T> From<ReadSignal<T>> for Dynamic
where
    T: SignalValue + Into<Value>,
{
    fn from(signal: ReadSignal<T>) -> Self {
        Dynamic::Getter(signal.into())
    }
}

impl<T> From<Signal<T>> for Dynamic
where
    T: SignalValue + Into<Value>,
{
    fn from(signal: Signal<T>) -> Self {
        Dynamic::Getter(signal.split().0.into())
    }
}

impl From<Callback> for Dynamic {
    fn from(callback: Callback) -> Self {
        Dynamic::Callback(callback)
    }
}

impl From<Rendered> for Dynamic {
    fn from(rendered: Rendered) -> Self {
        Dynamic::Nested(rendered)
    }
}

impl From<Fragment> for Dynamic {
    fn from(fragment: Fragment) -> Self {
        Dynamic::Value(Value::Fragment(fragment))
    }
}

impl From<Vec<Dynamic>> for Dynamic {
    fn from(items: Vec<Dynamic>) -> Self {
        Dynamic::List(items)
    }
}

impl From<Value> for Dynamic {
    fn from(value: Value) -> Self {
        Dynamic::Value(value)
    }
}

macro_rules! dynamic_from_scalar {
    ($($ty:ty),+) => {
        $(impl From<$ty> for Dynamic {
            fn from(value: $ty) -> Self {
                Dynamic::Value(value.into())
            }
        })+
    };
}

dynamic_from_scalar!(bool, i32, i64, f64, &str, String);

/// Compile a template against a render context.
///
/// `strings` and `values` alternate: literal, value, literal, value...
/// A missing trailing literal is fine; extra values are appended.
pub fn html(ctx: &RenderContext, strings: &[&str], values: Vec<Dynamic>) -> Rendered {
    let mut markup = String::new();
    let mut dynamics = values.into_iter();
    for segment in strings {
        markup.push_str(segment);
        if let Some(value) = dynamics.next() {
            markup.push_str(&placeholder(ctx, value));
        }
    }
    for value in dynamics {
        markup.push_str(&placeholder(ctx, value));
    }

    if ctx.is_server() {
        return Rendered::Markup(markup);
    }

    let markup = rewrite_property_markers(ctx, &markup);
    let fragment = parse_fragment(&markup);
    bind(ctx, &fragment);
    Rendered::Fragment(fragment)
}

/// The text a dynamic value contributes to the intermediate markup.
fn placeholder(ctx: &RenderContext, value: Dynamic) -> String {
    match value {
        Dynamic::Getter(getter) => {
            if ctx.is_server() {
                // resolve now; never subscribe a surrounding effect
                untrack(|| display_value(&getter.get()))
            } else {
                format!("{{{{signal:{}}}}}", ctx.register_signal(getter))
            }
        }
        Dynamic::Callback(callback) => {
            if ctx.is_server() {
                // callbacks have no server representation
                String::new()
            } else {
                format!("{{{{callback:{}}}}}", ctx.register_callback(callback))
            }
        }
        Dynamic::Nested(Rendered::Markup(markup)) => markup,
        Dynamic::Nested(Rendered::Fragment(fragment)) => fragment_placeholder(ctx, fragment),
        Dynamic::List(items) => items
            .into_iter()
            .map(|item| placeholder(ctx, item))
            .collect(),
        Dynamic::Value(Value::Fragment(fragment)) => fragment_placeholder(ctx, fragment),
        Dynamic::Value(value) => display_value(&value),
    }
}

/// Nested fragments cannot ride through the markup string without losing
/// their live bindings, so client mode parks them in the context table and
/// splices a carrier element the binding engine swaps out.
fn fragment_placeholder(ctx: &RenderContext, fragment: Fragment) -> String {
    if ctx.is_server() {
        fragment.to_html()
    } else {
        format!(
            "<template {}=\"{}\"></template>",
            FRAGMENT_CARRIER_ATTR,
            ctx.register_fragment(fragment)
        )
    }
}

/// Text form of a resolved value. Null renders as nothing; plain data has
/// no direct text form and is dropped with an error.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Data(data) => {
            error!(
                error = %Error::InvalidValue,
                %data,
                "plain data values cannot be rendered directly; wrap fields in signals or format to text"
            );
            String::new()
        }
        Value::List(items) => items.iter().map(display_value).collect(),
        Value::Fragment(fragment) => fragment.to_html(),
        other => other.to_string(),
    }
}

/// Rewrite `prop:name=` attribute positions to `data-prop-<token>=`
/// before parsing, recording `token → name` in the context. Markup
/// parsers lowercase attribute names; the table preserves the property
/// name's original case.
fn rewrite_property_markers(ctx: &RenderContext, markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut rest = markup;
    while let Some(pos) = rest.find("prop:") {
        let preceded_by_space = pos > 0 && rest.as_bytes()[pos - 1].is_ascii_whitespace();
        let after = &rest[pos + 5..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(after.len());
        if preceded_by_space && name_len > 0 && after[name_len..].starts_with('=') {
            let token = ctx.register_property(&after[..name_len]);
            out.push_str(&rest[..pos]);
            out.push_str(PROPERTY_MARKER_PREFIX);
            out.push_str(&token.to_string());
            rest = &after[name_len..];
        } else {
            out.push_str(&rest[..pos + 5]);
            rest = after;
        }
    }
    out.push_str(rest);
    out
}
