//! Templates
//!
//! The template layer turns markup-with-holes into output. A template is
//! literal segments alternating with dynamic values; the [`html!`] and
//! [`css!`] macros are the front door, [`html`] and [`css`] the
//! functions behind them.
//!
//! ```rust,ignore
//! let ctx = RenderContext::client();
//! let (count, set_count) = create_signal(0);
//! let view = html!(&ctx,
//!     "<button onclick=\"" { callback(move |_| set_count.update(|n| n + 1)) } "\">"
//!         { count }
//!     "</button>"
//! );
//! ```
//!
//! Every compilation runs against a [`RenderContext`], which owns the
//! placeholder tables and decides the mode: server contexts produce
//! strings, client contexts produce bound fragments.

mod context;
mod markup;
mod style;

pub use context::{Mode, RenderContext, ValueGetter};
pub use markup::{html, Dynamic, Rendered};
pub use style::{css, StyleSheet, Styles};

pub(crate) use markup::{display_value, FRAGMENT_CARRIER_ATTR, PROPERTY_MARKER_PREFIX};

/// Compile a markup template: string literals for static parts, `{ expr }`
/// for dynamic ones. Expressions go through [`Dynamic::from`], so signals,
/// callbacks, nested renders, lists, and plain values all work.
#[macro_export]
macro_rules! html {
    ($ctx:expr $(,)?) => {
        $crate::template::html($ctx, &[], ::std::vec::Vec::new())
    };
    ($ctx:expr, $($rest:tt)+) => {{
        let mut strings: ::std::vec::Vec<&str> = ::std::vec::Vec::new();
        let mut values: ::std::vec::Vec<$crate::template::Dynamic> = ::std::vec::Vec::new();
        $crate::__template_parts!(strings, values $($rest)+);
        $crate::template::html($ctx, &strings, values)
    }};
}

/// Compile a stylesheet template. Same shape as [`html!`]; only signals
/// and plain values are valid in the dynamic slots.
#[macro_export]
macro_rules! css {
    ($ctx:expr $(,)?) => {
        $crate::template::css($ctx, &[], ::std::vec::Vec::new())
    };
    ($ctx:expr, $($rest:tt)+) => {{
        let mut strings: ::std::vec::Vec<&str> = ::std::vec::Vec::new();
        let mut values: ::std::vec::Vec<$crate::template::Dynamic> = ::std::vec::Vec::new();
        $crate::__template_parts!(strings, values $($rest)+);
        $crate::template::css($ctx, &strings, values)
    }};
}

/// Collects template parts into the alternating segment/value vectors the
/// compiler expects, padding with empty literals so segment `i` always
/// precedes value `i`.
#[doc(hidden)]
#[macro_export]
macro_rules! __template_parts {
    ($strings:ident, $values:ident) => {};
    ($strings:ident, $values:ident $literal:literal $($rest:tt)*) => {
        $strings.push($literal);
        $crate::__template_parts!($strings, $values $($rest)*);
    };
    ($strings:ident, $values:ident { $value:expr } $($rest:tt)*) => {
        if $strings.len() == $values.len() {
            $strings.push("");
        }
        $values.push($crate::template::Dynamic::from($value));
        $crate::__template_parts!($strings, $values $($rest)*);
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::create_signal;

    #[test]
    fn macro_alternates_literals_and_values() {
        let ctx = RenderContext::server();
        let (count, _set) = create_signal(7);
        let out = html!(&ctx, "<p>" { count } "</p>");
        assert_eq!(out.to_html(), "<p>7</p>");
    }

    #[test]
    fn macro_handles_adjacent_values() {
        let ctx = RenderContext::server();
        let out = html!(&ctx, "<p>" { "a" } { "b" } "</p>");
        assert_eq!(out.to_html(), "<p>ab</p>");
    }

    #[test]
    fn macro_handles_leading_value() {
        let ctx = RenderContext::server();
        let out = html!(&ctx, { "x" } "<br>");
        assert_eq!(out.to_html(), "x<br>");
    }

    #[test]
    fn css_macro_compiles() {
        let ctx = RenderContext::server();
        let (width, _set) = create_signal(3);
        let styles = css!(&ctx, "div { border-width: " { width } "px; }");
        assert_eq!(styles.text(), "div { border-width: 3px; }");
    }
}
