//! Style Compiler
//!
//! Styles go through the same literal/dynamic alternation as markup, but
//! the client-mode output is not a node tree: it is a [`StyleSheet`]
//! whose text an effect keeps current. Any interpolated signal change
//! recomputes the whole sheet; there is no per-rule granularity.

use tracing::error;

use crate::error::Error;
use crate::reactive::{untrack, Effect};
use crate::value::Value;

use super::context::{RenderContext, ValueGetter};
use super::markup::{display_value, Dynamic};

/// Output of [`css`]: fixed text on the server, a live sheet on the
/// client.
#[derive(Debug, Clone)]
pub enum Styles {
    Text(String),
    Sheet(StyleSheet),
}

impl Styles {
    /// Current stylesheet text, regardless of mode.
    pub fn text(&self) -> String {
        match self {
            Styles::Text(text) => text.clone(),
            Styles::Sheet(sheet) => sheet.text(),
        }
    }
}

impl std::fmt::Display for Styles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text())
    }
}

/// A stylesheet whose text tracks its interpolated signals. Hosts read
/// [`text`](StyleSheet::text) after any signal change, or poll it when
/// adopting the sheet into a document.
#[derive(Clone)]
pub struct StyleSheet {
    text: std::sync::Arc<std::sync::RwLock<String>>,
}

impl StyleSheet {
    fn new() -> Self {
        Self { text: std::sync::Arc::new(std::sync::RwLock::new(String::new())) }
    }

    pub fn text(&self) -> String {
        self.text.read().expect("stylesheet lock poisoned").clone()
    }

    fn set_text(&self, text: String) {
        *self.text.write().expect("stylesheet lock poisoned") = text;
    }
}

impl std::fmt::Debug for StyleSheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleSheet").field("text", &self.text()).finish()
    }
}

enum Segment {
    Static(String),
    Getter(ValueGetter),
}

/// Compile a stylesheet template. Server mode resolves every value once;
/// client mode returns a sheet recomputed whenever a signal segment
/// changes.
pub fn css(ctx: &RenderContext, strings: &[&str], values: Vec<Dynamic>) -> Styles {
    let mut segments: Vec<Segment> = Vec::with_capacity(strings.len() + values.len());
    let mut dynamics = values.into_iter();
    for literal in strings {
        segments.push(Segment::Static((*literal).to_owned()));
        if let Some(value) = dynamics.next() {
            segments.push(style_segment(value));
        }
    }
    for value in dynamics {
        segments.push(style_segment(value));
    }

    if ctx.is_server() {
        let text = untrack(|| compose(&segments));
        return Styles::Text(text);
    }

    let sheet = StyleSheet::new();
    let effect_sheet = sheet.clone();
    Effect::new(move |_scope| {
        effect_sheet.set_text(compose(&segments));
        Ok(())
    });
    Styles::Sheet(sheet)
}

fn style_segment(value: Dynamic) -> Segment {
    match value {
        Dynamic::Getter(getter) => Segment::Getter(getter),
        Dynamic::Value(value @ (Value::Data(_) | Value::Fragment(_) | Value::List(_))) => {
            error!(error = %Error::InvalidValue, ?value, "value cannot be interpolated into styles; dropping");
            Segment::Static(String::new())
        }
        Dynamic::Value(value) => Segment::Static(display_value(&value)),
        Dynamic::Callback(_) | Dynamic::Nested(_) | Dynamic::List(_) => {
            error!(
                error = %Error::InvalidValue,
                "only signals and plain values can be interpolated into styles; dropping"
            );
            Segment::Static(String::new())
        }
    }
}

fn compose(segments: &[Segment]) -> String {
    let mut text = String::new();
    for segment in segments {
        match segment {
            Segment::Static(literal) => text.push_str(literal),
            Segment::Getter(getter) => text.push_str(&display_value(&getter.get())),
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::create_signal;

    #[test]
    fn server_styles_resolve_once() {
        let ctx = RenderContext::server();
        let (color, set_color) = create_signal("red".to_owned());
        let styles = css(
            &ctx,
            &["p { color: ", "; }"],
            vec![Dynamic::from(color)],
        );
        assert_eq!(styles.text(), "p { color: red; }");

        // server output is a snapshot
        set_color.set("blue".to_owned());
        assert_eq!(styles.text(), "p { color: red; }");
    }

    #[test]
    fn client_sheet_tracks_signal_changes() {
        let ctx = RenderContext::client();
        let (size, set_size) = create_signal(12);
        let styles = css(
            &ctx,
            &["h1 { font-size: ", "px; }"],
            vec![Dynamic::from(size)],
        );
        assert_eq!(styles.text(), "h1 { font-size: 12px; }");

        set_size.set(20);
        assert_eq!(styles.text(), "h1 { font-size: 20px; }");
    }

    #[test]
    fn whole_sheet_recomputes_together() {
        let ctx = RenderContext::client();
        let (a, set_a) = create_signal(1);
        let (b, _set_b) = create_signal(2);
        let styles = css(
            &ctx,
            &[".a { z-index: ", "; } .b { z-index: ", "; }"],
            vec![Dynamic::from(a), Dynamic::from(b)],
        );
        assert_eq!(styles.text(), ".a { z-index: 1; } .b { z-index: 2; }");

        set_a.set(9);
        assert_eq!(styles.text(), ".a { z-index: 9; } .b { z-index: 2; }");
    }

    #[test]
    fn invalid_segments_are_dropped() {
        let ctx = RenderContext::server();
        let styles = css(
            &ctx,
            &["p { ", " }"],
            vec![Dynamic::callback(|_event| {})],
        );
        assert_eq!(styles.text(), "p {  }");
    }
}
