//! Integration Tests for the Template Runtime
//!
//! These tests verify that the compiler, binding engine, and reactive
//! system work together: templates render in both modes, client-mode
//! regions follow their signals, and list bindings reconcile by key.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use filament_core::dom::{callback, parse_fragment, Event, NodeRef};
use filament_core::reactive::{batch, create_signal, derived};
use filament_core::template::{Dynamic, RenderContext};
use filament_core::{css, html, Value};

/// Strip comment markers so client output can be compared with server
/// output.
fn visible(markup: &str) -> String {
    let mut out = String::new();
    let mut rest = markup;
    while let Some(open) = rest.find("<!--") {
        out.push_str(&rest[..open]);
        match rest[open..].find("-->") {
            Some(close) => rest = &rest[open + close + 3..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

#[test]
fn server_and_client_render_the_same_visible_markup() {
    let (count, _set_count) = create_signal(7);

    let server = html!(&RenderContext::server(), "<p>count: " { count.clone() } "</p>");
    let client = html!(&RenderContext::client(), "<p>count: " { count } "</p>");

    assert_eq!(server.to_html(), "<p>count: 7</p>");
    assert_eq!(visible(&client.to_html()), "<p>count: 7</p>");
}

#[test]
fn text_region_follows_its_signal() {
    let ctx = RenderContext::client();
    let (count, set_count) = create_signal(0);
    let view = html!(&ctx, "<p>" { count } "</p>");

    assert_eq!(visible(&view.to_html()), "<p>0</p>");

    set_count.set(5);
    assert_eq!(visible(&view.to_html()), "<p>5</p>");

    set_count.update(|n| n + 1);
    assert_eq!(visible(&view.to_html()), "<p>6</p>");
}

#[test]
fn text_region_is_bounded_by_comment_markers() {
    let ctx = RenderContext::client();
    let (count, _set_count) = create_signal(1);
    let view = html!(&ctx, "<p>" { count } "</p>");

    let markup = view.to_html();
    assert!(markup.contains("<!--signal:"));
    assert!(markup.contains("<!--/signal:"));
}

#[test]
fn null_renders_as_nothing_in_text() {
    let ctx = RenderContext::client();
    let (value, set_value) = create_signal(Value::Text("shown".into()));
    let view = html!(&ctx, "<p>" { value } "</p>");

    assert_eq!(visible(&view.to_html()), "<p>shown</p>");

    set_value.set(Value::Null);
    assert_eq!(visible(&view.to_html()), "<p></p>");
}

#[test]
fn attribute_follows_its_signal_and_null_unsets() {
    let ctx = RenderContext::client();
    let (class, set_class) = create_signal(Value::Text("cold".into()));
    let view = html!(&ctx, "<div class=\"" { class } "\"></div>");
    let div = view.fragment().unwrap().first_element_child().unwrap();

    assert_eq!(div.attribute("class").as_deref(), Some("cold"));

    set_class.set(Value::Text("hot".into()));
    assert_eq!(div.attribute("class").as_deref(), Some("hot"));

    set_class.set(Value::Null);
    assert_eq!(div.attribute("class"), None);

    set_class.set(Value::Text("back".into()));
    assert_eq!(div.attribute("class").as_deref(), Some("back"));
}

#[test]
fn mixed_attribute_keeps_static_parts() {
    let ctx = RenderContext::client();
    let (state, set_state) = create_signal("open".to_owned());
    let view = html!(&ctx, "<div class=\"panel " { state } "\"></div>");
    let div = view.fragment().unwrap().first_element_child().unwrap();

    assert_eq!(div.attribute("class").as_deref(), Some("panel open"));

    set_state.set("closed".to_owned());
    assert_eq!(div.attribute("class").as_deref(), Some("panel closed"));
}

#[test]
fn callbacks_dispatch_through_the_element() {
    let ctx = RenderContext::client();
    let clicks = Arc::new(AtomicI32::new(0));
    let clicks_clone = clicks.clone();
    let on_click = callback(move |_event: &Event| {
        clicks_clone.fetch_add(1, Ordering::SeqCst);
    });

    let view = html!(&ctx, "<button onclick=\"" { on_click } "\">go</button>");
    let button = view.fragment().unwrap().first_element_child().unwrap();

    let attr = button.attribute("onclick").unwrap();
    assert!(attr.starts_with("this.__callbacks.get('"));

    assert!(button.trigger("onclick", &Event::new("click")));
    assert!(button.trigger("onclick", &Event::new("click")));
    assert_eq!(clicks.load(Ordering::SeqCst), 2);
}

#[test]
fn callback_driving_a_signal_updates_the_view() {
    let ctx = RenderContext::client();
    let (count, set_count) = create_signal(0);
    let on_click = callback(move |_event: &Event| set_count.update(|n| n + 1));

    let view = html!(&ctx,
        "<button onclick=\"" { on_click } "\">clicks: " { count } "</button>"
    );
    let button = view.fragment().unwrap().first_element_child().unwrap();

    button.trigger("onclick", &Event::new("click"));
    button.trigger("onclick", &Event::new("click"));
    button.trigger("onclick", &Event::new("click"));
    assert!(visible(&view.to_html()).contains("clicks: 3"));
}

#[test]
fn nested_templates_stay_live() {
    let ctx = RenderContext::client();
    let (name, set_name) = create_signal("ada".to_owned());

    let inner = html!(&ctx, "<em>" { name } "</em>");
    let view = html!(&ctx, "<p>hello " { inner } "</p>");

    assert_eq!(visible(&view.to_html()), "<p>hello <em>ada</em></p>");

    set_name.set("grace".to_owned());
    assert_eq!(visible(&view.to_html()), "<p>hello <em>grace</em></p>");
}

#[test]
fn binding_changes_strategy_when_the_value_changes_shape() {
    let ctx = RenderContext::client();
    let (content, set_content) = create_signal(Value::Text("plain".into()));
    let view = html!(&ctx, "<div>" { content } "</div>");

    assert_eq!(visible(&view.to_html()), "<div>plain</div>");

    set_content.set(Value::Fragment(parse_fragment("<b>bold</b>")));
    assert_eq!(visible(&view.to_html()), "<div><b>bold</b></div>");

    set_content.set(Value::Text("plain again".into()));
    assert_eq!(visible(&view.to_html()), "<div>plain again</div>");
}

#[test]
fn fragment_region_does_not_keep_a_replaced_fragments_content() {
    let ctx = RenderContext::client();
    let first = parse_fragment("<i>first</i>");
    let second = parse_fragment("<i>second</i>");
    let (content, set_content) = create_signal(Value::Fragment(first.clone()));
    let view = html!(&ctx, "<div>" { content } "</div>");

    assert_eq!(visible(&view.to_html()), "<div><i>first</i></div>");

    set_content.set(Value::Fragment(second.clone()));
    assert_eq!(visible(&view.to_html()), "<div><i>second</i></div>");

    // Re-setting the fragment already in the region is a no-op.
    set_content.set(Value::Fragment(second));
    assert_eq!(visible(&view.to_html()), "<div><i>second</i></div>");

    // The first fragment was consumed when it was spliced in, so setting
    // it again renders its current (empty) children, not the second
    // fragment's leftovers.
    set_content.set(Value::Fragment(first));
    assert_eq!(visible(&view.to_html()), "<div></div>");
}

fn rows_to_items(rows: &[String]) -> Value {
    Value::List(
        rows.iter()
            .map(|row| {
                Value::Fragment(parse_fragment(&format!("<li key=\"{row}\">{row}</li>")))
            })
            .collect(),
    )
}

#[test]
fn keyed_list_follows_its_signal() {
    let ctx = RenderContext::client();
    let (rows, set_rows) = create_signal(vec!["a".to_owned(), "b".to_owned()]);
    let items = Dynamic::getter(move || rows_to_items(&rows.get()));
    let view = html!(&ctx, "<ul>" { items } "</ul>");

    assert_eq!(
        visible(&view.to_html()),
        "<ul><li key=\"a\">a</li><li key=\"b\">b</li></ul>"
    );

    set_rows.set(vec!["b".to_owned(), "c".to_owned()]);
    assert_eq!(
        visible(&view.to_html()),
        "<ul><li key=\"b\">b</li><li key=\"c\">c</li></ul>"
    );
}

#[test]
fn keyed_list_preserves_node_identity_across_reorders() {
    let ctx = RenderContext::client();
    let (rows, set_rows) = create_signal(vec!["a".to_owned(), "b".to_owned()]);
    let items = Dynamic::getter(move || rows_to_items(&rows.get()));
    let view = html!(&ctx, "<ul>" { items } "</ul>");

    let find = |key: &str| -> NodeRef {
        let ul = view.fragment().unwrap().first_element_child().unwrap();
        ul.children()
            .into_iter()
            .find(|c| c.attribute("key").as_deref() == Some(key))
            .unwrap()
    };
    let b_before = find("b");

    set_rows.set(vec!["b".to_owned(), "a".to_owned()]);
    let b_after = find("b");
    assert!(Arc::ptr_eq(&b_before, &b_after));
}

#[test]
fn property_binding_carries_typed_values() {
    let ctx = RenderContext::client();
    let data = Value::data(&serde_json::json!({"rows": [1, 2, 3]}));
    let (grid_data, set_grid_data) = create_signal(data.clone());
    let view = html!(&ctx, "<x-grid prop:rowData=\"" { grid_data } "\"></x-grid>");
    let grid = view.fragment().unwrap().first_element_child().unwrap();

    // marker attribute is consumed, the property carries the value
    assert!(grid
        .attributes()
        .iter()
        .all(|(name, _)| !name.starts_with("data-prop-")));
    assert_eq!(grid.property("rowData"), Some(data));

    let next = Value::data(&serde_json::json!({"rows": []}));
    set_grid_data.set(next.clone());
    assert_eq!(grid.property("rowData"), Some(next));
}

#[test]
fn derived_signals_drive_the_view() {
    let ctx = RenderContext::client();
    let (count, set_count) = create_signal(2);
    let squared = derived(move || count.get() * count.get());
    let view = html!(&ctx, "<p>" { squared } "</p>");

    assert_eq!(visible(&view.to_html()), "<p>4</p>");

    set_count.set(9);
    assert_eq!(visible(&view.to_html()), "<p>81</p>");
}

#[test]
fn batched_writes_land_together() {
    let ctx = RenderContext::client();
    let (first, set_first) = create_signal("a".to_owned());
    let (second, set_second) = create_signal("b".to_owned());
    let view = html!(&ctx, "<p>" { first } "-" { second } "</p>");

    batch(|| {
        set_first.set("x".to_owned());
        set_second.set("y".to_owned());
    });
    assert_eq!(visible(&view.to_html()), "<p>x-y</p>");
}

#[test]
fn stylesheets_track_signals_in_client_mode() {
    let ctx = RenderContext::client();
    let (accent, set_accent) = create_signal("teal".to_owned());
    let styles = css!(&ctx, "a { color: " { accent } "; }");

    assert_eq!(styles.text(), "a { color: teal; }");

    set_accent.set("crimson".to_owned());
    assert_eq!(styles.text(), "a { color: crimson; }");
}

#[test]
fn server_mode_resolves_everything_eagerly() {
    let ctx = RenderContext::server();
    let (count, set_count) = create_signal(1);
    let on_click = callback(|_event: &Event| {});

    let page = html!(&ctx,
        "<button onclick=\"" { on_click } "\">" { count } "</button>"
    );
    assert_eq!(page.to_html(), "<button onclick=\"\">1</button>");

    // server output is a snapshot; later writes change nothing
    set_count.set(100);
    assert_eq!(page.to_html(), "<button onclick=\"\">1</button>");
}
