//! Markup Parser
//!
//! Parses the compiler's intermediate markup string into a node tree,
//! exactly once per render; the binding engine never re-parses.
//!
//! The parser is deliberately lenient, like the host parsers it stands in
//! for: unknown constructs become text, stray close tags are ignored with a
//! warning, and unterminated input is kept rather than dropped. Tag and
//! attribute names are lowercased, which is why property bindings have to
//! be rewritten to marker attributes *before* parsing.

use tracing::warn;

use super::node::{is_void_element, Fragment, Node, NodeRef};

/// Parse a markup string into a detached fragment.
pub fn parse_fragment(input: &str) -> Fragment {
    let fragment = Fragment::new();
    let mut stack: Vec<NodeRef> = vec![fragment.root().clone()];
    let mut rest = input;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("<!--") {
            let (data, remainder) = match after.find("-->") {
                Some(end) => (&after[..end], &after[end + 3..]),
                None => (after, ""),
            };
            top(&stack).append_child(&Node::comment(data));
            rest = remainder;
        } else if let Some(after) = rest.strip_prefix("</") {
            rest = close_tag(&mut stack, after);
        } else if starts_element(rest) {
            rest = open_tag(&mut stack, &rest[1..]);
        } else if rest.starts_with("<!") {
            // doctype or other declaration: skip to the closing bracket
            rest = match rest.find('>') {
                Some(end) => &rest[end + 1..],
                None => "",
            };
        } else {
            rest = text_run(&stack, rest);
        }
    }

    fragment
}

fn top(stack: &[NodeRef]) -> &NodeRef {
    stack.last().expect("parser stack never empty")
}

fn starts_element(rest: &str) -> bool {
    let mut chars = rest.chars();
    chars.next() == Some('<') && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
}

/// Consume a text run up to the next markup construct.
fn text_run<'a>(stack: &[NodeRef], rest: &'a str) -> &'a str {
    let mut end = rest.len();
    for (idx, _) in rest.char_indices().skip(1) {
        let tail = &rest[idx..];
        if tail.starts_with("<!--") || tail.starts_with("</") || tail.starts_with("<!") || starts_element(tail) {
            end = idx;
            break;
        }
    }
    let text = decode_entities(&rest[..end]);
    top(stack).append_child(&Node::text(&text));
    &rest[end..]
}

/// Consume `name ... >` after a `</`, popping the stack to the matching
/// open element.
fn close_tag<'a>(stack: &mut Vec<NodeRef>, after: &'a str) -> &'a str {
    let (name, tail) = take_name(after);
    let remainder = match tail.find('>') {
        Some(end) => &tail[end + 1..],
        None => "",
    };
    let name = name.to_ascii_lowercase();
    match stack.iter().rposition(|node| node.tag().as_deref() == Some(&name)) {
        // never pop the fragment root at index 0
        Some(pos) if pos > 0 => stack.truncate(pos),
        _ => warn!(tag = %name, "ignoring close tag with no matching open tag"),
    }
    remainder
}

/// Consume a tag name, attributes, and the closing `>` after a `<`.
fn open_tag<'a>(stack: &mut Vec<NodeRef>, after: &'a str) -> &'a str {
    let (name, mut rest) = take_name(after);
    let element = Node::element(name);

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        if let Some(tail) = rest.strip_prefix("/>") {
            top(stack).append_child(&element);
            return tail;
        }
        if let Some(tail) = rest.strip_prefix('>') {
            top(stack).append_child(&element);
            if !is_void_element(&element.tag().unwrap_or_default()) {
                stack.push(element);
            }
            return tail;
        }
        if let Some(tail) = rest.strip_prefix('/') {
            rest = tail;
            continue;
        }
        rest = attribute(&element, rest);
    }

    // unterminated tag: attach what we have
    top(stack).append_child(&element);
    rest
}

/// Consume one `name` or `name=value` attribute.
fn attribute<'a>(element: &NodeRef, rest: &'a str) -> &'a str {
    let name_end = rest
        .find(|c: char| c.is_ascii_whitespace() || c == '=' || c == '>' || c == '/')
        .unwrap_or(rest.len());
    let name = &rest[..name_end];
    let mut tail = rest[name_end..].trim_start();

    if !tail.starts_with('=') {
        if !name.is_empty() {
            element.set_attribute(name, "");
        }
        return tail;
    }
    tail = tail[1..].trim_start();

    let (raw, remainder) = if let Some(inner) = tail.strip_prefix('"') {
        split_at_char(inner, '"')
    } else if let Some(inner) = tail.strip_prefix('\'') {
        split_at_char(inner, '\'')
    } else {
        let end = tail
            .find(|c: char| c.is_ascii_whitespace() || c == '>')
            .unwrap_or(tail.len());
        (&tail[..end], &tail[end..])
    };
    element.set_attribute(name, &decode_entities(raw));
    remainder
}

fn split_at_char(s: &str, delimiter: char) -> (&str, &str) {
    match s.find(delimiter) {
        Some(end) => (&s[..end], &s[end + 1..]),
        None => (s, ""),
    }
}

fn take_name(s: &str) -> (&str, &str) {
    let end = s
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':'))
        .unwrap_or(s.len());
    (&s[..end], &s[end..])
}

/// Decode the entities the serializer produces (plus the apostrophe forms).
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let mut matched = false;
        for (entity, ch) in [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
            ("&#39;", '\''),
            ("&apos;", '\''),
        ] {
            if let Some(tail) = rest.strip_prefix(entity) {
                out.push(ch);
                rest = tail;
                matched = true;
                break;
            }
        }
        if !matched {
            out.push('&');
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_text() {
        let fragment = parse_fragment("<div class=\"box\"><p>hello</p></div>");
        let children = fragment.children();
        assert_eq!(children.len(), 1);
        let div = &children[0];
        assert_eq!(div.tag().as_deref(), Some("div"));
        assert_eq!(div.attribute("class").as_deref(), Some("box"));
        let p = div.first_element_child().unwrap();
        assert_eq!(p.tag().as_deref(), Some("p"));
        assert_eq!(p.children()[0].text_data().as_deref(), Some("hello"));
    }

    #[test]
    fn lowercases_tag_and_attribute_names() {
        let fragment = parse_fragment("<DIV CustomAttr=\"x\"></DIV>");
        let div = &fragment.children()[0];
        assert_eq!(div.tag().as_deref(), Some("div"));
        assert_eq!(div.attribute("customattr").as_deref(), Some("x"));
    }

    #[test]
    fn parses_comments() {
        let fragment = parse_fragment("a<!--marker-->b");
        let children = fragment.children();
        assert_eq!(children.len(), 3);
        assert_eq!(children[1].comment_data().as_deref(), Some("marker"));
    }

    #[test]
    fn void_and_self_closing_elements_take_no_children() {
        let fragment = parse_fragment("<input type=\"text\"><br><span/>after");
        let children = fragment.children();
        assert_eq!(children.len(), 4);
        assert_eq!(children[0].tag().as_deref(), Some("input"));
        assert_eq!(children[1].tag().as_deref(), Some("br"));
        assert_eq!(children[2].tag().as_deref(), Some("span"));
        assert_eq!(children[3].text_data().as_deref(), Some("after"));
    }

    #[test]
    fn unquoted_and_bare_attributes() {
        let fragment = parse_fragment("<input disabled value=abc>");
        let input = &fragment.children()[0];
        assert_eq!(input.attribute("disabled").as_deref(), Some(""));
        assert_eq!(input.attribute("value").as_deref(), Some("abc"));
    }

    #[test]
    fn stray_close_tag_is_ignored() {
        let fragment = parse_fragment("</div><p>ok</p>");
        let children = fragment.children();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].tag().as_deref(), Some("p"));
    }

    #[test]
    fn decodes_entities_in_text_and_attributes() {
        let fragment = parse_fragment("<span title=\"a &amp; b\">1 &lt; 2</span>");
        let span = &fragment.children()[0];
        assert_eq!(span.attribute("title").as_deref(), Some("a & b"));
        assert_eq!(span.children()[0].text_data().as_deref(), Some("1 < 2"));
    }

    #[test]
    fn lone_angle_bracket_is_text() {
        let fragment = parse_fragment("a < b");
        let children = fragment.children();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].text_data().as_deref(), Some("a < b"));
    }

    #[test]
    fn roundtrips_through_serializer() {
        let markup = "<ul><li key=\"a\">one</li><li key=\"b\">two</li></ul>";
        let fragment = parse_fragment(markup);
        assert_eq!(fragment.to_html(), markup);
    }
}
