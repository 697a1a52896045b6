//! Serialisation back to markup.
//!
//! Output is XHTML-flavoured so a strict XML consumer can read it: void
//! elements are self-closed (`<br />`), everything else gets an explicit end
//! tag, even when empty. No whitespace is added or removed, which keeps a
//! load/serialise round trip byte-stable. The one exception is the newline
//! written after `<pre>`, `<textarea>` and `<listing>` when their content
//! starts with one, since the parser drops the first newline there.

use super::tag::{drops_leading_newline, is_raw_text, is_void};
use super::{NodeData, NodeId, Tree};

enum Visit {
    Open(NodeId),
    Close(NodeId),
}

pub(super) fn serialize(tree: &Tree) -> String {
    let mut out = String::with_capacity(tree.len() * 16);
    let mut stack: Vec<Visit> = tree
        .children(tree.document())
        .iter()
        .rev()
        .map(|&c| Visit::Open(c))
        .collect();

    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Close(id) => {
                if let Some(el) = tree.element(id) {
                    out.push_str("</");
                    out.push_str(&el.name);
                    out.push('>');
                }
            }
            Visit::Open(id) => match tree.data(id) {
                NodeData::Document => {}
                NodeData::Doctype {
                    name,
                    public_id,
                    system_id,
                } => {
                    out.push_str("<!DOCTYPE ");
                    out.push_str(name);
                    if !public_id.is_empty() {
                        out.push_str(" PUBLIC \"");
                        out.push_str(public_id);
                        out.push('"');
                    }
                    if !system_id.is_empty() {
                        if public_id.is_empty() {
                            out.push_str(" SYSTEM");
                        }
                        out.push_str(" \"");
                        out.push_str(system_id);
                        out.push('"');
                    }
                    out.push('>');
                }
                NodeData::Comment(text) => {
                    out.push_str("<!--");
                    out.push_str(text);
                    out.push_str("-->");
                }
                NodeData::Text(text) => {
                    let raw = tree
                        .parent(id)
                        .and_then(|p| tree.element(p))
                        .is_some_and(|el| is_raw_text(&el.name));
                    if raw {
                        out.push_str(text);
                    } else {
                        escape_text(text, &mut out);
                    }
                }
                NodeData::Element(el) => {
                    out.push('<');
                    out.push_str(&el.name);
                    for attr in el.attrs.iter() {
                        out.push(' ');
                        out.push_str(&attr.name);
                        out.push_str("=\"");
                        escape_attr(&attr.value, &mut out);
                        out.push('"');
                    }
                    if is_void(&el.name) {
                        out.push_str(" />");
                    } else {
                        out.push('>');
                        if drops_leading_newline(&el.name) && starts_with_newline(tree, id) {
                            out.push('\n');
                        }
                        stack.push(Visit::Close(id));
                        stack.extend(tree.children(id).iter().rev().map(|&c| Visit::Open(c)));
                    }
                }
            },
        }
    }

    out
}

fn starts_with_newline(tree: &Tree, id: NodeId) -> bool {
    tree.children(id)
        .first()
        .is_some_and(|&c| matches!(tree.data(c), NodeData::Text(t) if t.starts_with('\n')))
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::tree::Tree;

    fn roundtrip(markup: &str) -> String {
        Tree::parse(markup.as_bytes()).unwrap().serialize()
    }

    #[test]
    fn void_elements_self_close() {
        let out = roundtrip(r#"<p>a<br class="x">b<img src="i.png"></p>"#);
        assert!(out.contains(r#"<br class="x" />"#), "got: {out}");
        assert!(out.contains(r#"<img src="i.png" />"#), "got: {out}");
    }

    #[test]
    fn empty_elements_get_end_tags() {
        let out = roundtrip("<div></div>");
        assert_eq!(out, "<html><head></head><body><div></div></body></html>");
    }

    #[test]
    fn text_and_attributes_are_escaped() {
        let out = roundtrip(r#"<p title="a &quot;q&quot; &amp; b">1 &lt; 2 &amp; 3</p>"#);
        assert!(out.contains(r#"title="a &quot;q&quot; &amp; b""#), "got: {out}");
        assert!(out.contains("1 &lt; 2 &amp; 3"), "got: {out}");
    }

    #[test]
    fn raw_text_is_not_escaped() {
        let out = roundtrip("<style>p > span { color: red }</style>");
        assert!(out.contains("<style>p > span { color: red }</style>"), "got: {out}");
    }

    #[test]
    fn doctype_and_comments_survive() {
        let out = roundtrip("<!DOCTYPE html><!-- note --><p>x</p>");
        assert!(out.starts_with("<!DOCTYPE html><!-- note -->"), "got: {out}");
    }

    #[test]
    fn leading_newline_in_pre_survives_reload() {
        let once = roundtrip("<pre>\n\ncode</pre><textarea>\n\nx</textarea><listing>\n\ny</listing>");
        assert!(once.contains("<pre>\n\ncode</pre>"), "got: {once:?}");
        assert!(once.contains("<textarea>\n\nx</textarea>"), "got: {once:?}");
        assert!(once.contains("<listing>\n\ny</listing>"), "got: {once:?}");
        assert_eq!(roundtrip(&once), once);
    }

    #[test]
    fn pre_without_leading_newline_is_unchanged() {
        let out = roundtrip("<pre>code\n</pre>");
        assert!(out.contains("<pre>code\n</pre>"), "got: {out:?}");
    }

    #[test]
    fn serialisation_is_stable_on_reload() {
        let once = roundtrip("<table border=1><tr><td>a<td>b</table><p>tail");
        let twice = roundtrip(&once);
        assert_eq!(once, twice);
    }
}
