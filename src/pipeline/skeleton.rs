//! Skeleton pass: guarantee `html > head, body`.
//!
//! html5ever already synthesises the three elements for almost any input,
//! so in practice this pass only repairs trees built by hand and decorates
//! fragments. A fragment (raw markup without an `<html` start tag) is
//! wrapped the way the legacy converter wrapped it: `lang="en"`, the XHTML
//! namespace, and a `<title>`.
//!
//! No doctype is added. Adding one would flip the parser from quirks to
//! no-quirks mode on the next load, so normalising the output again would
//! not give the same bytes.

use super::PassRecorder;
use crate::config::NormalizeConfig;
use crate::error::DocNormError;
use crate::tree::{Attributes, NodeData, NodeId, Tag, Tree};
use once_cell::sync::Lazy;
use regex::bytes::Regex;

pub const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

static RE_HTML_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<html[\s>/]").unwrap());

/// Does the raw markup carry its own `<html>` start tag?
pub fn has_html_start_tag(raw: &[u8]) -> bool {
    RE_HTML_START.is_match(raw)
}

pub fn run(
    tree: &mut Tree,
    raw: &[u8],
    config: &NormalizeConfig,
    recorder: &mut PassRecorder,
) -> Result<(), DocNormError> {
    let mut changes = ensure_skeleton(tree);
    if !has_html_start_tag(raw) {
        changes += decorate(tree, &config.document_title);
    }
    recorder.record("skeleton", changes);
    Ok(())
}

/// Create or reorder `html`, `head` and `body`. Returns the number of fixes.
pub fn ensure_skeleton(tree: &mut Tree) -> usize {
    let mut changes = 0;
    let doc = tree.document();

    let html = match tree.child_by_tag(doc, Tag::Html) {
        Some(html) => html,
        None => {
            changes += 1;
            wrap_document(tree)
        }
    };

    // a new head is detached, so it always takes the move below
    let head = tree
        .child_by_tag(html, Tag::Head)
        .unwrap_or_else(|| tree.create_element("head", Attributes::new()));
    if tree.children(html).first() != Some(&head) {
        match tree.children(html).first().copied() {
            Some(first) => tree.insert_before(first, head),
            None => tree.append(html, head),
        }
        changes += 1;
    }

    if tree.child_by_tag(html, Tag::Body).is_none() {
        let body = tree.create_element("body", Attributes::new());
        tree.append(html, body);
        changes += 1;
    }

    changes
}

/// Move every non-doctype document child into a new `html > body`.
fn wrap_document(tree: &mut Tree) -> NodeId {
    let doc = tree.document();
    let html = tree.create_element("html", Attributes::new());
    let body = tree.create_element("body", Attributes::new());

    let content: Vec<NodeId> = tree
        .children(doc)
        .iter()
        .copied()
        .filter(|&c| !matches!(tree.data(c), NodeData::Doctype { .. }))
        .collect();
    for node in content {
        tree.append(body, node);
    }

    tree.append(doc, html);
    tree.append(html, body);
    html
}

/// Fragment decoration. Only fills in what is missing.
fn decorate(tree: &mut Tree, title: &str) -> usize {
    let mut changes = 0;
    let Some(html) = tree.child_by_tag(tree.document(), Tag::Html) else {
        return 0;
    };

    if tree.attr(html, "lang").is_none() {
        tree.set_attr(html, "lang", "en");
        changes += 1;
    }
    if tree.attr(html, "xmlns").is_none() {
        tree.set_attr(html, "xmlns", XHTML_NAMESPACE);
        changes += 1;
    }

    if let Some(head) = tree.child_by_tag(html, Tag::Head) {
        if tree.child_by_tag(head, Tag::Title).is_none() {
            let el = tree.create_element("title", Attributes::new());
            let text = tree.create_text(title);
            tree.append(el, text);
            match tree.children(head).first().copied() {
                Some(first) => tree.insert_before(first, el),
                None => tree.append(head, el),
            }
            changes += 1;
        }
    }

    changes
}
