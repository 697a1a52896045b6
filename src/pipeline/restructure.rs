//! Restructuring: repair block elements nested where the typesetter cannot
//! lay them out, without losing the formatting the wrapper expressed.
//!
//! Each rule runs to its own fixed point before the next starts:
//!
//! 1. `u>div`      underline every `div` child, then unwrap the `u`
//! 2. `strong>div` embolden every `div` child, then unwrap the `strong`
//! 3. `p>div`      rename the `p` enclosing a `div` to `div`, at any depth
//!                 the parser would close the `p` from
//! 4. `ol>div`, `ul>div`, `li>div`
//!                 fold the `div`'s style into the list element, then unwrap the `div`

use super::{tag_path, PassRecorder};
use crate::error::DocNormError;
use crate::style::{append_declaration, ensure_style_attribute, set_style, style_of};
use crate::tree::{NodeId, Tag, TagPath, Tree};
use once_cell::sync::Lazy;

static U_DIV: Lazy<TagPath> = Lazy::new(|| tag_path("u>div"));
static STRONG_DIV: Lazy<TagPath> = Lazy::new(|| tag_path("strong>div"));
static DIV: Lazy<TagPath> = Lazy::new(|| tag_path("div"));
static OL_DIV: Lazy<TagPath> = Lazy::new(|| tag_path("ol>div"));
static UL_DIV: Lazy<TagPath> = Lazy::new(|| tag_path("ul>div"));
static LI_DIV: Lazy<TagPath> = Lazy::new(|| tag_path("li>div"));

/// Elements that stop a `<div>` start tag from closing an open `p`.
const PARAGRAPH_BOUNDARIES: &[&str] = &[
    "applet", "button", "caption", "html", "marquee", "object", "table", "td", "template", "th",
];

/// Run every rule. Returns the total number of rewrites.
pub fn run(tree: &mut Tree, recorder: &mut PassRecorder) -> Result<usize, DocNormError> {
    let mut total = 0;
    total += recorder.fixed_point(tree, "u>div", |t| {
        hoist_first(t, &U_DIV, "u>div", "text-decoration: underline;")
    })?;
    total += recorder.fixed_point(tree, "strong>div", |t| {
        hoist_first(t, &STRONG_DIV, "strong>div", "font-weight: bold;")
    })?;
    total += recorder.fixed_point(tree, "p>div", rename_first_paragraph)?;
    for (rule, path) in [
        ("ol>div", &*OL_DIV),
        ("ul>div", &*UL_DIV),
        ("li>div", &*LI_DIV),
    ] {
        total += recorder.fixed_point(tree, rule, |t| fold_first_list_div(t, path, rule))?;
    }
    Ok(total)
}

/// Push `declaration` onto every `div` child of the matched wrapper, then
/// unwrap the wrapper.
fn hoist_first(
    tree: &mut Tree,
    path: &TagPath,
    rule: &'static str,
    declaration: &str,
) -> Result<bool, DocNormError> {
    let Some(div) = tree.query_first(path) else {
        return Ok(false);
    };
    let wrapper = parent_of(tree, div, rule)?;

    let divs: Vec<NodeId> = tree
        .element_children(wrapper)
        .filter(|&c| tree.is_tag(c, Tag::Div))
        .collect();
    for d in divs {
        append_declaration(tree, d, declaration);
    }

    tree.replace_with_children(wrapper, false)?;
    Ok(true)
}

/// The `p` becomes a `div`; it gets the style attribute every `div` carries.
///
/// Inline wrappers in between (`<p><b><div>`) do not protect the `p`: a
/// reload would still close it at the `div`.
fn rename_first_paragraph(tree: &mut Tree) -> Result<bool, DocNormError> {
    let Some(p) = tree
        .query(&DIV)
        .into_iter()
        .find_map(|div| enclosing_paragraph(tree, div))
    else {
        return Ok(false);
    };
    tree.rename(p, "div");
    ensure_style_attribute(tree, p);
    Ok(true)
}

/// Nearest `p` above `div` that is not cut off by a table cell or similar.
fn enclosing_paragraph(tree: &Tree, div: NodeId) -> Option<NodeId> {
    let mut current = tree.parent(div)?;
    loop {
        let el = tree.element(current)?;
        if el.tag() == Tag::P {
            return Some(current);
        }
        if PARAGRAPH_BOUNDARIES
            .iter()
            .any(|b| el.name.eq_ignore_ascii_case(b))
        {
            return None;
        }
        current = tree.parent(current)?;
    }
}

/// Merge the `div`'s declarations into the list element, then unwrap the `div`.
fn fold_first_list_div(
    tree: &mut Tree,
    path: &TagPath,
    rule: &'static str,
) -> Result<bool, DocNormError> {
    let Some(div) = tree.query_first(path) else {
        return Ok(false);
    };
    let list = parent_of(tree, div, rule)?;

    let div_style = style_of(tree, div);
    if !div_style.is_empty() {
        let mut style = style_of(tree, list);
        style.append(div_style.as_str());
        set_style(tree, list, &style);
    }

    tree.replace_with_children(div, false)?;
    Ok(true)
}

fn parent_of(tree: &Tree, node: NodeId, rule: &'static str) -> Result<NodeId, DocNormError> {
    tree.parent(node).ok_or_else(|| DocNormError::MalformedTree {
        rule,
        detail: "matched node has no parent".to_string(),
    })
}
