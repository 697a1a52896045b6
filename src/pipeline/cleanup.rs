//! Structural cleanup: strip what the typesetter cannot print and rename
//! legacy presentational tags.
//!
//! Rules, in order:
//! 1. `meta` elements are removed until none remain
//! 2. literal `</meta>` / `</form>` artefacts are cut out of text
//! 3. `form` elements are removed (or unwrapped, see [`FormPolicy`])
//! 4. `br` elements lose every attribute and child, so they serialise as `<br />`
//! 5. `font` becomes `div`, attributes intact, for the block style passes
//!
//! `font → div` must run before anything that targets `div`.

use super::{tag_path, PassRecorder};
use crate::config::{FormPolicy, NormalizeConfig};
use crate::error::DocNormError;
use crate::tree::{NodeData, NodeId, TagPath, Tree};
use once_cell::sync::Lazy;
use regex::Regex;

static META: Lazy<TagPath> = Lazy::new(|| tag_path("meta"));
static FORM: Lazy<TagPath> = Lazy::new(|| tag_path("form"));
static BR: Lazy<TagPath> = Lazy::new(|| tag_path("br"));
static FONT: Lazy<TagPath> = Lazy::new(|| tag_path("font"));

static RE_END_TAG_ARTIFACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*/\s*(meta|form)\s*>").unwrap());

pub fn run(
    tree: &mut Tree,
    config: &NormalizeConfig,
    recorder: &mut PassRecorder,
) -> Result<(), DocNormError> {
    recorder.fixed_point(tree, "meta", remove_first_meta)?;

    let artifacts = strip_end_tag_artifacts(tree);
    recorder.record("end-tag-artifacts", artifacts);

    let policy = config.form_policy;
    recorder.fixed_point(tree, "form", |t| remove_first_form(t, policy))?;

    let brs = normalize_breaks(tree);
    recorder.record("br", brs);

    recorder.fixed_point(tree, "font", rename_first_font)?;
    Ok(())
}

fn remove_first_meta(tree: &mut Tree) -> Result<bool, DocNormError> {
    let Some(meta) = tree.query_first(&META) else {
        return Ok(false);
    };
    tree.detach(meta);
    Ok(true)
}

fn remove_first_form(tree: &mut Tree, policy: FormPolicy) -> Result<bool, DocNormError> {
    let Some(form) = tree.query_first(&FORM) else {
        return Ok(false);
    };
    match policy {
        FormPolicy::Discard => tree.detach(form),
        FormPolicy::Unwrap => tree.replace_with_children(form, false)?,
    }
    Ok(true)
}

/// Cut `</meta>`-style leftovers out of text nodes. Returns nodes changed.
pub fn strip_end_tag_artifacts(tree: &mut Tree) -> usize {
    let hits: Vec<NodeId> = tree
        .descendants(tree.document())
        .filter(|&id| matches!(tree.data(id), NodeData::Text(t) if RE_END_TAG_ARTIFACT.is_match(t)))
        .collect();

    for &id in &hits {
        if let NodeData::Text(text) = tree.data_mut(id) {
            *text = RE_END_TAG_ARTIFACT.replace_all(text, "").into_owned();
        }
    }
    hits.len()
}

/// Strip `br` attributes and children. Returns how many `br`s changed.
fn normalize_breaks(tree: &mut Tree) -> usize {
    let mut changed = 0;
    for br in tree.query(&BR) {
        if tree.has_attrs(br) || !tree.children(br).is_empty() {
            if let Some(el) = tree.element_mut(br) {
                el.attrs.clear();
            }
            tree.clear_children(br);
            changed += 1;
        }
    }
    changed
}

fn rename_first_font(tree: &mut Tree) -> Result<bool, DocNormError> {
    let Some(font) = tree.query_first(&FONT) else {
        return Ok(false);
    };
    tree.rename(font, "div");
    Ok(true)
}
