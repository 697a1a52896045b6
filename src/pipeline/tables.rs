//! Table normalisation.
//!
//! ## Validity
//!
//! A table counts as valid when it contains a `thead>tr>th`, `tbody>tr>td`
//! or `tr>td` chain anywhere below it. An invalid table takes its whole
//! parent down with it: the parent's content becomes a single space. This
//! loses the table's siblings too, and that is intended.
//!
//! ## Attribute migration
//!
//! Presentational attributes move into `style` in a fixed order, each one
//! removed once read:
//!
//! | attribute     | declaration                  | skipped when style contains |
//! |---------------|------------------------------|-----------------------------|
//! | `cellspacing` | `border-collapse: collapse;` | `border-collapse`           |
//! | `cellpadding` | `padding: Npx;`              | `cellpadding`               |
//! | `border`      | `border: V;`                 | `border`                    |
//! | `width`       | `width: V;` (px-normalised)  | never                       |
//! | `height`      | `height: V;` (px-normalised) | never                       |
//! | `align`       | `text-align: V;`             | never                       |
//!
//! The guards are substring tests against the style accumulated so far, so
//! `cellspacing` followed by `border` yields only `border-collapse`. The
//! `cellpadding` guard looks for the attribute's own name, which never ends
//! up in a style; padding is therefore always migrated.

use super::{tag_path, PassRecorder};
use crate::error::DocNormError;
use crate::style::{px_length, set_style, style_of};
use crate::tree::{NodeId, TagPath, Tree};
use once_cell::sync::Lazy;

static TABLE: Lazy<TagPath> = Lazy::new(|| tag_path("table"));

static VALID_ROWS: Lazy<[TagPath; 3]> = Lazy::new(|| {
    [
        tag_path("thead>tr>th"),
        tag_path("tbody>tr>td"),
        tag_path("tr>td"),
    ]
});

pub fn run(tree: &mut Tree, recorder: &mut PassRecorder) -> Result<(), DocNormError> {
    let mut collapsed = 0;
    let mut migrated = 0;

    for table in tree.query(&TABLE) {
        // an earlier collapse may have taken this one out
        if !tree.is_attached(table) {
            continue;
        }
        if !is_valid_table(tree, table) {
            collapse_parent(tree, table)?;
            collapsed += 1;
            continue;
        }
        if migrate_attributes(tree, table) {
            migrated += 1;
        }
    }

    recorder.record("table-validity", collapsed);
    recorder.record("table-attributes", migrated);
    Ok(())
}

pub fn is_valid_table(tree: &Tree, table: NodeId) -> bool {
    VALID_ROWS.iter().any(|path| tree.has_within(table, path))
}

fn collapse_parent(tree: &mut Tree, table: NodeId) -> Result<(), DocNormError> {
    let parent = tree
        .parent(table)
        .ok_or_else(|| DocNormError::MalformedTree {
            rule: "table-validity",
            detail: "table has no parent".to_string(),
        })?;
    tree.set_text_content(parent, " ");
    Ok(())
}

/// Move legacy table attributes into `style`. Returns whether anything moved.
pub fn migrate_attributes(tree: &mut Tree, table: NodeId) -> bool {
    let mut style = style_of(tree, table);
    let mut touched = false;

    if tree.remove_attr(table, "cellspacing").is_some() {
        touched = true;
        if !style.contains("border-collapse") {
            style.push("border-collapse", "collapse");
        }
    }

    if let Some(v) = tree.remove_attr(table, "cellpadding") {
        touched = true;
        if !style.contains("cellpadding") {
            style.push("padding", &format!("{}px", v.trim()));
        }
    }

    if let Some(v) = tree.remove_attr(table, "border") {
        touched = true;
        if !style.contains("border") {
            style.push("border", v.trim());
        }
    }

    if let Some(v) = tree.remove_attr(table, "width") {
        touched = true;
        style.push("width", &px_length(&v));
    }

    if let Some(v) = tree.remove_attr(table, "height") {
        touched = true;
        style.push("height", &px_length(&v));
    }

    if let Some(v) = tree.remove_attr(table, "align") {
        touched = true;
        style.push("text-align", v.trim());
    }

    if touched {
        set_style(tree, table, &style);
    }
    touched
}
