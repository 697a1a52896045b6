//! Style Accumulator: inline `style` declarations as a value type.
//!
//! Legacy attribute migration only ever appends, so [`InlineStyle`] is an
//! append-only `property: value;` sequence. The one invariant it maintains is
//! separator hygiene: before anything is appended the existing text is
//! trimmed and, if non-empty, terminated with exactly one `;`.
//!
//! Appends are not deduplicated. Callers that must not duplicate a
//! declaration check [`InlineStyle::contains`] or [`InlineStyle::declares`]
//! first; one-shot attribute migrations append unconditionally.

use crate::tree::{NodeId, Tree};
use std::fmt;

/// Ordered, semicolon-terminated CSS declarations for one element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    text: String,
}

impl InlineStyle {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Raw substring test against the accumulated text.
    pub fn contains(&self, needle: &str) -> bool {
        self.text.contains(needle)
    }

    /// True when some declaration sets `property` (case-insensitive).
    pub fn declares(&self, property: &str) -> bool {
        self.declarations()
            .any(|(p, _)| p.eq_ignore_ascii_case(property))
    }

    /// `(property, value)` pairs in order; malformed fragments are skipped.
    pub fn declarations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.text.split(';').filter_map(|decl| {
            let (p, v) = decl.split_once(':')?;
            let p = p.trim();
            (!p.is_empty()).then(|| (p, v.trim()))
        })
    }

    /// Append one declaration fragment such as `"padding: 4px;"`.
    pub fn append(&mut self, declaration: &str) {
        self.text = self.text.trim().to_string();
        if !self.text.is_empty() && !self.text.ends_with(';') {
            self.text.push(';');
        }
        self.text.push_str(declaration.trim());
    }

    /// Append `property: value;`.
    pub fn push(&mut self, property: &str, value: &str) {
        self.append(&format!("{property}: {value};"));
    }
}

impl fmt::Display for InlineStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Legacy length attribute to CSS: `%` and `px` values pass through, bare
/// numbers get `px`.
pub fn px_length(value: &str) -> String {
    let value = value.trim();
    if value.ends_with('%') || value.ends_with("px") {
        value.to_string()
    } else {
        format!("{value}px")
    }
}

// ── Tree helpers ─────────────────────────────────────────────────────────────

/// Current style of `node`; empty when the attribute is absent.
pub fn style_of(tree: &Tree, node: NodeId) -> InlineStyle {
    InlineStyle::new(tree.attr(node, "style").unwrap_or(""))
}

/// Guarantee a `style` attribute exists, empty if it was absent.
pub fn ensure_style_attribute(tree: &mut Tree, node: NodeId) {
    if tree.element(node).is_some() && tree.attr(node, "style").is_none() {
        tree.set_attr(node, "style", "");
    }
}

/// Append a declaration to `node`'s style attribute, creating it if needed.
pub fn append_declaration(tree: &mut Tree, node: NodeId, declaration: &str) {
    let mut style = style_of(tree, node);
    style.append(declaration);
    tree.set_attr(node, "style", style.as_str());
}

/// Write `style` back to `node`.
pub fn set_style(tree: &mut Tree, node: NodeId, style: &InlineStyle) {
    tree.set_attr(node, "style", style.as_str());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Attributes;

    #[test]
    fn append_to_empty_has_no_leading_separator() {
        let mut s = InlineStyle::default();
        s.push("text-decoration", "underline");
        assert_eq!(s.as_str(), "text-decoration: underline;");
    }

    #[test]
    fn append_adds_missing_separator_once() {
        let mut s = InlineStyle::new("  color: red  ");
        s.push("font-weight", "bold");
        assert_eq!(s.as_str(), "color: red;font-weight: bold;");

        let mut s = InlineStyle::new("color: red;");
        s.push("font-weight", "bold");
        assert_eq!(s.as_str(), "color: red;font-weight: bold;");
    }

    #[test]
    fn repeated_appends_do_not_pile_up_semicolons() {
        let mut s = InlineStyle::default();
        s.append("a: 1;");
        s.append("b: 2; ");
        s.append("c: 3;");
        assert_eq!(s.as_str(), "a: 1;b: 2;c: 3;");
        assert!(!s.as_str().contains(";;"));
    }

    #[test]
    fn appends_are_not_deduplicated() {
        let mut s = InlineStyle::default();
        s.push("font-size", "9pt");
        s.push("font-size", "9pt");
        assert_eq!(s.as_str(), "font-size: 9pt;font-size: 9pt;");
    }

    #[test]
    fn declares_parses_property_names() {
        let s = InlineStyle::new("border-collapse: collapse; TEXT-ALIGN: center");
        assert!(s.declares("text-align"));
        assert!(s.declares("border-collapse"));
        assert!(!s.declares("border"));
        // raw substring matching is a different question
        assert!(s.contains("border"));
    }

    #[test]
    fn px_length_normalisation() {
        assert_eq!(px_length("100"), "100px");
        assert_eq!(px_length("100px"), "100px");
        assert_eq!(px_length(" 50% "), "50%");
    }

    #[test]
    fn ensure_and_append_on_tree() {
        let mut tree = Tree::new();
        let div = tree.create_element("div", Attributes::new());
        tree.append(tree.document(), div);

        ensure_style_attribute(&mut tree, div);
        assert_eq!(tree.attr(div, "style"), Some(""));
        ensure_style_attribute(&mut tree, div);
        assert_eq!(tree.attr(div, "style"), Some(""));

        append_declaration(&mut tree, div, "font-weight: bold;");
        append_declaration(&mut tree, div, "text-decoration: underline;");
        assert_eq!(
            tree.attr(div, "style"),
            Some("font-weight: bold;text-decoration: underline;")
        );
    }
}
