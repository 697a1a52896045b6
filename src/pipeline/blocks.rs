//! Block style passes: image/div repairs and legacy attribute migration on
//! `div`, `td` and `p`.
//!
//! Order matters. The image repairs run before styling so the `div`s they
//! unwrap never get a style attribute, and `div` styling runs after
//! `font → div` so the old `face`/`size` attributes are still there to read.

use super::{tag_path, PassRecorder};
use crate::error::DocNormError;
use crate::style::{ensure_style_attribute, px_length, set_style, style_of};
use crate::tree::{NodeId, Tag, TagPath, Tree};
use once_cell::sync::Lazy;

static DIV_IMG: Lazy<TagPath> = Lazy::new(|| tag_path("div>img"));
static DIV_HIDDEN: Lazy<TagPath> = Lazy::new(|| tag_path("div[class=Top_Hidden]"));
static DIV_BLANK: Lazy<TagPath> = Lazy::new(|| tag_path("div[class=blank]"));
static TD_IMG: Lazy<TagPath> = Lazy::new(|| tag_path("td>img"));
static DIV: Lazy<TagPath> = Lazy::new(|| tag_path("div"));
static TD: Lazy<TagPath> = Lazy::new(|| tag_path("td"));
static P: Lazy<TagPath> = Lazy::new(|| tag_path("p"));

pub fn run(tree: &mut Tree, recorder: &mut PassRecorder) -> Result<(), DocNormError> {
    recorder.fixed_point(tree, "div>img", unwrap_first_image_div)?;
    recorder.fixed_point(tree, "div[class=Top_Hidden]", remove_first_hidden_div)?;
    recorder.sweep(tree, "div[class=blank]", &DIV_BLANK, |t, div| {
        t.clear_children(div);
        Ok(())
    })?;
    recorder.sweep(tree, "td>img", &TD_IMG, |t, img| {
        t.set_text_content(img, " ");
        Ok(())
    })?;
    recorder.sweep(tree, "div-style", &DIV, |t, div| {
        style_div(t, div);
        Ok(())
    })?;
    recorder.sweep(tree, "td-style", &TD, |t, td| {
        style_td(t, td);
        Ok(())
    })?;
    recorder.sweep(tree, "p-style", &P, |t, p| {
        style_p(t, p);
        Ok(())
    })?;
    Ok(())
}

/// One `div>img` step: unwrap the image's `div`, and drop the image once it
/// no longer sits directly in a `div`.
///
/// Repeated, this peels every enclosing `div` layer off and leaves a single
/// space where the outermost one was.
fn unwrap_first_image_div(tree: &mut Tree) -> Result<bool, DocNormError> {
    let Some(img) = tree.query_first(&DIV_IMG) else {
        return Ok(false);
    };
    let div = tree.parent(img).ok_or_else(|| DocNormError::MalformedTree {
        rule: "div>img",
        detail: "matched img has no parent".to_string(),
    })?;
    if tree.parent(div).is_none() {
        return Err(DocNormError::MalformedTree {
            rule: "div>img",
            detail: "image div has no parent".to_string(),
        });
    }

    tree.replace_with_children(div, false)?;

    let still_in_div = tree.parent(img).is_some_and(|p| tree.is_tag(p, Tag::Div));
    if !still_in_div {
        tree.replace_with_text(img, " ");
    }
    Ok(true)
}

fn remove_first_hidden_div(tree: &mut Tree) -> Result<bool, DocNormError> {
    let Some(div) = tree.query_first(&DIV_HIDDEN) else {
        return Ok(false);
    };
    tree.detach(div);
    Ok(true)
}

/// Legacy `<font size>` scale to points; anything unknown is 9pt.
pub fn font_size_points(size: &str) -> &'static str {
    match size.trim() {
        "1" => "7pt",
        "2" => "9pt",
        "3" => "10pt",
        "4" => "12pt",
        "5" => "16pt",
        "6" => "20pt",
        "7" => "30pt",
        _ => "9pt",
    }
}

fn style_div(tree: &mut Tree, div: NodeId) {
    ensure_style_attribute(tree, div);
    let mut style = style_of(tree, div);
    let mut touched = false;

    if let Some(face) = tree.remove_attr(div, "face") {
        style.push("font-family", &face.trim().to_lowercase());
        touched = true;
    }
    if let Some(size) = tree.remove_attr(div, "size") {
        style.push("font-size", &font_size_points(&size).to_lowercase());
        touched = true;
    }

    if touched {
        set_style(tree, div, &style);
    }
}

fn style_td(tree: &mut Tree, td: NodeId) {
    ensure_style_attribute(tree, td);
    let mut style = style_of(tree, td);

    match tree.remove_attr(td, "align") {
        Some(align) => style.push("text-align", align.trim()),
        None if !style.declares("text-align") => style.push("text-align", "left"),
        None => {}
    }
    if let Some(valign) = tree.remove_attr(td, "valign") {
        style.push("vertical-align", valign.trim());
    }
    if let Some(width) = tree.remove_attr(td, "width") {
        style.push("width", &px_length(&width));
    }

    set_style(tree, td, &style);
}

fn style_p(tree: &mut Tree, p: NodeId) {
    if !tree.has_attrs(p) {
        return;
    }
    ensure_style_attribute(tree, p);
    if let Some(align) = tree.remove_attr(p, "align") {
        let mut style = style_of(tree, p);
        style.push("text-align", &align.trim().to_lowercase());
        set_style(tree, p, &style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalise(markup: &str) -> String {
        let mut tree = Tree::parse(markup.as_bytes()).unwrap();
        let mut rec = PassRecorder::new(2);
        run(&mut tree, &mut rec).unwrap();
        tree.serialize()
    }

    fn body(out: &str) -> &str {
        let start = out.find("<body>").map(|i| i + "<body>".len()).unwrap_or(0);
        let end = out.rfind("</body>").unwrap_or(out.len());
        &out[start..end]
    }

    #[test]
    fn nested_image_divs_collapse_to_a_space() {
        let out = normalise(r#"<div><div><div><img src="a.png"/></div></div></div>"#);
        assert_eq!(body(&out), " ");
    }

    #[test]
    fn image_div_keeps_other_content() {
        let out = normalise(r#"<p>x</p><div>cap<img src="a.png"></div>"#);
        assert_eq!(body(&out), "<p>x</p>cap ");
    }

    #[test]
    fn hidden_divs_are_removed() {
        let out = normalise(r#"<div class="Top_Hidden"><p>secret</p></div><p>shown</p>"#);
        assert!(!out.contains("secret"), "got: {out}");
        assert!(out.contains("<p>shown</p>"), "got: {out}");
    }

    #[test]
    fn blank_divs_are_emptied() {
        let out = normalise(r#"<div class="blank" id="b"><span>x</span></div>"#);
        assert!(out.contains(r#"<div class="blank" id="b" style=""></div>"#), "got: {out}");
    }

    #[test]
    fn td_images_survive() {
        let out = normalise(r#"<table><tr><td><img src="a.png"></td></tr></table>"#);
        assert!(out.contains(r#"<img src="a.png" />"#), "got: {out}");
    }

    #[test]
    fn div_font_migration() {
        let out = normalise(r#"<div face="Arial" size="5">x</div><div size="9">y</div>"#);
        assert!(
            out.contains(r#"<div style="font-family: arial;font-size: 16pt;">x</div>"#),
            "got: {out}"
        );
        assert!(out.contains(r#"<div style="font-size: 9pt;">y</div>"#), "got: {out}");
    }

    #[test]
    fn plain_div_gets_empty_style() {
        let out = normalise("<div>x</div>");
        assert!(out.contains(r#"<div style="">x</div>"#), "got: {out}");
    }

    #[test]
    fn td_defaults_to_left_alignment() {
        let out = normalise(r#"<table><tr><td>a</td><td align="right" valign="top" width="20">b</td></tr></table>"#);
        assert!(out.contains(r#"<td style="text-align: left;">a</td>"#), "got: {out}");
        assert!(
            out.contains(r#"<td style="text-align: right;vertical-align: top;width: 20px;">b</td>"#),
            "got: {out}"
        );
    }

    #[test]
    fn td_with_declared_alignment_is_not_overridden() {
        let out = normalise(r#"<table><tr><td style="text-align: center;">a</td></tr></table>"#);
        assert!(out.contains(r#"<td style="text-align: center;">a</td>"#), "got: {out}");
    }

    #[test]
    fn paragraph_alignment_is_lowercased() {
        let out = normalise(r#"<p align="CENTER">a</p><p>b</p>"#);
        assert!(out.contains(r#"<p style="text-align: center;">a</p>"#), "got: {out}");
        assert!(out.contains("<p>b</p>"), "got: {out}");
    }

    #[test]
    fn font_size_table() {
        assert_eq!(font_size_points("1"), "7pt");
        assert_eq!(font_size_points("7"), "30pt");
        assert_eq!(font_size_points("+1"), "9pt");
    }
}
