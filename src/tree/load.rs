//! Loading: html5ever builds an `RcDom`, which is copied into a [`Tree`].
//!
//! The parser repairs malformed markup on its own (implicit `html`/`head`/
//! `body`, auto-closed tags, foster-parented table content). Nothing here
//! tries to second-guess it.

use super::{Attributes, NodeId, Tree};
use crate::error::DocNormError;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use tracing::debug;

pub(super) fn parse(markup: &[u8]) -> Result<Tree, DocNormError> {
    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut &markup[..])
        .map_err(|e| DocNormError::Parse(e.to_string()))?;

    let mut tree = Tree::new();
    let document = tree.document();
    import(&mut tree, document, &dom.document);
    debug!("Loaded {} bytes of markup into {} nodes", markup.len(), tree.len());

    let has_html = tree
        .element_children(document)
        .any(|c| tree.is_tag(c, super::Tag::Html));
    if !has_html {
        return Err(DocNormError::Parse(
            "parser produced no <html> element".into(),
        ));
    }

    Ok(tree)
}

/// Copy the children of `handle` under `parent`, depth-first, without recursion.
fn import(tree: &mut Tree, parent: NodeId, handle: &Handle) {
    let mut stack: Vec<(NodeId, Handle)> = vec![(parent, handle.clone())];

    while let Some((parent, handle)) = stack.pop() {
        let mut pending: Vec<(NodeId, Handle)> = Vec::new();

        for child in handle.children.borrow().iter() {
            let id = match &child.data {
                NodeData::Doctype {
                    name,
                    public_id,
                    system_id,
                } => tree.create_doctype(name, public_id, system_id),
                NodeData::Element {
                    name,
                    attrs,
                    template_contents,
                    ..
                } => {
                    let attrs: Attributes = attrs
                        .borrow()
                        .iter()
                        .map(|a| {
                            let key = match &a.name.prefix {
                                Some(prefix) => format!("{}:{}", prefix, a.name.local),
                                None => a.name.local.to_string(),
                            };
                            (key, a.value.to_string())
                        })
                        .collect();
                    let id = tree.create_element(&name.local, attrs);
                    pending.push((id, child.clone()));
                    if let Some(contents) = template_contents.borrow().as_ref() {
                        pending.push((id, contents.clone()));
                    }
                    id
                }
                NodeData::Text { contents } => tree.create_text(contents.borrow().to_string()),
                NodeData::Comment { contents } => tree.create_comment(contents.to_string()),
                NodeData::Document | NodeData::ProcessingInstruction { .. } => continue,
            };
            tree.append(parent, id);
        }

        // Children are appended before their own children are visited, so
        // the visiting order does not affect sibling order.
        stack.extend(pending);
    }
}
