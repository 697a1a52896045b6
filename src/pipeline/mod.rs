//! Rewrite passes for HTML normalisation.
//!
//! Each submodule implements one stage of the pipeline. Stages only talk to
//! each other through the [`Tree`], so each can be tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ skeleton ──▶ cleanup ──▶ tables ──▶ blocks ◀──▶ restructure ──▶ images
//!                                                (div/td/p)   (u/strong/p/
//!                                                              ol/ul/li)
//! ```
//!
//! 1. [`input`]      : canonicalise a path or URL to a local HTML file
//! 2. [`skeleton`]   : guarantee `html > head, body`
//! 3. [`cleanup`]    : strip `meta`/`form`, normalise `br`, `font` → `div`
//! 4. [`tables`]     : collapse invalid tables, migrate table attributes
//! 5. [`blocks`]     : image/div repairs and legacy attribute migration
//! 6. [`restructure`]: repair block-in-inline and block-in-list nestings;
//!    alternates with [`blocks`] until it finds nothing left to repair
//! 7. [`images`]     : optionally inline `img` sources as data URIs
//!
//! ## Why a fixed-point driver?
//!
//! The tolerant parser can nest things in surprising ways, and many rewrites
//! expose new matches for the same rule (removing one `meta` can surface a
//! mis-nested one, unwrapping a `div` can put an `img` directly under the
//! next `div`). Every rule is therefore written as "apply one rewrite to the
//! first match and say whether anything changed", and [`PassRecorder::fixed_point`]
//! repeats it until nothing matches. The repeat count is capped by the tree
//! size so a rule that never settles fails loudly instead of spinning.

pub mod blocks;
pub mod cleanup;
pub mod images;
pub mod input;
pub mod restructure;
pub mod skeleton;
pub mod tables;

use crate::config::NormalizeConfig;
use crate::error::DocNormError;
use crate::output::PassStats;
use crate::tree::{TagPath, Tree};
use tracing::debug;

/// Drives fixed-point rules and records how often each one fired.
#[derive(Debug)]
pub struct PassRecorder {
    factor: usize,
    passes: Vec<PassStats>,
}

impl PassRecorder {
    pub fn new(fixed_point_factor: usize) -> Self {
        Self {
            factor: fixed_point_factor.max(1),
            passes: Vec::new(),
        }
    }

    /// Repeat `step` until it reports no change.
    ///
    /// `step` applies at most one rewrite and returns whether it did. The
    /// budget is `factor × tree.len() + 1` rewrites, fixed when the loop
    /// starts.
    pub fn fixed_point<F>(
        &mut self,
        tree: &mut Tree,
        rule: &'static str,
        mut step: F,
    ) -> Result<usize, DocNormError>
    where
        F: FnMut(&mut Tree) -> Result<bool, DocNormError>,
    {
        let limit = self.factor * tree.len() + 1;
        let mut rewrites = 0usize;
        while step(tree)? {
            rewrites += 1;
            if rewrites > limit {
                return Err(DocNormError::FixedPointNotReached { rule, limit });
            }
        }
        self.record(rule, rewrites);
        Ok(rewrites)
    }

    /// Run `rewrite` once on every node matching `path` at the start of the sweep.
    ///
    /// For rules whose rewrite can never create or destroy a match of their
    /// own pattern, one sweep is a fixed point. Nodes detached by an earlier
    /// rewrite in the same sweep are skipped.
    pub fn sweep<F>(
        &mut self,
        tree: &mut Tree,
        rule: &'static str,
        path: &TagPath,
        mut rewrite: F,
    ) -> Result<usize, DocNormError>
    where
        F: FnMut(&mut Tree, crate::tree::NodeId) -> Result<(), DocNormError>,
    {
        let mut rewrites = 0usize;
        for node in tree.query(path) {
            if !tree.is_attached(node) {
                continue;
            }
            rewrite(tree, node)?;
            rewrites += 1;
        }
        self.record(rule, rewrites);
        Ok(rewrites)
    }

    /// Record a rule that counts its own rewrites.
    pub fn record(&mut self, rule: &'static str, rewrites: usize) {
        debug!("Rule '{}': {} rewrite(s)", rule, rewrites);
        self.passes.push(PassStats {
            rule: rule.to_string(),
            rewrites,
        });
    }

    pub fn total_rewrites(&self) -> usize {
        self.passes.iter().map(|p| p.rewrites).sum()
    }

    pub fn into_passes(self) -> Vec<PassStats> {
        self.passes
    }
}

/// Run every structural pass in order.
///
/// `raw` is the markup the tree was loaded from; the skeleton pass looks at
/// it to tell a full document from a fragment. Image embedding is not part
/// of this because it needs an image provider; see [`images::embed`].
pub fn run_all(
    tree: &mut Tree,
    raw: &[u8],
    config: &NormalizeConfig,
    recorder: &mut PassRecorder,
) -> Result<(), DocNormError> {
    skeleton::run(tree, raw, config, recorder)?;
    cleanup::run(tree, config, recorder)?;
    tables::run(tree, recorder)?;

    // Restructuring can hand the block passes new work (a renamed `p` is a
    // `div` without a style, an unwrapped wrapper can leave an `img` directly
    // in a `div`), so the two alternate until restructuring finds nothing.
    let limit = recorder.factor * tree.len() + 1;
    let mut rounds = 0usize;
    loop {
        blocks::run(tree, recorder)?;
        if restructure::run(tree, recorder)? == 0 {
            break;
        }
        rounds += 1;
        if rounds > limit {
            return Err(DocNormError::FixedPointNotReached {
                rule: "restructure",
                limit,
            });
        }
    }
    Ok(())
}

/// Parse a built-in tag path.
///
/// Only called from `Lazy` statics holding literals, so a failure is a
/// programming error caught by the first test that touches the rule.
pub(crate) fn tag_path(s: &str) -> TagPath {
    s.parse().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tag;

    #[test]
    fn fixed_point_counts_rewrites() {
        let mut tree = Tree::parse(b"<meta a=1><meta a=2><p>x</p>").unwrap();
        let meta = tag_path("meta");
        let mut rec = PassRecorder::new(2);
        let n = rec
            .fixed_point(&mut tree, "meta", |t| match t.query_first(&meta) {
                Some(m) => {
                    t.detach(m);
                    Ok(true)
                }
                None => Ok(false),
            })
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(rec.total_rewrites(), 2);
        assert!(tree.query(&meta).is_empty());
    }

    #[test]
    fn non_terminating_rule_is_detected() {
        let mut tree = Tree::parse(b"<p>x</p>").unwrap();
        let mut rec = PassRecorder::new(1);
        let err = rec
            .fixed_point(&mut tree, "spin", |_| Ok(true))
            .unwrap_err();
        match err {
            DocNormError::FixedPointNotReached { rule, limit } => {
                assert_eq!(rule, "spin");
                assert_eq!(limit, tree.len() + 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn step_errors_propagate() {
        let mut tree = Tree::parse(b"<p>x</p>").unwrap();
        let mut rec = PassRecorder::new(2);
        let err = rec
            .fixed_point(&mut tree, "boom", |_| {
                Err(DocNormError::MalformedTree {
                    rule: "boom",
                    detail: "no parent".into(),
                })
            })
            .unwrap_err();
        assert!(matches!(err, DocNormError::MalformedTree { .. }));
        assert!(rec.into_passes().is_empty());
    }

    #[test]
    fn sweep_skips_detached_matches() {
        let mut tree = Tree::parse(b"<div id=a><div id=b></div></div>").unwrap();
        let mut rec = PassRecorder::new(2);
        let n = rec
            .sweep(&mut tree, "div", &tag_path("div"), |t, node| {
                t.detach(node);
                Ok(())
            })
            .unwrap();
        // detaching the outer div takes the inner one with it
        assert_eq!(n, 1);
        let body = tree.query_first(&tag_path("body")).unwrap();
        assert!(tree.child_by_tag(body, Tag::Div).is_none());
    }
}
