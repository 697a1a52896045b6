//! Output types returned by the normalisation entry points.
//!
//! Everything here is `Serialize` so the CLI's `--json` mode can dump it
//! verbatim.

use crate::error::ImageResolveError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A normalised document plus what it took to produce it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedDocument {
    /// Serialised, CSS-inlined markup ready for the typesetting backend.
    pub html: String,
    pub stats: NormalizeStats,
}

/// Per-run statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizeStats {
    pub input_bytes: usize,
    pub output_bytes: usize,
    /// Nodes allocated while normalising, detached ones included.
    pub node_count: usize,
    /// One entry per rule, in the order the rules ran.
    pub passes: Vec<PassStats>,
    pub total_rewrites: usize,
    pub duration_ms: u64,
    pub images_embedded: usize,
    pub image_failures: Vec<ImageResolveError>,
}

impl NormalizeStats {
    /// Rewrites performed by the rule called `rule`, zero if it never ran.
    pub fn rewrites_for(&self, rule: &str) -> usize {
        self.passes
            .iter()
            .filter(|p| p.rule == rule)
            .map(|p| p.rewrites)
            .sum()
    }
}

/// How many times one rule rewrote the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassStats {
    pub rule: String,
    pub rewrites: usize,
}

/// Result for one input of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub input: String,
    pub output: PathBuf,
    /// `None` when the file failed.
    pub stats: Option<NormalizeStats>,
    /// Human-readable failure, `None` on success.
    pub error: Option<String>,
}

impl BatchItem {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_for_sums_matching_rules() {
        let stats = NormalizeStats {
            passes: vec![
                PassStats {
                    rule: "meta".into(),
                    rewrites: 2,
                },
                PassStats {
                    rule: "u>div".into(),
                    rewrites: 1,
                },
            ],
            ..Default::default()
        };
        assert_eq!(stats.rewrites_for("meta"), 2);
        assert_eq!(stats.rewrites_for("form"), 0);
    }

    #[test]
    fn batch_item_serialises_failures() {
        let item = BatchItem {
            input: "missing.html".into(),
            output: PathBuf::from("out/missing_PDF.html"),
            stats: None,
            error: Some("Input file not found".into()),
        };
        assert!(!item.is_success());
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["stats"], serde_json::Value::Null);
        assert_eq!(json["error"], "Input file not found");
    }
}
