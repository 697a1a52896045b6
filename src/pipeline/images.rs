//! Image embedding: rewrite `img` sources into `data:` URIs.
//!
//! Optional (see [`crate::config::NormalizeConfig::embed_images`]). A
//! reference that cannot be resolved is left as it was and reported; one
//! broken logo never fails a document.

use super::{tag_path, PassRecorder};
use crate::error::ImageResolveError;
use crate::images::ImageProvider;
use crate::tree::{TagPath, Tree};
use once_cell::sync::Lazy;
use tracing::warn;

static IMG: Lazy<TagPath> = Lazy::new(|| tag_path("img"));

/// Outcome of an embedding pass.
#[derive(Debug, Default)]
pub struct EmbedReport {
    pub embedded: usize,
    pub failures: Vec<ImageResolveError>,
}

/// Every non-empty `img` source in document order, duplicates included.
pub fn image_sources(tree: &Tree) -> Vec<String> {
    tree.query(&IMG)
        .into_iter()
        .filter_map(|img| tree.attr(img, "src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_data_uri(src: &str) -> bool {
    src.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:"))
}

pub fn embed(
    tree: &mut Tree,
    provider: &mut dyn ImageProvider,
    recorder: &mut PassRecorder,
) -> EmbedReport {
    let mut report = EmbedReport::default();

    for img in tree.query(&IMG) {
        let Some(src) = tree.attr(img, "src").map(|s| s.trim().to_string()) else {
            continue;
        };
        if src.is_empty() || is_data_uri(&src) {
            continue;
        }
        match provider.resolve(&src) {
            Ok(image) => {
                tree.set_attr(img, "src", image.to_data_uri());
                report.embedded += 1;
            }
            Err(e) => {
                warn!("Image left as a reference: {}", e);
                report.failures.push(e);
            }
        }
    }

    recorder.record("embed-images", report.embedded);
    report
}
