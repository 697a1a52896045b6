//! Typesetting collaborators and the `input → output` converter contract.
//!
//! Pagination itself is somebody else's job. This module defines what the
//! engine hands over ([`Typesetter`]) and what a typesetter may call back
//! into ([`ImageProvider`], [`StylesheetResolver`]), plus the one converter
//! this crate implements, [`HtmlConverter`].
//!
//! ```text
//! input.html ──▶ read + sniff ──▶ normalize ──▶ Typesetter::typeset ──▶ output
//!                                                 │          │
//!                                          ImageProvider  StylesheetResolver
//! ```
//!
//! [`HtmlSnapshotTypesetter`] is the built-in backend: it exercises both
//! callbacks the way a real paginator would and writes the normalised markup
//! itself, which is what callers want when the PDF step lives elsewhere.

use crate::config::NormalizeConfig;
use crate::convert::{normalize_with_images, write_atomic};
use crate::error::DocNormError;
use crate::images::{CachingImageProvider, ImageProvider};
use crate::pipeline::images::image_sources;
use crate::pipeline::input::read_local;
use crate::tree::{TagPath, Tree};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

// ── Collaborator traits ──────────────────────────────────────────────────

/// Resolves linked style sheets the backend still has to process.
pub trait StylesheetResolver {
    /// Style sheet text for `href`, `None` when it cannot be resolved.
    fn resolve(&self, href: &str) -> Option<String>;
}

/// A fixed-layout backend consuming normalised markup.
pub trait Typesetter {
    fn typeset(
        &self,
        html: &str,
        images: &mut dyn ImageProvider,
        stylesheets: &dyn StylesheetResolver,
        output: &Path,
    ) -> Result<(), DocNormError>;
}

/// `ConvertToPDF(input, output)`: one input file in, one output file out.
///
/// Implemented here for HTML; image, TIFF and word-processor converters are
/// registered by the embedding application.
pub trait Converter: Send + Sync {
    fn convert_to_pdf(&self, input: &Path, output: &Path) -> Result<(), DocNormError>;
}

// ── Style sheets ─────────────────────────────────────────────────────────

/// Reads local style sheets relative to a root directory.
///
/// Remote `href`s are left unresolved; the typesetter decides whether that
/// matters.
#[derive(Debug, Clone)]
pub struct FileStylesheetResolver {
    root: PathBuf,
}

impl FileStylesheetResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl StylesheetResolver for FileStylesheetResolver {
    fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.contains("://") || href.starts_with("//") {
            return None;
        }
        let path = Path::new(href.strip_prefix("file:").unwrap_or(href));
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        std::fs::read_to_string(&path).ok()
    }
}

// ── Built-in backend ─────────────────────────────────────────────────────

/// Writes the normalised markup after resolving everything it references.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlSnapshotTypesetter;

/// What [`HtmlSnapshotTypesetter`] found while walking the document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SnapshotReport {
    pub images_resolved: usize,
    pub images_missing: usize,
    pub stylesheets_resolved: usize,
    pub stylesheets_missing: usize,
}

impl HtmlSnapshotTypesetter {
    /// Resolve every image and linked style sheet, without writing anything.
    pub fn inspect(
        &self,
        html: &str,
        images: &mut dyn ImageProvider,
        stylesheets: &dyn StylesheetResolver,
    ) -> Result<SnapshotReport, DocNormError> {
        let tree = Tree::parse(html.as_bytes())?;
        let mut report = SnapshotReport::default();

        for src in image_sources(&tree) {
            match images.resolve(&src) {
                Ok(_) => report.images_resolved += 1,
                Err(e) => {
                    warn!("{}", e);
                    report.images_missing += 1;
                }
            }
        }

        let links: TagPath = "link[rel=stylesheet]".parse()?;
        for link in tree.query(&links) {
            let Some(href) = tree.attr(link, "href") else {
                continue;
            };
            match stylesheets.resolve(href) {
                Some(_) => report.stylesheets_resolved += 1,
                None => {
                    debug!("Style sheet not resolved: {}", href);
                    report.stylesheets_missing += 1;
                }
            }
        }

        Ok(report)
    }
}

impl Typesetter for HtmlSnapshotTypesetter {
    fn typeset(
        &self,
        html: &str,
        images: &mut dyn ImageProvider,
        stylesheets: &dyn StylesheetResolver,
        output: &Path,
    ) -> Result<(), DocNormError> {
        let report = self.inspect(html, images, stylesheets)?;
        debug!(
            "Snapshot: {} image(s) resolved, {} missing",
            report.images_resolved, report.images_missing
        );
        write_atomic(output, html.as_bytes())
    }
}

// ── HTML converter ───────────────────────────────────────────────────────

/// Normalise an HTML file and hand it to a [`Typesetter`].
///
/// Each call gets a fresh image store, so references are loaded once per
/// conversion and never shared between conversions.
#[derive(Debug, Clone)]
pub struct HtmlConverter<T> {
    typesetter: T,
    config: NormalizeConfig,
}

impl<T: Typesetter> HtmlConverter<T> {
    pub fn new(typesetter: T, config: NormalizeConfig) -> Self {
        Self { typesetter, config }
    }

    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    fn image_provider(&self) -> CachingImageProvider {
        CachingImageProvider::new(&self.config.image_root)
            .with_timeout(Duration::from_secs(self.config.image_timeout_secs))
    }
}

impl<T: Typesetter + Send + Sync> Converter for HtmlConverter<T> {
    fn convert_to_pdf(&self, input: &Path, output: &Path) -> Result<(), DocNormError> {
        info!("Converting HTML: {}", input.display());
        let markup = read_local(input)?;

        let mut images = self.image_provider();
        let doc = normalize_with_images(&markup, &self.config, &mut images)?;

        let root = input.parent().unwrap_or_else(|| Path::new("."));
        let stylesheets = FileStylesheetResolver::new(root);
        self.typesetter
            .typeset(&doc.html, &mut images, &stylesheets, output)
    }
}
