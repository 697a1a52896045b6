//! # docnorm
//!
//! Normalise legacy and malformed HTML into self-contained, CSS-inlined
//! markup that a fixed-layout typesetting backend can paginate.
//!
//! ## Why this crate?
//!
//! Documents written by old editors and mail clients lean on `<font>`,
//! `cellpadding`, `align` and block elements stuffed inside `<u>` or `<li>`.
//! Browsers shrug that off; PDF typesetters do not. This crate rewrites such
//! a document into a small, predictable subset: every presentational
//! attribute becomes an inline `style` declaration, illegal nestings are
//! repaired, and anything unprintable is removed.
//!
//! ## Pipeline Overview
//!
//! ```text
//! HTML
//!  │
//!  ├─ 1. Load        tolerant html5ever parse into an owned tree
//!  ├─ 2. Skeleton    html > head, body (fragments get lang/xmlns/title)
//!  ├─ 3. Cleanup     meta, form, br, font → div
//!  ├─ 4. Tables      collapse invalid tables, migrate table attributes
//!  ├─ 5. Blocks      div/img repair, div/td/p attribute migration
//!  ├─ 6. Restructure u/strong/p/ol/ul/li around div
//!  ├─ 7. Images      optional data-URI embedding
//!  └─ 8. Serialize   XHTML-flavoured markup + per-rule stats
//! ```
//!
//! Rules that can expose new matches of themselves run to a fixed point,
//! bounded by the tree size.
//!
//! ## Quick Start
//!
//! ```rust
//! use docnorm::{normalize, NormalizeConfig};
//!
//! let config = NormalizeConfig::default();
//! let doc = normalize("<u><div>hi</div></u>", &config).unwrap();
//! assert!(doc.html.contains(r#"<div style="text-decoration: underline;">hi</div>"#));
//! eprintln!("{} rewrites", doc.stats.total_rewrites);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docnorm` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docnorm = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod convert;
pub mod error;
pub mod images;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod style;
pub mod tree;
pub mod worker;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{
    Converter, FileStylesheetResolver, HtmlConverter, HtmlSnapshotTypesetter, StylesheetResolver,
    Typesetter,
};
pub use config::{FormPolicy, NormalizeConfig, NormalizeConfigBuilder};
pub use convert::{
    normalize, normalize_batch, normalize_file, normalize_source, normalize_to_file,
    normalize_with_images, output_path_for,
};
pub use error::{DocNormError, ImageResolveError};
pub use images::{CachingImageProvider, ImageProvider, ResolvedImage};
pub use output::{BatchItem, NormalizeStats, NormalizedDocument, PassStats};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use style::InlineStyle;
pub use tree::{NodeId, TagPath, Tree};
pub use worker::{ConverterKind, ConverterRegistry, MimeType, PdfWorker, WorkerOutcome, WorkerReport};
