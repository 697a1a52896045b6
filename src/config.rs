//! Configuration types for HTML normalisation.
//!
//! All knobs live in [`NormalizeConfig`], built via its
//! [`NormalizeConfigBuilder`]. The rewrite rules themselves are fixed; the
//! config only controls what surrounds them (skeleton decoration, image
//! embedding, the iteration budget, batch concurrency).

use crate::error::DocNormError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Title injected into `<head>` when a bare fragment is wrapped.
pub const DEFAULT_DOCUMENT_TITLE: &str = "HTML to PDF";

/// Directory image references are resolved against by default.
pub const DEFAULT_IMAGE_ROOT: &str = "Images/";

/// Configuration for a normalisation run.
///
/// # Example
/// ```rust
/// use docnorm::{FormPolicy, NormalizeConfig};
///
/// let config = NormalizeConfig::builder()
///     .document_title("Discharge summary")
///     .form_policy(FormPolicy::Unwrap)
///     .concurrency(8)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 8);
/// ```
#[derive(Clone)]
pub struct NormalizeConfig {
    /// `<title>` added when the input has no `<html>` tag of its own.
    pub document_title: String,

    /// What to do with `<form>` elements. Default: [`FormPolicy::Discard`].
    ///
    /// Discarding drops the form *and everything inside it*. That is the
    /// legacy behaviour and stays the default; [`FormPolicy::Unwrap`] keeps
    /// the content for callers who cannot afford the loss.
    pub form_policy: FormPolicy,

    /// Rewrite `img` sources into `data:` URIs. Default: false.
    ///
    /// Off by default because the typesetting backend normally pulls images
    /// through the image-resolution callback instead.
    pub embed_images: bool,

    /// Directory relative image references are resolved against. Default: `Images/`.
    pub image_root: PathBuf,

    /// Iteration budget multiplier for fixed-point rules. Default: 2.
    ///
    /// A rule may rewrite at most `factor × tree_size + 1` times before the
    /// run fails with [`DocNormError::FixedPointNotReached`]. Every rule
    /// shrinks or renames at least one node per step, so the default is far
    /// above what a terminating rule ever needs.
    pub fixed_point_factor: usize,

    /// Maximum files normalised at once by [`crate::convert::normalize_batch`]. Default: 4.
    pub concurrency: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Timeout for fetching remote images in seconds. Default: 30.
    pub image_timeout_secs: u64,

    /// Optional per-file progress events for batch runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            document_title: DEFAULT_DOCUMENT_TITLE.to_string(),
            form_policy: FormPolicy::default(),
            embed_images: false,
            image_root: PathBuf::from(DEFAULT_IMAGE_ROOT),
            fixed_point_factor: 2,
            concurrency: 4,
            download_timeout_secs: 120,
            image_timeout_secs: 30,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for NormalizeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizeConfig")
            .field("document_title", &self.document_title)
            .field("form_policy", &self.form_policy)
            .field("embed_images", &self.embed_images)
            .field("image_root", &self.image_root)
            .field("fixed_point_factor", &self.fixed_point_factor)
            .field("concurrency", &self.concurrency)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("image_timeout_secs", &self.image_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl NormalizeConfig {
    /// Create a new builder for `NormalizeConfig`.
    pub fn builder() -> NormalizeConfigBuilder {
        NormalizeConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`NormalizeConfig`].
#[derive(Debug)]
pub struct NormalizeConfigBuilder {
    config: NormalizeConfig,
}

impl NormalizeConfigBuilder {
    pub fn document_title(mut self, title: impl Into<String>) -> Self {
        self.config.document_title = title.into();
        self
    }

    pub fn form_policy(mut self, policy: FormPolicy) -> Self {
        self.config.form_policy = policy;
        self
    }

    pub fn embed_images(mut self, v: bool) -> Self {
        self.config.embed_images = v;
        self
    }

    pub fn image_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.image_root = root.into();
        self
    }

    pub fn fixed_point_factor(mut self, factor: usize) -> Self {
        self.config.fixed_point_factor = factor;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn image_timeout_secs(mut self, secs: u64) -> Self {
        self.config.image_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<NormalizeConfig, DocNormError> {
        let c = &self.config;
        if c.fixed_point_factor == 0 {
            return Err(DocNormError::InvalidConfig(
                "fixed_point_factor must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(DocNormError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.document_title.trim().is_empty() {
            return Err(DocNormError::InvalidConfig(
                "document_title must not be blank".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Policy for `<form>` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormPolicy {
    /// Remove the form and all of its content. (default)
    #[default]
    Discard,
    /// Remove only the `<form>` wrapper; its children take its place.
    Unwrap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = NormalizeConfig::default();
        assert_eq!(c.document_title, "HTML to PDF");
        assert_eq!(c.form_policy, FormPolicy::Discard);
        assert!(!c.embed_images);
        assert_eq!(c.image_root, PathBuf::from("Images/"));
        assert_eq!(c.fixed_point_factor, 2);
    }

    #[test]
    fn builder_rejects_zero_factor() {
        let err = NormalizeConfig::builder()
            .fixed_point_factor(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, DocNormError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_blank_title() {
        assert!(NormalizeConfig::builder()
            .document_title("   ")
            .build()
            .is_err());
    }

    #[test]
    fn concurrency_is_clamped() {
        let c = NormalizeConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn form_policy_serde_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&FormPolicy::Unwrap).unwrap(),
            "\"unwrap\""
        );
    }
}
