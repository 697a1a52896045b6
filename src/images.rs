//! Image resolution for the typesetting backend.
//!
//! The backend asks for image bytes by the `src` it found in the markup.
//! [`ImageProvider`] answers, with a per-conversion store so each unique
//! reference is loaded once no matter how often it appears.
//!
//! [`CachingImageProvider`] understands three kinds of reference:
//!
//! * `data:` URIs (base64 or plain payloads)
//! * `http://` / `https://` URLs, fetched with a blocking `reqwest` client
//! * file paths, absolute or relative to the image root (default `Images/`)
//!
//! Loaded bytes are sniffed with [`image::guess_format`]; anything that is
//! not a known raster format is rejected rather than handed to the backend.

use crate::config::DEFAULT_IMAGE_ROOT;
use crate::error::ImageResolveError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use once_cell::unsync::OnceCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Image bytes plus their sniffed format. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    bytes: Arc<[u8]>,
    format: ImageFormat,
}

impl ResolvedImage {
    /// Sniff `bytes`; `None` when they are not a recognised image.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        let format = image::guess_format(&bytes).ok()?;
        Some(Self {
            bytes: Arc::from(bytes),
            format,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    /// `data:<mime>;base64,<payload>`, for inlining into `src`.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), STANDARD.encode(&self.bytes))
    }
}

/// Source of image bytes for one conversion.
///
/// Implementors supply storage (`retrieve`/`store`/`reset`) and loading
/// (`load`); [`ImageProvider::resolve`] ties them together.
pub trait ImageProvider {
    /// Directory relative references are resolved against.
    fn image_root(&self) -> &Path;

    /// Previously stored outcome for `src`, failures included.
    fn retrieve(&self, src: &str) -> Option<Result<ResolvedImage, ImageResolveError>>;

    fn store(&mut self, src: &str, outcome: Result<ResolvedImage, ImageResolveError>);

    /// Forget everything stored so far.
    fn reset(&mut self);

    /// Load `src` from wherever it lives, bypassing the store.
    fn load(&self, src: &str) -> Result<ResolvedImage, ImageResolveError>;

    /// Stored outcome if there is one, otherwise load and store it.
    ///
    /// A failed load is stored as well, so a broken reference costs one
    /// attempt per conversion however often it appears.
    fn resolve(&mut self, src: &str) -> Result<ResolvedImage, ImageResolveError> {
        if let Some(outcome) = self.retrieve(src) {
            return outcome;
        }
        let outcome = self.load(src);
        self.store(src, outcome.clone());
        outcome
    }
}

/// The standard provider: in-memory store, local/remote/data-URI loading.
#[derive(Debug)]
pub struct CachingImageProvider {
    root: PathBuf,
    timeout: Duration,
    cache: HashMap<String, Result<ResolvedImage, ImageResolveError>>,
    client: OnceCell<reqwest::blocking::Client>,
}

impl Default for CachingImageProvider {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_ROOT)
    }
}

impl CachingImageProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            timeout: Duration::from_secs(30),
            cache: HashMap::new(),
            client: OnceCell::new(),
        }
    }

    /// Timeout for remote images.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of distinct references stored, failed ones included.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn load_data_uri(&self, src: &str) -> Result<Vec<u8>, ImageResolveError> {
        let invalid = |reason: &str| ImageResolveError::InvalidDataUri {
            src: src.to_string(),
            reason: reason.to_string(),
        };
        let rest = src
            .strip_prefix("data:")
            .ok_or_else(|| invalid("missing data: prefix"))?;
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| invalid("missing ',' separator"))?;

        if meta.split(';').any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
            STANDARD
                .decode(compact)
                .map_err(|e| invalid(&e.to_string()))
        } else {
            Ok(payload.as_bytes().to_vec())
        }
    }

    fn load_remote(&self, src: &str) -> Result<Vec<u8>, ImageResolveError> {
        let failed = |reason: String| ImageResolveError::FetchFailed {
            src: src.to_string(),
            reason,
        };
        let client = self.client.get_or_try_init(|| {
            reqwest::blocking::Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(|e| failed(e.to_string()))
        })?;

        debug!("Fetching image: {}", src);
        let response = client.get(src).send().map_err(|e| failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| failed(e.to_string()))
    }

    fn load_local(&self, src: &str) -> Result<Vec<u8>, ImageResolveError> {
        let path = self.local_path(src);
        std::fs::read(&path).map_err(|_| ImageResolveError::NotFound {
            src: src.to_string(),
            path: path.display().to_string(),
        })
    }

    fn local_path(&self, src: &str) -> PathBuf {
        let trimmed = src.strip_prefix("file://").unwrap_or(src);
        let path = Path::new(trimmed);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl ImageProvider for CachingImageProvider {
    fn image_root(&self) -> &Path {
        &self.root
    }

    fn retrieve(&self, src: &str) -> Option<Result<ResolvedImage, ImageResolveError>> {
        self.cache.get(src).cloned()
    }

    fn store(&mut self, src: &str, outcome: Result<ResolvedImage, ImageResolveError>) {
        self.cache.insert(src.to_string(), outcome);
    }

    fn reset(&mut self) {
        self.cache.clear();
    }

    fn load(&self, src: &str) -> Result<ResolvedImage, ImageResolveError> {
        let src = src.trim();
        let bytes = if src.starts_with("data:") {
            self.load_data_uri(src)?
        } else if src.starts_with("http://") || src.starts_with("https://") {
            self.load_remote(src)?
        } else {
            self.load_local(src)?
        };

        ResolvedImage::from_bytes(bytes).ok_or_else(|| ImageResolveError::UnsupportedFormat {
            src: src.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("encode png");
        buf
    }

    #[test]
    fn sniffs_png() {
        let image = ResolvedImage::from_bytes(png_bytes()).unwrap();
        assert_eq!(image.format(), ImageFormat::Png);
        assert_eq!(image.mime_type(), "image/png");
        assert!(image.to_data_uri().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn rejects_non_images() {
        assert!(ResolvedImage::from_bytes(b"<html></html>".to_vec()).is_none());
    }

    #[test]
    fn loads_relative_to_root_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.png"), png_bytes()).unwrap();

        let mut provider = CachingImageProvider::new(dir.path());
        let first = provider.resolve("logo.png").unwrap();
        assert_eq!(provider.cached(), 1);

        // served from the store even once the file is gone
        std::fs::remove_file(dir.path().join("logo.png")).unwrap();
        let second = provider.resolve("logo.png").unwrap();
        assert_eq!(first, second);

        provider.reset();
        assert!(matches!(
            provider.resolve("logo.png"),
            Err(ImageResolveError::NotFound { .. })
        ));
    }

    #[test]
    fn failed_loads_are_remembered() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = CachingImageProvider::new(dir.path());

        let first = provider.resolve("missing.png").unwrap_err();
        assert!(matches!(first, ImageResolveError::NotFound { .. }));
        assert_eq!(provider.cached(), 1);

        // the file appearing later must not trigger a second load
        std::fs::write(dir.path().join("missing.png"), png_bytes()).unwrap();
        assert_eq!(provider.resolve("missing.png").unwrap_err(), first);
        assert_eq!(provider.cached(), 1);

        provider.reset();
        assert!(provider.resolve("missing.png").is_ok());
    }

    #[test]
    fn each_reference_is_loaded_once() {
        use std::cell::Cell;

        struct Counting {
            inner: CachingImageProvider,
            loads: Cell<usize>,
        }

        impl ImageProvider for Counting {
            fn image_root(&self) -> &Path {
                self.inner.image_root()
            }
            fn retrieve(&self, src: &str) -> Option<Result<ResolvedImage, ImageResolveError>> {
                self.inner.retrieve(src)
            }
            fn store(&mut self, src: &str, outcome: Result<ResolvedImage, ImageResolveError>) {
                self.inner.store(src, outcome)
            }
            fn reset(&mut self) {
                self.inner.reset()
            }
            fn load(&self, src: &str) -> Result<ResolvedImage, ImageResolveError> {
                self.loads.set(self.loads.get() + 1);
                self.inner.load(src)
            }
        }

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.png"), png_bytes()).unwrap();
        let mut provider = Counting {
            inner: CachingImageProvider::new(dir.path()),
            loads: Cell::new(0),
        };

        for src in ["logo.png", "dead.png", "logo.png", "dead.png", "dead.png"] {
            let _ = provider.resolve(src);
        }
        assert_eq!(provider.loads.get(), 2);
    }

    #[test]
    fn data_uri_roundtrip() {
        let original = ResolvedImage::from_bytes(png_bytes()).unwrap();
        let provider = CachingImageProvider::default();
        let loaded = provider.load(&original.to_data_uri()).unwrap();
        assert_eq!(loaded.bytes(), original.bytes());
    }

    #[test]
    fn malformed_data_uri() {
        let provider = CachingImageProvider::default();
        let err = provider.load("data:image/png;base64").unwrap_err();
        assert!(matches!(err, ImageResolveError::InvalidDataUri { .. }));
        let err = provider.load("data:image/png;base64,!!!").unwrap_err();
        assert!(matches!(err, ImageResolveError::InvalidDataUri { .. }));
    }

    #[test]
    fn unknown_format_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.png"), b"just text").unwrap();
        let provider = CachingImageProvider::new(dir.path());
        let err = provider.load("notes.png").unwrap_err();
        assert_eq!(err.src(), "notes.png");
        assert!(matches!(err, ImageResolveError::UnsupportedFormat { .. }));
    }

    #[test]
    fn default_root_is_images_dir() {
        let provider = CachingImageProvider::default();
        assert_eq!(provider.image_root(), Path::new("Images/"));
    }
}
