//! Input resolution: turn a user-supplied path or URL into markup bytes.
//!
//! ## Why download to a temp file?
//!
//! Batch runs name their outputs after the input file, and the worker hands
//! converters file paths rather than buffers. Downloading into a `TempDir`
//! gives URL inputs a real path with a real file name, and the directory is
//! removed when [`ResolvedInput`] is dropped, even on panic.
//!
//! Inputs are sniffed before parsing: html5ever will happily build a tree
//! out of a PDF or a JPEG, which would "normalise" into a page of garbage.

use crate::error::DocNormError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// How many leading bytes the sniffer looks at.
const SNIFF_LEN: usize = 512;

/// The resolved input: either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the document lives in a temp directory kept alive
    /// until this value is dropped.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Reject bytes that are clearly not markup.
pub fn sniff_markup(path: &Path, bytes: &[u8]) -> Result<(), DocNormError> {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    let detail = if head.starts_with(b"%PDF") {
        Some("starts with %PDF")
    } else if head.contains(&0) {
        Some("contains NUL bytes")
    } else {
        None
    };
    match detail {
        Some(detail) => Err(DocNormError::NotHtml {
            path: path.to_path_buf(),
            detail: detail.to_string(),
        }),
        None => Ok(()),
    }
}

/// Read a local file, mapping I/O failures to input errors and sniffing it.
pub fn read_local(path: &Path) -> Result<Vec<u8>, DocNormError> {
    let mut file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => DocNormError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => DocNormError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| DocNormError::Internal(format!("Failed to read {}: {}", path.display(), e)))?;

    sniff_markup(path, &bytes)?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

/// Resolve the input string to a local file.
///
/// URLs are downloaded into a temporary directory; local paths must exist.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, DocNormError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else if input.trim().is_empty() {
        Err(DocNormError::InvalidInput {
            input: input.to_string(),
        })
    } else {
        let path = PathBuf::from(input);
        if !path.is_file() {
            return Err(DocNormError::FileNotFound { path });
        }
        debug!("Resolved local input: {}", path.display());
        Ok(ResolvedInput::Local(path))
    }
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, DocNormError> {
    info!("Downloading document from: {}", url);

    let failed = |reason: String| DocNormError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocNormError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let filename = filename_from_url(url);
    let temp_dir = TempDir::new().map_err(|e| DocNormError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    sniff_markup(&file_path, &bytes)?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| DocNormError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded to: {}", file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded.html".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/page.html"));
        assert!(is_url("http://example.com/page.html"));
        assert!(!is_url("/tmp/page.html"));
        assert!(!is_url("page.html"));
        assert!(!is_url(""));
    }

    #[test]
    fn sniffer_rejects_pdf_and_binary() {
        let p = Path::new("x");
        assert!(matches!(
            sniff_markup(p, b"%PDF-1.7\n..."),
            Err(DocNormError::NotHtml { .. })
        ));
        assert!(matches!(
            sniff_markup(p, b"GIF89a\0\0\x01"),
            Err(DocNormError::NotHtml { .. })
        ));
        assert!(sniff_markup(p, b"<p>fine</p>").is_ok());
        assert!(sniff_markup(p, b"").is_ok());
    }

    #[test]
    fn nul_past_the_sniff_window_is_tolerated() {
        let mut bytes = vec![b' '; SNIFF_LEN];
        bytes.push(0);
        assert!(sniff_markup(Path::new("x"), &bytes).is_ok());
    }

    #[test]
    fn filename_extraction() {
        assert_eq!(filename_from_url("https://example.com/docs/report.html"), "report.html");
        assert_eq!(filename_from_url("https://example.com/docs/"), "downloaded.html");
    }

    #[test]
    fn read_local_missing_file() {
        let err = read_local(Path::new("/definitely/not/here.html")).unwrap_err();
        assert!(matches!(err, DocNormError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn resolve_local_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.html");
        std::fs::write(&file, "<p>x</p>").unwrap();

        let resolved = resolve_input(file.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.path(), file.as_path());

        let missing = dir.path().join("nope.html");
        assert!(matches!(
            resolve_input(missing.to_str().unwrap(), 5).await,
            Err(DocNormError::FileNotFound { .. })
        ));
        assert!(matches!(
            resolve_input("  ", 5).await,
            Err(DocNormError::InvalidInput { .. })
        ));
    }
}
