//! Normalisation entry points.
//!
//! ## Sync core, async edges
//!
//! The pipeline itself is synchronous and CPU-bound: one call, one private
//! [`Tree`], no shared state. [`normalize`] and [`normalize_file`] expose it
//! directly. The async functions add what a service needs around it (URL
//! inputs, atomic writes, bounded-concurrency batches) and run the pipeline
//! in `spawn_blocking` so Tokio worker threads never stall on a large
//! document.

use crate::config::NormalizeConfig;
use crate::error::DocNormError;
use crate::images::{CachingImageProvider, ImageProvider};
use crate::output::{BatchItem, NormalizeStats, NormalizedDocument};
use crate::pipeline::{self, images, input, PassRecorder};
use crate::tree::Tree;
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Normalise markup in memory.
///
/// This is the primary entry point for the library.
///
/// # Example
/// ```rust
/// use docnorm::{normalize, NormalizeConfig};
///
/// let doc = normalize(r#"<font face="Arial" size="5">x</font>"#, &NormalizeConfig::default()).unwrap();
/// assert!(doc.html.contains("font-family: arial;font-size: 16pt;"));
/// ```
///
/// # Errors
/// - [`DocNormError::Parse`] when no tree can be built at all
/// - [`DocNormError::MalformedTree`] / [`DocNormError::FixedPointNotReached`]
///   when a rewrite cannot complete; no partial output is returned
pub fn normalize(
    markup: impl AsRef<[u8]>,
    config: &NormalizeConfig,
) -> Result<NormalizedDocument, DocNormError> {
    let mut provider = CachingImageProvider::new(&config.image_root)
        .with_timeout(Duration::from_secs(config.image_timeout_secs));
    normalize_with_images(markup, config, &mut provider)
}

/// [`normalize`] with a caller-supplied image provider.
///
/// The provider is only consulted when `config.embed_images` is set. Its
/// store is left populated so a typesetter can reuse it.
pub fn normalize_with_images(
    markup: impl AsRef<[u8]>,
    config: &NormalizeConfig,
    provider: &mut dyn ImageProvider,
) -> Result<NormalizedDocument, DocNormError> {
    let start = Instant::now();
    let markup = markup.as_ref();

    let mut tree = Tree::parse(markup)?;
    let mut recorder = PassRecorder::new(config.fixed_point_factor);
    pipeline::run_all(&mut tree, markup, config, &mut recorder)?;

    let report = if config.embed_images {
        images::embed(&mut tree, provider, &mut recorder)
    } else {
        images::EmbedReport::default()
    };

    let html = tree.serialize();
    let stats = NormalizeStats {
        input_bytes: markup.len(),
        output_bytes: html.len(),
        node_count: tree.len(),
        total_rewrites: recorder.total_rewrites(),
        passes: recorder.into_passes(),
        duration_ms: start.elapsed().as_millis() as u64,
        images_embedded: report.embedded,
        image_failures: report.failures,
    };

    info!(
        "Normalised {} → {} bytes ({} rewrites) in {}ms",
        stats.input_bytes, stats.output_bytes, stats.total_rewrites, stats.duration_ms
    );

    Ok(NormalizedDocument { html, stats })
}

/// Normalise a local file and write the result atomically.
///
/// Blocking; see [`normalize_to_file`] for the async variant that also
/// accepts URLs.
pub fn normalize_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &NormalizeConfig,
) -> Result<NormalizeStats, DocNormError> {
    let markup = input::read_local(input_path.as_ref())?;
    let doc = normalize(&markup, config)?;
    write_atomic(output_path.as_ref(), doc.html.as_bytes())?;
    Ok(doc.stats)
}

/// Normalise a local file or HTTP/HTTPS URL.
pub async fn normalize_source(
    input_str: impl AsRef<str>,
    config: &NormalizeConfig,
) -> Result<NormalizedDocument, DocNormError> {
    let input_str = input_str.as_ref();
    info!("Starting normalisation: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let path = resolved.path().to_path_buf();
    let config = config.clone();

    // `resolved` stays alive until the task finishes, keeping any temp dir
    let result = tokio::task::spawn_blocking(move || {
        let markup = input::read_local(&path)?;
        normalize(&markup, &config)
    })
    .await
    .map_err(|e| DocNormError::Internal(format!("Normalise task panicked: {}", e)))?;

    drop(resolved);
    result
}

/// Normalise a file or URL and write output directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn normalize_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &NormalizeConfig,
) -> Result<NormalizeStats, DocNormError> {
    let NormalizedDocument { html, stats } = normalize_source(input_str, config).await?;
    let path = output_path.as_ref().to_path_buf();

    tokio::task::spawn_blocking(move || write_atomic(&path, html.as_bytes()))
        .await
        .map_err(|e| DocNormError::Internal(format!("Write task panicked: {}", e)))??;

    Ok(stats)
}

/// Normalise many inputs concurrently, each into its own output file.
///
/// At most `config.concurrency` files are in flight. Failures are reported
/// per file and never abort the batch. Results come back in input order.
pub async fn normalize_batch(
    jobs: Vec<(String, PathBuf)>,
    config: &NormalizeConfig,
) -> Vec<BatchItem> {
    let total = jobs.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut items: Vec<(usize, BatchItem)> = stream::iter(jobs.into_iter().enumerate().map(
        |(i, (input, output))| {
            let config = config.clone();
            async move {
                let index = i + 1;
                if let Some(ref cb) = config.progress_callback {
                    cb.on_file_start(index, total, &input);
                }
                let result = normalize_to_file(&input, &output, &config).await;
                let item = match result {
                    Ok(stats) => {
                        if let Some(ref cb) = config.progress_callback {
                            cb.on_file_complete(index, total, stats.output_bytes);
                        }
                        BatchItem {
                            input,
                            output,
                            stats: Some(stats),
                            error: None,
                        }
                    }
                    Err(e) => {
                        warn!("Failed to normalise {}: {}", input, e);
                        if let Some(ref cb) = config.progress_callback {
                            cb.on_file_error(index, total, &e.to_string());
                        }
                        BatchItem {
                            input,
                            output,
                            stats: None,
                            error: Some(e.to_string()),
                        }
                    }
                };
                (i, item)
            }
        },
    ))
    .buffer_unordered(config.concurrency.max(1))
    .collect()
    .await;

    items.sort_by_key(|(i, _)| *i);
    let items: Vec<BatchItem> = items.into_iter().map(|(_, item)| item).collect();

    let succeeded = items.iter().filter(|i| i.is_success()).count();
    info!("Batch complete: {}/{} file(s) normalised", succeeded, total);
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, succeeded);
    }
    items
}

/// Output path for `input` inside `out_dir`: `<stem>_PDF.html`.
pub fn output_path_for(input: &str, out_dir: &Path) -> PathBuf {
    let name = if input::is_url(input) {
        input.rsplit('/').find(|s| !s.is_empty()).unwrap_or("downloaded")
    } else {
        input
    };
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    out_dir.join(format!("{stem}_PDF.html"))
}

/// Write `bytes` to `path` via a temp file in the same directory.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DocNormError> {
    let write_failed = |source: std::io::Error| DocNormError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(write_failed)?;
            dir
        }
        None => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_failed)?;
    tmp.write_all(bytes).map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths() {
        let out = Path::new("/out");
        assert_eq!(output_path_for("in/letter.html", out), PathBuf::from("/out/letter_PDF.html"));
        assert_eq!(
            output_path_for("https://example.com/a/report.htm", out),
            PathBuf::from("/out/report_PDF.html")
        );
        assert_eq!(output_path_for("https://example.com/", out), PathBuf::from("/out/example_PDF.html"));
    }

    #[test]
    fn write_atomic_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a").join("b").join("out.html");
        write_atomic(&target, b"<p>x</p>").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"<p>x</p>");
    }

    #[test]
    fn stats_are_filled_in() {
        let doc = normalize("<meta name=x><p align=center>a</p>", &NormalizeConfig::default()).unwrap();
        assert_eq!(doc.stats.input_bytes, 34);
        assert_eq!(doc.stats.output_bytes, doc.html.len());
        assert_eq!(doc.stats.rewrites_for("meta"), 1);
        assert!(doc.stats.total_rewrites >= 2);
        assert!(doc.stats.image_failures.is_empty());
    }

    #[test]
    fn parse_of_binary_garbage_still_yields_a_tree() {
        // sniffing is for files; in-memory markup is taken as given
        assert!(normalize([0xffu8, 0xfe, 0x00], &NormalizeConfig::default()).is_ok());
    }
}
