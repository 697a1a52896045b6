//! CLI binary for docnorm.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `NormalizeConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use docnorm::{
    normalize_batch, normalize_source, normalize_to_file, output_path_for,
    ConversionProgressCallback, ConverterRegistry, FormPolicy, NormalizeConfig, PdfWorker,
    ProgressCallback, WorkerOutcome,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback for batch runs. Files finish out of order, so
/// start times are keyed by file index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Normalising");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .map(|mut m| m.remove(&index))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Normalising {total_files} file(s)…"))
        ));
    }

    fn on_file_start(&self, index: usize, _total: usize, input: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(input.to_string());
    }

    fn on_file_complete(&self, index: usize, total: usize, output_len: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} File {:>3}/{:<3}  {:<12}  {}",
            green("✓"),
            index,
            total,
            dim(&format!("{output_len:>7} bytes")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // First line only; error messages carry a hint on the second.
        let first = error.lines().next().unwrap_or(error);
        let msg = match first.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &first[..cut]),
            None => first.to_string(),
        };

        self.bar.println(format!(
            "  {} File {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let failed = total_files.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} file(s) normalised successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} file(s) normalised  ({} failed)",
                if failed == total_files {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Normalise to stdout
  docnorm letter.html

  # Normalise to a file
  docnorm letter.html -o letter_PDF.html

  # Batch: every input becomes <stem>_PDF.html in out/
  docnorm *.html --out-dir out/ --concurrency 8

  # Keep form contents instead of dropping them
  docnorm --form-policy unwrap survey.html

  # Inline images as data URIs, resolving relative paths against assets/
  docnorm --embed-images --image-root assets/ page.html -o page_PDF.html

  # Convert from URL
  docnorm https://example.com/newsletter.html -o newsletter_PDF.html

  # Route through the conversion worker by MIME type
  docnorm --mime-type text/html report.html -o report.pdf

  # JSON output with per-rule statistics
  docnorm --json letter.html > letter.json

ENVIRONMENT VARIABLES:
  DOCNORM_OUTPUT            Default for --output
  DOCNORM_OUT_DIR           Default for --out-dir
  DOCNORM_TITLE             Default for --title
  DOCNORM_FORM_POLICY       Default for --form-policy
  DOCNORM_IMAGE_ROOT        Default for --image-root
  DOCNORM_CONCURRENCY       Default for --concurrency
  RUST_LOG                  Override the log filter (e.g. docnorm=debug)
"#;

/// Normalise legacy HTML into CSS-inlined markup for PDF typesetting.
#[derive(Parser, Debug)]
#[command(
    name = "docnorm",
    version,
    about = "Normalise legacy HTML into CSS-inlined markup for PDF typesetting",
    long_about = "Rewrite legacy or malformed HTML (local files or URLs) into structurally valid \
markup where presentational attributes (font, align, cellpadding, ...) become inline CSS and \
illegal nestings are repaired, ready for a fixed-layout typesetting backend.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local HTML file paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Write the result to this file instead of stdout (single input only).
    #[arg(short, long, env = "DOCNORM_OUTPUT", conflicts_with = "out_dir")]
    output: Option<PathBuf>,

    /// Write each result to <stem>_PDF.html inside this directory.
    #[arg(long, env = "DOCNORM_OUT_DIR")]
    out_dir: Option<PathBuf>,

    /// Title given to fragments that have no <html> element.
    #[arg(long, env = "DOCNORM_TITLE", default_value = docnorm::config::DEFAULT_DOCUMENT_TITLE)]
    title: String,

    /// What to do with <form> elements: discard or unwrap.
    #[arg(long, env = "DOCNORM_FORM_POLICY", value_enum, default_value = "discard")]
    form_policy: FormArg,

    /// Inline <img> sources as data URIs.
    #[arg(long, env = "DOCNORM_EMBED_IMAGES")]
    embed_images: bool,

    /// Directory relative image paths are resolved against.
    #[arg(long, env = "DOCNORM_IMAGE_ROOT", default_value = docnorm::config::DEFAULT_IMAGE_ROOT)]
    image_root: PathBuf,

    /// Number of files normalised concurrently in batch mode.
    #[arg(short, long, env = "DOCNORM_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Convert through the worker using this MIME type (requires --output).
    #[arg(long, requires = "output")]
    mime_type: Option<String>,

    /// Output structured JSON instead of markup.
    #[arg(long, env = "DOCNORM_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCNORM_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCNORM_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCNORM_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCNORM_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-image fetch timeout in seconds.
    #[arg(long, env = "DOCNORM_IMAGE_TIMEOUT", default_value_t = 30)]
    image_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FormArg {
    Discard,
    Unwrap,
}

impl From<FormArg> for FormPolicy {
    fn from(v: FormArg) -> Self {
        match v {
            FormArg::Discard => FormPolicy::Discard,
            FormArg::Unwrap => FormPolicy::Unwrap,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let batch = cli.out_dir.is_some() || cli.inputs.len() > 1;
    if batch && cli.output.is_some() {
        anyhow::bail!("--output takes a single input; use --out-dir for several");
    }

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs in batch mode.
    let show_progress = batch && !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Worker mode ──────────────────────────────────────────────────────
    if let Some(ref mime) = cli.mime_type {
        return run_worker(&cli, mime, config);
    }

    // ── Batch mode ───────────────────────────────────────────────────────
    if batch {
        let out_dir = cli.out_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let jobs: Vec<(String, PathBuf)> = cli
            .inputs
            .iter()
            .map(|input| (input.clone(), output_path_for(input, &out_dir)))
            .collect();

        let items = normalize_batch(jobs, &config).await;
        let failed = items.iter().filter(|i| !i.is_success()).count();

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&items).context("Failed to serialise results")?
            );
        } else if !cli.quiet && !show_progress {
            for item in &items {
                match item.error {
                    None => eprintln!("{} {} → {}", green("✔"), item.input, item.output.display()),
                    Some(ref e) => eprintln!("{} {}: {}", red("✘"), item.input, e),
                }
            }
        }

        if failed > 0 {
            anyhow::bail!("{failed} of {} file(s) failed", items.len());
        }
        return Ok(());
    }

    // ── Single input ─────────────────────────────────────────────────────
    let input = &cli.inputs[0];

    if let Some(ref output_path) = cli.output {
        let stats = normalize_to_file(input, output_path, &config)
            .await
            .context("Normalisation failed")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
            );
        } else if !cli.quiet {
            eprintln!(
                "{}  {} rewrites  {}ms  →  {}",
                green("✔"),
                stats.total_rewrites,
                stats.duration_ms,
                bold(&output_path.display().to_string()),
            );
            for failure in &stats.image_failures {
                eprintln!("   {} {}", cyan("⚠"), dim(&failure.to_string()));
            }
        }
    } else {
        let doc = normalize_source(input, &config)
            .await
            .context("Normalisation failed")?;

        if cli.json {
            let json = serde_json::to_string_pretty(&doc).context("Failed to serialise output")?;
            println!("{json}");
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(doc.html.as_bytes())
                .context("Failed to write to stdout")?;
            if !doc.html.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }

        if !cli.quiet && !cli.json {
            eprintln!(
                "Normalised {} → {} bytes  ({} rewrites, {}ms)",
                doc.stats.input_bytes,
                doc.stats.output_bytes,
                doc.stats.total_rewrites,
                doc.stats.duration_ms
            );
        }
    }

    Ok(())
}

/// Run one input through [`PdfWorker`] and print its log line.
fn run_worker(cli: &Cli, mime: &str, config: NormalizeConfig) -> Result<()> {
    if cli.inputs.len() != 1 {
        anyhow::bail!("--mime-type takes exactly one input");
    }
    let output = cli
        .output
        .clone()
        .context("--mime-type requires --output")?;

    let registry = ConverterRegistry::with_html(config);
    let worker = PdfWorker::new(&cli.inputs[0], mime, output);
    let report = tokio::task::block_in_place(|| worker.convert(&registry));

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet && !report.message.is_empty() {
        eprintln!("{}", report.message);
    }

    match report.outcome {
        WorkerOutcome::Converted | WorkerOutcome::PassedThrough => Ok(()),
        _ => anyhow::bail!("Conversion did not complete"),
    }
}

/// Map CLI args to `NormalizeConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<NormalizeConfig> {
    let mut builder = NormalizeConfig::builder()
        .document_title(cli.title.clone())
        .form_policy(cli.form_policy.clone().into())
        .embed_images(cli.embed_images)
        .image_root(cli.image_root.clone())
        .concurrency(cli.concurrency)
        .download_timeout_secs(cli.download_timeout)
        .image_timeout_secs(cli.image_timeout);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
