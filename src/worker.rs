//! MIME-type dispatch: pick a [`Converter`] for an input and report the
//! outcome in words an operator can log.
//!
//! HTML is converted in-process by [`HtmlConverter`]. Images, TIFFs and
//! word-processor documents go to converters the embedding application
//! registers; PDFs are passed through untouched.

use crate::backend::{Converter, HtmlConverter, HtmlSnapshotTypesetter};
use crate::config::NormalizeConfig;
use crate::error::DocNormError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

// ── MIME types ───────────────────────────────────────────────────────────

/// Every MIME type the worker accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MimeType {
    #[serde(rename = "image/gif")]
    ImageGif,
    #[serde(rename = "image/jpg")]
    ImageJpg,
    #[serde(rename = "image/pjpeg")]
    ImagePjpeg,
    #[serde(rename = "image/tif")]
    ImageTif,
    #[serde(rename = "image/tiff")]
    ImageTiff,
    #[serde(rename = "text/html")]
    TextHtml,
    #[serde(rename = "application/msword")]
    ApplicationMsword,
    #[serde(rename = "application/octet-stream")]
    ApplicationOctetStream,
    #[serde(rename = "application/vnd.openxmlformats-officedocument.wordprocessingml.document")]
    ApplicationDocx,
    #[serde(rename = "application/pdf")]
    ApplicationPdf,
}

impl MimeType {
    pub const ALL: [MimeType; 10] = [
        MimeType::ImageGif,
        MimeType::ImageJpg,
        MimeType::ImagePjpeg,
        MimeType::ImageTif,
        MimeType::ImageTiff,
        MimeType::TextHtml,
        MimeType::ApplicationMsword,
        MimeType::ApplicationOctetStream,
        MimeType::ApplicationDocx,
        MimeType::ApplicationPdf,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MimeType::ImageGif => "image/gif",
            MimeType::ImageJpg => "image/jpg",
            MimeType::ImagePjpeg => "image/pjpeg",
            MimeType::ImageTif => "image/tif",
            MimeType::ImageTiff => "image/tiff",
            MimeType::TextHtml => "text/html",
            MimeType::ApplicationMsword => "application/msword",
            MimeType::ApplicationOctetStream => "application/octet-stream",
            MimeType::ApplicationDocx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            MimeType::ApplicationPdf => "application/pdf",
        }
    }

    /// Converter responsible for this type; `None` for PDF, which passes through.
    pub fn converter_kind(self) -> Option<ConverterKind> {
        match self {
            MimeType::ImageGif | MimeType::ImageJpg | MimeType::ImagePjpeg => {
                Some(ConverterKind::Image)
            }
            MimeType::ImageTif | MimeType::ImageTiff => Some(ConverterKind::Tiff),
            MimeType::TextHtml => Some(ConverterKind::Html),
            MimeType::ApplicationMsword
            | MimeType::ApplicationOctetStream
            | MimeType::ApplicationDocx => Some(ConverterKind::Word),
            MimeType::ApplicationPdf => None,
        }
    }
}

impl FromStr for MimeType {
    type Err = DocNormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        MimeType::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DocNormError::UnsupportedMimeType {
                mime: s.to_string(),
            })
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Family of converter a MIME type is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConverterKind {
    Image,
    Tiff,
    Html,
    Word,
}

impl fmt::Display for ConverterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConverterKind::Image => "image",
            ConverterKind::Tiff => "tiff",
            ConverterKind::Html => "html",
            ConverterKind::Word => "word",
        };
        f.write_str(name)
    }
}

// ── Registry ─────────────────────────────────────────────────────────────

/// Converters keyed by [`ConverterKind`].
#[derive(Default)]
pub struct ConverterRegistry {
    converters: HashMap<ConverterKind, Box<dyn Converter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in HTML converter.
    pub fn with_html(config: NormalizeConfig) -> Self {
        let mut registry = Self::new();
        registry.register(
            ConverterKind::Html,
            HtmlConverter::new(HtmlSnapshotTypesetter, config),
        );
        registry
    }

    /// Register (or replace) the converter for `kind`.
    pub fn register(&mut self, kind: ConverterKind, converter: impl Converter + 'static) {
        self.converters.insert(kind, Box::new(converter));
    }

    pub fn get(&self, kind: ConverterKind) -> Result<&dyn Converter, DocNormError> {
        self.converters
            .get(&kind)
            .map(|c| c.as_ref())
            .ok_or_else(|| DocNormError::ConverterMissing {
                kind: kind.to_string(),
            })
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("kinds", &self.converters.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ── Worker ───────────────────────────────────────────────────────────────

/// How a worker run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerOutcome {
    Converted,
    /// Input already was a PDF; output is the input.
    PassedThrough,
    Unsupported,
    MissingInput,
    Failed,
}

/// Result of [`PdfWorker::convert`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerReport {
    pub outcome: WorkerOutcome,
    /// Where the PDF is. Equals the input for pass-through.
    pub output: PathBuf,
    /// Operator-facing log line; empty for pass-through.
    pub message: String,
}

impl WorkerReport {
    pub fn converted(&self) -> bool {
        self.outcome == WorkerOutcome::Converted
    }
}

/// One conversion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfWorker {
    pub input: PathBuf,
    pub output: PathBuf,
    pub mime_type: String,
    /// Caller's identifier for this file, carried into the logs.
    #[serde(default)]
    pub reference_id: String,
}

impl PdfWorker {
    pub fn new(
        input: impl Into<PathBuf>,
        mime_type: impl Into<String>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            mime_type: mime_type.into(),
            reference_id: String::new(),
        }
    }

    pub fn with_reference_id(mut self, id: impl Into<String>) -> Self {
        self.reference_id = id.into();
        self
    }

    pub fn is_supported_mime_type(&self) -> bool {
        self.mime_type.parse::<MimeType>().is_ok()
    }

    /// Convert the input. Never fails: every problem becomes a report.
    pub fn convert(&self, registry: &ConverterRegistry) -> WorkerReport {
        let input = self.input.display().to_string();
        let report = |outcome, output: &Path, message: String| WorkerReport {
            outcome,
            output: output.to_path_buf(),
            message,
        };

        if !self.input.is_file() {
            return report(
                WorkerOutcome::MissingInput,
                &self.output,
                format!("Input file '{input}' is missing, unable to convert."),
            );
        }

        let mime = match self.mime_type.parse::<MimeType>() {
            Ok(mime) => mime,
            Err(_) => {
                return report(
                    WorkerOutcome::Unsupported,
                    &self.output,
                    format!(
                        "File '{input}' cannot be converted to PDF because the file type is not supported (see file extension)."
                    ),
                );
            }
        };

        let Some(kind) = mime.converter_kind() else {
            return report(WorkerOutcome::PassedThrough, &self.input, String::new());
        };

        let converter = match registry.get(kind) {
            Ok(c) => c,
            Err(e) => {
                warn!("[{}] {}", self.reference_id, e);
                return report(
                    WorkerOutcome::Failed,
                    &self.output,
                    format!("Failed PDF conversion for file {input}."),
                );
            }
        };

        match converter.convert_to_pdf(&self.input, &self.output) {
            Ok(()) => {
                info!("[{}] Converted {} ({})", self.reference_id, input, mime);
                report(
                    WorkerOutcome::Converted,
                    &self.output,
                    format!("Successful PDF conversion for file {input}."),
                )
            }
            Err(e) => report(
                WorkerOutcome::Failed,
                &self.output,
                format!(
                    "An exception occurred while converting {input} to PDF.\nException message: \n{e}"
                ),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl Converter for Failing {
        fn convert_to_pdf(&self, _input: &Path, _output: &Path) -> Result<(), DocNormError> {
            Err(DocNormError::Typesetting("page overflow".into()))
        }
    }

    fn input_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn mime_types_parse_and_display() {
        for mime in MimeType::ALL {
            assert_eq!(mime.to_string().parse::<MimeType>().unwrap(), mime);
        }
        assert_eq!("TEXT/HTML".parse::<MimeType>().unwrap(), MimeType::TextHtml);
        assert!("image/png".parse::<MimeType>().is_err());
    }

    #[test]
    fn routing() {
        assert_eq!(MimeType::ImagePjpeg.converter_kind(), Some(ConverterKind::Image));
        assert_eq!(MimeType::ImageTif.converter_kind(), Some(ConverterKind::Tiff));
        assert_eq!(MimeType::ApplicationOctetStream.converter_kind(), Some(ConverterKind::Word));
        assert_eq!(MimeType::ApplicationPdf.converter_kind(), None);
    }

    #[test]
    fn serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&MimeType::TextHtml).unwrap(), "\"text/html\"");
    }

    #[test]
    fn html_is_converted() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path(), "a.html", "<p>hi</p>");
        let output = dir.path().join("a_PDF.html");

        let worker = PdfWorker::new(&input, "text/html", &output).with_reference_id("42");
        assert!(worker.is_supported_mime_type());
        let report = worker.convert(&ConverterRegistry::with_html(NormalizeConfig::default()));

        assert!(report.converted(), "{report:?}");
        assert_eq!(
            report.message,
            format!("Successful PDF conversion for file {}.", input.display())
        );
        assert!(output.is_file());
    }

    #[test]
    fn missing_input() {
        let worker = PdfWorker::new("/nope/a.html", "text/html", "/nope/a.pdf");
        let report = worker.convert(&ConverterRegistry::new());
        assert_eq!(report.outcome, WorkerOutcome::MissingInput);
        assert_eq!(report.message, "Input file '/nope/a.html' is missing, unable to convert.");
    }

    #[test]
    fn unsupported_type() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path(), "a.xyz", "x");
        let worker = PdfWorker::new(&input, "application/x-thing", dir.path().join("a.pdf"));
        assert!(!worker.is_supported_mime_type());
        let report = worker.convert(&ConverterRegistry::new());
        assert_eq!(report.outcome, WorkerOutcome::Unsupported);
        assert!(report.message.contains("file type is not supported"));
    }

    #[test]
    fn pdf_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path(), "a.pdf", "%PDF-1.4");
        let report = PdfWorker::new(&input, "application/pdf", dir.path().join("b.pdf"))
            .convert(&ConverterRegistry::new());
        assert_eq!(report.outcome, WorkerOutcome::PassedThrough);
        assert_eq!(report.output, input);
        assert!(report.message.is_empty());
    }

    #[test]
    fn unregistered_kind_fails_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path(), "a.gif", "GIF89a");
        let report = PdfWorker::new(&input, "image/gif", dir.path().join("a.pdf"))
            .convert(&ConverterRegistry::new());
        assert_eq!(report.outcome, WorkerOutcome::Failed);
        assert_eq!(
            report.message,
            format!("Failed PDF conversion for file {}.", input.display())
        );
    }

    #[test]
    fn converter_errors_become_exception_messages() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path(), "a.doc", "doc");
        let mut registry = ConverterRegistry::new();
        registry.register(ConverterKind::Word, Failing);

        let report = PdfWorker::new(&input, "application/msword", dir.path().join("a.pdf"))
            .convert(&registry);
        assert_eq!(report.outcome, WorkerOutcome::Failed);
        assert!(report.message.starts_with("An exception occurred while converting"));
        assert!(report.message.ends_with("Typesetting failed: page overflow"));
    }
}
