mod canvas;
mod debug;
mod doc_template;
mod error;
mod finalize;
mod flowable;
mod frame;
mod inspect;
mod metrics;
mod page_template;
mod pdf;
mod recorder;
mod report;
mod trailer;
mod types;

pub use canvas::{Canvas, Command, DEFAULT_FONT_NAME, GraphicsState, SurfaceState};
use debug::DebugLogger;
pub use doc_template::{DocTemplate, LayoutSummary};
pub use error::ReportError;
pub use finalize::{CloseMode, DocumentFinalizer, PageEncoder, Phase};
pub use flowable::{
    Flowable, HRule, Paragraph, Spacer, TableCell, TableFlowable, TableRow, TextAlign, TextStyle,
};
pub use frame::{AddResult, Frame};
pub use inspect::{
    PageInspection, PdfInspectError, PdfInspectErrorCode, PdfInspectReport, inspect_pdf_bytes,
    inspect_pdf_path,
};
pub use metrics::{PageMetrics, RunMetrics};
pub use page_template::{FrameSpec, PageTemplate};
pub use pdf::PdfStreamWriter;
pub use recorder::{PageRecord, PageRecorder, PageSink};
pub use report::{
    DEFAULT_PAGE_SIZE, ReportConfig, ReportConfigBuilder, ReportRow, TotalRow, build_story,
    sample_rows,
};
pub use trailer::{
    Corner, CornerImage, TRAILER_META_KEY, TRAILER_REFERENCE_SIZE, TrailerStamper,
    page_number_text,
};
pub use types::{Color, Margins, Pt, Rect, Size};

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Renders tabular reports to PDF. Each render call is one independent
/// document run with its own page buffer and encoder.
pub struct ReportGenerator {
    config: ReportConfig,
    debug: Option<Arc<DebugLogger>>,
}

impl ReportGenerator {
    pub fn new(config: ReportConfig) -> Result<Self, ReportError> {
        let debug = match config.debug_log() {
            Some(path) => Some(Arc::new(DebugLogger::new(path)?)),
            None => None,
        };
        Ok(Self { config, debug })
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    fn emit_debug_summary(&self, context: &str) {
        if let Some(logger) = self.debug.as_deref() {
            logger.emit_summary(context);
            logger.flush();
        }
    }

    fn doc_template(&self) -> DocTemplate {
        DocTemplate::new(PageTemplate::with_margins(
            "body",
            self.config.page_size(),
            self.config.margins(),
        ))
        .with_debug(self.debug.clone())
    }

    fn finalizer(&self) -> DocumentFinalizer {
        let stamper = TrailerStamper::new(
            self.config.left_image().cloned(),
            self.config.right_image().cloned(),
        );
        DocumentFinalizer::new(self.config.page_size(), stamper).with_debug(self.debug.clone())
    }

    fn run<W: Write>(&self, rows: &[ReportRow], writer: W) -> Result<RunMetrics, ReportError> {
        let story = build_story(&self.config, rows)?;
        let mut encoder = PdfStreamWriter::new(writer)?
            .with_title(self.config.app_name())
            .with_debug(self.debug.clone());
        let metrics = self
            .finalizer()
            .run(&self.doc_template(), story, &mut encoder)?;
        log::debug!(
            "report rendered: {} page(s), {} bytes",
            metrics.page_count(),
            metrics.total_bytes
        );
        Ok(metrics)
    }

    pub fn render_to_writer<W: Write>(
        &self,
        rows: &[ReportRow],
        writer: &mut W,
    ) -> Result<RunMetrics, ReportError> {
        let result = self.run(rows, writer);
        self.emit_debug_summary("render_to_writer");
        result
    }

    pub fn render_to_buffer(&self, rows: &[ReportRow]) -> Result<Vec<u8>, ReportError> {
        let mut out = Vec::new();
        let result = self.run(rows, &mut out);
        self.emit_debug_summary("render_to_buffer");
        result.map(|_| out)
    }

    /// Writes the PDF next to `path` under a temporary name and moves it into
    /// place only once the document is complete, so a failed run never leaves
    /// a file at `path`.
    pub fn render_to_file(
        &self,
        rows: &[ReportRow],
        path: impl AsRef<Path>,
    ) -> Result<RunMetrics, ReportError> {
        let path = path.as_ref();
        let result = self.render_file_inner(rows, path);
        self.emit_debug_summary("render_to_file");
        result
    }

    fn render_file_inner(&self, rows: &[ReportRow], path: &Path) -> Result<RunMetrics, ReportError> {
        let story = build_story(&self.config, rows)?;
        let partial = partial_path(path);
        let outcome = self.write_partial(story, &partial).and_then(|metrics| {
            std::fs::rename(&partial, path)?;
            Ok(metrics)
        });
        if outcome.is_err() {
            let _ = std::fs::remove_file(&partial);
        }
        outcome
    }

    fn write_partial(
        &self,
        story: Vec<Box<dyn Flowable>>,
        partial: &Path,
    ) -> Result<RunMetrics, ReportError> {
        let file = std::fs::File::create(partial)?;
        let mut encoder = PdfStreamWriter::new(std::io::BufWriter::new(file))?
            .with_title(self.config.app_name())
            .with_debug(self.debug.clone());
        let metrics = self
            .finalizer()
            .run(&self.doc_template(), story, &mut encoder)?;
        let file = encoder
            .into_inner()
            .into_inner()
            .map_err(|err| ReportError::Io(err.into_error()))?;
        file.sync_all()?;
        Ok(metrics)
    }

    /// Lays out and stamps the report without encoding it.
    pub fn paginate(&self, rows: &[ReportRow]) -> Result<Vec<PageRecord>, ReportError> {
        let story = build_story(&self.config, rows)?;
        let mut finalizer = self.finalizer();
        finalizer.collect(&self.doc_template(), story)?;
        finalizer.on_layout_complete()?;
        let records = finalizer.into_records();
        self.emit_debug_summary("paginate");
        records
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.pdf".to_string());
    path.with_file_name(format!(".{}.{}.partial", name, std::process::id()))
}
