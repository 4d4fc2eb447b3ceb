use crate::debug::DebugLogger;
use crate::doc_template::{DocTemplate, LayoutSummary};
use crate::error::ReportError;
use crate::flowable::Flowable;
use crate::metrics::{PageMetrics, RunMetrics};
use crate::recorder::{PageRecord, PageRecorder, PageSink};
use crate::trailer::TrailerStamper;
use crate::types::Size;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Collecting,
    Stamping,
    Committed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Collecting => "collecting",
            Phase::Stamping => "stamping",
            Phase::Committed => "committed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    Complete,
    Aborted,
}

/// Destination for finished pages. Pages arrive in order, each exactly once.
pub trait PageEncoder {
    fn commit_page(&mut self, record: &PageRecord) -> Result<usize, ReportError>;
    // Called exactly once per run.
    fn close(&mut self, mode: CloseMode) -> Result<usize, ReportError>;
}

pub struct DocumentFinalizer {
    phase: Phase,
    recorder: PageRecorder,
    stamper: TrailerStamper,
    stamped: Vec<PageRecord>,
    page_count: Option<usize>,
    debug: Option<Arc<DebugLogger>>,
    layout_ms: f64,
}

impl DocumentFinalizer {
    pub fn new(page_size: Size, stamper: TrailerStamper) -> Self {
        Self {
            phase: Phase::Collecting,
            recorder: PageRecorder::new(page_size),
            stamper,
            stamped: Vec::new(),
            page_count: None,
            debug: None,
            layout_ms: 0.0,
        }
    }

    pub(crate) fn with_debug(mut self, debug: Option<Arc<DebugLogger>>) -> Self {
        self.recorder = self.recorder.with_debug(debug.clone());
        self.stamper = self.stamper.with_debug(debug.clone());
        self.debug = debug;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn page_count(&self) -> Option<usize> {
        self.page_count
    }

    pub fn sink(&mut self) -> &mut dyn PageSink {
        &mut self.recorder
    }

    fn expect_phase(&self, expected: Phase, action: &str) -> Result<(), ReportError> {
        if self.phase != expected {
            return Err(ReportError::state(
                self.phase,
                self.page_count,
                format!("{action} requires the {} phase", expected.as_str()),
            ));
        }
        Ok(())
    }

    fn transition(&mut self, to: Phase) {
        log::debug!(
            "document phase {} -> {} ({} page(s))",
            self.phase.as_str(),
            to.as_str(),
            self.recorder.page_count()
        );
        if let Some(logger) = self.debug.as_deref() {
            logger.log_json(&format!(
                "{{\"type\":\"finalize.phase\",\"from\":\"{}\",\"to\":\"{}\",\"pages\":{}}}",
                self.phase.as_str(),
                to.as_str(),
                self.recorder.page_count()
            ));
            logger.increment("finalize.phase", 1);
        }
        self.phase = to;
    }

    pub fn collect(
        &mut self,
        template: &DocTemplate,
        story: Vec<Box<dyn Flowable>>,
    ) -> Result<LayoutSummary, ReportError> {
        self.expect_phase(Phase::Collecting, "layout")?;
        let started = Instant::now();
        let summary = template.flow(story, &mut self.recorder)?;
        self.layout_ms += started.elapsed().as_secs_f64() * 1000.0;
        Ok(summary)
    }

    pub fn on_layout_complete(&mut self) -> Result<usize, ReportError> {
        self.expect_phase(Phase::Collecting, "layout completion")?;
        let total = self.recorder.finalize_last_page()?;
        self.page_count = Some(total);
        self.transition(Phase::Stamping);

        let records = self.recorder.take_records();
        let mut stamped = Vec::with_capacity(records.len());
        for record in &records {
            stamped.push(self.stamper.stamp(record, total)?);
        }
        self.stamped = stamped;
        Ok(total)
    }

    /// Does not close the encoder.
    pub fn commit_all<E: PageEncoder + ?Sized>(
        &mut self,
        encoder: &mut E,
    ) -> Result<RunMetrics, ReportError> {
        self.expect_phase(Phase::Stamping, "commit")?;
        self.transition(Phase::Committed);

        let started = Instant::now();
        let mut metrics = RunMetrics {
            layout_ms: self.layout_ms,
            ..RunMetrics::default()
        };
        for (expected, record) in (1..).zip(std::mem::take(&mut self.stamped)) {
            if !record.is_sealed() || record.index() != expected {
                return Err(ReportError::state(
                    Phase::Committed,
                    Some(record.index()),
                    "page committed out of order or before stamping",
                ));
            }
            let content_bytes = encoder.commit_page(&record)?;
            if let Some(logger) = self.debug.as_deref() {
                logger.log_event(
                    "commit.page",
                    &[
                        ("index", record.index() as i64),
                        ("bytes", content_bytes as i64),
                    ],
                );
            }
            if !record.trailer_commands().is_empty() {
                metrics.stamped_pages += 1;
            }
            metrics.pages.push(PageMetrics {
                page_number: record.index(),
                command_count: record.commands().len(),
                trailer_command_count: record.trailer_commands().len(),
                content_bytes,
            });
        }
        metrics.commit_ms = started.elapsed().as_secs_f64() * 1000.0;
        Ok(metrics)
    }

    pub fn into_records(self) -> Result<Vec<PageRecord>, ReportError> {
        self.expect_phase(Phase::Stamping, "record export")?;
        Ok(self.stamped)
    }

    fn drive<E: PageEncoder + ?Sized>(
        &mut self,
        template: &DocTemplate,
        story: Vec<Box<dyn Flowable>>,
        encoder: &mut E,
    ) -> Result<RunMetrics, ReportError> {
        self.collect(template, story)?;
        self.on_layout_complete()?;
        self.commit_all(encoder)
    }

    /// The encoder is closed exactly once, `Aborted` on any failure.
    pub fn run<E: PageEncoder + ?Sized>(
        mut self,
        template: &DocTemplate,
        story: Vec<Box<dyn Flowable>>,
        encoder: &mut E,
    ) -> Result<RunMetrics, ReportError> {
        match self.drive(template, story, encoder) {
            Ok(mut metrics) => {
                metrics.total_bytes = encoder.close(CloseMode::Complete)?;
                Ok(metrics)
            }
            Err(err) => {
                log::warn!("aborting document in {} phase: {}", self.phase.as_str(), err);
                if let Err(close_err) = encoder.close(CloseMode::Aborted) {
                    log::warn!("failed to release aborted output: {close_err}");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::flowable::{Paragraph, Spacer, TextStyle};
    use crate::page_template::PageTemplate;
    use crate::trailer::page_number_text;
    use crate::types::{Margins, Pt, Rect};

    #[derive(Default)]
    struct RecordingEncoder {
        committed: Vec<PageRecord>,
        closes: Vec<CloseMode>,
        fail_on_page: Option<usize>,
    }

    impl PageEncoder for RecordingEncoder {
        fn commit_page(&mut self, record: &PageRecord) -> Result<usize, ReportError> {
            if self.fail_on_page == Some(record.index()) {
                return Err(ReportError::Encoder("disk full".to_string()));
            }
            self.committed.push(record.clone());
            Ok(record.commands().len())
        }

        fn close(&mut self, mode: CloseMode) -> Result<usize, ReportError> {
            self.closes.push(mode);
            Ok(self.committed.len())
        }
    }

    fn template() -> DocTemplate {
        DocTemplate::new(PageTemplate::with_margins(
            "body",
            Size::LETTER,
            Margins::all(72.0),
        ))
    }

    fn long_story() -> Vec<Box<dyn Flowable>> {
        let text = "lorem ipsum ".repeat(1500);
        vec![Box::new(
            Paragraph::new(text).with_style(TextStyle::new("Helvetica", 10.0)),
        )]
    }

    fn shown_text(record: &PageRecord) -> Vec<String> {
        record
            .trailer_commands()
            .iter()
            .filter_map(|cmd| match cmd {
                Command::DrawString { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn pages_commit_in_order_with_final_total() {
        let finalizer = DocumentFinalizer::new(Size::LETTER, TrailerStamper::default());
        let mut encoder = RecordingEncoder::default();
        let metrics = finalizer
            .run(&template(), long_story(), &mut encoder)
            .expect("run");

        let total = encoder.committed.len();
        assert!(total >= 2);
        assert_eq!(metrics.page_count(), total);
        assert_eq!(metrics.stamped_pages, total - 1);
        for (pos, record) in encoder.committed.iter().enumerate() {
            assert_eq!(record.index(), pos + 1);
            assert!(record.is_sealed());
        }
        assert!(encoder.committed[0].trailer_commands().is_empty());
        for record in &encoder.committed[1..] {
            assert_eq!(
                shown_text(record),
                vec![page_number_text(record.index(), total)]
            );
        }
        assert_eq!(encoder.closes, vec![CloseMode::Complete]);
    }

    #[test]
    fn single_page_document_is_never_stamped() {
        let finalizer = DocumentFinalizer::new(Size::LETTER, TrailerStamper::default());
        let mut encoder = RecordingEncoder::default();
        let story: Vec<Box<dyn Flowable>> = vec![Box::new(Paragraph::new("short"))];
        let metrics = finalizer.run(&template(), story, &mut encoder).expect("run");
        assert_eq!(metrics.page_count(), 1);
        assert_eq!(metrics.stamped_pages, 0);
        assert!(encoder.committed[0].trailer_commands().is_empty());
    }

    #[test]
    fn encoder_failure_aborts_and_closes_once() {
        let finalizer = DocumentFinalizer::new(Size::LETTER, TrailerStamper::default());
        let mut encoder = RecordingEncoder {
            fail_on_page: Some(2),
            ..RecordingEncoder::default()
        };
        let err = finalizer
            .run(&template(), long_story(), &mut encoder)
            .expect_err("commit must fail");
        assert!(matches!(err, ReportError::Encoder(_)));
        assert_eq!(encoder.committed.len(), 1);
        assert_eq!(encoder.closes, vec![CloseMode::Aborted]);
    }

    #[test]
    fn layout_failure_commits_nothing() {
        let flat = DocTemplate::new(PageTemplate::new("flat", Size::LETTER).with_frame(Rect {
            x: Pt::ZERO,
            y: Pt::ZERO,
            width: Pt::whole(100),
            height: Pt::ZERO,
        }));
        let finalizer = DocumentFinalizer::new(Size::LETTER, TrailerStamper::default());
        let mut encoder = RecordingEncoder::default();
        let story: Vec<Box<dyn Flowable>> = vec![Box::new(Spacer::new(5.0))];
        let err = finalizer
            .run(&flat, story, &mut encoder)
            .expect_err("layout must fail");
        assert!(matches!(err, ReportError::UnplaceableFlowable(_)));
        assert!(encoder.committed.is_empty());
        assert_eq!(encoder.closes, vec![CloseMode::Aborted]);
    }

    #[test]
    fn sink_rejects_content_after_layout_completes() {
        let mut finalizer = DocumentFinalizer::new(Size::LETTER, TrailerStamper::default());
        finalizer
            .collect(&template(), vec![Box::new(Paragraph::new("x"))])
            .expect("collect");
        assert_eq!(finalizer.on_layout_complete().expect("complete"), 1);
        assert_eq!(finalizer.phase(), Phase::Stamping);
        assert!(finalizer.sink().canvas().is_err());
        assert!(
            finalizer
                .sink()
                .on_page_boundary()
                .expect_err("boundary")
                .is_state_violation()
        );
        assert_eq!(finalizer.page_count(), Some(1));
    }

    #[test]
    fn lifecycle_calls_out_of_phase_are_violations() {
        let mut finalizer = DocumentFinalizer::new(Size::LETTER, TrailerStamper::default());
        let mut encoder = RecordingEncoder::default();
        assert!(
            finalizer
                .commit_all(&mut encoder)
                .expect_err("commit before stamping")
                .is_state_violation()
        );
        finalizer.on_layout_complete().expect("complete");
        assert!(
            finalizer
                .on_layout_complete()
                .expect_err("second completion")
                .is_state_violation()
        );
        finalizer.commit_all(&mut encoder).expect("commit");
        assert_eq!(finalizer.phase(), Phase::Committed);
        assert!(
            finalizer
                .collect(&template(), Vec::new())
                .expect_err("collect after commit")
                .is_state_violation()
        );
        assert!(
            finalizer
                .commit_all(&mut encoder)
                .expect_err("second commit")
                .is_state_violation()
        );
        assert_eq!(encoder.committed.len(), 1);
    }

    #[test]
    fn into_records_exposes_stamped_pages() {
        let mut finalizer = DocumentFinalizer::new(Size::LETTER, TrailerStamper::default());
        finalizer.collect(&template(), long_story()).expect("collect");
        let total = finalizer.on_layout_complete().expect("complete");
        let records = finalizer.into_records().expect("records");
        assert_eq!(records.len(), total);
        assert!(records.iter().all(PageRecord::is_sealed));
    }
}
