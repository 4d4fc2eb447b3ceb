use crate::canvas::{Canvas, Command, SurfaceState};
use crate::debug::DebugLogger;
use crate::error::ReportError;
use crate::finalize::Phase;
use crate::types::Size;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    index: usize,
    state: SurfaceState,
    captured_len: usize,
    sealed: bool,
}

impl PageRecord {
    fn capture(index: usize, state: SurfaceState) -> Self {
        let captured_len = state.commands().len();
        Self {
            index,
            state,
            captured_len,
            sealed: false,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> &SurfaceState {
        &self.state
    }

    pub fn commands(&self) -> &[Command] {
        self.state.commands()
    }

    pub fn captured_commands(&self) -> &[Command] {
        &self.state.commands()[..self.captured_len]
    }

    pub fn trailer_commands(&self) -> &[Command] {
        &self.state.commands()[self.captured_len..]
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub(crate) fn seal(&self, state: SurfaceState) -> PageRecord {
        debug_assert!(state.commands().starts_with(self.commands()));
        PageRecord {
            index: self.index,
            state,
            captured_len: self.captured_len,
            sealed: true,
        }
    }
}

/// Callbacks the layout engine drives while flowing content.
pub trait PageSink {
    fn canvas(&mut self) -> Result<&mut Canvas, ReportError>;
    fn on_page_boundary(&mut self) -> Result<(), ReportError>;
}

pub struct PageRecorder {
    canvas: Canvas,
    records: Vec<PageRecord>,
    finalized: bool,
    debug: Option<Arc<DebugLogger>>,
}

impl PageRecorder {
    pub fn new(page_size: Size) -> Self {
        Self {
            canvas: Canvas::new(page_size),
            records: Vec::new(),
            finalized: false,
            debug: None,
        }
    }

    pub(crate) fn with_debug(mut self, debug: Option<Arc<DebugLogger>>) -> Self {
        self.debug = debug;
        self
    }

    fn capture_current(&mut self) -> usize {
        let index = self.records.len() + 1;
        let record = PageRecord::capture(index, self.canvas.snapshot_state());
        if let Some(logger) = self.debug.as_deref() {
            logger.log_event(
                if self.finalized {
                    "record.last_page"
                } else {
                    "record.page_boundary"
                },
                &[
                    ("index", index as i64),
                    ("commands", record.commands().len() as i64),
                ],
            );
        }
        self.records.push(record);
        self.canvas.reset();
        index
    }

    /// Keeps the open page if it has content or the document would otherwise
    /// be empty. Returns the page count.
    pub fn finalize_last_page(&mut self) -> Result<usize, ReportError> {
        if self.finalized {
            return Err(ReportError::state(
                Phase::Stamping,
                Some(self.records.len()),
                "last page already finalized",
            ));
        }
        self.finalized = true;
        if !self.canvas.is_current_empty() || self.records.is_empty() {
            self.capture_current();
        }
        Ok(self.records.len())
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn page_count(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[PageRecord] {
        &self.records
    }

    pub(crate) fn take_records(&mut self) -> Vec<PageRecord> {
        std::mem::take(&mut self.records)
    }

    fn closed_error(&self, message: &str) -> ReportError {
        ReportError::state(Phase::Stamping, Some(self.records.len() + 1), message)
    }
}

impl PageSink for PageRecorder {
    fn canvas(&mut self) -> Result<&mut Canvas, ReportError> {
        if self.finalized {
            return Err(self.closed_error("content appended after layout completed"));
        }
        Ok(&mut self.canvas)
    }

    fn on_page_boundary(&mut self) -> Result<(), ReportError> {
        if self.finalized {
            return Err(self.closed_error("page boundary signalled after layout completed"));
        }
        self.capture_current();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Pt;

    fn draw_marker(recorder: &mut PageRecorder, text: &str) {
        let canvas = recorder.canvas().expect("collecting");
        canvas.draw_string(Pt::whole(72), Pt::whole(72), text);
    }

    #[test]
    fn boundaries_assign_consecutive_indices_in_order() {
        let mut recorder = PageRecorder::new(Size::LETTER);
        for name in ["a", "b", "c"] {
            draw_marker(&mut recorder, name);
            recorder.on_page_boundary().expect("boundary");
        }
        let count = recorder.finalize_last_page().expect("finalize");
        assert_eq!(count, 3);
        let indices: Vec<usize> = recorder.records().iter().map(|r| r.index()).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        let texts: Vec<&Command> = recorder
            .records()
            .iter()
            .map(|r| &r.commands()[0])
            .collect();
        assert!(matches!(texts[1], Command::DrawString { text, .. } if text == "b"));
    }

    #[test]
    fn last_page_with_content_is_captured() {
        let mut recorder = PageRecorder::new(Size::LETTER);
        draw_marker(&mut recorder, "one");
        recorder.on_page_boundary().expect("boundary");
        draw_marker(&mut recorder, "two");
        assert_eq!(recorder.finalize_last_page().expect("finalize"), 2);
    }

    #[test]
    fn empty_trailing_page_is_dropped() {
        let mut recorder = PageRecorder::new(Size::LETTER);
        draw_marker(&mut recorder, "only");
        recorder.on_page_boundary().expect("boundary");
        assert_eq!(recorder.finalize_last_page().expect("finalize"), 1);
    }

    #[test]
    fn empty_document_still_has_one_page() {
        let mut recorder = PageRecorder::new(Size::LETTER);
        assert_eq!(recorder.finalize_last_page().expect("finalize"), 1);
        assert!(recorder.records()[0].commands().is_empty());
    }

    #[test]
    fn double_finalize_is_a_state_violation() {
        let mut recorder = PageRecorder::new(Size::LETTER);
        recorder.finalize_last_page().expect("first");
        let err = recorder.finalize_last_page().expect_err("second must fail");
        assert!(err.is_state_violation());
        assert_eq!(recorder.page_count(), 1);
    }

    #[test]
    fn drawing_after_finalize_is_rejected() {
        let mut recorder = PageRecorder::new(Size::LETTER);
        recorder.finalize_last_page().expect("finalize");
        assert!(recorder.canvas().is_err());
        let err = recorder.on_page_boundary().expect_err("boundary must fail");
        assert!(err.is_state_violation());
        assert!(err.to_string().contains("page 2"));
        assert_eq!(recorder.page_count(), 1);
    }

    #[test]
    fn captured_records_start_unsealed() {
        let mut recorder = PageRecorder::new(Size::LETTER);
        draw_marker(&mut recorder, "x");
        recorder.finalize_last_page().expect("finalize");
        let record = &recorder.records()[0];
        assert!(!record.is_sealed());
        assert_eq!(record.captured_commands(), record.commands());
        assert!(record.trailer_commands().is_empty());
    }
}
