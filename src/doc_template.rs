use crate::debug::{DebugLogger, json_escape};
use crate::error::ReportError;
use crate::flowable::Flowable;
use crate::frame::AddResult;
use crate::page_template::PageTemplate;
use crate::recorder::PageSink;
use std::collections::VecDeque;
use std::sync::Arc;

/// Drives flowables through a page template's frames, announcing each full
/// page to a [`PageSink`].
pub struct DocTemplate {
    page_template: PageTemplate,
    debug: Option<Arc<DebugLogger>>,
}

/// What a layout pass produced, as seen by the layout engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutSummary {
    pub page_breaks: usize,
    pub placed: usize,
}

impl DocTemplate {
    pub fn new(page_template: PageTemplate) -> Self {
        Self {
            page_template,
            debug: None,
        }
    }

    pub(crate) fn with_debug(mut self, debug: Option<Arc<DebugLogger>>) -> Self {
        self.debug = debug;
        self
    }

    fn log_page_break(&self, from_page: usize, reason: &str, flowable: &str) {
        let Some(logger) = self.debug.as_deref() else {
            return;
        };
        let json = format!(
            "{{\"type\":\"layout.page_break\",\"reason\":\"{}\",\"from_page\":{},\"to_page\":{},\"flowable\":\"{}\"}}",
            reason,
            from_page,
            from_page + 1,
            json_escape(flowable)
        );
        logger.log_json(&json);
        logger.increment("layout.page_break", 1);
    }

    /// Lays out `story` in order. A boundary is signalled only once the
    /// current page has received content; the last page is left open for the
    /// caller to finalize.
    pub fn flow(
        &self,
        story: Vec<Box<dyn Flowable>>,
        sink: &mut dyn PageSink,
    ) -> Result<LayoutSummary, ReportError> {
        let mut frames = self.page_template.instantiate_frames();
        if frames.is_empty() {
            return Err(ReportError::config(
                "page_template",
                format!("page template '{}' has no frames", self.page_template.name),
            ));
        }

        let mut summary = LayoutSummary::default();
        let mut page_number = 1usize;
        let mut frame_index = 0usize;
        let mut placed_on_page = false;
        let mut story: VecDeque<Box<dyn Flowable>> = story.into();

        while let Some(flowable) = story.pop_front() {
            let mut current = flowable;
            loop {
                let name = current.debug_name();
                if frame_index >= frames.len() {
                    self.log_page_break(page_number, "frame_exhausted", name);
                    sink.on_page_boundary()?;
                    frames = self.page_template.instantiate_frames();
                    frame_index = 0;
                    placed_on_page = false;
                    page_number += 1;
                    summary.page_breaks += 1;
                }

                let is_last_frame = frame_index + 1 >= frames.len();
                let frame_rect = frames[frame_index].rect();
                let outcome = frames[frame_index].add(current, sink.canvas()?);
                match outcome {
                    AddResult::Placed => {
                        placed_on_page = true;
                        summary.placed += 1;
                        break;
                    }
                    AddResult::Split(remaining) => {
                        placed_on_page = true;
                        summary.placed += 1;
                        if is_last_frame {
                            self.log_page_break(page_number, "flowable_split", name);
                        }
                        current = remaining;
                        frame_index += 1;
                    }
                    AddResult::Overflow(remaining) => {
                        if !placed_on_page && is_last_frame {
                            let size = remaining.wrap(frame_rect.width, frame_rect.height);
                            return Err(ReportError::UnplaceableFlowable(format!(
                                "{} size={}x{}pt frame={}x{}pt page={}",
                                name,
                                size.width.to_f32(),
                                size.height.to_f32(),
                                frame_rect.width.to_f32(),
                                frame_rect.height.to_f32(),
                                page_number
                            )));
                        }
                        if is_last_frame {
                            self.log_page_break(page_number, "frame_overflow", name);
                        }
                        current = remaining;
                        frame_index += 1;
                    }
                }
            }
        }

        log::debug!(
            "layout placed {} flowables across {} page(s)",
            summary.placed,
            summary.page_breaks + 1
        );
        Ok(summary)
    }
}
