use crate::frame::Frame;
use crate::types::{Margins, Rect, Size};

#[derive(Debug, Clone, Copy)]
pub struct FrameSpec {
    pub rect: Rect,
}

#[derive(Debug, Clone)]
pub struct PageTemplate {
    pub name: String,
    pub page_size: Size,
    frames: Vec<FrameSpec>,
}

impl PageTemplate {
    pub fn new(name: impl Into<String>, page_size: Size) -> Self {
        Self {
            name: name.into(),
            page_size,
            frames: Vec::new(),
        }
    }

    /// A page with one frame filling the area inside `margins`.
    pub fn with_margins(name: impl Into<String>, page_size: Size, margins: Margins) -> Self {
        Self::new(name, page_size).with_frame(margins.content_rect(page_size))
    }

    pub fn with_frame(mut self, rect: Rect) -> Self {
        self.frames.push(FrameSpec { rect });
        self
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn instantiate_frames(&self) -> Vec<Frame> {
        self.frames
            .iter()
            .map(|spec| Frame::new(spec.rect))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Pt;

    #[test]
    fn margins_produce_single_content_frame() {
        let template = PageTemplate::with_margins("body", Size::LETTER, Margins::all(72.0));
        let frames = template.instantiate_frames();
        assert_eq!(frames.len(), 1);
        let rect = frames[0].rect();
        assert_eq!(rect.x, Pt::whole(72));
        assert_eq!(rect.width, Pt::whole(468));
        assert_eq!(rect.height, Pt::whole(648));
    }
}
