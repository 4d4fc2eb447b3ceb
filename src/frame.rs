use crate::canvas::Canvas;
use crate::flowable::Flowable;
use crate::types::{Pt, Rect};

pub enum AddResult {
    Placed,
    Split(Box<dyn Flowable>),
    Overflow(Box<dyn Flowable>),
}

/// A rectangular region that stacks flowables top to bottom.
pub struct Frame {
    rect: Rect,
    cursor_y: Pt,
}

impl Frame {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            cursor_y: Pt::ZERO,
        }
    }

    pub fn remaining_height(&self) -> Pt {
        (self.rect.height - self.cursor_y).max(Pt::ZERO)
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn is_empty(&self) -> bool {
        self.cursor_y <= Pt::ZERO
    }

    fn place(&mut self, flowable: &dyn Flowable, height: Pt, canvas: &mut Canvas) {
        let avail_width = self.rect.width;
        let avail_height = self.remaining_height();
        flowable.draw(
            canvas,
            self.rect.x,
            self.rect.y + self.cursor_y,
            avail_width,
            avail_height,
        );
        self.cursor_y += height;
    }

    pub fn add(&mut self, flowable: Box<dyn Flowable>, canvas: &mut Canvas) -> AddResult {
        let avail_width = self.rect.width;
        let avail_height = self.remaining_height();
        if avail_height <= Pt::ZERO {
            return AddResult::Overflow(flowable);
        }

        let size = flowable.wrap(avail_width, avail_height);
        if size.height <= avail_height {
            self.place(flowable.as_ref(), size.height, canvas);
            return AddResult::Placed;
        }

        if let Some((first, second)) = flowable.split(avail_width, avail_height) {
            let first_height = first.wrap(avail_width, avail_height).height;
            if first_height > Pt::ZERO && first_height <= avail_height {
                self.place(first.as_ref(), first_height, canvas);
                return AddResult::Split(second);
            }
        }

        // Taller than a whole frame and unsplittable: it goes on the empty frame
        // and overruns the bottom edge.
        if self.is_empty() {
            self.place(flowable.as_ref(), avail_height, canvas);
            self.cursor_y = self.rect.height;
            return AddResult::Placed;
        }

        AddResult::Overflow(flowable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flowable::{Paragraph, Spacer, TextStyle};
    use crate::types::Size;

    fn frame(height: f32) -> Frame {
        Frame::new(Rect {
            x: Pt::whole(72),
            y: Pt::whole(72),
            width: Pt::whole(200),
            height: Pt::from_f32(height),
        })
    }

    #[test]
    fn stacks_flowables_until_full() {
        let mut canvas = Canvas::new(Size::LETTER);
        let mut frame = frame(30.0);
        assert!(matches!(
            frame.add(Box::new(Spacer::new(20.0)), &mut canvas),
            AddResult::Placed
        ));
        assert_eq!(frame.remaining_height(), Pt::whole(10));
        assert!(matches!(
            frame.add(Box::new(Spacer::new(20.0)), &mut canvas),
            AddResult::Overflow(_)
        ));
    }

    #[test]
    fn splits_paragraph_across_remaining_space() {
        let mut canvas = Canvas::new(Size::LETTER);
        let mut frame = frame(25.0);
        let text = "word ".repeat(200);
        let para = Paragraph::new(text).with_style(TextStyle::new("Helvetica", 10.0));
        assert!(matches!(
            frame.add(Box::new(para), &mut canvas),
            AddResult::Split(_)
        ));
        assert_eq!(frame.remaining_height(), Pt::from_f32(1.0));
    }

    #[test]
    fn oversized_unsplittable_is_forced_onto_empty_frame() {
        let mut canvas = Canvas::new(Size::LETTER);
        let mut frame = frame(10.0);
        assert!(matches!(
            frame.add(Box::new(Spacer::new(50.0)), &mut canvas),
            AddResult::Placed
        ));
        assert_eq!(frame.remaining_height(), Pt::ZERO);
    }
}
