use crate::types::{Color, Pt, Size};

// Coordinates use a top-left origin.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    // Non-rendered annotation. Ignored by the PDF writer.
    Meta {
        key: String,
        value: String,
    },
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetFontName(String),
    SetFontSize(Pt),
    MoveTo {
        x: Pt,
        y: Pt,
    },
    LineTo {
        x: Pt,
        y: Pt,
    },
    Stroke,
    // `y` is the top of the text box; the baseline sits one font size below.
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
    DrawRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    DrawImage {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: String,
    },
}

pub const DEFAULT_FONT_NAME: &str = "Helvetica";

#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsState {
    pub fill_color: Color,
    pub stroke_color: Color,
    pub line_width: Pt,
    pub font_name: String,
    pub font_size: Pt,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::whole(1),
            font_name: DEFAULT_FONT_NAME.to_string(),
            font_size: Pt::whole(12),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceState {
    page_size: Size,
    graphics: GraphicsState,
    saved: Vec<GraphicsState>,
    commands: Vec<Command>,
}

impl SurfaceState {
    fn blank(page_size: Size) -> Self {
        Self {
            page_size,
            graphics: GraphicsState::default(),
            saved: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn graphics(&self) -> &GraphicsState {
        &self.graphics
    }

    pub fn save_depth(&self) -> usize {
        self.saved.len()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }
}

pub struct Canvas {
    state: SurfaceState,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            state: SurfaceState::blank(page_size),
        }
    }

    pub fn from_state(state: SurfaceState) -> Self {
        Self { state }
    }

    pub fn page_size(&self) -> Size {
        self.state.page_size
    }

    pub fn graphics(&self) -> &GraphicsState {
        &self.state.graphics
    }

    pub fn issue(&mut self, command: Command) {
        let graphics = &mut self.state.graphics;
        match &command {
            Command::SaveState => self.state.saved.push(graphics.clone()),
            Command::RestoreState => match self.state.saved.pop() {
                Some(saved) => *graphics = saved,
                None => return,
            },
            Command::SetFillColor(color) => graphics.fill_color = *color,
            Command::SetStrokeColor(color) => graphics.stroke_color = *color,
            Command::SetLineWidth(width) => graphics.line_width = *width,
            Command::SetFontName(name) => graphics.font_name = name.clone(),
            Command::SetFontSize(size) => graphics.font_size = *size,
            _ => {}
        }
        self.state.commands.push(command);
    }

    pub fn snapshot_state(&self) -> SurfaceState {
        self.state.clone()
    }

    pub fn reset(&mut self) {
        self.state = SurfaceState::blank(self.state.page_size);
    }

    pub fn into_state(self) -> SurfaceState {
        self.state
    }

    pub fn command_count(&self) -> usize {
        self.state.commands.len()
    }

    pub fn is_current_empty(&self) -> bool {
        self.state.commands.is_empty()
    }

    pub fn save_state(&mut self) {
        self.issue(Command::SaveState);
    }

    pub fn restore_state(&mut self) {
        self.issue(Command::RestoreState);
    }

    pub fn meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.issue(Command::Meta {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.state.graphics.fill_color == color {
            return;
        }
        self.issue(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.state.graphics.stroke_color == color {
            return;
        }
        self.issue(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: Pt) {
        let width = width.max(Pt::ZERO);
        if self.state.graphics.line_width == width {
            return;
        }
        self.issue(Command::SetLineWidth(width));
    }

    pub fn set_font(&mut self, name: &str, size: Pt) {
        if self.state.graphics.font_name != name {
            self.issue(Command::SetFontName(name.to_string()));
        }
        if self.state.graphics.font_size != size {
            self.issue(Command::SetFontSize(size));
        }
    }

    pub fn line(&mut self, x1: Pt, y1: Pt, x2: Pt, y2: Pt) {
        self.issue(Command::MoveTo { x: x1, y: y1 });
        self.issue(Command::LineTo { x: x2, y: y2 });
        self.issue(Command::Stroke);
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        self.issue(Command::DrawString {
            x,
            y,
            text: text.into(),
        });
    }

    pub fn draw_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.issue(Command::DrawRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn draw_image(
        &mut self,
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: impl Into<String>,
    ) {
        self.issue(Command::DrawImage {
            x,
            y,
            width,
            height,
            resource_id: resource_id.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(v: f32) -> Pt {
        Pt::from_f32(v)
    }

    #[test]
    fn snapshot_is_independent_of_later_drawing() {
        let mut canvas = Canvas::new(Size::LETTER);
        canvas.set_fill_color(Color::rgb(1.0, 0.0, 0.0));
        canvas.draw_string(pt(10.0), pt(10.0), "first");
        let snapshot = canvas.snapshot_state();

        canvas.draw_string(pt(10.0), pt(30.0), "second");
        canvas.set_fill_color(Color::BLACK);

        assert_eq!(snapshot.commands().len(), 2);
        assert_eq!(snapshot.graphics().fill_color, Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(canvas.command_count(), 4);
    }

    #[test]
    fn reset_clears_instructions_and_restores_defaults() {
        let mut canvas = Canvas::new(Size::LETTER);
        canvas.save_state();
        canvas.set_font("Times-Roman", pt(10.0));
        canvas.set_line_width(pt(0.5));
        canvas.line(pt(0.0), pt(0.0), pt(10.0), pt(0.0));
        canvas.reset();

        let state = canvas.snapshot_state();
        assert!(state.commands().is_empty());
        assert_eq!(state.save_depth(), 0);
        assert_eq!(state.graphics(), &GraphicsState::default());
        assert_eq!(state.page_size(), Size::LETTER);
    }

    #[test]
    fn restore_reverts_tracked_state() {
        let mut canvas = Canvas::new(Size::LETTER);
        canvas.set_stroke_color(Color::rgb(0.2, 0.5, 0.5));
        canvas.save_state();
        canvas.set_stroke_color(Color::BLACK);
        canvas.set_font("Times-Roman", pt(10.0));
        canvas.restore_state();

        assert_eq!(canvas.graphics().stroke_color, Color::rgb(0.2, 0.5, 0.5));
        assert_eq!(canvas.graphics().font_name, DEFAULT_FONT_NAME);
        assert_eq!(canvas.snapshot_state().save_depth(), 0);
    }

    #[test]
    fn unbalanced_restore_is_ignored() {
        let mut canvas = Canvas::new(Size::LETTER);
        canvas.restore_state();
        assert!(canvas.is_current_empty());
    }

    #[test]
    fn redundant_state_changes_are_not_recorded() {
        let mut canvas = Canvas::new(Size::LETTER);
        canvas.set_fill_color(Color::BLACK);
        canvas.set_line_width(Pt::whole(1));
        canvas.set_font(DEFAULT_FONT_NAME, Pt::whole(12));
        assert!(canvas.is_current_empty());
    }
}
