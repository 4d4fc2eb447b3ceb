use crate::canvas::{Canvas, DEFAULT_FONT_NAME};
use crate::types::{Color, Pt, Size};

pub trait Flowable {
    fn wrap(&self, avail_width: Pt, avail_height: Pt) -> Size;
    fn split(
        &self,
        avail_width: Pt,
        avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)>;
    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, avail_height: Pt);

    fn debug_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "left" => Some(TextAlign::Left),
            "center" | "centre" => Some(TextAlign::Center),
            "right" => Some(TextAlign::Right),
            _ => None,
        }
    }

    fn offset(self, slack: Pt) -> Pt {
        match self {
            TextAlign::Left => Pt::ZERO,
            TextAlign::Center => slack / 2,
            TextAlign::Right => slack,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font_name: String,
    pub font_size: Pt,
    pub line_height: Pt,
    pub color: Color,
}

impl TextStyle {
    pub fn new(font_name: impl Into<String>, font_size: f32) -> Self {
        let font_size = Pt::from_f32(font_size);
        Self {
            font_name: font_name.into(),
            font_size,
            line_height: font_size.mul_ratio(6, 5),
            color: Color::BLACK,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self::new(DEFAULT_FONT_NAME, 12.0)
    }
}

// No font metrics are loaded: every glyph advances 0.6em.
pub(crate) fn measure_text_width(style: &TextStyle, text: &str) -> Pt {
    let char_width = (style.font_size * 0.6).max(Pt::from_f32(1.0));
    char_width * (text.chars().count() as i32)
}

#[derive(Debug, Clone)]
struct Line {
    text: String,
    width: Pt,
}

#[derive(Debug, Clone)]
pub struct Paragraph {
    text: String,
    style: TextStyle,
    align: TextAlign,
}

impl Paragraph {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: TextStyle::default(),
            align: TextAlign::Left,
        }
    }

    pub fn with_style(mut self, style: TextStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_align(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn style(&self) -> &TextStyle {
        &self.style
    }

    fn layout_lines(&self, avail_width: Pt) -> Vec<Line> {
        let mut lines = Vec::new();
        for source_line in self.text.split('\n') {
            let mut current = String::new();
            for word in source_line.split_whitespace() {
                let candidate = if current.is_empty() {
                    word.to_string()
                } else {
                    format!("{current} {word}")
                };
                if !current.is_empty()
                    && measure_text_width(&self.style, &candidate) > avail_width
                {
                    let width = measure_text_width(&self.style, &current);
                    lines.push(Line {
                        text: std::mem::replace(&mut current, word.to_string()),
                        width,
                    });
                } else {
                    current = candidate;
                }
            }
            if !current.is_empty() {
                let width = measure_text_width(&self.style, &current);
                lines.push(Line {
                    text: current,
                    width,
                });
            }
        }
        lines
    }
}

impl Flowable for Paragraph {
    fn wrap(&self, avail_width: Pt, _avail_height: Pt) -> Size {
        let lines = self.layout_lines(avail_width);
        let width = lines
            .iter()
            .fold(Pt::ZERO, |acc, line| acc.max(line.width))
            .min(avail_width);
        Size {
            width,
            height: self.style.line_height * (lines.len() as i32),
        }
    }

    fn split(
        &self,
        avail_width: Pt,
        avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        let lines = self.layout_lines(avail_width);
        let lh = self.style.line_height.to_milli_i64();
        let ah = avail_height.to_milli_i64();
        if lh <= 0 || ah <= 0 {
            return None;
        }
        let max_lines = (ah / lh) as usize;
        if max_lines == 0 || max_lines >= lines.len() {
            return None;
        }
        let join = |part: &[Line]| {
            part.iter()
                .map(|line| line.text.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        };
        let first = Paragraph {
            text: join(&lines[..max_lines]),
            style: self.style.clone(),
            align: self.align,
        };
        let second = Paragraph {
            text: join(&lines[max_lines..]),
            style: self.style.clone(),
            align: self.align,
        };
        Some((Box::new(first), Box::new(second)))
    }

    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, _avail_height: Pt) {
        let lines = self.layout_lines(avail_width);
        if lines.is_empty() {
            return;
        }
        canvas.set_fill_color(self.style.color);
        canvas.set_font(&self.style.font_name, self.style.font_size);
        for (idx, line) in lines.into_iter().enumerate() {
            let slack = (avail_width - line.width).max(Pt::ZERO);
            canvas.draw_string(
                x + self.align.offset(slack),
                y + self.style.line_height * (idx as i32),
                line.text,
            );
        }
    }
}

#[derive(Debug, Clone)]
pub struct Spacer {
    height: Pt,
}

impl Spacer {
    pub fn new(height: f32) -> Self {
        Self {
            height: Pt::from_f32(height).max(Pt::ZERO),
        }
    }
}

impl Flowable for Spacer {
    fn wrap(&self, avail_width: Pt, _avail_height: Pt) -> Size {
        Size {
            width: avail_width,
            height: self.height,
        }
    }

    fn split(
        &self,
        _avail_width: Pt,
        _avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        None
    }

    fn draw(&self, _canvas: &mut Canvas, _x: Pt, _y: Pt, _avail_width: Pt, _avail_height: Pt) {}
}

// `start` and `end` are relative to the frame's left edge.
#[derive(Debug, Clone)]
pub struct HRule {
    start: Pt,
    end: Pt,
    thickness: Pt,
    color: Color,
}

impl HRule {
    pub fn new(start: f32, end: f32, thickness: f32, color: Color) -> Self {
        Self {
            start: Pt::from_f32(start),
            end: Pt::from_f32(end),
            thickness: Pt::from_f32(thickness),
            color,
        }
    }
}

impl Flowable for HRule {
    fn wrap(&self, avail_width: Pt, _avail_height: Pt) -> Size {
        Size {
            width: avail_width,
            height: Pt::whole(1),
        }
    }

    fn split(
        &self,
        _avail_width: Pt,
        _avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        None
    }

    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, _avail_width: Pt, _avail_height: Pt) {
        let baseline = y + Pt::whole(1);
        canvas.set_stroke_color(self.color);
        canvas.set_line_width(self.thickness);
        canvas.line(x + self.start, baseline, x + self.end, baseline);
    }
}

#[derive(Debug, Clone)]
pub struct TableCell {
    pub text: String,
    pub style: TextStyle,
    pub align: TextAlign,
}

impl TableCell {
    pub fn new(text: impl Into<String>, style: TextStyle, align: TextAlign) -> Self {
        Self {
            text: text.into(),
            style,
            align,
        }
    }

    fn paragraph(&self) -> Paragraph {
        Paragraph::new(self.text.clone())
            .with_style(self.style.clone())
            .with_align(self.align)
    }
}

#[derive(Debug, Clone)]
pub struct TableRow {
    cells: Vec<TableCell>,
    background: Option<Color>,
    leading_span: usize,
}

impl TableRow {
    pub fn new(cells: Vec<TableCell>) -> Self {
        Self {
            cells,
            background: None,
            leading_span: 1,
        }
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }

    /// Merges the first `span` columns into one cell showing the first cell's text.
    pub fn with_leading_span(mut self, span: usize) -> Self {
        self.leading_span = span.max(1);
        self
    }

    pub fn cells(&self) -> &[TableCell] {
        &self.cells
    }
}

const CELL_PADDING_X: Pt = Pt::whole(6);
const CELL_PADDING_Y: Pt = Pt::whole(3);

#[derive(Debug, Clone)]
pub struct TableFlowable {
    col_widths: Vec<Pt>,
    rows: Vec<TableRow>,
    repeat_rows: usize,
    rule_above: Option<(Pt, Color)>,
}

impl TableFlowable {
    pub fn new(col_widths: Vec<Pt>, rows: Vec<TableRow>) -> Self {
        Self {
            col_widths,
            rows,
            repeat_rows: 0,
            rule_above: None,
        }
    }

    /// Leading rows copied to the top of every continuation part.
    pub fn with_repeat_rows(mut self, count: usize) -> Self {
        self.repeat_rows = count;
        self
    }

    pub fn with_rule_above(mut self, width: f32, color: Color) -> Self {
        self.rule_above = Some((Pt::from_f32(width), color));
        self
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    fn total_width(&self) -> Pt {
        self.col_widths.iter().sum()
    }

    // (x offset, width) of every visible cell.
    fn cell_boxes<'a>(&'a self, row: &'a TableRow) -> Vec<(Pt, Pt, &'a TableCell)> {
        let mut boxes = Vec::with_capacity(row.cells.len());
        let mut x = Pt::ZERO;
        let mut col = 0usize;
        while col < self.col_widths.len() {
            let span = if col == 0 { row.leading_span } else { 1 };
            let span = span.min(self.col_widths.len() - col);
            let width: Pt = self.col_widths[col..col + span].iter().sum();
            if let Some(cell) = row.cells.get(col) {
                boxes.push((x, width, cell));
            }
            x += width;
            col += span;
        }
        boxes
    }

    fn row_height(&self, row: &TableRow) -> Pt {
        let mut content = row
            .cells
            .first()
            .map(|cell| cell.style.line_height)
            .unwrap_or(Pt::ZERO);
        for (_, width, cell) in self.cell_boxes(row) {
            let inner = (width - CELL_PADDING_X * 2).max(Pt::ZERO);
            content = content.max(cell.paragraph().wrap(inner, Pt::ZERO).height);
        }
        content + CELL_PADDING_Y * 2
    }
}

impl Flowable for TableFlowable {
    fn wrap(&self, _avail_width: Pt, _avail_height: Pt) -> Size {
        Size {
            width: self.total_width(),
            height: self.rows.iter().map(|row| self.row_height(row)).sum(),
        }
    }

    fn split(
        &self,
        _avail_width: Pt,
        avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        let mut used = Pt::ZERO;
        let mut fitting = 0usize;
        for row in &self.rows {
            let height = self.row_height(row);
            if used + height > avail_height {
                break;
            }
            used += height;
            fitting += 1;
        }
        let repeat = self.repeat_rows.min(self.rows.len());
        if fitting <= repeat || fitting >= self.rows.len() {
            return None;
        }
        let first = TableFlowable {
            rows: self.rows[..fitting].to_vec(),
            ..self.clone()
        };
        let mut rest = self.rows[..repeat].to_vec();
        rest.extend_from_slice(&self.rows[fitting..]);
        let second = TableFlowable {
            rows: rest,
            ..self.clone()
        };
        Some((Box::new(first), Box::new(second)))
    }

    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, _avail_height: Pt) {
        let total_width = self.total_width();
        let left = x + (avail_width - total_width) / 2;
        let heights: Vec<Pt> = self.rows.iter().map(|row| self.row_height(row)).collect();

        let mut row_y = y;
        for (row, height) in self.rows.iter().zip(&heights) {
            if let Some(color) = row.background {
                canvas.set_fill_color(color);
                canvas.draw_rect(left, row_y, total_width, *height);
            }
            row_y += *height;
        }

        if let Some((width, color)) = self.rule_above {
            canvas.set_stroke_color(color);
            canvas.set_line_width(width);
            let mut row_y = y;
            for height in &heights {
                canvas.line(left, row_y, left + total_width, row_y);
                row_y += *height;
            }
        }

        let mut row_y = y;
        for (row, height) in self.rows.iter().zip(&heights) {
            for (cell_x, width, cell) in self.cell_boxes(row) {
                let inner = (width - CELL_PADDING_X * 2).max(Pt::ZERO);
                cell.paragraph().draw(
                    canvas,
                    left + cell_x + CELL_PADDING_X,
                    row_y + CELL_PADDING_Y,
                    inner,
                    *height,
                );
            }
            row_y += *height;
        }
    }
}
