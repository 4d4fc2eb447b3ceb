use crate::canvas::Canvas;
use crate::debug::DebugLogger;
use crate::error::ReportError;
use crate::finalize::Phase;
use crate::recorder::PageRecord;
use crate::types::{Color, Pt, Size};
use base64::Engine;
use image::GenericImageView;
use std::sync::Arc;

/// Geometry the trailer coordinates are measured against, whatever the output page size.
pub const TRAILER_REFERENCE_SIZE: Size = Size::LETTER;

pub const TRAILER_META_KEY: &str = "rp.trailer";

const TRAILER_FONT: &str = "Times-Roman";
const TRAILER_FONT_SIZE: Pt = Pt::whole(10);

// Bottom-up coordinates against TRAILER_REFERENCE_SIZE: (x_start, right_inset, y).
const UPPER_RULE: (Pt, Pt, Pt) = (Pt::whole(30), Pt::whole(50), Pt::whole(740));
const LOWER_RULE: (Pt, Pt, Pt) = (Pt::whole(66), Pt::whole(66), Pt::whole(78));

const PAGE_NUMBER_RIGHT_OFFSET: Pt = Pt::whole(128);
const PAGE_NUMBER_BASELINE: Pt = Pt::whole(65);

// Corner images hang this far below the top edge (their bottom edge).
const CORNER_IMAGE_DROP: Pt = Pt::whole(50);

pub fn page_number_text(index: usize, total: usize) -> String {
    format!("Page {} of {}", index, total)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CornerImage {
    source: String,
    intrinsic_width: u32,
    intrinsic_height: u32,
    box_size: Size,
    offset_from_right: Pt,
}

impl CornerImage {
    pub fn load(source: impl Into<String>, corner: Corner) -> Result<Self, ReportError> {
        let source = source.into();
        let (intrinsic_width, intrinsic_height) = image_dimensions(&source)?;
        if intrinsic_width == 0 || intrinsic_height == 0 {
            return Err(ReportError::Asset(format!("image '{}' is empty", source)));
        }
        // The left logo sits 2in from the right edge; the right logo 8in + 5pt.
        let (offset_from_right, box_size) = match corner {
            Corner::Left => (Pt::whole(144), Size::from_points(100.0, 30.0)),
            Corner::Right => (Pt::whole(581), Size::from_points(100.0, 20.0)),
        };
        Ok(Self {
            source,
            intrinsic_width,
            intrinsic_height,
            box_size,
            offset_from_right,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn intrinsic_size(&self) -> (u32, u32) {
        (self.intrinsic_width, self.intrinsic_height)
    }

    /// Top-left placement (x, y, width, height) centred inside the image box.
    fn placement(&self, reference: Size) -> (Pt, Pt, Pt, Pt) {
        let box_x = reference.width - self.offset_from_right;
        let box_y = CORNER_IMAGE_DROP - self.box_size.height;
        let scale_w = self.box_size.width.to_f32() / self.intrinsic_width as f32;
        let scale_h = self.box_size.height.to_f32() / self.intrinsic_height as f32;
        let scale = scale_w.min(scale_h);
        let width = Pt::from_f32(self.intrinsic_width as f32 * scale);
        let height = Pt::from_f32(self.intrinsic_height as f32 * scale);
        let x = box_x + (self.box_size.width - width) / 2;
        let y = box_y + (self.box_size.height - height) / 2;
        (x, y, width, height)
    }
}

fn image_dimensions(source: &str) -> Result<(u32, u32), ReportError> {
    if let Some(payload) = source.strip_prefix("data:") {
        let (header, data) = payload
            .split_once(',')
            .ok_or_else(|| ReportError::Asset("malformed data URI".to_string()))?;
        let bytes = if header.contains("base64") {
            base64::engine::general_purpose::STANDARD
                .decode(data)
                .map_err(|err| ReportError::Asset(format!("data URI: {err}")))?
        } else {
            data.as_bytes().to_vec()
        };
        let decoded = image::load_from_memory(&bytes)
            .map_err(|err| ReportError::Asset(format!("data URI: {err}")))?;
        return Ok(decoded.dimensions());
    }
    image::ImageReader::open(source)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|err| ReportError::Asset(format!("{source}: {err}")))?
        .into_dimensions()
        .map_err(|err| ReportError::Asset(format!("{source}: {err}")))
}

#[derive(Debug, Clone, Default)]
pub struct TrailerStamper {
    left_image: Option<CornerImage>,
    right_image: Option<CornerImage>,
    debug: Option<Arc<DebugLogger>>,
}

impl TrailerStamper {
    pub fn new(left_image: Option<CornerImage>, right_image: Option<CornerImage>) -> Self {
        Self {
            left_image,
            right_image,
            debug: None,
        }
    }

    pub(crate) fn with_debug(mut self, debug: Option<Arc<DebugLogger>>) -> Self {
        self.debug = debug;
        self
    }

    /// Page 1 is sealed untouched.
    pub fn stamp(&self, record: &PageRecord, total_pages: usize) -> Result<PageRecord, ReportError> {
        if record.is_sealed() {
            return Err(ReportError::state(
                Phase::Stamping,
                Some(record.index()),
                "page already stamped",
            ));
        }
        if record.index() == 0 || record.index() > total_pages {
            return Err(ReportError::state(
                Phase::Stamping,
                Some(record.index()),
                format!("page index outside 1..={}", total_pages),
            ));
        }
        if record.index() == 1 {
            return Ok(record.seal(record.state().clone()));
        }

        let reference = TRAILER_REFERENCE_SIZE;
        // Reference y values are bottom-up; keep them fixed on the output page.
        let page_height = record.state().page_size().height;
        let shift = page_height - reference.height;
        let top = |y: Pt| page_height - y;
        let mut canvas = Canvas::from_state(record.state().clone());
        canvas.meta(
            TRAILER_META_KEY,
            format!("{}/{}", record.index(), total_pages),
        );
        canvas.save_state();
        canvas.set_stroke_color(Color::BLACK);
        canvas.set_line_width(Pt::from_f32(0.5));
        for (x_start, right_inset, y) in [UPPER_RULE, LOWER_RULE] {
            canvas.line(x_start, top(y), reference.width - right_inset, top(y));
        }
        for image in [&self.left_image, &self.right_image].into_iter().flatten() {
            let (x, y, width, height) = image.placement(reference);
            canvas.draw_image(x, y + shift, width, height, image.source());
        }
        canvas.set_fill_color(Color::BLACK);
        canvas.set_font(TRAILER_FONT, TRAILER_FONT_SIZE);
        canvas.draw_string(
            reference.width - PAGE_NUMBER_RIGHT_OFFSET,
            top(PAGE_NUMBER_BASELINE) - TRAILER_FONT_SIZE,
            page_number_text(record.index(), total_pages),
        );
        canvas.restore_state();

        let stamped = record.seal(canvas.into_state());
        if let Some(logger) = self.debug.as_deref() {
            logger.log_event(
                "stamp.page",
                &[
                    ("index", record.index() as i64),
                    ("total", total_pages as i64),
                    ("trailer_commands", stamped.trailer_commands().len() as i64),
                ],
            );
        }
        Ok(stamped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::recorder::{PageRecorder, PageSink};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn records(pages: usize) -> Vec<PageRecord> {
        records_on(Size::LETTER, pages)
    }

    fn records_on(page_size: Size, pages: usize) -> Vec<PageRecord> {
        let mut recorder = PageRecorder::new(page_size);
        for page in 0..pages {
            let canvas = recorder.canvas().expect("collecting");
            canvas.set_fill_color(Color::rgb(0.2, 0.6, 0.6));
            canvas.set_font("Helvetica-Bold", Pt::whole(8));
            canvas.draw_string(Pt::whole(72), Pt::whole(72), format!("body {page}"));
            if page + 1 < pages {
                recorder.on_page_boundary().expect("boundary");
            }
        }
        recorder.finalize_last_page().expect("finalize");
        recorder.records().to_vec()
    }

    fn temp_png(tag: &str, width: u32, height: u32) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let path = std::env::temp_dir().join(format!(
            "reportpress_{tag}_{}_{}.png",
            std::process::id(),
            nanos
        ));
        image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .expect("write png");
        path.to_string_lossy().into_owned()
    }

    fn texts(commands: &[Command]) -> Vec<String> {
        commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::DrawString { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn first_page_is_sealed_without_trailer() {
        let pages = records(3);
        let stamped = TrailerStamper::default().stamp(&pages[0], 3).expect("stamp");
        assert!(stamped.is_sealed());
        assert!(stamped.trailer_commands().is_empty());
        assert_eq!(stamped.commands(), pages[0].commands());
    }

    #[test]
    fn later_pages_get_rules_and_page_number() {
        let pages = records(3);
        let stamped = TrailerStamper::default().stamp(&pages[1], 3).expect("stamp");
        let trailer = stamped.trailer_commands();
        assert_eq!(texts(trailer), vec!["Page 2 of 3".to_string()]);
        let strokes = trailer.iter().filter(|c| matches!(c, Command::Stroke)).count();
        assert_eq!(strokes, 2);
        assert!(!trailer.iter().any(|c| matches!(c, Command::DrawImage { .. })));
        assert_eq!(trailer.first(), Some(&Command::Meta {
            key: TRAILER_META_KEY.to_string(),
            value: "2/3".to_string(),
        }));
        assert_eq!(trailer.get(1), Some(&Command::SaveState));
        assert_eq!(trailer.last(), Some(&Command::RestoreState));
    }

    #[test]
    fn stamping_preserves_captured_content_and_state() {
        let pages = records(2);
        let original = &pages[1];
        let stamped = TrailerStamper::default().stamp(original, 2).expect("stamp");
        let prefix = &stamped.commands()[..original.commands().len()];
        assert_eq!(prefix, original.commands());
        assert_eq!(stamped.captured_commands(), original.commands());
        assert_eq!(stamped.state().graphics(), original.state().graphics());
        assert_eq!(stamped.state().save_depth(), original.state().save_depth());
    }

    #[test]
    fn rules_and_text_use_reference_geometry() {
        let pages = records(2);
        let stamped = TrailerStamper::default().stamp(&pages[1], 2).expect("stamp");
        let trailer = stamped.trailer_commands();
        assert!(trailer.contains(&Command::MoveTo {
            x: Pt::whole(30),
            y: Pt::whole(52),
        }));
        assert!(trailer.contains(&Command::LineTo {
            x: Pt::whole(546),
            y: Pt::whole(714),
        }));
        assert!(trailer.contains(&Command::DrawString {
            x: Pt::whole(484),
            y: Pt::whole(717),
            text: "Page 2 of 2".to_string(),
        }));
    }

    #[test]
    fn trailer_keeps_bottom_up_position_on_taller_pages() {
        let a4 = Size::a4();
        let pages = records_on(a4, 2);
        let stamped = TrailerStamper::default().stamp(&pages[1], 2).expect("stamp");
        let trailer = stamped.trailer_commands();
        assert!(trailer.contains(&Command::MoveTo {
            x: Pt::whole(30),
            y: a4.height - Pt::whole(740),
        }));
        assert!(trailer.contains(&Command::MoveTo {
            x: Pt::whole(66),
            y: a4.height - Pt::whole(78),
        }));
        assert!(trailer.contains(&Command::DrawString {
            x: Pt::whole(484),
            y: a4.height - Pt::whole(75),
            text: "Page 2 of 2".to_string(),
        }));
    }

    #[test]
    fn restamping_is_rejected() {
        let pages = records(2);
        let stamper = TrailerStamper::default();
        let stamped = stamper.stamp(&pages[1], 2).expect("stamp");
        let err = stamper.stamp(&stamped, 2).expect_err("second stamp");
        assert!(err.is_state_violation());
    }

    #[test]
    fn corner_images_are_fitted_inside_their_boxes() {
        let left = CornerImage::load(temp_png("left", 200, 30), Corner::Left).expect("left");
        let right = CornerImage::load(temp_png("right", 40, 40), Corner::Right).expect("right");
        assert_eq!(left.intrinsic_size(), (200, 30));
        let stamper = TrailerStamper::new(Some(left.clone()), Some(right.clone()));
        let pages = records(2);
        let stamped = stamper.stamp(&pages[1], 2).expect("stamp");
        let images: Vec<&Command> = stamped
            .trailer_commands()
            .iter()
            .filter(|c| matches!(c, Command::DrawImage { .. }))
            .collect();
        assert_eq!(images.len(), 2);
        // 200x30 into 100x30 scales by 0.5 -> 100x15, centred vertically.
        assert_eq!(images[0], &Command::DrawImage {
            x: Pt::whole(468),
            y: Pt::from_f32(27.5),
            width: Pt::whole(100),
            height: Pt::from_f32(15.0),
            resource_id: left.source().to_string(),
        });
        // 40x40 into 100x20 scales by 0.5 -> 20x20, centred horizontally.
        assert_eq!(images[1], &Command::DrawImage {
            x: Pt::whole(71),
            y: Pt::whole(30),
            width: Pt::whole(20),
            height: Pt::whole(20),
            resource_id: right.source().to_string(),
        });
    }

    #[test]
    fn missing_image_is_an_asset_error() {
        let err = CornerImage::load("/definitely/not/here.png", Corner::Left)
            .expect_err("missing file");
        assert!(matches!(err, ReportError::Asset(_)));
    }
}
