use crate::canvas::{Command, DEFAULT_FONT_NAME};
use crate::debug::{DebugLogger, json_escape};
use crate::error::ReportError;
use crate::finalize::{CloseMode, PageEncoder, Phase};
use crate::recorder::PageRecord;
use crate::types::{Color, Pt, Size};
use base64::Engine;
use fixed::types::I32F32;
use image::GenericImageView;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

const PDF_CATALOG_ID: usize = 1;
const PDF_PAGES_ID: usize = 2;
const PDF_RESOURCES_ID: usize = 3;

// Keeps each intermediate /Pages node small for viewers that load lazily.
const PDF_PAGE_NODE_MAX_KIDS: usize = 256;

const PRODUCER: &str = concat!("reportpress ", env!("CARGO_PKG_VERSION"));

struct PdfPageNode {
    id: usize,
    kids: Vec<usize>,
}

struct StreamFont {
    resource: String,
    object_id: usize,
}

#[derive(Clone)]
struct TextState {
    font_name: String,
    font_size: Pt,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_name: DEFAULT_FONT_NAME.to_string(),
            font_size: Pt::whole(12),
        }
    }
}

pub struct PdfStreamWriter<W: Write> {
    writer: W,
    offset: usize,
    offsets: Vec<usize>, // index by object id; 0 is the free object.
    next_id: usize,
    title: Option<String>,
    debug: Option<Arc<DebugLogger>>,

    fonts: BTreeMap<String, StreamFont>,
    image_resources: Vec<(String, usize)>,
    image_name_map: HashMap<String, String>,
    image_bytes_total: usize,

    page_nodes: Vec<PdfPageNode>,
    current_node: Option<PdfPageNode>,
    page_ids: Vec<usize>,

    fingerprint: Sha256,
    closed: bool,
}

impl<W: Write> PdfStreamWriter<W> {
    pub fn new(mut writer: W) -> Result<Self, ReportError> {
        let mut offset = 0usize;
        write_bytes(&mut writer, b"%PDF-1.7\n", &mut offset)?;
        write_bytes(&mut writer, b"%\xE2\xE3\xCF\xD3\n", &mut offset)?;
        Ok(Self {
            writer,
            offset,
            offsets: vec![0; PDF_RESOURCES_ID + 1],
            next_id: PDF_RESOURCES_ID + 1,
            title: None,
            debug: None,
            fonts: BTreeMap::new(),
            image_resources: Vec::new(),
            image_name_map: HashMap::new(),
            image_bytes_total: 0,
            page_nodes: Vec::new(),
            current_node: None,
            page_ids: Vec::new(),
            fingerprint: Sha256::new(),
            closed: false,
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub(crate) fn with_debug(mut self, debug: Option<Arc<DebugLogger>>) -> Self {
        self.debug = debug;
        self
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn ensure_offsets_len(&mut self, required_len: usize) {
        if self.offsets.len() < required_len {
            self.offsets.resize(required_len, 0);
        }
    }

    fn alloc_ids(&mut self, count: usize) -> usize {
        let start = self.next_id;
        self.next_id = self.next_id.saturating_add(count);
        self.ensure_offsets_len(self.next_id);
        start
    }

    fn write_object(&mut self, obj_id: usize, body: &str) -> io::Result<()> {
        write_pdf_object(
            &mut self.writer,
            &mut self.offset,
            &mut self.offsets,
            obj_id,
            body.as_bytes(),
        )
    }

    fn write_stream(&mut self, obj_id: usize, dict: &str, data: &[u8]) -> io::Result<()> {
        let mut body = format!("<< {} /Length {} >>\nstream\n", dict, data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        write_pdf_object(
            &mut self.writer,
            &mut self.offset,
            &mut self.offsets,
            obj_id,
            &body,
        )
    }

    fn ensure_page_node(&mut self) -> usize {
        let needs_new = self
            .current_node
            .as_ref()
            .map(|n| n.kids.len() >= PDF_PAGE_NODE_MAX_KIDS)
            .unwrap_or(true);
        if needs_new {
            if let Some(node) = self.current_node.take() {
                self.page_nodes.push(node);
            }
            let id = self.alloc_ids(1);
            self.current_node = Some(PdfPageNode {
                id,
                kids: Vec::with_capacity(PDF_PAGE_NODE_MAX_KIDS),
            });
        }
        self.current_node
            .as_ref()
            .map(|n| n.id)
            .unwrap_or(PDF_PAGES_ID)
    }

    // Font objects are allocated on first use and written on close.
    fn ensure_font(&mut self, name: &str) -> String {
        if let Some(font) = self.fonts.get(name) {
            return font.resource.clone();
        }
        let resource = format!("F{}", self.fonts.len() + 1);
        let object_id = self.alloc_ids(1);
        self.fonts.insert(
            name.to_string(),
            StreamFont {
                resource: resource.clone(),
                object_id,
            },
        );
        resource
    }

    fn ensure_image(&mut self, source: &str) -> Result<String, ReportError> {
        if let Some(name) = self.image_name_map.get(source) {
            return Ok(name.clone());
        }
        let image = load_image(source)?;
        let smask_id = image.alpha.as_ref().map(|_| self.alloc_ids(1));
        let obj_id = self.alloc_ids(1);
        let name = format!("Im{}", self.image_resources.len() + 1);

        self.image_bytes_total += image.data.len();
        if let (Some(alpha), Some(mask_id)) = (image.alpha.as_ref(), smask_id) {
            self.image_bytes_total += alpha.len();
            let mask = deflate(alpha);
            self.write_stream(mask_id, &image_smask_dict(&image), &mask)?;
        }
        let (dict, data) = image_stream(&image, smask_id);
        self.write_stream(obj_id, &dict, &data)?;
        self.image_resources.push((name.clone(), obj_id));
        self.image_name_map.insert(source.to_string(), name.clone());
        Ok(name)
    }

    fn render_commands(
        &mut self,
        commands: &[Command],
        page_height: Pt,
    ) -> Result<String, ReportError> {
        let mut out = String::new();
        let mut text = TextState::default();
        let mut saved: Vec<TextState> = Vec::new();

        for cmd in commands {
            match cmd {
                Command::SaveState => {
                    saved.push(text.clone());
                    out.push_str("q\n");
                }
                Command::RestoreState => {
                    if let Some(previous) = saved.pop() {
                        text = previous;
                        out.push_str("Q\n");
                    }
                }
                Command::Meta { .. } => {}
                Command::SetFillColor(color) => out.push_str(&color_to_pdf_fill(*color)),
                Command::SetStrokeColor(color) => out.push_str(&color_to_pdf_stroke(*color)),
                Command::SetLineWidth(width) => {
                    out.push_str(&format!("{} w\n", fmt_pt(*width)));
                }
                Command::SetFontName(name) => text.font_name = name.clone(),
                Command::SetFontSize(size) => text.font_size = *size,
                Command::MoveTo { x, y } => {
                    out.push_str(&format!("{} {} m\n", fmt_pt(*x), fmt_pt(page_height - *y)));
                }
                Command::LineTo { x, y } => {
                    out.push_str(&format!("{} {} l\n", fmt_pt(*x), fmt_pt(page_height - *y)));
                }
                Command::Stroke => out.push_str("S\n"),
                Command::DrawString { x, y, text: shown } => {
                    let resource = self.ensure_font(&text.font_name);
                    let encoded = encode_winansi_pdf_string(shown);
                    if encoded.replaced > 0 {
                        if let Some(logger) = self.debug.as_deref() {
                            logger.log_json(&format!(
                                "{{\"type\":\"pdf.winansi.lossy\",\"font\":\"{}\",\"replaced\":{}}}",
                                json_escape(&text.font_name),
                                encoded.replaced
                            ));
                            logger.increment("pdf.winansi.lossy", encoded.replaced as u64);
                        }
                    }
                    out.push_str("BT\n");
                    out.push_str(&format!("/{} {} Tf\n", resource, fmt_pt(text.font_size)));
                    out.push_str(&format!(
                        "{} {} Td\n",
                        fmt_pt(*x),
                        fmt_pt(page_height - *y - text.font_size)
                    ));
                    out.push_str(&format!("({}) Tj\n", encoded.text));
                    out.push_str("ET\n");
                }
                Command::DrawRect {
                    x,
                    y,
                    width,
                    height,
                } => {
                    let draw_y = page_height - *y - *height;
                    out.push_str(&format!(
                        "{} {} {} {} re\nf\n",
                        fmt_pt(*x),
                        fmt_pt(draw_y),
                        fmt_pt(*width),
                        fmt_pt(*height)
                    ));
                }
                Command::DrawImage {
                    x,
                    y,
                    width,
                    height,
                    resource_id,
                } => {
                    let name = self.ensure_image(resource_id)?;
                    let draw_y = page_height - *y - *height;
                    out.push_str("q\n");
                    out.push_str(&format!(
                        "{} 0 0 {} {} {} cm\n",
                        fmt_pt(*width),
                        fmt_pt(*height),
                        fmt_pt(*x),
                        fmt_pt(draw_y)
                    ));
                    out.push_str(&format!("/{} Do\n", name));
                    out.push_str("Q\n");
                }
            }
        }
        Ok(out)
    }

    fn add_page(&mut self, page_size: Size, commands: &[Command]) -> Result<usize, ReportError> {
        let parent_id = self.ensure_page_node();
        let start = self.alloc_ids(2);
        let content_id = start;
        let page_id = start + 1;

        let content_stream = self.render_commands(commands, page_size.height)?;
        self.fingerprint.update(content_stream.as_bytes());
        self.write_stream(
            content_id,
            "/Filter /FlateDecode",
            &deflate(content_stream.as_bytes()),
        )?;

        let page_obj = format!(
            "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] /Resources {} 0 R /Contents {} 0 R >>",
            parent_id,
            fmt_pt(page_size.width),
            fmt_pt(page_size.height),
            PDF_RESOURCES_ID,
            content_id,
        );
        self.write_object(page_id, &page_obj)?;
        if let Some(node) = self.current_node.as_mut() {
            node.kids.push(page_id);
        }
        self.page_ids.push(page_id);
        Ok(content_stream.len())
    }

    fn finish(&mut self) -> Result<usize, ReportError> {
        if let Some(node) = self.current_node.take() {
            self.page_nodes.push(node);
        }

        // 1) Fonts.
        let fonts = std::mem::take(&mut self.fonts);
        for (name, font) in &fonts {
            self.write_object(font.object_id, &font_object(name))?;
        }

        // 2) Resources dictionary (referenced by every page).
        let font_entries: Vec<(String, usize)> = fonts
            .values()
            .map(|font| (font.resource.clone(), font.object_id))
            .collect();
        let mut resources = vec![
            "/ProcSet [/PDF /Text /ImageB /ImageC]".to_string(),
            format!("/Font {}", resource_dict(&font_entries)),
        ];
        if !self.image_resources.is_empty() {
            resources.push(format!(
                "/XObject {}",
                resource_dict(&self.image_resources)
            ));
        }
        self.write_object(PDF_RESOURCES_ID, &format!("<< {} >>", resources.join(" ")))?;

        // 3) Page tree nodes + root.
        let page_nodes = std::mem::take(&mut self.page_nodes);
        for node in &page_nodes {
            self.write_object(
                node.id,
                &format!(
                    "<< /Type /Pages /Parent {} 0 R /Count {} /Kids [{}] >>",
                    PDF_PAGES_ID,
                    node.kids.len(),
                    object_refs(node.kids.iter().copied())
                ),
            )?;
        }
        self.write_object(
            PDF_PAGES_ID,
            &format!(
                "<< /Type /Pages /Count {} /Kids [{}] >>",
                self.page_ids.len(),
                object_refs(page_nodes.iter().map(|node| node.id))
            ),
        )?;

        // 4) Info + catalog.
        let info_id = self.alloc_ids(1);
        self.write_object(info_id, &info_object(self.title.as_deref()))?;
        self.write_object(
            PDF_CATALOG_ID,
            &format!("<< /Type /Catalog /Pages {} 0 R >>", PDF_PAGES_ID),
        )?;

        // 5) XRef + trailer.
        let document_id = hex_digest(&std::mem::take(&mut self.fingerprint).finalize());
        let total_objects = self.next_id.saturating_sub(1);
        let xref_start = self.offset;
        write_str(
            &mut self.writer,
            &format!("xref\n0 {}\n", total_objects + 1),
            &mut self.offset,
        )?;
        write_bytes(&mut self.writer, b"0000000000 65535 f \n", &mut self.offset)?;
        for id in 1..=total_objects {
            let obj_offset = self.offsets.get(id).copied().unwrap_or(0);
            write_str(
                &mut self.writer,
                &format!("{:010} 00000 n \n", obj_offset),
                &mut self.offset,
            )?;
        }
        let trailer = format!(
            "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R /ID [<{}> <{}>] >>\nstartxref\n{}\n%%EOF\n",
            total_objects + 1,
            PDF_CATALOG_ID,
            info_id,
            document_id,
            document_id,
            xref_start
        );
        write_str(&mut self.writer, &trailer, &mut self.offset)?;
        self.writer.flush()?;

        if let Some(logger) = self.debug.as_deref() {
            logger.log_json(&format!(
                "{{\"type\":\"pdf.close\",\"mode\":\"complete\",\"bytes\":{},\"pages\":{},\"fonts\":{},\"images\":{},\"image_bytes\":{}}}",
                self.offset,
                self.page_ids.len(),
                fonts.len(),
                self.image_resources.len(),
                self.image_bytes_total
            ));
            logger.increment("pdf.close", 1);
        }
        Ok(self.offset)
    }

    fn closed_error(&self, message: &str) -> ReportError {
        ReportError::state(Phase::Committed, Some(self.page_ids.len()), message)
    }
}

impl<W: Write> PageEncoder for PdfStreamWriter<W> {
    fn commit_page(&mut self, record: &PageRecord) -> Result<usize, ReportError> {
        if self.closed {
            return Err(self.closed_error("page committed after the encoder was closed"));
        }
        if record.index() != self.page_ids.len() + 1 {
            return Err(ReportError::state(
                Phase::Committed,
                Some(record.index()),
                format!("expected page {}", self.page_ids.len() + 1),
            ));
        }
        self.add_page(record.state().page_size(), record.commands())
    }

    fn close(&mut self, mode: CloseMode) -> Result<usize, ReportError> {
        if self.closed {
            return Err(self.closed_error("encoder already closed"));
        }
        self.closed = true;
        match mode {
            CloseMode::Complete => self.finish(),
            CloseMode::Aborted => {
                log::warn!(
                    "PDF output aborted after {} page(s); no cross-reference table written",
                    self.page_ids.len()
                );
                if let Some(logger) = self.debug.as_deref() {
                    logger.log_json(&format!(
                        "{{\"type\":\"pdf.close\",\"mode\":\"aborted\",\"bytes\":{},\"pages\":{}}}",
                        self.offset,
                        self.page_ids.len()
                    ));
                    logger.increment("pdf.close", 1);
                }
                self.writer.flush()?;
                Ok(self.offset)
            }
        }
    }
}

struct ImageData {
    width: u32,
    height: u32,
    color_space: &'static str,
    filter: Option<&'static str>,
    data: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

fn load_image(source: &str) -> Result<ImageData, ReportError> {
    let bytes = if let Some((_mime, data)) = parse_data_uri(source) {
        data
    } else {
        std::fs::read(Path::new(source))
            .map_err(|err| ReportError::Asset(format!("{source}: {err}")))?
    };
    decode_image_bytes(&bytes).map_err(|err| ReportError::Asset(format!("{source}: {err}")))
}

fn decode_image_bytes(data: &[u8]) -> Result<ImageData, image::ImageError> {
    let format = image::guess_format(data).ok();
    let decoded = image::load_from_memory(data)?;
    let (width, height) = decoded.dimensions();

    // CMYK JPEGs are re-encoded as RGB.
    if matches!(format, Some(image::ImageFormat::Jpeg)) && jpeg_component_count(data) != Some(4) {
        let color_space = match decoded.color() {
            image::ColorType::L8 | image::ColorType::La8 => "/DeviceGray",
            _ => "/DeviceRGB",
        };
        return Ok(ImageData {
            width,
            height,
            color_space,
            filter: Some("/DCTDecode"),
            data: data.to_vec(),
            alpha: None,
        });
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    let mut has_alpha = false;
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        if a != 255 {
            has_alpha = true;
        }
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }
    Ok(ImageData {
        width,
        height,
        color_space: "/DeviceRGB",
        filter: None,
        data: rgb,
        alpha: has_alpha.then_some(alpha),
    })
}

fn jpeg_component_count(data: &[u8]) -> Option<u8> {
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let is_sof = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            return data.get(pos + 9).copied();
        }
        if marker == 0xDA {
            return None;
        }
        pos += 2 + length;
    }
    None
}

fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let payload = uri.strip_prefix("data:")?;
    let (header, data_part) = payload.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|m| !m.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains("base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data_part)
            .ok()?
    } else {
        data_part.as_bytes().to_vec()
    };
    Some((mime, data))
}

fn image_stream(image: &ImageData, smask_id: Option<usize>) -> (String, Vec<u8>) {
    let smask = smask_id
        .map(|id| format!(" /SMask {} 0 R", id))
        .unwrap_or_default();
    let (filter, data) = match image.filter {
        Some(filter) => (filter, image.data.clone()),
        None => ("/FlateDecode", deflate(&image.data)),
    };
    let dict = format!(
        "/Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} /BitsPerComponent 8 /Filter {}{}",
        image.width, image.height, image.color_space, filter, smask
    );
    (dict, data)
}

fn image_smask_dict(image: &ImageData) -> String {
    format!(
        "/Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceGray /BitsPerComponent 8 /Filter /FlateDecode",
        image.width, image.height
    )
}

fn deflate(data: &[u8]) -> Vec<u8> {
    miniz_oxide::deflate::compress_to_vec_zlib(data, 6)
}

fn hex_digest(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{:02X}", b)).collect()
}

fn font_object(name: &str) -> String {
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        sanitize_font_name(name)
    )
}

fn resource_dict(entries: &[(String, usize)]) -> String {
    let body = entries
        .iter()
        .map(|(resource, id)| format!("/{} {} 0 R", resource, id))
        .collect::<Vec<_>>()
        .join(" ");
    format!("<< {} >>", body)
}

fn object_refs(ids: impl Iterator<Item = usize>) -> String {
    ids.map(|id| format!("{} 0 R", id))
        .collect::<Vec<_>>()
        .join(" ")
}

fn sanitize_font_name(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else if ch == ' ' {
            out.push('-');
        }
    }
    if out.is_empty() {
        DEFAULT_FONT_NAME.to_string()
    } else {
        out
    }
}

fn info_object(title: Option<&str>) -> String {
    let mut entries = vec![format!("/Producer ({})", escape_pdf_string(PRODUCER))];
    if let Some(title) = title {
        entries.push(format!("/Title ({})", escape_pdf_string(title)));
    }
    format!("<< {} >>", entries.join(" "))
}

fn write_pdf_object<W: Write>(
    writer: &mut W,
    offset: &mut usize,
    offsets: &mut [usize],
    obj_id: usize,
    body: &[u8],
) -> io::Result<()> {
    if let Some(slot) = offsets.get_mut(obj_id) {
        *slot = *offset;
    }
    write_str(writer, &format!("{} 0 obj\n", obj_id), offset)?;
    write_bytes(writer, body, offset)?;
    write_bytes(writer, b"\nendobj\n", offset)?;
    Ok(())
}

fn write_bytes<W: Write>(writer: &mut W, data: &[u8], offset: &mut usize) -> io::Result<()> {
    writer.write_all(data)?;
    *offset += data.len();
    Ok(())
}

fn write_str<W: Write>(writer: &mut W, data: &str, offset: &mut usize) -> io::Result<()> {
    write_bytes(writer, data.as_bytes(), offset)
}

fn escape_pdf_string(input: &str) -> String {
    let mut out = String::new();
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

struct WinAnsiEncoded {
    text: String,
    replaced: usize,
}

fn encode_winansi_pdf_string(input: &str) -> WinAnsiEncoded {
    let mut out = String::new();
    let mut replaced = 0usize;
    for ch in input.chars() {
        let byte = match ch {
            '\u{0000}'..='\u{007F}' => ch as u8,
            '\u{00A0}'..='\u{00FF}' => ch as u8,
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{0192}' => 0x83,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2020}' => 0x86,
            '\u{2021}' => 0x87,
            '\u{02C6}' => 0x88,
            '\u{2030}' => 0x89,
            '\u{0160}' => 0x8A,
            '\u{2039}' => 0x8B,
            '\u{0152}' => 0x8C,
            '\u{017D}' => 0x8E,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{02DC}' => 0x98,
            '\u{2122}' => 0x99,
            '\u{0161}' => 0x9A,
            '\u{203A}' => 0x9B,
            '\u{0153}' => 0x9C,
            '\u{017E}' => 0x9E,
            '\u{0178}' => 0x9F,
            _ => {
                replaced += 1;
                b'?'
            }
        };

        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b if b < 0x20 || b >= 0x7f => out.push_str(&format!("\\{:03o}", b)),
            b => out.push(b as char),
        }
    }
    WinAnsiEncoded {
        text: out,
        replaced,
    }
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value);
    let scaled = (fixed * I32F32::from_num(1000)).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{}{}", sign, int_part)
    } else {
        let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
        while s.ends_with('0') {
            s.pop();
        }
        s
    }
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

fn color_to_pdf_fill(color: Color) -> String {
    format!(
        "{} {} {} rg\n",
        fmt(clamp_unit(color.r)),
        fmt(clamp_unit(color.g)),
        fmt(clamp_unit(color.b))
    )
}

fn color_to_pdf_stroke(color: Color) -> String {
    format!(
        "{} {} {} RG\n",
        fmt(clamp_unit(color.r)),
        fmt(clamp_unit(color.g)),
        fmt(clamp_unit(color.b))
    )
}
