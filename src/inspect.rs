use lopdf::Document as LoDocument;
use lopdf::Object as LoObject;
use lopdf::content::Content;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfInspectErrorCode {
    PdfParseFailed,
    PdfContentUnreadable,
    PdfIoError,
}

impl PdfInspectErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfInspectErrorCode::PdfParseFailed => "PDF_PARSE_FAILED",
            PdfInspectErrorCode::PdfContentUnreadable => "PDF_CONTENT_UNREADABLE",
            PdfInspectErrorCode::PdfIoError => "PDF_IO_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfInspectError {
    pub code: PdfInspectErrorCode,
    pub message: String,
}

impl std::fmt::Display for PdfInspectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for PdfInspectError {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInspection {
    /// Operands of every `Tj` in content-stream order.
    pub texts: Vec<String>,
    pub image_draws: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfInspectReport {
    pub pdf_version: String,
    pub page_count: usize,
    pub file_size_bytes: usize,
    pub pages: Vec<PageInspection>,
}

impl PdfInspectReport {
    pub fn total_image_draws(&self) -> usize {
        self.pages.iter().map(|page| page.image_draws).sum()
    }

    pub fn page_contains(&self, page_number: usize, needle: &str) -> bool {
        page_number
            .checked_sub(1)
            .and_then(|idx| self.pages.get(idx))
            .map(|page| page.texts.iter().any(|text| text.contains(needle)))
            .unwrap_or(false)
    }
}

fn content_error(err: lopdf::Error) -> PdfInspectError {
    PdfInspectError {
        code: PdfInspectErrorCode::PdfContentUnreadable,
        message: err.to_string(),
    }
}

// Single-byte strings are WinAnsi; everything below 0x80 is ASCII.
fn decode_shown_text(bytes: &[u8]) -> String {
    bytes.iter().map(|b| *b as char).collect()
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<PdfInspectReport, PdfInspectError> {
    let pdf = LoDocument::load_mem(bytes).map_err(|err| PdfInspectError {
        code: PdfInspectErrorCode::PdfParseFailed,
        message: err.to_string(),
    })?;

    let mut pages = Vec::new();
    for (_number, page_id) in pdf.get_pages() {
        let raw = pdf.get_page_content(page_id).map_err(content_error)?;
        let content = Content::decode(&raw).map_err(content_error)?;
        let mut page = PageInspection::default();
        for op in &content.operations {
            match op.operator.as_str() {
                "Tj" => {
                    if let Some(LoObject::String(shown, _)) = op.operands.first() {
                        page.texts.push(decode_shown_text(shown));
                    }
                }
                "Do" => page.image_draws += 1,
                _ => {}
            }
        }
        pages.push(page);
    }

    Ok(PdfInspectReport {
        pdf_version: pdf.version.clone(),
        page_count: pages.len(),
        file_size_bytes: bytes.len(),
        pages,
    })
}

pub fn inspect_pdf_path(path: &Path) -> Result<PdfInspectReport, PdfInspectError> {
    let data = std::fs::read(path).map_err(|err| PdfInspectError {
        code: PdfInspectErrorCode::PdfIoError,
        message: err.to_string(),
    })?;
    inspect_pdf_bytes(&data)
}
