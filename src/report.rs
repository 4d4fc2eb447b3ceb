use crate::error::ReportError;
use crate::flowable::{
    Flowable, HRule, Paragraph, Spacer, TableCell, TableFlowable, TableRow, TextAlign, TextStyle,
};
use crate::trailer::{Corner, CornerImage};
use crate::types::{Color, Margins, Pt, Size};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Output page size used when none is configured.
pub const DEFAULT_PAGE_SIZE: Size = Size::LETTER;

const DEFAULT_MARGIN: f32 = 72.0;
const BODY_FONT: &str = "Helvetica";
const HEADER_FONT: &str = "Helvetica-Bold";
const HEADER_FONT_SIZE: f32 = 8.0;
const CELL_FONT_SIZE: f32 = 7.0;

// Title-block rule extent, relative to the frame's left edge.
const TITLE_RULE_START: f32 = -15.0;
const TITLE_RULE_END: f32 = 483.0;

fn app_name_color() -> Color {
    Color::rgb8(45, 166, 153)
}

fn table_title_color() -> Color {
    Color::rgb8(54, 122, 179)
}

fn accent_color() -> Color {
    Color::rgb8(122, 180, 225)
}

fn rule_color() -> Color {
    Color::rgb8(50, 140, 140)
}

/// Immutable per-run settings. Only [`ReportConfigBuilder::build`] creates
/// one, so every value here has already been validated.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    page_size: Size,
    margins: Margins,
    app_name: String,
    table_title: String,
    header_titles: Vec<String>,
    data_field_names: Vec<String>,
    column_alignments: Vec<TextAlign>,
    totals_row: TotalRow,
    column_widths: Option<Vec<f32>>,
    left_image: Option<CornerImage>,
    right_image: Option<CornerImage>,
    repeat_header: bool,
    totals_alignment: TextAlign,
    debug_log: Option<PathBuf>,
}

impl ReportConfig {
    pub fn builder() -> ReportConfigBuilder {
        ReportConfigBuilder::default()
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn margins(&self) -> Margins {
        self.margins
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn table_title(&self) -> &str {
        &self.table_title
    }

    pub fn column_count(&self) -> usize {
        self.header_titles.len()
    }

    pub fn header_titles(&self) -> &[String] {
        &self.header_titles
    }

    pub fn data_field_names(&self) -> &[String] {
        &self.data_field_names
    }

    pub fn column_alignments(&self) -> &[TextAlign] {
        &self.column_alignments
    }

    pub fn totals_row(&self) -> &TotalRow {
        &self.totals_row
    }

    pub fn column_widths(&self) -> Option<&[f32]> {
        self.column_widths.as_deref()
    }

    pub fn left_image(&self) -> Option<&CornerImage> {
        self.left_image.as_ref()
    }

    pub fn right_image(&self) -> Option<&CornerImage> {
        self.right_image.as_ref()
    }

    pub fn repeat_header(&self) -> bool {
        self.repeat_header
    }

    pub fn totals_alignment(&self) -> TextAlign {
        self.totals_alignment
    }

    pub fn debug_log(&self) -> Option<&PathBuf> {
        self.debug_log.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct ReportConfigBuilder {
    page_size: Size,
    margins: Margins,
    app_name: String,
    table_title: String,
    header_titles: Vec<String>,
    data_field_names: Vec<String>,
    column_alignments: Vec<TextAlign>,
    totals_row: Vec<String>,
    column_widths: Option<Vec<f32>>,
    left_image: Option<String>,
    right_image: Option<String>,
    repeat_header: bool,
    totals_alignment: TextAlign,
    debug_log: Option<PathBuf>,
}

fn strings<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

impl Default for ReportConfigBuilder {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            margins: Margins::all(DEFAULT_MARGIN),
            app_name: "App name".to_string(),
            table_title: "Report".to_string(),
            header_titles: strings(["No.", "Col.1", "Col.2", "Col.3", "Col.4"]),
            data_field_names: strings(["id", "name", "email", "phone", "address"]),
            column_alignments: vec![
                TextAlign::Center,
                TextAlign::Left,
                TextAlign::Center,
                TextAlign::Center,
                TextAlign::Center,
            ],
            totals_row: strings(["Total", "", "", "", "Your total results"]),
            column_widths: Some(vec![50.0, 200.0, 80.0, 80.0, 80.0]),
            left_image: None,
            right_image: None,
            repeat_header: false,
            totals_alignment: TextAlign::Left,
            debug_log: None,
        }
    }
}

impl ReportConfigBuilder {
    pub fn page_size(mut self, page_size: Size) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    pub fn table_title(mut self, table_title: impl Into<String>) -> Self {
        self.table_title = table_title.into();
        self
    }

    pub fn header_titles<I, S>(mut self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header_titles = strings(titles);
        self
    }

    pub fn data_field_names<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_field_names = strings(fields);
        self
    }

    pub fn column_alignments(mut self, alignments: Vec<TextAlign>) -> Self {
        self.column_alignments = alignments;
        self
    }

    pub fn totals_row<I, S>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.totals_row = strings(cells);
        self
    }

    /// `None` shares the frame width evenly between columns.
    pub fn column_widths(mut self, widths: Option<Vec<f32>>) -> Self {
        self.column_widths = widths;
        self
    }

    pub fn left_image(mut self, source: impl Into<String>) -> Self {
        self.left_image = Some(source.into());
        self
    }

    pub fn right_image(mut self, source: impl Into<String>) -> Self {
        self.right_image = Some(source.into());
        self
    }

    pub fn repeat_header(mut self, repeat: bool) -> Self {
        self.repeat_header = repeat;
        self
    }

    pub fn totals_alignment(mut self, align: TextAlign) -> Self {
        self.totals_alignment = align;
        self
    }

    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_log = Some(path.into());
        self
    }

    pub fn build(self) -> Result<ReportConfig, ReportError> {
        if !self.page_size.is_positive() {
            return Err(ReportError::config(
                "page_size",
                "page width and height must be positive",
            ));
        }
        let content = self.margins.content_rect(self.page_size);
        if content.width <= Pt::ZERO || content.height <= Pt::ZERO {
            return Err(ReportError::config(
                "margins",
                "margins leave no room for content",
            ));
        }

        let columns = self.header_titles.len();
        if columns == 0 {
            return Err(ReportError::config(
                "header_titles",
                "at least one column is required",
            ));
        }
        for (field, len) in [
            ("data_field_names", self.data_field_names.len()),
            ("column_alignments", self.column_alignments.len()),
            ("totals_row", self.totals_row.len()),
        ] {
            if len != columns {
                return Err(ReportError::config(
                    field,
                    format!("{} entries, expected {} (one per header title)", len, columns),
                ));
            }
        }
        if let Some(widths) = &self.column_widths {
            if widths.len() != columns {
                return Err(ReportError::config(
                    "column_widths",
                    format!(
                        "{} entries, expected {} (one per header title)",
                        widths.len(),
                        columns
                    ),
                ));
            }
            if widths.iter().any(|w| !w.is_finite() || *w <= 0.0) {
                return Err(ReportError::config(
                    "column_widths",
                    "every width must be a positive number of points",
                ));
            }
        }

        let left_image = self
            .left_image
            .map(|source| CornerImage::load(source, Corner::Left))
            .transpose()?;
        let right_image = self
            .right_image
            .map(|source| CornerImage::load(source, Corner::Right))
            .transpose()?;

        Ok(ReportConfig {
            page_size: self.page_size,
            margins: self.margins,
            app_name: self.app_name,
            table_title: self.table_title,
            header_titles: self.header_titles,
            data_field_names: self.data_field_names,
            column_alignments: self.column_alignments,
            totals_row: TotalRow::new(self.totals_row),
            column_widths: self.column_widths,
            left_image,
            right_image,
            repeat_header: self.repeat_header,
            totals_alignment: self.totals_alignment,
            debug_log: self.debug_log,
        })
    }
}

/// One data row: display values keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportRow {
    values: BTreeMap<String, String>,
}

impl ReportRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }
}

impl<K, V> FromIterator<(K, V)> for ReportRow
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The closing row. Its first cell spans every column but the last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalRow {
    cells: Vec<String>,
}

impl TotalRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }
}

/// Sample rows whose every configured field reads `0`.
pub fn sample_rows(config: &ReportConfig, count: usize) -> Vec<ReportRow> {
    (0..count)
        .map(|_| {
            config
                .data_field_names()
                .iter()
                .map(|field| (field.clone(), "0"))
                .collect()
        })
        .collect()
}

fn column_widths(config: &ReportConfig) -> Vec<Pt> {
    match config.column_widths() {
        Some(widths) => widths.iter().map(|w| Pt::from_f32(*w)).collect(),
        None => {
            let frame = config.margins().content_rect(config.page_size());
            let columns = config.column_count() as i32;
            vec![frame.width / columns; config.column_count()]
        }
    }
}

fn table_rows(config: &ReportConfig, rows: &[ReportRow]) -> Result<Vec<TableRow>, ReportError> {
    let header_style = TextStyle::new(HEADER_FONT, HEADER_FONT_SIZE);
    let cell_style = TextStyle::new(BODY_FONT, CELL_FONT_SIZE);

    let mut table = Vec::with_capacity(rows.len() + 2);
    table.push(
        TableRow::new(
            config
                .header_titles()
                .iter()
                .map(|title| TableCell::new(title.clone(), header_style.clone(), TextAlign::Center))
                .collect(),
        )
        .with_background(rule_color()),
    );

    for (idx, row) in rows.iter().enumerate() {
        let mut cells = Vec::with_capacity(config.column_count());
        for (field, align) in config
            .data_field_names()
            .iter()
            .zip(config.column_alignments())
        {
            let value = row.get(field).ok_or_else(|| ReportError::MissingField {
                row: idx + 1,
                field: field.clone(),
            })?;
            cells.push(TableCell::new(value, cell_style.clone(), *align));
        }
        table.push(TableRow::new(cells));
    }

    let totals = config
        .totals_row()
        .cells()
        .iter()
        .map(|text| TableCell::new(text.clone(), cell_style.clone(), config.totals_alignment()))
        .collect();
    table.push(
        TableRow::new(totals)
            .with_background(accent_color())
            .with_leading_span(config.column_count().saturating_sub(1)),
    );
    Ok(table)
}

/// The ordered content blocks of a report: the title block (app name and a
/// double rule), the table title, then the table with header, body and
/// totals rows. Every row is checked against the configured fields before
/// anything is laid out.
pub fn build_story(
    config: &ReportConfig,
    rows: &[ReportRow],
) -> Result<Vec<Box<dyn Flowable>>, ReportError> {
    let table_rows = table_rows(config, rows)?;
    let mut table = TableFlowable::new(column_widths(config), table_rows)
        .with_rule_above(1.0, accent_color());
    if config.repeat_header() {
        table = table.with_repeat_rows(1);
    }

    let story: Vec<Box<dyn Flowable>> = vec![
        Box::new(
            Paragraph::new(config.app_name())
                .with_style(TextStyle::new(BODY_FONT, 16.0).with_color(app_name_color())),
        ),
        Box::new(Spacer::new(10.0)),
        Box::new(HRule::new(TITLE_RULE_START, TITLE_RULE_END, 2.0, rule_color())),
        Box::new(Spacer::new(1.0)),
        Box::new(HRule::new(TITLE_RULE_START, TITLE_RULE_END, 0.5, rule_color())),
        Box::new(Spacer::new(22.0)),
        Box::new(
            Paragraph::new(config.table_title())
                .with_style(TextStyle::new(BODY_FONT, 12.0).with_color(table_title_color())),
        ),
        Box::new(Spacer::new(22.0)),
        Box::new(table),
    ];
    Ok(story)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: ReportError) -> &'static str {
        match err {
            ReportError::InvalidConfiguration { field, .. } => field,
            other => panic!("expected configuration error, got {other}"),
        }
    }

    #[test]
    fn defaults_build_five_columns() {
        let config = ReportConfig::builder().build().expect("defaults");
        assert_eq!(config.column_count(), 5);
        assert_eq!(config.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(config.totals_row().cells()[0], "Total");
        assert!(config.left_image().is_none());
        assert!(!config.repeat_header());
    }

    #[test]
    fn mismatched_alignments_are_rejected() {
        let err = ReportConfig::builder()
            .column_alignments(vec![TextAlign::Left; 4])
            .build()
            .expect_err("4 alignments for 5 titles");
        assert_eq!(field_of(err), "column_alignments");
    }

    #[test]
    fn mismatched_totals_and_fields_are_rejected() {
        let err = ReportConfig::builder()
            .totals_row(["Total", "x"])
            .build()
            .expect_err("short totals");
        assert_eq!(field_of(err), "totals_row");

        let err = ReportConfig::builder()
            .data_field_names(["id"])
            .build()
            .expect_err("short fields");
        assert_eq!(field_of(err), "data_field_names");
    }

    #[test]
    fn column_widths_are_checked_only_when_present() {
        let narrow = ReportConfig::builder()
            .header_titles(["A", "B"])
            .data_field_names(["a", "b"])
            .column_alignments(vec![TextAlign::Left, TextAlign::Right])
            .totals_row(["Total", "sum"]);
        let err = narrow.clone().build().expect_err("default widths have 5 entries");
        assert_eq!(field_of(err), "column_widths");
        assert!(narrow.clone().column_widths(None).build().is_ok());
        let err = narrow
            .column_widths(Some(vec![100.0, -1.0]))
            .build()
            .expect_err("negative width");
        assert_eq!(field_of(err), "column_widths");
    }

    #[test]
    fn margins_must_leave_content_area() {
        let err = ReportConfig::builder()
            .margins(Margins::all(400.0))
            .build()
            .expect_err("no content area");
        assert_eq!(field_of(err), "margins");
    }

    #[test]
    fn unreadable_corner_image_is_an_asset_error() {
        let err = ReportConfig::builder()
            .left_image("/nonexistent/reportpress/logo.png")
            .build()
            .expect_err("missing image");
        assert!(matches!(err, ReportError::Asset(_)));
    }

    #[test]
    fn row_missing_a_field_is_rejected() {
        let config = ReportConfig::builder().build().expect("defaults");
        let mut rows = sample_rows(&config, 3);
        rows[1] = ReportRow::new().with("id", "7").with("name", "n");
        let err = build_story(&config, &rows).err().expect("missing email");
        match err {
            ReportError::MissingField { row, field } => {
                assert_eq!(row, 2);
                assert_eq!(field, "email");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn table_has_header_body_and_spanning_totals() {
        let config = ReportConfig::builder().build().expect("defaults");
        let rows = table_rows(&config, &sample_rows(&config, 4)).expect("rows");
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].cells()[0].text, "No.");
        assert_eq!(rows[0].cells()[0].style.font_name, HEADER_FONT);
        assert_eq!(rows[1].cells()[1].align, TextAlign::Left);
        assert_eq!(rows[1].cells()[2].align, TextAlign::Center);
        assert_eq!(rows[5].cells()[4].text, "Your total results");
    }

    #[test]
    fn story_orders_title_block_before_table() {
        let config = ReportConfig::builder()
            .app_name("Inventory")
            .build()
            .expect("config");
        let story = build_story(&config, &[]).expect("story");
        assert_eq!(story.len(), 9);
        assert!(story[0].debug_name().ends_with("Paragraph"));
        assert!(story[2].debug_name().ends_with("HRule"));
        assert!(story[8].debug_name().ends_with("TableFlowable"));
    }

    #[test]
    fn report_row_collects_from_pairs() {
        let row: ReportRow = [("id", "1"), ("name", "Ada")].into_iter().collect();
        assert_eq!(row.get("name"), Some("Ada"));
        assert_eq!(row.get("email"), None);
    }
}
