#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetrics {
    pub page_number: usize,
    pub command_count: usize,
    pub trailer_command_count: usize,
    pub content_bytes: usize,
}

/// Summary of one document-generation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunMetrics {
    pub pages: Vec<PageMetrics>,
    pub stamped_pages: usize,
    pub total_bytes: usize,
    pub layout_ms: f64,
    pub commit_ms: f64,
}

impl RunMetrics {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}
