//! Layout-based field extraction from semi-structured clinical PDF reports
//!
//! This crate provides:
//! - Reconstruction of reading-order text lines from raw word bounding boxes
//! - A stateful section/field/subsection parser driven by a `ReportLayout`
//! - Aggregation of per-page records across multiple documents
//!
//! The visual layout of the reports (section headers, labeled fields,
//! compound multi-label lines, coordinate-aligned subsections) is the only
//! schema available; heuristic mismatches degrade to pending lines instead
//! of errors.

pub mod aggregator;
pub mod artifacts;
pub mod layout;
pub mod lines;
pub mod normalize;
pub mod parser;
pub mod scanner;
pub mod tokenizer;

pub use aggregator::{Dataset, Record, ReportAggregator, SkippedDocument};
pub use layout::{ReportLayout, SectionDecl, WorkingLabelSet};
pub use lines::{reconstruct_lines, Line, Word};
pub use normalize::normalize;
pub use parser::{LineClass, PageOutcome, SectionFieldParser};
pub use tokenizer::{extract_words, extract_words_mem, is_pdf_file};

use std::collections::BTreeMap;
use std::path::Path;

/// Options shared across a run of the extraction engine.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Vertical tolerance for grouping words into one line (layout units)
    pub y_tolerance: f32,
    /// Restrict processing to these 1-based page numbers (None = all pages)
    pub selected_pages: Option<Vec<u32>>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            y_tolerance: 3.0,
            selected_pages: None,
        }
    }
}

/// Extraction result for a single document.
#[derive(Debug)]
pub struct DocumentExtraction {
    /// Source file name (used for record tagging)
    pub file: String,
    /// One entry per processed page, in page order
    pub pages: Vec<PageExtraction>,
    /// 1-based numbers of pages that yielded no extractable words
    pub empty_pages: Vec<u32>,
}

/// Extraction result for a single page.
#[derive(Debug)]
pub struct PageExtraction {
    /// 1-based page number
    pub page: u32,
    /// Normalized key -> value record for the page
    pub record: BTreeMap<String, String>,
    /// Raw text of lines no rule could classify
    pub pending: Vec<String>,
    /// Reconstructed line text, in reading order (for the audit dump)
    pub lines: Vec<String>,
}

/// Run the full pipeline (tokenize, reconstruct lines, parse) over one PDF
/// file.
///
/// Pages that yield no words are reported in `empty_pages` rather than
/// aborting the document; a document where every page is empty still
/// returns, with no page entries.
pub fn extract_document<P: AsRef<Path>>(
    path: P,
    layout: &ReportLayout,
    options: &ExtractOptions,
) -> Result<DocumentExtraction, ExtractError> {
    let path = path.as_ref();
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let pages = extract_words(path)?;
    extract_from_pages(file, pages, layout, options)
}

/// Run the full pipeline over an in-memory PDF buffer.
pub fn extract_document_mem(
    name: &str,
    buffer: &[u8],
    layout: &ReportLayout,
    options: &ExtractOptions,
) -> Result<DocumentExtraction, ExtractError> {
    if !buffer.starts_with(b"%PDF-") {
        return Err(ExtractError::InvalidSource(name.to_string()));
    }
    let pages = extract_words_mem(buffer)?;
    extract_from_pages(name.to_string(), pages, layout, options)
}

fn extract_from_pages(
    file: String,
    pages: Vec<tokenizer::PageWords>,
    layout: &ReportLayout,
    options: &ExtractOptions,
) -> Result<DocumentExtraction, ExtractError> {
    let parser = SectionFieldParser::new(layout);
    let config = lines::LineConfig {
        y_tolerance: options.y_tolerance,
    };

    let mut out = DocumentExtraction {
        file,
        pages: Vec::new(),
        empty_pages: Vec::new(),
    };

    for page in pages {
        if let Some(selected) = &options.selected_pages {
            if !selected.contains(&page.number) {
                continue;
            }
        }

        let lines = match reconstruct_lines(&page.words, &config) {
            Ok(lines) => lines,
            Err(ExtractError::EmptyDocument) => {
                log::warn!("page {} yielded no words, skipping", page.number);
                out.empty_pages.push(page.number);
                continue;
            }
            Err(e) => return Err(e),
        };

        // Fresh working label set per page: label removal must never leak
        // across pages, or a label repeating on a later page is dropped.
        let mut labels = WorkingLabelSet::new(layout);
        let outcome = parser.parse_page(&lines, &mut labels);

        out.pages.push(PageExtraction {
            page: page.number,
            record: outcome.record,
            pending: outcome.pending,
            lines: lines.into_iter().map(|l| l.text).collect(),
        });
    }

    Ok(out)
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("no extractable words on the page")]
    EmptyDocument,
    #[error("not a valid PDF: {0}")]
    InvalidSource(String),
    #[error("invalid report layout: {0}")]
    Configuration(String),
    #[error("failed to persist diagnostic artifact: {0}")]
    Persistence(#[source] std::io::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing error: {0}")]
    Parse(String),
}

impl From<lopdf::Error> for ExtractError {
    fn from(e: lopdf::Error) -> Self {
        ExtractError::Parse(e.to_string())
    }
}
