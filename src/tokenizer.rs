//! Default tokenizer adapter: word extraction from PDFs using lopdf
//!
//! The extraction engine only consumes `Word` bounding boxes; this module
//! is the built-in producer. It walks each page's content stream tracking
//! the transformation and text matrices, decodes show-text operators, and
//! splits the decoded runs into whitespace-delimited words with estimated
//! horizontal advances. Any other word source satisfying the `Word`
//! contract (top-origin coordinates, visual order irrelevant) can replace
//! it.

use crate::lines::Word;
use crate::ExtractError;
use lopdf::{Document, Object, ObjectId};
use std::path::Path;

/// Estimated glyph advance as a fraction of the font size.
const CHAR_WIDTH_RATIO: f32 = 0.5;

/// Fallback page height when no MediaBox is reachable (US Letter).
const DEFAULT_PAGE_HEIGHT: f32 = 792.0;

/// All words of one page, in no particular order.
#[derive(Debug)]
pub struct PageWords {
    /// 1-based page number
    pub number: u32,
    pub words: Vec<Word>,
}

/// Check whether a file looks like a PDF: `.pdf` extension and the
/// `%PDF-` magic header.
pub fn is_pdf_file<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    let has_extension = path
        .extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !has_extension {
        return false;
    }
    match std::fs::read(path) {
        Ok(bytes) => bytes.starts_with(b"%PDF-"),
        Err(_) => false,
    }
}

/// Extract per-page words from a PDF file.
pub fn extract_words<P: AsRef<Path>>(path: P) -> Result<Vec<PageWords>, ExtractError> {
    let path = path.as_ref();
    if !is_pdf_file(path) {
        return Err(ExtractError::InvalidSource(path.display().to_string()));
    }
    let doc = Document::load(path)
        .map_err(|e| ExtractError::InvalidSource(format!("{}: {}", path.display(), e)))?;
    extract_words_from_doc(&doc)
}

/// Extract per-page words from an in-memory PDF buffer.
pub fn extract_words_mem(buffer: &[u8]) -> Result<Vec<PageWords>, ExtractError> {
    if !buffer.starts_with(b"%PDF-") {
        return Err(ExtractError::InvalidSource("buffer".to_string()));
    }
    let doc = Document::load_mem(buffer)
        .map_err(|e| ExtractError::InvalidSource(e.to_string()))?;
    extract_words_from_doc(&doc)
}

/// Extract words from every page of a loaded document.
pub fn extract_words_from_doc(doc: &Document) -> Result<Vec<PageWords>, ExtractError> {
    let pages = doc.get_pages();
    let mut result = Vec::with_capacity(pages.len());

    for (page_num, &page_id) in pages.iter() {
        let words = extract_page_words(doc, page_id)?;
        log::debug!("page {}: {} words", page_num, words.len());
        result.push(PageWords {
            number: *page_num,
            words,
        });
    }

    Ok(result)
}

/// Multiply two 2D transformation matrices
/// Matrix format: [a, b, c, d, e, f] representing:
/// | a  b  0 |
/// | c  d  0 |
/// | e  f  1 |
fn multiply_matrices(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

/// Extract the words of a single page.
///
/// Positions are converted from PDF bottom-origin coordinates to the
/// top-origin convention the line reconstructor expects: y0 grows down
/// the page, so ascending y0 is visual reading order.
pub fn extract_page_words(doc: &Document, page_id: ObjectId) -> Result<Vec<Word>, ExtractError> {
    use lopdf::content::Content;

    let mut words = Vec::new();
    let height = page_height(doc, page_id);

    // Fonts for encoding-aware decode
    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();

    let content_data = doc
        .get_page_content(page_id)
        .map_err(|e| ExtractError::Parse(e.to_string()))?;
    let content = Content::decode(&content_data).map_err(|e| ExtractError::Parse(e.to_string()))?;

    // Graphics state tracking
    let mut ctm = [1.0f32, 0.0, 0.0, 1.0, 0.0, 0.0];
    let mut ctm_stack: Vec<[f32; 6]> = Vec::new();

    // Text state tracking
    let mut current_font = String::new();
    let mut current_font_size: f32 = 12.0;
    let mut text_matrix = [1.0f32, 0.0, 0.0, 1.0, 0.0, 0.0];
    let mut line_matrix = [1.0f32, 0.0, 0.0, 1.0, 0.0, 0.0];
    let mut in_text_block = false;

    for op in &content.operations {
        match op.operator.as_str() {
            "q" => {
                ctm_stack.push(ctm);
            }
            "Q" => {
                if let Some(saved) = ctm_stack.pop() {
                    ctm = saved;
                }
            }
            "cm" => {
                if op.operands.len() >= 6 {
                    let new_matrix = [
                        get_number(&op.operands[0]).unwrap_or(1.0),
                        get_number(&op.operands[1]).unwrap_or(0.0),
                        get_number(&op.operands[2]).unwrap_or(0.0),
                        get_number(&op.operands[3]).unwrap_or(1.0),
                        get_number(&op.operands[4]).unwrap_or(0.0),
                        get_number(&op.operands[5]).unwrap_or(0.0),
                    ];
                    ctm = multiply_matrices(&new_matrix, &ctm);
                }
            }
            "BT" => {
                in_text_block = true;
                text_matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
                line_matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
            }
            "ET" => {
                in_text_block = false;
            }
            "Tf" => {
                if op.operands.len() >= 2 {
                    if let Ok(name) = op.operands[0].as_name() {
                        current_font = String::from_utf8_lossy(name).to_string();
                    }
                    if let Ok(size) = op.operands[1].as_f32() {
                        current_font_size = size;
                    } else if let Ok(size) = op.operands[1].as_i64() {
                        current_font_size = size as f32;
                    }
                }
            }
            "Td" | "TD" => {
                if op.operands.len() >= 2 {
                    let tx = get_number(&op.operands[0]).unwrap_or(0.0);
                    let ty = get_number(&op.operands[1]).unwrap_or(0.0);
                    line_matrix[4] += tx;
                    line_matrix[5] += ty;
                    text_matrix = line_matrix;
                }
            }
            "Tm" => {
                if op.operands.len() >= 6 {
                    for (i, operand) in op.operands.iter().take(6).enumerate() {
                        text_matrix[i] =
                            get_number(operand).unwrap_or(if i == 0 || i == 3 { 1.0 } else { 0.0 });
                    }
                    line_matrix = text_matrix;
                }
            }
            "T*" => {
                line_matrix[5] -= current_font_size * 1.2; // Approximate line height
                text_matrix = line_matrix;
            }
            "Tj" => {
                if in_text_block && !op.operands.is_empty() {
                    if let Some(text) =
                        decode_text_operand(&op.operands[0], doc, &fonts, &current_font)
                    {
                        push_item_words(
                            &mut words,
                            &text,
                            &text_matrix,
                            &ctm,
                            current_font_size,
                            height,
                        );
                    }
                }
            }
            "TJ" => {
                if in_text_block && !op.operands.is_empty() {
                    if let Ok(array) = op.operands[0].as_array() {
                        let mut combined_text = String::new();
                        for item in array {
                            if let Some(text) =
                                decode_text_operand(item, doc, &fonts, &current_font)
                            {
                                combined_text.push_str(&text);
                            }
                        }
                        push_item_words(
                            &mut words,
                            &combined_text,
                            &text_matrix,
                            &ctm,
                            current_font_size,
                            height,
                        );
                    }
                }
            }
            "'" => {
                line_matrix[5] -= current_font_size * 1.2;
                text_matrix = line_matrix;
                if !op.operands.is_empty() {
                    if let Some(text) =
                        decode_text_operand(&op.operands[0], doc, &fonts, &current_font)
                    {
                        push_item_words(
                            &mut words,
                            &text,
                            &text_matrix,
                            &ctm,
                            current_font_size,
                            height,
                        );
                    }
                }
            }
            _ => {}
        }
    }

    Ok(words)
}

/// Split one decoded show-text run into whitespace-delimited words.
///
/// Glyph advances are not computed from font metrics; each character is
/// estimated at half the rendered font size, which is accurate enough for
/// the relative ordering the line reconstructor needs.
fn push_item_words(
    words: &mut Vec<Word>,
    text: &str,
    text_matrix: &[f32; 6],
    ctm: &[f32; 6],
    font_size: f32,
    page_height: f32,
) {
    if text.trim().is_empty() {
        return;
    }

    let rendered_size = effective_font_size(font_size, text_matrix);
    let combined = multiply_matrices(text_matrix, ctm);
    let (item_x, item_y) = (combined[4], combined[5]);
    let char_width = rendered_size * CHAR_WIDTH_RATIO;

    // Flip to top-origin: the baseline sits at item_y from the page bottom.
    let y1 = page_height - item_y;
    let y0 = y1 - rendered_size;

    let mut token = String::new();
    let mut token_start = 0usize;
    let mut index = 0usize;
    for c in text.chars() {
        if c.is_whitespace() {
            if !token.is_empty() {
                push_token(words, &token, token_start, item_x, char_width, y0, y1);
                token.clear();
            }
        } else {
            if token.is_empty() {
                token_start = index;
            }
            token.push(c);
        }
        index += 1;
    }
    if !token.is_empty() {
        push_token(words, &token, token_start, item_x, char_width, y0, y1);
    }
}

#[allow(clippy::too_many_arguments)]
fn push_token(
    words: &mut Vec<Word>,
    token: &str,
    token_start: usize,
    item_x: f32,
    char_width: f32,
    y0: f32,
    y1: f32,
) {
    let x0 = item_x + token_start as f32 * char_width;
    let x1 = x0 + token.chars().count() as f32 * char_width;
    words.push(Word {
        text: token.to_string(),
        x0,
        y0,
        x1,
        y1,
    });
}

/// Helper to get f32 from Object
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Compute effective font size from base size and text matrix
fn effective_font_size(base_size: f32, text_matrix: &[f32; 6]) -> f32 {
    let scale_x = (text_matrix[0].powi(2) + text_matrix[1].powi(2)).sqrt();
    let scale_y = (text_matrix[2].powi(2) + text_matrix[3].powi(2)).sqrt();
    let scale = scale_x.max(scale_y);
    base_size * scale
}

/// Extract text from a text operand, handling encoding
fn decode_text_operand(
    obj: &Object,
    doc: &Document,
    fonts: &std::collections::BTreeMap<Vec<u8>, &lopdf::Dictionary>,
    current_font: &str,
) -> Option<String> {
    if let Object::String(bytes, _) = obj {
        // Try to decode using font encoding
        if let Some(font_dict) = fonts.get(current_font.as_bytes()) {
            if let Ok(encoding) = font_dict.get_font_encoding(doc) {
                if let Ok(text) = Document::decode_text(&encoding, bytes) {
                    return Some(text);
                }
            }
        }

        // Fallback: try UTF-16BE then Latin-1
        if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
            let utf16: Vec<u16> = bytes[2..]
                .chunks_exact(2)
                .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
                .collect();
            return Some(String::from_utf16_lossy(&utf16));
        }

        // Latin-1 fallback
        Some(bytes.iter().map(|&b| b as char).collect())
    } else {
        None
    }
}

/// Look up a page dictionary entry, walking the Parent chain for entries
/// that pages inherit (MediaBox, Resources).
pub(crate) fn inherited_page_entry(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut id = page_id;
    for _ in 0..8 {
        let dict = doc.get_dictionary(id).ok()?;
        if let Ok(obj) = dict.get(key) {
            return Some(obj.clone());
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => id = *parent,
            _ => break,
        }
    }
    None
}

/// Page height from the page's (possibly inherited) MediaBox.
pub(crate) fn page_height(doc: &Document, page_id: ObjectId) -> f32 {
    let media_box = inherited_page_entry(doc, page_id, b"MediaBox");
    let array = match media_box {
        Some(Object::Array(a)) => Some(a),
        Some(Object::Reference(r)) => doc
            .get_object(r)
            .ok()
            .and_then(|o| o.as_array().ok().cloned()),
        _ => None,
    };
    if let Some(a) = array {
        if a.len() == 4 {
            let y0 = get_number(&a[1]).unwrap_or(0.0);
            let y1 = get_number(&a[3]).unwrap_or(0.0);
            if y1 > y0 {
                return y1 - y0;
            }
        }
    }
    DEFAULT_PAGE_HEIGHT
}
