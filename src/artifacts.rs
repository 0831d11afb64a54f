//! Diagnostic artifacts
//!
//! None of these writers participate in the parsing contract; they exist
//! for operability. The line dump and pending map are how operators detect
//! layout drift in the upstream report template, and the layout sample is
//! how a new `ReportLayout` (notably `subsection_x_ref`) is authored: word
//! coordinates as JSON plus a visually annotated copy of the first page.
//!
//! Writers never touch parser state; in-memory results are complete before
//! persistence is attempted, and a failed write surfaces as `Persistence`
//! without corrupting them.

use crate::aggregator::Record;
use crate::tokenizer;
use crate::{DocumentExtraction, ExtractError};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Font size of annotation labels on the sample page.
const ANNOTATION_SIZE: f32 = 6.0;
/// Resource name under which the annotation font is registered.
const ANNOTATION_FONT: &str = "FAnnot";

/// Persist every reconstructed line of a document, page by page, for audit.
pub fn write_lines_dump<P: AsRef<Path>>(
    path: P,
    doc: &DocumentExtraction,
) -> Result<(), ExtractError> {
    if doc.pages.iter().all(|p| p.lines.is_empty()) {
        return Err(ExtractError::EmptyDocument);
    }

    let mut out = String::new();
    out.push_str(&doc.file);
    out.push('\n');
    for page in &doc.pages {
        out.push_str(&format!("\n-- page {} --\n", page.page));
        for line in &page.lines {
            out.push_str(line);
            out.push('\n');
        }
    }

    log::info!("writing line dump to {}", path.as_ref().display());
    std::fs::write(path, out).map_err(ExtractError::Persistence)
}

/// Persist the page -> pending lines map of a run as JSON.
pub fn write_pending_json<P: AsRef<Path>>(
    path: P,
    pending: &BTreeMap<String, BTreeMap<u32, Vec<String>>>,
) -> Result<(), ExtractError> {
    let json = serde_json::to_string_pretty(pending)
        .map_err(|e| ExtractError::Persistence(e.into()))?;
    log::info!("writing pending lines to {}", path.as_ref().display());
    std::fs::write(path, json).map_err(ExtractError::Persistence)
}

/// Persist extracted records as JSON.
pub fn write_records_json<P: AsRef<Path>>(path: P, records: &[Record]) -> Result<(), ExtractError> {
    let json =
        serde_json::to_string_pretty(records).map_err(|e| ExtractError::Persistence(e.into()))?;
    log::info!("writing records to {}", path.as_ref().display());
    std::fs::write(path, json).map_err(ExtractError::Persistence)
}

/// Paths produced by `generate_layout_sample`.
#[derive(Debug)]
pub struct LayoutSample {
    pub coordinates_json: PathBuf,
    pub annotated_pdf: PathBuf,
}

/// Produce the developer-facing layout sample for a PDF's first page:
/// a JSON dump of every word's coordinates, and a copy of the document
/// with each word's x0 printed below it (blue) and each new row's y0
/// printed in the left margin (red). Used to author new `ReportLayout`
/// values against a concrete report.
pub fn generate_layout_sample(
    pdf_path: &Path,
    output_dir: Option<&Path>,
) -> Result<LayoutSample, ExtractError> {
    if !tokenizer::is_pdf_file(pdf_path) {
        return Err(ExtractError::InvalidSource(pdf_path.display().to_string()));
    }

    let stem = pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sample".to_string());
    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => pdf_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("output"),
    };
    std::fs::create_dir_all(&dir).map_err(ExtractError::Persistence)?;

    let mut doc = Document::load(pdf_path)
        .map_err(|e| ExtractError::InvalidSource(format!("{}: {}", pdf_path.display(), e)))?;
    let pages = doc.get_pages();
    let (_, &page_id) = pages
        .iter()
        .next()
        .ok_or_else(|| ExtractError::Parse("document has no pages".to_string()))?;

    let words = tokenizer::extract_page_words(&doc, page_id)?;
    if words.is_empty() {
        return Err(ExtractError::EmptyDocument);
    }

    let coordinates_json = dir.join(format!("{stem}_coordinates.json"));
    let json = serde_json::to_string_pretty(&words)
        .map_err(|e| ExtractError::Persistence(e.into()))?;
    let mut f = std::fs::File::create(&coordinates_json).map_err(ExtractError::Persistence)?;
    f.write_all(json.as_bytes()).map_err(ExtractError::Persistence)?;

    annotate_first_page(&mut doc, page_id, &words)?;

    let annotated_pdf = dir.join(format!("{stem}_annotated.pdf"));
    doc.save(&annotated_pdf).map_err(|e| {
        ExtractError::Persistence(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    })?;

    log::info!(
        "layout sample written: {} and {}",
        annotated_pdf.display(),
        coordinates_json.display()
    );
    Ok(LayoutSample {
        coordinates_json,
        annotated_pdf,
    })
}

/// Overlay coordinate labels on the first page.
fn annotate_first_page(
    doc: &mut Document,
    page_id: ObjectId,
    words: &[crate::Word],
) -> Result<(), ExtractError> {
    let height = tokenizer::page_height(doc, page_id);
    let min_x0 = words.iter().map(|w| w.x0).fold(f32::INFINITY, f32::min);

    let mut ops = vec![Operation::new("q", vec![])];
    let mut previous_y0 = f32::NAN;
    for word in words {
        // x0 under the word, in blue
        ops.extend(label_ops(
            &format!("{:.2}", word.x0),
            word.x0,
            height - word.y1 - ANNOTATION_SIZE - 2.0,
            [0.0, 0.0, 1.0],
        ));
        // y0 in the left margin once per row, in red
        if word.y0 != previous_y0 {
            ops.extend(label_ops(
                &format!("{:.2}", word.y0),
                min_x0 - 20.0,
                height - word.y1,
                [1.0, 0.0, 0.0],
            ));
        }
        previous_y0 = word.y0;
    }
    ops.push(Operation::new("Q", vec![]));

    let content = Content { operations: ops };
    let encoded = content
        .encode()
        .map_err(|e| ExtractError::Parse(e.to_string()))?;
    let stream_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    // Rebuild the page's Resources inline with the annotation font added.
    // Inherited and referenced dictionaries are copied, not mutated, so
    // resources shared with other pages are left untouched.
    let inherited = tokenizer::inherited_page_entry(doc, page_id, b"Resources");
    let mut resources = resolve_dict(doc, inherited.as_ref());
    let mut font_dict = resolve_dict(doc, resources.get(b"Font").ok());
    font_dict.set(ANNOTATION_FONT, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(font_dict));

    // get_page_contents resolves both single-stream and array forms.
    let mut content_ids = doc.get_page_contents(page_id);
    content_ids.push(stream_id);
    let contents: Vec<Object> = content_ids.into_iter().map(Object::Reference).collect();

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| ExtractError::Parse(e.to_string()))?;
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Array(contents));

    Ok(())
}

/// Operations printing one small text label at a position.
fn label_ops(text: &str, x: f32, y: f32, rgb: [f32; 3]) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![ANNOTATION_FONT.into(), ANNOTATION_SIZE.into()],
        ),
        Operation::new(
            "rg",
            vec![rgb[0].into(), rgb[1].into(), rgb[2].into()],
        ),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

/// Clone a dictionary-valued entry, following one level of indirection.
fn resolve_dict(doc: &Document, obj: Option<&Object>) -> Dictionary {
    match obj {
        Some(Object::Dictionary(dict)) => dict.clone(),
        Some(Object::Reference(id)) => doc.get_dictionary(*id).cloned().unwrap_or_default(),
        _ => Dictionary::new(),
    }
}
