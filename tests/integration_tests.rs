//! Integration tests for the report extraction library

use report_extractor::lines::LineConfig;
use report_extractor::parser::LineClass;
use report_extractor::{
    extract_words, normalize, reconstruct_lines, ExtractOptions, Line, ReportAggregator,
    ReportLayout, SectionDecl, SectionFieldParser, Word, WorkingLabelSet,
};
use std::path::Path;

// Helper to create test Words
fn make_word(text: &str, x0: f32, y0: f32) -> Word {
    Word {
        text: text.to_string(),
        x0,
        y0,
        x1: x0 + text.len() as f32 * 6.0,
        y1: y0 + 12.0,
    }
}

fn make_line(text: &str, x0: f32, y0: f32) -> Line {
    Line {
        text: text.to_string(),
        x0,
        y0,
    }
}

/// Write a minimal single-page PDF with one text line per (text, y) entry.
fn write_test_pdf(path: &Path, entries: &[(&str, i64)]) {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = Vec::new();
    for (text, y) in entries {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
        operations.push(Operation::new("Td", vec![100.into(), (*y).into()]));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
        operations.push(Operation::new("ET", vec![]));
    }
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, lopdf::Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

// ============================================================================
// Normalization Tests
// ============================================================================

#[test]
fn test_normalize_example_key() {
    assert_eq!(normalize("Data de Nascimento"), "data_de_nascimento");
}

#[test]
fn test_normalize_idempotence() {
    for s in [
        "Data de Nascimento",
        "RESPONSÁVEL PELO RESULTADO",
        "Emissão:",
        "Página: 1",
        "mama__direita",
    ] {
        let once = normalize(s);
        assert_eq!(normalize(&once), once);
    }
}

// ============================================================================
// Line Reconstruction Tests
// ============================================================================

#[test]
fn test_word_conservation() {
    let words = vec![
        make_word("UNIDADE", 31.0, 100.0),
        make_word("DE", 90.0, 100.4),
        make_word("SAÚDE", 110.0, 99.7),
        make_word("CNES:", 31.0, 120.0),
        make_word("2269311", 70.0, 120.0),
    ];
    let lines = reconstruct_lines(&words, &LineConfig::default()).unwrap();

    let mut reconstructed: Vec<String> = lines
        .iter()
        .flat_map(|l| l.text.split(' ').map(str::to_string))
        .collect();
    reconstructed.sort();
    let mut original: Vec<String> = words.iter().map(|w| w.text.clone()).collect();
    original.sort();
    assert_eq!(reconstructed, original);
}

#[test]
fn test_lines_come_out_in_reading_order() {
    let words = vec![
        make_word("terceira", 10.0, 300.0),
        make_word("primeira", 10.0, 100.0),
        make_word("segunda", 10.0, 200.0),
    ];
    let lines = reconstruct_lines(&words, &LineConfig::default()).unwrap();
    let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, vec!["primeira", "segunda", "terceira"]);
    assert!(lines.windows(2).all(|w| w[0].y0 <= w[1].y0));
}

#[test]
fn test_cluster_reference_stays_at_first_word() {
    // Chained drift: each word within tolerance of its neighbor, but the
    // third falls outside the tolerance of the cluster's first word. The
    // fixed reference splits there; this is inherited behavior, kept.
    let words = vec![
        make_word("a", 10.0, 100.0),
        make_word("b", 40.0, 102.9),
        make_word("c", 70.0, 105.8),
    ];
    let lines = reconstruct_lines(&words, &LineConfig { y_tolerance: 3.0 }).unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].text, "a b");
    assert_eq!(lines[1].text, "c");
}

// ============================================================================
// Section Parsing Tests
// ============================================================================

fn mammography_layout() -> ReportLayout {
    ReportLayout::siscan_mammography()
}

fn parse_lines(layout: &ReportLayout, lines: &[Line]) -> report_extractor::PageOutcome {
    let parser = SectionFieldParser::new(layout);
    let mut labels = WorkingLabelSet::new(layout);
    parser.parse_page(lines, &mut labels)
}

#[test]
fn test_section_boundary_resets_key_prefix() {
    let layout = mammography_layout();
    let outcome = parse_lines(
        &layout,
        &[
            make_line("UNIDADE DE SAÚDE", 31.0, 50.0),
            make_line("conteúdo um", 31.0, 70.0),
            make_line("conteúdo dois", 31.0, 90.0),
            make_line("PACIENTE", 31.0, 110.0),
            make_line("Nome: FULANA DE TAL", 31.0, 130.0),
        ],
    );
    // The accumulation under the first section stops at the boundary.
    assert_eq!(
        outcome.record["unidade_de_saude"],
        "conteúdo um; conteúdo dois"
    );
    assert_eq!(outcome.record["paciente__nome"], "FULANA DE TAL");
    assert!(outcome.pending.is_empty());
}

#[test]
fn test_multi_line_accumulation() {
    let layout = mammography_layout();
    let outcome = parse_lines(
        &layout,
        &[
            make_line("UNIDADE DE SAÚDE", 31.0, 50.0),
            make_line("first", 31.0, 70.0),
            make_line("second", 31.0, 90.0),
        ],
    );
    assert_eq!(outcome.record["unidade_de_saude"], "first; second");
}

#[test]
fn test_completeness_partition() {
    let layout = mammography_layout();
    let lines = vec![
        make_line("SISCAN - Sistema de informação do Câncer", 31.0, 20.0),
        make_line("Emissão: 24/01/2023 Hora: 10:32", 31.0, 40.0),
        make_line("linha órfã", 31.0, 60.0),
        make_line("PACIENTE", 31.0, 80.0),
        make_line("Nome: FULANA DE TAL", 31.0, 100.0),
        make_line("RESULTADO EXAME", 31.0, 120.0),
        make_line("Mama Direita", 31.18, 140.0),
        make_line("achado livre", 45.0, 160.0),
    ];
    let outcome = parse_lines(&layout, &lines);

    // Every line got exactly one classification.
    assert_eq!(outcome.classes.len(), lines.len());
    assert_eq!(outcome.classes[0], LineClass::Ignored);
    assert_eq!(outcome.classes[1], LineClass::LabeledField);
    assert_eq!(outcome.classes[2], LineClass::Pending);
    assert_eq!(outcome.classes[3], LineClass::SectionTitle);
    assert_eq!(outcome.classes[4], LineClass::KeyValue);
    assert_eq!(outcome.classes[5], LineClass::SectionTitle);
    assert_eq!(outcome.classes[6], LineClass::SubsectionMarker);
    assert_eq!(outcome.classes[7], LineClass::Continuation);

    // Pending output mirrors the Pending classifications exactly.
    assert_eq!(outcome.pending, vec!["linha órfã".to_string()]);
}

#[test]
fn test_label_scan_is_order_independent() {
    use report_extractor::scanner::resolve_labels;
    let line = "Conselho: CRM-999 CNS: 999999999999999 Data da liberação do resultado: 24/01/2023";
    let declared: Vec<String> = [
        "Data da liberação do resultado:",
        "Conselho:",
        "CNS:",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let mut reversed = declared.clone();
    reversed.reverse();

    let a = resolve_labels(line, &declared);
    let b = resolve_labels(line, &reversed);
    assert_eq!(a, b);
    assert_eq!(a[0].1.as_deref(), Some("CRM-999"));
    assert_eq!(a[1].1.as_deref(), Some("999999999999999"));
    assert_eq!(a[2].1.as_deref(), Some("24/01/2023"));
}

#[test]
fn test_two_page_scenario_with_fresh_label_sets() {
    // Both pages carry the same section and labeled line; each page parses
    // with its own working label set, so the label matches on both.
    let layout = mammography_layout();
    let parser = SectionFieldParser::new(&layout);
    let page = vec![
        make_line("PACIENTE", 31.0, 50.0),
        make_line("Telefone: 41999999999", 31.0, 70.0),
    ];

    for _ in 0..2 {
        let mut labels = WorkingLabelSet::new(&layout);
        let outcome = parser.parse_page(&page, &mut labels);
        assert_eq!(outcome.record["paciente__telefone"], "41999999999");
        assert!(outcome.pending.is_empty());
    }
}

// ============================================================================
// End-to-End PDF Tests
// ============================================================================

#[test]
fn test_extract_words_from_generated_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("laudo.pdf");
    write_test_pdf(
        &path,
        &[("PACIENTE", 700), ("Telefone: 41999999999", 680)],
    );

    let pages = extract_words(&path).unwrap();
    assert_eq!(pages.len(), 1);
    let texts: Vec<&str> = pages[0].words.iter().map(|w| w.text.as_str()).collect();
    assert!(texts.contains(&"PACIENTE"));
    assert!(texts.contains(&"Telefone:"));
    assert!(texts.contains(&"41999999999"));
}

#[test]
fn test_pipeline_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("laudo.pdf");
    write_test_pdf(
        &path,
        &[("PACIENTE", 700), ("Telefone: 41999999999", 680)],
    );

    let layout = mammography_layout();
    let doc = report_extractor::extract_document(&path, &layout, &ExtractOptions::default()).unwrap();
    assert_eq!(doc.pages.len(), 1);
    assert_eq!(doc.pages[0].record["paciente__telefone"], "41999999999");
    assert!(doc.pages[0].pending.is_empty());
}

#[test]
fn test_aggregator_mixes_valid_and_invalid_documents() {
    let dir = tempfile::tempdir().unwrap();
    write_test_pdf(
        &dir.path().join("laudo_valido.pdf"),
        &[("PACIENTE", 700), ("Telefone: 41999999999", 680)],
    );
    std::fs::write(dir.path().join("quebrado.pdf"), b"not really a pdf").unwrap();

    let aggregator = ReportAggregator::new(mammography_layout()).unwrap();
    let dataset = aggregator.process_directory(dir.path()).unwrap();

    assert_eq!(dataset.records.len(), 1);
    assert_eq!(dataset.records[0].file, "laudo_valido.pdf");
    assert_eq!(
        dataset.records[0].fields["paciente__telefone"],
        "41999999999"
    );
    assert_eq!(dataset.skipped.len(), 1);
    assert_eq!(dataset.skipped[0].file, "quebrado.pdf");
}

#[test]
fn test_selected_pages_filter() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("laudo.pdf");
    write_test_pdf(&path, &[("PACIENTE", 700), ("Telefone: 41999999999", 680)]);

    let layout = mammography_layout();
    let options = ExtractOptions {
        selected_pages: Some(vec![2]),
        ..Default::default()
    };
    let doc = report_extractor::extract_document(&path, &layout, &options).unwrap();
    // Page 2 does not exist; nothing is processed, nothing fails.
    assert!(doc.pages.is_empty());
}

#[test]
fn test_subsection_x_reference_via_custom_layout() {
    let layout = ReportLayout {
        sections: vec![SectionDecl {
            title: "RESULTADO EXAME".to_string(),
            fields: Vec::new(),
            subsection_x_ref: Some(31.18),
        }],
        global_labels: Vec::new(),
        ignore_lines: Vec::new(),
    };
    let outcome = parse_lines(
        &layout,
        &[
            make_line("RESULTADO EXAME", 31.0, 50.0),
            make_line("Mama Direita", 31.18, 70.0),
            make_line("Tipo de mama:", 31.18, 90.0),
            make_line("Predominantemente adiposa", 45.0, 110.0),
        ],
    );
    assert_eq!(
        outcome.record["resultado_exame__mama_direita__tipo_de_mama"],
        "Predominantemente adiposa"
    );
}

// ============================================================================
// Diagnostic Artifact Tests
// ============================================================================

#[test]
fn test_layout_sample_generation() {
    use report_extractor::artifacts::generate_layout_sample;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("laudo.pdf");
    write_test_pdf(
        &path,
        &[("PACIENTE", 700), ("Telefone: 41999999999", 680)],
    );

    let sample = generate_layout_sample(&path, Some(dir.path())).unwrap();
    assert!(sample.coordinates_json.exists());
    assert!(sample.annotated_pdf.exists());

    // One coordinates entry per extracted word.
    let json = std::fs::read_to_string(&sample.coordinates_json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 3);

    // The annotated copy is still a loadable PDF.
    lopdf::Document::load(&sample.annotated_pdf).unwrap();
}

#[test]
fn test_error_paths() {
    let layout = mammography_layout();
    let options = ExtractOptions::default();
    assert!(report_extractor::extract_document("/nonexistent/file.pdf", &layout, &options).is_err());
    assert!(extract_words("/nonexistent/file.pdf").is_err());
}
