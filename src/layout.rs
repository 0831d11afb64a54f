//! Report layout configuration
//!
//! A `ReportLayout` is an immutable, per-run value describing one report
//! family: which exact lines open a section, which labels are expected per
//! section or globally, which boilerplate lines to ignore, and where a
//! section's subsection column sits. New report types are new layout
//! values, not new engine code.

use crate::normalize::normalize;
use crate::ExtractError;
use std::collections::HashMap;

/// Declaration of one report section.
#[derive(Debug, Clone, Default)]
pub struct SectionDecl {
    /// Exact line text that opens the section
    pub title: String,
    /// Labels expected on lines of this section, scanned positionally
    pub fields: Vec<String>,
    /// x0 of the subsection column, when the section nests subsections
    pub subsection_x_ref: Option<f32>,
}

impl SectionDecl {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }
}

/// Immutable layout configuration for one report family.
#[derive(Debug, Clone, Default)]
pub struct ReportLayout {
    /// Sections in the order they are expected on the page
    pub sections: Vec<SectionDecl>,
    /// Labels matched on any line regardless of the current section
    pub global_labels: Vec<String>,
    /// Exact boilerplate lines consumed without further processing
    pub ignore_lines: Vec<String>,
}

impl ReportLayout {
    /// Look up a section declaration by its exact title.
    pub fn section(&self, title: &str) -> Option<&SectionDecl> {
        self.sections.iter().find(|s| s.title == title)
    }

    /// Whether a trimmed line is declared ignorable boilerplate.
    pub fn is_ignored(&self, line: &str) -> bool {
        self.ignore_lines.iter().any(|l| l == line)
    }

    /// Defensive configuration checks.
    ///
    /// The parser always has the generic key:value fallback available, so a
    /// sparse layout still parses; what cannot be tolerated are section
    /// titles that collide or normalize away entirely (their key prefixes
    /// would collide too), or blank label strings (they would match every
    /// line at offset zero).
    pub fn validate(&self) -> Result<(), ExtractError> {
        let mut seen = Vec::new();
        for section in &self.sections {
            if normalize(&section.title).is_empty() {
                return Err(ExtractError::Configuration(format!(
                    "section title {:?} normalizes to an empty key prefix",
                    section.title
                )));
            }
            if seen.contains(&&section.title) {
                return Err(ExtractError::Configuration(format!(
                    "duplicate section title {:?}",
                    section.title
                )));
            }
            seen.push(&section.title);
            if section.fields.iter().any(|f| f.trim().is_empty()) {
                return Err(ExtractError::Configuration(format!(
                    "section {:?} declares a blank field label",
                    section.title
                )));
            }
        }
        if self.global_labels.iter().any(|f| f.trim().is_empty()) {
            return Err(ExtractError::Configuration(
                "blank global label".to_string(),
            ));
        }
        Ok(())
    }

    /// Layout of SISCAN mammography result reports.
    ///
    /// The subsection column of the result section sits at a fixed x in the
    /// upstream template; when the template drifts, re-derive the value
    /// with the layout-sample artifact.
    pub fn siscan_mammography() -> Self {
        ReportLayout {
            sections: vec![
                SectionDecl::new("UNIDADE DE SAÚDE"),
                SectionDecl {
                    title: "PACIENTE".to_string(),
                    fields: vec!["Telefone".to_string()],
                    subsection_x_ref: None,
                },
                SectionDecl::new("PRESTADOR DE SERVIÇO"),
                SectionDecl {
                    title: "RESULTADO EXAME".to_string(),
                    fields: Vec::new(),
                    subsection_x_ref: Some(31.18),
                },
                SectionDecl {
                    title: "RESPONSÁVEL PELO RESULTADO".to_string(),
                    fields: vec!["Data da liberação do resultado:".to_string()],
                    subsection_x_ref: None,
                },
            ],
            global_labels: vec![
                "Emissão:".to_string(),
                "Hora:".to_string(),
                "Página:".to_string(),
                "UF".to_string(),
            ],
            ignore_lines: vec![
                "SISCAN - Sistema de informação do Câncer".to_string(),
                "LAUDO DO EXAME DE MAMOGRAFIA".to_string(),
            ],
        }
    }
}

/// Per-parse mutable clone of the declared labels.
///
/// A label is removed once it matches, so it cannot match twice within the
/// same page. Each page parse takes its own clone; sharing one across
/// concurrently parsed pages would silently drop labels that legitimately
/// repeat on every page.
#[derive(Debug, Clone)]
pub struct WorkingLabelSet {
    global: Vec<String>,
    by_section: HashMap<String, Vec<String>>,
}

impl WorkingLabelSet {
    pub fn new(layout: &ReportLayout) -> Self {
        Self {
            global: layout.global_labels.clone(),
            by_section: layout
                .sections
                .iter()
                .filter(|s| !s.fields.is_empty())
                .map(|s| (s.title.clone(), s.fields.clone()))
                .collect(),
        }
    }

    /// Remaining global labels (empty once all have matched).
    pub fn global(&mut self) -> &mut Vec<String> {
        &mut self.global
    }

    pub fn has_global(&self) -> bool {
        !self.global.is_empty()
    }

    /// Remaining labels for a section, if any are left.
    pub fn section(&mut self, title: &str) -> Option<&mut Vec<String>> {
        self.by_section.get_mut(title).filter(|v| !v.is_empty())
    }

    pub fn has_section(&self, title: &str) -> bool {
        self.by_section.get(title).is_some_and(|v| !v.is_empty())
    }
}
