//! Section/field/subsection parsing of reconstructed lines
//!
//! A single-pass state machine walks a page's lines against a
//! `ReportLayout`. Per line, in priority order: ignorable boilerplate,
//! section title, global labels, section-scoped labels, subsection
//! boundary, declared positional fields, generic key:value pairs, and
//! finally unlabeled content that either fills the current key, continues
//! a multi-line value, or deepens the key path. Nothing here is fatal:
//! lines no rule classifies are collected as pending output.

use crate::layout::{ReportLayout, SectionDecl, WorkingLabelSet};
use crate::lines::Line;
use crate::normalize::normalize;
use crate::scanner::{extract_key_value_pairs, resolve_labels};
use std::collections::BTreeMap;

/// Key prefix for labels matched outside any section scope.
const GLOBAL_PREFIX: &str = "geral__";

/// How a reconstructed line was classified by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// Declared boilerplate, consumed without effect
    Ignored,
    /// Exact match of a declared section title
    SectionTitle,
    /// At least one declared label (global or section) matched
    LabeledField,
    /// Line at the subsection x reference
    SubsectionMarker,
    /// Consumed by positional fields or the generic key:value extractor
    KeyValue,
    /// Unlabeled content: stored, appended, or deepening the key path
    Continuation,
    /// No rule applied; reported, never fatal
    Pending,
}

/// Result of parsing one page.
#[derive(Debug)]
pub struct PageOutcome {
    /// Normalized key -> value pairs extracted from the page
    pub record: BTreeMap<String, String>,
    /// Raw text of unclassified lines, in reading order
    pub pending: Vec<String>,
    /// Classification of every input line, index-aligned with the input
    pub classes: Vec<LineClass>,
}

/// Per-page parse state.
#[derive(Debug)]
struct ParseState<'a> {
    section: Option<&'a SectionDecl>,
    subsection: Option<String>,
    key_prefix: String,
    /// A multi-line value is being accumulated
    continuing: bool,
    /// A key:value line was already consumed in the current context
    saw_key_value: bool,
}

/// The layout-driven line parser. One instance serves any number of pages;
/// all per-page state lives in the `WorkingLabelSet` and locals.
pub struct SectionFieldParser<'a> {
    layout: &'a ReportLayout,
}

impl<'a> SectionFieldParser<'a> {
    pub fn new(layout: &'a ReportLayout) -> Self {
        Self { layout }
    }

    /// Parse one page's reading-order lines.
    ///
    /// `labels` must be a fresh clone per page; matched labels are removed
    /// from it so they cannot match twice on the same page.
    pub fn parse_page(&self, lines: &[Line], labels: &mut WorkingLabelSet) -> PageOutcome {
        let mut record: BTreeMap<String, String> = BTreeMap::new();
        let mut classes = vec![LineClass::Pending; lines.len()];

        let mut st = ParseState {
            section: None,
            subsection: None,
            key_prefix: String::new(),
            continuing: false,
            saw_key_value: false,
        };

        for (idx, line) in lines.iter().enumerate() {
            let mut clean = line.text.trim().to_string();

            if self.layout.is_ignored(&clean) {
                classes[idx] = LineClass::Ignored;
                continue;
            }

            if let Some(decl) = self.layout.section(&clean) {
                log::debug!("section: {}", decl.title);
                st.section = Some(decl);
                st.subsection = None;
                st.key_prefix = format!("{}__", normalize(&decl.title));
                st.continuing = false;
                st.saw_key_value = false;
                classes[idx] = LineClass::SectionTitle;
                continue;
            }

            let mut matched_label = false;

            // Global labels apply on any line, before and inside sections.
            if labels.has_global() {
                let (rest, matched) =
                    extract_labeled_fields(labels.global(), GLOBAL_PREFIX, &clean, &mut record);
                clean = rest;
                matched_label |= matched;
                if matched && clean.is_empty() {
                    classes[idx] = LineClass::LabeledField;
                    continue;
                }
            }

            let Some(decl) = st.section else {
                // Outside any section nothing further applies; note this
                // leaves a line partially matched by global labels
                // unclassified, which is the inherited contract.
                continue;
            };

            // Section-scoped labels, under the current key prefix.
            if let Some(section_labels) = labels.section(&decl.title) {
                let (rest, matched) =
                    extract_labeled_fields(section_labels, &st.key_prefix, &clean, &mut record);
                clean = rest;
                matched_label |= matched;
            }

            let is_subsection = decl
                .subsection_x_ref
                .map(|xref| (line.x0 - xref).abs() < f32::EPSILON)
                .unwrap_or(false);

            // Structured extraction of whatever remains of the line:
            // declared fields positionally, then free-form key:value pairs.
            // Subsection boundary lines are never structured content.
            let mut extracted: Vec<(String, Option<String>)> = Vec::new();
            if !is_subsection {
                if !decl.fields.is_empty() {
                    extracted = resolve_labels(&clean, &decl.fields);
                }
                if extracted.is_empty() {
                    extracted = extract_key_value_pairs(&clean)
                        .into_iter()
                        .map(|(k, v)| (k, Some(v)))
                        .collect();
                }
            }

            if !st.continuing && !extracted.is_empty() {
                for (key, value) in extracted {
                    let full = format!("{}{}", st.key_prefix, normalize(&key));
                    log::debug!("field {} = {:?}", full, value);
                    record.insert(full, value.unwrap_or_default());
                }
                st.saw_key_value = true;
                classes[idx] = if matched_label {
                    LineClass::LabeledField
                } else {
                    LineClass::KeyValue
                };
                continue;
            }

            if is_subsection {
                if !clean.contains(':') {
                    // A colon-less boundary line names a new subsection;
                    // the key prefix restarts at the section level.
                    log::debug!("subsection: {}", clean);
                    st.subsection = Some(clean.clone());
                    st.continuing = false;
                    st.key_prefix = format!("{}__", normalize(&decl.title));
                } else {
                    // A colon boundary line is a field of the current
                    // subsection; re-scope the prefix before deepening.
                    let mut prefix = format!("{}__", normalize(&decl.title));
                    if let Some(sub) = &st.subsection {
                        prefix.push_str(&normalize(sub));
                        prefix.push_str("__");
                    }
                    st.key_prefix = prefix;
                }
                clean = clean.replace(':', "");
            }

            if !st.saw_key_value && !is_subsection {
                // Unlabeled content fills the current key; a second line
                // under the same key accumulates instead.
                let key = st.key_prefix.trim_end_matches('_').to_string();
                match record.get_mut(&key) {
                    None => {
                        log::debug!("value for {}: {}", key, clean);
                        record.insert(key, clean);
                    }
                    Some(existing) => {
                        st.continuing = true;
                        existing.push_str("; ");
                        existing.push_str(&clean);
                    }
                }
                classes[idx] = if matched_label {
                    LineClass::LabeledField
                } else {
                    LineClass::Continuation
                };
            } else {
                // The line names a nested key segment for what follows.
                st.key_prefix = format!("{}{}__", st.key_prefix, normalize(&clean));
                st.saw_key_value = false;
                log::debug!("key path now {}", st.key_prefix);
                classes[idx] = if is_subsection {
                    LineClass::SubsectionMarker
                } else if matched_label {
                    LineClass::LabeledField
                } else {
                    LineClass::Continuation
                };
            }
        }

        let pending: Vec<String> = classes
            .iter()
            .zip(lines)
            .filter(|(class, _)| **class == LineClass::Pending)
            .map(|(_, line)| line.text.clone())
            .collect();
        if !pending.is_empty() {
            log::warn!("{} unclassified line(s): {:?}", pending.len(), pending);
        }

        PageOutcome {
            record,
            pending,
            classes,
        }
    }
}

/// Resolve `working` labels against `line`, writing values under `prefix`.
///
/// Matched labels are removed from the working set, and both the matched
/// label text and its value are stripped from the returned remainder. When
/// a resolved value itself contains a `:` the positional split swallowed
/// another label, so the value is overridden with the generic extractor's
/// first pair. Returns the remaining line text and whether anything
/// matched.
fn extract_labeled_fields(
    working: &mut Vec<String>,
    prefix: &str,
    line: &str,
    record: &mut BTreeMap<String, String>,
) -> (String, bool) {
    let resolved = resolve_labels(line, working.as_slice());
    if resolved.is_empty() {
        return (line.to_string(), false);
    }

    let mut clean = line.to_string();
    for (label, mut value) in resolved {
        if let Some(v) = &value {
            if v.contains(':') {
                let pairs = extract_key_value_pairs(&clean);
                if let Some((_, first)) = pairs.first() {
                    log::warn!(
                        "delimiter inside value {:?}; overriding with {:?}",
                        v,
                        first
                    );
                    value = Some(first.clone());
                }
            }
        }

        let key = format!("{}{}", prefix, normalize(&label));
        log::debug!("label {} = {:?}", key, value);
        record.insert(key, value.clone().unwrap_or_default());

        if let Some(v) = &value {
            if !v.is_empty() {
                clean = clean.replace(v.as_str(), "").trim().to_string();
            }
        }
        working.retain(|l| l != &label);
        clean = clean.replace(label.as_str(), "").trim().to_string();
    }

    (clean, true)
}
