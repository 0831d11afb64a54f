//! Multi-document aggregation
//!
//! Runs the per-page pipeline over a batch of PDF files and merges the
//! results into one flat dataset. Documents are independent units of work
//! and are processed on a rayon pool; the shared `ReportLayout` is
//! read-only and every page takes its own working label set, so the only
//! synchronization point is the final sequential merge.

use crate::{extract_document, ExtractError, ExtractOptions, ReportLayout};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One extracted page, tagged with its source document.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    /// Source document file name
    pub file: String,
    /// Normalized key -> value pairs of the page
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

/// A document the run could not use; reported, never fatal.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedDocument {
    pub file: String,
    pub reason: String,
}

/// The aggregated output of one run: the only contract surface exposed to
/// downstream consumers.
#[derive(Debug, Default, Serialize)]
pub struct Dataset {
    /// One record per processed page, in document then page order
    pub records: Vec<Record>,
    /// file name -> page number -> unclassified line text
    pub pending: BTreeMap<String, BTreeMap<u32, Vec<String>>>,
    /// Documents skipped as invalid or empty
    pub skipped: Vec<SkippedDocument>,
}

impl Dataset {
    /// Whether any page left unclassified lines (the first-class signal of
    /// layout drift in the source reports).
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Batch runner: one layout, many documents.
pub struct ReportAggregator {
    layout: ReportLayout,
    options: ExtractOptions,
}

enum DocOutcome {
    Extracted(crate::DocumentExtraction),
    Skipped(SkippedDocument),
}

impl ReportAggregator {
    /// Create an aggregator after validating the layout configuration.
    pub fn new(layout: ReportLayout) -> Result<Self, ExtractError> {
        layout.validate()?;
        Ok(Self {
            layout,
            options: ExtractOptions::default(),
        })
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn layout(&self) -> &ReportLayout {
        &self.layout
    }

    /// Process every file of a directory (non-recursive, name order).
    pub fn process_directory<P: AsRef<Path>>(&self, dir: P) -> Result<Dataset, ExtractError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file())
            .collect();
        paths.sort();
        Ok(self.process_paths(&paths))
    }

    /// Process an explicit set of files.
    ///
    /// Documents fan out over the rayon pool; each worker loads its own
    /// PDF, so the decode boundary is isolated per worker. Results are
    /// merged sequentially afterwards.
    pub fn process_paths(&self, paths: &[PathBuf]) -> Dataset {
        let outcomes: Vec<DocOutcome> = paths
            .par_iter()
            .map(|path| self.process_one(path))
            .collect();

        let mut dataset = Dataset::default();
        for outcome in outcomes {
            match outcome {
                DocOutcome::Skipped(skip) => {
                    log::warn!("skipping {}: {}", skip.file, skip.reason);
                    dataset.skipped.push(skip);
                }
                DocOutcome::Extracted(doc) => {
                    for page in doc.pages {
                        if !page.pending.is_empty() {
                            dataset
                                .pending
                                .entry(doc.file.clone())
                                .or_default()
                                .insert(page.page, page.pending);
                        }
                        dataset.records.push(Record {
                            file: doc.file.clone(),
                            fields: page.record,
                        });
                    }
                }
            }
        }
        dataset
    }

    fn process_one(&self, path: &Path) -> DocOutcome {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let doc = match extract_document(path, &self.layout, &self.options) {
            Ok(doc) => doc,
            Err(e) => {
                return DocOutcome::Skipped(SkippedDocument {
                    file,
                    reason: e.to_string(),
                })
            }
        };

        if doc.pages.is_empty() {
            return DocOutcome::Skipped(SkippedDocument {
                file,
                reason: "no records extracted".to_string(),
            });
        }
        if !doc.empty_pages.is_empty() {
            log::warn!("{}: pages without words: {:?}", doc.file, doc.empty_pages);
        }
        DocOutcome::Extracted(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn layout_is_validated_on_construction() {
        let bad = ReportLayout {
            sections: vec![
                crate::SectionDecl::new("PACIENTE"),
                crate::SectionDecl::new("PACIENTE"),
            ],
            ..Default::default()
        };
        assert!(ReportAggregator::new(bad).is_err());
    }

    #[test]
    fn invalid_documents_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let junk = dir.path().join("laudo.pdf");
        std::fs::File::create(&junk)
            .unwrap()
            .write_all(b"not a pdf at all")
            .unwrap();

        let aggregator = ReportAggregator::new(ReportLayout::siscan_mammography()).unwrap();
        let dataset = aggregator.process_directory(dir.path()).unwrap();
        assert!(dataset.records.is_empty());
        assert_eq!(dataset.skipped.len(), 1);
        assert_eq!(dataset.skipped[0].file, "laudo.pdf");
    }

    #[test]
    fn empty_directory_yields_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let aggregator = ReportAggregator::new(ReportLayout::siscan_mammography()).unwrap();
        let dataset = aggregator.process_directory(dir.path()).unwrap();
        assert!(dataset.records.is_empty());
        assert!(dataset.skipped.is_empty());
        assert!(!dataset.has_pending());
    }

    #[test]
    fn non_pdf_extensions_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        std::fs::File::create(&txt)
            .unwrap()
            .write_all(b"plain notes")
            .unwrap();

        let aggregator = ReportAggregator::new(ReportLayout::siscan_mammography()).unwrap();
        let dataset = aggregator.process_directory(dir.path()).unwrap();
        assert_eq!(dataset.skipped.len(), 1);
    }
}
