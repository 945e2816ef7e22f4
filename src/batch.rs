//! Merging whole documentation sets
//!
//! A documentation set is a directory of class reference files. Each file is
//! merged on its own: a file that cannot be read, parsed or keyed is reported
//! and the rest of the set still goes through. Several locales can be run
//! against the same parsed set concurrently, since merging never mutates its
//! inputs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::Catalog;
use crate::ast::Document;
use crate::error::{DocumentError, MergeError};
use crate::merge::{MergeReport, merge};
use crate::parser::Parser;

/// A document and its path relative to the documentation root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub document: Document,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentReport {
    pub path: String,
    #[serde(flatten)]
    pub report: MergeReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Io,
    Parse,
    StructuralMismatch,
    Task,
}

/// A document that produced no output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFailure {
    pub path: String,
    pub kind: FailureKind,
    pub message: String,
}

impl DocumentFailure {
    pub fn new(path: &Path, error: &DocumentError) -> Self {
        let kind = match error {
            DocumentError::Io { .. } => FailureKind::Io,
            DocumentError::Parse(_) => FailureKind::Parse,
            DocumentError::Merge(MergeError::StructuralMismatch { .. }) => {
                FailureKind::StructuralMismatch
            }
            DocumentError::Task { .. } => FailureKind::Task,
        };
        DocumentFailure {
            path: display_path(path),
            kind,
            message: error.to_string(),
        }
    }
}

/// Outcome of one locale over a documentation set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub locale: String,
    pub documents: Vec<DocumentReport>,
    pub failures: Vec<DocumentFailure>,
}

impl BatchReport {
    pub fn new(locale: &str) -> Self {
        BatchReport {
            locale: locale.to_string(),
            documents: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn translated(&self) -> usize {
        self.documents.iter().map(|d| d.report.translated).sum()
    }

    pub fn untranslated(&self) -> usize {
        self.documents.iter().map(|d| d.report.untranslated).sum()
    }

    pub fn skipped(&self) -> usize {
        self.documents.iter().map(|d| d.report.skipped).sum()
    }

    pub fn coverage(&self) -> f64 {
        let total = self.translated() + self.untranslated() + self.skipped();
        if total == 0 {
            0.0
        } else {
            self.translated() as f64 / total as f64
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Merged documents of one locale, plus the report.
#[derive(Debug, Clone)]
pub struct MergedBatch {
    pub documents: Vec<SourceDocument>,
    pub report: BatchReport,
}

fn display_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Merge every document in `sources` for `locale`.
///
/// A document whose tree cannot be keyed is listed in the report's failures
/// and left out of the output; its siblings are unaffected.
pub fn merge_documents(sources: &[SourceDocument], catalog: &Catalog, locale: &str) -> MergedBatch {
    let mut documents = Vec::with_capacity(sources.len());
    let mut report = BatchReport::new(locale);
    for (i, source) in sources.iter().enumerate() {
        debug!(locale, "Processing [{}/{}]: {}", i + 1, sources.len(), source.path.display());
        match merge(&source.document, catalog, locale) {
            Ok(outcome) => {
                report.documents.push(DocumentReport {
                    path: display_path(&source.path),
                    report: outcome.report,
                });
                documents.push(SourceDocument {
                    path: source.path.clone(),
                    document: outcome.document,
                });
            }
            Err(error) => {
                warn!(locale, path = %source.path.display(), %error, "document not merged");
                report
                    .failures
                    .push(DocumentFailure::new(&source.path, &DocumentError::Merge(error)));
            }
        }
    }
    MergedBatch { documents, report }
}

/// All `*.xml` files under `source_dir`, relative to it, in file name order.
pub fn find_documents(source_dir: &Path) -> Result<Vec<PathBuf>, DocumentError> {
    if !source_dir.is_dir() {
        return Err(DocumentError::Io {
            path: source_dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }
    let mut paths = Vec::new();
    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| DocumentError::Io {
            path: e.path().unwrap_or(source_dir).to_path_buf(),
            source: e.into(),
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().and_then(|e| e.to_str()) == Some("xml") {
            if let Ok(relative) = path.strip_prefix(source_dir) {
                paths.push(relative.to_path_buf());
            }
        }
    }
    Ok(paths)
}

fn read_document(source_dir: &Path, relative: &Path) -> Result<Document, DocumentError> {
    let full = source_dir.join(relative);
    let content = fs::read_to_string(&full).map_err(|source| DocumentError::Io {
        path: full.clone(),
        source,
    })?;
    Ok(Parser::new(&content).parse()?)
}

/// Parse every document of a documentation set.
///
/// Documents that cannot be read or parsed are returned as failures.
pub fn read_documents(
    source_dir: &Path,
) -> Result<(Vec<SourceDocument>, Vec<DocumentFailure>), DocumentError> {
    let paths = find_documents(source_dir)?;
    info!(dir = %source_dir.display(), count = paths.len(), "found documents");

    let mut documents = Vec::with_capacity(paths.len());
    let mut failures = Vec::new();
    for path in paths {
        match read_document(source_dir, &path) {
            Ok(document) => documents.push(SourceDocument { path, document }),
            Err(error) => {
                warn!(path = %path.display(), %error, "document not readable");
                failures.push(DocumentFailure::new(&path, &error));
            }
        }
    }
    Ok((documents, failures))
}

/// Write documents under `output_dir`, keeping their relative paths.
pub fn write_documents(output_dir: &Path, documents: &[SourceDocument]) -> Vec<DocumentFailure> {
    let mut failures = Vec::new();
    for doc in documents {
        let target = output_dir.join(&doc.path);
        let written = target
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::write(&target, doc.document.to_xml()));
        if let Err(source) = written {
            let error = DocumentError::Io {
                path: target.clone(),
                source,
            };
            warn!(%error, "document not written");
            failures.push(DocumentFailure::new(&doc.path, &error));
        }
    }
    failures
}

fn run_locale(
    sources: &[SourceDocument],
    read_failures: &[DocumentFailure],
    output_dir: &Path,
    catalog: &Catalog,
) -> BatchReport {
    let batch = merge_documents(sources, catalog, catalog.locale());
    let mut report = batch.report;
    report.failures.splice(0..0, read_failures.iter().cloned());
    report
        .failures
        .extend(write_documents(output_dir, &batch.documents));
    info!(
        locale = %report.locale,
        documents = report.documents.len(),
        failures = report.failures.len(),
        translated = report.translated(),
        untranslated = report.untranslated(),
        coverage = format!("{:.1}%", report.coverage() * 100.0),
        "translation complete"
    );
    report
}

/// Translate a documentation set with one catalog.
///
/// Every `*.xml` under `source_dir` is merged and written to the same
/// relative path under `output_dir`.
///
/// # Errors
///
/// Only when `source_dir` cannot be listed; per-document problems are in the
/// returned report.
pub fn translate_directory(
    source_dir: &Path,
    output_dir: &Path,
    catalog: &Catalog,
) -> Result<BatchReport, DocumentError> {
    let (sources, read_failures) = read_documents(source_dir)?;
    Ok(run_locale(&sources, &read_failures, output_dir, catalog))
}

/// Translate a documentation set into several locales at once.
///
/// The set is parsed once and shared; each catalog writes to
/// `output_dir/<locale>` on tokio's blocking pool. Reports come back sorted
/// by locale.
pub async fn translate_locales(
    source_dir: &Path,
    output_dir: &Path,
    catalogs: Vec<Catalog>,
) -> Result<Vec<BatchReport>, DocumentError> {
    let (sources, read_failures) = read_documents(source_dir)?;
    let sources = Arc::new(sources);
    let read_failures = Arc::new(read_failures);

    let mut tasks = JoinSet::new();
    for catalog in catalogs {
        let sources = Arc::clone(&sources);
        let read_failures = Arc::clone(&read_failures);
        let target = output_dir.join(catalog.locale());
        let locale = catalog.locale().to_string();
        tasks.spawn_blocking(move || {
            (
                locale,
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    run_locale(&sources, &read_failures, &target, &catalog)
                })),
            )
        });
    }

    let mut reports = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (locale, result) = joined.map_err(|e| DocumentError::Task {
            locale: "<unknown>".to_string(),
            message: e.to_string(),
        })?;
        let report = result.map_err(|_| DocumentError::Task {
            locale,
            message: "task panicked".to_string(),
        })?;
        reports.push(report);
    }
    reports.sort_by(|a, b| a.locale.cmp(&b.locale));
    Ok(reports)
}
