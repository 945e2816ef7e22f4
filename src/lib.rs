use std::collections::HashMap;

pub mod ast;
pub mod batch;
pub mod error;
pub mod key;
pub mod layout;
pub mod loader;
pub mod merge;
pub mod parser;
pub mod po;


// Re-export the types most callers need
pub use ast::{Attribute, Document, Element, NodeKind, TextNode, XmlNode};
pub use batch::{
    BatchReport, DocumentFailure, DocumentReport, FailureKind, MergedBatch, SourceDocument,
    merge_documents, translate_directory, translate_locales,
};
pub use error::{CatalogError, CatalogResult, DocumentError, KeyError, MergeError, ParseError};
pub use key::{KeyScheme, MemberRef, Role, TextSite};
pub use layout::Layout;
pub use loader::{
    canonical_locale, catalog_from_json, catalog_from_po, catalog_stats, load_catalog_from_file,
    load_catalogs_from_dir,
};
pub use merge::{MergeOutcome, MergeReport, MergeWarning, Untranslated, merge};
pub use parser::Parser;
pub use po::{PoEntry, PoFile, PoStats};

/// Translations for one locale, keyed the way their producer keyed them.
///
/// An entry with empty text is kept, so duplicates are still detected, but
/// it is never returned by [`Catalog::lookup`]: gettext and most other
/// catalog formats use the empty string to mean "not translated yet".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    locale: String,
    scheme: KeyScheme,
    origin: String,
    entries: HashMap<String, String>,
}

impl Catalog {
    pub fn new(locale: &str, scheme: KeyScheme) -> Self {
        Catalog {
            locale: locale.to_string(),
            scheme,
            origin: "<memory>".to_string(),
            entries: HashMap::new(),
        }
    }

    /// Name the file this catalog came from, for error messages.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Build a catalog from `(key, text)` pairs, rejecting duplicate keys.
    pub fn from_pairs<I, K, V>(locale: &str, scheme: KeyScheme, pairs: I) -> CatalogResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut catalog = Catalog::new(locale, scheme);
        for (key, text) in pairs {
            catalog.insert(key, text)?;
        }
        Ok(catalog)
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        text: impl Into<String>,
    ) -> CatalogResult<&mut Self> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(CatalogError::DuplicateKey {
                key,
                origin: self.origin.clone(),
            });
        }
        self.entries.insert(key, text.into());
        Ok(self)
    }

    /// Translated text for `key`, or `None` when absent, empty or blank.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .map(String::as_str)
            .filter(|text| !text.trim().is_empty())
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn scheme(&self) -> KeyScheme {
        self.scheme
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Number of entries, translated or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries with text that is not just whitespace.
    pub fn translated_len(&self) -> usize {
        self.entries
            .values()
            .filter(|text| !text.trim().is_empty())
            .count()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
