use std::fmt;
use std::fs;
use std::path::Path;

use icu_locale::Locale;
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use crate::error::{CatalogError, CatalogResult};
use crate::key::KeyScheme;
use crate::po::{self, PoFile, PoStats};
use crate::Catalog;

/// Canonical BCP 47 form of a locale tag.
///
/// Accepts the underscore spelling used by gettext file names, so `zh_CN`,
/// `zh-cn` and `zh-CN` all become `zh-CN`.
pub fn canonical_locale(tag: &str) -> CatalogResult<String> {
    let normalized = tag.trim().replace('_', "-");
    if normalized.is_empty() {
        return Err(CatalogError::InvalidLocale(tag.to_string()));
    }
    let locale: Locale = normalized
        .parse()
        .map_err(|_| CatalogError::InvalidLocale(tag.to_string()))?;
    Ok(locale.to_string())
}

/// Build a catalog from a parsed PO file.
///
/// Every live entry goes in, so duplicate `msgid`s are caught even when they
/// are untranslated; fuzzy and empty entries are stored without text.
///
/// The locale is `locale` if given, otherwise the file's `Language:` header.
pub fn catalog_from_po(po: &PoFile, locale: Option<&str>, origin: &str) -> CatalogResult<Catalog> {
    let locale = locale
        .or_else(|| po.language())
        .ok_or_else(|| CatalogError::MissingLocale(origin.to_string()))?;
    let mut catalog =
        Catalog::new(&canonical_locale(locale)?, KeyScheme::SourceText).with_origin(origin);
    for entry in po.live_entries() {
        catalog.insert(entry.key(), entry.translation())?;
    }
    Ok(catalog)
}

/// Object entries in document order, duplicates included.
///
/// `serde_json::Value` keeps only the last of two equal keys, which would
/// hide exactly the ambiguity a catalog must reject.
struct JsonEntries(Vec<(String, JsonValue)>);

impl<'de> Deserialize<'de> for JsonEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = JsonEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping message keys to strings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<JsonEntries, A::Error> {
                let mut entries = Vec::new();
                while let Some(entry) = map.next_entry::<String, JsonValue>()? {
                    entries.push(entry);
                }
                Ok(JsonEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Build a catalog from a flat JSON object of structural keys.
///
/// The JSON should have the following structure:
/// ```json
/// {
///     "@metadata": { "locale": "zh-CN" },
///     "Node2D.position.description": "节点的位置。",
///     "Node2D.@class.summary": "2D 游戏对象。"
/// }
/// ```
///
/// Keys starting with `@` are metadata; values that are not strings are
/// skipped with a warning.
pub fn catalog_from_json(content: &str, locale: Option<&str>, path: &Path) -> CatalogResult<Catalog> {
    let JsonEntries(entries) =
        serde_json::from_str(content).map_err(|source| CatalogError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let declared = entries
        .iter()
        .find(|(key, _)| key == "@metadata")
        .and_then(|(_, metadata)| metadata.get("locale"))
        .and_then(JsonValue::as_str);
    let origin = path.display().to_string();
    let locale = locale
        .or(declared)
        .ok_or_else(|| CatalogError::MissingLocale(origin.clone()))?;

    let mut catalog =
        Catalog::new(&canonical_locale(locale)?, KeyScheme::Structural).with_origin(&origin);
    for (key, value) in entries {
        if key.starts_with('@') {
            continue;
        }
        match value.as_str() {
            Some(text) => {
                catalog.insert(key, text)?;
            }
            None => warn!(catalog = %origin, key = %key, "message is not a string, skipping"),
        }
    }
    Ok(catalog)
}

fn read(path: &Path) -> CatalogResult<String> {
    fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn file_stem(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|stem| stem.to_str())
}

/// Load one catalog, choosing the reader by file extension.
///
/// The locale is `locale` if given, else the one the file declares, else the
/// file name (`zh_CN.po` → `zh-CN`).
///
/// # Errors
/// - File not found or unreadable
/// - Malformed PO or JSON
/// - Duplicate keys
/// - Unknown extension or unusable locale
pub fn load_catalog_from_file(path: &Path, locale: Option<&str>) -> CatalogResult<Catalog> {
    let extension = path.extension().and_then(|ext| ext.to_str());
    let origin = path.display().to_string();
    let catalog = match extension {
        Some("po") => {
            let po = po::parse(&read(path)?, &origin)?;
            let locale = locale.or_else(|| po.language()).or_else(|| file_stem(path));
            catalog_from_po(&po, locale, &origin)?
        }
        Some("json") => {
            let content = read(path)?;
            match catalog_from_json(&content, locale, path) {
                Err(CatalogError::MissingLocale(_)) if file_stem(path).is_some() => {
                    catalog_from_json(&content, file_stem(path), path)?
                }
                result => result?,
            }
        }
        _ => return Err(CatalogError::UnsupportedFormat(path.to_path_buf())),
    };

    info!(
        catalog = %origin,
        locale = catalog.locale(),
        scheme = %catalog.scheme(),
        entries = catalog.len(),
        translated = catalog.translated_len(),
        "catalog loaded"
    );
    Ok(catalog)
}

/// Load every `*.po` and `*.json` catalog in a directory.
///
/// The file name (without extension) is the locale, e.g. `zh_CN.po` →
/// `zh-CN`. Catalogs are returned sorted by locale.
pub fn load_catalogs_from_dir(dir: &Path) -> CatalogResult<Vec<Catalog>> {
    if !dir.is_dir() {
        return Err(CatalogError::Io {
            path: dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }

    let entries = fs::read_dir(dir).map_err(|source| CatalogError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut catalogs = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| CatalogError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .path();

        if !matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("po" | "json")
        ) {
            continue;
        }
        let locale = file_stem(&path).map(str::to_string);
        catalogs.push(load_catalog_from_file(&path, locale.as_deref())?);
    }

    if catalogs.is_empty() {
        warn!(dir = %dir.display(), "no catalogs found");
    }
    catalogs.sort_by(|a, b| a.locale().cmp(b.locale()));
    Ok(catalogs)
}

/// Entry counts of a catalog file; JSON catalogs have no fuzzy entries.
pub fn catalog_stats(path: &Path) -> CatalogResult<PoStats> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("po") => Ok(po::parse(&read(path)?, &path.display().to_string())?.stats()),
        _ => {
            let catalog = load_catalog_from_file(path, Some("und"))?;
            Ok(PoStats {
                total: catalog.len(),
                translated: catalog.translated_len(),
                untranslated: catalog.len() - catalog.translated_len(),
                fuzzy: 0,
            })
        }
    }
}
