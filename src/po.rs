//! Reader for gettext PO catalogs
//!
//! Class reference translations are maintained as one `.po` file per
//! language, keyed by the English prose (`msgid`). This reader understands
//! the subset of the format those files use: the header entry, `msgctxt`,
//! `msgid`, `msgid_plural`, `msgstr` and `msgstr[N]`, multi-line strings,
//! flags (`#, fuzzy`), references (`#:`) and obsolete entries (`#~`).

use serde::Serialize;

use crate::error::{CatalogError, CatalogResult};
use crate::key::CONTEXT_SEPARATOR;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoEntry {
    pub msgctxt: Option<String>,
    pub msgid: String,
    pub msgid_plural: Option<String>,
    /// `msgstr`, or `msgstr[0]`, `msgstr[1]`, ... for plural entries
    pub msgstr: Vec<String>,
    pub flags: Vec<String>,
    pub references: Vec<String>,
    pub obsolete: bool,
    /// Line of the entry's first keyword
    pub line: usize,
}

impl PoEntry {
    pub fn is_fuzzy(&self) -> bool {
        self.flags.iter().any(|flag| flag == "fuzzy")
    }

    fn is_header(&self) -> bool {
        self.msgid.is_empty() && self.msgctxt.is_none()
    }

    /// Usable translation: not fuzzy, not obsolete, and every form filled in.
    pub fn is_translated(&self) -> bool {
        !self.obsolete
            && !self.is_fuzzy()
            && !self.msgstr.is_empty()
            && self.msgstr.iter().all(|s| !s.is_empty())
    }

    /// Catalog key: `msgid`, prefixed by `msgctxt` and EOT when present.
    pub fn key(&self) -> String {
        match &self.msgctxt {
            Some(ctxt) => format!("{}{}{}", ctxt, CONTEXT_SEPARATOR, self.msgid),
            None => self.msgid.clone(),
        }
    }

    /// The translation to substitute, or the empty string when there is none.
    pub fn translation(&self) -> &str {
        if self.is_translated() {
            &self.msgstr[0]
        } else {
            ""
        }
    }
}

/// Entry counts, as reported before a translation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoStats {
    pub total: usize,
    pub translated: usize,
    pub untranslated: usize,
    pub fuzzy: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoFile {
    /// `Name: value` pairs from the header entry, in order
    pub header: Vec<(String, String)>,
    /// Every entry except the header, obsolete ones included
    pub entries: Vec<PoEntry>,
}

impl PoFile {
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.header
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
    }

    /// The `Language:` header.
    pub fn language(&self) -> Option<&str> {
        self.header_value("Language")
    }

    pub fn live_entries(&self) -> impl Iterator<Item = &PoEntry> {
        self.entries.iter().filter(|entry| !entry.obsolete)
    }

    pub fn stats(&self) -> PoStats {
        let mut stats = PoStats::default();
        for entry in self.live_entries() {
            stats.total += 1;
            if entry.is_translated() {
                stats.translated += 1;
            } else if entry.is_fuzzy() {
                stats.fuzzy += 1;
            } else {
                stats.untranslated += 1;
            }
        }
        stats
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Context,
    Id,
    IdPlural,
    Str(usize),
}

struct Reader<'a> {
    origin: &'a str,
    line: usize,
    entry: PoEntry,
    field: Option<Field>,
    has_msgid: bool,
    has_msgstr: bool,
    file: PoFile,
}

impl<'a> Reader<'a> {
    fn new(origin: &'a str) -> Self {
        Reader {
            origin,
            line: 0,
            entry: PoEntry::default(),
            field: None,
            has_msgid: false,
            has_msgstr: false,
            file: PoFile::default(),
        }
    }

    fn error(&self, message: impl Into<String>) -> CatalogError {
        CatalogError::Po {
            origin: self.origin.to_string(),
            line: self.line,
            message: message.into(),
        }
    }

    fn flush(&mut self) -> CatalogResult<()> {
        if !self.has_msgid {
            self.entry = PoEntry::default();
            self.field = None;
            return Ok(());
        }
        if !self.has_msgstr {
            return Err(CatalogError::Po {
                origin: self.origin.to_string(),
                line: self.entry.line,
                message: format!("entry '{}' has no msgstr", self.entry.msgid),
            });
        }
        let entry = std::mem::take(&mut self.entry);
        if entry.is_header() && !entry.obsolete {
            self.file.header = parse_header(entry.msgstr.first().map_or("", String::as_str));
        } else {
            self.file.entries.push(entry);
        }
        self.field = None;
        self.has_msgid = false;
        self.has_msgstr = false;
        Ok(())
    }

    fn comment(&mut self, line: &str) -> CatalogResult<()> {
        if self.has_msgstr {
            self.flush()?;
        }
        if let Some(flags) = line.strip_prefix("#,") {
            self.entry.flags.extend(
                flags
                    .split(',')
                    .map(str::trim)
                    .filter(|flag| !flag.is_empty())
                    .map(str::to_string),
            );
        } else if let Some(references) = line.strip_prefix("#:") {
            self.entry
                .references
                .extend(references.split_whitespace().map(str::to_string));
        }
        Ok(())
    }

    fn keyword(&mut self, line: &str) -> CatalogResult<()> {
        let (keyword, rest) = line
            .split_once(|c: char| c.is_whitespace())
            .ok_or_else(|| self.error(format!("expected a quoted string after '{}'", line)))?;
        let value = unquote(rest.trim()).map_err(|message| self.error(message))?;

        match keyword {
            "msgctxt" => {
                if self.has_msgstr {
                    self.flush()?;
                }
                self.entry.line = self.line;
                self.entry.msgctxt = Some(value);
                self.field = Some(Field::Context);
            }
            "msgid" => {
                if self.has_msgstr {
                    self.flush()?;
                }
                if self.has_msgid {
                    return Err(self.error("msgid without a preceding msgstr"));
                }
                if self.entry.msgctxt.is_none() {
                    self.entry.line = self.line;
                }
                self.entry.msgid = value;
                self.has_msgid = true;
                self.field = Some(Field::Id);
            }
            "msgid_plural" => {
                if !self.has_msgid || self.has_msgstr {
                    return Err(self.error("msgid_plural must follow msgid"));
                }
                self.entry.msgid_plural = Some(value);
                self.field = Some(Field::IdPlural);
            }
            "msgstr" => {
                if !self.has_msgid {
                    return Err(self.error("msgstr without msgid"));
                }
                self.set_msgstr(0, value);
            }
            other => {
                let index = other
                    .strip_prefix("msgstr[")
                    .and_then(|rest| rest.strip_suffix(']'))
                    .and_then(|n| n.parse::<usize>().ok())
                    .ok_or_else(|| self.error(format!("unknown keyword '{}'", other)))?;
                if !self.has_msgid {
                    return Err(self.error("msgstr without msgid"));
                }
                self.set_msgstr(index, value);
            }
        }
        Ok(())
    }

    fn set_msgstr(&mut self, index: usize, value: String) {
        if self.entry.msgstr.len() <= index {
            self.entry.msgstr.resize(index + 1, String::new());
        }
        self.entry.msgstr[index] = value;
        self.has_msgstr = true;
        self.field = Some(Field::Str(index));
    }

    fn continuation(&mut self, line: &str) -> CatalogResult<()> {
        let value = unquote(line).map_err(|message| self.error(message))?;
        let target = match self.field {
            Some(Field::Context) => self.entry.msgctxt.get_or_insert_with(String::new),
            Some(Field::Id) => &mut self.entry.msgid,
            Some(Field::IdPlural) => self.entry.msgid_plural.get_or_insert_with(String::new),
            Some(Field::Str(index)) => &mut self.entry.msgstr[index],
            None => return Err(self.error("string continuation without a keyword")),
        };
        target.push_str(&value);
        Ok(())
    }

    fn read_line(&mut self, raw: &str) -> CatalogResult<()> {
        let line = raw.trim();
        if line.is_empty() {
            return self.flush();
        }
        if let Some(rest) = line.strip_prefix("#~") {
            let rest = rest.trim_start();
            // `#~|` carries the previous msgid of an obsolete entry
            if rest.is_empty() || rest.starts_with('#') || rest.starts_with('|') {
                return Ok(());
            }
            if rest.starts_with('"') {
                self.continuation(rest)?;
            } else {
                self.keyword(rest)?;
            }
            self.entry.obsolete = true;
            return Ok(());
        }
        if line.starts_with('#') {
            return self.comment(line);
        }
        if line.starts_with('"') {
            return self.continuation(line);
        }
        self.keyword(line)
    }
}

/// Parse a PO file. `origin` names the file in error messages.
pub fn parse(content: &str, origin: &str) -> CatalogResult<PoFile> {
    let mut reader = Reader::new(origin);
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    for (index, line) in content.lines().enumerate() {
        reader.line = index + 1;
        reader.read_line(line)?;
    }
    reader.flush()?;
    Ok(reader.file)
}

fn parse_header(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Strip the quotes of a PO string literal and resolve its escapes.
fn unquote(literal: &str) -> Result<String, String> {
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .filter(|_| literal.len() >= 2)
        .ok_or_else(|| format!("expected a quoted string, found '{}'", literal))?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '"' {
            return Err(format!("unescaped quote in {}", literal));
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('a') => out.push('\u{7}'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some(other) => return Err(format!("invalid escape '\\{}'", other)),
            None => return Err(format!("dangling backslash in {}", literal)),
        }
    }
    Ok(out)
}
