//! Catalog key derivation
//!
//! Every text-bearing node is looked up in a catalog by a key, and that key
//! has to be computed exactly the way the catalog producer computed it. Any
//! drift here does not fail loudly: every lookup simply misses. All of the
//! keying rules therefore live in this module, behind [`KeyScheme::derive`].
//!
//! Two schemes exist:
//!
//! - [`KeyScheme::Structural`]: `<class>.<member>.<role>`, e.g.
//!   `Node2D.position.description`. Used by JSON catalogs.
//! - [`KeyScheme::SourceText`]: the prose itself with its indentation
//!   removed, which is how gettext catalogs extracted from class reference
//!   files are keyed (`msgid`).

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ast::NodeKind;
use crate::error::KeyError;
use crate::layout::Layout;

/// Member slot of a structural key for text that belongs to the class itself.
pub const CLASS_SENTINEL: &str = "@class";

/// Separator between `msgctxt` and `msgid` in gettext keys.
pub const CONTEXT_SEPARATOR: char = '\u{4}';

static STRUCTURAL_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^.\s\p{Cc}]+\.[^.\s\p{Cc}]+\.(summary|description|return|param-[0-9]+)$")
        .expect("structural key grammar is a valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyScheme {
    Structural,
    SourceText,
}

/// What a piece of text documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Summary,
    Description,
    /// Carries the raw `index` attribute of the parameter
    Param(String),
    Return,
}

impl Role {
    pub fn tag(&self) -> String {
        match self {
            Role::Summary => "summary".to_string(),
            Role::Description => "description".to_string(),
            Role::Param(index) => format!("param-{}", index.trim()),
            Role::Return => "return".to_string(),
        }
    }
}

/// Identity of the member that owns a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub kind: NodeKind,
    pub name: String,
    /// `data_type` of a theme item
    pub data_type: Option<String>,
    /// Parameter types of a callable, in `index` order
    pub param_types: Vec<String>,
}

impl MemberRef {
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        MemberRef {
            kind,
            name: name.into(),
            data_type: None,
            param_types: Vec::new(),
        }
    }

    /// Normalized identifier used in the member slot of a structural key.
    ///
    /// Properties are bare names; every other kind is prefixed, and callables
    /// carry their parameter types because they overload.
    pub fn signature(&self) -> String {
        let name = normalize_identifier(&self.name);
        match self.kind {
            NodeKind::Member => name,
            NodeKind::Constant => format!("constant:{}", name),
            NodeKind::ThemeItem => match &self.data_type {
                Some(data_type) => {
                    format!("theme_item:{}/{}", normalize_identifier(data_type), name)
                }
                None => format!("theme_item:{}", name),
            },
            kind => {
                let params = self
                    .param_types
                    .iter()
                    .map(|t| normalize_identifier(t))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}:{}({})", callable_prefix(kind), name, params)
            }
        }
    }
}

fn callable_prefix(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Method => "method",
        NodeKind::Constructor => "constructor",
        NodeKind::Operator => "operator",
        NodeKind::Signal => "signal",
        NodeKind::Annotation => "annotation",
        _ => "member",
    }
}

/// Everything key derivation may look at for one text node.
#[derive(Debug, Clone)]
pub struct TextSite<'a> {
    pub class: &'a str,
    /// `None` for class-level text
    pub member: Option<&'a MemberRef>,
    pub role: Role,
    /// Decoded source text, envelope included
    pub text: &'a str,
}

/// Trim and collapse whitespace runs into `_`; case is preserved.
pub fn normalize_identifier(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join("_")
}

impl KeyScheme {
    pub fn name(&self) -> &'static str {
        match self {
            KeyScheme::Structural => "structural",
            KeyScheme::SourceText => "source-text",
        }
    }

    /// Compute the catalog key of a text node.
    ///
    /// # Errors
    ///
    /// `KeyError::Malformed` when the result does not follow the scheme's
    /// grammar. The caller is expected to skip the node, not to give up on
    /// the document.
    pub fn derive(&self, site: &TextSite<'_>) -> Result<String, KeyError> {
        match self {
            KeyScheme::Structural => derive_structural(site),
            KeyScheme::SourceText => derive_source_text(site),
        }
    }
}

fn derive_structural(site: &TextSite<'_>) -> Result<String, KeyError> {
    let member = match site.member {
        Some(member) => member.signature(),
        None => CLASS_SENTINEL.to_string(),
    };
    let key = format!(
        "{}.{}.{}",
        normalize_identifier(site.class),
        member,
        site.role.tag()
    );
    if STRUCTURAL_KEY.is_match(&key) {
        return Ok(key);
    }

    let segments: Vec<&str> = key.split('.').collect();
    let reason = if segments.len() != 3 {
        format!("expected 3 '.'-separated segments, found {}", segments.len())
    } else if segments.iter().any(|s| s.is_empty()) {
        "empty segment".to_string()
    } else if segments[..2]
        .iter()
        .any(|s| s.chars().any(|c| c.is_whitespace() || c.is_control()))
    {
        "control character in identifier".to_string()
    } else {
        format!("unknown role '{}'", segments[2])
    };
    Err(KeyError::Malformed { key, reason })
}

fn derive_source_text(site: &TextSite<'_>) -> Result<String, KeyError> {
    let key = Layout::of(site.text).body().to_string();
    if key.is_empty() {
        return Err(KeyError::Malformed {
            key,
            reason: "no prose to key on".to_string(),
        });
    }
    if key.contains(CONTEXT_SEPARATOR) {
        return Err(KeyError::Malformed {
            key,
            reason: "contains the gettext context separator".to_string(),
        });
    }
    Ok(key)
}

impl fmt::Display for KeyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for KeyScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "structural" => Ok(KeyScheme::Structural),
            "source-text" | "gettext" => Ok(KeyScheme::SourceText),
            other => Err(format!(
                "unknown key scheme '{}' (expected 'structural' or 'source-text')",
                other
            )),
        }
    }
}
