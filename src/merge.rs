//! The translation merge engine
//!
//! [`merge`] walks a class reference document in document order, keys every
//! text-bearing node with the catalog's [`KeyScheme`] and substitutes the
//! catalog text where there is one. Nothing else in the tree is touched:
//! tags, attributes, comments and untranslated text come out byte-for-byte.
//!
//! The function is pure. It reads its inputs, builds a fresh tree and a
//! report, and keeps no state between calls, so any number of documents and
//! locales can be merged concurrently.

use serde::Serialize;
use tracing::{debug, warn};

use crate::Catalog;
use crate::ast::{Document, Element, NodeKind, TextNode, XmlNode};
use crate::error::{KeyError, MergeError};
use crate::key::{KeyScheme, MemberRef, Role, TextSite};
use crate::layout::Layout;

/// A text node that kept its source text because the catalog had nothing for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Untranslated {
    pub key: String,
    /// Element path, e.g. `/class[Node2D]/members/member[position]`
    pub location: String,
}

/// A node-level problem that did not stop the merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeWarning {
    pub location: String,
    pub message: String,
}

/// Translation coverage of one merged document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub locale: String,
    pub scheme: KeyScheme,
    pub translated: usize,
    pub untranslated: usize,
    /// Nodes whose key was malformed
    pub skipped: usize,
    pub untranslated_keys: Vec<Untranslated>,
    pub warnings: Vec<MergeWarning>,
}

impl MergeReport {
    pub fn new(locale: &str, scheme: KeyScheme) -> Self {
        MergeReport {
            locale: locale.to_string(),
            scheme,
            translated: 0,
            untranslated: 0,
            skipped: 0,
            untranslated_keys: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Text-bearing nodes seen.
    pub fn total(&self) -> usize {
        self.translated + self.untranslated + self.skipped
    }

    /// Fraction of text-bearing nodes that were translated; 0 for none.
    pub fn coverage(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.translated as f64 / total as f64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub document: Document,
    pub report: MergeReport,
}

/// Merge `catalog` into `source` for `locale`.
///
/// # Errors
///
/// `MergeError::StructuralMismatch` when the tree cannot be keyed: a class
/// without a name, a member outside of a class or without a name, or prose
/// with no enclosing class. No document is produced in that case.
///
/// # Example
///
/// ```
/// use classdoc_i18n::{Catalog, KeyScheme, Parser, merge};
///
/// let source = Parser::new(
///     r#"<class name="Node2D"><members><member name="position">The node's position.</member></members></class>"#,
/// )
/// .parse()
/// .unwrap();
/// let catalog = Catalog::from_pairs(
///     "zh-CN",
///     KeyScheme::Structural,
///     [("Node2D.position.description", "节点的位置。")],
/// )
/// .unwrap();
///
/// let outcome = merge(&source, &catalog, "zh-CN").unwrap();
/// assert!(outcome.document.to_xml().contains("节点的位置。"));
/// assert_eq!(outcome.report.translated, 1);
/// ```
pub fn merge(
    source: &Document,
    catalog: &Catalog,
    locale: &str,
) -> Result<MergeOutcome, MergeError> {
    if !same_locale(locale, catalog.locale()) {
        warn!(
            requested = locale,
            catalog = catalog.locale(),
            origin = catalog.origin(),
            "catalog locale differs from the requested locale"
        );
    }

    let mut document = source.clone();
    let mut merger = Merger {
        catalog,
        report: MergeReport::new(locale, catalog.scheme()),
    };
    merger.visit(document.root_mut(), &Scope::default())?;
    debug_assert!(document.is_isomorphic(source));

    let report = merger.report;
    debug!(
        locale,
        translated = report.translated,
        untranslated = report.untranslated,
        skipped = report.skipped,
        "document merged"
    );
    Ok(MergeOutcome { document, report })
}

fn same_locale(a: &str, b: &str) -> bool {
    a.replace('_', "-").eq_ignore_ascii_case(&b.replace('_', "-"))
}

/// What the ancestors of an element say about its identity.
#[derive(Debug, Clone, Default)]
struct Scope {
    class: Option<String>,
    member: Option<MemberRef>,
    path: String,
}

struct Merger<'c> {
    catalog: &'c Catalog,
    report: MergeReport,
}

impl Merger<'_> {
    fn visit(&mut self, element: &mut Element, parent: &Scope) -> Result<(), MergeError> {
        let kind = element.kind();
        let mut scope = Scope {
            path: format!("{}/{}", parent.path, label(element)),
            ..parent.clone()
        };

        if kind == NodeKind::Class {
            let name = element.attribute("name").ok_or_else(|| {
                mismatch(&scope.path, "class element has no 'name' attribute".to_string())
            })?;
            scope.class = Some(name.to_string());
            scope.member = None;
        } else if kind.is_member_like() {
            if scope.class.is_none() {
                return Err(mismatch(
                    &scope.path,
                    format!("<{}> has no enclosing class", element.name()),
                ));
            }
            scope.member = Some(member_ref(element, kind, &scope.path)?);
        }

        if let Some(role) = text_role(element, kind) {
            self.merge_text(element, &scope, role)?;
        }

        for child in element.children_mut() {
            if let XmlNode::Element(child) = child {
                self.visit(child, &scope)?;
            }
        }
        Ok(())
    }

    fn merge_text(
        &mut self,
        element: &mut Element,
        scope: &Scope,
        role: Role,
    ) -> Result<(), MergeError> {
        let replacement = {
            let Some(text_node) = element.leading_text() else {
                return Ok(());
            };
            if text_node.is_blank() {
                return Ok(());
            }
            let class = scope.class.as_deref().ok_or_else(|| {
                mismatch(
                    &scope.path,
                    format!("<{}> has no enclosing class", element.name()),
                )
            })?;

            let crlf = text_node.uses_crlf();
            let text = text_node.text();
            let site = TextSite {
                class,
                member: scope.member.as_ref(),
                role,
                text: &text,
            };
            match self.catalog.scheme().derive(&site) {
                Err(KeyError::Malformed { key, reason }) => {
                    warn!(location = %scope.path, key = %key, %reason, "skipping node with malformed key");
                    self.report.skipped += 1;
                    self.report.warnings.push(MergeWarning {
                        location: scope.path.clone(),
                        message: format!("malformed key '{}': {}", key, reason),
                    });
                    None
                }
                Ok(key) => match self.catalog.lookup(&key) {
                    Some(translation) => {
                        debug!(location = %scope.path, "translated");
                        self.report.translated += 1;
                        let merged = Layout::of(&text).apply(translation);
                        Some(if crlf {
                            merged.replace('\n', "\r\n")
                        } else {
                            merged
                        })
                    }
                    None => {
                        debug!(location = %scope.path, key = %key, "untranslated");
                        self.report.untranslated += 1;
                        self.report.untranslated_keys.push(Untranslated {
                            key,
                            location: scope.path.clone(),
                        });
                        None
                    }
                },
            }
        };

        if let Some(merged) = replacement {
            if let Some(text_node) = element.leading_text_mut() {
                *text_node = TextNode::from_text(&merged);
            }
        }
        Ok(())
    }
}

fn mismatch(location: &str, reason: String) -> MergeError {
    MergeError::StructuralMismatch {
        location: location.to_string(),
        reason,
    }
}

fn label(element: &Element) -> String {
    match element.attribute("name") {
        Some(name) => format!("{}[{}]", element.name(), name),
        None => element.name().to_string(),
    }
}

fn text_role(element: &Element, kind: NodeKind) -> Option<Role> {
    match kind {
        NodeKind::BriefDescription => Some(Role::Summary),
        NodeKind::Description
        | NodeKind::Member
        | NodeKind::Constant
        | NodeKind::ThemeItem => Some(Role::Description),
        NodeKind::Param => Some(Role::Param(
            element.attribute("index").unwrap_or_default().to_string(),
        )),
        NodeKind::Return => Some(Role::Return),
        _ => None,
    }
}

fn member_ref(element: &Element, kind: NodeKind, location: &str) -> Result<MemberRef, MergeError> {
    let name = element.attribute("name").ok_or_else(|| {
        mismatch(
            location,
            format!("<{}> has no 'name' attribute", element.name()),
        )
    })?;
    let mut member = MemberRef::new(kind, name);
    member.data_type = element.attribute("data_type").map(str::to_string);
    if kind.is_callable() {
        let mut params: Vec<(usize, &str)> = element
            .child_elements()
            .filter(|child| child.kind() == NodeKind::Param)
            .enumerate()
            .map(|(position, param)| {
                let index = param
                    .attribute("index")
                    .and_then(|i| i.trim().parse().ok())
                    .unwrap_or(position);
                (index, param.attribute("type").unwrap_or_default())
            })
            .collect();
        params.sort_by_key(|(index, _)| *index);
        member.param_types = params.into_iter().map(|(_, t)| t.to_string()).collect();
    }
    Ok(member)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Document {
        Parser::new(input).parse().unwrap()
    }

    fn structural(pairs: &[(&str, &str)]) -> Catalog {
        Catalog::from_pairs("zh-CN", KeyScheme::Structural, pairs.iter().copied()).unwrap()
    }

    const POSITION: &str = r#"<class name="Node2D"><members><member name="position" type="Vector2">The node's position.</member></members></class>"#;

    #[test]
    fn test_translates_member_text() {
        let catalog = structural(&[("Node2D.position.description", "节点的位置。")]);
        let outcome = merge(&parse(POSITION), &catalog, "zh-CN").unwrap();
        assert_eq!(
            outcome.document.to_xml(),
            r#"<class name="Node2D"><members><member name="position" type="Vector2">节点的位置。</member></members></class>"#
        );
        assert_eq!(outcome.report.translated, 1);
        assert_eq!(outcome.report.untranslated, 0);
        assert_eq!(outcome.report.coverage(), 1.0);
    }

    #[test]
    fn test_missing_translation_keeps_source() {
        let outcome = merge(&parse(POSITION), &structural(&[]), "zh-CN").unwrap();
        assert_eq!(outcome.document.to_xml(), POSITION);
        assert_eq!(outcome.report.translated, 0);
        assert_eq!(outcome.report.untranslated, 1);
        assert_eq!(
            outcome.report.untranslated_keys,
            vec![Untranslated {
                key: "Node2D.position.description".to_string(),
                location: "/class[Node2D]/members/member[position]".to_string(),
            }]
        );
        assert_eq!(outcome.report.coverage(), 0.0);
    }

    #[test]
    fn test_blank_entry_falls_back_to_source() {
        let source = parse("<class name=\"A\"><members><member name=\"x\">\n\t\tSource prose.\n\t</member></members></class>");
        let blank = structural(&[("A.x.description", "  ")]);
        let absent = structural(&[]);
        let with_blank = merge(&source, &blank, "zh-CN").unwrap();
        let without = merge(&source, &absent, "zh-CN").unwrap();
        assert_eq!(with_blank.document.to_xml(), source.to_xml());
        assert_eq!(with_blank.document, without.document);
        assert_eq!(with_blank.report, without.report);
        assert_eq!(with_blank.report.translated, 0);
    }

    #[test]
    fn test_crlf_source_text_keys() {
        let source = parse(
            "<class name=\"A\">\r\n\t<description>\r\n\t\tLine one.\r\n\t\tLine two.\r\n\t</description>\r\n</class>",
        );
        let missing = merge(&source, &Catalog::new("fr", KeyScheme::SourceText), "fr").unwrap();
        assert_eq!(missing.report.untranslated_keys[0].key, "Line one.\nLine two.");

        let catalog = Catalog::from_pairs(
            "fr",
            KeyScheme::SourceText,
            [("Line one.\nLine two.", "Ligne un.\nLigne deux.")],
        )
        .unwrap();
        let outcome = merge(&source, &catalog, "fr").unwrap();
        assert_eq!(outcome.report.translated, 1);
        assert_eq!(
            outcome.document.to_xml(),
            "<class name=\"A\">\r\n\t<description>\r\n\t\tLigne un.\r\n\t\tLigne deux.\r\n\t</description>\r\n</class>"
        );
        let again = merge(&outcome.document, &catalog, "fr").unwrap();
        assert_eq!(again.document, outcome.document);
    }

    #[test]
    fn test_empty_entry_falls_back_to_source() {
        let empty = structural(&[("Node2D.position.description", "")]);
        let absent = structural(&[]);
        let with_empty = merge(&parse(POSITION), &empty, "zh-CN").unwrap();
        let without = merge(&parse(POSITION), &absent, "zh-CN").unwrap();
        assert_eq!(with_empty.document, without.document);
        assert_eq!(with_empty.report, without.report);
    }

    #[test]
    fn test_class_level_and_member_descriptions() {
        let source = parse(
            "<class name=\"Node2D\">\n\t<brief_description>\n\t\tA 2D game object.\n\t</brief_description>\n\t<methods>\n\t\t<method name=\"rotate\">\n\t\t\t<return type=\"void\" />\n\t\t\t<param index=\"0\" name=\"radians\" type=\"float\" />\n\t\t\t<description>\n\t\t\t\tApplies a rotation.\n\t\t\t</description>\n\t\t</method>\n\t</methods>\n</class>\n",
        );
        let catalog = structural(&[
            ("Node2D.@class.summary", "一个 2D 游戏对象。"),
            ("Node2D.method:rotate(float).description", "应用旋转。"),
        ]);
        let outcome = merge(&source, &catalog, "zh-CN").unwrap();
        assert_eq!(
            outcome.document.to_xml(),
            "<class name=\"Node2D\">\n\t<brief_description>\n\t\t一个 2D 游戏对象。\n\t</brief_description>\n\t<methods>\n\t\t<method name=\"rotate\">\n\t\t\t<return type=\"void\" />\n\t\t\t<param index=\"0\" name=\"radians\" type=\"float\" />\n\t\t\t<description>\n\t\t\t\t应用旋转。\n\t\t\t</description>\n\t\t</method>\n\t</methods>\n</class>\n"
        );
        assert_eq!(outcome.report.translated, 2);
        assert!(outcome.document.is_isomorphic(&source));
    }

    #[test]
    fn test_translation_is_escaped() {
        let catalog = structural(&[("Node2D.position.description", "[code]a < b && c[/code]")]);
        let outcome = merge(&parse(POSITION), &catalog, "zh-CN").unwrap();
        assert!(
            outcome
                .document
                .to_xml()
                .contains("[code]a &lt; b &amp;&amp; c[/code]")
        );
    }

    #[test]
    fn test_source_text_scheme() {
        let source = parse(
            "<class name=\"Node2D\">\n\t<description>\n\t\tA [b]2D[/b] object, see [code]a &lt; b[/code].\n\t</description>\n</class>",
        );
        let catalog = Catalog::from_pairs(
            "fr",
            KeyScheme::SourceText,
            [(
                "A [b]2D[/b] object, see [code]a < b[/code].",
                "Un objet [b]2D[/b], voir [code]a < b[/code].",
            )],
        )
        .unwrap();
        let outcome = merge(&source, &catalog, "fr").unwrap();
        assert_eq!(
            outcome.document.to_xml(),
            "<class name=\"Node2D\">\n\t<description>\n\t\tUn objet [b]2D[/b], voir [code]a &lt; b[/code].\n\t</description>\n</class>"
        );
    }

    #[test]
    fn test_blank_text_is_not_counted() {
        let source = parse("<class name=\"A\"><brief_description>\n\t</brief_description><description></description></class>");
        let outcome = merge(&source, &structural(&[]), "zh-CN").unwrap();
        assert_eq!(outcome.report.total(), 0);
        assert_eq!(outcome.report.coverage(), 0.0);
    }

    #[test]
    fn test_malformed_key_is_skipped_with_warning() {
        let source = parse(
            r#"<class name="Node3D"><members><member name="transform.origin">Origin.</member><member name="basis">Basis.</member></members></class>"#,
        );
        let catalog = structural(&[("Node3D.basis.description", "基。")]);
        let outcome = merge(&source, &catalog, "zh-CN").unwrap();
        assert_eq!(outcome.report.skipped, 1);
        assert_eq!(outcome.report.translated, 1);
        assert_eq!(outcome.report.warnings.len(), 1);
        assert_eq!(
            outcome.report.warnings[0].location,
            "/class[Node3D]/members/member[transform.origin]"
        );
        let xml = outcome.document.to_xml();
        assert!(xml.contains(">Origin.<"));
        assert!(xml.contains(">基。<"));
    }

    #[test]
    fn test_member_without_class_is_structural_mismatch() {
        let source = parse(r#"<members><member name="position">Text.</member></members>"#);
        let err = merge(&source, &structural(&[]), "zh-CN").unwrap_err();
        assert_eq!(
            err,
            MergeError::StructuralMismatch {
                location: "/members/member[position]".to_string(),
                reason: "<member> has no enclosing class".to_string(),
            }
        );
    }

    #[test]
    fn test_unnamed_class_and_member_are_structural_mismatches() {
        let err = merge(&parse("<class><brief_description>x</brief_description></class>"), &structural(&[]), "zh-CN")
            .unwrap_err();
        assert!(matches!(err, MergeError::StructuralMismatch { .. }));

        let err = merge(
            &parse(r#"<class name="A"><methods><method><description>x</description></method></methods></class>"#),
            &structural(&[]),
            "zh-CN",
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "structural mismatch at /class[A]/methods/method: <method> has no 'name' attribute"
        );
    }

    #[test]
    fn test_description_without_class_is_structural_mismatch() {
        let err = merge(&parse("<description>Orphan.</description>"), &structural(&[]), "zh-CN")
            .unwrap_err();
        assert!(matches!(err, MergeError::StructuralMismatch { .. }));

        // Without prose there is nothing to key, so nothing fails.
        let outcome = merge(&parse("<description>  </description>"), &structural(&[]), "zh-CN").unwrap();
        assert_eq!(outcome.report.total(), 0);
    }

    #[test]
    fn test_params_are_keyed_in_index_order() {
        let source = parse(
            r#"<class name="A"><methods><method name="f"><param index="1" name="b" type="int"/><param index="0" name="a" type="String"/><description>Does f.</description></method></methods></class>"#,
        );
        let outcome = merge(&source, &structural(&[]), "zh-CN").unwrap();
        assert_eq!(
            outcome.report.untranslated_keys[0].key,
            "A.method:f(String,int).description"
        );
    }

    #[test]
    fn test_param_and_return_text() {
        let source = parse(
            r#"<class name="A"><methods><method name="f"><return type="int">The count.</return><param index="0" name="a" type="int">How many.</param></method></methods></class>"#,
        );
        let catalog = structural(&[
            ("A.method:f(int).return", "数量。"),
            ("A.method:f(int).param-0", "多少。"),
        ]);
        let outcome = merge(&source, &catalog, "zh-CN").unwrap();
        assert_eq!(outcome.report.translated, 2);
        let xml = outcome.document.to_xml();
        assert!(xml.contains(r#"<return type="int">数量。</return>"#));
        assert!(xml.contains(r#"<param index="0" name="a" type="int">多少。</param>"#));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let catalog = structural(&[("Node2D.position.description", "节点的位置。")]);
        let once = merge(&parse(POSITION), &catalog, "zh-CN").unwrap().document;
        let twice = merge(&once, &catalog, "zh-CN").unwrap().document;
        assert_eq!(once, twice);
    }

    #[test]
    fn test_locale_comparison() {
        assert!(same_locale("zh_CN", "zh-cn"));
        assert!(!same_locale("zh-CN", "zh-TW"));
    }
}
