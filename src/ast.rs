use std::borrow::Cow;
use std::fmt;

/// Role an element plays in a class reference document, derived from its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Class,
    BriefDescription,
    Description,
    Member,
    Method,
    Constructor,
    Operator,
    Signal,
    Constant,
    Annotation,
    ThemeItem,
    Param,
    Return,
    /// Grouping elements such as `<methods>` or `<members>`
    Container,
    Other,
}

impl NodeKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "class" => NodeKind::Class,
            "brief_description" => NodeKind::BriefDescription,
            "description" => NodeKind::Description,
            "member" => NodeKind::Member,
            "method" => NodeKind::Method,
            "constructor" => NodeKind::Constructor,
            "operator" => NodeKind::Operator,
            "signal" => NodeKind::Signal,
            "constant" => NodeKind::Constant,
            "annotation" => NodeKind::Annotation,
            "theme_item" => NodeKind::ThemeItem,
            "param" => NodeKind::Param,
            "return" => NodeKind::Return,
            "members" | "methods" | "constructors" | "operators" | "signals" | "constants"
            | "annotations" | "theme_items" | "tutorials" => NodeKind::Container,
            _ => NodeKind::Other,
        }
    }

    /// Elements that own descriptions and parameters of their own.
    pub fn is_member_like(&self) -> bool {
        matches!(
            self,
            NodeKind::Member
                | NodeKind::Method
                | NodeKind::Constructor
                | NodeKind::Operator
                | NodeKind::Signal
                | NodeKind::Constant
                | NodeKind::Annotation
                | NodeKind::ThemeItem
        )
    }

    /// Callables are identified by name plus parameter types, since they overload.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            NodeKind::Method
                | NodeKind::Constructor
                | NodeKind::Operator
                | NodeKind::Signal
                | NodeKind::Annotation
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    /// Value with entities decoded
    pub value: String,
}

/// Character data as it appeared in the source.
///
/// The raw form is kept so untouched text serializes back byte-for-byte; the
/// decoded form is what keys and catalogs talk about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    raw: String,
}

impl TextNode {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        TextNode { raw: raw.into() }
    }

    /// Build a text node from plain text, escaping markup characters.
    pub fn from_text(text: &str) -> Self {
        TextNode {
            raw: escape_text(text),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Decoded text, with `\r\n` and lone `\r` read as `\n` as XML requires.
    pub fn text(&self) -> Cow<'_, str> {
        if self.raw.contains('\r') {
            let normalized = self.raw.replace("\r\n", "\n").replace('\r', "\n");
            Cow::Owned(unescape(&normalized).into_owned())
        } else {
            unescape(&self.raw)
        }
    }

    pub(crate) fn uses_crlf(&self) -> bool {
        self.raw.contains("\r\n")
    }

    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(Element),
    Text(TextNode),
    /// Comments, processing instructions, CDATA sections and DOCTYPE, verbatim
    Raw(String),
}

impl XmlNode {
    fn write_to(&self, out: &mut String) {
        match self {
            XmlNode::Element(element) => element.write_to(out),
            XmlNode::Text(text) => out.push_str(&text.raw),
            XmlNode::Raw(raw) => out.push_str(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<Attribute>,
    children: Vec<XmlNode>,
    start_tag: String,
    /// `None` for empty-element tags such as `<param ... />`
    end_tag: Option<String>,
}

impl Element {
    pub(crate) fn new(
        name: String,
        attributes: Vec<Attribute>,
        start_tag: String,
        children: Vec<XmlNode>,
        end_tag: Option<String>,
    ) -> Self {
        Element {
            name,
            attributes,
            children,
            start_tag,
            end_tag,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::from_tag(&self.name)
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<XmlNode> {
        &mut self.children
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Text before the first child element, the part that carries prose.
    pub fn leading_text(&self) -> Option<&TextNode> {
        match self.children.first() {
            Some(XmlNode::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub(crate) fn leading_text_mut(&mut self) -> Option<&mut TextNode> {
        match self.children.first_mut() {
            Some(XmlNode::Text(text)) => Some(text),
            _ => None,
        }
    }

    fn write_to(&self, out: &mut String) {
        out.push_str(&self.start_tag);
        for child in &self.children {
            child.write_to(out);
        }
        if let Some(end_tag) = &self.end_tag {
            out.push_str(end_tag);
        }
    }

    /// Same tag, attributes and child shape; text content is not compared.
    pub fn is_isomorphic(&self, other: &Element) -> bool {
        self.name == other.name
            && self.attributes == other.attributes
            && self.end_tag.is_some() == other.end_tag.is_some()
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|pair| match pair {
                    (XmlNode::Element(a), XmlNode::Element(b)) => a.is_isomorphic(b),
                    (XmlNode::Text(_), XmlNode::Text(_)) => true,
                    (XmlNode::Raw(a), XmlNode::Raw(b)) => a == b,
                    _ => false,
                })
    }

    /// Number of elements in this subtree, including this one.
    pub fn element_count(&self) -> usize {
        1 + self
            .child_elements()
            .map(Element::element_count)
            .sum::<usize>()
    }
}

/// A parsed class reference file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    prolog: Vec<XmlNode>,
    root: Element,
    epilog: Vec<XmlNode>,
}

impl Document {
    pub(crate) fn new(prolog: Vec<XmlNode>, root: Element, epilog: Vec<XmlNode>) -> Self {
        Document {
            prolog,
            root,
            epilog,
        }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub(crate) fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        for node in &self.prolog {
            node.write_to(&mut out);
        }
        self.root.write_to(&mut out);
        for node in &self.epilog {
            node.write_to(&mut out);
        }
        out
    }

    pub fn is_isomorphic(&self, other: &Document) -> bool {
        self.prolog == other.prolog
            && self.epilog == other.epilog
            && self.root.is_isomorphic(&other.root)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_xml())
    }
}

/// Escape the characters that cannot appear literally in character data.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Decode predefined entities and numeric character references.
///
/// Unknown or broken references are left as they are.
pub fn unescape(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .and_then(|semi| decode_reference(&tail[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = name
                .strip_prefix("#x")
                .or_else(|| name.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse::<u32>().ok()?
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_normalizes_line_endings() {
        let node = TextNode::from_raw("\r\n\t\tLine one &amp; more.\r\n\t\tLine two.\r\t");
        assert_eq!(node.text(), "\n\t\tLine one & more.\n\t\tLine two.\n\t");
        assert_eq!(node.raw(), "\r\n\t\tLine one &amp; more.\r\n\t\tLine two.\r\t");
        assert!(node.uses_crlf());
        assert!(!TextNode::from_raw("\n\tplain\n").uses_crlf());
    }

    #[test]
    fn test_unescape_predefined_entities() {
        assert_eq!(unescape("a &lt; b &amp;&amp; c &gt; d"), "a < b && c > d");
        assert_eq!(unescape("&quot;hi&apos;"), "\"hi'");
    }

    #[test]
    fn test_unescape_numeric_references() {
        assert_eq!(unescape("&#65;&#x42;&#X43;"), "ABC");
        assert_eq!(unescape("&#x8282;"), "节");
    }

    #[test]
    fn test_unescape_leaves_unknown_references() {
        assert_eq!(unescape("&nbsp; & done"), "&nbsp; & done");
        assert_eq!(unescape("tail &"), "tail &");
    }

    #[test]
    fn test_unescape_borrows_plain_text() {
        assert!(matches!(unescape("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("[code]a < b && c[/code]"), "[code]a &lt; b &amp;&amp; c[/code]");
        assert_eq!(escape_text("\"quoted\""), "\"quoted\"");
    }

    #[test]
    fn test_node_kind_from_tag() {
        assert_eq!(NodeKind::from_tag("class"), NodeKind::Class);
        assert_eq!(NodeKind::from_tag("theme_item"), NodeKind::ThemeItem);
        assert_eq!(NodeKind::from_tag("methods"), NodeKind::Container);
        assert_eq!(NodeKind::from_tag("link"), NodeKind::Other);
        assert!(NodeKind::Signal.is_callable());
        assert!(!NodeKind::Member.is_callable());
        assert!(NodeKind::Constant.is_member_like());
        assert!(!NodeKind::Description.is_member_like());
    }

    #[test]
    fn test_text_node_round_trip() {
        let node = TextNode::from_text("x < y");
        assert_eq!(node.raw(), "x &lt; y");
        assert_eq!(node.text(), "x < y");
        assert!(TextNode::from_raw("\n\t\t").is_blank());
    }
}
