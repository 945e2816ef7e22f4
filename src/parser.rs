use crate::ast::{Attribute, Document, Element, TextNode, XmlNode, unescape};
use crate::error::ParseError;

/// A lossless reader for class reference XML.
///
/// Every byte of the input ends up in the tree: tags keep their original
/// spelling, whitespace between elements is kept as text nodes, and comments,
/// processing instructions, CDATA and DOCTYPE are kept verbatim. Serializing
/// an unmodified tree with [`Document::to_xml`] reproduces the input exactly.
pub struct Parser<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Parser { input, position: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Consumes the current character and advances the position.
    fn consume(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.consume();
        }
    }

    /// 1-based line and column of a byte offset.
    fn location(&self, offset: usize) -> (usize, usize) {
        let before = &self.input[..offset.min(self.input.len())];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rsplit('\n')
            .next()
            .map_or(0, |tail| tail.chars().count())
            + 1;
        (line, column)
    }

    fn eof(&self, context: &'static str) -> ParseError {
        let (line, column) = self.location(self.position);
        ParseError::UnexpectedEof {
            context,
            line,
            column,
        }
    }

    fn malformed(&self, offset: usize, message: impl Into<String>) -> ParseError {
        let (line, column) = self.location(offset);
        ParseError::Malformed {
            message: message.into(),
            line,
            column,
        }
    }

    /// Consume through `terminator` and return everything from the current
    /// position up to and including it.
    fn take_through(
        &mut self,
        terminator: &str,
        context: &'static str,
    ) -> Result<&'a str, ParseError> {
        let start = self.position;
        match self.rest().find(terminator) {
            Some(index) => {
                self.position += index + terminator.len();
                Ok(&self.input[start..self.position])
            }
            None => {
                self.position = self.input.len();
                Err(self.eof(context))
            }
        }
    }

    fn take_doctype(&mut self) -> Result<&'a str, ParseError> {
        let start = self.position;
        let mut depth = 0usize;
        while let Some(c) = self.consume() {
            match c {
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                '>' if depth == 0 => return Ok(&self.input[start..self.position]),
                _ => {}
            }
        }
        Err(self.eof("DOCTYPE declaration"))
    }

    fn parse_name(&mut self) -> Result<&'a str, ParseError> {
        let start = self.position;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, '/' | '>' | '=' | '<' | '"' | '\'') {
                break;
            }
            self.consume();
        }
        if self.position == start {
            return match self.peek() {
                None => Err(self.eof("name")),
                Some(c) => Err(self.malformed(start, format!("expected a name, found '{}'", c))),
            };
        }
        Ok(&self.input[start..self.position])
    }

    fn parse_attribute(&mut self) -> Result<Attribute, ParseError> {
        let name = self.parse_name()?.to_string();
        self.skip_whitespace();
        let eq = self.position;
        if self.consume() != Some('=') {
            return Err(self.malformed(eq, format!("attribute '{}' has no value", name)));
        }
        self.skip_whitespace();
        let quote_at = self.position;
        let quote = match self.consume() {
            Some(q @ ('"' | '\'')) => q,
            Some(_) => {
                return Err(self.malformed(quote_at, format!("unquoted value for '{}'", name)));
            }
            None => return Err(self.eof("attribute value")),
        };
        let start = self.position;
        while let Some(c) = self.peek() {
            if c == quote {
                break;
            }
            if c == '<' {
                return Err(self.malformed(self.position, "'<' in attribute value"));
            }
            self.consume();
        }
        let raw = &self.input[start..self.position];
        if self.consume().is_none() {
            return Err(self.eof("attribute value"));
        }
        Ok(Attribute {
            name,
            value: unescape(raw).into_owned(),
        })
    }

    /// Parses `<name attr="value" ...>` or `<name ... />`.
    ///
    /// Returns the name, the attributes, the raw tag text and whether the tag
    /// closes itself.
    fn parse_start_tag(&mut self) -> Result<(String, Vec<Attribute>, &'a str, bool), ParseError> {
        let start = self.position;
        self.consume(); // '<'
        let name = self.parse_name()?.to_string();
        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            if self.starts_with("/>") {
                self.position += 2;
                return Ok((name, attributes, &self.input[start..self.position], true));
            }
            match self.peek() {
                Some('>') => {
                    self.consume();
                    return Ok((name, attributes, &self.input[start..self.position], false));
                }
                Some(_) => attributes.push(self.parse_attribute()?),
                None => return Err(self.eof("start tag")),
            }
        }
    }

    fn parse_end_tag(&mut self, expected: &str) -> Result<&'a str, ParseError> {
        let start = self.position;
        self.position += 2; // '</'
        let found = self.parse_name()?;
        self.skip_whitespace();
        match self.consume() {
            Some('>') => {}
            Some(_) => return Err(self.malformed(self.position, "expected '>' to close end tag")),
            None => return Err(self.eof("end tag")),
        }
        if found != expected {
            let (line, column) = self.location(start);
            return Err(ParseError::MismatchedTag {
                expected: expected.to_string(),
                found: found.to_string(),
                line,
                column,
            });
        }
        Ok(&self.input[start..self.position])
    }

    fn parse_text(&mut self) -> XmlNode {
        let start = self.position;
        let end = self.rest().find('<').map_or(self.input.len(), |i| start + i);
        self.position = end;
        XmlNode::Text(TextNode::from_raw(&self.input[start..end]))
    }

    /// Comments, processing instructions and DOCTYPE, which may appear
    /// anywhere outside of tags.
    fn parse_markup_declaration(&mut self) -> Result<Option<XmlNode>, ParseError> {
        let raw = if self.starts_with("<!--") {
            self.take_through("-->", "comment")?
        } else if self.starts_with("<![CDATA[") {
            self.take_through("]]>", "CDATA section")?
        } else if self.starts_with("<?") {
            self.take_through("?>", "processing instruction")?
        } else if self.starts_with("<!DOCTYPE") {
            self.take_doctype()?
        } else {
            return Ok(None);
        };
        Ok(Some(XmlNode::Raw(raw.to_string())))
    }

    fn parse_element(&mut self) -> Result<Element, ParseError> {
        let (name, attributes, start_tag, self_closing) = self.parse_start_tag()?;
        let start_tag = start_tag.to_string();
        if self_closing {
            return Ok(Element::new(name, attributes, start_tag, Vec::new(), None));
        }

        let mut children = Vec::new();
        loop {
            if self.position >= self.input.len() {
                return Err(self.eof("element content"));
            }
            if self.starts_with("</") {
                let end_tag = self.parse_end_tag(&name)?.to_string();
                return Ok(Element::new(
                    name,
                    attributes,
                    start_tag,
                    children,
                    Some(end_tag),
                ));
            }
            if let Some(node) = self.parse_markup_declaration()? {
                children.push(node);
            } else if self.peek() == Some('<') {
                children.push(XmlNode::Element(self.parse_element()?));
            } else {
                children.push(self.parse_text());
            }
        }
    }

    /// Whitespace, a byte order mark, or a markup declaration outside the
    /// root element.
    fn parse_misc(&mut self) -> Result<Option<XmlNode>, ParseError> {
        if let Some(node) = self.parse_markup_declaration()? {
            return Ok(Some(node));
        }
        if self.position == 0 && self.starts_with("\u{feff}") {
            self.consume();
            return Ok(Some(XmlNode::Raw("\u{feff}".to_string())));
        }
        let start = self.position;
        self.skip_whitespace();
        if self.position > start {
            return Ok(Some(XmlNode::Text(TextNode::from_raw(
                &self.input[start..self.position],
            ))));
        }
        Ok(None)
    }

    pub fn parse(&mut self) -> Result<Document, ParseError> {
        let mut prolog = Vec::new();
        loop {
            if let Some(node) = self.parse_misc()? {
                prolog.push(node);
                continue;
            }
            match self.peek() {
                Some('<') => break,
                Some(_) => {
                    return Err(self.malformed(self.position, "text before the root element"));
                }
                None => return Err(self.eof("root element")),
            }
        }

        let root = self.parse_element()?;

        let mut epilog = Vec::new();
        while self.position < self.input.len() {
            match self.parse_misc()? {
                Some(node) => epilog.push(node),
                None if self.peek() == Some('<') => {
                    return Err(self.malformed(self.position, "more than one root element"));
                }
                None => {
                    return Err(self.malformed(self.position, "text after the root element"));
                }
            }
        }

        Ok(Document::new(prolog, root, epilog))
    }
}
