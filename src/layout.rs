//! Separating prose from the indentation the XML puts around it
//!
//! Class reference files indent descriptions to the depth of their element:
//!
//! ```text
//! <member name="position" type="Vector2">
//!     Position, relative to the node's parent.
//! </member>
//! ```
//!
//! Catalogs only know the prose (`Position, relative to the node's parent.`).
//! [`Layout`] remembers the envelope of a source text so that a translation
//! can be put back in the same place with the same indentation.

/// The whitespace envelope of a text node and the prose inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Leading whitespace up to and including the last newline before the prose
    prefix: String,
    /// Indentation shared by every non-blank prose line
    margin: String,
    /// Trailing whitespace after the prose
    suffix: String,
    body: String,
}

impl Layout {
    pub fn of(text: &str) -> Self {
        let leading = text.len() - text.trim_start().len();
        let prefix_len = text[..leading].rfind('\n').map_or(0, |i| i + 1);
        let prefix = &text[..prefix_len];

        let rest = &text[prefix_len..];
        let core = rest.trim_end();
        let suffix = &rest[core.len()..];

        let margin = common_margin(core);
        let body = core
            .split('\n')
            .map(|line| {
                if line.trim().is_empty() {
                    ""
                } else {
                    &line[margin.len()..]
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        Layout {
            prefix: prefix.to_string(),
            margin: margin.to_string(),
            suffix: suffix.to_string(),
            body,
        }
    }

    /// The prose with the envelope and common indentation removed.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn margin(&self) -> &str {
        &self.margin
    }

    /// Put `translation` into this envelope.
    ///
    /// The translation is first reduced to its own body, then every non-blank
    /// line is indented by the margin.
    pub fn apply(&self, translation: &str) -> String {
        let translated = Layout::of(translation);
        let mut out = String::with_capacity(
            self.prefix.len() + translated.body.len() + self.suffix.len() + 16,
        );
        out.push_str(&self.prefix);
        for (i, line) in translated.body.split('\n').enumerate() {
            if i > 0 {
                out.push('\n');
            }
            if !line.trim().is_empty() {
                out.push_str(&self.margin);
                out.push_str(line);
            }
        }
        out.push_str(&self.suffix);
        out
    }
}

/// Longest run of spaces and tabs that starts every non-blank line.
fn common_margin(text: &str) -> &str {
    let mut margin: Option<&str> = None;
    for line in text.split('\n') {
        if line.trim().is_empty() {
            continue;
        }
        let indent_len = line.len() - line.trim_start_matches([' ', '\t']).len();
        let indent = &line[..indent_len];
        margin = Some(match margin {
            None => indent,
            Some(current) => {
                let shared = current
                    .bytes()
                    .zip(indent.bytes())
                    .take_while(|(a, b)| a == b)
                    .count();
                &current[..shared]
            }
        });
    }
    margin.unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text_has_no_envelope() {
        let layout = Layout::of("The node's position.");
        assert_eq!(layout.body(), "The node's position.");
        assert_eq!(layout.apply("节点的位置。"), "节点的位置。");
    }

    #[test]
    fn test_indented_description() {
        let source = "\n\t\tA 2D game object.\n\t\t[b]Note:[/b] Read this.\n\t";
        let layout = Layout::of(source);
        assert_eq!(layout.body(), "A 2D game object.\n[b]Note:[/b] Read this.");
        assert_eq!(layout.margin(), "\t\t");
        assert_eq!(
            layout.apply("一个 2D 游戏对象。\n[b]注意：[/b]请阅读。"),
            "\n\t\t一个 2D 游戏对象。\n\t\t[b]注意：[/b]请阅读。\n\t"
        );
    }

    #[test]
    fn test_blank_lines_are_not_indented() {
        let source = "\n\t\tFirst paragraph.\n\n\t\tSecond paragraph.\n\t";
        let layout = Layout::of(source);
        assert_eq!(layout.body(), "First paragraph.\n\nSecond paragraph.");
        assert_eq!(layout.apply("Un.\n\nDeux."), "\n\t\tUn.\n\n\t\tDeux.\n\t");
    }

    #[test]
    fn test_code_block_keeps_relative_indentation() {
        let source = "\n\t\tExample:\n\t\t[codeblock]\n\t\tfunc f():\n\t\t\tpass\n\t\t[/codeblock]\n\t";
        let layout = Layout::of(source);
        assert_eq!(
            layout.body(),
            "Example:\n[codeblock]\nfunc f():\n\tpass\n[/codeblock]"
        );
        assert_eq!(layout.apply(layout.body()), source);
    }

    #[test]
    fn test_translation_envelope_is_discarded() {
        let layout = Layout::of("\n\t\tHello.\n\t");
        assert_eq!(layout.apply("\n   Bonjour.  \n"), "\n\t\tBonjour.\n\t");
    }

    #[test]
    fn test_apply_is_stable_on_its_own_output() {
        let source = "\n\t\t\tIndented text.\n\t\t";
        let once = Layout::of(source).apply("  a\nb");
        let twice = Layout::of(&once).apply("  a\nb");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_whitespace_only_text() {
        let layout = Layout::of("\n\t\t");
        assert_eq!(layout.body(), "");
    }
}
