//! Markup tokenizer for template fragments.
//!
//! Covers what component templates contain: elements with quoted, unquoted
//! or bare attributes, text with basic entities, comments and doctypes
//! (skipped), void elements, `/>` self-closing syntax, and raw-text
//! `<script>` / `<style>` bodies that are never entity-decoded.
//!
//! Tag and attribute names are lowercased.

use crate::error::DocumentError;

/// Elements that never have children or an end tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose body is raw text.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    StartTag {
        name: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag(String),
    Text(String),
}

/// Split `markup` into tokens.
pub fn tokenize(markup: &str) -> Result<Vec<Token>, DocumentError> {
    Tokenizer::new(markup).run()
}

struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, message: impl Into<String>) -> DocumentError {
        DocumentError::Malformed {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, DocumentError> {
        while self.pos < self.src.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                let end = rest
                    .find("-->")
                    .ok_or_else(|| self.error("unterminated comment"))?;
                self.pos += end + 3;
            } else if rest.starts_with("<!") {
                let end = rest.find('>').ok_or_else(|| self.error("unterminated declaration"))?;
                self.pos += end + 1;
            } else if rest.starts_with("</") {
                self.end_tag()?;
            } else if rest.starts_with('<')
                && rest[1..].chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            {
                self.start_tag()?;
            } else {
                self.text();
            }
        }
        Ok(self.tokens)
    }

    fn text(&mut self) {
        let start = self.pos;
        // A literal '<' that does not open markup is plain text
        self.bump();
        while let Some(c) = self.peek() {
            if c == '<' {
                let after = &self.rest()[1..];
                if after.starts_with('/')
                    || after.starts_with('!')
                    || after.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                {
                    break;
                }
            }
            self.bump();
        }
        let raw = &self.src[start..self.pos];
        self.push_text(decode_entities(raw));
    }

    fn push_text(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        if let Some(Token::Text(previous)) = self.tokens.last_mut() {
            previous.push_str(&text);
        } else {
            self.tokens.push(Token::Text(text));
        }
    }

    fn name(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
        {
            self.bump();
        }
        self.src[start..self.pos].to_ascii_lowercase()
    }

    fn end_tag(&mut self) -> Result<(), DocumentError> {
        self.pos += 2;
        let name = self.name();
        self.skip_whitespace();
        if self.bump() != Some('>') {
            return Err(self.error(format!("unterminated end tag `{name}`")));
        }
        self.tokens.push(Token::EndTag(name));
        Ok(())
    }

    fn start_tag(&mut self) -> Result<(), DocumentError> {
        self.pos += 1;
        let name = self.name();
        let mut attributes: Vec<(String, String)> = Vec::new();
        let self_closing;

        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.starts_with("/>") {
                self.pos += 2;
                self_closing = true;
                break;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                self_closing = false;
                break;
            }
            if rest.is_empty() {
                return Err(self.error(format!("unterminated start tag `{name}`")));
            }

            let attr_start = self.pos;
            while self
                .peek()
                .is_some_and(|c| !c.is_whitespace() && !matches!(c, '=' | '>' | '/' | '"' | '\''))
            {
                self.bump();
            }
            let attr_name = self.src[attr_start..self.pos].to_ascii_lowercase();
            if attr_name.is_empty() {
                return Err(self.error(format!("invalid attribute in `{name}`")));
            }

            self.skip_whitespace();
            let value = if self.peek() == Some('=') {
                self.bump();
                self.skip_whitespace();
                self.attribute_value()?
            } else {
                String::new()
            };

            // First declaration wins, as in HTML
            if !attributes.iter().any(|(existing, _)| *existing == attr_name) {
                attributes.push((attr_name, value));
            }
        }

        let raw = !self_closing && RAW_TEXT_ELEMENTS.contains(&name.as_str());
        self.tokens.push(Token::StartTag {
            name: name.clone(),
            attributes,
            self_closing,
        });

        if raw {
            self.raw_text(&name)?;
        }
        Ok(())
    }

    fn attribute_value(&mut self) -> Result<String, DocumentError> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let rest = self.rest();
                let end = rest
                    .find(quote)
                    .ok_or_else(|| self.error("unterminated attribute value"))?;
                let value = decode_entities(&rest[..end]);
                self.pos += end + 1;
                Ok(value)
            }
            _ => {
                let start = self.pos;
                while self.peek().is_some_and(|c| !c.is_whitespace() && c != '>') {
                    if self.rest().starts_with("/>") {
                        break;
                    }
                    self.bump();
                }
                Ok(decode_entities(&self.src[start..self.pos]))
            }
        }
    }

    fn raw_text(&mut self, name: &str) -> Result<(), DocumentError> {
        let closing = format!("</{name}");
        let rest = self.rest();
        let end = rest
            .to_ascii_lowercase()
            .find(&closing)
            .ok_or_else(|| self.error(format!("unterminated `{name}` element")))?;
        if end > 0 {
            self.tokens.push(Token::Text(rest[..end].to_string()));
        }
        self.pos += end;
        Ok(())
    }
}

/// Decode the handful of entities templates use in practice.
fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.find(';').filter(|&i| i <= 10) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
            }
            _ if entity.starts_with('#') => entity[1..].parse().ok().and_then(char::from_u32),
            _ => None,
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Escape text content for serialization.
pub(crate) fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Escape an attribute value for double-quoted serialization.
pub(crate) fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub(crate) fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}
