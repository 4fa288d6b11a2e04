//! Key/value documents in the brace-delimited text format used by the
//! Steam client for its own configuration files.
//!
//! A document is an ordered mapping from keys to either a scalar string or a
//! nested document. Rendering keeps insertion order and produces:
//!
//! ```text
//! "users"
//! {
//! 	"76561198000000001"
//! 	{
//! 		"AccountName" "alice"
//! 	}
//! }
//! ```
//!
//! Keys and values are written verbatim between double quotes. There is no
//! escaping, so neither may contain a `"` character.
//!
//! The [`parse`] function reads back exactly this grammar (quoted tokens and
//! braces, nothing else). It exists to verify rendered output and is not a
//! general-purpose reader for the format.

#![deny(missing_docs)]

use indexmap::IndexMap;
use std::fmt;
use thiserror::Error;

/// A value stored under a document key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Quoted string written on the same line as its key.
    Scalar(String),
    /// Nested mapping written as a braced block under its key.
    Nested(Document),
}

impl Value {
    /// Borrow the scalar string, if this is a scalar.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            Value::Nested(_) => None,
        }
    }

    /// Borrow the nested document, if this is a block.
    pub fn as_nested(&self) -> Option<&Document> {
        match self {
            Value::Scalar(_) => None,
            Value::Nested(doc) => Some(doc),
        }
    }
}

/// Ordered key/value document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    entries: IndexMap<String, Value>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a scalar entry (builder style).
    pub fn scalar(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, Value::Scalar(value.into()));
        self
    }

    /// Append a nested block (builder style).
    pub fn nested(mut self, key: impl Into<String>, doc: Document) -> Self {
        self.insert(key, Value::Nested(doc));
        self
    }

    /// Insert a value, keeping the original position if the key already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    /// Look up a value at this level.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Follow a path of nested keys and return the value at the end.
    ///
    /// ```
    /// use cachelogin_vdf::Document;
    ///
    /// let doc = Document::new().nested("a", Document::new().scalar("b", "c"));
    /// assert_eq!(doc.lookup(&["a", "b"]).and_then(|v| v.as_scalar()), Some("c"));
    /// ```
    pub fn lookup(&self, path: &[&str]) -> Option<&Value> {
        let (last, parents) = path.split_last()?;
        let mut current = self;
        for key in parents {
            current = current.get(key)?.as_nested()?;
        }
        current.get(last)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries at this level.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this level has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the document to text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        render_into(&mut out, self, 0);
        out
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn render_into(out: &mut String, doc: &Document, depth: usize) {
    for (key, value) in doc.iter() {
        indent(out, depth);
        out.push('"');
        out.push_str(key);
        out.push('"');

        match value {
            Value::Scalar(s) => {
                out.push_str(" \"");
                out.push_str(s);
                out.push_str("\"\n");
            }
            Value::Nested(nested) => {
                out.push('\n');
                indent(out, depth);
                out.push_str("{\n");
                render_into(out, nested, depth + 1);
                indent(out, depth);
                out.push_str("}\n");
            }
        }
    }
}

/// Errors from [`parse`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A quoted token was opened but never closed.
    #[error("unterminated string starting at byte {0}")]
    UnterminatedString(usize),

    /// A character outside the grammar was found.
    #[error("unexpected character {found:?} at byte {offset}")]
    UnexpectedChar {
        /// Offending character.
        found: char,
        /// Byte offset in the input.
        offset: usize,
    },

    /// A token appeared where it is not allowed.
    #[error("unexpected {found} at byte {offset}")]
    UnexpectedToken {
        /// Token description.
        found: &'static str,
        /// Byte offset in the input.
        offset: usize,
    },

    /// Input ended inside a block or after a key.
    #[error("unexpected end of input")]
    UnexpectedEof,
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Str(&'a str),
    Open,
    Close,
}

impl Token<'_> {
    fn describe(&self) -> &'static str {
        match self {
            Token::Str(_) => "string",
            Token::Open => "'{'",
            Token::Close => "'}'",
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token<'_>)>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices();

    while let Some((offset, c)) = chars.next() {
        match c {
            '{' => tokens.push((offset, Token::Open)),
            '}' => tokens.push((offset, Token::Close)),
            '"' => {
                let start = offset + 1;
                let end = loop {
                    match chars.next() {
                        Some((i, '"')) => break i,
                        Some(_) => {}
                        None => return Err(ParseError::UnterminatedString(offset)),
                    }
                };
                tokens.push((offset, Token::Str(&input[start..end])));
            }
            c if c.is_whitespace() || c == '\u{feff}' => {}
            found => return Err(ParseError::UnexpectedChar { found, offset }),
        }
    }

    Ok(tokens)
}

/// Parse rendered text back into a [`Document`].
pub fn parse(input: &str) -> Result<Document, ParseError> {
    let tokens = tokenize(input)?;
    let mut iter = tokens.into_iter().peekable();
    let doc = parse_block(&mut iter, false)?;
    Ok(doc)
}

fn parse_block<'a, I>(tokens: &mut std::iter::Peekable<I>, nested: bool) -> Result<Document, ParseError>
where
    I: Iterator<Item = (usize, Token<'a>)>,
{
    let mut doc = Document::new();

    loop {
        let key = match tokens.next() {
            Some((_, Token::Str(key))) => key,
            Some((_, Token::Close)) if nested => return Ok(doc),
            Some((offset, token)) => {
                return Err(ParseError::UnexpectedToken {
                    found: token.describe(),
                    offset,
                })
            }
            None if nested => return Err(ParseError::UnexpectedEof),
            None => return Ok(doc),
        };

        match tokens.next() {
            Some((_, Token::Str(value))) => {
                doc.insert(key, Value::Scalar(value.to_string()));
            }
            Some((_, Token::Open)) => {
                let child = parse_block(tokens, true)?;
                doc.insert(key, Value::Nested(child));
            }
            Some((offset, Token::Close)) => {
                return Err(ParseError::UnexpectedToken {
                    found: Token::Close.describe(),
                    offset,
                })
            }
            None => return Err(ParseError::UnexpectedEof),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document::new().nested(
            "InstallConfigStore",
            Document::new().nested(
                "Software",
                Document::new()
                    .scalar("AutoUpdateWindowEnabled", "0")
                    .nested(
                        "Accounts",
                        Document::new().nested("alice", Document::new().scalar("SteamID", "7656")),
                    )
                    .scalar("MTBF", "123456789"),
            ),
        )
    }

    #[test]
    fn test_render_layout() {
        let doc = Document::new().nested(
            "users",
            Document::new().nested("1", Document::new().scalar("AccountName", "alice")),
        );

        let expected = "\"users\"\n{\n\t\"1\"\n\t{\n\t\t\"AccountName\" \"alice\"\n\t}\n}\n";
        assert_eq!(doc.render(), expected);
    }

    #[test]
    fn test_render_keeps_insertion_order() {
        let doc = Document::new().scalar("zeta", "1").scalar("alpha", "2").scalar("mid", "3");
        let rendered = doc.render();
        let zeta = rendered.find("zeta").unwrap();
        let alpha = rendered.find("alpha").unwrap();
        let mid = rendered.find("mid").unwrap();
        assert!(zeta < alpha && alpha < mid);
    }

    #[test]
    fn test_render_then_parse_recovers_structure() {
        let doc = sample();
        let parsed = parse(&doc.render()).unwrap();
        assert_eq!(parsed, doc);
        assert_eq!(
            parsed
                .lookup(&["InstallConfigStore", "Software", "Accounts", "alice", "SteamID"])
                .and_then(Value::as_scalar),
            Some("7656")
        );
    }

    #[test]
    fn test_parse_ignores_whitespace_style() {
        let text = "\"a\" { \"b\"   \"c\"\r\n\"d\"{}}";
        let doc = parse(text).unwrap();
        assert_eq!(doc.lookup(&["a", "b"]).and_then(Value::as_scalar), Some("c"));
        assert!(doc.lookup(&["a", "d"]).and_then(Value::as_nested).unwrap().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("\"a\" {"), Err(ParseError::UnexpectedEof));
        assert_eq!(parse("\"a\""), Err(ParseError::UnexpectedEof));
        assert!(matches!(parse("\"a"), Err(ParseError::UnterminatedString(0))));
        assert!(matches!(
            parse("}"),
            Err(ParseError::UnexpectedToken { offset: 0, .. })
        ));
        assert!(matches!(
            parse("x"),
            Err(ParseError::UnexpectedChar { found: 'x', .. })
        ));
    }

    #[test]
    fn test_empty_document_renders_empty() {
        assert_eq!(Document::new().render(), "");
        assert!(parse("").unwrap().is_empty());
    }
}
