//! Brace-balanced template tokenization and parsing.
//!
//! A template is a `{{name|arg|...}}` invocation. The tokenizer splits a
//! markup string into literal spans and balanced template spans; the parser
//! splits one span into its name and arguments at top-level `|` separators
//! only. Nested template text inside an argument stays opaque: callers that
//! need it re-invoke the tokenizer on that argument.

// Allow dead code - the span-level API (parse_template, Token::text) is for
// direct callers; the batch binary only drives tokenize().
#![allow(dead_code)]

use serde::Serialize;
use thiserror::Error;

/// Errors from parsing a template span directly.
///
/// The tokenizer never surfaces these: it only hands balanced spans to the
/// parser, and unterminated spans degrade to literal text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WikitextError {
    #[error("template span is missing the opening '{{{{' delimiter")]
    MissingOpening,
    #[error("template span is missing the closing '}}}}' delimiter")]
    MissingClosing,
}

/// Parsed template: name plus ordered, whitespace-trimmed arguments.
///
/// `key=value` arguments are kept as single opaque strings. The name is empty
/// when the span interior was empty (`{{}}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    pub name: String,
    pub args: Vec<String>,
}

impl Template {
    /// Re-serialize as `{{name|arg|...}}`. Equivalent to the source span up
    /// to argument whitespace trimming.
    pub fn to_wikitext(&self) -> String {
        let mut out = String::from("{{");
        out.push_str(&self.name);
        for arg in &self.args {
            out.push('|');
            out.push_str(arg);
        }
        out.push_str("}}");
        out
    }
}

/// One span of a tokenized markup string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Template(Template),
}

impl Token {
    /// Source text of this token: literals verbatim, templates re-serialized.
    pub fn text(&self) -> String {
        match self {
            Token::Literal(text) => text.clone(),
            Token::Template(template) => template.to_wikitext(),
        }
    }
}

/// Split markup into literal spans and balanced `{{...}}` template spans.
///
/// An unterminated template span is not emitted as a template; it is kept as
/// trailing literal text. A single malformed span never fails the document.
pub fn tokenize(text: &str) -> Vec<Token> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut literal_start = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'{' || bytes.get(pos + 1) != Some(&b'{') {
            pos += 1;
            continue;
        }
        let Some(end) = balanced_span_end(bytes, pos) else {
            // Unterminated span: leave the rest as literal text.
            break;
        };
        if literal_start < pos {
            tokens.push(Token::Literal(text[literal_start..pos].to_string()));
        }
        tokens.push(Token::Template(template_from_interior(&text[pos + 2..end - 2])));
        pos = end;
        literal_start = end;
    }

    if literal_start < text.len() {
        tokens.push(Token::Literal(text[literal_start..].to_string()));
    }
    tokens
}

/// Parse one template span. Tokenizer-produced spans are guaranteed to be
/// delimited; direct callers get an error for spans that are not.
pub fn parse_template(span: &str) -> Result<Template, WikitextError> {
    let interior = span.strip_prefix("{{").ok_or(WikitextError::MissingOpening)?;
    let interior = interior.strip_suffix("}}").ok_or(WikitextError::MissingClosing)?;
    Ok(template_from_interior(interior))
}

/// End position (exclusive) of the balanced span opening at `start`, where
/// `{{` increments and `}}` decrements the nesting counter. `None` when the
/// input ends before the counter returns to zero.
///
/// Byte-wise scanning is safe here: the compared delimiters are ASCII and
/// UTF-8 continuation bytes never equal them.
fn balanced_span_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut pos = start;
    while pos < bytes.len() {
        if bytes[pos] == b'{' && bytes.get(pos + 1) == Some(&b'{') {
            depth += 1;
            pos += 2;
        } else if bytes[pos] == b'}' && bytes.get(pos + 1) == Some(&b'}') {
            depth -= 1;
            pos += 2;
            if depth == 0 {
                return Some(pos);
            }
        } else {
            pos += 1;
        }
    }
    None
}

fn template_from_interior(interior: &str) -> Template {
    let mut fields = split_top_level(interior).into_iter();
    let name = fields.next().unwrap_or_default();
    Template { name, args: fields.collect() }
}

/// Split a span interior at top-level `|` separators, tracking `{{`/`}}`
/// nesting so pipes inside nested templates stay put. Fields are trimmed.
fn split_top_level(interior: &str) -> Vec<String> {
    let bytes = interior.as_bytes();
    let mut fields = Vec::new();
    let mut field_start = 0;
    let mut depth = 0usize;
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] == b'{' && bytes.get(pos + 1) == Some(&b'{') {
            depth += 1;
            pos += 2;
        } else if bytes[pos] == b'}' && bytes.get(pos + 1) == Some(&b'}') {
            depth = depth.saturating_sub(1);
            pos += 2;
        } else if bytes[pos] == b'|' && depth == 0 {
            fields.push(interior[field_start..pos].trim().to_string());
            pos += 1;
            field_start = pos;
        } else {
            pos += 1;
        }
    }

    fields.push(interior[field_start..].trim().to_string());
    fields
}
