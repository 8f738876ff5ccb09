//! Parse errors.

use super::token::{Pos, Token, TokenKind};

/// The first grammar error hit while parsing. Parsing stops there.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} at {pos}", summary(.message, .found, .expected))]
pub struct ParseError {
    /// Text of the offending token.
    pub found: String,
    /// Human-readable alternatives that would have been accepted.
    pub expected: Vec<String>,
    pub pos: Pos,
    /// Replaces the found/expected summary when set.
    pub message: Option<String>,
}

impl ParseError {
    pub fn new(found: impl Into<String>, expected: &[&str], pos: Pos) -> Self {
        Self {
            found: found.into(),
            expected: expected.iter().map(|s| s.to_string()).collect(),
            pos,
            message: None,
        }
    }

    /// Error for `tok` appearing where one of `expected` should be.
    /// Lexical-error tokens carry a message describing the fault.
    pub fn unexpected(tok: &Token, expected: &[&str]) -> Self {
        let mut err = Self::new(tok.render(), expected, tok.pos);
        err.message = lexical_fault(tok);
        err
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

fn lexical_fault(tok: &Token) -> Option<String> {
    match tok.kind {
        TokenKind::BadString => Some("unterminated string literal".into()),
        TokenKind::BadEscape => Some(format!("invalid escape sequence {}", tok.text)),
        TokenKind::BadComment => Some("unterminated block comment".into()),
        TokenKind::Illegal => Some(format!("illegal token {}", tok.text)),
        _ => None,
    }
}

/// The message if one is set, otherwise "found X, expected A, B".
fn summary(message: &Option<String>, found: &str, expected: &[String]) -> String {
    match message {
        Some(message) => message.clone(),
        None => format!("found {found}, expected {}", expected.join(", ")),
    }
}
