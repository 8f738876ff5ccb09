//! Token table — lexical categories, source positions, and keyword lookup.

use std::fmt;
use std::sync::LazyLock;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// A scanned token: category, position, and literal text.
///
/// `text` is only populated for categories that carry variable text
/// (identifiers, literals, comments, whitespace and the lexical-error
/// categories). Keywords, operators and punctuation leave it empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, pos: Pos) -> Self {
        Self { kind, pos, text: String::new() }
    }

    pub fn with_text(kind: TokenKind, pos: Pos, text: impl Into<String>) -> Self {
        Self { kind, pos, text: text.into() }
    }

    /// The text used when this token shows up in an error message.
    pub fn render(&self) -> String {
        if self.text.is_empty() {
            self.kind.to_string()
        } else {
            self.text.clone()
        }
    }
}

/// Zero-based line and character position of a token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Renders 1-based, the way positions appear in user-facing messages.
impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, char {}", self.line + 1, self.column + 1)
    }
}

/// Token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Special
    Illegal, Eof, Ws, Comment,

    // Literals
    Identifier, Float, Integer, StringLiteral,
    True, False, Null,

    // Lexical errors surfaced as tokens
    BadString, BadEscape, BadComment,

    // Operators
    Plus, Dash, Star, Slash, Percent, Caret,
    Eq, Neq, Lt, Lte, Gt, Gte,
    PlusEq,     // +=
    Pipe,       // |
    And, Or, Xor, Not,

    // Punctuation
    LParen, RParen, LBrace, RBrace, LBracket, RBracket,
    Comma, Colon, Semicolon, Dot,
    DotDot,     // ..

    // Keywords
    Add, All, As, Asc, Ascending, By, Call, Case, Constraint, Contains,
    Create, Delete, Desc, Descending, Detach, Distinct, Do, Drop, Else,
    End, Ends, Exists, For, In, Is, Limit, Mandatory, Match, Merge, Of,
    On, Optional, Order, Remove, Require, Return, Scalar, Set, Skip,
    Starts, Then, Union, Unique, Unwind, When, Where, With,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Illegal => "ILLEGAL",
            TokenKind::Eof => "EOF",
            TokenKind::Ws => "WS",
            TokenKind::Comment => "COMMENT",

            TokenKind::Identifier => "IDENT",
            TokenKind::Float => "NUMBER",
            TokenKind::Integer => "INTEGER",
            TokenKind::StringLiteral => "STRING",
            TokenKind::True => "TRUE",
            TokenKind::False => "FALSE",
            TokenKind::Null => "NULL",

            TokenKind::BadString => "BADSTRING",
            TokenKind::BadEscape => "BADESCAPE",
            TokenKind::BadComment => "BADCOMMENT",

            TokenKind::Plus => "+",
            TokenKind::Dash => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Caret => "^",
            TokenKind::Eq => "=",
            TokenKind::Neq => "<>",
            TokenKind::Lt => "<",
            TokenKind::Lte => "<=",
            TokenKind::Gt => ">",
            TokenKind::Gte => ">=",
            TokenKind::PlusEq => "+=",
            TokenKind::Pipe => "|",
            TokenKind::And => "AND",
            TokenKind::Or => "OR",
            TokenKind::Xor => "XOR",
            TokenKind::Not => "NOT",

            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::Dot => ".",
            TokenKind::DotDot => "..",

            TokenKind::Add => "ADD",
            TokenKind::All => "ALL",
            TokenKind::As => "AS",
            TokenKind::Asc => "ASC",
            TokenKind::Ascending => "ASCENDING",
            TokenKind::By => "BY",
            TokenKind::Call => "CALL",
            TokenKind::Case => "CASE",
            TokenKind::Constraint => "CONSTRAINT",
            TokenKind::Contains => "CONTAINS",
            TokenKind::Create => "CREATE",
            TokenKind::Delete => "DELETE",
            TokenKind::Desc => "DESC",
            TokenKind::Descending => "DESCENDING",
            TokenKind::Detach => "DETACH",
            TokenKind::Distinct => "DISTINCT",
            TokenKind::Do => "DO",
            TokenKind::Drop => "DROP",
            TokenKind::Else => "ELSE",
            TokenKind::End => "END",
            TokenKind::Ends => "ENDS",
            TokenKind::Exists => "EXISTS",
            TokenKind::For => "FOR",
            TokenKind::In => "IN",
            TokenKind::Is => "IS",
            TokenKind::Limit => "LIMIT",
            TokenKind::Mandatory => "MANDATORY",
            TokenKind::Match => "MATCH",
            TokenKind::Merge => "MERGE",
            TokenKind::Of => "OF",
            TokenKind::On => "ON",
            TokenKind::Optional => "OPTIONAL",
            TokenKind::Order => "ORDER",
            TokenKind::Remove => "REMOVE",
            TokenKind::Require => "REQUIRE",
            TokenKind::Return => "RETURN",
            TokenKind::Scalar => "SCALAR",
            TokenKind::Set => "SET",
            TokenKind::Skip => "SKIP",
            TokenKind::Starts => "STARTS",
            TokenKind::Then => "THEN",
            TokenKind::Union => "UNION",
            TokenKind::Unique => "UNIQUE",
            TokenKind::Unwind => "UNWIND",
            TokenKind::When => "WHEN",
            TokenKind::Where => "WHERE",
            TokenKind::With => "WITH",
        }
    }

    /// Reserved words, including the word operators and `true`/`false`/`null`.
    pub fn is_keyword(self) -> bool {
        KEYWORDS.contains(&self)
    }

    /// Arithmetic, comparison, boolean and pattern operators.
    pub fn is_operator(self) -> bool {
        matches!(
            self,
            TokenKind::Plus
                | TokenKind::Dash
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Percent
                | TokenKind::Caret
                | TokenKind::Eq
                | TokenKind::Neq
                | TokenKind::Lt
                | TokenKind::Lte
                | TokenKind::Gt
                | TokenKind::Gte
                | TokenKind::PlusEq
                | TokenKind::Pipe
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Xor
                | TokenKind::Not
        )
    }

    /// Whitespace and comments, which the parser skips.
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Ws | TokenKind::Comment)
    }

    /// Malformed input reported by the scanner as a token.
    pub fn is_lexical_error(self) -> bool {
        matches!(
            self,
            TokenKind::Illegal | TokenKind::BadString | TokenKind::BadEscape | TokenKind::BadComment
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Keyword table
// ============================================================================

/// Every kind reachable from an identifier. Boolean operators and the
/// `true`/`false`/`null` literals share the keyword space.
const KEYWORDS: &[TokenKind] = &[
    TokenKind::Add, TokenKind::All, TokenKind::As, TokenKind::Asc,
    TokenKind::Ascending, TokenKind::By, TokenKind::Call, TokenKind::Case,
    TokenKind::Constraint, TokenKind::Contains, TokenKind::Create,
    TokenKind::Delete, TokenKind::Desc, TokenKind::Descending,
    TokenKind::Detach, TokenKind::Distinct, TokenKind::Do, TokenKind::Drop,
    TokenKind::Else, TokenKind::End, TokenKind::Ends, TokenKind::Exists,
    TokenKind::For, TokenKind::In, TokenKind::Is, TokenKind::Limit,
    TokenKind::Mandatory, TokenKind::Match, TokenKind::Merge, TokenKind::Of,
    TokenKind::On, TokenKind::Optional, TokenKind::Order, TokenKind::Remove,
    TokenKind::Require, TokenKind::Return, TokenKind::Scalar, TokenKind::Set,
    TokenKind::Skip, TokenKind::Starts, TokenKind::Then, TokenKind::Union,
    TokenKind::Unique, TokenKind::Unwind, TokenKind::When, TokenKind::Where,
    TokenKind::With,
    TokenKind::And, TokenKind::Or, TokenKind::Xor, TokenKind::Not,
    TokenKind::True, TokenKind::False, TokenKind::Null,
];

static KEYWORD_TABLE: LazyLock<HashMap<&'static str, TokenKind>> =
    LazyLock::new(|| KEYWORDS.iter().map(|&kind| (kind.as_str(), kind)).collect());

/// Resolve identifier text to a keyword kind, case-insensitively.
/// Anything outside the keyword set is a plain `Identifier`.
pub fn lookup(ident: &str) -> TokenKind {
    KEYWORD_TABLE
        .get(ident.to_ascii_uppercase().as_str())
        .copied()
        .unwrap_or(TokenKind::Identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_keywords() {
        let cases = [
            ("abc", TokenKind::Identifier),
            ("null", TokenKind::Null),
            ("do", TokenKind::Do),
            ("not", TokenKind::Not),
            ("unique", TokenKind::Unique),
            ("starts", TokenKind::Starts),
            ("ascending", TokenKind::Ascending),
        ];
        for (input, expected) in cases {
            assert_eq!(lookup(input), expected, "lookup({input:?})");
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(lookup("MATCH"), TokenKind::Match);
        assert_eq!(lookup("Match"), TokenKind::Match);
        assert_eq!(lookup("mAtCh"), TokenKind::Match);
        assert_eq!(lookup("TrUe"), TokenKind::True);
    }

    #[test]
    fn test_identifiers_are_not_keywords() {
        assert_eq!(lookup("matches"), TokenKind::Identifier);
        assert_eq!(lookup("Person"), TokenKind::Identifier);
        assert_eq!(lookup("_return"), TokenKind::Identifier);
    }

    #[test]
    fn test_every_keyword_round_trips_through_lookup() {
        for &kind in KEYWORDS {
            assert_eq!(lookup(kind.as_str()), kind);
            assert_eq!(lookup(&kind.as_str().to_lowercase()), kind);
        }
    }

    #[test]
    fn test_classification() {
        assert!(TokenKind::Match.is_keyword());
        assert!(TokenKind::Null.is_keyword());
        assert!(TokenKind::And.is_keyword());
        assert!(!TokenKind::Identifier.is_keyword());
        assert!(!TokenKind::Lte.is_keyword());

        assert!(TokenKind::Lte.is_operator());
        assert!(TokenKind::Neq.is_operator());
        assert!(TokenKind::Pipe.is_operator());
        assert!(TokenKind::Xor.is_operator());
        assert!(!TokenKind::LParen.is_operator());
        assert!(!TokenKind::Return.is_operator());

        assert!(TokenKind::Comment.is_trivia());
        assert!(!TokenKind::BadComment.is_trivia());
        assert!(TokenKind::BadEscape.is_lexical_error());
        assert!(!TokenKind::StringLiteral.is_lexical_error());
    }

    #[test]
    fn test_render_prefers_literal_text() {
        let ident = Token::with_text(TokenKind::Identifier, Pos::default(), "n");
        assert_eq!(ident.render(), "n");
        assert_eq!(Token::new(TokenKind::Lte, Pos::default()).render(), "<=");
        assert_eq!(Token::new(TokenKind::Eof, Pos::default()).render(), "EOF");
    }

    #[test]
    fn test_pos_display_is_one_based() {
        assert_eq!(Pos::new(0, 0).to_string(), "line 1, char 1");
        assert_eq!(Pos::new(2, 9).to_string(), "line 3, char 10");
    }
}
