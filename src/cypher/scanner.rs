//! Cypher scanner — turns query text into position-tagged tokens.
//!
//! Every emitted token is kept in a replay log. `unscan()` walks the
//! replay cursor back through that log and the following `scan()` calls
//! re-deliver the same tokens, so the parser can roll back any number of
//! tokens after a failed speculative parse.

use tracing::trace;

use super::token::{self, Pos, Token, TokenKind};

/// Replaying scanner over an in-memory query string.
pub struct Scanner {
    chars: Vec<char>,
    offset: usize,
    line: usize,
    column: usize,
    history: Vec<Token>,
    cursor: usize,
}

impl Scanner {
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            offset: 0,
            line: 0,
            column: 0,
            history: Vec::new(),
            cursor: 0,
        }
    }

    /// Next token, replayed from history when the cursor is behind it.
    /// Once the input is exhausted every call returns `Eof`.
    pub fn scan(&mut self) -> Token {
        let logged = self.history.len();
        let at_eof = self.history.last().is_some_and(|tok| tok.kind == TokenKind::Eof);
        let tok = if at_eof && self.cursor + 1 >= logged {
            self.history[logged - 1].clone()
        } else if self.cursor < logged {
            self.history[self.cursor].clone()
        } else {
            let tok = self.read_token();
            self.history.push(tok.clone());
            tok
        };
        self.cursor += 1;
        tok
    }

    /// Step the replay cursor back by one token and return the token the
    /// next `scan()` will deliver again.
    ///
    /// # Panics
    /// When the cursor is already at the start of history. Callers may only
    /// unscan tokens they have scanned.
    pub fn unscan(&mut self) -> &Token {
        assert!(self.cursor > 0, "unscan past the start of the token history");
        self.cursor -= 1;
        // reads past the end all map onto the single logged EOF
        let tok = &self.history[self.cursor.min(self.history.len() - 1)];
        trace!(kind = %tok.kind, line = tok.pos.line, column = tok.pos.column, "unscan");
        tok
    }

    /// Number of tokens delivered by `scan()` and not taken back.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Every distinct token emitted so far, in order. EOF is logged once no
    /// matter how often it is read.
    pub fn history(&self) -> &[Token] {
        &self.history
    }

    /// Iterator over the remaining tokens, up to and including `Eof`.
    pub fn tokens(&mut self) -> Tokens<'_> {
        Tokens { scanner: self, done: false }
    }

    // ------------------------------------------------------------------------
    // Character cursor
    // ------------------------------------------------------------------------

    fn pos(&self) -> Pos {
        Pos::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.offset).copied()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.chars.get(self.offset + n).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.offset += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut text = String::new();
        while let Some(ch) = self.peek().filter(|&c| pred(c)) {
            text.push(ch);
            self.bump();
        }
        text
    }

    // ------------------------------------------------------------------------
    // Token classification
    // ------------------------------------------------------------------------

    fn read_token(&mut self) -> Token {
        let pos = self.pos();
        let Some(ch) = self.peek() else {
            return Token::new(TokenKind::Eof, pos);
        };

        match ch {
            c if c.is_whitespace() => {
                let run = self.take_while(char::is_whitespace);
                Token::with_text(TokenKind::Ws, pos, run)
            }
            c if c.is_alphabetic() || c == '_' => {
                let ident = self.take_while(|c| c.is_alphanumeric() || c == '_');
                match token::lookup(&ident) {
                    TokenKind::Identifier => Token::with_text(TokenKind::Identifier, pos, ident),
                    keyword => Token::new(keyword, pos),
                }
            }
            c if c.is_ascii_digit() => self.scan_number(pos),
            '"' | '\'' => self.scan_string(pos),
            '/' if self.peek_nth(1) == Some('/') => {
                let comment = self.take_while(|c| c != '\n');
                Token::with_text(TokenKind::Comment, pos, comment)
            }
            '/' if self.peek_nth(1) == Some('*') => self.scan_block_comment(pos),
            _ => self.scan_operator(pos),
        }
    }

    fn scan_number(&mut self, pos: Pos) -> Token {
        let mut text = self.take_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') {
            match self.peek_nth(1) {
                Some(c) if c.is_ascii_digit() => {
                    self.bump();
                    text.push('.');
                    text.push_str(&self.take_while(|c| c.is_ascii_digit()));
                    return Token::with_text(TokenKind::Float, pos, text);
                }
                // `1..3` is a range: leave the dots for the next token
                Some('.') => {}
                _ => {
                    self.bump();
                    text.push('.');
                    return Token::with_text(TokenKind::Illegal, pos, text);
                }
            }
        }
        Token::with_text(TokenKind::Integer, pos, text)
    }

    fn scan_string(&mut self, pos: Pos) -> Token {
        let Some(quote) = self.bump() else {
            return Token::new(TokenKind::Eof, pos);
        };
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => return Token::with_text(TokenKind::BadString, pos, value),
                Some(c) if c == quote => {
                    self.bump();
                    return Token::with_text(TokenKind::StringLiteral, pos, value);
                }
                Some('\\') => {
                    let escape_pos = self.pos();
                    self.bump();
                    match self.bump() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some(c @ ('\\' | '\'' | '"')) => value.push(c),
                        Some(other) => {
                            return Token::with_text(TokenKind::BadEscape, escape_pos, format!("\\{other}"));
                        }
                        None => return Token::with_text(TokenKind::BadString, pos, value),
                    }
                }
                Some(c) => {
                    self.bump();
                    value.push(c);
                }
            }
        }
    }

    fn scan_block_comment(&mut self, pos: Pos) -> Token {
        let mut text = String::new();
        // opening `/*`
        text.extend(self.bump());
        text.extend(self.bump());
        loop {
            match self.bump() {
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    text.push_str("*/");
                    return Token::with_text(TokenKind::Comment, pos, text);
                }
                Some(c) => text.push(c),
                None => return Token::with_text(TokenKind::BadComment, pos, text),
            }
        }
    }

    fn scan_operator(&mut self, pos: Pos) -> Token {
        let Some(ch) = self.bump() else {
            return Token::new(TokenKind::Eof, pos);
        };
        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '|' => TokenKind::Pipe,
            '-' => TokenKind::Dash,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '^' => TokenKind::Caret,
            '=' => TokenKind::Eq,
            '<' => {
                if self.eat('>') {
                    TokenKind::Neq
                } else if self.eat('=') {
                    TokenKind::Lte
                } else {
                    TokenKind::Lt
                }
            }
            '>' => if self.eat('=') { TokenKind::Gte } else { TokenKind::Gt },
            '.' => if self.eat('.') { TokenKind::DotDot } else { TokenKind::Dot },
            '+' => if self.eat('=') { TokenKind::PlusEq } else { TokenKind::Plus },
            other => return Token::with_text(TokenKind::Illegal, pos, other.to_string()),
        };
        Token::new(kind, pos)
    }
}

/// Scan a whole query string, up to and including the first `Eof`.
pub fn tokenize(input: &str) -> Vec<Token> {
    Scanner::new(input).tokens().collect()
}

/// Borrowing token iterator returned by [`Scanner::tokens`].
pub struct Tokens<'a> {
    scanner: &'a mut Scanner,
    done: bool,
}

impl Iterator for Tokens<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.done {
            return None;
        }
        let tok = self.scanner.scan();
        self.done = tok.kind == TokenKind::Eof;
        Some(tok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(input: &str) -> Token {
        Scanner::new(input).scan()
    }

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_scan_single_tokens() {
        let cases = [
            ("something", TokenKind::Identifier, "something"),
            ("desc", TokenKind::Desc, ""),
            ("match", TokenKind::Match, ""),
            ("or", TokenKind::Or, ""),
            ("1233", TokenKind::Integer, "1233"),
            ("3.14", TokenKind::Float, "3.14"),
            ("true", TokenKind::True, ""),
            ("null", TokenKind::Null, ""),
            (r#""Hello, world!""#, TokenKind::StringLiteral, "Hello, world!"),
            (r#""String\nwith\nnewline""#, TokenKind::StringLiteral, "String\nwith\nnewline"),
            (r"'String\n'", TokenKind::StringLiteral, "String\n"),
            ("", TokenKind::Eof, ""),
            ("<>", TokenKind::Neq, ""),
            ("<", TokenKind::Lt, ""),
            ("<=1", TokenKind::Lte, ""),
            (">", TokenKind::Gt, ""),
            (">=", TokenKind::Gte, ""),
            ("..", TokenKind::DotDot, ""),
            ("+", TokenKind::Plus, ""),
            ("+=", TokenKind::PlusEq, ""),
            ("//nice try", TokenKind::Comment, "//nice try"),
            ("/*nice another\n try*/", TokenKind::Comment, "/*nice another\n try*/"),
            ("/", TokenKind::Slash, ""),
            ("  ", TokenKind::Ws, "  "),
            ("[", TokenKind::LBracket, ""),
        ];
        for (input, kind, text) in cases {
            let tok = first(input);
            assert_eq!(tok.kind, kind, "kind for {input:?}");
            assert_eq!(tok.text, text, "text for {input:?}");
        }
    }

    #[test]
    fn test_scan_positions() {
        let tokens = tokenize(r#"MATCH (n:Person) WHERE n.name = "Rafael" RETURN n"#);
        let got: Vec<_> = tokens.iter().map(|t| (t.kind, t.pos.column, t.text.as_str())).collect();
        assert_eq!(got, vec![
            (TokenKind::Match, 0, ""),
            (TokenKind::Ws, 5, " "),
            (TokenKind::LParen, 6, ""),
            (TokenKind::Identifier, 7, "n"),
            (TokenKind::Colon, 8, ""),
            (TokenKind::Identifier, 9, "Person"),
            (TokenKind::RParen, 15, ""),
            (TokenKind::Ws, 16, " "),
            (TokenKind::Where, 17, ""),
            (TokenKind::Ws, 22, " "),
            (TokenKind::Identifier, 23, "n"),
            (TokenKind::Dot, 24, ""),
            (TokenKind::Identifier, 25, "name"),
            (TokenKind::Ws, 29, " "),
            (TokenKind::Eq, 30, ""),
            (TokenKind::Ws, 31, " "),
            (TokenKind::StringLiteral, 32, "Rafael"),
            (TokenKind::Ws, 40, " "),
            (TokenKind::Return, 41, ""),
            (TokenKind::Ws, 47, " "),
            (TokenKind::Identifier, 48, "n"),
            (TokenKind::Eof, 49, ""),
        ]);
        assert!(tokens.iter().all(|t| t.pos.line == 0));
    }

    #[test]
    fn test_positions_across_lines() {
        let tokens = tokenize("MATCH (n)\n  RETURN n");
        let ret = tokens.iter().find(|t| t.kind == TokenKind::Return).unwrap();
        assert_eq!(ret.pos, Pos::new(1, 2));
        let eof = tokens.last().unwrap();
        assert_eq!(eof.pos, Pos::new(1, 10));
    }

    #[test]
    fn test_whitespace_run_is_one_token() {
        let tokens = tokenize("a \n\t b");
        assert_eq!(tokens[1].kind, TokenKind::Ws);
        assert_eq!(tokens[1].text, " \n\t ");
        assert_eq!(tokens[2].pos, Pos::new(1, 2));
    }

    #[test]
    fn test_operator_disambiguation() {
        assert_eq!(kinds("<=1"), vec![TokenKind::Lte, TokenKind::Integer, TokenKind::Eof]);
        assert_eq!(kinds("<>"), vec![TokenKind::Neq, TokenKind::Eof]);
        assert_eq!(kinds("< ="), vec![TokenKind::Lt, TokenKind::Ws, TokenKind::Eq, TokenKind::Eof]);
        assert_eq!(kinds("<-"), vec![TokenKind::Lt, TokenKind::Dash, TokenKind::Eof]);
        assert_eq!(kinds("->"), vec![TokenKind::Dash, TokenKind::Gt, TokenKind::Eof]);
        assert_eq!(kinds("+=+"), vec![TokenKind::PlusEq, TokenKind::Plus, TokenKind::Eof]);
        assert_eq!(kinds("..."), vec![TokenKind::DotDot, TokenKind::Dot, TokenKind::Eof]);
    }

    #[test]
    fn test_range_after_integer() {
        let tokens = tokenize("1..3");
        let got: Vec<_> = tokens.iter().map(|t| (t.kind, t.text.as_str())).collect();
        assert_eq!(got, vec![
            (TokenKind::Integer, "1"),
            (TokenKind::DotDot, ""),
            (TokenKind::Integer, "3"),
            (TokenKind::Eof, ""),
        ]);
    }

    #[test]
    fn test_trailing_dot_is_illegal() {
        let tok = first("12. ");
        assert_eq!(tok.kind, TokenKind::Illegal);
        assert_eq!(tok.text, "12.");
    }

    #[test]
    fn test_mismatched_quotes_are_bad_string() {
        let tok = first(r#""abc'"#);
        assert_eq!(tok.kind, TokenKind::BadString);
        assert_eq!(tok.text, "abc'");
        assert_eq!(tok.pos, Pos::new(0, 0));
    }

    #[test]
    fn test_newline_terminates_string() {
        let tokens = tokenize("'abc\ndef'");
        assert_eq!(tokens[0].kind, TokenKind::BadString);
        assert_eq!(tokens[0].text, "abc");
    }

    #[test]
    fn test_escapes() {
        assert_eq!(first(r#""a\"b""#).text, "a\"b");
        assert_eq!(first(r"'it\'s'").text, "it's");
        assert_eq!(first(r"'back\\slash'").text, "back\\slash");
        assert_eq!(first(r"'tab\there'").text, "tab\there");
    }

    #[test]
    fn test_bad_escape() {
        let tok = first(r"'ab\qc'");
        assert_eq!(tok.kind, TokenKind::BadEscape);
        assert_eq!(tok.text, r"\q");
        assert_eq!(tok.pos, Pos::new(0, 3));
    }

    #[test]
    fn test_unterminated_block_comment() {
        let tok = first("/* never closed");
        assert_eq!(tok.kind, TokenKind::BadComment);
        assert_eq!(tok.text, "/* never closed");
    }

    #[test]
    fn test_line_comment_stops_at_newline() {
        let tokens = tokenize("// note\nMATCH");
        assert_eq!(tokens[0].text, "// note");
        assert_eq!(tokens[1].kind, TokenKind::Ws);
        assert_eq!(tokens[2].kind, TokenKind::Match);
    }

    #[test]
    fn test_illegal_character() {
        let tok = first("$param");
        assert_eq!(tok.kind, TokenKind::Illegal);
        assert_eq!(tok.text, "$");
    }

    #[test]
    fn test_unicode_identifier_columns() {
        let tokens = tokenize("(größe)");
        assert_eq!(tokens[1].text, "größe");
        assert_eq!(tokens[2].kind, TokenKind::RParen);
        assert_eq!(tokens[2].pos.column, 6);
    }

    #[test]
    fn test_eof_is_sticky() {
        let mut s = Scanner::new("n");
        assert_eq!(s.scan().kind, TokenKind::Identifier);
        for _ in 0..3 {
            assert_eq!(s.scan().kind, TokenKind::Eof);
        }
    }

    #[test]
    fn test_unscan_replays_identical_sequence() {
        let input = "MATCH (p :Person) RETURN p";
        let mut s = Scanner::new(input);
        let scanned: Vec<Token> = (0..7).map(|_| s.scan()).collect();

        for _ in 0..4 {
            s.unscan();
        }
        let replayed: Vec<Token> = (0..4).map(|_| s.scan()).collect();
        assert_eq!(replayed, scanned[3..7].to_vec());

        // Fresh reads continue where the history ends
        let rest: Vec<Token> = (0..5).map(|_| s.scan()).collect();
        let expected = tokenize(input);
        assert_eq!(rest, expected[7..12].to_vec());
        assert_eq!(s.history().len(), 12);
    }

    #[test]
    fn test_unscan_returns_replayed_token() {
        let mut s = Scanner::new("a b");
        s.scan();
        s.scan();
        assert_eq!(s.unscan().kind, TokenKind::Ws);
        assert_eq!(s.unscan().text, "a");
        assert_eq!(s.scan().text, "a");
    }

    #[test]
    fn test_unscan_over_eof() {
        let mut s = Scanner::new("x");
        s.scan();
        s.scan();
        s.unscan();
        assert_eq!(s.scan().kind, TokenKind::Eof);
    }

    #[test]
    fn test_iterator_stops_after_eof() {
        let mut s = Scanner::new("a b");
        let kinds: Vec<TokenKind> = s.tokens().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![TokenKind::Identifier, TokenKind::Ws, TokenKind::Identifier, TokenKind::Eof]
        );

        // rewinding resumes iteration from the replay log
        s.unscan();
        s.unscan();
        let replayed: Vec<Token> = s.tokens().collect();
        assert_eq!(replayed.len(), 2);
        assert_eq!(replayed[0].text, "b");
        assert_eq!(replayed[1].kind, TokenKind::Eof);
    }

    #[test]
    fn test_repeated_eof_reads_are_logged_once() {
        let mut s = Scanner::new("n");
        for _ in 0..5 {
            s.scan();
        }
        assert_eq!(s.history().len(), 2);
        assert_eq!(s.cursor(), 5);

        // every EOF read can still be taken back one at a time
        for _ in 0..4 {
            assert_eq!(s.unscan().kind, TokenKind::Eof);
        }
        assert_eq!(s.unscan().text, "n");
        assert_eq!(s.scan().text, "n");
        assert_eq!(s.scan().kind, TokenKind::Eof);
        assert_eq!(s.history().len(), 2);
    }

    #[test]
    #[should_panic(expected = "unscan past the start")]
    fn test_unscan_at_start_panics() {
        let mut s = Scanner::new("MATCH");
        s.unscan();
    }
}
