//! Cypher recursive descent parser.
//!
//! One function per grammar rule. Rules that may not apply at the current
//! position return `Ok(None)` and leave the token stream exactly where they
//! found it; rules that commit and then fail return a [`ParseError`].
//! Supports:
//! - [OPTIONAL] MATCH with comma-separated patterns and `p = ...` path variables
//! - Node and edge patterns, labels, relationship types, hop ranges, property maps
//! - Redundant parentheses around a pattern, e.g. `MATCH ((p))`
//! - WHERE, RETURN [DISTINCT], AS, ORDER BY, SKIP, LIMIT
//! - Expressions with precedence climbing

use hashbrown::HashSet;
use tracing::{debug, trace};

use super::ast::*;
use super::error::ParseError;
use super::scanner::Scanner;
use super::token::{Token, TokenKind};
use crate::config::{MultiStatement, ParserConfig};

pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Parser state — wraps a replaying scanner.
pub struct Parser {
    scanner: Scanner,
    config: ParserConfig,
    /// Variables bound by patterns in the statement being parsed.
    bound: HashSet<String>,
    depth: usize,
}

impl Parser {
    pub fn new(input: &str) -> Self {
        Self::with_config(input, ParserConfig::default())
    }

    pub fn with_config(input: &str, config: ParserConfig) -> Self {
        Self {
            scanner: Scanner::new(input),
            config,
            bound: HashSet::new(),
            depth: 0,
        }
    }

    /// Parse the whole input into a [`Query`].
    pub fn parse_query(&mut self) -> ParseResult<Query> {
        parse_statements(self).inspect_err(|err| {
            debug!(
                line = err.pos.line,
                column = err.pos.column,
                expected = ?err.expected,
                "query rejected: {err}"
            );
        })
    }

    /// Next token, including whitespace and comments.
    pub fn scan(&mut self) -> Token {
        self.scanner.scan()
    }

    /// Next token that is not whitespace or a comment.
    pub fn scan_ignore_whitespace(&mut self) -> Token {
        loop {
            let tok = self.scan();
            if !tok.kind.is_trivia() {
                return tok;
            }
        }
    }

    /// Push back the last significant token, along with any whitespace or
    /// comments scanned in front of it.
    pub fn unscan(&mut self) {
        while self.scanner.unscan().kind.is_trivia() {}
    }

    /// Replay position, for [`Parser::rewind`].
    fn mark(&self) -> usize {
        self.scanner.cursor()
    }

    /// Hand back every token scanned since `mark`.
    fn rewind(&mut self, mark: usize) {
        while self.scanner.cursor() > mark {
            self.scanner.unscan();
        }
        trace!(mark, "rewound token stream");
    }

    fn peek(&mut self) -> Token {
        let tok = self.scan_ignore_whitespace();
        self.unscan();
        tok
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        self.eat_token(kind).is_some()
    }

    fn eat_token(&mut self, kind: TokenKind) -> Option<Token> {
        let tok = self.scan_ignore_whitespace();
        if tok.kind == kind {
            Some(tok)
        } else {
            self.unscan();
            None
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &[&str]) -> ParseResult<Token> {
        let tok = self.scan_ignore_whitespace();
        if tok.kind == kind {
            Ok(tok)
        } else {
            Err(ParseError::unexpected(&tok, expected))
        }
    }

    /// Error naming the next token, without consuming it.
    fn error_here(&mut self, expected: &[&str]) -> ParseError {
        let tok = self.peek();
        ParseError::unexpected(&tok, expected)
    }

    fn bind(&mut self, variable: &Option<String>) {
        if let Some(name) = variable {
            self.bound.insert(name.clone());
        }
    }
}

/// Parse a complete query string.
pub fn parse_query(input: &str) -> ParseResult<Query> {
    Parser::new(input).parse_query()
}

// ============================================================================
// Statement parsers
// ============================================================================

fn parse_statements(p: &mut Parser) -> ParseResult<Query> {
    let mut root: Option<SingleQuery> = None;
    let mut separated = false;

    loop {
        let tok = p.scan_ignore_whitespace();
        match tok.kind {
            TokenKind::Eof => {
                return match root {
                    Some(root) => Ok(Query { root }),
                    None => Err(ParseError::unexpected(&tok, &["MATCH", "OPTIONAL", "RETURN"])),
                };
            }
            TokenKind::Semicolon => separated = true,
            _ => {
                if root.is_some() && p.config.multi_statement == MultiStatement::Reject {
                    let err = ParseError::unexpected(&tok, &[";", "EOF"]);
                    return Err(if separated {
                        err.with_message("multiple statements are not supported")
                    } else {
                        err
                    });
                }
                p.unscan();
                root = Some(parse_single_query(p)?);
                separated = false;
            }
        }
    }
}

/// Keywords that open clauses this parser recognizes but does not implement.
fn unsupported_clause(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Create
            | TokenKind::Merge
            | TokenKind::Delete
            | TokenKind::Detach
            | TokenKind::Set
            | TokenKind::Remove
            | TokenKind::With
            | TokenKind::Unwind
            | TokenKind::Union
            | TokenKind::Call
    )
}

pub fn parse_single_query(p: &mut Parser) -> ParseResult<SingleQuery> {
    p.bound.clear();
    let mut query = SingleQuery::default();

    // MATCH / OPTIONAL MATCH clauses
    loop {
        let tok = p.peek();
        if tok.kind != TokenKind::Match && tok.kind != TokenKind::Optional {
            break;
        }
        query.reading.push(parse_reading_clause(p)?);
    }

    // RETURN is obligatory
    let tok = p.scan_ignore_whitespace();
    if tok.kind != TokenKind::Return {
        let err = ParseError::unexpected(&tok, &["RETURN"]);
        return Err(if unsupported_clause(tok.kind) {
            err.with_message(format!("{} clauses are not supported", tok.kind))
        } else {
            err
        });
    }

    query.distinct = p.eat(TokenKind::Distinct);
    query.items = parse_return_items(p)?;

    // ORDER BY
    if p.eat(TokenKind::Order) {
        p.expect(TokenKind::By, &["BY"])?;
        query.order_by = parse_order_by(p)?;
    }

    // SKIP
    if p.eat(TokenKind::Skip) {
        query.skip = Some(expect_expression(p)?);
    }

    // LIMIT
    if p.eat(TokenKind::Limit) {
        query.limit = Some(expect_expression(p)?);
    }

    Ok(query)
}

pub fn parse_reading_clause(p: &mut Parser) -> ParseResult<ReadingClause> {
    let optional = p.eat(TokenKind::Optional);
    p.expect(TokenKind::Match, &["MATCH"])?;

    let mut patterns = vec![parse_match_pattern(p)?];
    while p.eat(TokenKind::Comma) {
        patterns.push(parse_match_pattern(p)?);
    }

    let where_clause = if p.eat(TokenKind::Where) {
        Some(expect_expression(p)?)
    } else {
        None
    };

    Ok(ReadingClause { optional, patterns, where_clause })
}

// ============================================================================
// Pattern parsing
// ============================================================================

pub fn parse_match_pattern(p: &mut Parser) -> ParseResult<MatchPattern> {
    // `ident =` binds the whole path; anything else is pushed back
    let mark = p.mark();
    let mut variable = None;
    let tok = p.scan_ignore_whitespace();
    if tok.kind == TokenKind::Identifier {
        if p.scan_ignore_whitespace().kind == TokenKind::Eq {
            variable = Some(tok.text);
        } else {
            p.unscan();
            p.unscan();
        }
    } else {
        p.unscan();
    }

    let result = match parse_pattern_elements(p) {
        Ok(Some(elements)) => {
            p.bind(&variable);
            return Ok(MatchPattern { variable, elements });
        }
        Ok(None) => {
            let found = p.peek();
            Err(ParseError::unexpected(&found, &["("]))
        }
        Err(err) => Err(err),
    };
    if variable.is_some() {
        // hand `ident =` and whatever followed back to the caller
        p.rewind(mark);
    }
    result
}

/// Node (edge node)*, possibly wrapped in redundant parentheses.
/// `Ok(None)` when the input does not start with `(`.
pub fn parse_pattern_elements(p: &mut Parser) -> ParseResult<Option<Vec<PatternElement>>> {
    let mut wrappers = 0usize;
    let first = loop {
        if let Some(node) = parse_node_pattern(p)? {
            break node;
        }
        let tok = p.scan_ignore_whitespace();
        if tok.kind == TokenKind::LParen {
            wrappers += 1;
            trace!(wrappers, "absorbed parenthesis around pattern");
        } else if wrappers == 0 {
            p.unscan();
            return Ok(None);
        } else {
            return Err(ParseError::unexpected(&tok, &["("]));
        }
    };

    let mut elements = vec![PatternElement::Node(first)];
    while let Some(edge) = parse_edge_pattern(p)? {
        elements.push(PatternElement::Edge(edge));
        match parse_node_pattern(p)? {
            Some(node) => elements.push(PatternElement::Node(node)),
            None => return Err(p.error_here(&["node pattern"])),
        }
    }

    for _ in 0..wrappers {
        p.expect(TokenKind::RParen, &[")"])?;
    }

    Ok(Some(elements))
}

/// `(var :Label ... {props})`. Declines when there is no `(`, or when the
/// `(` is not followed by anything that makes it a node.
pub fn parse_node_pattern(p: &mut Parser) -> ParseResult<Option<NodePattern>> {
    if !p.eat(TokenKind::LParen) {
        return Ok(None);
    }

    let mut node = NodePattern::default();
    let mut has_body = false;

    // Optional variable
    let tok = p.scan_ignore_whitespace();
    if tok.kind == TokenKind::Identifier {
        node.variable = Some(tok.text);
        has_body = true;
    } else {
        p.unscan();
    }

    // Labels: :Label1 :Label2
    while p.eat(TokenKind::Colon) {
        let tok = p.scan_ignore_whitespace();
        if tok.kind != TokenKind::Identifier {
            return Err(ParseError::unexpected(&tok, &["Label Identifier"]));
        }
        node.labels.push(tok.text);
        has_body = true;
    }

    // Properties: {key: value, ...}
    if let Some(properties) = parse_properties(p)? {
        node.properties = properties;
        has_body = true;
    }

    let tok = p.scan_ignore_whitespace();
    if tok.kind == TokenKind::RParen {
        p.bind(&node.variable);
        return Ok(Some(node));
    }
    if has_body {
        return Err(ParseError::unexpected(&tok, &[")"]));
    }

    // Not a node: give back the terminator and the `(`
    p.unscan();
    p.unscan();
    trace!(line = tok.pos.line, column = tok.pos.column, "no node pattern here");
    Ok(None)
}

/// `-[...]-`, `-[...]->`, `<-[...]-` or `<-[...]->`; the bracket is optional.
pub fn parse_edge_pattern(p: &mut Parser) -> ParseResult<Option<EdgePattern>> {
    let tok = p.scan_ignore_whitespace();
    let left_arrow = match tok.kind {
        TokenKind::Dash => false,
        TokenKind::Lt => {
            if p.scan_ignore_whitespace().kind != TokenKind::Dash {
                p.unscan();
                p.unscan();
                return Ok(None);
            }
            true
        }
        _ => {
            p.unscan();
            return Ok(None);
        }
    };

    let mut edge = EdgePattern::default();
    if p.eat(TokenKind::LBracket) {
        parse_edge_detail(p, &mut edge)?;
        p.expect(TokenKind::RBracket, &["]"])?;
        p.expect(TokenKind::Dash, &["-"])?;
    } else {
        p.expect(TokenKind::Dash, &["[", "-"])?;
    }
    let right_arrow = p.eat(TokenKind::Gt);

    edge.direction = match (left_arrow, right_arrow) {
        (false, false) => EdgeDirection::Undirected,
        (false, true) => EdgeDirection::Right,
        (true, false) => EdgeDirection::Left,
        (true, true) => EdgeDirection::Both,
    };
    p.bind(&edge.variable);

    Ok(Some(edge))
}

fn parse_edge_detail(p: &mut Parser, edge: &mut EdgePattern) -> ParseResult<()> {
    // Optional variable
    let tok = p.scan_ignore_whitespace();
    if tok.kind == TokenKind::Identifier {
        edge.variable = Some(tok.text);
    } else {
        p.unscan();
    }

    // Rel types: :TYPE1|TYPE2 or :TYPE1|:TYPE2
    if p.eat(TokenKind::Colon) {
        edge.rel_types.push(p.expect(TokenKind::Identifier, &["Relationship Type"])?.text);
        while p.eat(TokenKind::Pipe) {
            p.eat(TokenKind::Colon);
            edge.rel_types.push(p.expect(TokenKind::Identifier, &["Relationship Type"])?.text);
        }
    }

    // Variable length: *min..max
    if p.eat(TokenKind::Star) {
        let min = parse_hop_bound(p)?;
        let hops = if p.eat(TokenKind::DotDot) {
            HopRange { min, max: parse_hop_bound(p)? }
        } else {
            HopRange { min, max: min }
        };
        edge.hops = Some(hops);
    }

    if let Some(properties) = parse_properties(p)? {
        edge.properties = properties;
    }

    Ok(())
}

fn parse_hop_bound(p: &mut Parser) -> ParseResult<Option<u32>> {
    let tok = p.scan_ignore_whitespace();
    if tok.kind != TokenKind::Integer {
        p.unscan();
        return Ok(None);
    }
    tok.text.parse::<u32>().map(Some).map_err(|_| {
        ParseError::unexpected(&tok, &["hop count"])
            .with_message(format!("hop count {} out of range", tok.text))
    })
}

/// `{key: expr, ...}`. Declines when there is no `{`.
pub fn parse_properties(p: &mut Parser) -> ParseResult<Option<PropertyMap>> {
    Ok(parse_property_map(p)?.map(|(map, _)| map))
}

/// Property map plus the height of its tallest value.
fn parse_property_map(p: &mut Parser) -> ParseResult<Option<(PropertyMap, usize)>> {
    if !p.eat(TokenKind::LBrace) {
        return Ok(None);
    }

    let mut map = PropertyMap::new();
    let mut tallest = 0;
    if p.eat(TokenKind::RBrace) {
        return Ok(Some((map, tallest)));
    }

    loop {
        let key = p.expect(TokenKind::Identifier, &["property key"])?;
        if map.contains_key(&key.text) {
            return Err(ParseError::unexpected(&key, &["property key"])
                .with_message(format!("duplicate property key {}", key.text)));
        }
        p.expect(TokenKind::Colon, &[":"])?;
        let value = expect_operand(p)?;
        tallest = tallest.max(value.height);
        map.insert(key.text, value.expr);

        if !p.eat(TokenKind::Comma) {
            p.expect(TokenKind::RBrace, &[",", "}"])?;
            return Ok(Some((map, tallest)));
        }
    }
}

// ============================================================================
// RETURN / ORDER BY
// ============================================================================

pub fn parse_return_items(p: &mut Parser) -> ParseResult<Vec<ReturnItem>> {
    if p.eat(TokenKind::Star) {
        return Ok(vec![ReturnItem::new(Expr::Star)]);
    }

    let Some(first) = parse_return_item(p)? else {
        return Ok(Vec::new());
    };
    let mut items = vec![first];
    while p.eat(TokenKind::Comma) {
        match parse_return_item(p)? {
            Some(item) => items.push(item),
            None => return Err(p.error_here(&["expression"])),
        }
    }
    Ok(items)
}

fn parse_return_item(p: &mut Parser) -> ParseResult<Option<ReturnItem>> {
    let Some(expr) = parse_expression(p)? else {
        return Ok(None);
    };
    let alias = if p.eat(TokenKind::As) {
        Some(p.expect(TokenKind::Identifier, &["identifier"])?.text)
    } else {
        None
    };
    Ok(Some(ReturnItem { expr, alias }))
}

fn parse_order_by(p: &mut Parser) -> ParseResult<Vec<OrderBy>> {
    let mut items = vec![parse_sort_item(p)?];
    while p.eat(TokenKind::Comma) {
        items.push(parse_sort_item(p)?);
    }
    Ok(items)
}

fn parse_sort_item(p: &mut Parser) -> ParseResult<OrderBy> {
    let expr = expect_expression(p)?;
    let direction = match p.scan_ignore_whitespace().kind {
        TokenKind::Desc | TokenKind::Descending => SortDirection::Descending,
        TokenKind::Asc | TokenKind::Ascending => SortDirection::Ascending,
        _ => {
            p.unscan();
            SortDirection::Ascending
        }
    };
    Ok(OrderBy { direction, expr })
}

// ============================================================================
// Expression parsing (precedence climbing)
// ============================================================================

fn starts_expression(kind: TokenKind) -> bool {
    kind.is_lexical_error()
        || matches!(
            kind,
            TokenKind::Identifier
                | TokenKind::Integer
                | TokenKind::Float
                | TokenKind::StringLiteral
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::LBrace
                | TokenKind::Dash
                | TokenKind::Not
                | TokenKind::Case
                | TokenKind::Exists
        )
}

/// An expression, or `Ok(None)` if the next token cannot start one.
pub fn parse_expression(p: &mut Parser) -> ParseResult<Option<Expr>> {
    if !starts_expression(p.peek().kind) {
        return Ok(None);
    }
    parse_expr(p).map(|operand| Some(operand.expr))
}

fn expect_expression(p: &mut Parser) -> ParseResult<Expr> {
    expect_operand(p).map(|operand| operand.expr)
}

fn expect_operand(p: &mut Parser) -> ParseResult<Operand> {
    if !starts_expression(p.peek().kind) {
        return Err(p.error_here(&["expression"]));
    }
    parse_expr(p)
}

/// A parsed expression and the height of its tree.
struct Operand {
    expr: Expr,
    height: usize,
}

impl Operand {
    fn leaf(expr: Expr) -> Self {
        Self { expr, height: 1 }
    }
}

fn too_deep(at: &Token) -> ParseError {
    ParseError::unexpected(at, &["expression"]).with_message("expression nested too deeply")
}

/// Height of a node whose tallest child is `child_height`, bounded by
/// `max_depth`.
fn nest(p: &Parser, child_height: usize, at: &Token) -> ParseResult<usize> {
    let height = child_height + 1;
    if height > p.config.max_depth {
        return Err(too_deep(at));
    }
    Ok(height)
}

fn binary(p: &Parser, left: Operand, op: BinaryOp, right: Operand, at: &Token) -> ParseResult<Operand> {
    let height = nest(p, left.height.max(right.height), at)?;
    let expr = Expr::BinaryOp { left: Box::new(left.expr), op, right: Box::new(right.expr) };
    Ok(Operand { expr, height })
}

fn unary(p: &Parser, op: UnaryOp, operand: Operand, at: &Token) -> ParseResult<Operand> {
    let height = nest(p, operand.height, at)?;
    Ok(Operand { expr: Expr::UnaryOp { op, expr: Box::new(operand.expr) }, height })
}

fn parse_expr(p: &mut Parser) -> ParseResult<Operand> {
    if p.depth >= p.config.max_depth {
        return Err(p.error_here(&["expression"]).with_message("expression nested too deeply"));
    }
    p.depth += 1;
    let result = parse_or_expr(p);
    p.depth -= 1;
    result
}

fn parse_or_expr(p: &mut Parser) -> ParseResult<Operand> {
    let mut left = parse_xor_expr(p)?;
    while let Some(op) = p.eat_token(TokenKind::Or) {
        let right = parse_xor_expr(p)?;
        left = binary(p, left, BinaryOp::Or, right, &op)?;
    }
    Ok(left)
}

fn parse_xor_expr(p: &mut Parser) -> ParseResult<Operand> {
    let mut left = parse_and_expr(p)?;
    while let Some(op) = p.eat_token(TokenKind::Xor) {
        let right = parse_and_expr(p)?;
        left = binary(p, left, BinaryOp::Xor, right, &op)?;
    }
    Ok(left)
}

fn parse_and_expr(p: &mut Parser) -> ParseResult<Operand> {
    let mut left = parse_not_expr(p)?;
    while let Some(op) = p.eat_token(TokenKind::And) {
        let right = parse_not_expr(p)?;
        left = binary(p, left, BinaryOp::And, right, &op)?;
    }
    Ok(left)
}

fn parse_not_expr(p: &mut Parser) -> ParseResult<Operand> {
    parse_prefixed(p, TokenKind::Not, UnaryOp::Not, parse_comparison)
}

/// A run of prefix operators such as `NOT NOT x` or `- -x`. The run is
/// counted without recursion and capped at `max_depth`.
fn parse_prefixed(
    p: &mut Parser,
    kind: TokenKind,
    op: UnaryOp,
    operand: fn(&mut Parser) -> ParseResult<Operand>,
) -> ParseResult<Operand> {
    let mut first = None;
    let mut count = 0usize;
    while let Some(tok) = p.eat_token(kind) {
        if count >= p.config.max_depth {
            return Err(too_deep(&tok));
        }
        count += 1;
        first.get_or_insert(tok);
    }

    let mut expr = operand(p)?;
    if let Some(at) = first {
        for _ in 0..count {
            expr = unary(p, op, expr, &at)?;
        }
    }
    Ok(expr)
}

fn parse_comparison(p: &mut Parser) -> ParseResult<Operand> {
    let left = parse_string_op(p)?;

    // IS NULL / IS NOT NULL
    if let Some(is) = p.eat_token(TokenKind::Is) {
        let negated = p.eat(TokenKind::Not);
        p.expect(TokenKind::Null, &["NULL"])?;
        let height = nest(p, left.height, &is)?;
        return Ok(Operand { expr: Expr::IsNull { expr: Box::new(left.expr), negated }, height });
    }

    // IN
    if let Some(in_tok) = p.eat_token(TokenKind::In) {
        let list = parse_string_op(p)?;
        return binary(p, left, BinaryOp::In, list, &in_tok);
    }

    let tok = p.scan_ignore_whitespace();
    let op = match tok.kind {
        TokenKind::Eq => BinaryOp::Eq,
        TokenKind::Neq => BinaryOp::Neq,
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::Lte => BinaryOp::Lte,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::Gte => BinaryOp::Gte,
        _ => {
            p.unscan();
            return Ok(left);
        }
    };
    let right = parse_string_op(p)?;
    binary(p, left, op, right, &tok)
}

fn parse_string_op(p: &mut Parser) -> ParseResult<Operand> {
    let left = parse_addition(p)?;

    // STARTS WITH / ENDS WITH / CONTAINS
    let tok = p.scan_ignore_whitespace();
    let op = match tok.kind {
        TokenKind::Starts => {
            p.expect(TokenKind::With, &["WITH"])?;
            BinaryOp::StartsWith
        }
        TokenKind::Ends => {
            p.expect(TokenKind::With, &["WITH"])?;
            BinaryOp::EndsWith
        }
        TokenKind::Contains => BinaryOp::Contains,
        _ => {
            p.unscan();
            return Ok(left);
        }
    };
    let right = parse_addition(p)?;
    binary(p, left, op, right, &tok)
}

fn parse_addition(p: &mut Parser) -> ParseResult<Operand> {
    let mut left = parse_multiplication(p)?;
    loop {
        let tok = p.scan_ignore_whitespace();
        let op = match tok.kind {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Dash => BinaryOp::Sub,
            _ => {
                p.unscan();
                break;
            }
        };
        let right = parse_multiplication(p)?;
        left = binary(p, left, op, right, &tok)?;
    }
    Ok(left)
}

fn parse_multiplication(p: &mut Parser) -> ParseResult<Operand> {
    let mut left = parse_power(p)?;
    loop {
        let tok = p.scan_ignore_whitespace();
        let op = match tok.kind {
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Mod,
            _ => {
                p.unscan();
                break;
            }
        };
        let right = parse_power(p)?;
        left = binary(p, left, op, right, &tok)?;
    }
    Ok(left)
}

fn parse_power(p: &mut Parser) -> ParseResult<Operand> {
    let first = parse_unary(p)?;
    let mut rest = Vec::new();
    while let Some(caret) = p.eat_token(TokenKind::Caret) {
        if rest.len() >= p.config.max_depth {
            return Err(too_deep(&caret));
        }
        rest.push((caret, parse_unary(p)?));
    }

    // right-associative: a ^ b ^ c == a ^ (b ^ c)
    let Some((mut caret, mut expr)) = rest.pop() else {
        return Ok(first);
    };
    while let Some((previous, base)) = rest.pop() {
        expr = binary(p, base, BinaryOp::Pow, expr, &caret)?;
        caret = previous;
    }
    binary(p, first, BinaryOp::Pow, expr, &caret)
}

fn parse_unary(p: &mut Parser) -> ParseResult<Operand> {
    parse_prefixed(p, TokenKind::Dash, UnaryOp::Negate, parse_property_access)
}

fn parse_property_access(p: &mut Parser) -> ParseResult<Operand> {
    let mut operand = parse_primary(p)?;

    // Property access chain: n.name, n.address.city
    while let Some(dot) = p.eat_token(TokenKind::Dot) {
        let key = p.expect(TokenKind::Identifier, &["property key"])?.text;
        let height = nest(p, operand.height, &dot)?;
        operand = Operand { expr: Expr::Property { expr: Box::new(operand.expr), key }, height };
    }

    Ok(operand)
}

fn parse_primary(p: &mut Parser) -> ParseResult<Operand> {
    let tok = p.scan_ignore_whitespace();
    match tok.kind {
        // Literals
        TokenKind::Integer => match tok.text.parse::<i64>() {
            Ok(v) => Ok(Operand::leaf(Expr::Literal(Literal::Int(v)))),
            Err(_) => Err(ParseError::unexpected(&tok, &["expression"])
                .with_message(format!("integer literal {} out of range", tok.text))),
        },
        TokenKind::Float => match tok.text.parse::<f64>() {
            Ok(v) => Ok(Operand::leaf(Expr::Literal(Literal::Float(v)))),
            Err(_) => Err(ParseError::unexpected(&tok, &["expression"])
                .with_message(format!("invalid number {}", tok.text))),
        },
        TokenKind::StringLiteral => Ok(Operand::leaf(Expr::Literal(Literal::String(tok.text)))),
        TokenKind::True => Ok(Operand::leaf(Expr::Literal(Literal::Bool(true)))),
        TokenKind::False => Ok(Operand::leaf(Expr::Literal(Literal::Bool(false)))),
        TokenKind::Null => Ok(Operand::leaf(Expr::Literal(Literal::Null))),

        // Parenthesized expression
        TokenKind::LParen => {
            let operand = parse_expr(p)?;
            p.expect(TokenKind::RParen, &[")"])?;
            Ok(operand)
        }

        // List literal
        TokenKind::LBracket => {
            let mut items = Vec::new();
            let mut tallest = 0;
            if !p.eat(TokenKind::RBracket) {
                loop {
                    let item = parse_expr(p)?;
                    tallest = tallest.max(item.height);
                    items.push(item.expr);
                    if !p.eat(TokenKind::Comma) {
                        break;
                    }
                }
                p.expect(TokenKind::RBracket, &[",", "]"])?;
            }
            let height = nest(p, tallest, &tok)?;
            Ok(Operand { expr: Expr::List(items), height })
        }

        // Map literal
        TokenKind::LBrace => {
            p.unscan();
            let (map, tallest) = parse_property_map(p)?.unwrap_or_default();
            let height = nest(p, tallest, &tok)?;
            Ok(Operand { expr: Expr::MapLiteral(map), height })
        }

        // Identifier — could be variable, symbol or function call
        TokenKind::Identifier => {
            if p.eat(TokenKind::LParen) {
                parse_function_call(p, tok)
            } else if p.bound.contains(&tok.text) {
                Ok(Operand::leaf(Expr::Variable(tok.text)))
            } else {
                Ok(Operand::leaf(Expr::Symbol(tok.text)))
            }
        }

        TokenKind::Case | TokenKind::Exists => Err(ParseError::unexpected(&tok, &["expression"])
            .with_message(format!("{} expressions are not supported", tok.kind))),

        _ => Err(ParseError::unexpected(&tok, &["expression"])),
    }
}

/// Arguments of `name(...)`; the opening parenthesis is already consumed.
fn parse_function_call(p: &mut Parser, name: Token) -> ParseResult<Operand> {
    let distinct = p.eat(TokenKind::Distinct);
    let mut args = Vec::new();
    let mut tallest = 0;

    if p.eat(TokenKind::Star) {
        // count(*)
        args.push(Expr::Star);
    } else if p.peek().kind != TokenKind::RParen {
        loop {
            let arg = parse_expr(p)?;
            tallest = tallest.max(arg.height);
            args.push(arg.expr);
            if !p.eat(TokenKind::Comma) {
                break;
            }
        }
    }
    p.expect(TokenKind::RParen, &[",", ")"])?;

    let height = nest(p, tallest, &name)?;
    Ok(Operand { expr: Expr::FunctionCall { name: name.text, args, distinct }, height })
}

// ============================================================================
// Tests
// ============================================================================
