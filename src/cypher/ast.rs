//! Cypher AST (Abstract Syntax Tree)
//!
//! These types represent parsed Cypher queries. They are pure data plus a
//! `Display` impl that renders canonical query text: parsing a rendered
//! tree and rendering it again yields the same string.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Property map on a node or edge pattern, or a map literal.
///
/// Ordered by key so rendering is deterministic.
pub type PropertyMap = BTreeMap<String, Expr>;

/// A parsed query. Holds exactly one statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub root: SingleQuery,
}

/// MATCH ... RETURN ... [ORDER BY ...] [SKIP ...] [LIMIT ...]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SingleQuery {
    pub reading: Vec<ReadingClause>,
    pub distinct: bool,
    pub items: Vec<ReturnItem>,
    pub order_by: Vec<OrderBy>,
    pub skip: Option<Expr>,
    pub limit: Option<Expr>,
}

impl SingleQuery {
    /// Whether RETURN projects at least one item. The parser accepts a
    /// bare `RETURN`; callers that execute queries should check this.
    pub fn has_projection(&self) -> bool {
        !self.items.is_empty()
    }
}

/// [OPTIONAL] MATCH pattern, ... [WHERE expr]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingClause {
    pub optional: bool,
    pub patterns: Vec<MatchPattern>,
    pub where_clause: Option<Expr>,
}

/// A pattern: p = (a:Person)-[:KNOWS]->(b:Person)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPattern {
    pub variable: Option<String>,
    pub elements: Vec<PatternElement>,
}

/// Element of a pattern — either a node or an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatternElement {
    Node(NodePattern),
    Edge(EdgePattern),
}

/// Node pattern: (alias :Label1 :Label2 {prop: value})
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePattern {
    pub variable: Option<String>,
    /// In declaration order.
    pub labels: Vec<String>,
    pub properties: PropertyMap,
}

/// Edge pattern: -[alias :TYPE1|TYPE2 *min..max {props}]->
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgePattern {
    pub variable: Option<String>,
    /// Alternatives: the edge matches any of these types.
    pub rel_types: Vec<String>,
    pub properties: PropertyMap,
    pub hops: Option<HopRange>,
    pub direction: EdgeDirection,
}

/// Edge direction as written in the pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeDirection {
    /// -[]-
    #[default]
    Undirected,
    /// -[]->
    Right,
    /// <-[]-
    Left,
    /// <-[]->
    Both,
}

/// Variable-length bounds: `*`, `*n`, `*min..max`, `*..max`, `*min..`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopRange {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

/// Single item in RETURN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl ReturnItem {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }
}

/// ORDER BY item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub direction: SortDirection,
    pub expr: Expr,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

// ============================================================================
// Expressions
// ============================================================================

/// Expression in Cypher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Name bound by a pattern earlier in the statement: `n`, `r`, `p`
    Variable(String),
    /// Name with no pattern binding: aliases, unknown identifiers
    Symbol(String),
    /// Literal value
    Literal(Literal),
    /// Property access: `n.name`
    Property { expr: Box<Expr>, key: String },
    /// Function call: `count(n)`, `count(DISTINCT n)`, `count(*)`
    FunctionCall { name: String, args: Vec<Expr>, distinct: bool },
    /// Binary operation: `a + b`, `a = b`, `a AND b`, `a IN b`
    BinaryOp { left: Box<Expr>, op: BinaryOp, right: Box<Expr> },
    /// Unary operation: `NOT a`, `-a`
    UnaryOp { op: UnaryOp, expr: Box<Expr> },
    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },
    /// List: `[1, 2, 3]`
    List(Vec<Expr>),
    /// Map: `{name: 'Ada', age: 3}`
    MapLiteral(PropertyMap),
    /// Wildcard: `*` (in RETURN * and count(*))
    Star,
}

impl Expr {
    /// Renders without surrounding parentheses as an operand.
    fn is_atomic(&self) -> bool {
        !matches!(
            self,
            Expr::BinaryOp { .. } | Expr::UnaryOp { .. } | Expr::IsNull { .. }
        )
    }
}

/// Literal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add, Sub, Mul, Div, Mod, Pow,
    // Comparison
    Eq, Neq, Lt, Lte, Gt, Gte,
    // Logical
    And, Or, Xor,
    // Membership and string predicates
    In, StartsWith, EndsWith, Contains,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::Eq => "=",
            BinaryOp::Neq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Xor => "XOR",
            BinaryOp::In => "IN",
            BinaryOp::StartsWith => "STARTS WITH",
            BinaryOp::EndsWith => "ENDS WITH",
            BinaryOp::Contains => "CONTAINS",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Negate,
}

// ============================================================================
// Canonical rendering
// ============================================================================

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_properties(f: &mut fmt::Formatter<'_>, props: &PropertyMap) -> fmt::Result {
    f.write_str("{")?;
    for (i, (key, value)) in props.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{key}: {value}")?;
    }
    f.write_str("}")
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    if expr.is_atomic() {
        write!(f, "{expr}")
    } else {
        write!(f, "({expr})")
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt(f)
    }
}

impl fmt::Display for SingleQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for clause in &self.reading {
            write!(f, "{clause} ")?;
        }
        f.write_str("RETURN")?;
        if self.distinct {
            f.write_str(" DISTINCT")?;
        }
        if !self.items.is_empty() {
            f.write_str(" ")?;
            write_joined(f, &self.items, ", ")?;
        }
        if !self.order_by.is_empty() {
            f.write_str(" ORDER BY ")?;
            write_joined(f, &self.order_by, ", ")?;
        }
        if let Some(skip) = &self.skip {
            write!(f, " SKIP {skip}")?;
        }
        if let Some(limit) = &self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ReadingClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optional {
            f.write_str("OPTIONAL ")?;
        }
        f.write_str("MATCH ")?;
        write_joined(f, &self.patterns, ", ")?;
        if let Some(filter) = &self.where_clause {
            write!(f, " WHERE {filter}")?;
        }
        Ok(())
    }
}

impl fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(variable) = &self.variable {
            write!(f, "{variable} = ")?;
        }
        write_joined(f, &self.elements, "")
    }
}

impl fmt::Display for PatternElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternElement::Node(node) => node.fmt(f),
            PatternElement::Edge(edge) => edge.fmt(f),
        }
    }
}

impl fmt::Display for NodePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        if let Some(variable) = &self.variable {
            f.write_str(variable)?;
        }
        for label in &self.labels {
            write!(f, " :{label}")?;
        }
        if !self.properties.is_empty() {
            f.write_str(" ")?;
            write_properties(f, &self.properties)?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for EdgePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self.direction {
            EdgeDirection::Left | EdgeDirection::Both => "<-[",
            EdgeDirection::Right | EdgeDirection::Undirected => "-[",
        })?;
        if let Some(variable) = &self.variable {
            f.write_str(variable)?;
        }
        if !self.rel_types.is_empty() {
            f.write_str(" :")?;
            write_joined(f, &self.rel_types, "|")?;
        }
        if let Some(hops) = &self.hops {
            write!(f, " *{hops}")?;
        }
        if !self.properties.is_empty() {
            f.write_str(" ")?;
            write_properties(f, &self.properties)?;
        }
        f.write_str(match self.direction {
            EdgeDirection::Right | EdgeDirection::Both => "]->",
            EdgeDirection::Left | EdgeDirection::Undirected => "]-",
        })
    }
}

impl fmt::Display for HopRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (None, None) => Ok(()),
            (Some(min), Some(max)) if min == max => write!(f, "{min}"),
            (Some(min), Some(max)) => write!(f, "{min}..{max}"),
            (Some(min), None) => write!(f, "{min}.."),
            (None, Some(max)) => write!(f, "..{max}"),
        }
    }
}

impl fmt::Display for ReturnItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {alias}")?;
        }
        Ok(())
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if self.direction == SortDirection::Descending {
            f.write_str(" DESC")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Variable(name) | Expr::Symbol(name) => f.write_str(name),
            Expr::Literal(literal) => literal.fmt(f),
            Expr::Property { expr, key } => {
                // `1.x` would scan as an illegal number
                if matches!(**expr, Expr::Literal(_)) {
                    write!(f, "({expr})")?;
                } else {
                    write_operand(f, expr)?;
                }
                write!(f, ".{key}")
            }
            Expr::FunctionCall { name, args, distinct } => {
                write!(f, "{name}(")?;
                if *distinct {
                    f.write_str("DISTINCT ")?;
                }
                write_joined(f, args, ", ")?;
                f.write_str(")")
            }
            Expr::BinaryOp { left, op, right } => {
                write_operand(f, left)?;
                write!(f, " {} ", op.as_str())?;
                write_operand(f, right)
            }
            Expr::UnaryOp { op: UnaryOp::Not, expr } => {
                f.write_str("NOT ")?;
                write_operand(f, expr)
            }
            Expr::UnaryOp { op: UnaryOp::Negate, expr } => {
                f.write_str("-")?;
                write_operand(f, expr)
            }
            Expr::IsNull { expr, negated } => {
                write_operand(f, expr)?;
                f.write_str(if *negated { " IS NOT NULL" } else { " IS NULL" })
            }
            Expr::List(items) => {
                f.write_str("[")?;
                write_joined(f, items, ", ")?;
                f.write_str("]")
            }
            Expr::MapLiteral(map) => write_properties(f, map),
            Expr::Star => f.write_str("*"),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(v) => {
                // keep the decimal point so the text scans back as a float
                let text = v.to_string();
                if text.contains('.') {
                    f.write_str(&text)
                } else {
                    write!(f, "{text}.0")
                }
            }
            Literal::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")
            }
        }
    }
}
