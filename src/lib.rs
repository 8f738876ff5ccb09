//! # cypher-front — Cypher Query Front End
//!
//! Scans, parses and renders an openCypher subset.
//!
//! ## Design Principles
//!
//! 1. **Parser owns nothing**: Cypher → AST is a pure function
//! 2. **Backtracking is cheap**: the scanner keeps a replay log, so a grammar
//!    rule can try several tokens and hand them all back
//! 3. **Closed AST**: every pattern element and expression is an enum variant
//! 4. **Canonical text**: rendering a parsed query and parsing it again
//!    yields the same tree
//!
//! ## Quick Start
//!
//! ```rust
//! use cypher_front::cypher;
//!
//! # fn example() -> cypher_front::Result<()> {
//! let query = cypher::parse_query("match ((p:Person)) where p.age > 30 return p.name")?;
//! assert_eq!(query.root.reading.len(), 1);
//! assert_eq!(
//!     query.to_string(),
//!     "MATCH (p :Person) WHERE p.age > 30 RETURN p.name"
//! );
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Errors
//!
//! Parsing stops at the first error. [`ParseError`] reports the offending
//! token, what the grammar would have accepted and where:
//!
//! ```text
//! found EOF, expected RETURN at line 1, char 10
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod cypher;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{MultiStatement, ParserConfig};
pub use cypher::ast::{Expr, Query, SingleQuery};
pub use cypher::error::ParseError;
pub use cypher::token::{Pos, Token, TokenKind};
pub use cypher::{normalize, parse_query, parse_query_with};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Invalid parser configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
