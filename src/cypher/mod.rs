//! # Cypher Language
//!
//! openCypher subset front end: a replaying scanner, a backtracking
//! recursive descent parser and an AST that renders canonical query text.
//! Pure functions, no I/O.

pub mod ast;
pub mod error;
pub mod parser;
pub mod scanner;
pub mod token;

use crate::config::ParserConfig;
use crate::Result;
use ast::Query;

/// Parse a Cypher query string into an AST.
pub fn parse_query(query: &str) -> Result<Query> {
    parse_query_with(query, ParserConfig::default())
}

/// Parse with explicit parser settings.
pub fn parse_query_with(query: &str, config: ParserConfig) -> Result<Query> {
    Ok(parser::Parser::with_config(query, config).parse_query()?)
}

/// Parse and render back in canonical form.
pub fn normalize(query: &str) -> Result<String> {
    Ok(parse_query(query)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MultiStatement;
    use crate::Error;

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize("match ((p:Person)) return p.name as name").unwrap(),
            "MATCH (p :Person) RETURN p.name AS name"
        );
    }

    #[test]
    fn test_parse_error_converts() {
        match parse_query("MATCH (p)") {
            Err(Error::Parse(err)) => assert_eq!(err.expected, vec!["RETURN"]),
            other => panic!("Expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_with_config() {
        let config = ParserConfig { multi_statement: MultiStatement::Reject, ..Default::default() };
        assert!(parse_query_with("RETURN 1; RETURN 2", config).is_err());
        assert!(parse_query("RETURN 1; RETURN 2").is_ok());
    }
}
