//! Parser configuration.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Knobs for [`crate::cypher::parser::Parser`].
///
/// Loads from JSON; missing fields fall back to [`ParserConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    /// What to do when the input holds more than one `;`-separated statement.
    pub multi_statement: MultiStatement,
    /// Maximum expression nesting depth.
    pub max_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            multi_statement: MultiStatement::LastWins,
            max_depth: 256,
        }
    }
}

impl ParserConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Handling of inputs with several statements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiStatement {
    /// Each statement replaces the previous one; the last is returned.
    #[default]
    LastWins,
    /// A second statement is a parse error.
    Reject,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_defaults() {
        let config = ParserConfig::default();
        assert_eq!(config.multi_statement, MultiStatement::LastWins);
        assert_eq!(config.max_depth, 256);
    }

    #[test]
    fn test_from_json_partial() {
        let config = ParserConfig::from_json(r#"{"multi_statement": "reject"}"#).unwrap();
        assert_eq!(config.multi_statement, MultiStatement::Reject);
        assert_eq!(config.max_depth, 256);
    }

    #[test]
    fn test_from_json_rejects_unknown_fields() {
        let result = ParserConfig::from_json(r#"{"max_depht": 3}"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
