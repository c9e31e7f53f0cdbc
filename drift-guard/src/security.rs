//! SQL safety utilities for planner-generated pushdown queries.
//!
//! Every identifier and literal the planner embeds in SQL flows through
//! this module. Schema field names are user input; a malicious or
//! malformed name must fail planning rather than reach the source engine.

use crate::error::{DriftError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex is valid"));

/// Maximum accepted identifier length.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// SQL identifier validation and escaping utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates a SQL identifier (table or column name) without escaping it.
    ///
    /// # Examples
    /// ```rust
    /// use drift_guard::security::SqlSecurity;
    ///
    /// assert!(SqlSecurity::validate_identifier("customer_id").is_ok());
    /// assert!(SqlSecurity::validate_identifier("id; DROP TABLE users--").is_err());
    /// ```
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.trim().is_empty() {
            return Err(DriftError::Security(
                "SQL identifier cannot be empty or whitespace-only".to_string(),
            ));
        }

        if identifier.len() > MAX_IDENTIFIER_LENGTH {
            return Err(DriftError::Security(format!(
                "SQL identifier too long (max {MAX_IDENTIFIER_LENGTH} characters)"
            )));
        }

        if identifier.contains('\0') {
            return Err(DriftError::Security(
                "SQL identifier contains a null byte".to_string(),
            ));
        }

        if !IDENTIFIER_FORMAT.is_match(identifier) {
            return Err(DriftError::Security(format!(
                "SQL identifier '{identifier}' contains characters outside [A-Za-z0-9_]"
            )));
        }

        Ok(())
    }

    /// Validates and escapes a SQL identifier for safe embedding in a query.
    ///
    /// Identifiers are double-quoted so the source engine treats them
    /// verbatim rather than normalizing case.
    pub fn escape_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;
        let escaped = identifier.replace('"', "\"\"");
        Ok(format!("\"{escaped}\""))
    }

    /// Escapes a string literal for embedding in single quotes.
    pub fn escape_literal(value: &str) -> String {
        value.replace('\'', "''")
    }
}
