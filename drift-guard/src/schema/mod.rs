//! Schema model: the declarative expectation of a tabular structure.
//!
//! A [`SchemaDefinition`] is constructed once per invocation from external
//! input (JSON or the builder) and is immutable thereafter. All
//! constraint/type compatibility rules are enforced here, at parse time,
//! so the decomposer and planner never see an inconsistent rule.

use crate::error::{DriftError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Declared logical type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Integer values
    Integer,
    /// Floating point values
    Float,
    /// String values
    String,
    /// Boolean values
    Boolean,
    /// Date values (ISO format)
    Date,
    /// Timestamp values
    Timestamp,
}

impl FieldType {
    /// Returns true for types with a total order usable by range bounds.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Float)
    }

    /// Returns true for types whose values are textual.
    pub fn is_textual(&self) -> bool {
        matches!(self, FieldType::String)
    }

    /// Returns a human-readable name for this type.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::String => "string",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Timestamp => "timestamp",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Canned textual formats, validated through a generated pattern check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextFormat {
    /// ISO date, e.g. `2026-01-31`
    Date,
    /// ISO datetime with a space or `T` separator, e.g. `2026-01-31T08:00:00`
    Datetime,
}

impl TextFormat {
    /// Returns the pattern values must match to satisfy this format.
    pub fn pattern(&self) -> &'static str {
        match self {
            TextFormat::Date => r"^\d{4}-\d{2}-\d{2}$",
            TextFormat::Datetime => r"^\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}",
        }
    }
}

/// Expected shape of a single field.
///
/// # Examples
///
/// ```rust
/// use drift_guard::schema::{FieldRule, FieldType};
///
/// let rule = FieldRule::new("user_tier")
///     .typed(FieldType::String)
///     .required()
///     .allowed_values(["FREE", "PREMIUM"]);
/// assert_eq!(rule.field, "user_tier");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRule {
    /// Field name as it should appear in the source.
    pub field: String,
    /// Declared type; omitted when only presence/nullability matters.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    /// Whether the field must be non-null.
    #[serde(default)]
    pub required: bool,
    /// Closed set of allowed values.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    /// Inclusive lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Pattern every non-null value must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    /// Canned format every non-null value must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<TextFormat>,
}

impl FieldRule {
    /// Creates a rule for the named field with no declared type and no
    /// constraints.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            field_type: None,
            required: false,
            allowed: None,
            min: None,
            max: None,
            regex: None,
            format: None,
        }
    }

    /// Declares the field's type.
    pub fn typed(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    /// Marks the field as required (non-null).
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Restricts the field to a closed set of allowed values.
    pub fn allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the inclusive lower bound.
    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Sets the inclusive upper bound.
    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Requires every non-null value to match the pattern.
    pub fn pattern(mut self, regex: impl Into<String>) -> Self {
        self.regex = Some(regex.into());
        self
    }

    /// Requires every non-null value to match a canned format.
    pub fn format(mut self, format: TextFormat) -> Self {
        self.format = Some(format);
        self
    }

    fn validate(&self) -> Result<()> {
        let field = &self.field;

        if field.trim().is_empty() {
            return Err(DriftError::SchemaParse(
                "field name cannot be empty".to_string(),
            ));
        }

        if self.min.is_some() || self.max.is_some() {
            match self.field_type {
                Some(t) if t.is_numeric() => {}
                Some(t) => {
                    return Err(DriftError::SchemaParse(format!(
                        "field '{field}': min/max bounds require a numeric type, found {t}"
                    )))
                }
                None => {
                    return Err(DriftError::SchemaParse(format!(
                        "field '{field}': min/max bounds require a declared numeric type"
                    )))
                }
            }
        }

        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(DriftError::SchemaParse(format!(
                    "field '{field}': min {min} exceeds max {max}"
                )));
            }
        }

        if let Some(allowed) = &self.allowed {
            if allowed.is_empty() {
                return Err(DriftError::SchemaParse(format!(
                    "field '{field}': enum must list at least one allowed value"
                )));
            }
            if let Some(t) = self.field_type {
                if !t.is_textual() {
                    return Err(DriftError::SchemaParse(format!(
                        "field '{field}': enum values require a string type, found {t}"
                    )));
                }
            }
        }

        if self.regex.is_some() && self.format.is_some() {
            return Err(DriftError::SchemaParse(format!(
                "field '{field}': regex and format are mutually exclusive"
            )));
        }

        if self.regex.is_some() || self.format.is_some() {
            if let Some(t) = self.field_type {
                if !t.is_textual() {
                    return Err(DriftError::SchemaParse(format!(
                        "field '{field}': pattern constraints require a string type, found {t}"
                    )));
                }
            }
        }

        if let Some(pattern) = &self.regex {
            regex::Regex::new(pattern).map_err(|e| {
                DriftError::SchemaParse(format!("field '{field}': invalid regex: {e}"))
            })?;
        }

        Ok(())
    }
}

/// The declarative expectation of a tabular structure: an ordered set of
/// field rules plus global validation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Field rules in declaration order; report ordering follows this.
    pub rules: Vec<FieldRule>,
    /// Treat source columns absent from the schema as failures.
    #[serde(default)]
    pub strict_mode: bool,
    /// Match column names case-insensitively.
    #[serde(default)]
    pub case_insensitive: bool,
}

impl SchemaDefinition {
    /// Creates a new builder for constructing a schema definition.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Parses and validates a schema definition from its JSON form.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use drift_guard::schema::SchemaDefinition;
    ///
    /// let schema = SchemaDefinition::from_json(r#"{
    ///     "rules": [
    ///         {"field": "user_id", "type": "integer", "required": true},
    ///         {"field": "user_tier", "type": "string", "enum": ["FREE", "PREMIUM"]}
    ///     ],
    ///     "strict_mode": true
    /// }"#).unwrap();
    /// assert_eq!(schema.rules.len(), 2);
    /// assert!(schema.strict_mode);
    /// ```
    pub fn from_json(input: &str) -> Result<Self> {
        let schema: SchemaDefinition = serde_json::from_str(input)
            .map_err(|e| DriftError::SchemaParse(format!("malformed schema JSON: {e}")))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Returns the declared field names in declaration order.
    pub fn field_names(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.field.clone()).collect()
    }

    /// Canonical matching key for a column name under the schema's case
    /// sensitivity option.
    pub fn match_key(&self, name: &str) -> String {
        if self.case_insensitive {
            name.to_lowercase()
        } else {
            name.to_string()
        }
    }

    fn validate(&self) -> Result<()> {
        let mut seen: HashSet<String> = HashSet::new();
        for rule in &self.rules {
            rule.validate()?;
            if !seen.insert(self.match_key(&rule.field)) {
                return Err(DriftError::SchemaParse(format!(
                    "duplicate field '{}' in schema definition",
                    rule.field
                )));
            }
        }
        Ok(())
    }
}

/// Builder for constructing [`SchemaDefinition`] instances.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    rules: Vec<FieldRule>,
    strict_mode: bool,
    case_insensitive: bool,
}

impl SchemaBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field rule.
    pub fn rule(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Sets strict mode: source columns absent from the schema fail the run.
    pub fn strict_mode(mut self, enabled: bool) -> Self {
        self.strict_mode = enabled;
        self
    }

    /// Sets case-insensitive column matching.
    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    /// Validates and builds the schema definition.
    pub fn build(self) -> Result<SchemaDefinition> {
        let schema = SchemaDefinition {
            rules: self.rules,
            strict_mode: self.strict_mode,
            case_insensitive: self.case_insensitive,
        };
        schema.validate()?;
        Ok(schema)
    }
}
