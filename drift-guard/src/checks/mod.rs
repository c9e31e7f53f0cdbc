//! Atomic checks and the rule decomposer.
//!
//! A [`Check`] is the smallest independently executable unit of
//! validation, derived from exactly one field rule and one constraint
//! kind. [`decompose`] expands a schema definition into a
//! dependency-ordered check set; the dependency graph is a static DAG
//! computed here (prerequisites always precede their dependents in the
//! output), so no runtime cycle detection is needed downstream.

use crate::schema::{FieldType, SchemaDefinition};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of atomic check kinds.
///
/// Modeled as a tagged variant rather than open-ended subclassing so the
/// planner and aggregator dispatch exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// The declared column is present in the source.
    Exists,
    /// The source's native type is compatible with the declared type.
    Type,
    /// No null values in the column.
    NotNull,
    /// Every non-null value belongs to the allowed set.
    Enum,
    /// Every non-null numeric value falls within the declared bounds.
    Range,
    /// Every non-null value matches the declared pattern.
    Regex,
    /// No source column falls outside the declared field set (strict mode).
    ExtraField,
}

impl CheckKind {
    /// Returns the wire name used in reports.
    pub fn name(&self) -> &'static str {
        match self {
            CheckKind::Exists => "exists",
            CheckKind::Type => "type",
            CheckKind::NotNull => "not_null",
            CheckKind::Enum => "enum",
            CheckKind::Range => "range",
            CheckKind::Regex => "regex",
            CheckKind::ExtraField => "extra_field",
        }
    }

    /// Priority tier: 0 = metadata, 1 = structural, 2 = value constraint.
    pub fn tier(&self) -> u8 {
        match self {
            CheckKind::Exists | CheckKind::ExtraField => 0,
            CheckKind::Type | CheckKind::NotNull => 1,
            CheckKind::Enum | CheckKind::Range | CheckKind::Regex => 2,
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stable identity of a check: the owning field plus the check kind.
///
/// The schema-scoped `EXTRA_FIELD` check has no owning field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CheckId {
    /// Owning field, or `None` for schema-scoped checks.
    pub field: Option<String>,
    /// Constraint kind.
    pub kind: CheckKind,
}

impl CheckId {
    /// Identity of a field-scoped check.
    pub fn field_check(field: impl Into<String>, kind: CheckKind) -> Self {
        Self {
            field: Some(field.into()),
            kind,
        }
    }

    /// Identity of a schema-scoped check.
    pub fn schema_check(kind: CheckKind) -> Self {
        Self { field: None, kind }
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{field}.{}", self.kind),
            None => write!(f, "<schema>.{}", self.kind),
        }
    }
}

/// Parameters the planner needs to translate a check into a query.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckParams {
    /// Column presence; resolved from source introspection.
    Exists,
    /// Native-type compatibility with the declared type.
    Type {
        /// The type the schema declares for the field.
        declared: FieldType,
    },
    /// Null count must be zero.
    NotNull,
    /// Values outside the allowed set are violations.
    Enum {
        /// The closed set of allowed values.
        allowed: Vec<String>,
    },
    /// Values outside the bounds are violations.
    Range {
        /// Inclusive lower bound.
        min: Option<f64>,
        /// Inclusive upper bound.
        max: Option<f64>,
    },
    /// Values not matching the pattern are violations.
    Regex {
        /// Pattern, validated at schema parse time.
        pattern: String,
    },
    /// Source columns not covered by the declared field set.
    ExtraField {
        /// The full set of declared field names.
        declared: Vec<String>,
    },
}

/// An atomic unit of verification.
#[derive(Debug, Clone)]
pub struct Check {
    /// Stable identity (field + kind).
    pub id: CheckId,
    /// Priority tier, used for deterministic ordering.
    pub tier: u8,
    /// Identities that must pass before this check may count as anything
    /// but `skipped`.
    pub prerequisites: Vec<CheckId>,
    /// Planner payload.
    pub params: CheckParams,
}

impl Check {
    /// Returns the owning field name, if any.
    pub fn field(&self) -> Option<&str> {
        self.id.field.as_deref()
    }

    /// Returns the check kind.
    pub fn kind(&self) -> CheckKind {
        self.id.kind
    }

    fn new(id: CheckId, prerequisites: Vec<CheckId>, params: CheckParams) -> Self {
        let tier = id.kind.tier();
        Self {
            id,
            tier,
            prerequisites,
            params,
        }
    }
}

/// Expands every field rule into its atomic checks.
///
/// Pure and deterministic: identical input always yields checks with
/// identical identities and ordering. Per rule the emission order is
/// `EXISTS`, then `TYPE` (iff a type is declared) and `NOT_NULL` (iff
/// required), then each declared value constraint. Value constraints
/// depend on `TYPE` when a type is declared, otherwise directly on
/// `EXISTS`. Under strict mode one schema-scoped `EXTRA_FIELD` check is
/// appended, depending on nothing.
pub fn decompose(schema: &SchemaDefinition) -> Vec<Check> {
    let mut checks = Vec::new();

    for rule in &schema.rules {
        let exists_id = CheckId::field_check(&rule.field, CheckKind::Exists);
        checks.push(Check::new(exists_id.clone(), Vec::new(), CheckParams::Exists));

        // Value constraints hang off TYPE when one exists, else EXISTS.
        let mut constraint_prereq = exists_id.clone();

        if let Some(declared) = rule.field_type {
            let type_id = CheckId::field_check(&rule.field, CheckKind::Type);
            checks.push(Check::new(
                type_id.clone(),
                vec![exists_id.clone()],
                CheckParams::Type { declared },
            ));
            constraint_prereq = type_id;
        }

        if rule.required {
            checks.push(Check::new(
                CheckId::field_check(&rule.field, CheckKind::NotNull),
                vec![exists_id.clone()],
                CheckParams::NotNull,
            ));
        }

        if let Some(allowed) = &rule.allowed {
            checks.push(Check::new(
                CheckId::field_check(&rule.field, CheckKind::Enum),
                vec![constraint_prereq.clone()],
                CheckParams::Enum {
                    allowed: allowed.clone(),
                },
            ));
        }

        if rule.min.is_some() || rule.max.is_some() {
            checks.push(Check::new(
                CheckId::field_check(&rule.field, CheckKind::Range),
                vec![constraint_prereq.clone()],
                CheckParams::Range {
                    min: rule.min,
                    max: rule.max,
                },
            ));
        }

        let pattern = rule
            .regex
            .clone()
            .or_else(|| rule.format.map(|f| f.pattern().to_string()));
        if let Some(pattern) = pattern {
            checks.push(Check::new(
                CheckId::field_check(&rule.field, CheckKind::Regex),
                vec![constraint_prereq.clone()],
                CheckParams::Regex { pattern },
            ));
        }
    }

    if schema.strict_mode {
        checks.push(Check::new(
            CheckId::schema_check(CheckKind::ExtraField),
            Vec::new(),
            CheckParams::ExtraField {
                declared: schema.field_names(),
            },
        ));
    }

    checks
}
