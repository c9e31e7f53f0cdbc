//! Capability-aware query planner.
//!
//! Execution cost is bound by the number of passes over the source, not
//! by the number of logical checks, so the planner batches every
//! pushdown-capable row check into a single conditional-aggregation
//! statement per table scan. Metadata checks (`EXISTS`, `TYPE`,
//! `EXTRA_FIELD`) resolve from one schema-introspection unit and never
//! join a row batch. Checks the capability profile cannot push down are
//! routed to a single local-scan unit instead.

use crate::checks::{Check, CheckId, CheckParams};
use crate::error::{DriftError, Result};
use crate::schema::FieldType;
use crate::security::SqlSecurity;
use crate::sources::SourceCapabilities;
use std::time::Duration;
use tracing::debug;

/// Planner knobs supplied by the validator.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Independent timeout attached to every planned unit.
    pub unit_timeout: Duration,
    /// Match source column names case-insensitively.
    pub case_insensitive: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            unit_timeout: Duration::from_secs(30),
            case_insensitive: false,
        }
    }
}

/// A metadata expectation resolved from the source's column listing.
#[derive(Debug, Clone)]
pub enum Introspection {
    /// The named column must be present.
    Exists {
        /// Check resolved by this expectation.
        check: CheckId,
        /// Declared field name.
        field: String,
    },
    /// The named column's native type must be compatible with the
    /// declared type.
    Type {
        /// Check resolved by this expectation.
        check: CheckId,
        /// Declared field name.
        field: String,
        /// Declared logical type.
        declared: FieldType,
    },
    /// Source columns outside the declared set are violations.
    ExtraFields {
        /// Check resolved by this expectation.
        check: CheckId,
        /// Full set of declared field names.
        declared: Vec<String>,
    },
}

impl Introspection {
    /// Identity of the check this expectation resolves.
    pub fn check_id(&self) -> &CheckId {
        match self {
            Introspection::Exists { check, .. }
            | Introspection::Type { check, .. }
            | Introspection::ExtraFields { check, .. } => check,
        }
    }
}

/// A row-level probe evaluated in process against streamed batches.
#[derive(Debug, Clone)]
pub struct RowProbe {
    /// Check resolved by this probe.
    pub check: CheckId,
    /// Column the probe reads.
    pub column: String,
    /// Violation predicate.
    pub predicate: ProbePredicate,
}

/// Violation predicate of a local row probe.
#[derive(Debug, Clone)]
pub enum ProbePredicate {
    /// Null values are violations.
    NotNull,
    /// Values outside the allowed set are violations.
    Enum {
        /// Allowed values.
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
}

/// One aggregation slot inside a batched pushdown statement.
///
/// The planner renders the aggregate expression; the engine assembles
/// the final statement from the slots whose column actually exists, so
/// one missing column cannot poison its batch siblings.
#[derive(Debug, Clone)]
pub struct PushdownSlot {
    /// Check resolved by this slot.
    pub check: CheckId,
    /// Raw column name, for presence filtering.
    pub column: String,
    /// Complete aggregate expression counting violating rows.
    pub aggregate: String,
}

/// Work carried by one executable unit.
#[derive(Debug, Clone)]
pub enum UnitWork {
    /// Metadata-only unit resolved from the adapter's column listing.
    Introspect {
        /// Expectations to evaluate against the listing.
        expectations: Vec<Introspection>,
        /// Match column names case-insensitively.
        case_insensitive: bool,
    },
    /// One conditional-aggregation statement pushed into the source.
    Pushdown {
        /// Escaped table identifier the statement selects from.
        table: String,
        /// Aggregation slots, mapped positionally to `m<i>` aliases.
        slots: Vec<PushdownSlot>,
        /// Match column names case-insensitively.
        case_insensitive: bool,
    },
    /// Row probes evaluated in process against a batched full scan.
    LocalScan {
        /// Probes to evaluate.
        probes: Vec<RowProbe>,
        /// Match column names case-insensitively.
        case_insensitive: bool,
    },
}

/// One independently schedulable query against the source.
#[derive(Debug, Clone)]
pub struct QueryUnit {
    /// Position in the plan, stable across runs.
    pub id: usize,
    /// Independent execution timeout.
    pub timeout: Duration,
    /// The work this unit performs.
    pub work: UnitWork,
}

impl QueryUnit {
    /// Identities of every check this unit resolves.
    pub fn check_ids(&self) -> Vec<CheckId> {
        match &self.work {
            UnitWork::Introspect { expectations, .. } => {
                expectations.iter().map(|e| e.check_id().clone()).collect()
            }
            UnitWork::Pushdown { slots, .. } => {
                slots.iter().map(|s| s.check.clone()).collect()
            }
            UnitWork::LocalScan { probes, .. } => {
                probes.iter().map(|p| p.check.clone()).collect()
            }
        }
    }
}

/// Translates checks into the minimal set of executable units the
/// capability profile allows.
///
/// Deterministic: identical inputs produce an identical, identically
/// ordered plan. Checks whose prerequisite may fail at execution time
/// are still planned; the aggregator short-circuits them to `skipped`,
/// so the planner only needs the dependency edges, never the outcomes.
pub fn plan(
    checks: &[Check],
    capabilities: &SourceCapabilities,
    table: &str,
    config: &PlannerConfig,
) -> Result<Vec<QueryUnit>> {
    let table_sql = SqlSecurity::escape_identifier(table)
        .map_err(|e| DriftError::SchemaParse(format!("table name rejected: {e}")))?;

    let mut expectations = Vec::new();
    let mut pushdown: Vec<PushdownSlot> = Vec::new();
    let mut probes: Vec<RowProbe> = Vec::new();

    for check in checks {
        match &check.params {
            CheckParams::Exists => expectations.push(Introspection::Exists {
                check: check.id.clone(),
                field: expect_field(check)?,
            }),
            CheckParams::Type { declared } => expectations.push(Introspection::Type {
                check: check.id.clone(),
                field: expect_field(check)?,
                declared: *declared,
            }),
            CheckParams::ExtraField { declared } => {
                expectations.push(Introspection::ExtraFields {
                    check: check.id.clone(),
                    declared: declared.clone(),
                })
            }
            CheckParams::NotNull => {
                route_row_check(
                    check,
                    capabilities.supports_pushdown,
                    ProbePredicate::NotNull,
                    &mut pushdown,
                    &mut probes,
                )?;
            }
            CheckParams::Enum { allowed } => {
                route_row_check(
                    check,
                    capabilities.supports_pushdown,
                    ProbePredicate::Enum {
                        allowed: allowed.clone(),
                    },
                    &mut pushdown,
                    &mut probes,
                )?;
            }
            CheckParams::Range { min, max } => {
                route_row_check(
                    check,
                    capabilities.supports_pushdown,
                    ProbePredicate::Range {
                        min: *min,
                        max: *max,
                    },
                    &mut pushdown,
                    &mut probes,
                )?;
            }
            CheckParams::Regex { pattern } => {
                // Regex needs its own capability flag on top of pushdown.
                let pushable = capabilities.supports_pushdown && capabilities.supports_regex;
                route_row_check(
                    check,
                    pushable,
                    ProbePredicate::Regex {
                        pattern: pattern.clone(),
                    },
                    &mut pushdown,
                    &mut probes,
                )?;
            }
        }
    }

    let mut units = Vec::new();
    let mut next_id = 0usize;

    if !expectations.is_empty() {
        units.push(QueryUnit {
            id: next_id,
            timeout: config.unit_timeout,
            work: UnitWork::Introspect {
                expectations,
                case_insensitive: config.case_insensitive,
            },
        });
        next_id += 1;
    }

    let batch_size = capabilities
        .max_batch_size
        .filter(|n| *n > 0)
        .unwrap_or(usize::MAX);
    let mut remaining = pushdown.as_slice();
    while !remaining.is_empty() {
        let take = remaining.len().min(batch_size);
        let (chunk, rest) = remaining.split_at(take);
        remaining = rest;

        units.push(QueryUnit {
            id: next_id,
            timeout: config.unit_timeout,
            work: UnitWork::Pushdown {
                table: table_sql.clone(),
                slots: chunk.to_vec(),
                case_insensitive: config.case_insensitive,
            },
        });
        next_id += 1;
    }

    if !probes.is_empty() {
        units.push(QueryUnit {
            id: next_id,
            timeout: config.unit_timeout,
            work: UnitWork::LocalScan {
                probes,
                case_insensitive: config.case_insensitive,
            },
        });
    }

    debug!(
        plan.units = units.len(),
        plan.pushdown_capable = capabilities.supports_pushdown,
        plan.table = table,
        "planned query units"
    );

    Ok(units)
}

fn expect_field(check: &Check) -> Result<String> {
    check
        .field()
        .map(str::to_string)
        .ok_or_else(|| DriftError::Internal(format!("check {} has no owning field", check.id)))
}

fn route_row_check(
    check: &Check,
    pushable: bool,
    predicate: ProbePredicate,
    pushdown: &mut Vec<PushdownSlot>,
    probes: &mut Vec<RowProbe>,
) -> Result<()> {
    let field = expect_field(check)?;
    if pushable {
        let column = SqlSecurity::escape_identifier(&field)
            .map_err(|e| DriftError::SchemaParse(format!("field '{field}' rejected: {e}")))?;
        let predicate_sql = violation_predicate(&column, &predicate);
        pushdown.push(PushdownSlot {
            check: check.id.clone(),
            column: field,
            aggregate: format!("COUNT(CASE WHEN {predicate_sql} THEN 1 END)"),
        });
    } else {
        probes.push(RowProbe {
            check: check.id.clone(),
            column: field,
            predicate,
        });
    }
    Ok(())
}

/// Renders the SQL predicate that is true for a violating row.
///
/// Value comparisons go through casts so a type-incompatible column
/// cannot poison the shared batch statement; uncastable values fall out
/// as SQL nulls, which never satisfy the predicate. The corresponding
/// `TYPE` failure will skip the dependent check anyway.
fn violation_predicate(column: &str, predicate: &ProbePredicate) -> String {
    match predicate {
        ProbePredicate::NotNull => format!("{column} IS NULL"),
        ProbePredicate::Enum { allowed } => {
            let list = allowed
                .iter()
                .map(|v| format!("'{}'", SqlSecurity::escape_literal(v)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{column} IS NOT NULL AND CAST({column} AS VARCHAR) NOT IN ({list})")
        }
        ProbePredicate::Range { min, max } => {
            let mut bounds = Vec::new();
            if let Some(min) = min {
                bounds.push(format!("TRY_CAST({column} AS DOUBLE) < {min}"));
            }
            if let Some(max) = max {
                bounds.push(format!("TRY_CAST({column} AS DOUBLE) > {max}"));
            }
            format!("{column} IS NOT NULL AND ({})", bounds.join(" OR "))
        }
        ProbePredicate::Regex { pattern } => {
            let literal = SqlSecurity::escape_literal(pattern);
            format!("{column} IS NOT NULL AND NOT CAST({column} AS VARCHAR) ~ '{literal}'")
        }
    }
}
