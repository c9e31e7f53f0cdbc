//! Report entity and result aggregation.
//!
//! The aggregator maps raw execution outcomes back onto checks and
//! fields, honoring the dependency edges the decomposer encoded: a check
//! whose prerequisite did not pass resolves to `skipped` without
//! consulting raw results, and skips propagate down the dependency
//! chain. The report is the run's terminal artifact; it
//! holds no references back to the source and contains no timestamps, so
//! identical inputs produce byte-identical reports.

use crate::checks::{Check, CheckId, CheckKind};
use crate::engine::{RawOutcome, RawResults};
use crate::schema::SchemaDefinition;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Status of a single check after aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// The check passed.
    Pass,
    /// The check observed violations.
    Fail,
    /// The check could not be decided (query failure or timeout).
    Error,
    /// A prerequisite did not pass, so the check was never decided.
    Skipped,
}

impl CheckStatus {
    /// Returns true for `pass`.
    pub fn is_pass(&self) -> bool {
        matches!(self, CheckStatus::Pass)
    }

    /// Returns true for `fail`.
    pub fn is_fail(&self) -> bool {
        matches!(self, CheckStatus::Fail)
    }
}

/// The result of one atomic check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// Which rule produced this result.
    pub rule: CheckKind,
    /// Aggregated status.
    pub status: CheckStatus,
    /// Number of violating rows (or columns, for metadata checks).
    pub violations: u64,
    /// Diagnostic message, present for failures and errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Aggregated results for one declared field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldReport {
    /// `fail` if any owned check failed, else `error` if any errored,
    /// else `pass`.
    pub status: CheckStatus,
    /// Check results in decomposition order.
    pub checks: Vec<CheckResult>,
}

/// Summary counts over every check in the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Checks derived from the schema.
    pub total_checks: usize,
    /// Checks that passed.
    pub passed: usize,
    /// Checks that observed violations.
    pub failed: usize,
    /// Checks that could not be decided.
    pub errors: usize,
    /// Checks skipped because a prerequisite did not pass.
    pub skipped: usize,
}

/// The terminal artifact of a validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Overall status of the run.
    pub status: CheckStatus,
    /// Summary counts.
    pub summary: Summary,
    /// Source columns absent from the schema; populated only under
    /// strict mode.
    pub schema_extras: Vec<String>,
    /// Per-field reports, in schema declaration order.
    pub fields: IndexMap<String, FieldReport>,
}

impl Report {
    /// Returns true when the run found no drift and no errors.
    pub fn is_pass(&self) -> bool {
        self.status.is_pass()
    }

    /// Serializes the report to its JSON form.
    pub fn to_json(&self) -> crate::error::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::error::DriftError::Internal(format!("report serialization: {e}")))
    }
}

/// Folds raw execution outcomes into the final report.
///
/// Deterministic given deterministic inputs. Checks are processed in
/// decomposition order, which guarantees every prerequisite's status is
/// known before its dependents are examined.
pub fn aggregate(schema: &SchemaDefinition, checks: &[Check], raw: RawResults) -> Report {
    let mut statuses: HashMap<CheckId, CheckStatus> = HashMap::new();
    let mut results: HashMap<CheckId, CheckResult> = HashMap::new();
    let mut schema_extras: Vec<String> = Vec::new();

    for check in checks {
        // A skipped prerequisite blocks too: skips propagate down the
        // whole dependency chain of a failed EXISTS or TYPE check.
        let blocked = check.prerequisites.iter().any(|p| {
            matches!(
                statuses.get(p),
                Some(CheckStatus::Fail) | Some(CheckStatus::Error) | Some(CheckStatus::Skipped)
            )
        });

        let result = if blocked {
            CheckResult {
                rule: check.kind(),
                status: CheckStatus::Skipped,
                violations: 0,
                message: Some("prerequisite check did not pass".to_string()),
            }
        } else {
            match raw.get(&check.id) {
                Some(RawOutcome::Violations { count, detail }) => {
                    if *count > 0 {
                        if check.kind() == CheckKind::ExtraField {
                            schema_extras = extras_from_detail(detail.as_ref());
                        }
                        CheckResult {
                            rule: check.kind(),
                            status: CheckStatus::Fail,
                            violations: *count,
                            message: detail.as_ref().map(detail_message),
                        }
                    } else {
                        CheckResult {
                            rule: check.kind(),
                            status: CheckStatus::Pass,
                            violations: 0,
                            message: None,
                        }
                    }
                }
                Some(RawOutcome::Errored { message }) => CheckResult {
                    rule: check.kind(),
                    status: CheckStatus::Error,
                    violations: 0,
                    message: Some(message.clone()),
                },
                None => CheckResult {
                    rule: check.kind(),
                    status: CheckStatus::Error,
                    violations: 0,
                    message: Some("no result produced for check".to_string()),
                },
            }
        };

        statuses.insert(check.id.clone(), result.status);
        results.insert(check.id.clone(), result);
    }

    // Assemble per-field reports in schema declaration order, not
    // execution completion order.
    let mut fields: IndexMap<String, FieldReport> = IndexMap::new();
    for rule in &schema.rules {
        let field_checks: Vec<CheckResult> = checks
            .iter()
            .filter(|c| c.field() == Some(rule.field.as_str()))
            .filter_map(|c| results.get(&c.id).cloned())
            .collect();
        let status = roll_up(field_checks.iter().map(|c| c.status));
        fields.insert(
            rule.field.clone(),
            FieldReport {
                status,
                checks: field_checks,
            },
        );
    }

    let mut summary = Summary {
        total_checks: checks.len(),
        ..Summary::default()
    };
    for check in checks {
        match statuses[&check.id] {
            CheckStatus::Pass => summary.passed += 1,
            CheckStatus::Fail => summary.failed += 1,
            CheckStatus::Error => summary.errors += 1,
            CheckStatus::Skipped => summary.skipped += 1,
        }
    }

    let extra_check_status = checks
        .iter()
        .find(|c| c.kind() == CheckKind::ExtraField)
        .map(|c| statuses[&c.id]);

    let any_field_fail = fields.values().any(|f| f.status.is_fail());
    let strict_extras = schema.strict_mode && !schema_extras.is_empty();
    let any_error = fields.values().any(|f| f.status == CheckStatus::Error)
        || extra_check_status == Some(CheckStatus::Error);

    let status = if any_field_fail || strict_extras {
        CheckStatus::Fail
    } else if any_error {
        CheckStatus::Error
    } else {
        CheckStatus::Pass
    };

    Report {
        status,
        summary,
        schema_extras,
        fields,
    }
}

fn roll_up<I: Iterator<Item = CheckStatus>>(statuses: I) -> CheckStatus {
    let mut status = CheckStatus::Pass;
    for s in statuses {
        match s {
            CheckStatus::Fail => return CheckStatus::Fail,
            CheckStatus::Error => status = CheckStatus::Error,
            CheckStatus::Pass | CheckStatus::Skipped => {}
        }
    }
    status
}

fn extras_from_detail(detail: Option<&serde_json::Value>) -> Vec<String> {
    detail
        .and_then(|v| v.as_array())
        .map(|names| {
            names
                .iter()
                .filter_map(|n| n.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn detail_message(detail: &serde_json::Value) -> String {
    match detail.as_str() {
        Some(s) => s.to_string(),
        None => detail.to_string(),
    }
}
