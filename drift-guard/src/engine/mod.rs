//! Execution engine: dispatches planned query units against a source
//! adapter.
//!
//! Units with no unsatisfied data dependency run concurrently, bounded
//! by a worker pool. A connection-level failure is fatal and cancels
//! everything in flight; a per-unit failure only degrades that unit's
//! checks to `error` status. Each unit carries an independent timeout.

mod scan;

use crate::checks::CheckId;
use crate::error::{DriftError, Result};
use crate::planner::{Introspection, PushdownSlot, QueryUnit, UnitWork};
use crate::schema::FieldType;
use crate::sources::{ColumnInfo, SourceAdapter};
use arrow::array::Int64Array;
use arrow::datatypes::DataType;
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// Raw outcome of one check before aggregation.
#[derive(Debug, Clone)]
pub enum RawOutcome {
    /// The unit executed; the check observed this many violations.
    Violations {
        /// Violating rows (or missing/extra columns for metadata checks).
        count: u64,
        /// Diagnostic payload surfaced into the report.
        detail: Option<serde_json::Value>,
    },
    /// The unit failed or timed out; the check cannot be decided.
    Errored {
        /// What went wrong.
        message: String,
    },
}

impl RawOutcome {
    fn violations(count: u64) -> Self {
        RawOutcome::Violations {
            count,
            detail: None,
        }
    }

    fn violations_with_detail(count: u64, detail: serde_json::Value) -> Self {
        RawOutcome::Violations {
            count,
            detail: Some(detail),
        }
    }

    fn errored(message: impl Into<String>) -> Self {
        RawOutcome::Errored {
            message: message.into(),
        }
    }
}

/// Raw execution results keyed by check identity.
///
/// Keying by identity (not arrival order) is what lets the aggregator
/// emit fields in schema order regardless of completion order.
pub type RawResults = HashMap<CheckId, RawOutcome>;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on concurrently executing query units.
    pub max_concurrency: usize,
    /// Independent timeout applied to each unit.
    pub unit_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // Sized to avoid overwhelming a source's connection limit.
            max_concurrency: num_cpus::get().clamp(1, 8),
            unit_timeout: Duration::from_secs(30),
        }
    }
}

/// Dispatches planned query units and collects raw outcomes.
#[derive(Debug)]
pub struct ExecutionEngine {
    config: EngineConfig,
}

impl ExecutionEngine {
    /// Creates an engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Executes every unit, returning outcomes keyed by check identity.
    ///
    /// Returns `Err` only for fatal failures; dropping the in-progress
    /// stream cancels queued and in-flight units, so no partial results
    /// survive a fatal error.
    #[instrument(skip(self, units, adapter), fields(units = units.len()))]
    pub async fn execute(
        &self,
        units: Vec<QueryUnit>,
        adapter: &dyn SourceAdapter,
    ) -> Result<RawResults> {
        let serialize_session = !adapter.capabilities().session_thread_safe;
        let session_gate = Mutex::new(());
        let gate = &session_gate;

        let mut in_flight = stream::iter(units)
            .map(|unit| async move {
                let _guard = if serialize_session {
                    Some(gate.lock().await)
                } else {
                    None
                };
                run_unit(unit, adapter).await
            })
            .buffer_unordered(self.config.max_concurrency.max(1));

        let mut results = RawResults::new();
        while let Some(outcome) = in_flight.next().await {
            results.extend(outcome?);
        }
        Ok(results)
    }
}

/// Runs one unit, absorbing local failures into `Errored` outcomes.
///
/// Only fatal errors (connection loss) propagate as `Err`.
async fn run_unit(
    unit: QueryUnit,
    adapter: &dyn SourceAdapter,
) -> Result<Vec<(CheckId, RawOutcome)>> {
    let unit_id = unit.id;
    let unit_timeout = unit.timeout;
    let check_ids = unit.check_ids();

    match timeout(unit_timeout, dispatch(&unit, adapter)).await {
        Err(_elapsed) => {
            warn!(
                unit.id = unit_id,
                unit.timeout_ms = unit_timeout.as_millis() as u64,
                "query unit timed out"
            );
            let message = format!(
                "query unit timed out after {}ms",
                unit_timeout.as_millis()
            );
            Ok(errored_entries(check_ids, &message))
        }
        Ok(Err(e)) if e.is_fatal() => Err(e),
        Ok(Err(e)) => {
            warn!(
                unit.id = unit_id,
                error = %e,
                "query unit failed, continuing with independent units"
            );
            Ok(errored_entries(check_ids, &e.to_string()))
        }
        Ok(Ok(entries)) => Ok(entries),
    }
}

fn errored_entries(check_ids: Vec<CheckId>, message: &str) -> Vec<(CheckId, RawOutcome)> {
    check_ids
        .into_iter()
        .map(|id| (id, RawOutcome::errored(message)))
        .collect()
}

async fn dispatch(
    unit: &QueryUnit,
    adapter: &dyn SourceAdapter,
) -> Result<Vec<(CheckId, RawOutcome)>> {
    match &unit.work {
        UnitWork::Introspect {
            expectations,
            case_insensitive,
        } => run_introspection(expectations, *case_insensitive, adapter).await,
        UnitWork::Pushdown {
            table,
            slots,
            case_insensitive,
        } => run_pushdown(table, slots, *case_insensitive, adapter).await,
        UnitWork::LocalScan {
            probes,
            case_insensitive,
        } => scan::run_local_scan(probes, *case_insensitive, adapter).await,
    }
}

/// Resolves metadata expectations against the adapter's column listing.
async fn run_introspection(
    expectations: &[Introspection],
    case_insensitive: bool,
    adapter: &dyn SourceAdapter,
) -> Result<Vec<(CheckId, RawOutcome)>> {
    let columns = adapter.columns().await?;
    let key = |name: &str| {
        if case_insensitive {
            name.to_lowercase()
        } else {
            name.to_string()
        }
    };
    let by_key: HashMap<String, &ColumnInfo> =
        columns.iter().map(|c| (key(&c.name), c)).collect();

    let mut entries = Vec::new();
    for expectation in expectations {
        match expectation {
            Introspection::Exists { check, field } => {
                let outcome = if by_key.contains_key(&key(field)) {
                    RawOutcome::violations(0)
                } else {
                    RawOutcome::violations_with_detail(
                        1,
                        json!(format!("column '{field}' not found in source")),
                    )
                };
                entries.push((check.clone(), outcome));
            }
            Introspection::Type {
                check,
                field,
                declared,
            } => {
                // With the column absent, EXISTS fails and the aggregator
                // skips this check; no outcome is recorded.
                if let Some(column) = by_key.get(&key(field)) {
                    let outcome = if type_compatible(*declared, &column.native_type) {
                        RawOutcome::violations(0)
                    } else {
                        RawOutcome::violations_with_detail(
                            1,
                            json!(format!(
                                "declared type {declared}, source type {}",
                                column.native_type
                            )),
                        )
                    };
                    entries.push((check.clone(), outcome));
                }
            }
            Introspection::ExtraFields { check, declared } => {
                let declared_keys: HashSet<String> = declared.iter().map(|f| key(f)).collect();
                let extras: Vec<String> = columns
                    .iter()
                    .filter(|c| !declared_keys.contains(&key(&c.name)))
                    .map(|c| c.name.clone())
                    .collect();
                entries.push((
                    check.clone(),
                    RawOutcome::violations_with_detail(extras.len() as u64, json!(extras)),
                ));
            }
        }
    }
    Ok(entries)
}

/// Maps a declared logical type onto the Arrow native types that satisfy it.
fn type_compatible(declared: FieldType, native: &DataType) -> bool {
    match declared {
        FieldType::Integer => matches!(
            native,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        ),
        // Integer columns satisfy a float declaration; the reverse does not hold.
        FieldType::Float => matches!(
            native,
            DataType::Float16
                | DataType::Float32
                | DataType::Float64
                | DataType::Decimal128(_, _)
                | DataType::Decimal256(_, _)
        ) || type_compatible(FieldType::Integer, native),
        FieldType::String => matches!(
            native,
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
        ),
        FieldType::Boolean => matches!(native, DataType::Boolean),
        FieldType::Date => matches!(native, DataType::Date32 | DataType::Date64),
        FieldType::Timestamp => matches!(native, DataType::Timestamp(_, _)),
    }
}

/// Executes one batched conditional-aggregation statement and maps the
/// `m<i>` result columns back onto check identities by position.
///
/// Slots whose column is absent from the source are dropped before the
/// statement is assembled: a missing column must fail its own `EXISTS`
/// check, not poison every sibling in the batch. Dropped slots record
/// no outcome and resolve through the aggregator's skip rule.
async fn run_pushdown(
    table: &str,
    slots: &[PushdownSlot],
    case_insensitive: bool,
    adapter: &dyn SourceAdapter,
) -> Result<Vec<(CheckId, RawOutcome)>> {
    let key = |name: &str| {
        if case_insensitive {
            name.to_lowercase()
        } else {
            name.to_string()
        }
    };
    let present: HashSet<String> = adapter
        .columns()
        .await?
        .into_iter()
        .map(|c| key(&c.name))
        .collect();

    let surviving: Vec<&PushdownSlot> = slots
        .iter()
        .filter(|s| present.contains(&key(&s.column)))
        .collect();
    if surviving.len() < slots.len() {
        debug!(
            pushdown.slots = slots.len(),
            pushdown.surviving = surviving.len(),
            "dropped pushdown slots for absent columns"
        );
    }
    if surviving.is_empty() {
        return Ok(Vec::new());
    }

    let select_list: Vec<String> = surviving
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{} AS m{i}", s.aggregate))
        .collect();
    let sql = format!("SELECT {} FROM {table}", select_list.join(", "));

    let batches = adapter.run_pushdown(&sql).await?;
    let batch = batches
        .iter()
        .find(|b| b.num_rows() > 0)
        .ok_or_else(|| DriftError::CheckExecution("pushdown query returned no rows".into()))?;

    if batch.num_columns() < surviving.len() {
        return Err(DriftError::CheckExecution(format!(
            "pushdown query returned {} columns for {} checks",
            batch.num_columns(),
            surviving.len()
        )));
    }

    let mut entries = Vec::new();
    for (i, slot) in surviving.iter().enumerate() {
        let count = batch
            .column(i)
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| {
                DriftError::CheckExecution(format!(
                    "aggregate column m{i} is not a 64-bit count"
                ))
            })?
            .value(0);
        entries.push((
            slot.check.clone(),
            RawOutcome::violations(count.max(0) as u64),
        ));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::CheckKind;

    #[test]
    fn test_type_compatibility() {
        assert!(type_compatible(FieldType::Integer, &DataType::Int64));
        assert!(type_compatible(FieldType::Float, &DataType::Float64));
        assert!(type_compatible(FieldType::Float, &DataType::Int32));
        assert!(!type_compatible(FieldType::Integer, &DataType::Utf8));
        assert!(!type_compatible(FieldType::String, &DataType::Int64));
        assert!(type_compatible(FieldType::String, &DataType::Utf8View));
        assert!(type_compatible(
            FieldType::Timestamp,
            &DataType::Timestamp(arrow::datatypes::TimeUnit::Microsecond, None)
        ));
        assert!(!type_compatible(FieldType::Date, &DataType::Utf8));
    }

    #[test]
    fn test_errored_entries_cover_all_checks() {
        let ids = vec![
            CheckId::field_check("a", CheckKind::NotNull),
            CheckId::field_check("b", CheckKind::Enum),
        ];
        let entries = errored_entries(ids.clone(), "boom");
        assert_eq!(entries.len(), 2);
        for (id, outcome) in entries {
            assert!(ids.contains(&id));
            assert!(matches!(outcome, RawOutcome::Errored { .. }));
        }
    }

    #[test]
    fn test_default_config_bounds_concurrency() {
        let config = EngineConfig::default();
        assert!(config.max_concurrency >= 1);
        assert!(config.max_concurrency <= 8);
    }
}
