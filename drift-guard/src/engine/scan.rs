//! Batched full-scan evaluation for capability-less sources.
//!
//! When a source cannot push a check down, its rows are streamed to the
//! caller and every probe is evaluated in process, one pass over the
//! data for all probes together. Values are normalized through Arrow
//! casts: strings for set/pattern probes, doubles for range probes.
//! Uncastable values become nulls and never count as violations; the
//! corresponding `TYPE` failure skips the dependent check anyway.

use crate::checks::CheckId;
use crate::engine::RawOutcome;
use crate::error::{DriftError, Result};
use crate::planner::{ProbePredicate, RowProbe};
use crate::sources::SourceAdapter;
use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use futures::StreamExt;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

enum ProbeCounter {
    NotNull,
    Enum(HashSet<String>),
    Range { min: Option<f64>, max: Option<f64> },
    Regex(Regex),
}

struct CompiledProbe {
    check: CheckId,
    column_key: String,
    counter: ProbeCounter,
    present: bool,
    violations: u64,
}

/// Streams the full row set once and counts violations for every probe.
pub(crate) async fn run_local_scan(
    probes: &[RowProbe],
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

    // Presence is decided from introspection, not per batch, so an empty
    // source still yields zero-violation outcomes for present columns.
    let column_keys: HashSet<String> = adapter
        .columns()
        .await?
        .into_iter()
        .map(|c| key(&c.name))
        .collect();

    let mut compiled = Vec::with_capacity(probes.len());
    for probe in probes {
        let counter = match &probe.predicate {
            ProbePredicate::NotNull => ProbeCounter::NotNull,
            ProbePredicate::Enum { allowed } => {
                ProbeCounter::Enum(allowed.iter().cloned().collect())
            }
            ProbePredicate::Range { min, max } => ProbeCounter::Range {
                min: *min,
                max: *max,
            },
            ProbePredicate::Regex { pattern } => {
                // Patterns were validated at schema parse time.
                let regex = Regex::new(pattern).map_err(|e| {
                    DriftError::Internal(format!("probe pattern failed to compile: {e}"))
                })?;
                ProbeCounter::Regex(regex)
            }
        };
        let column_key = key(&probe.column);
        compiled.push(CompiledProbe {
            check: probe.check.clone(),
            present: column_keys.contains(&column_key),
            column_key,
            counter,
            violations: 0,
        });
    }

    let mut rows_scanned = 0usize;
    let mut stream = adapter.stream_rows().await?;
    while let Some(batch) = stream.next().await {
        let batch = batch?;
        rows_scanned += batch.num_rows();
        for probe in compiled.iter_mut() {
            if !probe.present {
                continue;
            }
            if let Some(column) = lookup_column(&batch, &probe.column_key, case_insensitive) {
                probe.violations += count_violations(&probe.counter, &column)?;
            }
        }
    }

    debug!(
        scan.rows = rows_scanned,
        scan.probes = compiled.len(),
        "local scan completed"
    );

    // Probes for absent columns record no outcome; their EXISTS
    // prerequisite fails and the aggregator skips them.
    Ok(compiled
        .into_iter()
        .filter(|p| p.present)
        .map(|p| {
            (
                p.check,
                RawOutcome::Violations {
                    count: p.violations,
                    detail: None,
                },
            )
        })
        .collect())
}

fn lookup_column(batch: &RecordBatch, column_key: &str, case_insensitive: bool) -> Option<ArrayRef> {
    let schema = batch.schema();
    let index = schema.fields().iter().position(|f| {
        if case_insensitive {
            f.name().to_lowercase() == column_key
        } else {
            f.name() == column_key
        }
    })?;
    Some(batch.column(index).clone())
}

fn count_violations(counter: &ProbeCounter, column: &ArrayRef) -> Result<u64> {
    match counter {
        ProbeCounter::NotNull => Ok(column.null_count() as u64),
        ProbeCounter::Enum(allowed) => {
            let strings = as_strings(column)?;
            Ok(string_violations(&strings, |v| !allowed.contains(v)))
        }
        ProbeCounter::Regex(regex) => {
            let strings = as_strings(column)?;
            Ok(string_violations(&strings, |v| !regex.is_match(v)))
        }
        ProbeCounter::Range { min, max } => {
            let doubles = cast(column, &DataType::Float64)?;
            let doubles = doubles
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| DriftError::Internal("range cast produced non-float".into()))?;
            let mut violations = 0u64;
            for i in 0..doubles.len() {
                if doubles.is_null(i) {
                    continue;
                }
                let value = doubles.value(i);
                let below = min.map(|m| value < m).unwrap_or(false);
                let above = max.map(|m| value > m).unwrap_or(false);
                if below || above {
                    violations += 1;
                }
            }
            Ok(violations)
        }
    }
}

fn as_strings(column: &ArrayRef) -> Result<StringArray> {
    let strings = cast(column, &DataType::Utf8)?;
    strings
        .as_any()
        .downcast_ref::<StringArray>()
        .cloned()
        .ok_or_else(|| DriftError::Internal("string cast produced non-utf8".into()))
}

fn string_violations<F>(strings: &StringArray, is_violation: F) -> u64
where
    F: Fn(&str) -> bool,
{
    let mut violations = 0u64;
    for i in 0..strings.len() {
        if strings.is_null(i) {
            continue;
        }
        if is_violation(strings.value(i)) {
            violations += 1;
        }
    }
    violations
}
