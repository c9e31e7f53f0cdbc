//! Validation run orchestration.
//!
//! [`Validator`] wires the pipeline together: decompose the schema into
//! atomic checks, plan query units against the adapter's capability
//! profile, execute them, and aggregate the raw outcomes into a report.
//! Each invocation is a pure function from (schema, live source) to
//! report; no state persists across runs.

use crate::checks::decompose;
use crate::engine::{EngineConfig, ExecutionEngine};
use crate::error::Result;
use crate::planner::{plan, PlannerConfig};
use crate::report::{aggregate, Report};
use crate::schema::SchemaDefinition;
use crate::sources::SourceAdapter;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Runs schema validations against a data source.
///
/// # Examples
///
/// ```rust,no_run
/// use drift_guard::prelude::*;
/// use drift_guard::schema::{FieldRule, FieldType, SchemaDefinition};
/// use drift_guard::sources::DataFusionAdapter;
///
/// # async fn example() -> drift_guard::error::Result<()> {
/// let schema = SchemaDefinition::builder()
///     .rule(FieldRule::new("user_id").typed(FieldType::Integer).required())
///     .rule(
///         FieldRule::new("user_tier")
///             .typed(FieldType::String)
///             .allowed_values(["FREE", "PREMIUM"]),
///     )
///     .strict_mode(true)
///     .build()?;
///
/// let adapter = DataFusionAdapter::from_csv("users.csv").await?;
/// let report = Validator::new().run(&schema, &adapter).await?;
/// println!("{}", report.to_json()?);
/// assert_eq!(report.exit_code(), if report.is_pass() { 0 } else { 1 });
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Validator {
    engine: EngineConfig,
}

impl Validator {
    /// Creates a validator with default engine settings.
    pub fn new() -> Self {
        Self {
            engine: EngineConfig::default(),
        }
    }

    /// Creates a builder for tuning engine settings.
    pub fn builder() -> ValidatorBuilder {
        ValidatorBuilder::new()
    }

    /// Runs the full validation pipeline.
    ///
    /// Fatal failures (schema inconsistency surfacing at plan time,
    /// connection loss) return `Err` and no report; everything else is
    /// absorbed into the report's check statuses.
    #[instrument(skip(self, schema, adapter), fields(
        schema.rules = schema.rules.len(),
        schema.strict = schema.strict_mode,
        source.table = adapter.table_name()
    ))]
    pub async fn run(
        &self,
        schema: &SchemaDefinition,
        adapter: &dyn SourceAdapter,
    ) -> Result<Report> {
        let start = Instant::now();

        let checks = decompose(schema);
        debug!(checks.total = checks.len(), "decomposed schema into atomic checks");

        let capabilities = adapter.capabilities();
        let planner_config = PlannerConfig {
            unit_timeout: self.engine.unit_timeout,
            case_insensitive: schema.case_insensitive,
        };
        let units = plan(&checks, &capabilities, adapter.table_name(), &planner_config)?;

        let raw = ExecutionEngine::new(self.engine.clone())
            .execute(units, adapter)
            .await?;

        let report = aggregate(schema, &checks, raw);
        info!(
            report.status = ?report.status,
            checks.total = report.summary.total_checks,
            checks.passed = report.summary.passed,
            checks.failed = report.summary.failed,
            checks.errors = report.summary.errors,
            checks.skipped = report.summary.skipped,
            duration_ms = start.elapsed().as_millis() as u64,
            "validation run completed"
        );
        Ok(report)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for constructing [`Validator`] instances.
#[derive(Debug, Default)]
pub struct ValidatorBuilder {
    engine: EngineConfig,
}

impl ValidatorBuilder {
    /// Creates a builder with default engine settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds the number of concurrently executing query units.
    pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.engine.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Sets the independent timeout applied to each query unit.
    pub fn unit_timeout(mut self, unit_timeout: Duration) -> Self {
        self.engine.unit_timeout = unit_timeout;
        self
    }

    /// Builds the validator.
    pub fn build(self) -> Validator {
        Validator {
            engine: self.engine,
        }
    }
}
