//! # Drift Guard - Schema Drift Validation for Rust
//!
//! Drift Guard validates that a tabular data source still conforms to a
//! declared schema: column presence, native types, nullability, allowed
//! values, numeric bounds and textual patterns. It decomposes the schema
//! into dependency-ordered atomic checks, pushes them down into the
//! source's own query engine where the source's capability profile
//! allows, falls back to a batched full scan where it does not, and
//! folds everything into one deterministic report with a stable
//! exit-status contract.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use drift_guard::prelude::*;
//! use drift_guard::schema::{FieldRule, FieldType, SchemaDefinition};
//! use drift_guard::sources::DataFusionAdapter;
//!
//! # async fn example() -> drift_guard::error::Result<()> {
//! // Declare the expected structure
//! let schema = SchemaDefinition::builder()
//!     .rule(FieldRule::new("user_id").typed(FieldType::Integer).required())
//!     .rule(
//!         FieldRule::new("user_tier")
//!             .typed(FieldType::String)
//!             .allowed_values(["FREE", "PREMIUM"]),
//!     )
//!     .rule(
//!         FieldRule::new("age")
//!             .typed(FieldType::Integer)
//!             .min(0.0)
//!             .max(120.0),
//!     )
//!     .strict_mode(true)
//!     .build()?;
//!
//! // Point an adapter at the live source
//! let adapter = DataFusionAdapter::from_csv("data/users.csv").await?;
//!
//! // Run validation
//! let report = Validator::new().run(&schema, &adapter).await?;
//!
//! if report.is_pass() {
//!     println!("no drift detected");
//! } else {
//!     for (field, field_report) in &report.fields {
//!         for check in &field_report.checks {
//!             if check.status.is_fail() {
//!                 println!("{field}: {} ({} violations)", check.rule, check.violations);
//!             }
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Schemas can equally be parsed from their JSON form with
//! [`SchemaDefinition::from_json`](schema::SchemaDefinition::from_json),
//! and reports serialize back to JSON with
//! [`Report::to_json`](report::Report::to_json).
//!
//! ## Exit-status contract
//!
//! - `0` - no drift, every check passed
//! - `1` - drift detected, or checks could not be decided
//! - `2` - fatal run failure (connection or schema parse); no report
//!
//! The split between `1` and `2` lets automation distinguish "validation
//! failed" from "could not validate"; see the [`exit`] module.
//!
//! ## Architecture
//!
//! - **[`schema`]**: typed schema model with parse-time constraint
//!   validation
//! - **[`checks`]**: the rule decomposer; one field rule expands into
//!   dependency-ordered atomic checks
//! - **[`planner`]**: capability-aware query planner; batches every
//!   pushdown-capable check on a table into a single
//!   conditional-aggregation statement to minimize full scans
//! - **[`engine`]**: bounded-concurrency execution with per-unit
//!   timeouts, local-failure isolation and fatal-error cancellation
//! - **[`report`]**: result aggregation honoring the check dependency
//!   graph
//! - **[`sources`]**: the [`SourceAdapter`](sources::SourceAdapter)
//!   contract plus DataFusion-backed and in-memory adapters
//! - **[`exit`]**: the process exit-status mapping
//!
//! Adding a source type means implementing the adapter trait, not
//! modifying the core: dialect specifics stay behind the capability
//! profile.

pub mod checks;
pub mod engine;
pub mod error;
pub mod exit;
pub mod logging;
pub mod planner;
pub mod prelude;
pub mod report;
pub mod schema;
pub mod security;
pub mod sources;
pub mod validator;
