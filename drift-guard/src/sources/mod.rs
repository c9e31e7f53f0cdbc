//! Data source adapters for the drift-guard validation engine.
//!
//! The core never speaks a SQL dialect directly; it plans against the
//! [`SourceAdapter`] contract and each driver declares what it can push
//! down via its [`SourceCapabilities`] profile. Adding a source type
//! means implementing one trait, not modifying the core.

use crate::error::Result;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt::Debug;

mod datafusion;
mod memory;

pub use self::datafusion::DataFusionAdapter;
pub use memory::MemoryAdapter;

/// Capability profile a source adapter declares once per run.
///
/// Immutable for the lifetime of one validation run; the planner queries
/// it exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCapabilities {
    /// The source can execute conditional-aggregation SQL natively.
    pub supports_pushdown: bool,
    /// The source's SQL dialect supports regex matching (`~`).
    pub supports_regex: bool,
    /// Maximum number of aggregation slots per pushdown statement.
    pub max_batch_size: Option<usize>,
    /// The adapter's session may be shared across concurrent query units.
    pub session_thread_safe: bool,
}

impl SourceCapabilities {
    /// Full pushdown profile: everything runs inside the source engine.
    pub fn pushdown() -> Self {
        Self {
            supports_pushdown: true,
            supports_regex: true,
            max_batch_size: None,
            session_thread_safe: true,
        }
    }

    /// Capability-less profile: every row check is evaluated locally via
    /// a batched full scan.
    pub fn scan_only() -> Self {
        Self {
            supports_pushdown: false,
            supports_regex: false,
            max_batch_size: None,
            session_thread_safe: true,
        }
    }
}

/// An ordered column descriptor from source introspection.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    /// Column name as the source reports it.
    pub name: String,
    /// Native type, normalized to Arrow's type system.
    pub native_type: DataType,
}

impl ColumnInfo {
    /// Creates a column descriptor.
    pub fn new(name: impl Into<String>, native_type: DataType) -> Self {
        Self {
            name: name.into(),
            native_type,
        }
    }
}

/// A lazily produced sequence of record batches from a full scan.
pub type RowStream = BoxStream<'static, Result<RecordBatch>>;

/// The contract every data source driver implements for the core.
///
/// The core requires a driver to expose a capability profile and a
/// query-execution contract, not to implement SQL itself. Connection
/// acquisition retry/backoff, where meaningful, is the adapter's
/// responsibility.
///
/// # Examples
///
/// ```rust,no_run
/// use drift_guard::sources::{DataFusionAdapter, SourceAdapter};
///
/// # async fn example() -> drift_guard::error::Result<()> {
/// let adapter = DataFusionAdapter::from_csv("data/users.csv").await?;
/// let columns = adapter.columns().await?;
/// println!("source has {} columns", columns.len());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait SourceAdapter: Debug + Send + Sync {
    /// Returns the adapter's declared capability profile.
    fn capabilities(&self) -> SourceCapabilities;

    /// Returns the table name pushdown statements should reference.
    fn table_name(&self) -> &str;

    /// Executes a pushdown query inside the source's own engine.
    async fn run_pushdown(&self, sql: &str) -> Result<Vec<RecordBatch>>;

    /// Streams the full row set for local evaluation.
    ///
    /// This is the fallback for capability-less sources; the engine
    /// consumes it as a batched full scan.
    async fn stream_rows(&self) -> Result<RowStream>;

    /// Returns the ordered `(name, native type)` column listing.
    async fn columns(&self) -> Result<Vec<ColumnInfo>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pushdown_profile() {
        let caps = SourceCapabilities::pushdown();
        assert!(caps.supports_pushdown);
        assert!(caps.supports_regex);
        assert!(caps.session_thread_safe);
        assert_eq!(caps.max_batch_size, None);
    }

    #[test]
    fn test_scan_only_profile() {
        let caps = SourceCapabilities::scan_only();
        assert!(!caps.supports_pushdown);
        assert!(!caps.supports_regex);
    }
}
