//! Failure semantics: fatal connection errors abort the run, local
//! query failures degrade only the affected checks.

use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use drift_guard::checks::CheckKind;
use drift_guard::error::DriftError;
use drift_guard::prelude::*;
use drift_guard::schema::FieldRule;
use drift_guard::sources::{ColumnInfo, MemoryAdapter, RowStream};
use std::sync::Arc;
use std::time::Duration;

fn user_schema() -> SchemaDefinition {
    SchemaDefinition::builder()
        .rule(FieldRule::new("user_id").typed(FieldType::Integer).required())
        .rule(
            FieldRule::new("user_tier")
                .typed(FieldType::String)
                .allowed_values(["FREE", "PREMIUM"]),
        )
        .build()
        .unwrap()
}

fn users_batch() -> RecordBatch {
    let schema = Arc::new(ArrowSchema::new(vec![
        Field::new("user_id", DataType::Int64, false),
        Field::new("user_tier", DataType::Utf8, true),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2])),
            Arc::new(StringArray::from(vec![Some("FREE"), Some("PREMIUM")])),
        ],
    )
    .unwrap()
}

/// An adapter whose source is unreachable.
#[derive(Debug)]
struct UnreachableAdapter;

#[async_trait]
impl SourceAdapter for UnreachableAdapter {
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::scan_only()
    }

    fn table_name(&self) -> &str {
        "data"
    }

    async fn run_pushdown(&self, _sql: &str) -> drift_guard::error::Result<Vec<RecordBatch>> {
        Err(DriftError::connection("orders_db", "connection refused"))
    }

    async fn stream_rows(&self) -> drift_guard::error::Result<RowStream> {
        Err(DriftError::connection("orders_db", "connection refused"))
    }

    async fn columns(&self) -> drift_guard::error::Result<Vec<ColumnInfo>> {
        Err(DriftError::connection("orders_db", "connection refused"))
    }
}

/// An adapter that serves metadata and rows slowly.
#[derive(Debug)]
struct SlowScanAdapter {
    inner: MemoryAdapter,
    delay: Duration,
}

#[async_trait]
impl SourceAdapter for SlowScanAdapter {
    fn capabilities(&self) -> SourceCapabilities {
        self.inner.capabilities()
    }

    fn table_name(&self) -> &str {
        self.inner.table_name()
    }

    async fn run_pushdown(&self, sql: &str) -> drift_guard::error::Result<Vec<RecordBatch>> {
        self.inner.run_pushdown(sql).await
    }

    async fn stream_rows(&self) -> drift_guard::error::Result<RowStream> {
        tokio::time::sleep(self.delay).await;
        self.inner.stream_rows().await
    }

    async fn columns(&self) -> drift_guard::error::Result<Vec<ColumnInfo>> {
        self.inner.columns().await
    }
}

#[tokio::test]
async fn scenario_c_connection_error_is_fatal_with_exit_two() {
    let outcome = Validator::new().run(&user_schema(), &UnreachableAdapter).await;

    let err = outcome.as_ref().unwrap_err();
    assert!(matches!(err, DriftError::Connection { .. }));
    assert!(err.is_fatal());
    assert_eq!(exit_code(&outcome), EXIT_FATAL);
}

#[tokio::test]
async fn schema_parse_failure_is_fatal_with_exit_two() {
    let outcome: drift_guard::error::Result<Report> =
        Err(SchemaDefinition::from_json("{\"rules\": 42}").unwrap_err());
    assert_eq!(exit_code(&outcome), EXIT_FATAL);
}

#[tokio::test]
async fn broken_pushdown_degrades_only_row_checks() {
    // Declares pushdown support it cannot honor: the batched row query
    // fails, the metadata unit still resolves.
    let adapter = MemoryAdapter::new(vec![users_batch()])
        .unwrap()
        .with_capabilities(SourceCapabilities::pushdown());

    let outcome = Validator::new().run(&user_schema(), &adapter).await;
    let report = outcome.as_ref().unwrap();

    let exists = report.fields["user_id"]
        .checks
        .iter()
        .find(|c| c.rule == CheckKind::Exists)
        .unwrap();
    assert_eq!(exists.status, CheckStatus::Pass);

    let not_null = report.fields["user_id"]
        .checks
        .iter()
        .find(|c| c.rule == CheckKind::NotNull)
        .unwrap();
    assert_eq!(not_null.status, CheckStatus::Error);
    assert!(not_null.message.as_deref().unwrap().contains("not supported"));

    assert_eq!(report.status, CheckStatus::Error);
    assert!(report.summary.errors >= 2);
    assert_eq!(exit_code(&outcome), EXIT_DRIFT);
}

#[tokio::test]
async fn unit_timeout_resolves_checks_to_error_not_fail() {
    let adapter = SlowScanAdapter {
        inner: MemoryAdapter::new(vec![users_batch()]).unwrap(),
        delay: Duration::from_millis(500),
    };

    let validator = Validator::builder()
        .unit_timeout(Duration::from_millis(50))
        .build();
    let report = validator.run(&user_schema(), &adapter).await.unwrap();

    // Metadata checks finish well inside the timeout.
    let exists = report.fields["user_tier"]
        .checks
        .iter()
        .find(|c| c.rule == CheckKind::Exists)
        .unwrap();
    assert_eq!(exists.status, CheckStatus::Pass);

    // The scan unit lapses; its checks error rather than fail.
    let enum_check = report.fields["user_tier"]
        .checks
        .iter()
        .find(|c| c.rule == CheckKind::Enum)
        .unwrap();
    assert_eq!(enum_check.status, CheckStatus::Error);
    assert!(enum_check.message.as_deref().unwrap().contains("timed out"));

    assert_eq!(report.status, CheckStatus::Error);
    assert_eq!(report.summary.failed, 0);
}

#[tokio::test]
async fn serialized_session_still_completes() {
    let caps = SourceCapabilities {
        session_thread_safe: false,
        ..SourceCapabilities::scan_only()
    };
    let adapter = MemoryAdapter::new(vec![users_batch()])
        .unwrap()
        .with_capabilities(caps);

    let report = Validator::builder()
        .max_concurrency(4)
        .build()
        .run(&user_schema(), &adapter)
        .await
        .unwrap();

    assert_eq!(report.status, CheckStatus::Pass);
}
