//! In-memory source adapter backed by Arrow record batches.
//!
//! Declares the capability-less profile by default, which makes it the
//! reference driver for the local-scan evaluation path and the main
//! fixture for tests that need a source without a query engine.

use super::{ColumnInfo, RowStream, SourceAdapter, SourceCapabilities};
use crate::error::{DriftError, Result};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;

/// A source adapter serving rows straight from memory.
#[derive(Debug)]
pub struct MemoryAdapter {
    batches: Arc<Vec<RecordBatch>>,
    schema: SchemaRef,
    table: String,
    capabilities: SourceCapabilities,
}

impl MemoryAdapter {
    /// Creates an adapter over non-empty record batches.
    pub fn new(batches: Vec<RecordBatch>) -> Result<Self> {
        let schema = batches
            .first()
            .map(|b| b.schema())
            .ok_or_else(|| DriftError::connection("memory", "no record batches provided"))?;
        Ok(Self::with_schema(schema, batches))
    }

    /// Creates an adapter with an explicit schema; the batch list may be
    /// empty (a present-but-empty source).
    pub fn with_schema(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self {
            batches: Arc::new(batches),
            schema,
            table: "data".to_string(),
            capabilities: SourceCapabilities::scan_only(),
        }
    }

    /// Overrides the declared capability profile.
    ///
    /// Tests use this to simulate drivers with partial pushdown support;
    /// note the adapter itself can never execute SQL, so declaring
    /// pushdown support makes those units fail at execution time.
    pub fn with_capabilities(mut self, capabilities: SourceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

#[async_trait]
impl SourceAdapter for MemoryAdapter {
    fn capabilities(&self) -> SourceCapabilities {
        self.capabilities.clone()
    }

    fn table_name(&self) -> &str {
        &self.table
    }

    async fn run_pushdown(&self, _sql: &str) -> Result<Vec<RecordBatch>> {
        Err(DriftError::NotSupported(
            "memory source has no query engine to push down into".to_string(),
        ))
    }

    async fn stream_rows(&self) -> Result<RowStream> {
        let batches: Vec<RecordBatch> = self.batches.as_ref().clone();
        Ok(futures::stream::iter(batches.into_iter().map(Ok)).boxed())
    }

    async fn columns(&self) -> Result<Vec<ColumnInfo>> {
        Ok(self
            .schema
            .fields()
            .iter()
            .map(|f| ColumnInfo::new(f.name(), f.data_type().clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};

    fn sample_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2]))]).unwrap()
    }

    #[tokio::test]
    async fn test_columns_and_stream() {
        let adapter = MemoryAdapter::new(vec![sample_batch()]).unwrap();
        let columns = adapter.columns().await.unwrap();
        assert_eq!(columns[0].name, "id");

        let mut stream = adapter.stream_rows().await.unwrap();
        let batch = stream.next().await.unwrap().unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_pushdown_not_supported() {
        let adapter = MemoryAdapter::new(vec![sample_batch()]).unwrap();
        let err = adapter.run_pushdown("SELECT 1").await.unwrap_err();
        assert!(matches!(err, DriftError::NotSupported(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_empty_source_with_schema() {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let adapter = MemoryAdapter::with_schema(schema, Vec::new());
        assert_eq!(adapter.columns().await.unwrap().len(), 1);
        let mut stream = adapter.stream_rows().await.unwrap();
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_new_requires_batches() {
        assert!(MemoryAdapter::new(Vec::new()).is_err());
    }
}
