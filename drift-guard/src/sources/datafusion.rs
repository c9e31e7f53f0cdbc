//! DataFusion-backed source adapter.
//!
//! Wraps a DataFusion `SessionContext` holding one registered table.
//! File formats (CSV, NDJSON, Parquet) and in-memory record batches all
//! go through DataFusion, which means they plan as fully
//! pushdown-capable sources even though they are local files.

use super::{ColumnInfo, RowStream, SourceAdapter, SourceCapabilities};
use crate::error::{DriftError, Result};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::datasource::MemTable;
use datafusion::prelude::*;
use futures::StreamExt;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Default table name sources register under.
const DEFAULT_TABLE: &str = "data";

/// A source adapter executing pushdown queries through DataFusion.
pub struct DataFusionAdapter {
    ctx: SessionContext,
    table: String,
    capabilities: SourceCapabilities,
}

impl fmt::Debug for DataFusionAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFusionAdapter")
            .field("table", &self.table)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl DataFusionAdapter {
    fn new(ctx: SessionContext, table: String) -> Self {
        Self {
            ctx,
            table,
            capabilities: SourceCapabilities::pushdown(),
        }
    }

    /// Creates an adapter over a CSV file.
    ///
    /// Registration failures (missing file, unreadable header) are
    /// connection errors: the source cannot be reached at all.
    pub async fn from_csv(path: impl AsRef<str>) -> Result<Self> {
        let path = path.as_ref();
        let ctx = SessionContext::new();
        ctx.register_csv(DEFAULT_TABLE, path, CsvReadOptions::default())
            .await
            .map_err(|e| DriftError::connection(path, format!("failed to read CSV file: {e}")))?;
        debug!(source.path = %path, source.format = "csv", "registered file source");
        Ok(Self::new(ctx, DEFAULT_TABLE.to_string()))
    }

    /// Creates an adapter over a newline-delimited JSON file.
    pub async fn from_json(path: impl AsRef<str>) -> Result<Self> {
        let path = path.as_ref();
        let ctx = SessionContext::new();
        ctx.register_json(DEFAULT_TABLE, path, NdJsonReadOptions::default())
            .await
            .map_err(|e| DriftError::connection(path, format!("failed to read JSON file: {e}")))?;
        debug!(source.path = %path, source.format = "json", "registered file source");
        Ok(Self::new(ctx, DEFAULT_TABLE.to_string()))
    }

    /// Creates an adapter over a Parquet file.
    pub async fn from_parquet(path: impl AsRef<str>) -> Result<Self> {
        let path = path.as_ref();
        let ctx = SessionContext::new();
        ctx.register_parquet(DEFAULT_TABLE, path, ParquetReadOptions::default())
            .await
            .map_err(|e| {
                DriftError::connection(path, format!("failed to read Parquet file: {e}"))
            })?;
        debug!(source.path = %path, source.format = "parquet", "registered file source");
        Ok(Self::new(ctx, DEFAULT_TABLE.to_string()))
    }

    /// Creates an adapter over in-memory record batches.
    pub fn from_batches(batches: Vec<RecordBatch>) -> Result<Self> {
        let schema = batches
            .first()
            .map(|b| b.schema())
            .ok_or_else(|| DriftError::connection("memory", "no record batches provided"))?;
        let table = MemTable::try_new(schema, vec![batches])
            .map_err(|e| DriftError::connection("memory", e.to_string()))?;
        let ctx = SessionContext::new();
        ctx.register_table(DEFAULT_TABLE, Arc::new(table))
            .map_err(|e| DriftError::connection("memory", e.to_string()))?;
        Ok(Self::new(ctx, DEFAULT_TABLE.to_string()))
    }

    /// Creates an adapter over a caller-managed context and table.
    ///
    /// Use this when registration (object stores, catalogs) happens
    /// outside the adapter.
    pub fn from_context(ctx: SessionContext, table: impl Into<String>) -> Self {
        Self::new(ctx, table.into())
    }

    /// Narrows the declared capability profile.
    ///
    /// Mirrors engines with fewer pushdown features than DataFusion; the
    /// planner will route the affected checks through the local-scan
    /// path instead.
    pub fn with_capabilities(mut self, capabilities: SourceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

#[async_trait]
impl SourceAdapter for DataFusionAdapter {
    fn capabilities(&self) -> SourceCapabilities {
        self.capabilities.clone()
    }

    fn table_name(&self) -> &str {
        &self.table
    }

    async fn run_pushdown(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        let df = self.ctx.sql(sql).await?;
        Ok(df.collect().await?)
    }

    async fn stream_rows(&self) -> Result<RowStream> {
        let df = self.ctx.table(self.table.as_str()).await?;
        let stream = df.execute_stream().await?;
        Ok(stream.map(|r| r.map_err(DriftError::from)).boxed())
    }

    async fn columns(&self) -> Result<Vec<ColumnInfo>> {
        let df = self.ctx.table(self.table.as_str()).await?;
        Ok(df
            .schema()
            .fields()
            .iter()
            .map(|f| ColumnInfo::new(f.name(), f.data_type().clone()))
            .collect())
    }
}
