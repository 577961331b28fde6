//! DataFusion glue: a `TableProvider` per table and the leaf `ExecutionPlan`
//! that streams one `RecordBatch` per fetched page.
//!
//! The connection is materialized lazily on the first `execute()`, so
//! registering tables never touches the network.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use async_trait::async_trait;
use datafusion::catalog::Session;
use datafusion::datasource::TableProvider;
use datafusion::error::{DataFusionError, Result as DFResult};
use datafusion::execution::TaskContext;
use datafusion::logical_expr::{TableProviderFilterPushDown, TableType};
use datafusion::physical_expr::EquivalenceProperties;
use datafusion::physical_plan::execution_plan::{Boundedness, EmissionType};
use datafusion::physical_plan::stream::RecordBatchReceiverStream;
use datafusion::physical_plan::{
    DisplayAs, DisplayFormatType, ExecutionPlan, Partitioning, PlanProperties,
    SendableRecordBatchStream,
};
use datafusion::prelude::Expr;
use prismacloud_client::{ConnectionConfig, ConnectionPool};
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, warn};

use crate::error::{Result, TableError};
use crate::paginate::RowSink;
use crate::project::{arrow_schema, rows_to_batch, ColumnDef, ColumnSource, Projector, Row, RowProjector};
use crate::qual::{Qual, Quals};
use crate::table::{QueryContext, Scan, TableDescriptor};

/// Batches buffered between the fetch task and the consumer.
const CHANNEL_CAPACITY: usize = 1;

/// Where a table gets its connection from.
#[derive(Debug, Clone)]
pub struct ConnectionSource {
    pub pool: Arc<ConnectionPool>,
    pub name: String,
    pub config: Arc<ConnectionConfig>,
}

// ---------------------------------------------------------------------------
// PrismaTable
// ---------------------------------------------------------------------------

/// A `TableProvider` backed by one table descriptor.
pub struct PrismaTable {
    descriptor: Arc<TableDescriptor>,
    schema: SchemaRef,
    source: ConnectionSource,
}

impl fmt::Debug for PrismaTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrismaTable")
            .field("table", &self.descriptor.name)
            .field("connection", &self.source.name)
            .finish()
    }
}

impl PrismaTable {
    pub fn new(descriptor: Arc<TableDescriptor>, source: ConnectionSource) -> Self {
        let schema = arrow_schema(&descriptor.columns);
        Self {
            descriptor,
            schema,
            source,
        }
    }

    pub fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }

    /// Predicates the table's list or get call translates.
    fn pushed_quals(&self, filters: &[Expr]) -> Quals {
        filters
            .iter()
            .filter_map(Qual::from_expr)
            .filter(|q| self.descriptor.accepts(q))
            .collect()
    }
}

#[async_trait]
impl TableProvider for PrismaTable {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn table_type(&self) -> TableType {
        TableType::Base
    }

    fn supports_filters_pushdown(
        &self,
        filters: &[&Expr],
    ) -> DFResult<Vec<TableProviderFilterPushDown>> {
        let parsed: Vec<Option<Qual>> = filters.iter().map(|expr| Qual::from_expr(expr)).collect();
        let all: Quals = parsed.iter().flatten().cloned().collect();

        // Exact filters leave no Filter above the scan, so a LIMIT reaches it.
        Ok(parsed
            .iter()
            .map(|qual| match qual {
                Some(q) if self.descriptor.applies_exactly(q, &all) => {
                    TableProviderFilterPushDown::Exact
                }
                Some(q) if self.descriptor.accepts(q) => TableProviderFilterPushDown::Inexact,
                _ => TableProviderFilterPushDown::Unsupported,
            })
            .collect())
    }

    async fn scan(
        &self,
        _state: &dyn Session,
        projection: Option<&Vec<usize>>,
        filters: &[Expr],
        limit: Option<usize>,
    ) -> DFResult<Arc<dyn ExecutionPlan>> {
        let ctx = QueryContext::new(self.descriptor.name, self.pushed_quals(filters), limit);

        if let Some(column) = self.descriptor.missing_required(&ctx.quals) {
            return Err(TableError::MissingKeyColumn {
                operation: ctx.operation("scan"),
                column: column.to_string(),
            }
            .into());
        }

        let projected_schema = match projection {
            Some(indices) => Arc::new(self.schema.project(indices)?),
            None => Arc::clone(&self.schema),
        };
        debug!(
            "{}: scan with {} pushed predicate(s), limit {:?}",
            ctx.operation("scan"),
            ctx.quals.len(),
            limit
        );

        Ok(Arc::new(PrismaScanExec::new(
            Arc::clone(&self.descriptor),
            self.source.clone(),
            ctx,
            projection.cloned(),
            projected_schema,
        )))
    }
}

// ---------------------------------------------------------------------------
// PrismaScanExec
// ---------------------------------------------------------------------------

/// Leaf plan that runs one table scan against the API.
///
/// Exactly one output partition. The fetch runs in a spawned task feeding a
/// bounded channel; dropping the stream closes the channel, which the sink
/// reports to the paginator as zero demand.
#[derive(Debug)]
pub struct PrismaScanExec {
    descriptor: Arc<TableDescriptor>,
    source: ConnectionSource,
    ctx: QueryContext,
    projection: Option<Vec<usize>>,
    schema: SchemaRef,
    properties: PlanProperties,
}

impl PrismaScanExec {
    pub fn new(
        descriptor: Arc<TableDescriptor>,
        source: ConnectionSource,
        ctx: QueryContext,
        projection: Option<Vec<usize>>,
        schema: SchemaRef,
    ) -> Self {
        let properties = PlanProperties::new(
            EquivalenceProperties::new(Arc::clone(&schema)),
            Partitioning::UnknownPartitioning(1),
            EmissionType::Incremental,
            Boundedness::Bounded,
        );
        Self {
            descriptor,
            source,
            ctx,
            projection,
            schema,
            properties,
        }
    }

    pub fn context(&self) -> &QueryContext {
        &self.ctx
    }

    /// Whether the output includes the session-email column.
    fn wants_session_email(&self) -> bool {
        let is_email = |c: &ColumnDef| c.source == ColumnSource::SessionEmail;
        match &self.projection {
            Some(indices) => indices
                .iter()
                .any(|&i| self.descriptor.columns.get(i).is_some_and(is_email)),
            None => self.descriptor.columns.iter().any(is_email),
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionPlan
// ---------------------------------------------------------------------------

impl ExecutionPlan for PrismaScanExec {
    fn name(&self) -> &str {
        "PrismaScanExec"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn properties(&self) -> &PlanProperties {
        &self.properties
    }

    fn children(&self) -> Vec<&Arc<dyn ExecutionPlan>> {
        vec![]
    }

    fn with_new_children(
        self: Arc<Self>,
        children: Vec<Arc<dyn ExecutionPlan>>,
    ) -> DFResult<Arc<dyn ExecutionPlan>> {
        if children.is_empty() {
            Ok(self)
        } else {
            Err(DataFusionError::Internal(
                "PrismaScanExec is a leaf node and cannot have children".to_string(),
            ))
        }
    }

    fn execute(
        &self,
        partition: usize,
        _context: Arc<TaskContext>,
    ) -> DFResult<SendableRecordBatchStream> {
        if partition != 0 {
            return Err(DataFusionError::Internal(format!(
                "PrismaScanExec only supports partition 0, got {}",
                partition
            )));
        }

        let mut builder = RecordBatchReceiverStream::builder(Arc::clone(&self.schema), CHANNEL_CAPACITY);
        let task = ScanTask {
            descriptor: Arc::clone(&self.descriptor),
            source: self.source.clone(),
            ctx: self.ctx.clone(),
            projection: self.projection.clone(),
            wants_email: self.wants_session_email(),
        };
        let tx = builder.tx();
        builder.spawn(async move {
            let operation = task.ctx.operation("scan");
            task.run(tx).await.map_err(|e| {
                error!("{} failed: {}", operation, e);
                DataFusionError::from(e)
            })
        });
        Ok(builder.build())
    }
}

// ---------------------------------------------------------------------------
// DisplayAs
// ---------------------------------------------------------------------------

impl DisplayAs for PrismaScanExec {
    fn fmt_as(&self, _t: DisplayFormatType, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "PrismaScanExec: table={}, predicates={}, limit={:?}",
            self.descriptor.name,
            self.ctx.quals.len(),
            self.ctx.limit
        )
    }
}

// ---------------------------------------------------------------------------
// Scan task
// ---------------------------------------------------------------------------

struct ScanTask {
    descriptor: Arc<TableDescriptor>,
    source: ConnectionSource,
    ctx: QueryContext,
    projection: Option<Vec<usize>>,
    wants_email: bool,
}

impl ScanTask {
    async fn run(mut self, tx: Sender<DFResult<RecordBatch>>) -> Result<()> {
        let connection = self
            .source
            .pool
            .connect(&self.source.name, &self.source.config)
            .await
            .map_err(|e| TableError::connect(self.ctx.operation("connect"), e))?;

        if self.wants_email {
            self.ctx.session_email = match connection.session_email().await {
                Ok(email) => email,
                Err(e) => {
                    warn!("{}: session profile unavailable: {}", self.ctx.operation("email"), e);
                    None
                }
            };
        }

        let descriptor = &self.descriptor;
        let scan = Scan {
            connection: &connection,
            ctx: &self.ctx,
            columns: &descriptor.columns,
        };
        let mut sink = BatchSink::new(&descriptor.columns, self.projection.as_deref(), tx);

        match descriptor.get_value(&self.ctx.quals) {
            Some(key) => {
                if self.ctx.limit == Some(0) {
                    return Ok(());
                }
                if let Some(item) = descriptor.fetch.get(&scan, &key).await? {
                    let projector = Projector::new(self.ctx.operation("get"), &descriptor.columns);
                    sink.push(projector.project(&item, &scan.scope())?).await?;
                    sink.flush().await?;
                }
                debug!("{}: point lookup for '{}'", self.ctx.operation("get"), key);
            }
            None => {
                let stats = descriptor.fetch.list(&scan, &mut sink).await?;
                debug!(
                    "{}: {} row(s) from {} fetch(es){}",
                    self.ctx.operation("list"),
                    stats.rows,
                    stats.fetches,
                    if stats.halted { ", halted early" } else { "" }
                );
            }
        }
        Ok(())
    }
}

/// Buffers one page of rows and sends it downstream as a batch on flush.
struct BatchSink<'a> {
    schema: SchemaRef,
    columns: &'a [ColumnDef],
    projection: Option<&'a [usize]>,
    rows: Vec<Row>,
    tx: Sender<DFResult<RecordBatch>>,
}

impl<'a> BatchSink<'a> {
    fn new(
        columns: &'a [ColumnDef],
        projection: Option<&'a [usize]>,
        tx: Sender<DFResult<RecordBatch>>,
    ) -> Self {
        Self {
            schema: arrow_schema(columns),
            columns,
            projection,
            rows: Vec::new(),
            tx,
        }
    }
}

#[async_trait]
impl RowSink for BatchSink<'_> {
    async fn push(&mut self, row: Row) -> Result<usize> {
        if self.tx.is_closed() {
            return Ok(0);
        }
        self.rows.push(row);
        Ok(self.tx.capacity().max(1))
    }

    async fn ready(&mut self) -> Result<bool> {
        // Wait for the consumer to take the previous batch; an error means it is gone.
        Ok(self.tx.reserve().await.is_ok())
    }

    async fn flush(&mut self) -> Result<()> {
        if self.rows.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.rows);
        let batch = rows_to_batch(Arc::clone(&self.schema), self.columns, &rows)?;
        let batch = match self.projection {
            Some(indices) => batch.project(indices)?,
            None => batch,
        };
        // A send error means the consumer is gone; the next push reports it.
        let _ = self.tx.send(Ok(batch)).await;
        Ok(())
    }
}
