//! Prisma Cloud tables - the REST API as DataFusion tables
//!
//! This crate provides:
//! - Predicate translation from DataFusion filters to query parameters and filter lists
//! - The pagination driver (continuation tokens, offsets, row limits, demand)
//! - Declarative row projection into Arrow record batches
//! - The table registry and the `TableProvider`/`ExecutionPlan` glue

pub mod error;
pub mod paginate;
pub mod project;
pub mod provider;
pub mod qual;
pub mod registry;
pub mod table;
pub mod tables;
pub mod translate;

pub use error::{Result, TableError};
pub use paginate::{
    CollectSink, EndpointSource, Envelope, Page, PageRequest, PageSource, PageStats, Paginator,
    RowSink, StaticSource,
};
pub use project::{ColumnDef, ColumnSource, ColumnType, Projector, Row, RowProjector, RowScope};
pub use provider::{ConnectionSource, PrismaScanExec, PrismaTable};
pub use qual::{Qual, QualOp, QualValue, Quals};
pub use registry::TableRegistry;
pub use table::{KeyColumn, QueryContext, Requirement, Scan, TableDescriptor, TableFetch};
pub use translate::{ApiFilter, FilterList, ParamMapping, QueryParams, TimeWindow};

// Re-export for downstream consumers
pub use datafusion::prelude::SessionContext;
