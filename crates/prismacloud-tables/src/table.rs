//! Table descriptors and the fetch seam every table implements.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use prismacloud_client::{ApiRequest, Connection, PrismaClient};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, TableError};
use crate::paginate::{PageStats, Paginator, RowSink};
use crate::project::{ColumnDef, Projector, RowScope};
use crate::qual::{Qual, QualOp, Quals};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Optional,
}

const EQ: &[QualOp] = &[QualOp::Eq];

/// A predicate a table's list call understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyColumn {
    pub name: &'static str,
    pub require: Requirement,
    pub operators: &'static [QualOp],
}

impl KeyColumn {
    /// Optional `=` key.
    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            require: Requirement::Optional,
            operators: EQ,
        }
    }

    /// Required `=` key.
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            require: Requirement::Required,
            operators: EQ,
        }
    }

    pub const fn with_operators(mut self, operators: &'static [QualOp]) -> Self {
        self.operators = operators;
        self
    }

    pub fn accepts(&self, qual: &Qual) -> bool {
        qual.column == self.name && self.operators.contains(&qual.op)
    }

    /// Equality-only keys are sent to the API as-is; range and negated keys
    /// are approximated (time windows, selected booleans).
    fn filters_exactly(&self) -> bool {
        self.operators == EQ
    }
}

/// Static description of one table.
#[derive(Clone)]
pub struct TableDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub columns: Vec<ColumnDef>,
    pub list_keys: Vec<KeyColumn>,
    /// Column whose `=` predicate routes the scan to a point lookup.
    pub get_key: Option<&'static str>,
    pub fetch: Arc<dyn TableFetch>,
}

impl fmt::Debug for TableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDescriptor")
            .field("name", &self.name)
            .field("columns", &self.columns.len())
            .field("list_keys", &self.list_keys)
            .field("get_key", &self.get_key)
            .finish()
    }
}

impl TableDescriptor {
    pub fn new(
        name: &'static str,
        description: &'static str,
        columns: Vec<ColumnDef>,
        fetch: impl TableFetch + 'static,
    ) -> Self {
        Self {
            name,
            description,
            columns,
            list_keys: Vec::new(),
            get_key: None,
            fetch: Arc::new(fetch),
        }
    }

    pub fn with_list_keys(mut self, keys: Vec<KeyColumn>) -> Self {
        self.list_keys = keys;
        self
    }

    pub fn with_get_key(mut self, key: &'static str) -> Self {
        self.get_key = Some(key);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether a qual is translated by this table's list or get call.
    pub fn accepts(&self, qual: &Qual) -> bool {
        self.list_keys.iter().any(|k| k.accepts(qual)) || self.is_get_qual(qual)
    }

    /// Whether a qual routes the scan to the point lookup.
    pub fn is_get_qual(&self, qual: &Qual) -> bool {
        self.get_key == Some(qual.column.as_str()) && qual.op == QualOp::Eq
    }

    /// Whether the list call applies `qual` exactly, so the rows need no
    /// re-filtering. `quals` is every predicate of the query.
    ///
    /// Holds for a lone non-empty `=` on an equality-only key column, unless
    /// the query is served by the point lookup, which ignores list keys.
    pub fn applies_exactly(&self, qual: &Qual, quals: &Quals) -> bool {
        qual.op == QualOp::Eq
            && !qual.value.to_param_string().is_empty()
            && self
                .list_keys
                .iter()
                .any(|k| k.name == qual.column && k.filters_exactly())
            && quals.for_column(&qual.column).count() == 1
            && !quals.iter().any(|q| self.is_get_qual(q))
    }

    /// First required key column without a usable predicate.
    pub fn missing_required(&self, quals: &Quals) -> Option<&'static str> {
        self.list_keys
            .iter()
            .filter(|k| k.require == Requirement::Required)
            .find(|k| !quals.iter().any(|q| k.accepts(q)))
            .map(|k| k.name)
    }

    /// Key value when the scan should be served by the point lookup.
    pub fn get_value(&self, quals: &Quals) -> Option<String> {
        self.get_key.and_then(|key| quals.equals_string(key))
    }
}

/// Per-query state: predicates, limit and the session user.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub table: &'static str,
    pub quals: Quals,
    pub limit: Option<usize>,
    pub session_email: Option<String>,
}

impl QueryContext {
    pub fn new(table: &'static str, quals: Quals, limit: Option<usize>) -> Self {
        Self {
            table,
            quals,
            limit,
            session_email: None,
        }
    }

    /// `<table>.<operation>` tag for errors and logs.
    pub fn operation(&self, op: &str) -> String {
        format!("{}.{}", self.table, op)
    }
}

/// Everything a fetch implementation needs for one scan.
#[derive(Clone, Copy)]
pub struct Scan<'a> {
    pub connection: &'a Connection,
    pub ctx: &'a QueryContext,
    pub columns: &'a [ColumnDef],
}

impl<'a> Scan<'a> {
    pub fn client(&self) -> &'a PrismaClient {
        self.connection.client()
    }

    pub fn quals(&self) -> &'a Quals {
        &self.ctx.quals
    }

    pub fn scope(&self) -> RowScope<'a> {
        RowScope::new(&self.ctx.quals).with_session_email(self.ctx.session_email.as_deref())
    }

    pub fn projector(&self) -> Projector<'a> {
        Projector::new(self.ctx.operation("list"), self.columns)
    }

    pub fn paginator(&self, page_ceiling: usize) -> Paginator {
        Paginator::new(self.ctx.operation("list"), page_ceiling).with_limit(self.ctx.limit)
    }

    /// Run a single-shot request, mapping failures to `api_error`.
    pub async fn call(&self, request: &ApiRequest) -> Result<Value> {
        self.client()
            .execute(request)
            .await
            .map_err(|e| TableError::upstream(self.ctx.operation("list"), e))
    }

    /// Point lookup; not-found is `None`.
    pub async fn lookup(&self, request: &ApiRequest) -> Result<Option<Value>> {
        match self.client().execute(request).await {
            Ok(Value::Null) => Ok(None),
            Ok(item) => Ok(Some(item)),
            Err(e) if e.is_not_found() => {
                debug!("{}: {} not found", self.ctx.operation("get"), request.label());
                Ok(None)
            }
            Err(e) => Err(TableError::upstream(self.ctx.operation("get"), e)),
        }
    }
}

/// List and point-lookup implementation of a table.
#[async_trait]
pub trait TableFetch: Send + Sync {
    /// Stream every row matching the scan's predicates into `sink`.
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats>;

    /// Fetch one raw item by key.
    async fn get(&self, _scan: &Scan<'_>, _key: &str) -> Result<Option<Value>> {
        Ok(None)
    }
}
