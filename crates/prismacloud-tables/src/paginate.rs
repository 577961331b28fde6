//! Pagination driver.
//!
//! `Paginator::drive` runs `Start → Fetch → (token? → Fetch : Done)` against a
//! `PageSource`, projecting every item and pushing it into a `RowSink`. It
//! stops when the continuation token is empty, when the row limit is reached,
//! or when the sink reports zero remaining demand.

use async_trait::async_trait;
use prismacloud_client::{ApiRequest, ClientError, PrismaClient};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, TableError};
use crate::project::{Row, RowProjector, RowScope};

/// What the driver asks the source for on each fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page_size: usize,
    /// Number of items consumed by earlier pages.
    pub offset: usize,
    /// Continuation token from the previous page; `None` on the first fetch.
    pub token: Option<String>,
}

/// One page of items plus the rest of the response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub next_token: Option<String>,
    pub envelope: Option<Value>,
}

impl Page {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.next_token = Some(token.into());
        self
    }
}

#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, request: &PageRequest) -> std::result::Result<Page, ClientError>;
}

/// Destination for projected rows.
#[async_trait]
pub trait RowSink: Send {
    /// Accept one row and return the remaining demand; `0` means stop.
    async fn push(&mut self, row: Row) -> Result<usize>;

    /// Called after every page.
    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called before every fetch but the first; `false` stops paging.
    async fn ready(&mut self) -> Result<bool> {
        Ok(true)
    }
}

/// Collects rows in memory.
#[derive(Debug, Default)]
pub struct CollectSink {
    pub rows: Vec<Row>,
    pub flushes: usize,
    demand: Option<usize>,
    pages_wanted: Option<usize>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report zero demand once `demand` rows were accepted.
    pub fn with_demand(demand: usize) -> Self {
        Self {
            demand: Some(demand),
            ..Default::default()
        }
    }

    /// Decline further fetches once `pages` pages were flushed.
    pub fn with_pages_wanted(pages: usize) -> Self {
        Self {
            pages_wanted: Some(pages),
            ..Default::default()
        }
    }
}

#[async_trait]
impl RowSink for CollectSink {
    async fn push(&mut self, row: Row) -> Result<usize> {
        self.rows.push(row);
        Ok(self
            .demand
            .map_or(usize::MAX, |d| d.saturating_sub(self.rows.len())))
    }

    async fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }

    async fn ready(&mut self) -> Result<bool> {
        Ok(self.pages_wanted.map_or(true, |p| self.flushes < p))
    }
}

// ---------------------------------------------------------------------------
// Response envelopes
// ---------------------------------------------------------------------------

/// How an endpoint wraps its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// A plain JSON array, or an `{items, nextPageToken}` object.
    Array,
    /// The whole body is one item.
    Single,
    /// Items under a member (an object there is a single item); no continuation.
    Member(&'static str),
    /// Items and continuation token at dotted paths.
    Keyed {
        items: &'static str,
        token: Option<&'static str>,
    },
}

impl Envelope {
    /// Split a response body into a page. Everything but the items is kept as
    /// the page envelope.
    pub fn split(&self, body: Value) -> std::result::Result<Page, ClientError> {
        match (self, body) {
            (_, Value::Null) => Ok(Page::default()),
            (Envelope::Array, Value::Array(items)) => Ok(Page::new(items)),
            (Envelope::Array, body @ Value::Object(_)) => Envelope::Keyed {
                items: "items",
                token: Some("nextPageToken"),
            }
            .split(body),
            (Envelope::Array, other) => Err(ClientError::Decode(format!(
                "expected an array response, found {}",
                kind(&other)
            ))),
            (Envelope::Single, body) => Ok(Page::new(vec![body])),
            (Envelope::Member(path), body) => {
                let (items, envelope) = take_items(body, path)?;
                Ok(Page {
                    items,
                    next_token: None,
                    envelope: Some(envelope),
                })
            }
            (Envelope::Keyed { items, token }, body) => {
                let next_token = token
                    .and_then(|t| crate::project::lookup(&body, t))
                    .and_then(Value::as_str)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string);
                let (items, envelope) = take_items(body, items)?;
                Ok(Page {
                    items,
                    next_token,
                    envelope: Some(envelope),
                })
            }
        }
    }
}

fn take_items(mut body: Value, path: &str) -> std::result::Result<(Vec<Value>, Value), ClientError> {
    let pointer = format!("/{}", path.replace('.', "/"));
    let items = match body.pointer_mut(&pointer).map(Value::take) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(item @ Value::Object(_)) => vec![item],
        Some(other) => {
            return Err(ClientError::Decode(format!(
                "expected items at '{}', found {}",
                path,
                kind(&other)
            )))
        }
    };
    Ok((items, body))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A `PageSource` backed by one API endpoint.
pub struct EndpointSource<'a, F> {
    client: &'a PrismaClient,
    envelope: Envelope,
    build: F,
    empty_on_status: Option<u16>,
}

impl<'a, F> EndpointSource<'a, F>
where
    F: Fn(&PageRequest) -> ApiRequest + Send + Sync,
{
    pub fn new(client: &'a PrismaClient, envelope: Envelope, build: F) -> Self {
        Self {
            client,
            envelope,
            build,
            empty_on_status: None,
        }
    }

    /// Treat an error response with this status as an empty page.
    pub fn empty_on_status(mut self, status: u16) -> Self {
        self.empty_on_status = Some(status);
        self
    }
}

#[async_trait]
impl<F> PageSource for EndpointSource<'_, F>
where
    F: Fn(&PageRequest) -> ApiRequest + Send + Sync,
{
    async fn fetch(&self, request: &PageRequest) -> std::result::Result<Page, ClientError> {
        let api_request = (self.build)(request);
        match self.client.execute(&api_request).await {
            Ok(body) => self.envelope.split(body),
            Err(e) if e.status().is_some() && e.status() == self.empty_on_status => {
                debug!("{} returned {:?}, treating as empty", api_request.label(), e.status());
                Ok(Page::default())
            }
            Err(e) => Err(e),
        }
    }
}

/// Items already in hand, served as a single page.
pub struct StaticSource {
    items: Vec<Value>,
}

impl StaticSource {
    pub fn new(items: Vec<Value>) -> Self {
        Self { items }
    }

    /// The array at `path` under `parent`; missing or non-array is empty.
    pub fn nested(parent: &Value, path: &str) -> Self {
        let items = crate::project::lookup(parent, path)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Self::new(items)
    }
}

#[async_trait]
impl PageSource for StaticSource {
    async fn fetch(&self, request: &PageRequest) -> std::result::Result<Page, ClientError> {
        let items = self.items.iter().skip(request.offset).cloned().collect();
        Ok(Page::new(items))
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    pub fetches: usize,
    pub rows: usize,
    /// Stopped on the row limit or on zero demand rather than on exhaustion.
    pub halted: bool,
}

#[derive(Debug, Clone)]
pub struct Paginator {
    operation: String,
    page_ceiling: usize,
    limit: Option<usize>,
}

impl Paginator {
    pub fn new(operation: impl Into<String>, page_ceiling: usize) -> Self {
        Self {
            operation: operation.into(),
            page_ceiling: page_ceiling.max(1),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    fn remaining(&self, emitted: usize) -> Option<usize> {
        self.limit.map(|l| l.saturating_sub(emitted))
    }

    /// Drive `source` to exhaustion, the row limit, or zero demand.
    pub async fn drive(
        &self,
        source: &dyn PageSource,
        scope: RowScope<'_>,
        projector: &dyn RowProjector,
        sink: &mut dyn RowSink,
    ) -> Result<PageStats> {
        let mut stats = PageStats::default();
        let mut request = PageRequest::default();

        loop {
            let remaining = self.remaining(stats.rows);
            if remaining == Some(0) || (stats.fetches > 0 && !sink.ready().await?) {
                stats.halted = true;
                break;
            }
            request.page_size = remaining.map_or(self.page_ceiling, |r| r.min(self.page_ceiling));

            let page = source.fetch(&request).await.map_err(|e| {
                if stats.fetches == 0 {
                    TableError::upstream(&self.operation, e)
                } else {
                    TableError::paging(&self.operation, e)
                }
            })?;
            stats.fetches += 1;
            debug!(
                "{}: page {} returned {} items (offset {})",
                self.operation,
                stats.fetches,
                page.items.len(),
                request.offset
            );

            let page_scope = RowScope {
                envelope: page.envelope.as_ref(),
                ..scope
            };
            for item in &page.items {
                let row = projector.project(item, &page_scope)?;
                stats.rows += 1;
                let demand = sink.push(row).await?;
                if demand == 0 || self.remaining(stats.rows) == Some(0) {
                    sink.flush().await?;
                    stats.halted = true;
                    return Ok(stats);
                }
            }
            sink.flush().await?;

            match page.next_token.filter(|t| !t.is_empty()) {
                Some(token) => {
                    request.offset += page.items.len();
                    request.token = Some(token);
                }
                None => break,
            }
        }

        Ok(stats)
    }

    /// One-level parent/child fan-out.
    ///
    /// Children are drained sequentially in parent order; every child row
    /// carries its parent in scope. The row limit is shared across parents.
    pub async fn fan_out<'p, S, F>(
        &self,
        parents: &'p [Value],
        child: F,
        scope: RowScope<'_>,
        projector: &dyn RowProjector,
        sink: &mut dyn RowSink,
    ) -> Result<PageStats>
    where
        S: PageSource,
        F: Fn(&'p Value) -> S,
    {
        let mut total = PageStats::default();
        for parent in parents {
            let remaining = self.remaining(total.rows);
            if remaining == Some(0) || (total.fetches > 0 && !sink.ready().await?) {
                total.halted = true;
                break;
            }
            let source = child(parent);
            let stats = Paginator {
                operation: self.operation.clone(),
                page_ceiling: self.page_ceiling,
                limit: remaining,
            }
            .drive(&source, scope.with_parent(parent), projector, sink)
            .await?;

            total.fetches += stats.fetches;
            total.rows += stats.rows;
            if stats.halted {
                total.halted = true;
                break;
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{ColumnDef, ColumnType, Projector};
    use crate::qual::Quals;
    use serde_json::json;
    use std::sync::Mutex;

    /// Serves canned pages keyed by continuation token and records requests.
    struct ScriptedSource {
        pages: Vec<std::result::Result<Page, u16>>,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<std::result::Result<Page, u16>>) -> Self {
            Self {
                pages,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<PageRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        async fn fetch(&self, request: &PageRequest) -> std::result::Result<Page, ClientError> {
            let index = {
                let mut requests = self.requests.lock().unwrap();
                requests.push(request.clone());
                requests.len() - 1
            };
            match &self.pages[index] {
                Ok(page) => Ok(page.clone()),
                Err(status) => Err(ClientError::Api {
                    status: *status,
                    body: "failed".to_string(),
                }),
            }
        }
    }

    const COLUMNS: &[ColumnDef] = &[ColumnDef::field("id", ColumnType::Int, "id", "")];

    fn items(ids: std::ops::Range<i64>) -> Vec<Value> {
        ids.map(|i| json!({"id": i})).collect()
    }

    async fn run(paginator: &Paginator, source: &ScriptedSource, sink: &mut CollectSink) -> Result<PageStats> {
        let quals = Quals::default();
        let projector = Projector::new("t.list", COLUMNS);
        paginator
            .drive(source, RowScope::new(&quals), &projector, sink)
            .await
    }

    // --- termination ---

    #[tokio::test]
    async fn test_follows_tokens_to_exhaustion() {
        let source = ScriptedSource::new(vec![
            Ok(Page::new(items(0..3)).with_token("t1")),
            Ok(Page::new(items(3..5)).with_token("t2")),
            Ok(Page::new(items(5..6))),
        ]);
        let mut sink = CollectSink::new();
        let stats = run(&Paginator::new("t.list", 100), &source, &mut sink).await.unwrap();

        assert_eq!(stats, PageStats { fetches: 3, rows: 6, halted: false });
        assert_eq!(sink.rows.len(), 6);
        assert_eq!(sink.flushes, 3);

        let requests = source.requests();
        assert_eq!(requests[0].token, None);
        assert_eq!(requests[1].token.as_deref(), Some("t1"));
        assert_eq!(requests[2].token.as_deref(), Some("t2"));
    }

    #[tokio::test]
    async fn test_offset_advances_by_items_consumed() {
        let source = ScriptedSource::new(vec![
            Ok(Page::new(items(0..3)).with_token("t1")),
            Ok(Page::new(items(3..4)).with_token("t2")),
            Ok(Page::new(vec![])),
        ]);
        let mut sink = CollectSink::new();
        run(&Paginator::new("t.list", 10), &source, &mut sink).await.unwrap();

        let offsets: Vec<usize> = source.requests().iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![0, 3, 4]);
    }

    #[tokio::test]
    async fn test_empty_token_ends_paging() {
        let source = ScriptedSource::new(vec![Ok(Page::new(items(0..2)).with_token(""))]);
        let mut sink = CollectSink::new();
        let stats = run(&Paginator::new("t.list", 10), &source, &mut sink).await.unwrap();
        assert_eq!(stats.fetches, 1);
    }

    // --- limit and demand ---

    #[tokio::test]
    async fn test_limit_halts_without_next_fetch() {
        let source = ScriptedSource::new(vec![
            Ok(Page::new(items(0..3)).with_token("t1")),
            Ok(Page::new(items(3..5))),
        ]);
        let mut sink = CollectSink::new();
        let paginator = Paginator::new("t.list", 10_000).with_limit(Some(2));
        let stats = run(&paginator, &source, &mut sink).await.unwrap();

        assert_eq!(stats, PageStats { fetches: 1, rows: 2, halted: true });
        assert_eq!(sink.rows.len(), 2);
        assert_eq!(source.requests()[0].page_size, 2);
    }

    #[tokio::test]
    async fn test_page_size_capped_at_ceiling() {
        let source = ScriptedSource::new(vec![
            Ok(Page::new(items(0..30)).with_token("t1")),
            Ok(Page::new(items(30..40))),
        ]);
        let mut sink = CollectSink::new();
        let paginator = Paginator::new("t.list", 30).with_limit(Some(45));
        run(&paginator, &source, &mut sink).await.unwrap();

        let sizes: Vec<usize> = source.requests().iter().map(|r| r.page_size).collect();
        assert_eq!(sizes, vec![30, 15]);
    }

    #[tokio::test]
    async fn test_zero_limit_fetches_nothing() {
        let source = ScriptedSource::new(vec![]);
        let mut sink = CollectSink::new();
        let paginator = Paginator::new("t.list", 10).with_limit(Some(0));
        let stats = run(&paginator, &source, &mut sink).await.unwrap();
        assert_eq!(stats.fetches, 0);
        assert!(source.requests().is_empty());
    }

    #[tokio::test]
    async fn test_zero_demand_stops_like_limit() {
        let source = ScriptedSource::new(vec![
            Ok(Page::new(items(0..3)).with_token("t1")),
            Ok(Page::new(items(3..5))),
        ]);
        let mut sink = CollectSink::with_demand(1);
        let stats = run(&Paginator::new("t.list", 10), &source, &mut sink).await.unwrap();

        assert!(stats.halted);
        assert_eq!(stats.fetches, 1);
        assert_eq!(sink.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_unready_sink_stops_before_next_fetch() {
        let source = ScriptedSource::new(vec![
            Ok(Page::new(items(0..3)).with_token("t1")),
            Ok(Page::new(items(3..5))),
        ]);
        let mut sink = CollectSink::with_pages_wanted(1);
        let stats = run(&Paginator::new("t.list", 10), &source, &mut sink).await.unwrap();

        assert_eq!(stats, PageStats { fetches: 1, rows: 3, halted: true });
        assert_eq!(source.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_unready_sink_stops_fan_out_between_parents() {
        let parents = vec![json!({}), json!({})];
        let quals = Quals::default();
        let projector = Projector::new("t.list", COLUMNS);
        let mut sink = CollectSink::with_pages_wanted(1);

        let stats = Paginator::new("t.list", 10)
            .fan_out(
                &parents,
                |_| ScriptedSource::new(vec![Ok(Page::new(items(0..2)))]),
                RowScope::new(&quals),
                &projector,
                &mut sink,
            )
            .await
            .unwrap();

        assert_eq!(stats, PageStats { fetches: 1, rows: 2, halted: true });
    }

    // --- failures ---

    #[tokio::test]
    async fn test_first_page_error_is_upstream() {
        let source = ScriptedSource::new(vec![Err(500)]);
        let mut sink = CollectSink::new();
        let err = run(&Paginator::new("t.list", 10), &source, &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, TableError::Upstream { .. }));
        assert!(err.to_string().starts_with("t.list: api_error:"));
    }

    #[tokio::test]
    async fn test_later_page_error_is_paging_error() {
        let source = ScriptedSource::new(vec![
            Ok(Page::new(items(0..2)).with_token("t1")),
            Err(502),
        ]);
        let mut sink = CollectSink::new();
        let err = run(&Paginator::new("t.list", 10), &source, &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, TableError::UpstreamPaging { .. }));
        assert_eq!(sink.rows.len(), 2);
    }

    #[tokio::test]
    async fn test_projection_error_aborts_page() {
        let source = ScriptedSource::new(vec![Ok(Page::new(vec![
            json!({"id": 1}),
            json!({"id": "not-a-number"}),
            json!({"id": 3}),
        ]))]);
        let mut sink = CollectSink::new();
        let err = run(&Paginator::new("t.list", 10), &source, &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, TableError::Projection { .. }));
        assert_eq!(sink.rows.len(), 1);
    }

    // --- fan-out ---

    #[tokio::test]
    async fn test_fan_out_carries_parent_context() {
        let columns = [
            ColumnDef::field("id", ColumnType::Int, "id", ""),
            ColumnDef::parent("account", ColumnType::Text, "name", ""),
        ];
        let parents = vec![json!({"name": "a", "children": 3}), json!({"name": "b", "children": 0})];
        let quals = Quals::default();
        let projector = Projector::new("t.list", &columns);
        let mut sink = CollectSink::new();

        let stats = Paginator::new("t.list", 10)
            .fan_out(
                &parents,
                |parent| {
                    let n = parent["children"].as_i64().unwrap_or(0);
                    ScriptedSource::new(vec![Ok(Page::new(items(0..n)))])
                },
                RowScope::new(&quals),
                &projector,
                &mut sink,
            )
            .await
            .unwrap();

        assert_eq!(stats.rows, 3);
        assert_eq!(stats.fetches, 2);
        assert!(sink
            .rows
            .iter()
            .all(|r| r.get("account") == Some(&crate::project::Cell::Text("a".to_string()))));
    }

    #[tokio::test]
    async fn test_fan_out_shares_limit() {
        let parents = vec![json!({}), json!({}), json!({})];
        let quals = Quals::default();
        let projector = Projector::new("t.list", COLUMNS);
        let mut sink = CollectSink::new();

        let stats = Paginator::new("t.list", 10)
            .with_limit(Some(3))
            .fan_out(
                &parents,
                |_| ScriptedSource::new(vec![Ok(Page::new(items(0..2)))]),
                RowScope::new(&quals),
                &projector,
                &mut sink,
            )
            .await
            .unwrap();

        assert_eq!(stats, PageStats { fetches: 2, rows: 3, halted: true });
    }

    #[tokio::test]
    async fn test_nested_arrays_flatten_under_parent() {
        let columns = [
            ColumnDef::field("id", ColumnType::Int, "id", ""),
            ColumnDef::parent("group", ColumnType::Text, "name", ""),
        ];
        let parents = vec![
            json!({"name": "a", "children": [{"id": 1}, {"id": 2}]}),
            json!({"name": "b"}),
            json!({"name": "c", "children": [{"id": 3}]}),
        ];
        let quals = Quals::default();
        let projector = Projector::new("t.list", &columns);
        let mut sink = CollectSink::new();

        let stats = Paginator::new("t.list", 10)
            .fan_out(
                &parents,
                |parent| StaticSource::nested(parent, "children"),
                RowScope::new(&quals),
                &projector,
                &mut sink,
            )
            .await
            .unwrap();

        assert_eq!(stats.rows, 3);
        let groups: Vec<_> = sink.rows.iter().map(|r| r.get("group").cloned()).collect();
        assert_eq!(
            groups,
            vec![
                Some(crate::project::Cell::Text("a".to_string())),
                Some(crate::project::Cell::Text("a".to_string())),
                Some(crate::project::Cell::Text("c".to_string())),
            ]
        );
    }

    // --- envelopes ---

    #[test]
    fn test_array_envelope() {
        let page = Envelope::Array.split(json!([{"a": 1}, {"a": 2}])).unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.next_token.is_none());
    }

    #[test]
    fn test_array_envelope_accepts_items_object() {
        let page = Envelope::Array
            .split(json!({"items": [{"a": 1}], "nextPageToken": "n"}))
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next_token.as_deref(), Some("n"));
    }

    #[test]
    fn test_keyed_envelope_keeps_remainder() {
        let page = Envelope::Keyed {
            items: "data.items",
            token: Some("data.nextPageToken"),
        }
        .split(json!({"data": {"items": [{"a": 1}], "nextPageToken": "n"}, "query": "q"}))
        .unwrap();
        assert_eq!(page.items, vec![json!({"a": 1})]);
        assert_eq!(page.next_token.as_deref(), Some("n"));
        assert_eq!(page.envelope.unwrap()["query"], json!("q"));
    }

    #[test]
    fn test_member_envelope_object_is_one_item() {
        let page = Envelope::Member("summary")
            .split(json!({"summary": {"totalResources": 4}}))
            .unwrap();
        assert_eq!(page.items, vec![json!({"totalResources": 4})]);
    }

    #[test]
    fn test_missing_items_is_empty_page() {
        let page = Envelope::Member("complianceDetails").split(json!({})).unwrap();
        assert!(page.items.is_empty());
        assert!(Envelope::Single.split(Value::Null).unwrap().items.is_empty());
    }

    #[test]
    fn test_unexpected_shape_is_decode_error() {
        let err = Envelope::Array.split(json!("text")).unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
        let err = Envelope::Member("items").split(json!({"items": 3})).unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }
}
