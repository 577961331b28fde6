//! Row projection: raw API items → flat, typed rows → Arrow record batches.
//!
//! Every column declares where its value comes from (`ColumnSource`) and what
//! SQL type it has (`ColumnType`). A projected `Row` always carries one cell per
//! declared column, in declaration order.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray,
    TimestampMillisecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use chrono::DateTime;
use serde_json::{Number, Value};

use crate::error::{Result, TableError};
use crate::qual::{QualValue, Quals};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Int,
    Float,
    Bool,
    /// Epoch milliseconds; zero is projected as null.
    Timestamp,
    /// Any JSON value, serialized to text.
    Json,
}

impl ColumnType {
    pub fn arrow_type(&self) -> DataType {
        match self {
            ColumnType::Text | ColumnType::Json => DataType::Utf8,
            ColumnType::Int => DataType::Int64,
            ColumnType::Float => DataType::Float64,
            ColumnType::Bool => DataType::Boolean,
            ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Int => "int",
            ColumnType::Float => "double",
            ColumnType::Bool => "bool",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Json => "json",
        }
    }
}

/// Where a column's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    /// Dotted path into the item (`""` is the whole item).
    Field(&'static str),
    /// Echo of the caller's `=` predicate on the named column.
    Qual(&'static str),
    /// Dotted path into the parent item of a fan-out.
    Parent(&'static str),
    /// Dotted path into the page envelope (the response minus its items).
    Envelope(&'static str),
    /// Populated from `field` when the active grouping is `group`, otherwise
    /// echoes the predicate on this column.
    Grouping {
        group: &'static str,
        field: &'static str,
    },
    /// Email of the user owning the connection's session.
    SessionEmail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnType,
    pub source: ColumnSource,
    pub description: &'static str,
}

impl ColumnDef {
    pub const fn new(
        name: &'static str,
        kind: ColumnType,
        source: ColumnSource,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind,
            source,
            description,
        }
    }

    pub const fn field(
        name: &'static str,
        kind: ColumnType,
        path: &'static str,
        description: &'static str,
    ) -> Self {
        Self::new(name, kind, ColumnSource::Field(path), description)
    }

    /// Column echoing its own `=` predicate.
    pub const fn qual(name: &'static str, kind: ColumnType, description: &'static str) -> Self {
        Self::new(name, kind, ColumnSource::Qual(name), description)
    }

    pub const fn parent(
        name: &'static str,
        kind: ColumnType,
        path: &'static str,
        description: &'static str,
    ) -> Self {
        Self::new(name, kind, ColumnSource::Parent(path), description)
    }

    pub const fn envelope(
        name: &'static str,
        kind: ColumnType,
        path: &'static str,
        description: &'static str,
    ) -> Self {
        Self::new(name, kind, ColumnSource::Envelope(path), description)
    }

    /// The `email` column every table carries.
    pub const fn email() -> Self {
        Self::new(
            "email",
            ColumnType::Text,
            ColumnSource::SessionEmail,
            "Email address of the current session user.",
        )
    }
}

/// One typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    TimestampMs(i64),
}

/// A flattened record: one cell per declared column, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub(crate) cells: Vec<(&'static str, Cell)>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, cell)| cell)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().map(|(_, cell)| cell)
    }
}

/// Context an item is projected in.
#[derive(Debug, Clone, Copy)]
pub struct RowScope<'a> {
    pub quals: &'a Quals,
    pub session_email: Option<&'a str>,
    pub parent: Option<&'a Value>,
    pub envelope: Option<&'a Value>,
    pub grouping: Option<&'static str>,
}

impl<'a> RowScope<'a> {
    pub fn new(quals: &'a Quals) -> Self {
        Self {
            quals,
            session_email: None,
            parent: None,
            envelope: None,
            grouping: None,
        }
    }

    pub fn with_session_email(mut self, email: Option<&'a str>) -> Self {
        self.session_email = email;
        self
    }

    pub fn with_parent(mut self, parent: &'a Value) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_envelope(mut self, envelope: Option<&'a Value>) -> Self {
        self.envelope = envelope;
        self
    }

    pub fn with_grouping(mut self, grouping: &'static str) -> Self {
        self.grouping = Some(grouping);
        self
    }
}

pub trait RowProjector: Send + Sync {
    fn project(&self, item: &Value, scope: &RowScope<'_>) -> Result<Row>;
}

/// Projects items against a table's declared columns.
#[derive(Debug, Clone)]
pub struct Projector<'a> {
    operation: String,
    columns: &'a [ColumnDef],
}

impl<'a> Projector<'a> {
    pub fn new(operation: impl Into<String>, columns: &'a [ColumnDef]) -> Self {
        Self {
            operation: operation.into(),
            columns,
        }
    }

    pub fn columns(&self) -> &'a [ColumnDef] {
        self.columns
    }

    fn error(&self, column: &ColumnDef, message: String) -> TableError {
        TableError::Projection {
            operation: self.operation.clone(),
            column: column.name.to_string(),
            message,
        }
    }
}

impl RowProjector for Projector<'_> {
    fn project(&self, item: &Value, scope: &RowScope<'_>) -> Result<Row> {
        let mut cells = Vec::with_capacity(self.columns.len());
        for column in self.columns {
            let cell = match column.source {
                ColumnSource::Field(path) => convert(column.kind, lookup(item, path))
                    .map_err(|m| self.error(column, format!("{} at '{}'", m, path)))?,
                ColumnSource::Parent(path) => {
                    convert(column.kind, scope.parent.and_then(|p| lookup(p, path)))
                        .map_err(|m| self.error(column, format!("{} at parent '{}'", m, path)))?
                }
                ColumnSource::Envelope(path) => {
                    convert(column.kind, scope.envelope.and_then(|e| lookup(e, path)))
                        .map_err(|m| self.error(column, format!("{} at envelope '{}'", m, path)))?
                }
                ColumnSource::Qual(name) => echo_qual(column.kind, scope.quals, name)
                    .map_err(|m| self.error(column, m))?,
                ColumnSource::Grouping { group, field } if scope.grouping == Some(group) => {
                    convert(column.kind, lookup(item, field))
                        .map_err(|m| self.error(column, format!("{} at '{}'", m, field)))?
                }
                ColumnSource::Grouping { .. } => echo_qual(column.kind, scope.quals, column.name)
                    .map_err(|m| self.error(column, m))?,
                ColumnSource::SessionEmail => scope
                    .session_email
                    .map_or(Cell::Null, |e| Cell::Text(e.to_string())),
            };
            cells.push((column.name, cell));
        }
        Ok(Row { cells })
    }
}

/// Resolve a dotted path. Missing segments yield `None`.
pub fn lookup<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, key| current.get(key))
}

fn echo_qual(kind: ColumnType, quals: &Quals, column: &str) -> std::result::Result<Cell, String> {
    let value = quals.equals(column).map(|v| match v {
        QualValue::Str(s) => Value::String(s.clone()),
        QualValue::Int(i) | QualValue::TimestampMs(i) => Value::Number((*i).into()),
        QualValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        QualValue::Bool(b) => Value::Bool(*b),
    });
    convert(kind, value.as_ref())
}

fn convert(kind: ColumnType, value: Option<&Value>) -> std::result::Result<Cell, String> {
    let value = match value {
        None | Some(Value::Null) => return Ok(Cell::Null),
        Some(v) => v,
    };
    match kind {
        ColumnType::Json => Ok(Cell::Text(value.to_string())),
        ColumnType::Text => match value {
            Value::String(s) => Ok(Cell::Text(s.clone())),
            Value::Number(n) => Ok(Cell::Text(n.to_string())),
            Value::Bool(b) => Ok(Cell::Text(b.to_string())),
            other => Err(mismatch("text", other)),
        },
        ColumnType::Int => as_integer(value)
            .map(Cell::Int)
            .ok_or_else(|| mismatch("integer", value)),
        ColumnType::Float => value
            .as_f64()
            .map(Cell::Float)
            .ok_or_else(|| mismatch("number", value)),
        ColumnType::Bool => value
            .as_bool()
            .map(Cell::Bool)
            .ok_or_else(|| mismatch("boolean", value)),
        ColumnType::Timestamp => match value {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|t| Cell::TimestampMs(t.timestamp_millis()))
                .map_err(|_| mismatch("timestamp", value)),
            _ => match as_integer(value) {
                Some(0) => Ok(Cell::Null),
                Some(ms) => Ok(Cell::TimestampMs(ms)),
                None => Err(mismatch("timestamp", value)),
            },
        },
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn mismatch(expected: &str, found: &Value) -> String {
    let found = match found {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    format!("expected {}, found {}", expected, found)
}

// ---------------------------------------------------------------------------
// Arrow conversion
// ---------------------------------------------------------------------------

/// Arrow schema for a column list. Every field is nullable.
pub fn arrow_schema(columns: &[ColumnDef]) -> SchemaRef {
    let fields: Vec<Field> = columns
        .iter()
        .map(|c| Field::new(c.name, c.kind.arrow_type(), true))
        .collect();
    Arc::new(Schema::new(fields))
}

/// Convert projected rows to a `RecordBatch` with the full table schema.
pub fn rows_to_batch(schema: SchemaRef, columns: &[ColumnDef], rows: &[Row]) -> Result<RecordBatch> {
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());

    for (i, column) in columns.iter().enumerate() {
        let cells = rows.iter().map(|row| row.cells.get(i).map(|(_, c)| c));
        let array: ArrayRef = match column.kind {
            ColumnType::Text | ColumnType::Json => Arc::new(StringArray::from(
                cells
                    .map(|c| match c {
                        Some(Cell::Text(s)) => Some(s.clone()),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
            ColumnType::Int => Arc::new(Int64Array::from(
                cells
                    .map(|c| match c {
                        Some(Cell::Int(v)) => Some(*v),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
            ColumnType::Float => Arc::new(Float64Array::from(
                cells
                    .map(|c| match c {
                        Some(Cell::Float(v)) => Some(*v),
                        Some(Cell::Int(v)) => Some(*v as f64),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
            ColumnType::Bool => Arc::new(BooleanArray::from(
                cells
                    .map(|c| match c {
                        Some(Cell::Bool(v)) => Some(*v),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
            ColumnType::Timestamp => Arc::new(
                TimestampMillisecondArray::from(
                    cells
                        .map(|c| match c {
                            Some(Cell::TimestampMs(v)) => Some(*v),
                            _ => None,
                        })
                        .collect::<Vec<_>>(),
                )
                .with_timezone("UTC"),
            ),
        };
        arrays.push(array);
    }

    Ok(RecordBatch::try_new(schema, arrays)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qual::Qual;
    use arrow::array::Array;
    use serde_json::json;

    const COLUMNS: &[ColumnDef] = &[
        ColumnDef::field("id", ColumnType::Text, "id", "Id."),
        ColumnDef::field("critical", ColumnType::Int, "risk.critical", "Critical count."),
        ColumnDef::field("seen", ColumnType::Timestamp, "lastSeen", "Last seen."),
        ColumnDef::field("enabled", ColumnType::Bool, "enabled", "Enabled."),
        ColumnDef::field("labels", ColumnType::Json, "labels", "Labels."),
        ColumnDef::qual("standard", ColumnType::Text, "Echoed standard."),
        ColumnDef::email(),
    ];

    fn project(item: Value) -> Result<Row> {
        let quals = Quals::default();
        Projector::new("t.list", COLUMNS).project(&item, &RowScope::new(&quals))
    }

    // --- field projection ---

    #[test]
    fn test_nested_path_flattened() {
        let row = project(json!({"id": "a", "risk": {"critical": 3}})).unwrap();
        assert_eq!(row.get("critical"), Some(&Cell::Int(3)));
        assert_eq!(row.get("id"), Some(&Cell::Text("a".to_string())));
    }

    #[test]
    fn test_every_column_present() {
        let row = project(json!({})).unwrap();
        assert_eq!(row.len(), COLUMNS.len());
        assert!(row.cells().all(|c| *c == Cell::Null));
    }

    #[test]
    fn test_zero_timestamp_is_null() {
        let row = project(json!({"lastSeen": 0})).unwrap();
        assert_eq!(row.get("seen"), Some(&Cell::Null));

        let row = project(json!({"lastSeen": 1_700_000_000_000i64})).unwrap();
        assert_eq!(row.get("seen"), Some(&Cell::TimestampMs(1_700_000_000_000)));
    }

    #[test]
    fn test_json_column_serialized() {
        let row = project(json!({"labels": {"env": "prod"}})).unwrap();
        assert_eq!(
            row.get("labels"),
            Some(&Cell::Text(r#"{"env":"prod"}"#.to_string()))
        );
    }

    #[test]
    fn test_numbers_accepted_as_text() {
        let row = project(json!({"id": 42})).unwrap();
        assert_eq!(row.get("id"), Some(&Cell::Text("42".to_string())));
    }

    #[test]
    fn test_type_mismatch_is_projection_error() {
        let err = project(json!({"risk": {"critical": {"n": 1}}})).unwrap_err();
        assert!(matches!(err, TableError::Projection { ref column, .. } if column == "critical"));
        assert!(err
            .to_string()
            .starts_with("t.list: projection_error: column 'critical': expected integer, found object"));
    }

    // --- context sources ---

    #[test]
    fn test_qual_echoed_when_response_omits_it() {
        let quals = Quals::new(vec![Qual::eq("standard", QualValue::Str("CIS".to_string()))]);
        let row = Projector::new("t.list", COLUMNS)
            .project(&json!({"id": "a"}), &RowScope::new(&quals))
            .unwrap();
        assert_eq!(row.get("standard"), Some(&Cell::Text("CIS".to_string())));
    }

    #[test]
    fn test_session_email_column() {
        let quals = Quals::default();
        let scope = RowScope::new(&quals).with_session_email(Some("me@example.com"));
        let row = Projector::new("t.list", COLUMNS).project(&json!({}), &scope).unwrap();
        assert_eq!(row.get("email"), Some(&Cell::Text("me@example.com".to_string())));
    }

    #[test]
    fn test_parent_and_envelope_sources() {
        let columns = [
            ColumnDef::parent("account_name", ColumnType::Text, "name", "Parent."),
            ColumnDef::envelope("total", ColumnType::Int, "_total", "Total."),
        ];
        let quals = Quals::default();
        let parent = json!({"name": "prod"});
        let envelope = json!({"_total": 7});
        let scope = RowScope::new(&quals)
            .with_parent(&parent)
            .with_envelope(Some(&envelope));
        let row = Projector::new("t.list", &columns).project(&json!({}), &scope).unwrap();
        assert_eq!(row.get("account_name"), Some(&Cell::Text("prod".to_string())));
        assert_eq!(row.get("total"), Some(&Cell::Int(7)));
    }

    #[test]
    fn test_grouping_reads_active_group_only() {
        let columns = [
            ColumnDef::new(
                "service_name",
                ColumnType::Text,
                ColumnSource::Grouping { group: "cloud.service", field: "serviceName" },
                "",
            ),
            ColumnDef::new(
                "region_name",
                ColumnType::Text,
                ColumnSource::Grouping { group: "cloud.region", field: "regionName" },
                "",
            ),
        ];
        let quals = Quals::new(vec![Qual::eq("region_name", QualValue::Str("us-east-1".into()))]);
        let scope = RowScope::new(&quals).with_grouping("cloud.service");
        let row = Projector::new("t.list", &columns)
            .project(&json!({"serviceName": "EC2", "regionName": "ignored"}), &scope)
            .unwrap();
        assert_eq!(row.get("service_name"), Some(&Cell::Text("EC2".to_string())));
        assert_eq!(row.get("region_name"), Some(&Cell::Text("us-east-1".to_string())));
    }

    // --- arrow ---

    #[test]
    fn test_rows_to_batch() {
        let rows = vec![
            project(json!({"id": "a", "lastSeen": 0, "enabled": true})).unwrap(),
            project(json!({"id": "b", "lastSeen": 5, "risk": {"critical": 1}})).unwrap(),
        ];
        let schema = arrow_schema(COLUMNS);
        let batch = rows_to_batch(Arc::clone(&schema), COLUMNS, &rows).unwrap();

        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), COLUMNS.len());
        let seen = batch
            .column(2)
            .as_any()
            .downcast_ref::<TimestampMillisecondArray>()
            .unwrap();
        assert!(seen.is_null(0));
        assert_eq!(seen.value(1), 5);
        assert_eq!(
            schema.field(2).data_type(),
            &DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into()))
        );
    }
}
