//! Typed column predicates ("quals") extracted from DataFusion filter expressions.
//!
//! Values stay typed here; they are only turned into API strings at the
//! translation boundary (`QualValue::to_param_string`).

use datafusion::common::ScalarValue;
use datafusion::logical_expr::{BinaryExpr, Expr, Operator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl QualOp {
    fn from_operator(op: &Operator) -> Option<Self> {
        match op {
            Operator::Eq => Some(QualOp::Eq),
            Operator::NotEq => Some(QualOp::NotEq),
            Operator::Lt => Some(QualOp::Lt),
            Operator::LtEq => Some(QualOp::LtEq),
            Operator::Gt => Some(QualOp::Gt),
            Operator::GtEq => Some(QualOp::GtEq),
            _ => None,
        }
    }

    /// The operator seen from the other side (`5 < x` is `x > 5`).
    fn flipped(self) -> Self {
        match self {
            QualOp::Lt => QualOp::Gt,
            QualOp::LtEq => QualOp::GtEq,
            QualOp::Gt => QualOp::Lt,
            QualOp::GtEq => QualOp::LtEq,
            other => other,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            QualOp::Eq => "=",
            QualOp::NotEq => "<>",
            QualOp::Lt => "<",
            QualOp::LtEq => "<=",
            QualOp::Gt => ">",
            QualOp::GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QualValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Epoch milliseconds.
    TimestampMs(i64),
}

impl QualValue {
    fn from_scalar(value: &ScalarValue) -> Option<Self> {
        match value {
            ScalarValue::Utf8(Some(s))
            | ScalarValue::LargeUtf8(Some(s))
            | ScalarValue::Utf8View(Some(s)) => Some(QualValue::Str(s.clone())),
            ScalarValue::Boolean(Some(b)) => Some(QualValue::Bool(*b)),
            ScalarValue::Int8(Some(v)) => Some(QualValue::Int(*v as i64)),
            ScalarValue::Int16(Some(v)) => Some(QualValue::Int(*v as i64)),
            ScalarValue::Int32(Some(v)) => Some(QualValue::Int(*v as i64)),
            ScalarValue::Int64(Some(v)) => Some(QualValue::Int(*v)),
            ScalarValue::UInt8(Some(v)) => Some(QualValue::Int(*v as i64)),
            ScalarValue::UInt16(Some(v)) => Some(QualValue::Int(*v as i64)),
            ScalarValue::UInt32(Some(v)) => Some(QualValue::Int(*v as i64)),
            ScalarValue::UInt64(Some(v)) => i64::try_from(*v).ok().map(QualValue::Int),
            ScalarValue::Float32(Some(v)) => Some(QualValue::Float(*v as f64)),
            ScalarValue::Float64(Some(v)) => Some(QualValue::Float(*v)),
            ScalarValue::TimestampSecond(Some(v), _) => {
                v.checked_mul(1000).map(QualValue::TimestampMs)
            }
            ScalarValue::TimestampMillisecond(Some(v), _) => Some(QualValue::TimestampMs(*v)),
            ScalarValue::TimestampMicrosecond(Some(v), _) => Some(QualValue::TimestampMs(v / 1000)),
            ScalarValue::TimestampNanosecond(Some(v), _) => {
                Some(QualValue::TimestampMs(v / 1_000_000))
            }
            _ => None,
        }
    }

    /// Serialize for the API's string-typed filter grammar.
    pub fn to_param_string(&self) -> String {
        match self {
            QualValue::Str(s) => s.clone(),
            QualValue::Int(v) => v.to_string(),
            QualValue::Float(v) => v.to_string(),
            QualValue::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            QualValue::TimestampMs(v) => v.to_string(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            QualValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp_ms(&self) -> Option<i64> {
        match self {
            QualValue::TimestampMs(v) | QualValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

/// One predicate: `column op value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Qual {
    pub column: String,
    pub op: QualOp,
    pub value: QualValue,
}

impl Qual {
    pub fn new(column: impl Into<String>, op: QualOp, value: QualValue) -> Self {
        Self {
            column: column.into(),
            op,
            value,
        }
    }

    pub fn eq(column: impl Into<String>, value: QualValue) -> Self {
        Self::new(column, QualOp::Eq, value)
    }

    /// Extract a qual from a filter expression, if it has a translatable shape.
    ///
    /// Recognized: `col op lit`, `lit op col`, a bare boolean column, `NOT col`
    /// and `col IS TRUE` / `col IS FALSE`.
    pub fn from_expr(expr: &Expr) -> Option<Self> {
        match expr {
            Expr::BinaryExpr(BinaryExpr { left, op, right }) => {
                let op = QualOp::from_operator(op)?;
                match (left.as_ref(), right.as_ref()) {
                    (Expr::Column(c), Expr::Literal(v)) => {
                        Some(Qual::new(&c.name, op, QualValue::from_scalar(v)?))
                    }
                    (Expr::Literal(v), Expr::Column(c)) => {
                        Some(Qual::new(&c.name, op.flipped(), QualValue::from_scalar(v)?))
                    }
                    _ => None,
                }
            }
            Expr::Column(c) => Some(Qual::eq(&c.name, QualValue::Bool(true))),
            Expr::IsTrue(inner) => match inner.as_ref() {
                Expr::Column(c) => Some(Qual::eq(&c.name, QualValue::Bool(true))),
                _ => None,
            },
            Expr::Not(inner) | Expr::IsFalse(inner) => match inner.as_ref() {
                Expr::Column(c) => Some(Qual::eq(&c.name, QualValue::Bool(false))),
                _ => None,
            },
            _ => None,
        }
    }
}

/// The set of quals active for one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Quals(Vec<Qual>);

impl Quals {
    pub fn new(quals: Vec<Qual>) -> Self {
        Self(quals)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Qual> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// All quals on a column.
    pub fn for_column<'a, 'c>(&'a self, column: &'c str) -> impl Iterator<Item = &'a Qual> + 'c
    where
        'a: 'c,
    {
        self.0.iter().filter(move |q| q.column == column)
    }

    /// Value of the first `=` qual on a column.
    pub fn equals(&self, column: &str) -> Option<&QualValue> {
        self.0
            .iter()
            .find(|q| q.column == column && q.op == QualOp::Eq)
            .map(|q| &q.value)
    }

    /// `=` value rendered as an API string; empty strings count as absent.
    pub fn equals_string(&self, column: &str) -> Option<String> {
        self.equals(column)
            .map(QualValue::to_param_string)
            .filter(|s| !s.is_empty())
    }
}

impl FromIterator<Qual> for Quals {
    fn from_iter<I: IntoIterator<Item = Qual>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::prelude::{col, lit};

    // --- expression extraction ---

    #[test]
    fn test_column_eq_literal() {
        let qual = Qual::from_expr(&col("severity").eq(lit("high"))).unwrap();
        assert_eq!(qual, Qual::eq("severity", QualValue::Str("high".to_string())));
    }

    #[test]
    fn test_literal_on_left_flips_operator() {
        let expr = lit(5i64).lt(col("count"));
        let qual = Qual::from_expr(&expr).unwrap();
        assert_eq!(qual.column, "count");
        assert_eq!(qual.op, QualOp::Gt);
        assert_eq!(qual.value, QualValue::Int(5));
    }

    #[test]
    fn test_bare_boolean_column() {
        let qual = Qual::from_expr(&col("enabled")).unwrap();
        assert_eq!(qual, Qual::eq("enabled", QualValue::Bool(true)));
    }

    #[test]
    fn test_negated_boolean_column() {
        let qual = Qual::from_expr(&!col("enabled")).unwrap();
        assert_eq!(qual, Qual::eq("enabled", QualValue::Bool(false)));
    }

    #[test]
    fn test_not_equal_boolean() {
        let qual = Qual::from_expr(&col("policy_remediable").not_eq(lit(true))).unwrap();
        assert_eq!(qual.op, QualOp::NotEq);
        assert_eq!(qual.value, QualValue::Bool(true));
    }

    #[test]
    fn test_timestamp_literal_normalized_to_millis() {
        let expr = col("alert_time").gt_eq(lit(ScalarValue::TimestampNanosecond(
            Some(1_700_000_000_000_000_000),
            None,
        )));
        let qual = Qual::from_expr(&expr).unwrap();
        assert_eq!(qual.op, QualOp::GtEq);
        assert_eq!(qual.value, QualValue::TimestampMs(1_700_000_000_000));
    }

    #[test]
    fn test_out_of_range_seconds_not_translated() {
        let expr = col("alert_time").gt(lit(ScalarValue::TimestampSecond(Some(i64::MAX), None)));
        assert!(Qual::from_expr(&expr).is_none());

        let expr = col("alert_time").gt(lit(ScalarValue::TimestampSecond(Some(1_700_000_000), None)));
        assert_eq!(
            Qual::from_expr(&expr).unwrap().value,
            QualValue::TimestampMs(1_700_000_000_000)
        );
    }

    #[test]
    fn test_unsupported_shapes_ignored() {
        assert!(Qual::from_expr(&col("name").like(lit("a%"))).is_none());
        assert!(Qual::from_expr(&col("a").eq(col("b"))).is_none());
        assert!(Qual::from_expr(&col("name").eq(lit(ScalarValue::Utf8(None)))).is_none());
        assert!(Qual::from_expr(&col("a").is_null()).is_none());
    }

    // --- value serialization ---

    #[test]
    fn test_bool_serialized_as_literal_string() {
        assert_eq!(QualValue::Bool(true).to_param_string(), "true");
        assert_eq!(QualValue::Bool(false).to_param_string(), "false");
    }

    #[test]
    fn test_numbers_serialized() {
        assert_eq!(QualValue::Int(42).to_param_string(), "42");
        assert_eq!(QualValue::Float(1.5).to_param_string(), "1.5");
    }

    // --- qual set lookups ---

    #[test]
    fn test_equals_lookup_ignores_ranges() {
        let quals = Quals::new(vec![
            Qual::new("alert_time", QualOp::Gt, QualValue::TimestampMs(1)),
            Qual::eq("status", QualValue::Str("open".to_string())),
        ]);
        assert!(quals.equals("alert_time").is_none());
        assert_eq!(quals.equals_string("status").as_deref(), Some("open"));
        assert_eq!(quals.for_column("alert_time").count(), 1);
    }

    #[test]
    fn test_equals_borrows_from_quals_not_column_name() {
        let quals = Quals::new(vec![Qual::eq("severity", QualValue::Str("high".to_string()))]);
        let value = {
            let column = String::from("severity");
            quals.equals(&column)
        };
        assert_eq!(value, Some(&QualValue::Str("high".to_string())));
    }

    #[test]
    fn test_empty_string_counts_as_absent() {
        let quals = Quals::new(vec![Qual::eq("name", QualValue::Str(String::new()))]);
        assert!(quals.equals("name").is_some());
        assert!(quals.equals_string("name").is_none());
    }
}
