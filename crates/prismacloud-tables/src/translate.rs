//! Predicate translation: quals → API query parameters, filter lists and time windows.

use chrono::{DateTime, Months, Utc};

use crate::qual::{QualOp, Quals};

/// Ordered `(key, value)` query-string pairs.
pub type QueryParams = Vec<(String, String)>;

/// Structured filters for search-style request bodies.
pub type FilterList = Vec<ApiFilter>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFilter {
    pub name: String,
    pub operator: String,
    pub value: String,
}

impl ApiFilter {
    pub fn equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operator: "=".to_string(),
            value: value.into(),
        }
    }
}

/// Static `{column -> remote parameter}` mapping declared by a table.
///
/// Only `=` quals are translated; columns missing from the mapping and other
/// operators are left for the engine to filter.
#[derive(Debug, Clone, Copy)]
pub struct ParamMapping {
    entries: &'static [(&'static str, &'static str)],
}

impl ParamMapping {
    pub const fn new(entries: &'static [(&'static str, &'static str)]) -> Self {
        Self { entries }
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(column, _)| *column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.entries.iter().any(|(c, _)| *c == column)
    }

    /// Query-string pairs in mapping order.
    pub fn query_params(&self, quals: &Quals) -> QueryParams {
        self.entries
            .iter()
            .filter_map(|(column, param)| {
                quals
                    .equals_string(column)
                    .map(|value| (param.to_string(), value))
            })
            .collect()
    }

    /// `[{name, operator: "=", value}]` in mapping order.
    pub fn filters(&self, quals: &Quals) -> FilterList {
        self.entries
            .iter()
            .filter_map(|(column, name)| {
                quals
                    .equals_string(column)
                    .map(|value| ApiFilter::equals(*name, value))
            })
            .collect()
    }
}

/// The boolean a `col = b` or `col <> b` predicate selects.
///
/// `= true` and `<> false` select `true`; `= false` and `<> true` select `false`.
/// The last matching qual wins.
pub fn selected_bool(quals: &Quals, column: &str) -> Option<bool> {
    quals
        .for_column(column)
        .filter_map(|q| {
            let b = q.value.as_bool()?;
            match q.op {
                QualOp::Eq => Some(b),
                QualOp::NotEq => Some(!b),
                _ => None,
            }
        })
        .last()
}

/// Absolute `[start, end]` search window in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeWindow {
    /// Build the window for `column`.
    ///
    /// Defaults to `default_months_back` months before `now` through `now`.
    /// Lower bounds (`=`, `>=`, `>`) move the start, upper bounds (`<`, `<=`)
    /// move the end; with several bounds the narrowest window is kept.
    pub fn from_quals(
        quals: &Quals,
        column: &str,
        default_months_back: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let end_ms = now.timestamp_millis();
        let start_ms = now
            .checked_sub_months(Months::new(default_months_back))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
            .timestamp_millis();

        let mut lower: Option<i64> = None;
        let mut upper: Option<i64> = None;
        for qual in quals.for_column(column) {
            let Some(ts) = qual.value.as_timestamp_ms() else {
                continue;
            };
            match qual.op {
                QualOp::Eq | QualOp::GtEq | QualOp::Gt => {
                    lower = Some(lower.map_or(ts, |l| l.max(ts)));
                }
                QualOp::Lt | QualOp::LtEq => {
                    upper = Some(upper.map_or(ts, |u| u.min(ts)));
                }
                QualOp::NotEq => {}
            }
        }

        Self {
            start_ms: lower.unwrap_or(start_ms),
            end_ms: upper.unwrap_or(end_ms),
        }
    }
}
