//! Table definitions.
//!
//! Each submodule declares its columns, key columns and the fetch logic for
//! one or more tables. `all()` is the registry's source of truth.

pub mod account;
pub mod admin;
pub mod alert;
pub mod breakdown;
pub mod compliance;
pub mod iam;
pub mod inventory;
pub mod policy;
pub mod vulnerability;

use async_trait::async_trait;
use prismacloud_client::ApiRequest;
use serde_json::Value;

use crate::error::Result;
use crate::paginate::{EndpointSource, Envelope, PageStats, RowSink};
use crate::table::{Scan, TableDescriptor, TableFetch};

/// Page size for endpoints that accept up to 10,000 items per page.
pub(crate) const LARGE_PAGE: usize = 10_000;

/// A GET endpoint answering with every item at once. With `lookup`, the key
/// is appended to the path for point lookups.
pub(crate) struct PlainList {
    pub path: &'static [&'static str],
    pub lookup: bool,
}

impl PlainList {
    pub const fn new(path: &'static [&'static str]) -> Self {
        Self { path, lookup: false }
    }

    pub const fn with_lookup(path: &'static [&'static str]) -> Self {
        Self { path, lookup: true }
    }
}

#[async_trait]
impl TableFetch for PlainList {
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats> {
        let source = EndpointSource::new(scan.client(), Envelope::Array, |_| ApiRequest::get(self.path));
        scan.paginator(LARGE_PAGE)
            .drive(&source, scan.scope(), &scan.projector(), sink)
            .await
    }

    async fn get(&self, scan: &Scan<'_>, key: &str) -> Result<Option<Value>> {
        if !self.lookup {
            return Ok(None);
        }
        let mut path: Vec<&str> = Vec::with_capacity(self.path.len() + 1);
        path.extend_from_slice(self.path);
        path.push(key);
        scan.lookup(&ApiRequest::get(&path)).await
    }
}

/// Every table this crate exposes, in registration order.
pub fn all() -> Vec<TableDescriptor> {
    vec![
        account::table(),
        admin::report_table(),
        admin::resource_table(),
        admin::trusted_alert_ip_table(),
        alert::table(),
        breakdown::requirement_summary_table(),
        breakdown::section_summary_table(),
        breakdown::statistic_table(),
        breakdown::summary_table(),
        compliance::posture_table(),
        compliance::requirement_table(),
        compliance::standard_table(),
        iam::permission_group_table(),
        iam::permission_table(),
        iam::role_table(),
        iam::user_table(),
        inventory::api_endpoint_table(),
        inventory::asset_explorer_table(),
        inventory::asset_view_table(),
        inventory::workload_container_image_table(),
        inventory::workload_host_table(),
        inventory::workload_table(),
        policy::table(),
        vulnerability::asset_table(),
        vulnerability::burndown_table(),
        vulnerability::overview_table(),
        vulnerability::prioritized_table(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_names_unique_and_prefixed() {
        let tables = all();
        let names: HashSet<&str> = tables.iter().map(|t| t.name).collect();
        assert_eq!(names.len(), tables.len());
        assert!(tables.iter().all(|t| t.name.starts_with("prismacloud_")));
    }

    #[test]
    fn test_every_table_has_email_first() {
        for table in all() {
            assert_eq!(table.columns[0].name, "email", "{}", table.name);
        }
    }

    #[test]
    fn test_column_names_unique_per_table() {
        for table in all() {
            let names: HashSet<&str> = table.columns.iter().map(|c| c.name).collect();
            assert_eq!(names.len(), table.columns.len(), "{}", table.name);
        }
    }

    #[test]
    fn test_key_columns_are_declared_columns() {
        for table in all() {
            for key in &table.list_keys {
                assert!(table.column(key.name).is_some(), "{}.{}", table.name, key.name);
            }
            if let Some(key) = table.get_key {
                assert!(table.column(key).is_some(), "{}.{}", table.name, key);
            }
        }
    }
}
