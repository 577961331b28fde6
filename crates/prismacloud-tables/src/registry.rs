//! Table registry: table name → descriptor, and registration with a
//! DataFusion `SessionContext`.

use std::collections::BTreeMap;
use std::sync::Arc;

use datafusion::error::Result as DFResult;
use datafusion::prelude::SessionContext;
use tracing::info;

use crate::error::{Result, TableError};
use crate::provider::{ConnectionSource, PrismaTable};
use crate::table::TableDescriptor;
use crate::tables;

#[derive(Debug, Clone)]
pub struct TableRegistry {
    tables: BTreeMap<&'static str, Arc<TableDescriptor>>,
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self::from_descriptors(tables::all())
    }
}

impl TableRegistry {
    /// Registry holding every built-in table.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = TableDescriptor>) -> Self {
        let tables = descriptors
            .into_iter()
            .map(|d| (d.name, Arc::new(d)))
            .collect();
        Self { tables }
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<TableDescriptor>> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| TableError::UnknownTable(name.to_string()))
    }

    /// Descriptors in name order.
    pub fn list(&self) -> impl Iterator<Item = &TableDescriptor> {
        self.tables.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Register every table with `ctx`, all sharing one connection.
    pub fn register_all(&self, ctx: &SessionContext, source: &ConnectionSource) -> DFResult<usize> {
        for descriptor in self.tables.values() {
            let table = PrismaTable::new(Arc::clone(descriptor), source.clone());
            ctx.register_table(descriptor.name, Arc::new(table))?;
        }
        info!(
            "Registered {} tables for connection '{}'",
            self.tables.len(),
            source.name
        );
        Ok(self.tables.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prismacloud_client::{ConnectionConfig, ConnectionPool};

    #[test]
    fn test_lookup_known_and_unknown() {
        let registry = TableRegistry::new();
        assert_eq!(registry.lookup("prismacloud_policy").unwrap().name, "prismacloud_policy");
        let err = registry.lookup("prismacloud_nope").unwrap_err();
        assert_eq!(err.to_string(), "unknown table 'prismacloud_nope'");
    }

    #[test]
    fn test_list_is_sorted() {
        let registry = TableRegistry::new();
        let names: Vec<&str> = registry.list().map(|t| t.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(registry.len(), tables::all().len());
    }

    #[tokio::test]
    async fn test_register_all_exposes_tables_without_connecting() {
        let registry = TableRegistry::new();
        let ctx = SessionContext::new();
        let source = ConnectionSource {
            pool: Arc::new(ConnectionPool::new()),
            name: "default".to_string(),
            config: Arc::new(ConnectionConfig::default()),
        };

        let count = registry.register_all(&ctx, &source).unwrap();
        assert_eq!(count, registry.len());
        assert!(ctx.table_exist("prismacloud_alert").unwrap());
        assert!(source.pool.is_empty().await);
    }
}
