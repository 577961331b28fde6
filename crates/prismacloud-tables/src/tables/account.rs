//! `prismacloud_account`: cloud accounts onboarded onto the platform.

use async_trait::async_trait;
use prismacloud_client::ApiRequest;
use serde_json::Value;

use crate::error::{Result, TableError};
use crate::paginate::{EndpointSource, Envelope, PageStats, RowSink};
use crate::project::{ColumnDef, ColumnType::*};
use crate::table::{Scan, TableDescriptor, TableFetch};

use super::LARGE_PAGE;

pub fn table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_account",
        "List all cloud accounts onboarded onto the Prisma Cloud platform.",
        vec![
            ColumnDef::email(),
            ColumnDef::field("account_id", Text, "accountId", "The unique identifier for the account."),
            ColumnDef::field("name", Text, "name", "The name of the account."),
            ColumnDef::field("cloud_type", Text, "cloudType", "The type of cloud (e.g., AWS, Azure, GCP)."),
            ColumnDef::field("account_type", Text, "accountType", "The type of the account."),
            ColumnDef::field("enabled", Bool, "enabled", "Indicates if the account is enabled."),
            ColumnDef::field("last_modified_ts", Timestamp, "lastModifiedTs", "The timestamp of the last modification."),
            ColumnDef::field("last_modified_by", Text, "lastModifiedBy", "The user who last modified the account."),
            ColumnDef::field("storage_scan_enabled", Bool, "storageScanEnabled", "Indicates if the storage scan is enabled."),
            ColumnDef::field("protection_mode", Text, "protectionMode", "The protection mode of the account."),
            ColumnDef::field("ingestion_mode", Int, "ingestionMode", "The ingestion mode of the account."),
            ColumnDef::field("status", Text, "status", "The status of the account."),
            ColumnDef::field("number_of_child_accounts", Int, "numberOfChildAccounts", "The number of child accounts associated with the account."),
            ColumnDef::field("added_on", Int, "addedOn", "The timestamp when the account was added."),
            ColumnDef::field("group_ids", Json, "groupIds", "The IDs of the groups associated with the account."),
            ColumnDef::field("groups", Json, "groups", "The groups associated with the account."),
            ColumnDef::field("title", Text, "name", "Title of the account."),
        ],
        ListAccounts,
    )
}

struct ListAccounts;

#[async_trait]
impl TableFetch for ListAccounts {
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats> {
        let source = EndpointSource::new(scan.client(), Envelope::Array, |_| {
            ApiRequest::get(&["cloud"])
        });
        scan.paginator(LARGE_PAGE)
            .drive(&source, scan.scope(), &scan.projector(), sink)
            .await
    }
}

/// Enumerate every account as raw JSON, for parent/child fan-out.
pub(crate) async fn list_accounts(scan: &Scan<'_>) -> Result<Vec<Value>> {
    let body = scan.call(&ApiRequest::get(&["cloud"])).await?;
    Envelope::Array
        .split(body)
        .map(|page| page.items)
        .map_err(|e| TableError::upstream(scan.ctx.operation("list_accounts"), e))
}
