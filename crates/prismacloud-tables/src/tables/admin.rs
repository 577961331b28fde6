//! Tenant administration objects: trusted alert IPs, reports and resource lists.

use async_trait::async_trait;
use prismacloud_client::ApiRequest;
use serde_json::Value;

use crate::error::Result;
use crate::paginate::{EndpointSource, Envelope, PageStats, RowSink};
use crate::project::{ColumnDef, ColumnType::*};
use crate::table::{Scan, TableDescriptor, TableFetch};

use super::{PlainList, LARGE_PAGE};

const TRUSTED_IP_PATH: &[&str] = &["allow_list", "network"];

pub fn trusted_alert_ip_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_trusted_alert_ip",
        "List the trusted IP address ranges excluded from alerting.",
        vec![
            ColumnDef::email(),
            ColumnDef::field("name", Text, "name", "The name of the trusted IP list."),
            ColumnDef::field("uuid", Text, "uuid", "The unique identifier of the trusted IP list."),
            ColumnDef::field("cidr_count", Int, "cidrCount", "The number of CIDR blocks in the list."),
            ColumnDef::field("cidrs", Json, "cidrs", "The CIDR blocks in the list."),
            ColumnDef::field("title", Text, "name", "Title of the trusted IP list."),
        ],
        TrustedIps,
    )
    .with_get_key("uuid")
}

struct TrustedIps;

#[async_trait]
impl TableFetch for TrustedIps {
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats> {
        let source = EndpointSource::new(scan.client(), Envelope::Array, |_| ApiRequest::get(TRUSTED_IP_PATH));
        scan.paginator(LARGE_PAGE)
            .drive(&source, scan.scope(), &scan.projector(), sink)
            .await
    }

    /// The endpoint has no per-list lookup; the key is matched against the full list.
    async fn get(&self, scan: &Scan<'_>, key: &str) -> Result<Option<Value>> {
        let lists = scan.call(&ApiRequest::get(TRUSTED_IP_PATH)).await?;
        Ok(find_by_uuid(lists, key))
    }
}

fn find_by_uuid(lists: Value, uuid: &str) -> Option<Value> {
    match lists {
        Value::Array(items) => items
            .into_iter()
            .find(|item| item.get("uuid").and_then(Value::as_str) == Some(uuid)),
        _ => None,
    }
}

pub fn report_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_report",
        "List of available alert and compliance reports.",
        vec![
            ColumnDef::email(),
            ColumnDef::field("id", Text, "id", "The unique identifier for the report."),
            ColumnDef::field("name", Text, "name", "The name of the report."),
            ColumnDef::field("type", Text, "type", "The type of the report."),
            ColumnDef::field("cloud_type", Text, "cloudType", "The type of cloud (e.g., AWS, Azure, GCP)."),
            ColumnDef::field("compliance_standard_id", Text, "complianceStandardId", "The ID of the compliance standard associated with the report."),
            ColumnDef::field("target", Json, "target", "The target configuration of the report."),
            ColumnDef::field("status", Text, "status", "The status of the report."),
            ColumnDef::field("created_on", Timestamp, "createdOn", "The timestamp when the report was created."),
            ColumnDef::field("created_by", Text, "createdBy", "The user who created the report."),
            ColumnDef::field("last_modified_on", Timestamp, "lastModifiedOn", "The timestamp of the last modification."),
            ColumnDef::field("last_modified_by", Text, "lastModifiedBy", "The user who last modified the report."),
            ColumnDef::field("next_schedule", Timestamp, "nextSchedule", "The timestamp of the next scheduled run."),
            ColumnDef::field("last_scheduled", Timestamp, "lastScheduled", "The timestamp of the last scheduled run."),
            ColumnDef::field("total_instance_count", Int, "totalInstanceCount", "The total number of instances in the report."),
            ColumnDef::field("counts", Json, "counts", "Counts of various metrics in the report."),
            ColumnDef::field("title", Text, "name", "Title of the report."),
        ],
        PlainList::with_lookup(&["report"]),
    )
    .with_get_key("id")
}

pub fn resource_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_resource",
        "List of resource lists defined in Prisma Cloud.",
        vec![
            ColumnDef::email(),
            ColumnDef::field("id", Text, "id", "The unique identifier for the resource list."),
            ColumnDef::field("name", Text, "name", "The name of the resource list."),
            ColumnDef::field("description", Text, "description", "The description of the resource list."),
            ColumnDef::field("type", Text, "resourceListType", "The type of the resource list."),
            ColumnDef::field("last_modified_by", Text, "lastModifiedBy", "The user who last modified the resource list."),
            ColumnDef::field("last_modified_ts", Timestamp, "lastModifiedTs", "The timestamp of the last modification."),
            ColumnDef::field("members", Json, "members", "The members of the resource list."),
            ColumnDef::field("title", Text, "name", "Title of the resource list."),
        ],
        PlainList::with_lookup(&["v1", "resource_list"]),
    )
    .with_get_key("id")
}
