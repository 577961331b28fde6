//! Compliance standards, their requirements, and the tenant-wide posture.

use async_trait::async_trait;
use prismacloud_client::ApiRequest;
use serde_json::{json, Value};

use crate::error::{Result, TableError};
use crate::paginate::{EndpointSource, Envelope, PageStats, RowSink};
use crate::project::{ColumnDef, ColumnType::*};
use crate::table::{KeyColumn, Scan, TableDescriptor, TableFetch};

use super::LARGE_PAGE;

pub fn standard_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_compliance_standard",
        "List all available compliance standards.",
        vec![
            ColumnDef::email(),
            ColumnDef::field("name", Text, "name", "The name of the compliance standard."),
            ColumnDef::field("id", Text, "id", "The unique identifier for the compliance standard."),
            ColumnDef::field("policies_assigned_count", Int, "policiesAssignedCount", "The number of policies assigned to the compliance standard."),
            ColumnDef::field("system_default", Bool, "systemDefault", "Indicates if the compliance standard is a system default."),
            ColumnDef::field("created_on", Timestamp, "createdOn", "The timestamp when the compliance standard was created."),
            ColumnDef::field("created_by", Text, "createdBy", "The user who created the compliance standard."),
            ColumnDef::field("description", Text, "description", "The description of the compliance standard."),
            ColumnDef::field("last_modified_by", Text, "lastModifiedBy", "The user who last modified the compliance standard."),
            ColumnDef::field("last_modified_on", Timestamp, "lastModifiedOn", "The timestamp when the compliance standard was last modified."),
            ColumnDef::field("cloud_type", Json, "cloudType", "The cloud types the compliance standard applies to."),
            ColumnDef::field("title", Text, "name", "Title of the compliance standard."),
        ],
        Standards,
    )
    .with_get_key("id")
}

struct Standards;

#[async_trait]
impl TableFetch for Standards {
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats> {
        let source = EndpointSource::new(scan.client(), Envelope::Array, |_| {
            ApiRequest::get(&["compliance"])
        });
        scan.paginator(LARGE_PAGE)
            .drive(&source, scan.scope(), &scan.projector(), sink)
            .await
    }

    async fn get(&self, scan: &Scan<'_>, key: &str) -> Result<Option<Value>> {
        scan.lookup(&ApiRequest::get(&["compliance", key])).await
    }
}

pub fn requirement_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_compliance_requirement",
        "List requirements of the available compliance standards.",
        vec![
            ColumnDef::email(),
            ColumnDef::field("name", Text, "name", "The name of the compliance requirement."),
            ColumnDef::field("compliance_id", Text, "complianceId", "The ID of the compliance standard the requirement belongs to."),
            ColumnDef::field("id", Text, "id", "The unique identifier for the compliance requirement."),
            ColumnDef::field("created_by", Text, "createdBy", "The user who created the compliance requirement."),
            ColumnDef::field("created_on", Timestamp, "createdOn", "The timestamp when the compliance requirement was created."),
            ColumnDef::field("description", Text, "description", "The description of the compliance requirement."),
            ColumnDef::field("last_modified_by", Text, "lastModifiedBy", "The user who last modified the compliance requirement."),
            ColumnDef::field("last_modified_on", Timestamp, "lastModifiedOn", "The timestamp when the compliance requirement was last modified."),
            ColumnDef::field("policies_assigned_count", Int, "policiesAssignedCount", "The number of policies assigned to the compliance requirement."),
            ColumnDef::field("requirement_id", Text, "requirementId", "The requirement identifier within its standard."),
            ColumnDef::field("standard_name", Text, "standardName", "The name of the compliance standard."),
            ColumnDef::field("system_default", Bool, "systemDefault", "Indicates if the compliance requirement is a system default."),
            ColumnDef::field("view_order", Int, "viewOrder", "The display order of the requirement."),
            ColumnDef::field("title", Text, "name", "Title of the compliance requirement."),
        ],
        Requirements,
    )
    .with_list_keys(vec![KeyColumn::optional("compliance_id")])
    .with_get_key("id")
}

struct Requirements;

#[async_trait]
impl TableFetch for Requirements {
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats> {
        // A compliance_id predicate names the only parent worth visiting.
        let standards = match scan.quals().equals_string("compliance_id") {
            Some(id) => vec![json!({ "id": id })],
            None => list_standards(scan).await?,
        };

        scan.paginator(LARGE_PAGE)
            .fan_out(
                &standards,
                |standard| {
                    let id = standard.get("id").and_then(Value::as_str).unwrap_or_default();
                    EndpointSource::new(scan.client(), Envelope::Array, move |_| {
                        ApiRequest::get(&["compliance", id, "requirement"])
                    })
                },
                scan.scope(),
                &scan.projector(),
                sink,
            )
            .await
    }

    async fn get(&self, scan: &Scan<'_>, key: &str) -> Result<Option<Value>> {
        scan.lookup(&ApiRequest::get(&["compliance", "requirement", key])).await
    }
}

async fn list_standards(scan: &Scan<'_>) -> Result<Vec<Value>> {
    let body = scan.call(&ApiRequest::get(&["compliance"])).await?;
    Envelope::Array
        .split(body)
        .map(|page| page.items)
        .map_err(|e| TableError::upstream(scan.ctx.operation("list_standards"), e))
}

pub fn posture_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_compliance_posture",
        "Compliance posture per standard across the tenant.",
        vec![
            ColumnDef::email(),
            ColumnDef::field("name", Text, "name", "The name of the compliance standard."),
            ColumnDef::field("assigned_policies", Int, "assignedPolicies", "The number of policies assigned."),
            ColumnDef::field("critical_severity_failed_resources", Int, "criticalSeverityFailedResources", "The number of resources failing critical severity policies."),
            ColumnDef::field("high_severity_failed_resources", Int, "highSeverityFailedResources", "The number of resources failing high severity policies."),
            ColumnDef::field("informational_severity_failed_resources", Int, "informationalSeverityFailedResources", "The number of resources failing informational severity policies."),
            ColumnDef::field("low_severity_failed_resources", Int, "lowSeverityFailedResources", "The number of resources failing low severity policies."),
            ColumnDef::field("medium_severity_failed_resources", Int, "mediumSeverityFailedResources", "The number of resources failing medium severity policies."),
            ColumnDef::field("default", Bool, "default", "Indicates if the standard is a default standard."),
            ColumnDef::field("description", Text, "description", "The description of the compliance standard."),
            ColumnDef::field("failed_resources", Int, "failedResources", "The number of failed resources."),
            ColumnDef::field("id", Text, "id", "The unique identifier for the compliance standard."),
            ColumnDef::field("passed_resources", Int, "passedResources", "The number of passed resources."),
            ColumnDef::field("total_resources", Int, "totalResources", "The total number of resources."),
            ColumnDef::field("title", Text, "name", "Title of the compliance standard."),
        ],
        Posture,
    )
}

struct Posture;

#[async_trait]
impl TableFetch for Posture {
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats> {
        let source = EndpointSource::new(scan.client(), Envelope::Member("complianceDetails"), |_| {
            ApiRequest::get(&["v2", "compliance", "posture"])
        })
        .empty_on_status(400);
        scan.paginator(LARGE_PAGE)
            .drive(&source, scan.scope(), &scan.projector(), sink)
            .await
    }
}
