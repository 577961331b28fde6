//! `prismacloud_policy`: policies available in the tenant.

use async_trait::async_trait;
use prismacloud_client::ApiRequest;
use serde_json::Value;

use crate::error::Result;
use crate::paginate::{EndpointSource, Envelope, PageStats, RowSink};
use crate::project::{ColumnDef, ColumnType::*};
use crate::table::{KeyColumn, Scan, TableDescriptor, TableFetch};
use crate::translate::ParamMapping;

use super::LARGE_PAGE;

pub(crate) const LIST_PARAMS: ParamMapping = ParamMapping::new(&[
    ("compliance_standard_name", "policy.complianceStandard"),
    ("compliance_requirement_name", "policy.complianceRequirement"),
    ("compliance_section_id", "policy.complianceSection"),
    ("cloud_type", "cloud.type"),
    ("severity", "policy.severity"),
    ("policy_type", "policy.type"),
    ("enabled", "policy.enabled"),
    ("policy_mode", "policy.mode"),
    ("remediable", "policy.remediable"),
    ("name", "policy.name"),
]);

pub fn table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_policy",
        "List of available policies in Prisma Cloud.",
        vec![
            ColumnDef::email(),
            ColumnDef::field("policy_id", Text, "policyId", "The unique identifier for the policy."),
            ColumnDef::field("name", Text, "name", "The name of the policy."),
            ColumnDef::field("policy_type", Text, "policyType", "The type of the policy."),
            ColumnDef::field("system_default", Bool, "systemDefault", "Indicates if the policy is a system default."),
            ColumnDef::field("policy_upi", Text, "policyUpi", "The unique policy identifier."),
            ColumnDef::qual("compliance_standard_name", Text, "The name of the compliance standard."),
            ColumnDef::qual("compliance_requirement_name", Text, "The name of the compliance requirement."),
            ColumnDef::qual("compliance_section_id", Text, "The ID of the compliance section."),
            ColumnDef::field("description", Text, "description", "The description of the policy."),
            ColumnDef::field("severity", Text, "severity", "The severity level of the policy."),
            ColumnDef::field("recommendation", Text, "recommendation", "The recommendation for the policy."),
            ColumnDef::field("cloud_type", Text, "cloudType", "The type of cloud (e.g., AWS, Azure, GCP)."),
            ColumnDef::field("enabled", Bool, "enabled", "Indicates if the policy is enabled."),
            ColumnDef::field("created_on", Timestamp, "createdOn", "The timestamp when the policy was created."),
            ColumnDef::field("created_by", Text, "createdBy", "The user who created the policy."),
            ColumnDef::field("last_modified_on", Timestamp, "lastModifiedOn", "The timestamp of the last modification."),
            ColumnDef::field("last_modified_by", Text, "lastModifiedBy", "The user who last modified the policy."),
            ColumnDef::field("rule_last_modified_on", Timestamp, "ruleLastModifiedOn", "The timestamp of the last modification to the rule."),
            ColumnDef::field("overridden", Bool, "overridden", "Indicates if the policy has been overridden."),
            ColumnDef::field("deleted", Bool, "deleted", "Indicates if the policy has been deleted."),
            ColumnDef::field("restrict_alert_dismissal", Bool, "restrictAlertDismissal", "Indicates if alert dismissal is restricted for the policy."),
            ColumnDef::field("owner", Text, "owner", "The owner of the policy."),
            ColumnDef::field("policy_mode", Text, "policyMode", "The mode of the policy."),
            ColumnDef::field("policy_category", Text, "policyCategory", "The category of the policy."),
            ColumnDef::field("policy_class", Text, "policyClass", "The class of the policy."),
            ColumnDef::field("remediable", Bool, "remediable", "Indicates if the policy is remediable."),
            ColumnDef::field("policy_sub_types", Json, "policySubTypes", "The subtypes of the policy."),
            ColumnDef::field("rule", Json, "rule", "The rule associated with the policy."),
            ColumnDef::field("compliance_metadata", Json, "complianceMetadata", "The compliance metadata associated with the policy."),
            ColumnDef::field("remediation", Json, "remediation", "The remediation information for the policy."),
            ColumnDef::field("labels", Json, "labels", "The labels associated with the policy."),
            ColumnDef::field("title", Text, "name", "Title of the policy."),
        ],
        Policies,
    )
    .with_list_keys(LIST_PARAMS.columns().map(KeyColumn::optional).collect())
    .with_get_key("policy_id")
}

struct Policies;

#[async_trait]
impl TableFetch for Policies {
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats> {
        let params = LIST_PARAMS.query_params(scan.quals());
        let source = EndpointSource::new(scan.client(), Envelope::Array, |page| {
            let request = ApiRequest::get(&["v2", "policy"]).params(params.clone());
            match &page.token {
                Some(token) => request.param("nextPageToken", token.as_str()),
                None => request,
            }
        });
        scan.paginator(LARGE_PAGE)
            .drive(&source, scan.scope(), &scan.projector(), sink)
            .await
    }

    async fn get(&self, scan: &Scan<'_>, key: &str) -> Result<Option<Value>> {
        scan.lookup(&ApiRequest::get(&["policy", key])).await
    }
}
