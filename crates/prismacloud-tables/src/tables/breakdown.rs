//! Compliance breakdowns.
//!
//! The summary, statistic and requirement tables enumerate the onboarded
//! accounts and issue one posture request per account; they differ only in
//! which part of the response becomes rows. The section table issues a single
//! posture request and flattens the sections of every requirement.

use async_trait::async_trait;
use prismacloud_client::ApiRequest;
use serde_json::Value;

use crate::error::{Result, TableError};
use crate::paginate::{EndpointSource, Envelope, PageStats, RowSink, StaticSource};
use crate::project::{ColumnDef, ColumnType::*};
use crate::table::{KeyColumn, Scan, TableDescriptor, TableFetch};
use crate::translate::ParamMapping;

use super::account::list_accounts;
use super::LARGE_PAGE;

/// Sent with every per-account request. `cloud_type` narrows the accounts
/// instead; `cloud_region` is echoed only.
const COMPLIANCE_PARAMS: ParamMapping = ParamMapping::new(&[
    ("policy_compliance_standard_name", "policy.complianceStandard"),
    ("policy_compliance_requirement_name", "policy.complianceRequirement"),
    ("policy_compliance_section_id", "policy.complianceSection"),
]);

const SECTION_PARAMS: ParamMapping = ParamMapping::new(&[
    ("account_name", "cloud.account"),
    ("cloud_type", "cloud.type"),
    ("cloud_region", "cloud.region"),
    ("policy_compliance_standard_name", "policy.complianceStandard"),
    ("policy_compliance_requirement_name", "policy.complianceRequirement"),
    ("policy_compliance_section_id", "policy.complianceSection"),
]);

fn key_columns() -> Vec<KeyColumn> {
    SECTION_PARAMS.columns().map(KeyColumn::optional).collect()
}

fn with_account_columns(specific: Vec<ColumnDef>) -> Vec<ColumnDef> {
    let mut columns = vec![
        ColumnDef::email(),
        ColumnDef::parent("account_id", Text, "accountId", "The ID of the cloud account."),
        ColumnDef::parent("account_name", Text, "name", "The name of the cloud account."),
        ColumnDef::parent("cloud_type", Text, "cloudType", "The cloud type of the account."),
        ColumnDef::qual("cloud_region", Text, "The cloud region the breakdown is restricted to."),
        ColumnDef::qual("policy_compliance_standard_name", Text, "The compliance standard the breakdown is restricted to."),
        ColumnDef::qual("policy_compliance_requirement_name", Text, "The compliance requirement the breakdown is restricted to."),
        ColumnDef::qual("policy_compliance_section_id", Text, "The compliance section the breakdown is restricted to."),
    ];
    columns.extend(specific);
    columns
}

pub fn summary_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_compliance_breakdown_summary",
        "Compliance posture summary for each cloud account.",
        with_account_columns(vec![
            ColumnDef::field("critical_severity_failed_resources", Int, "criticalSeverityFailedResources", "The number of resources failing critical severity policies."),
            ColumnDef::field("failed_resources", Int, "failedResources", "The number of failed resources."),
            ColumnDef::field("high_severity_failed_resources", Int, "highSeverityFailedResources", "The number of resources failing high severity policies."),
            ColumnDef::field("informational_severity_failed_resources", Int, "informationalSeverityFailedResources", "The number of resources failing informational severity policies."),
            ColumnDef::field("low_severity_failed_resources", Int, "lowSeverityFailedResources", "The number of resources failing low severity policies."),
            ColumnDef::field("medium_severity_failed_resources", Int, "mediumSeverityFailedResources", "The number of resources failing medium severity policies."),
            ColumnDef::field("passed_resources", Int, "passedResources", "The number of passed resources."),
            ColumnDef::field("timestamp", Timestamp, "timestamp", "The time the summary was computed."),
            ColumnDef::field("total_resources", Int, "totalResources", "The total number of resources."),
        ]),
        Breakdown {
            envelope: Envelope::Member("summary"),
        },
    )
    .with_list_keys(key_columns())
}

pub fn statistic_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_compliance_breakdown_statistic",
        "Compliance statistics per standard for each cloud account.",
        with_account_columns(vec![
            ColumnDef::field("name", Text, "name", "The name of the compliance standard."),
            ColumnDef::field("id", Text, "id", "The unique identifier for the compliance standard."),
            ColumnDef::field("description", Text, "description", "The description of the compliance standard."),
            ColumnDef::field("default", Bool, "default", "Indicates if the standard is a default standard."),
            ColumnDef::field("assigned_policies", Int, "assignedPolicies", "The number of policies assigned."),
            ColumnDef::field("critical_severity_failed_resources", Int, "criticalSeverityFailedResources", "The number of resources failing critical severity policies."),
            ColumnDef::field("high_severity_failed_resources", Int, "highSeverityFailedResources", "The number of resources failing high severity policies."),
            ColumnDef::field("informational_severity_failed_resources", Int, "informationalSeverityFailedResources", "The number of resources failing informational severity policies."),
            ColumnDef::field("low_severity_failed_resources", Int, "lowSeverityFailedResources", "The number of resources failing low severity policies."),
            ColumnDef::field("medium_severity_failed_resources", Int, "mediumSeverityFailedResources", "The number of resources failing medium severity policies."),
            ColumnDef::field("failed_resources", Int, "failedResources", "The number of failed resources."),
            ColumnDef::field("passed_resources", Int, "passedResources", "The number of passed resources."),
            ColumnDef::field("total_resources", Int, "totalResources", "The total number of resources."),
            ColumnDef::field("title", Text, "name", "Title of the compliance standard."),
        ]),
        Breakdown {
            envelope: Envelope::Member("complianceDetails"),
        },
    )
    .with_list_keys(key_columns())
}

pub fn requirement_summary_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_compliance_breakdown_requirement_summary",
        "Compliance requirement summaries for each cloud account.",
        with_account_columns(vec![
            ColumnDef::field("id", Text, "id", "The unique identifier for the requirement."),
            ColumnDef::field("name", Text, "name", "The name of the requirement."),
            ColumnDef::field("section_summaries", Json, "sectionSummaries", "Summaries of the requirement's sections."),
            ColumnDef::field("title", Text, "name", "Title of the requirement."),
        ]),
        Breakdown {
            envelope: Envelope::Member("requirementSummaries"),
        },
    )
    .with_list_keys(key_columns())
}

struct Breakdown {
    envelope: Envelope,
}

fn account_matches(account: &Value, scan: &Scan<'_>) -> bool {
    let matches = |column: &str, field: &str| match scan.quals().equals_string(column) {
        Some(wanted) => account.get(field).and_then(Value::as_str) == Some(wanted.as_str()),
        None => true,
    };
    matches("account_name", "name") && matches("cloud_type", "cloudType")
}

#[async_trait]
impl TableFetch for Breakdown {
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats> {
        let accounts: Vec<Value> = list_accounts(scan)
            .await?
            .into_iter()
            .filter(|account| account_matches(account, scan))
            .collect();
        let params = COMPLIANCE_PARAMS.query_params(scan.quals());

        scan.paginator(LARGE_PAGE)
            .fan_out(
                &accounts,
                |account| {
                    let name = account.get("name").and_then(Value::as_str).unwrap_or_default();
                    let params = &params;
                    EndpointSource::new(scan.client(), self.envelope, move |_| {
                        ApiRequest::get(&["v2", "compliance", "posture"])
                            .param("cloud.account", name)
                            .params(params.clone())
                    })
                },
                scan.scope(),
                &scan.projector(),
                sink,
            )
            .await
    }
}

pub fn section_summary_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_compliance_breakdown_section_summary",
        "Compliance section summaries for every requirement of the posture.",
        vec![
            ColumnDef::email(),
            ColumnDef::qual("account_name", Text, "The cloud account the breakdown is restricted to."),
            ColumnDef::qual("cloud_type", Text, "The cloud type the breakdown is restricted to."),
            ColumnDef::qual("cloud_region", Text, "The cloud region the breakdown is restricted to."),
            ColumnDef::qual("policy_compliance_standard_name", Text, "The compliance standard the breakdown is restricted to."),
            ColumnDef::qual("policy_compliance_requirement_name", Text, "The compliance requirement the breakdown is restricted to."),
            ColumnDef::qual("policy_compliance_section_id", Text, "The compliance section the breakdown is restricted to."),
            ColumnDef::parent("requirement_id", Text, "id", "The unique identifier for the requirement."),
            ColumnDef::parent("requirement_name", Text, "name", "The name of the requirement."),
            ColumnDef::field("id", Text, "id", "The unique identifier for the section."),
            ColumnDef::field("name", Text, "name", "The name of the section."),
            ColumnDef::field("failed_resources", Int, "failedResources", "The number of failed resources in the section."),
            ColumnDef::field("passed_resources", Int, "passedResources", "The number of passed resources in the section."),
            ColumnDef::field("total_resources", Int, "totalResources", "The total number of resources in the section."),
            ColumnDef::field("title", Text, "name", "Title of the section summary."),
        ],
        Sections,
    )
    .with_list_keys(key_columns())
}

struct Sections;

#[async_trait]
impl TableFetch for Sections {
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats> {
        let posture = scan
            .call(
                &ApiRequest::get(&["v2", "compliance", "posture"])
                    .params(SECTION_PARAMS.query_params(scan.quals())),
            )
            .await?;
        let requirements = Envelope::Member("requirementSummaries")
            .split(posture)
            .map_err(|e| TableError::upstream(scan.ctx.operation("list"), e))?
            .items;

        scan.paginator(LARGE_PAGE)
            .fan_out(
                &requirements,
                |requirement| StaticSource::nested(requirement, "sectionSummaries"),
                scan.scope(),
                &scan.projector(),
                sink,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qual::{Qual, QualValue, Quals};

    #[test]
    fn test_breakdown_tables_share_account_keys() {
        for table in [summary_table(), statistic_table(), requirement_summary_table()] {
            let keys: Vec<&str> = table.list_keys.iter().map(|k| k.name).collect();
            assert_eq!(keys[0], "account_name", "{}", table.name);
            assert!(keys.contains(&"cloud_region"));
            assert_eq!(table.columns[2].name, "account_name");
        }
    }

    #[test]
    fn test_per_account_requests_send_compliance_params_only() {
        let eq = |column: &str, value: &str| Qual::eq(column, QualValue::Str(value.to_string()));
        let quals = Quals::new(vec![
            eq("cloud_type", "aws"),
            eq("cloud_region", "us-east-1"),
            eq("policy_compliance_standard_name", "CIS"),
        ]);
        let params: Vec<String> = COMPLIANCE_PARAMS
            .query_params(&quals)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(params, vec!["policy.complianceStandard".to_string()]);
    }

    #[test]
    fn test_section_summary_keys_match_params() {
        let table = section_summary_table();
        let keys: Vec<&str> = table.list_keys.iter().map(|k| k.name).collect();
        assert_eq!(keys, SECTION_PARAMS.columns().collect::<Vec<_>>());
        assert_eq!(table.column("requirement_id").map(|c| c.name), Some("requirement_id"));
    }
}
