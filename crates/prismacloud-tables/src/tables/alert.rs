//! `prismacloud_alert`: alerts raised by policies, searched through `POST v2/alert`.

use async_trait::async_trait;
use chrono::Utc;
use prismacloud_client::ApiRequest;
use serde_json::{json, Value};

use crate::error::Result;
use crate::paginate::{EndpointSource, Envelope, PageRequest, PageStats, RowSink};
use crate::project::{ColumnDef, ColumnType::*};
use crate::qual::QualOp;
use crate::table::{KeyColumn, Scan, TableDescriptor, TableFetch};
use crate::translate::{selected_bool, ApiFilter, FilterList, ParamMapping, TimeWindow};

use super::LARGE_PAGE;

/// Months searched back from now when `alert_time` has no lower bound.
const DEFAULT_MONTHS_BACK: u32 = 6;

const TIME_OPERATORS: &[QualOp] = &[QualOp::Eq, QualOp::GtEq, QualOp::LtEq, QualOp::Gt, QualOp::Lt];
const REMEDIABLE_OPERATORS: &[QualOp] = &[QualOp::Eq, QualOp::NotEq];

const FILTERS: ParamMapping = ParamMapping::new(&[
    ("status", "alert.status"),
    ("policy_id", "policy.id"),
    ("policy_type", "policy.type"),
    ("policy_compliance_standard_name", "policy.complianceStandard"),
    ("policy_compliance_requirement_name", "policy.complianceRequirement"),
    ("policy_compliance_section_id", "policy.complianceSection"),
]);

pub fn table() -> TableDescriptor {
    let mut keys = vec![
        KeyColumn::optional("alert_time").with_operators(TIME_OPERATORS),
        KeyColumn::optional("policy_remediable").with_operators(REMEDIABLE_OPERATORS),
    ];
    keys.extend(FILTERS.columns().map(KeyColumn::optional));

    TableDescriptor::new(
        "prismacloud_alert",
        "List all information for Prisma Cloud alerts.",
        vec![
            ColumnDef::email(),
            ColumnDef::field("id", Text, "id", "The unique identifier for the alert."),
            ColumnDef::field("status", Text, "status", "The current status of the alert."),
            ColumnDef::field("first_seen", Timestamp, "firstSeen", "The timestamp when the alert was first seen."),
            ColumnDef::field("last_seen", Timestamp, "lastSeen", "The timestamp when the alert was last seen."),
            ColumnDef::field("alert_time", Timestamp, "alertTime", "The timestamp when the alert was triggered."),
            ColumnDef::qual("policy_compliance_standard_name", Text, "The name of the compliance standard associated with the policy."),
            ColumnDef::qual("policy_compliance_requirement_name", Text, "The name of the compliance requirement associated with the policy."),
            ColumnDef::qual("policy_compliance_section_id", Text, "The ID of the compliance section associated with the policy."),
            ColumnDef::field("event_occurred", Timestamp, "eventOccurred", "The timestamp when the event occurred."),
            ColumnDef::field("triggered_by", Text, "triggeredBy", "The entity that triggered the alert."),
            ColumnDef::field("alert_count", Int, "alertCount", "The count of how many times the alert was triggered."),
            ColumnDef::field("history", Json, "history", "The history of the alert."),
            ColumnDef::field("policy_id", Text, "policy.policyId", "The ID of the policy associated with the alert."),
            ColumnDef::field("policy_type", Text, "policy.policyType", "The type of the policy associated with the alert."),
            ColumnDef::field("policy_remediable", Bool, "policy.remediable", "If the policy associated with the alert is remediable."),
            ColumnDef::field("policy_system_default", Bool, "policy.systemDefault", "If the policy associated with the alert is system default."),
            ColumnDef::field("risk_detail", Json, "riskDetail", "The risk details associated with the alert."),
            ColumnDef::field("resource", Json, "resource", "The resource associated with the alert."),
            ColumnDef::field("investigate_options", Json, "investigateOptions", "Options for investigating the alert."),
            ColumnDef::field("title", Text, "id", "Title of the alert."),
        ],
        Alerts,
    )
    .with_list_keys(keys)
    .with_get_key("id")
}

fn search_filters(scan: &Scan<'_>) -> FilterList {
    let mut filters = FILTERS.filters(scan.quals());
    if let Some(remediable) = selected_bool(scan.quals(), "policy_remediable") {
        filters.push(ApiFilter::equals("policy.remediable", remediable.to_string()));
    }
    filters
}

fn search_request(page: &PageRequest, window: TimeWindow, filters: &FilterList) -> ApiRequest {
    let mut body = json!({
        "limit": page.page_size,
        "detailed": true,
        "offset": page.offset,
        "timeRange": {
            "type": "absolute",
            "value": {"startTime": window.start_ms, "endTime": window.end_ms},
        },
    });
    if let Some(token) = &page.token {
        body["pageToken"] = Value::String(token.clone());
    }
    if !filters.is_empty() {
        body["filters"] = filters
            .iter()
            .map(|f| json!({"name": f.name, "operator": f.operator, "value": f.value}))
            .collect();
    }
    ApiRequest::post(&["v2", "alert"]).json(body)
}

struct Alerts;

#[async_trait]
impl TableFetch for Alerts {
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats> {
        let window = TimeWindow::from_quals(scan.quals(), "alert_time", DEFAULT_MONTHS_BACK, Utc::now());
        let filters = search_filters(scan);
        let source = EndpointSource::new(
            scan.client(),
            Envelope::Keyed {
                items: "items",
                token: Some("nextPageToken"),
            },
            |page| search_request(page, window, &filters),
        );
        scan.paginator(LARGE_PAGE)
            .drive(&source, scan.scope(), &scan.projector(), sink)
            .await
    }

    async fn get(&self, scan: &Scan<'_>, key: &str) -> Result<Option<Value>> {
        scan.lookup(&ApiRequest::get(&["alert", key])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_body_shape() {
        let page = PageRequest {
            page_size: 50,
            offset: 100,
            token: Some("tok".to_string()),
        };
        let filters = vec![ApiFilter::equals("alert.status", "open")];
        let window = TimeWindow { start_ms: 1, end_ms: 2 };
        let request = search_request(&page, window, &filters);

        assert_eq!(request.label(), "POST /v2/alert");
        assert_eq!(
            request.body.unwrap(),
            json!({
                "limit": 50,
                "detailed": true,
                "offset": 100,
                "pageToken": "tok",
                "timeRange": {"type": "absolute", "value": {"startTime": 1, "endTime": 2}},
                "filters": [{"name": "alert.status", "operator": "=", "value": "open"}]
            })
        );
    }

    #[test]
    fn test_first_page_omits_token_and_empty_filters() {
        let request = search_request(
            &PageRequest {
                page_size: 10,
                offset: 0,
                token: None,
            },
            TimeWindow { start_ms: 1, end_ms: 2 },
            &Vec::new(),
        );
        let body = request.body.unwrap();
        assert!(body.get("pageToken").is_none());
        assert!(body.get("filters").is_none());
    }

    #[test]
    fn test_filter_values_kept_verbatim() {
        let filters = vec![
            ApiFilter::equals("policy.complianceStandard", "CIS v1.4.0 (AWS) \"quoted\""),
            ApiFilter::equals("policy.remediable", "true"),
        ];
        let request = search_request(
            &PageRequest {
                page_size: 1,
                ..Default::default()
            },
            TimeWindow { start_ms: 0, end_ms: i64::MAX },
            &filters,
        );
        let body = request.body.unwrap();
        assert_eq!(body["filters"][0]["value"], "CIS v1.4.0 (AWS) \"quoted\"");
        assert_eq!(body["filters"][1]["name"], "policy.remediable");
        assert_eq!(body["timeRange"]["value"]["endTime"], i64::MAX);
    }
}
