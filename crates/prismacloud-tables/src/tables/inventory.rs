//! Asset inventory tables: discovered API endpoints, the asset explorer, the
//! grouped asset view and the workload summary, hosts and container images.

use async_trait::async_trait;
use prismacloud_client::ApiRequest;
use serde_json::{json, Value};

use crate::error::{Result, TableError};
use crate::paginate::{EndpointSource, Envelope, PageRequest, PageStats, RowSink};
use crate::project::{ColumnDef, ColumnSource, ColumnType, ColumnType::*};
use crate::table::{KeyColumn, Scan, TableDescriptor, TableFetch};
use crate::translate::ParamMapping;

use super::LARGE_PAGE;

const API_ENDPOINT_PAGE: usize = 100;
const WORKLOAD_PAGE: usize = 30;

// ---------------------------------------------------------------------------
// Discovered API endpoints
// ---------------------------------------------------------------------------

pub fn api_endpoint_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_inventory_api_endpoint",
        "List API endpoints discovered by WAAS API discovery.",
        vec![
            ColumnDef::email(),
            ColumnDef::field("asset_id", Text, "assetId", "The asset identifier of the endpoint."),
            ColumnDef::field("api_path", Text, "apiPath", "The path of the API endpoint."),
            ColumnDef::field("http_method", Text, "httpMethod", "The HTTP method of the endpoint."),
            ColumnDef::field("api_server", Text, "apiServer", "The server hosting the endpoint."),
            ColumnDef::field("hits", Int, "hits", "The number of observed hits."),
            ColumnDef::field("workloads", Json, "workloads", "The workloads serving the endpoint."),
            ColumnDef::field("service_name", Text, "serviceName", "The name of the service."),
            ColumnDef::field("cloud_type", Text, "cloudType", "The cloud type hosting the endpoint."),
            ColumnDef::field("region", Text, "region", "The cloud region hosting the endpoint."),
            ColumnDef::field("account_id", Text, "accountId", "The cloud account ID."),
            ColumnDef::field("account_name", Text, "accountName", "The cloud account name."),
            ColumnDef::field("discovery_method", Text, "discoveryMethod", "How the endpoint was discovered."),
            ColumnDef::field("inspection_type", Text, "inspectionType", "The inspection type."),
            ColumnDef::field("last_changed", Timestamp, "lastChanged", "The time the endpoint last changed."),
            ColumnDef::field("last_observed", Timestamp, "lastObserved", "The time the endpoint was last observed."),
            ColumnDef::envelope("total", Int, "_total", "The total number of discovered endpoints."),
            ColumnDef::envelope("count", Int, "_count", "The number of endpoints in the response page."),
            ColumnDef::field("path_risk_factors", Json, "pathRiskFactors", "Risk factors of the endpoint path."),
            ColumnDef::field("title", Text, "apiPath", "Title of the endpoint."),
        ],
        ApiEndpoints,
    )
}

fn api_endpoint_request(page: &PageRequest) -> ApiRequest {
    let mut body = json!({
        "limit": page.page_size.to_string(),
        "orderBy": "assetId",
        "orderDirection": "desc",
    });
    if let Some(token) = &page.token {
        body["nextPageToken"] = Value::String(token.clone());
    }
    ApiRequest::post(&["waas-api-discovery", "api", "v1", "discovered-api"]).json(body)
}

struct ApiEndpoints;

#[async_trait]
impl TableFetch for ApiEndpoints {
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats> {
        let source = EndpointSource::new(
            scan.client(),
            Envelope::Keyed {
                items: "members",
                token: Some("nextPageToken"),
            },
            api_endpoint_request,
        );
        scan.paginator(API_ENDPOINT_PAGE)
            .drive(&source, scan.scope(), &scan.projector(), sink)
            .await
    }
}

// ---------------------------------------------------------------------------
// Asset explorer
// ---------------------------------------------------------------------------

const EXPLORER_PARAMS: ParamMapping = ParamMapping::new(&[
    ("account_name", "cloud.account"),
    ("cloud_type", "cloud.type"),
    ("region_name", "cloud.region"),
    ("compliance_requirement_name", "policy.complianceRequirement"),
    ("compliance_standard_name", "policy.complianceStandard"),
    ("scan_status", "scan.status"),
]);

pub fn asset_explorer_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_inventory_asset_explorer",
        "List scanned assets with their alert and vulnerability status.",
        vec![
            ColumnDef::email(),
            ColumnDef::field("id", Text, "id", "The unique identifier of the asset."),
            ColumnDef::field("name", Text, "name", "The name of the asset."),
            ColumnDef::field("account_id", Text, "accountId", "The cloud account ID."),
            ColumnDef::field("account_name", Text, "accountName", "The cloud account name."),
            ColumnDef::qual("compliance_requirement_name", Text, "The compliance requirement the assets are scanned against."),
            ColumnDef::qual("compliance_standard_name", Text, "The compliance standard the assets are scanned against."),
            ColumnDef::qual("scan_status", Text, "The scan status the assets are filtered on."),
            ColumnDef::field("alert_status_critical", Int, "alertStatus.critical", "Number of critical alerts."),
            ColumnDef::field("alert_status_high", Int, "alertStatus.high", "Number of high alerts."),
            ColumnDef::field("alert_status_informational", Int, "alertStatus.informational", "Number of informational alerts."),
            ColumnDef::field("alert_status_low", Int, "alertStatus.low", "Number of low alerts."),
            ColumnDef::field("alert_status_medium", Int, "alertStatus.medium", "Number of medium alerts."),
            ColumnDef::field("asset_type", Text, "assetType", "The type of the asset."),
            ColumnDef::field("cloud_type", Text, "cloudType", "The cloud type of the asset."),
            ColumnDef::field("overall_passed", Bool, "overallPassed", "Whether the asset passed every scanned policy."),
            ColumnDef::field("region_id", Text, "regionId", "The cloud region ID."),
            ColumnDef::field("region_name", Text, "regionName", "The cloud region name."),
            ColumnDef::field("resource_config_json_available", Bool, "resourceConfigJsonAvailable", "Whether the resource configuration JSON is available."),
            ColumnDef::field("resource_details_available", Bool, "resourceDetailsAvailable", "Whether resource details are available."),
            ColumnDef::field("rrn", Text, "rrn", "The restricted resource name."),
            ColumnDef::field("unified_asset_id", Text, "unifiedAssetId", "The unified asset identifier."),
            ColumnDef::field("vulnerability_status_critical", Int, "vulnerabilityStatus.critical", "Number of critical vulnerabilities."),
            ColumnDef::field("vulnerability_status_high", Int, "vulnerabilityStatus.high", "Number of high vulnerabilities."),
            ColumnDef::field("vulnerability_status_low", Int, "vulnerabilityStatus.low", "Number of low vulnerabilities."),
            ColumnDef::field("vulnerability_status_medium", Int, "vulnerabilityStatus.medium", "Number of medium vulnerabilities."),
            ColumnDef::envelope("timestamp", Timestamp, "timestamp", "The time of the scan snapshot."),
            ColumnDef::field("app_names", Json, "appNames", "Application names attached to the asset."),
            ColumnDef::field("scanned_policies", Json, "scannedPolicies", "Policies the asset was scanned against."),
            ColumnDef::field("title", Text, "name", "Title of the asset."),
        ],
        AssetExplorer,
    )
    .with_list_keys(EXPLORER_PARAMS.columns().map(KeyColumn::optional).collect())
}

struct AssetExplorer;

#[async_trait]
impl TableFetch for AssetExplorer {
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats> {
        let params = EXPLORER_PARAMS.query_params(scan.quals());
        let source = EndpointSource::new(
            scan.client(),
            Envelope::Keyed {
                items: "resources",
                token: Some("nextPageToken"),
            },
            |page| {
                let request = ApiRequest::get(&["v2", "resource", "scan_info"])
                    .params(params.clone())
                    .param("limit", page.page_size.to_string());
                match &page.token {
                    Some(token) => request.param("pageToken", token.as_str()),
                    None => request,
                }
            },
        );
        scan.paginator(LARGE_PAGE)
            .drive(&source, scan.scope(), &scan.projector(), sink)
            .await
    }
}

// ---------------------------------------------------------------------------
// Grouped asset view
// ---------------------------------------------------------------------------

/// Dimension the asset view aggregates on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GroupBy {
    #[default]
    CloudService,
    CloudAccount,
    CloudRegion,
    CloudType,
    ResourceType,
}

impl GroupBy {
    const ALL: [GroupBy; 5] = [
        GroupBy::CloudService,
        GroupBy::CloudAccount,
        GroupBy::CloudRegion,
        GroupBy::CloudType,
        GroupBy::ResourceType,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            GroupBy::CloudService => "cloud.service",
            GroupBy::CloudAccount => "cloud.account",
            GroupBy::CloudRegion => "cloud.region",
            GroupBy::CloudType => "cloud.type",
            GroupBy::ResourceType => "resource.type",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.as_str() == value)
    }
}

const VIEW_PARAMS: ParamMapping = ParamMapping::new(&[
    ("account_name", "cloud.account"),
    ("service_name", "cloud.service"),
    ("cloud_type_name", "cloud.type"),
    ("region_name", "cloud.region"),
    ("resource_type_name", "resource.type"),
    ("compliance_standard_name", "policy.complianceStandard"),
    ("compliance_requirement_name", "policy.complianceRequirement"),
    ("scan_status", "scan.status"),
]);

const fn grouping(
    name: &'static str,
    group: GroupBy,
    field: &'static str,
    description: &'static str,
) -> ColumnDef {
    let source = ColumnSource::Grouping {
        group: group.as_str(),
        field,
    };
    ColumnDef::new(name, ColumnType::Text, source, description)
}

pub fn asset_view_table() -> TableDescriptor {
    let mut keys = vec![KeyColumn::optional("group_by")];
    keys.extend(VIEW_PARAMS.columns().map(KeyColumn::optional));

    TableDescriptor::new(
        "prismacloud_inventory_asset_view",
        "Asset inventory aggregated by service, account, region, cloud type or resource type.",
        vec![
            ColumnDef::email(),
            ColumnDef::qual("group_by", Text, "The grouping dimension: cloud.service (default), cloud.account, cloud.region, cloud.type or resource.type."),
            grouping("service_name", GroupBy::CloudService, "serviceName", "The cloud service name."),
            grouping("account_name", GroupBy::CloudAccount, "accountName", "The cloud account name."),
            grouping("region_name", GroupBy::CloudRegion, "regionName", "The cloud region name."),
            grouping("cloud_type_name", GroupBy::CloudType, "cloudTypeName", "The cloud type name."),
            grouping("resource_type_name", GroupBy::ResourceType, "resourceTypeName", "The resource type name."),
            ColumnDef::field("account_id", Text, "accountId", "The cloud account ID."),
            ColumnDef::field("allow_drill_down", Bool, "allowDrillDown", "Whether the aggregate can be drilled into."),
            ColumnDef::qual("compliance_standard_name", Text, "The compliance standard the aggregate is restricted to."),
            ColumnDef::qual("compliance_requirement_name", Text, "The compliance requirement the aggregate is restricted to."),
            ColumnDef::qual("scan_status", Text, "The scan status the aggregate is restricted to."),
            ColumnDef::field("critical_severity_failed_resources", Int, "criticalSeverityFailedResources", "Resources failing critical severity policies."),
            ColumnDef::field("high_severity_failed_resources", Int, "highSeverityFailedResources", "Resources failing high severity policies."),
            ColumnDef::field("informational_severity_failed_resources", Int, "informationalSeverityFailedResources", "Resources failing informational severity policies."),
            ColumnDef::field("low_severity_failed_resources", Int, "lowSeverityFailedResources", "Resources failing low severity policies."),
            ColumnDef::field("medium_severity_failed_resources", Int, "mediumSeverityFailedResources", "Resources failing medium severity policies."),
            ColumnDef::field("critical_vulnerability_failed_resources", Int, "criticalVulnerabilityFailedResources", "Resources with critical vulnerabilities."),
            ColumnDef::field("high_vulnerability_failed_resources", Int, "highVulnerabilityFailedResources", "Resources with high vulnerabilities."),
            ColumnDef::field("low_vulnerability_failed_resources", Int, "lowVulnerabilityFailedResources", "Resources with low vulnerabilities."),
            ColumnDef::field("medium_vulnerability_failed_resources", Int, "mediumVulnerabilityFailedResources", "Resources with medium vulnerabilities."),
            ColumnDef::field("total_vulnerability_failed_resources", Int, "totalVulnerabilityFailedResources", "Resources with any vulnerability."),
            ColumnDef::field("failed_resources", Int, "failedResources", "The number of failed resources."),
            ColumnDef::field("passed_resources", Int, "passedResources", "The number of passed resources."),
            ColumnDef::field("total_resources", Int, "totalResources", "The total number of resources."),
            ColumnDef::field("unscanned_resources", Int, "unscannedResources", "The number of unscanned resources."),
        ],
        AssetView,
    )
    .with_list_keys(keys)
}

struct AssetView;

#[async_trait]
impl TableFetch for AssetView {
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats> {
        let group_by = match scan.quals().equals_string("group_by") {
            None => GroupBy::default(),
            Some(value) => GroupBy::parse(&value).ok_or_else(|| {
                TableError::configuration(
                    scan.ctx.operation("list"),
                    format!("unsupported group_by '{}'", value),
                )
            })?,
        };
        let params = VIEW_PARAMS.query_params(scan.quals());
        let source = EndpointSource::new(scan.client(), Envelope::Member("groupedAggregates"), |_| {
            ApiRequest::get(&["v3", "inventory"])
                .param("groupBy", group_by.as_str())
                .params(params.clone())
        });
        scan.paginator(LARGE_PAGE)
            .drive(
                &source,
                scan.scope().with_grouping(group_by.as_str()),
                &scan.projector(),
                sink,
            )
            .await
    }
}

// ---------------------------------------------------------------------------
// Workload hosts
// ---------------------------------------------------------------------------

pub fn workload_host_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_inventory_workload_host",
        "List workload hosts ordered by vulnerabilities.",
        vec![
            ColumnDef::email(),
            ColumnDef::field("name", Text, "name", "The name of the host."),
            ColumnDef::field("id", Text, "id", "The unique identifier of the host."),
            ColumnDef::field("uai_id", Text, "uaiId", "The unified asset identifier of the host."),
            ColumnDef::field("vuln_funnel", Json, "vulnFunnel", "The vulnerability funnel of the host."),
            ColumnDef::field("title", Text, "name", "Title of the host."),
        ],
        Workloads {
            resource: "hosts",
            stage: None,
        },
    )
}

pub fn workload_container_image_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_inventory_workload_container_image",
        "List workload container images across all stages, ordered by vulnerabilities.",
        vec![
            ColumnDef::email(),
            ColumnDef::field("name", Text, "name", "The name of the container image."),
            ColumnDef::field("uai_id", Text, "uaiId", "The unified asset identifier of the image."),
            ColumnDef::field("running_containers", Int, "runningContainers", "The number of running containers using the image."),
            ColumnDef::field("scan_passed", Bool, "scanPassed", "Whether the image passed its scan."),
            ColumnDef::field("base", Bool, "base", "Whether the image is a base image."),
            ColumnDef::field("related_images", Int, "relatedImages", "The number of related images."),
            ColumnDef::field("stages", Json, "stages", "The life cycle stages the image was seen in."),
            ColumnDef::field("vuln_funnel", Json, "vulnFunnel", "The vulnerability funnel of the image."),
            ColumnDef::field("title", Text, "name", "Title of the container image."),
        ],
        Workloads {
            resource: "images/collated",
            stage: Some("all"),
        },
    )
}

/// `resource` is the path under `api/v1/bff`.
fn workload_request(resource: &str, stage: Option<&str>, page: &PageRequest) -> ApiRequest {
    let mut body = json!({
        "sort": "vulnerabilities",
        "limit": page.page_size,
    });
    if let Some(stage) = stage {
        body["stage"] = Value::String(stage.to_string());
    }
    if let Some(token) = &page.token {
        body["nextPageToken"] = Value::String(token.clone());
    }
    let mut path = vec!["api", "v1", "bff"];
    path.extend(resource.split('/'));
    ApiRequest::post(&path).json(body)
}

struct Workloads {
    resource: &'static str,
    stage: Option<&'static str>,
}

#[async_trait]
impl TableFetch for Workloads {
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats> {
        let source = EndpointSource::new(
            scan.client(),
            Envelope::Keyed {
                items: "value",
                token: Some("nextPageToken"),
            },
            |page| workload_request(self.resource, self.stage, page),
        );
        scan.paginator(WORKLOAD_PAGE)
            .drive(&source, scan.scope(), &scan.projector(), sink)
            .await
    }
}

pub fn workload_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_inventory_workload",
        "Summary of workload container images and hosts.",
        vec![
            ColumnDef::email(),
            ColumnDef::field("container_images_build", Int, "containerImages.stages.build", "Number of container images in the build stage."),
            ColumnDef::field("container_images_deploy", Int, "containerImages.stages.deploy", "Number of container images in the deploy stage."),
            ColumnDef::field("container_images_run", Int, "containerImages.stages.run", "Number of container images in the run stage."),
            ColumnDef::field("container_images_vulnerable", Int, "containerImages.vulnerable", "Number of vulnerable container images."),
            ColumnDef::field("container_images_cloud_providers", Json, "containerImages.cloudProviders", "Cloud providers for container images."),
            ColumnDef::field("hosts_total", Int, "hosts.total", "Total number of hosts."),
            ColumnDef::field("hosts_vulnerable", Int, "hosts.vulnerable", "Number of vulnerable hosts."),
            ColumnDef::field("hosts_cloud_providers", Json, "hosts.cloudProviders", "Cloud providers for hosts."),
        ],
        WorkloadSummary,
    )
}

struct WorkloadSummary;

#[async_trait]
impl TableFetch for WorkloadSummary {
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats> {
        let source = EndpointSource::new(scan.client(), Envelope::Single, |_| {
            ApiRequest::get(&["api", "v1", "bff", "assets", "summary"])
        });
        scan.paginator(1)
            .drive(&source, scan.scope(), &scan.projector(), sink)
            .await
    }
}
