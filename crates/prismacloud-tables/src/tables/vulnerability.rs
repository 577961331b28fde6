//! Vulnerability dashboard tables. The overview and prioritized endpoints
//! answer with a single object that becomes one row; the asset and burndown
//! endpoints return their rows under `value`.

use async_trait::async_trait;
use prismacloud_client::ApiRequest;

use crate::error::Result;
use crate::paginate::{EndpointSource, Envelope, PageStats, RowSink};
use crate::project::{ColumnDef, ColumnType::*};
use crate::table::{KeyColumn, Scan, TableDescriptor, TableFetch};
use crate::translate::ParamMapping;

use super::LARGE_PAGE;

pub fn overview_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_vulnerability_overview",
        "Overview of vulnerabilities across runtime assets.",
        vec![
            ColumnDef::email(),
            ColumnDef::field("total_vulnerable_runtime_assets", Json, "overviewSummary.totalVulnerableRuntimeAssets", "Vulnerable runtime assets."),
            ColumnDef::field("total_vulnerabilities_in_runtime", Json, "overviewSummary.totalVulnerabilitiesinRuntime", "Vulnerabilities found in runtime."),
            ColumnDef::field("total_remediated_in_runtime", Json, "overviewSummary.totalRemediatedinRuntime", "Vulnerabilities remediated in runtime."),
            ColumnDef::field("values", Json, "values", "Per-category vulnerability values."),
        ],
        Overview,
    )
}

struct Overview;

#[async_trait]
impl TableFetch for Overview {
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats> {
        let source = EndpointSource::new(scan.client(), Envelope::Single, |_| {
            ApiRequest::get(&["uve", "api", "v2", "dashboard", "vulnerabilities", "overview"])
        });
        scan.paginator(1)
            .drive(&source, scan.scope(), &scan.projector(), sink)
            .await
    }
}

const PRIORITIZED_PARAMS: ParamMapping =
    ParamMapping::new(&[("asset_type", "asset_type"), ("life_cycle", "life_cycle")]);

pub fn prioritized_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_prioritized_vulnerability",
        "Prioritized vulnerabilities for an asset type and life cycle stage.",
        vec![
            ColumnDef::email(),
            ColumnDef::qual("asset_type", Text, "The asset type: iac, package, deployedImage, serverlessFunction, host, registryImage, vmImage."),
            ColumnDef::qual("life_cycle", Text, "The life cycle stage: code, build, deploy, run."),
            ColumnDef::field("last_updated_date_time", Timestamp, "lastUpdatedDateTime", "The time the figures were last updated."),
            ColumnDef::field("total_vulnerabilities", Int, "totalVulnerabilities", "The total number of vulnerabilities."),
            ColumnDef::field("urgent", Json, "urgent", "Urgent vulnerabilities."),
            ColumnDef::field("patchable", Json, "patchable", "Patchable vulnerabilities."),
            ColumnDef::field("exploitable", Json, "exploitable", "Exploitable vulnerabilities."),
            ColumnDef::field("internet_exposed", Json, "internetExposed", "Internet exposed vulnerabilities."),
            ColumnDef::field("package_in_use", Json, "packageInUse", "Vulnerabilities in packages in use."),
        ],
        Prioritized,
    )
    .with_list_keys(PRIORITIZED_PARAMS.columns().map(KeyColumn::required).collect())
}

struct Prioritized;

#[async_trait]
impl TableFetch for Prioritized {
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats> {
        let params = PRIORITIZED_PARAMS.query_params(scan.quals());
        let source = EndpointSource::new(scan.client(), Envelope::Single, |_| {
            ApiRequest::get(&["uve", "api", "v4", "dashboard", "vulnerabilities", "prioritised"])
                .params(params.clone())
        });
        scan.paginator(1)
            .drive(&source, scan.scope(), &scan.projector(), sink)
            .await
    }
}

const STAGE_PARAMS: ParamMapping = ParamMapping::new(&[
    ("asset_type", "asset_type"),
    ("life_cycle", "life_cycle"),
    ("severities", "severities"),
]);

pub fn asset_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_vulnerability_asset",
        "Vulnerable asset summary per asset type and life cycle stage.",
        vec![
            ColumnDef::email(),
            ColumnDef::field("asset_type", Text, "assetType", "The asset type: iac, package, deployedImage, serverlessFunction, host, registryImage, vmImage."),
            ColumnDef::field("life_cycle", Text, "stage", "The life cycle stage: code, build, deploy, run."),
            ColumnDef::qual("severities", Text, "The severities counted: low, medium, high, critical."),
            ColumnDef::field("total_vulnerabilities", Int, "totalVulnerabilities", "The total number of vulnerabilities."),
            ColumnDef::field("total_assets", Int, "totalAssets", "The total number of assets."),
            ColumnDef::field("stats", Json, "stats", "Statistics of the vulnerable assets."),
        ],
        Stage {
            path: &["uve", "api", "v1", "dashboard", "vulnerabilities", "assets"],
        },
    )
    .with_list_keys(STAGE_PARAMS.columns().map(KeyColumn::optional).collect())
}

pub fn burndown_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_vulnerability_burndown",
        "Daily vulnerability burndown for an asset type, life cycle stage and severity set.",
        vec![
            ColumnDef::email(),
            ColumnDef::qual("asset_type", Text, "The asset type: iac, package, deployedImage, serverlessFunction, host, registryImage, vmImage."),
            ColumnDef::qual("life_cycle", Text, "The life cycle stage: code, build, deploy, run."),
            ColumnDef::qual("severities", Text, "The severities counted: low, medium, high, critical."),
            ColumnDef::field("day_num", Int, "dayNum", "Count down of the day backwards from present day."),
            ColumnDef::field("total_count", Int, "totalCount", "Number of vulnerabilities in the given day."),
            ColumnDef::field("remediated_count", Int, "remediatedCount", "Number of vulnerabilities remediated for the given day."),
            ColumnDef::field("epoch_timestamp", Timestamp, "epochTimestamp", "Time up to which the entry was recorded."),
        ],
        Stage {
            path: &["uve", "api", "v1", "dashboard", "vulnerabilities", "burndown"],
        },
    )
    .with_list_keys(STAGE_PARAMS.columns().map(KeyColumn::required).collect())
}

/// Dashboard endpoints keyed by asset type, stage and severities.
struct Stage {
    path: &'static [&'static str],
}

#[async_trait]
impl TableFetch for Stage {
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats> {
        let params = STAGE_PARAMS.query_params(scan.quals());
        let source = EndpointSource::new(scan.client(), Envelope::Member("value"), |_| {
            ApiRequest::get(self.path).params(params.clone())
        });
        scan.paginator(LARGE_PAGE)
            .drive(&source, scan.scope(), &scan.projector(), sink)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Requirement;

    #[test]
    fn test_burndown_requires_every_stage_key() {
        let table = burndown_table();
        assert_eq!(table.list_keys.len(), 3);
        assert!(table.list_keys.iter().all(|k| k.require == Requirement::Required));
    }

    #[test]
    fn test_asset_stage_keys_optional() {
        let table = asset_table();
        assert!(table.list_keys.iter().all(|k| k.require == Requirement::Optional));
        assert_eq!(table.column("life_cycle").map(|c| c.name), Some("life_cycle"));
    }
}
