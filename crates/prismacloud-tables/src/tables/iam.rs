//! Identity and access: effective permissions from an IAM RQL search, plus the
//! tenant's users, roles and permission groups.

use async_trait::async_trait;
use prismacloud_client::{ApiRequest, ClientError};
use serde_json::{json, Value};

use crate::error::Result;
use crate::paginate::{EndpointSource, Envelope, Page, PageRequest, PageSource, PageStats, RowSink};
use crate::project::{ColumnDef, ColumnType::*};
use crate::table::{KeyColumn, Scan, TableDescriptor, TableFetch};

use super::{PlainList, LARGE_PAGE};

const DEFAULT_QUERY: &str = "config from iam where dest.cloud.resource.name = '*'";

const GROUP_BY_FIELDS: &[&str] = &[
    "source",
    "sourceCloudAccount",
    "grantedByEntity",
    "entityCloudAccount",
    "grantedByPolicy",
    "policyCloudAccount",
    "grantedByLevel",
    "action",
    "destination",
    "destCloudAccount",
    "lastAccess",
];

pub fn permission_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_iam_permission",
        "List IAM permissions matching an RQL permission query.",
        vec![
            ColumnDef::email(),
            ColumnDef::field("id", Text, "id", "The unique identifier of the permission."),
            ColumnDef::field("source_public", Bool, "sourcePublic", "Whether the source is public."),
            ColumnDef::field("source_cloud_type", Text, "sourceCloudType", "The cloud type of the source."),
            ColumnDef::field("source_cloud_account", Text, "sourceCloudAccount", "The cloud account of the source."),
            ColumnDef::field("source_cloud_region", Text, "sourceCloudRegion", "The cloud region of the source."),
            ColumnDef::field("source_cloud_service_name", Text, "sourceCloudServiceName", "The cloud service of the source."),
            ColumnDef::field("source_resource_name", Text, "sourceResourceName", "The resource name of the source."),
            ColumnDef::field("source_resource_type", Text, "sourceResourceType", "The resource type of the source."),
            ColumnDef::field("source_resource_id", Text, "sourceResourceId", "The resource ID of the source."),
            ColumnDef::field("source_cloud_resource_uai", Text, "sourceCloudResourceUai", "The unified asset identifier of the source resource."),
            ColumnDef::field("source_idp_service", Text, "sourceIdpService", "The identity provider service of the source."),
            ColumnDef::field("source_idp_domain", Text, "sourceIdpDomain", "The identity provider domain of the source."),
            ColumnDef::field("source_idp_email", Text, "sourceIdpEmail", "The identity provider email of the source."),
            ColumnDef::field("source_idp_user_id", Text, "sourceIdpUserId", "The identity provider user ID of the source."),
            ColumnDef::field("source_idp_username", Text, "sourceIdpUsername", "The identity provider username of the source."),
            ColumnDef::field("source_idp_group", Text, "sourceIdpGroup", "The identity provider group of the source."),
            ColumnDef::field("source_idp_uai", Text, "sourceIdpUai", "The identity provider unified asset identifier of the source."),
            ColumnDef::field("dest_cloud_type", Text, "destCloudType", "The cloud type of the destination."),
            ColumnDef::field("dest_cloud_account", Text, "destCloudAccount", "The cloud account of the destination."),
            ColumnDef::field("dest_cloud_region", Text, "destCloudRegion", "The cloud region of the destination."),
            ColumnDef::field("dest_cloud_service_name", Text, "destCloudServiceName", "The cloud service of the destination."),
            ColumnDef::field("dest_resource_name", Text, "destResourceName", "The resource name of the destination."),
            ColumnDef::field("dest_resource_type", Text, "destResourceType", "The resource type of the destination."),
            ColumnDef::field("dest_resource_id", Text, "destResourceId", "The resource ID of the destination."),
            ColumnDef::field("dest_cloud_resource_uai", Text, "destCloudResourceUai", "The unified asset identifier of the destination resource."),
            ColumnDef::field("granted_by_cloud_type", Text, "grantedByCloudType", "The cloud type granting the permission."),
            ColumnDef::field("granted_by_cloud_policy_id", Text, "grantedByCloudPolicyId", "The ID of the granting policy."),
            ColumnDef::field("granted_by_cloud_policy_name", Text, "grantedByCloudPolicyName", "The name of the granting policy."),
            ColumnDef::field("granted_by_cloud_policy_type", Text, "grantedByCloudPolicyType", "The type of the granting policy."),
            ColumnDef::field("granted_by_cloud_policy_uai", Text, "grantedByCloudPolicyUai", "The unified asset identifier of the granting policy."),
            ColumnDef::field("granted_by_cloud_policy_account", Text, "grantedByCloudPolicyAccount", "The account of the granting policy."),
            ColumnDef::field("granted_by_cloud_entity_id", Text, "grantedByCloudEntityId", "The ID of the granting entity."),
            ColumnDef::field("granted_by_cloud_entity_name", Text, "grantedByCloudEntityName", "The name of the granting entity."),
            ColumnDef::field("granted_by_cloud_entity_type", Text, "grantedByCloudEntityType", "The type of the granting entity."),
            ColumnDef::field("granted_by_cloud_entity_account", Text, "grantedByCloudEntityAccount", "The account of the granting entity."),
            ColumnDef::field("granted_by_cloud_entity_uai", Text, "grantedByCloudEntityUai", "The unified asset identifier of the granting entity."),
            ColumnDef::field("granted_by_level_type", Text, "grantedByLevelType", "The level type at which the permission is granted."),
            ColumnDef::field("granted_by_level_id", Text, "grantedByLevelId", "The ID of the granting level."),
            ColumnDef::field("granted_by_level_name", Text, "grantedByLevelName", "The name of the granting level."),
            ColumnDef::field("granted_by_level_uai", Text, "grantedByLevelUai", "The unified asset identifier of the granting level."),
            ColumnDef::field("last_access_date", Text, "lastAccessDate", "The date the permission was last used."),
            ColumnDef::field("last_access_status", Text, "lastAccessStatus", "The last access status."),
            ColumnDef::field("accessed_resources_count", Int, "accessedResourcesCount", "The number of resources accessed."),
            ColumnDef::field("effective_action_name", Text, "effectiveActionName", "The effective action granted."),
            ColumnDef::field("exceptions", Json, "exceptions", "Exceptions applying to the permission."),
            ColumnDef::field("wild_card_dest_cloud_resource_name", Bool, "wildCardDestCloudResourceName", "Whether the destination resource name is a wildcard."),
            ColumnDef::envelope("permission_query", Text, "query", "The RQL query the permissions were searched with."),
            ColumnDef::envelope("response_id", Text, "id", "The ID of the search response."),
            ColumnDef::envelope("saved", Bool, "saved", "Whether the search is saved."),
            ColumnDef::envelope("name", Text, "name", "The name of the search."),
            ColumnDef::envelope("time_range", Json, "timeRange", "The time range of the search."),
            ColumnDef::envelope("search_type", Text, "searchType", "The type of the search."),
            ColumnDef::envelope("description", Text, "description", "The description of the search."),
            ColumnDef::envelope("cloud_type", Text, "cloudType", "The cloud type of the search."),
            ColumnDef::envelope("title", Text, "name", "Title of the search."),
        ],
        Permissions,
    )
    .with_list_keys(vec![KeyColumn::optional("permission_query")])
}

fn search_request(page: &PageRequest, query: &str) -> ApiRequest {
    let mut body = json!({
        "query": query,
        "groupByFields": GROUP_BY_FIELDS,
    });
    if let Some(token) = &page.token {
        body["nextPageToken"] = Value::String(token.clone());
    }
    ApiRequest::post(&["iam", "api", "v4", "search", "permission"])
        .param("limit", page.page_size.to_string())
        .json(body)
}

/// Records the query sent on every page whose response does not echo it.
struct PermissionSearch<S> {
    inner: S,
    query: String,
}

#[async_trait]
impl<S: PageSource> PageSource for PermissionSearch<S> {
    async fn fetch(&self, request: &PageRequest) -> std::result::Result<Page, ClientError> {
        let mut page = self.inner.fetch(request).await?;
        if let Some(Value::Object(envelope)) = page.envelope.as_mut() {
            let echoed = envelope.get("query").is_some_and(|q| !q.is_null());
            if !echoed {
                envelope.insert("query".to_string(), Value::String(self.query.clone()));
            }
        }
        Ok(page)
    }
}

struct Permissions;

#[async_trait]
impl TableFetch for Permissions {
    async fn list(&self, scan: &Scan<'_>, sink: &mut dyn RowSink) -> Result<PageStats> {
        let query = scan
            .quals()
            .equals_string("permission_query")
            .unwrap_or_else(|| DEFAULT_QUERY.to_string());
        let source = PermissionSearch {
            inner: EndpointSource::new(
                scan.client(),
                Envelope::Keyed {
                    items: "data.items",
                    token: Some("data.nextPageToken"),
                },
                |page| search_request(page, &query),
            ),
            query: query.clone(),
        };
        scan.paginator(LARGE_PAGE)
            .drive(&source, scan.scope(), &scan.projector(), sink)
            .await
    }
}

pub fn role_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_iam_role",
        "List all available roles for the users.",
        vec![
            ColumnDef::email(),
            ColumnDef::field("name", Text, "name", "The name of the role."),
            ColumnDef::field("id", Text, "id", "The unique identifier for the role."),
            ColumnDef::field("description", Text, "description", "The description of the role."),
            ColumnDef::field("role_type", Text, "roleType", "The type of the role."),
            ColumnDef::field("last_modified_by", Text, "lastModifiedBy", "The user who last modified the role."),
            ColumnDef::field("last_modified_ts", Timestamp, "lastModifiedTs", "The timestamp when the role was last modified."),
            ColumnDef::field("restrict_dismissal_access", Bool, "restrictDismissalAccess", "Whether the role restricts dismissal access."),
            ColumnDef::field("account_group_ids", Json, "accountGroupIds", "A list of account group IDs associated with the role."),
            ColumnDef::field("resource_list_ids", Json, "resourceListIds", "A list of resource list IDs associated with the role."),
            ColumnDef::field("code_repository_ids", Json, "codeRepositoryIds", "A list of code repository IDs associated with the role."),
            ColumnDef::field("associated_users", Json, "associatedUsers", "A list of user IDs associated with the role."),
            ColumnDef::field("account_groups", Json, "accountGroups", "A list of account groups associated with the role."),
            ColumnDef::field("additional_attributes", Json, "additionalAttributes", "Additional attributes associated with the role."),
            ColumnDef::field("title", Text, "name", "Title of the role."),
        ],
        PlainList::new(&["user", "role"]),
    )
}

/// Unlike other tables, `email` here is the listed user's own address.
pub fn user_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_iam_user",
        "List all available users and service accounts.",
        vec![
            ColumnDef::field("email", Text, "email", "Email address of the user."),
            ColumnDef::field("display_name", Text, "displayName", "Display name of the user."),
            ColumnDef::field("last_name", Text, "lastName", "Last name of the user."),
            ColumnDef::field("account_type", Text, "accountType", "Type of the account."),
            ColumnDef::field("username", Text, "username", "Username associated with the profile."),
            ColumnDef::field("first_name", Text, "firstName", "First name of the user."),
            ColumnDef::field("access_keys_allowed", Bool, "accessKeysAllowed", "Whether access keys are allowed for the user."),
            ColumnDef::field("access_key_expiration", Int, "accessKeyExpiration", "Expiration time of the access key."),
            ColumnDef::field("access_key_name", Text, "accessKeyName", "Name of the access key."),
            ColumnDef::field("default_role_id", Text, "defaultRoleId", "Default role ID assigned to the user."),
            ColumnDef::field("enable_key_expiration", Bool, "enableKeyExpiration", "Whether key expiration is enabled."),
            ColumnDef::field("time_zone", Text, "timeZone", "Time zone of the user."),
            ColumnDef::field("enabled", Bool, "enabled", "Whether the profile is enabled."),
            ColumnDef::field("last_login_ts", Int, "lastLoginTs", "Timestamp of the last login."),
            ColumnDef::field("last_modified_by", Text, "lastModifiedBy", "Identifier of the user who last modified the profile."),
            ColumnDef::field("last_modified_ts", Int, "lastModifiedTs", "Timestamp of the last modification."),
            ColumnDef::field("access_keys_count", Int, "accessKeysCount", "Count of access keys associated with the user."),
            ColumnDef::field("role_ids", Json, "roleIds", "List of role IDs assigned to the user."),
            ColumnDef::field("roles", Json, "roles", "Roles assigned to the user."),
            ColumnDef::field("title", Text, "displayName", "Title of the profile."),
        ],
        PlainList::new(&["v2", "user"]),
    )
}

pub fn permission_group_table() -> TableDescriptor {
    TableDescriptor::new(
        "prismacloud_permission_group",
        "List of available permission groups.",
        vec![
            ColumnDef::email(),
            ColumnDef::field("id", Text, "id", "The unique identifier for the permission group."),
            ColumnDef::field("name", Text, "name", "The name of the permission group."),
            ColumnDef::field("description", Text, "description", "The description of the permission group."),
            ColumnDef::field("type", Text, "type", "The type of the permission group."),
            ColumnDef::field("last_modified_by", Text, "lastModifiedBy", "The user who last modified the permission group."),
            ColumnDef::field("last_modified_ts", Timestamp, "lastModifiedTs", "The timestamp of the last modification."),
            ColumnDef::field("accept_account_groups", Bool, "acceptAccountGroups", "Indicates if the permission group accepts account groups."),
            ColumnDef::field("accept_resource_lists", Bool, "acceptResourceLists", "Indicates if the permission group accepts resource lists."),
            ColumnDef::field("accept_code_repositories", Bool, "acceptCodeRepositories", "Indicates if the permission group accepts code repositories."),
            ColumnDef::field("custom", Bool, "custom", "Indicates if the permission group is custom."),
            ColumnDef::field("deleted", Bool, "deleted", "Indicates if the permission group has been deleted."),
            ColumnDef::field("associated_roles", Json, "associatedRoles", "The roles associated with the permission group."),
            ColumnDef::field("features", Json, "features", "The features associated with the permission group."),
            ColumnDef::field("title", Text, "name", "Title of the permission group."),
        ],
        PlainList::with_lookup(&["authz", "v1", "permission_group"]),
    )
    .with_get_key("id")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page_has_no_token() {
        let request = search_request(
            &PageRequest {
                page_size: 25,
                ..Default::default()
            },
            DEFAULT_QUERY,
        );
        assert_eq!(request.query, vec![("limit".to_string(), "25".to_string())]);
        let body = request.body.unwrap();
        assert_eq!(body["query"], DEFAULT_QUERY);
        assert_eq!(body["groupByFields"].as_array().unwrap().len(), GROUP_BY_FIELDS.len());
        assert!(body.get("nextPageToken").is_none());
    }

    #[test]
    fn test_next_page_carries_token() {
        let request = search_request(
            &PageRequest {
                page_size: 25,
                offset: 25,
                token: Some("next".to_string()),
            },
            "config from iam where source.cloud.type = 'AWS'",
        );
        assert_eq!(request.body.unwrap()["nextPageToken"], "next");
    }

    struct Canned(Page);

    #[async_trait]
    impl PageSource for Canned {
        async fn fetch(&self, _request: &PageRequest) -> std::result::Result<Page, ClientError> {
            Ok(self.0.clone())
        }
    }

    async fn envelope_query(envelope: Value) -> Value {
        let source = PermissionSearch {
            inner: Canned(Page {
                envelope: Some(envelope),
                ..Default::default()
            }),
            query: DEFAULT_QUERY.to_string(),
        };
        let page = source.fetch(&PageRequest::default()).await.unwrap();
        page.envelope.unwrap()["query"].clone()
    }

    #[tokio::test]
    async fn test_sent_query_fills_missing_echo() {
        assert_eq!(envelope_query(json!({"id": "r1"})).await, DEFAULT_QUERY);
        assert_eq!(envelope_query(json!({"query": null})).await, DEFAULT_QUERY);
    }

    #[tokio::test]
    async fn test_response_query_wins() {
        let echoed = "config from iam where source.cloud.type = 'AWS'";
        assert_eq!(envelope_query(json!({"query": echoed})).await, echoed);
    }
}
