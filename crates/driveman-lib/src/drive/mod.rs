//! Storage gateway for the Drive REST API.
//!
//! One method per remote operation. Every call takes its bearer token from
//! [`SessionStore::valid_token`], so a token the store already knows to be
//! expired is never sent. Non-2xx responses become
//! [`DrivemanError::Api`]; transport failures stay [`DrivemanError::Http`].
//! Nothing retries.

pub mod breadcrumb;
pub mod download;
pub mod model;
pub mod query;
pub mod share;
pub mod upload;

use std::sync::Arc;

use serde_json::json;

use crate::config::dynamic::DynamicConfig;
use crate::errors::{DrivemanError, Result};
use crate::http_client::HttpClient;
use crate::session::SessionStore;

pub use breadcrumb::{build_breadcrumbs, Breadcrumbs, Crumb, ItemSource, MAX_DEPTH};
pub use model::{
    DriveItem, ItemKind, ItemList, ShareRole, UserProfile, FOLDER_MIME_TYPE, ROOT_ID, ROOT_NAME,
};
pub use query::ListQuery;
pub use upload::{
    upload_all, UploadEvent, UploadHandle, UploadProgress, UploadSource, UploadSummary, Uploader,
};

/// Fixed page size for listings. Only the first page is returned.
pub const PAGE_SIZE: u32 = 100;

const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,iconLink,thumbnailLink,webViewLink,modifiedTime,size,starred,shared,parents)";
const ITEM_FIELDS: &str = "id,name,mimeType,description,starred,shared,webViewLink,thumbnailLink,iconLink,size,modifiedTime,parents";

/// Base URLs the gateway talks to.
#[derive(Debug, Clone, PartialEq)]
pub struct DriveEndpoints {
    pub api_base: String,
    pub upload_base: String,
    pub userinfo_url: String,
}

impl DriveEndpoints {
    pub fn from_config(config: &DynamicConfig) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            upload_base: config.upload_base.trim_end_matches('/').to_string(),
            userinfo_url: config.userinfo_url.clone(),
        }
    }
}

impl Default for DriveEndpoints {
    fn default() -> Self {
        Self::from_config(&DynamicConfig::default())
    }
}

/// Drive API client. Cheap to clone.
#[derive(Clone)]
pub struct DriveClient {
    http: HttpClient,
    session: Arc<SessionStore>,
    endpoints: Arc<DriveEndpoints>,
    chunk_size: usize,
}

impl DriveClient {
    pub fn new(http: HttpClient, session: Arc<SessionStore>, config: &DynamicConfig) -> Self {
        Self::with_endpoints(
            http,
            session,
            DriveEndpoints::from_config(config),
            config.upload_chunk_size,
        )
    }

    pub fn with_endpoints(
        http: HttpClient,
        session: Arc<SessionStore>,
        endpoints: DriveEndpoints,
        chunk_size: usize,
    ) -> Self {
        Self {
            http,
            session,
            endpoints: Arc::new(endpoints),
            chunk_size: chunk_size.max(1024),
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn endpoints(&self) -> &DriveEndpoints {
        &self.endpoints
    }

    fn bearer(&self) -> Result<String> {
        self.session.valid_token()
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.endpoints.api_base)
    }

    fn file_url(&self, id: &str) -> String {
        format!("{}/files/{}", self.endpoints.api_base, id)
    }

    // -----------------------------------------------------------------------
    // Metadata operations
    // -----------------------------------------------------------------------

    /// Untrashed children of `folder_id` (root by default), folders first,
    /// then by name. `search` filters on name substring.
    pub async fn list_items(
        &self,
        folder_id: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<DriveItem>> {
        let query = ListQuery::new(folder_id, search);
        let token = self.bearer()?;
        let client = self.http.get_client().await;

        let q = query.to_query_string();
        let page_size = PAGE_SIZE.to_string();
        tracing::debug!(q = %q, "listing items");

        let resp = client
            .get(self.files_url())
            .bearer_auth(&token)
            .query(&[
                ("q", q.as_str()),
                ("fields", LIST_FIELDS),
                ("pageSize", page_size.as_str()),
                ("orderBy", "folder,name"),
            ])
            .send()
            .await?;

        let list: ItemList = check_status(resp).await?.json().await?;
        if list.next_page_token.is_some() {
            tracing::debug!(
                parent = %query.parent,
                shown = list.files.len(),
                "more items exist beyond the first page"
            );
        }
        Ok(list.files)
    }

    /// Full metadata for one item, including its parents.
    pub async fn get_item(&self, id: &str) -> Result<DriveItem> {
        let token = self.bearer()?;
        let client = self.http.get_client().await;

        let resp = client
            .get(self.file_url(id))
            .bearer_auth(&token)
            .query(&[("fields", ITEM_FIELDS)])
            .send()
            .await?;

        Ok(check_status(resp).await?.json().await?)
    }

    /// Create a folder under `parent` (root by default).
    pub async fn create_folder(&self, name: &str, parent: Option<&str>) -> Result<DriveItem> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DrivemanError::Validation(
                "Folder name cannot be empty".into(),
            ));
        }
        let parent = parent.filter(|p| !p.is_empty()).unwrap_or(model::ROOT_ID);

        let token = self.bearer()?;
        let client = self.http.get_client().await;

        let resp = client
            .post(self.files_url())
            .bearer_auth(&token)
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent],
            }))
            .send()
            .await?;

        let item: DriveItem = check_status(resp).await?.json().await?;
        tracing::info!(id = %item.id, name = %item.name, "created folder");
        Ok(item)
    }

    /// Change an item's name. Nothing else is touched.
    pub async fn rename(&self, id: &str, new_name: &str) -> Result<DriveItem> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(DrivemanError::Validation("Name cannot be empty".into()));
        }

        let token = self.bearer()?;
        let client = self.http.get_client().await;

        let resp = client
            .patch(self.file_url(id))
            .bearer_auth(&token)
            .json(&json!({ "name": new_name }))
            .send()
            .await?;

        let item: DriveItem = check_status(resp).await?.json().await?;
        tracing::info!(id, name = %new_name, "renamed item");
        Ok(item)
    }

    /// Move an item to the trash.
    pub async fn trash(&self, id: &str) -> Result<DriveItem> {
        let token = self.bearer()?;
        let client = self.http.get_client().await;

        let resp = client
            .patch(self.file_url(id))
            .bearer_auth(&token)
            .json(&json!({ "trashed": true }))
            .send()
            .await?;

        let item: DriveItem = check_status(resp).await?.json().await?;
        tracing::info!(id, "moved item to trash");
        Ok(item)
    }

    /// Permanently delete an item, bypassing the trash.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let token = self.bearer()?;
        let client = self.http.get_client().await;

        let resp = client
            .delete(self.file_url(id))
            .bearer_auth(&token)
            .send()
            .await?;

        check_status(resp).await?;
        tracing::info!(id, "permanently deleted item");
        Ok(())
    }

    /// Profile of the signed-in account.
    pub async fn get_profile(&self) -> Result<UserProfile> {
        let token = self.bearer()?;
        self.get_profile_with_token(&token).await
    }

    /// Profile lookup with an explicit token, used while completing a login.
    pub async fn get_profile_with_token(&self, token: &str) -> Result<UserProfile> {
        let client = self.http.get_client().await;
        let resp = client
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(token)
            .send()
            .await?;
        Ok(check_status(resp).await?.json().await?)
    }
}

/// Pass 2xx responses through; turn anything else into `DrivemanError::Api`.
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), body = %body, "request failed");
    Err(DrivemanError::Api {
        status: status.as_u16(),
        message: api_error_message(status, &body),
    })
}

/// Pull `error.message` out of a Google-style error body, falling back to the
/// raw text or the status reason.
fn api_error_message(status: reqwest::StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        v.pointer("/error/message")
            .or_else(|| v.pointer("/error_description"))
            .or_else(|| v.get("error").filter(|e| e.is_string()))
            .and_then(|m| m.as_str())
    });
    match message {
        Some(m) if !m.is_empty() => m.to_string(),
        _ if !body.trim().is_empty() && parsed.is_none() => body.trim().to_string(),
        _ => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    }
}
