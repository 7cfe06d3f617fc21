//! Sharing an item with another account.

use std::sync::LazyLock;

use regex::Regex;

use super::model::{Permission, PermissionRequest, ShareRole};
use super::{check_status, DriveClient};
use crate::errors::{DrivemanError, Result};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("EMAIL_RE"));

/// Check an address before anything goes over the wire. Returns it trimmed.
pub fn validate_email(email: &str) -> Result<&str> {
    let email = email.trim();
    if email.is_empty() {
        return Err(DrivemanError::Validation("Email address is required".into()));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(DrivemanError::Validation(
            "Please enter a valid email address".into(),
        ));
    }
    Ok(email)
}

/// Browser link for viewing an item.
pub fn share_link(id: &str) -> String {
    format!("https://drive.google.com/file/d/{id}/view")
}

impl DriveClient {
    /// Grant `role` on `id` to the account behind `email`.
    pub async fn share(&self, id: &str, email: &str, role: ShareRole) -> Result<Permission> {
        let email = validate_email(email)?;
        let token = self.bearer()?;
        let client = self.http.get_client().await;

        let body = PermissionRequest {
            grantee_type: "user".into(),
            role,
            email_address: email.to_string(),
        };

        let resp = client
            .post(format!("{}/permissions", self.file_url(id)))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;

        let permission: Permission = check_status(resp).await?.json().await?;
        tracing::info!(id, email, role = %role, "shared item");
        Ok(permission)
    }
}
