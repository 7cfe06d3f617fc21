//! Wire types for the Drive REST API and the userinfo endpoint.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::DrivemanError;

/// Mime type the API uses to mark folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Alias the API accepts for the user's top-level folder.
pub const ROOT_ID: &str = "root";

/// Display name of the root folder.
pub const ROOT_NAME: &str = "My Drive";

/// Metadata for a remote file or folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    /// Byte size. Absent for folders and native documents.
    #[serde(default, deserialize_with = "de_opt_u64", skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    #[serde(default)]
    pub starred: bool,
    #[serde(default)]
    pub shared: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_link: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Folder,
    File,
}

impl DriveItem {
    pub fn kind(&self) -> ItemKind {
        if self.mime_type == FOLDER_MIME_TYPE {
            ItemKind::Folder
        } else {
            ItemKind::File
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind() == ItemKind::Folder
    }

    /// First parent, which the breadcrumb walk follows.
    pub fn parent(&self) -> Option<&str> {
        self.parents.first().map(String::as_str)
    }
}

/// One page of a `files.list` response.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ItemList {
    #[serde(default)]
    pub files: Vec<DriveItem>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Cached account profile from the userinfo endpoint.
///
/// Only a few fields are read; the rest are carried along untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    /// Best human label: name, then email, then subject id.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .or(self.sub.as_deref())
            .unwrap_or("unknown user")
    }
}

/// Access level granted by a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShareRole {
    #[default]
    Reader,
    Writer,
    Commenter,
}

impl ShareRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareRole::Reader => "reader",
            ShareRole::Writer => "writer",
            ShareRole::Commenter => "commenter",
        }
    }
}

impl fmt::Display for ShareRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShareRole {
    type Err = DrivemanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reader" | "viewer" => Ok(ShareRole::Reader),
            "writer" | "editor" => Ok(ShareRole::Writer),
            "commenter" => Ok(ShareRole::Commenter),
            other => Err(DrivemanError::Validation(format!(
                "Unknown role '{other}' (expected reader, writer or commenter)"
            ))),
        }
    }
}

/// Request body for `POST /files/{id}/permissions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    #[serde(rename = "type")]
    pub grantee_type: String,
    pub role: ShareRole,
    pub email_address: String,
}

/// Permission resource returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "type")]
    pub grantee_type: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub email_address: Option<String>,
}

/// The API encodes int64 fields as strings; accept either form.
fn de_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrText {
        Num(u64),
        Text(String),
    }

    match Option::<NumOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumOrText::Num(n)) => Ok(Some(n)),
        Some(NumOrText::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(NumOrText::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid size: {s}"))),
    }
}
