use serde::{Deserialize, Serialize};

/// User-editable settings persisted as camelCase JSON in `config.json`.
///
/// Timeouts are in seconds. A `timeout` of 0 leaves the request timeout at
/// the transport default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DynamicConfig {
    pub timeout: u32,
    #[serde(rename = "connectTimeout")]
    pub connect_timeout: u32,
    #[serde(rename = "idleConnTimeout")]
    pub idle_conn_timeout: u32,
    #[serde(rename = "maxIdleConnsPerHost")]
    pub max_idle_conns_per_host: u32,
    #[serde(rename = "uploadChunkSize")]
    pub upload_chunk_size: usize,
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
    #[serde(rename = "redirectUri")]
    pub redirect_uri: String,
    #[serde(rename = "authUrl")]
    pub auth_url: String,
    #[serde(rename = "tokenUrl")]
    pub token_url: String,
    #[serde(rename = "apiBase")]
    pub api_base: String,
    #[serde(rename = "uploadBase")]
    pub upload_base: String,
    #[serde(rename = "userinfoUrl")]
    pub userinfo_url: String,
}

impl Default for DynamicConfig {
    fn default() -> Self {
        Self {
            timeout: 0,
            connect_timeout: 10,
            idle_conn_timeout: 90,
            max_idle_conns_per_host: 8,
            upload_chunk_size: 256 * 1024,
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost".into(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".into(),
            token_url: "https://oauth2.googleapis.com/token".into(),
            api_base: "https://www.googleapis.com/drive/v3".into(),
            upload_base: "https://www.googleapis.com/upload/drive/v3".into(),
            userinfo_url: "https://www.googleapis.com/oauth2/v3/userinfo".into(),
        }
    }
}

impl DynamicConfig {
    /// Overlay OAuth client credentials from `DRIVEMAN_CLIENT_ID` and
    /// `DRIVEMAN_CLIENT_SECRET` when set. Environment values are not persisted.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(id) = std::env::var("DRIVEMAN_CLIENT_ID") {
            if !id.is_empty() {
                self.client_id = id;
            }
        }
        if let Ok(secret) = std::env::var("DRIVEMAN_CLIENT_SECRET") {
            if !secret.is_empty() {
                self.client_secret = secret;
            }
        }
        self
    }
}
