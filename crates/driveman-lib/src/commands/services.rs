//! Shared services handed to every command handler.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::config::dynamic::DynamicConfig;
use crate::config::manager::DynamicConfigManager;
use crate::drive::DriveClient;
use crate::errors::{DrivemanError, Result};
use crate::http_client::HttpClient;
use crate::session::SessionStore;

/// Central holder for the config, HTTP client, session and drive client.
///
/// The session database is opened on first use so `version` and `config`
/// never touch it. The drive client is built once per invocation from the
/// config in effect at that time.
pub struct ServiceRegistry {
    pub config_manager: Arc<DynamicConfigManager>,
    pub http_client: HttpClient,
    shutdown: CancellationToken,
    session_db: PathBuf,
    session: OnceCell<Arc<SessionStore>>,
    drive: OnceCell<DriveClient>,
}

impl ServiceRegistry {
    pub fn new(
        config_manager: Arc<DynamicConfigManager>,
        http_client: HttpClient,
        session_db: PathBuf,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config_manager,
            http_client,
            shutdown,
            session_db,
            session: OnceCell::new(),
            drive: OnceCell::new(),
        }
    }

    /// Use an already-open session store instead of the database file.
    pub fn with_session(self, session: Arc<SessionStore>) -> Self {
        Self {
            session: OnceCell::new_with(Some(session)),
            ..self
        }
    }

    /// Rebuild the shared `HttpClient` whenever timeouts or pool settings change.
    pub async fn register_config_listeners(&self) {
        let http = self.http_client.clone();
        self.config_manager
            .register_on_change(move |cfg| {
                let http = http.clone();
                let cfg = cfg.clone();
                tokio::spawn(async move {
                    if let Err(e) = http.update_from_config(&cfg).await {
                        tracing::warn!("Failed to update HttpClient from config: {e}");
                    }
                });
            })
            .await;
    }

    /// Current config with `DRIVEMAN_CLIENT_ID` / `DRIVEMAN_CLIENT_SECRET` applied.
    pub async fn config(&self) -> DynamicConfig {
        self.config_manager.get_config().await.with_env_overrides()
    }

    /// Token tripped by SIGINT/SIGTERM.
    pub fn shutdown(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn session(&self) -> Result<&Arc<SessionStore>> {
        self.session
            .get_or_try_init(|| async { SessionStore::open(&self.session_db).map(Arc::new) })
            .await
    }

    pub async fn drive(&self) -> Result<&DriveClient> {
        self.drive
            .get_or_try_init(|| async {
                let config = self.config().await;
                let session = self.session().await?.clone();
                Ok::<_, DrivemanError>(DriveClient::new(
                    self.http_client.clone(),
                    session,
                    &config,
                ))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn registry(dir: &tempfile::TempDir) -> ServiceRegistry {
        let manager = DynamicConfigManager::initialize(Some(dir.path().to_path_buf()))
            .await
            .unwrap();
        ServiceRegistry::new(
            Arc::new(manager),
            HttpClient::from_defaults().unwrap(),
            dir.path().join("session.db"),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_session_opened_lazily_and_shared() {
        let dir = tempfile::TempDir::new().unwrap();
        let services = registry(&dir).await;
        assert!(!dir.path().join("session.db").exists());

        let a = services.session().await.unwrap().clone();
        let b = services.session().await.unwrap();
        assert!(Arc::ptr_eq(&a, b));
        assert!(dir.path().join("session.db").exists());
    }

    #[tokio::test]
    async fn test_drive_client_uses_config_endpoints() {
        let dir = tempfile::TempDir::new().unwrap();
        let services = registry(&dir).await;
        services
            .config_manager
            .set_value("apiBase", "http://127.0.0.1:9/drive/v3/")
            .await
            .unwrap();

        let drive = services.drive().await.unwrap();
        assert_eq!(drive.endpoints().api_base, "http://127.0.0.1:9/drive/v3");
    }

    #[tokio::test]
    async fn test_with_session_skips_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let session = Arc::new(SessionStore::in_memory());
        let services = registry(&dir).await.with_session(session.clone());

        assert!(Arc::ptr_eq(services.session().await.unwrap(), &session));
        assert!(!dir.path().join("session.db").exists());
    }

    #[tokio::test]
    async fn test_shutdown_token_is_shared() {
        let dir = tempfile::TempDir::new().unwrap();
        let services = registry(&dir).await;
        let token = services.shutdown();
        services.shutdown.cancel();
        assert!(token.is_cancelled());
    }
}
