use tokio_util::sync::CancellationToken;

/// Turns SIGINT (Ctrl+C) and SIGTERM into a cancelled `CancellationToken`.
///
/// Spawn `listen()` as a background task, then hand `token()` clones to
/// uploads and downloads so they stop at the next chunk.
pub struct SignalHandler {
    token: CancellationToken,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Returns a clone of the cancellation token for sharing with subsystems.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for SIGINT or SIGTERM, then cancel the token.
    pub async fn listen(&self) {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT, cancelling transfers");
            }
            _ = Self::sigterm() => {
                tracing::info!("Received SIGTERM, cancelling transfers");
            }
        }
        self.token.cancel();
    }

    #[cfg(unix)]
    async fn sigterm() {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(not(unix))]
    async fn sigterm() {
        std::future::pending::<()>().await;
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_uncancelled_token() {
        let handler = SignalHandler::new();
        assert!(!handler.token().is_cancelled());
    }

    #[test]
    fn test_token_clones_share_state() {
        let handler = SignalHandler::default();
        let t1 = handler.token();
        let t2 = handler.token();

        handler.token.cancel();
        assert!(t1.is_cancelled());
        assert!(t2.is_cancelled());
    }

    #[tokio::test]
    async fn test_child_token_follows_shutdown() {
        let handler = SignalHandler::new();
        let child = handler.token().child_token();
        handler.token.cancel();
        child.cancelled().await;
        assert!(child.is_cancelled());
    }
}
