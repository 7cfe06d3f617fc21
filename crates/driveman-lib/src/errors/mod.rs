use thiserror::Error;

#[derive(Error, Debug)]
pub enum DrivemanError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("OAuth2 error: {0}")]
    OAuth2(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Upload(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Command error: {0}")]
    Command(String),

    #[error("{0}")]
    Application(String),
}

pub type Result<T> = std::result::Result<T, DrivemanError>;

impl DrivemanError {
    /// True for errors that a fresh login would fix: a missing or expired
    /// session, or the remote rejecting the bearer token.
    pub fn needs_login(&self) -> bool {
        matches!(
            self,
            DrivemanError::Auth(_) | DrivemanError::Api { status: 401, .. }
        )
    }
}

/// Logs a fatal error and exits the process with code 1.
///
/// This function never returns (`-> !`). It is intended for unrecoverable
/// errors during initialization or command execution.
pub fn handle_fatal(err: DrivemanError) -> ! {
    tracing::error!("Fatal error: {}", err);
    std::process::exit(1)
}

/// Maps a `DrivemanError` to user-facing CLI output with a hint where one
/// helps. The diagnostic itself goes to the log.
pub fn handle_command_error(err: &DrivemanError) {
    use crate::output;

    tracing::debug!(error = ?err, "command failed");

    if err.needs_login() {
        match err {
            DrivemanError::Auth(msg) => output::error(&format!("Authentication error: {}", msg)),
            other => output::error(&format!("Request rejected: {}", other)),
        }
        output::info("Run `driveman login` to sign in again.");
        return;
    }

    match err {
        DrivemanError::OAuth2(msg) => {
            output::error(&format!("Login failed: {}", msg));
            output::info("Check the OAuth client settings with `driveman config show`.");
        }
        DrivemanError::Api { status, message } => {
            output::error(&format!("Request failed ({}): {}", status, message));
        }
        DrivemanError::Http(e) => {
            output::error(&format!("Network error: {}", e));
            output::info("Check your internet connection.");
        }
        DrivemanError::Validation(msg) => {
            output::error(msg);
        }
        DrivemanError::Io(e) => {
            output::error(&format!("File error: {}", e));
        }
        DrivemanError::Config(msg) => {
            output::error(&format!("Configuration error: {}", msg));
        }
        DrivemanError::Cancelled => {
            output::warning("Cancelled.");
        }
        DrivemanError::Command(msg) => {
            output::error(&format!("Error: {}", msg));
        }
        _ => {
            output::error(&format!("{}", err));
        }
    }
}
