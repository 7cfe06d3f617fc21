use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Immutable application paths initialized once at startup from environment variables.
///
/// Access via `SimplifiedConfig::get()` which returns a `&'static SimplifiedConfig`.
pub struct SimplifiedConfig {
    pub home_dir: PathBuf,
    /// `$DRIVEMAN_HOME`, or `~/.driveman`.
    pub data_dir: PathBuf,
    pub session_db: PathBuf,
    pub download_dir: PathBuf,
}

static CONFIG: OnceLock<SimplifiedConfig> = OnceLock::new();

impl SimplifiedConfig {
    /// Returns a reference to the global `SimplifiedConfig` singleton.
    /// Initializes from environment variables on first call.
    pub fn get() -> &'static SimplifiedConfig {
        CONFIG.get_or_init(SimplifiedConfig::from_env)
    }

    fn from_env() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        let data_dir = std::env::var("DRIVEMAN_HOME")
            .ok()
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&home).join(".driveman"));
        Self::with_dirs(PathBuf::from(home), data_dir)
    }

    /// Build a config rooted at explicit directories.
    pub fn with_dirs(home_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            session_db: data_dir.join("session.db"),
            download_dir: home_dir.join("Downloads"),
            home_dir,
            data_dir,
        }
    }

    /// Directory that holds `config.json`.
    pub fn config_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_dirs_derives_paths() {
        let cfg = SimplifiedConfig::with_dirs(
            PathBuf::from("/home/ann"),
            PathBuf::from("/home/ann/.driveman"),
        );
        assert_eq!(cfg.session_db, PathBuf::from("/home/ann/.driveman/session.db"));
        assert_eq!(cfg.download_dir, PathBuf::from("/home/ann/Downloads"));
        assert_eq!(cfg.config_dir(), Path::new("/home/ann/.driveman"));
    }

    #[test]
    fn test_get_is_stable() {
        let a = SimplifiedConfig::get() as *const SimplifiedConfig;
        let b = SimplifiedConfig::get() as *const SimplifiedConfig;
        assert_eq!(a, b);
    }
}
