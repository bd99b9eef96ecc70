use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn state_dir() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("proctor")
        } else {
            ProjectDirs::from("", "", "proctor")
                .map(|pd| pd.data_local_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        }
    }

    pub fn db_path() -> PathBuf {
        Self::state_dir().join("proctor.db")
    }

    pub fn log_path() -> PathBuf {
        Self::state_dir().join("proctor.log")
    }

    pub fn config_path() -> PathBuf {
        ProjectDirs::from("", "", "proctor")
            .map(|pd| pd.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("proctor_config.json"))
    }
}
