use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app_dirs::AppDirs;
use crate::clock::{FIVE_MINUTE_MARK, FORCE_SAVE_MARKS};
use crate::violation::{StrikePolicy, DEFAULT_STRIKE_THRESHOLD};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProctorConfig {
    pub strike_threshold: u8,
    pub keyboard_auto_submit: bool,
    pub five_minute_mark: u32,
    pub force_save_marks: Vec<u32>,
    pub code_save_debounce_ms: u64,
    pub persist_violations: bool,
    pub min_cols: u16,
    pub min_rows: u16,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            strike_threshold: DEFAULT_STRIKE_THRESHOLD,
            keyboard_auto_submit: false,
            five_minute_mark: FIVE_MINUTE_MARK,
            force_save_marks: FORCE_SAVE_MARKS.to_vec(),
            code_save_debounce_ms: 2000,
            persist_violations: false,
            min_cols: 80,
            min_rows: 24,
        }
    }
}

impl ProctorConfig {
    pub fn strike_policy(&self) -> StrikePolicy {
        StrikePolicy {
            threshold: self.strike_threshold.max(1),
            keyboard_auto_submit: self.keyboard_auto_submit,
        }
    }

    pub fn code_save_debounce(&self) -> Duration {
        Duration::from_millis(self.code_save_debounce_ms)
    }
}

pub trait ConfigStore {
    fn load(&self) -> ProctorConfig;
    fn save(&self, cfg: &ProctorConfig) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> ProctorConfig {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<ProctorConfig>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => log::warn!("ignoring unreadable config {}: {}", self.path.display(), e),
            },
            Err(_) => log::debug!("no config at {}, using defaults", self.path.display()),
        }
        ProctorConfig::default()
    }

    fn save(&self, cfg: &ProctorConfig) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(std::io::Error::other)?;
        fs::write(&self.path, data)
    }
}
