use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub last_game_path: Option<PathBuf>,
    #[serde(default)]
    pub extra_mod_paths: Vec<PathBuf>,
    #[serde(default)]
    pub game_version: Option<String>,
    #[serde(default)]
    pub check_game_versions: bool,
    /// External executable that patches the game jar.
    #[serde(default)]
    pub patcher_command: Option<PathBuf>,
    #[serde(default)]
    pub quicklaunch_dir: Option<PathBuf>,
    #[serde(skip)]
    data_dir: PathBuf,
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        Self::load_from(&base_data_dir()?)
    }

    pub fn load_from(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir).context("create app data dir")?;
        let path = data_dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let mut config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            config.data_dir = data_dir.to_path_buf();
            config.extra_mod_paths.retain(|path| !path.as_os_str().is_empty());
            return Ok(config);
        }

        let config = AppConfig {
            data_dir: data_dir.to_path_buf(),
            ..AppConfig::default()
        };
        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir).context("create app data dir")?;
        let path = self.data_dir.join(CONFIG_FILE_NAME);
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(path, raw).context("write app config")?;
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn quicklaunch_dir(&self) -> PathBuf {
        self.quicklaunch_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("quicklaunch"))
    }
}

fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("havenloader"))
}
