use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "YtNotes";
const APP_NAME: &str = "ytnotes";

pub const CONFIG_ENV: &str = "YTNOTES_CONFIG";
pub const DATA_ENV: &str = "YTNOTES_DATA";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load(&self.paths);
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths);
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let override_data = env::var(DATA_ENV).ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        Ok(Self::rooted(config_dir, config_file, data_root))
    }

    /// Builds the path set under explicit roots, bypassing discovery.
    pub fn rooted(config_dir: PathBuf, config_file: PathBuf, data_dir: PathBuf) -> Self {
        let database_path = data_dir.join("notes.db");
        Self {
            config_dir,
            config_file,
            data_dir,
            database_path,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub auto_save: AutoSaveConfig,
    pub storage: StorageOptions,
    pub identity: IdentityConfig,
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) {
        self.storage.resolve(paths);
        if let Some(user) = &self.identity.user_id {
            if user.trim().is_empty() {
                tracing::warn!("blank identity.user_id in config, treating as signed out");
                self.identity.user_id = None;
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveConfig {
    /// Quiet period before a burst of edits is persisted
    pub debounce_ms: u64,
    /// How long `Saved` / `Error` stay visible before reverting to `Idle`
    pub status_display_ms: u64,
    /// Re-check the video-page gate on every save, not only on creation
    pub gate_updates: bool,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 2000,
            status_display_ms: 2500,
            gate_updates: false,
        }
    }
}

impl AutoSaveConfig {
    pub fn debounce_duration(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn status_display_duration(&self) -> Duration {
        Duration::from_millis(self.status_display_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub database_path: PathBuf,
    pub wal_autocheckpoint: u32,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            database_path: PathBuf::new(),
            wal_autocheckpoint: 1000,
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) {
        if self.database_path.as_os_str().is_empty() {
            self.database_path = paths.database_path.clone();
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub user_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_paths(root: &TempDir) -> ConfigPaths {
        let base = root.path();
        let config_dir = base.join("config");
        ConfigPaths::rooted(
            config_dir.clone(),
            config_dir.join("config.toml"),
            base.join("data"),
        )
    }

    #[test]
    fn load_or_init_writes_defaults_on_first_run() -> Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        let loader = ConfigLoader::with_paths(paths.clone());

        let cfg = loader.load_or_init()?;
        assert!(paths.config_file.exists());
        assert_eq!(cfg.auto_save.debounce_ms, 2000);
        assert!(!cfg.auto_save.gate_updates);
        assert_eq!(cfg.storage.database_path, paths.database_path);
        assert!(cfg.identity.user_id.is_none());
        Ok(())
    }

    #[test]
    fn partial_config_keeps_defaults_for_missing_keys() -> Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "[auto_save]\ndebounce_ms = 800\n\n[identity]\nuser_id = \"u-42\"\n",
        )?;

        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.auto_save.debounce_duration(), Duration::from_millis(800));
        assert_eq!(cfg.auto_save.status_display_ms, 2500);
        assert_eq!(cfg.identity.user_id.as_deref(), Some("u-42"));
        Ok(())
    }

    #[test]
    fn blank_user_id_is_treated_as_signed_out() -> Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        fs::write(&paths.config_file, "[identity]\nuser_id = \"  \"\n")?;

        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert!(cfg.identity.user_id.is_none());
        Ok(())
    }
}
