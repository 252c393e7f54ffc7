//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.mishkat/config.toml`
//! 2. Local config: `.mishkat/config.toml` (in workspace)
//! 3. CLI overrides
//!
//! Later sources override earlier ones. Merging is per-section: a section
//! left at its default in the overlay keeps the base value.

use crate::error::ConfigError;
use crate::{ConfigOverrides, MishkatConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration directory name, both global and local.
const CONFIG_DIR: &str = ".mishkat";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.mishkat`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<MishkatConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.mishkat`).
    pub fn new() -> Self {
        let global_config_dir = dirs::home_dir().map(|h| h.join(CONFIG_DIR));

        Self {
            global_config_dir,
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    ///
    /// Useful for testing.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    /// Get the global config file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Get the local config file path for a workspace.
    pub fn local_config_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for a workspace with optional CLI overrides.
    ///
    /// Merges config in order: global → local → overrides.
    pub fn load(
        &mut self,
        workspace_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<MishkatConfig, ConfigError> {
        let mut config = MishkatConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(workspace_root)? {
            config = merge_configs(config, local_config);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<MishkatConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let config = load_config_file(&global_path)?;

        self.global_config = Some(config.clone());

        Ok(Some(config))
    }

    /// Load only the local configuration for a workspace.
    pub fn load_local(&self, workspace_root: &Path) -> Result<Option<MishkatConfig>, ConfigError> {
        let local_path = self.local_config_path(workspace_root);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        load_config_file(&local_path).map(Some)
    }

    /// Initialize global configuration directory with defaults.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };

        if !global_dir.exists() {
            std::fs::create_dir_all(global_dir)
                .map_err(|e| ConfigError::create_dir(global_dir, e))?;
        }

        let config_path = global_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            save_config_file(&config_path, &MishkatConfig::default())?;
        }

        Ok(config_path)
    }

    /// Initialize local configuration for a workspace with defaults.
    pub fn init_local(&self, workspace_root: &Path) -> Result<PathBuf, ConfigError> {
        let local_dir = workspace_root.join(CONFIG_DIR);

        if !local_dir.exists() {
            std::fs::create_dir_all(&local_dir)
                .map_err(|e| ConfigError::create_dir(&local_dir, e))?;
        }

        let config_path = local_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            save_config_file(&config_path, &MishkatConfig::default())?;
        }

        Ok(config_path)
    }

    /// Clear cached global configuration.
    ///
    /// Forces reload on next `load_global()` call.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }
}

/// Load a configuration file from disk.
fn load_config_file(path: &Path) -> Result<MishkatConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

/// Save a configuration file to disk.
fn save_config_file(path: &Path, config: &MishkatConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// Merge two configurations section by section, `overlay` taking precedence
/// wherever it differs from the default.
fn merge_configs(base: MishkatConfig, overlay: MishkatConfig) -> MishkatConfig {
    MishkatConfig {
        vector: merge_section(base.vector, overlay.vector),
        text_engine: merge_section(base.text_engine, overlay.text_engine),
        relational: merge_section(base.relational, overlay.relational),
        graph: merge_section(base.graph, overlay.graph),
        embedding: merge_section(base.embedding, overlay.embedding),
        llm: merge_section(base.llm, overlay.llm),
        search: merge_section(base.search, overlay.search),
        hadith: merge_section(base.hadith, overlay.hadith),
        translations: merge_section(base.translations, overlay.translations),
        cache: merge_section(base.cache, overlay.cache),
        logging: merge_section(base.logging, overlay.logging),
    }
}

fn merge_section<T: Default + PartialEq>(base: T, overlay: T) -> T {
    if overlay != T::default() {
        overlay
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_load_without_files_yields_defaults() {
        let global = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(global.path());

        let config = loader.load(workspace.path(), None).unwrap();
        assert_eq!(config, MishkatConfig::default());
    }

    #[test]
    fn test_local_overrides_global() {
        let global = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();

        std::fs::write(
            global.path().join(CONFIG_FILE_NAME),
            "[vector]\nurl = \"http://global:6334\"\n",
        )
        .unwrap();

        let local_dir = workspace.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&local_dir).unwrap();
        std::fs::write(
            local_dir.join(CONFIG_FILE_NAME),
            "[vector]\nurl = \"http://local:6334\"\n",
        )
        .unwrap();

        let mut loader = ConfigLoader::with_global_dir(global.path());
        let config = loader.load(workspace.path(), None).unwrap();
        assert_eq!(config.vector.url, "http://local:6334");
    }

    #[test]
    fn test_global_applies_when_local_absent() {
        let global = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();

        std::fs::write(
            global.path().join(CONFIG_FILE_NAME),
            "[search]\nlimit = 50\n",
        )
        .unwrap();

        let mut loader = ConfigLoader::with_global_dir(global.path());
        let config = loader.load(workspace.path(), None).unwrap();
        assert_eq!(config.search.limit, 50);
    }

    #[test]
    fn test_cli_overrides_win() {
        let global = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(global.path());

        let overrides = ConfigOverrides {
            text_engine_url: Some("http://elastic:9200".into()),
            ..Default::default()
        };
        let config = loader.load(workspace.path(), Some(&overrides)).unwrap();
        assert_eq!(config.text_engine.url, "http://elastic:9200");
    }

    #[test]
    fn test_init_local_writes_defaults() {
        let workspace = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(workspace.path().join("unused"));
        let path = loader.init_local(workspace.path()).unwrap();
        assert!(path.exists());

        let parsed = load_config_file(&path).unwrap();
        assert_eq!(parsed, MishkatConfig::default());
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let global = TempDir::new().unwrap();
        std::fs::write(global.path().join(CONFIG_FILE_NAME), "not [valid toml").unwrap();

        let mut loader = ConfigLoader::with_global_dir(global.path());
        assert!(matches!(
            loader.load_global(),
            Err(ConfigError::ParseToml { .. })
        ));
    }
}
