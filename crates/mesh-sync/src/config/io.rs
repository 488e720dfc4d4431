//! YAML loading and saving for the sync config

use std::path::Path;

use anyhow::{Context, Result};

use super::SyncConfig;

impl SyncConfig {
    /// Load the sync config from a YAML file
    ///
    /// A missing file yields defaults. A file that fails to parse or holds
    /// out-of-range values also yields defaults, with a warning; sync must
    /// come up even with a broken config.
    pub fn load(path: &Path) -> Self {
        log::info!("SyncConfig::load: Loading from {:?}", path);

        if !path.exists() {
            log::info!("SyncConfig::load: Config file doesn't exist, using defaults");
            return Self::default();
        }

        let config = match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str::<SyncConfig>(&contents) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("SyncConfig::load: Failed to parse config: {}, using defaults", e);
                    return Self::default();
                }
            },
            Err(e) => {
                log::warn!(
                    "SyncConfig::load: Failed to read config file: {}, using defaults",
                    e
                );
                return Self::default();
            }
        };

        match config.validate() {
            Ok(()) => {
                log::info!("SyncConfig::load: Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                log::warn!("SyncConfig::load: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save the sync config as YAML, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        log::info!("SyncConfig::save: Saving to {:?}", path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let yaml = serde_yaml::to_string(self).context("Failed to serialize sync config to YAML")?;

        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        log::info!("SyncConfig::save: Config saved successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_nonexistent_returns_default() {
        let config = SyncConfig::load(Path::new("/nonexistent/path/sync.yaml"));
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sync.yaml");

        let config = SyncConfig {
            default_bpm: 172.0,
            sample_rate: 48000,
            ..SyncConfig::default()
        };

        config.save(&path).unwrap();
        let loaded = SyncConfig::load(&path);

        assert_eq!(loaded.default_bpm, 172.0);
        assert_eq!(loaded.sample_rate, 48000);
        assert_eq!(loaded.rate_slider_max, config.rate_slider_max);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.yaml");
        std::fs::write(&path, "default_bpm: 140.0\n").unwrap();

        let loaded = SyncConfig::load(&path);
        assert_eq!(loaded.default_bpm, 140.0);
        assert_eq!(loaded.sample_rate, SyncConfig::default().sample_rate);
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.yaml");
        std::fs::write(&path, "default_bpm: -5.0\nsample_rate: 0\n").unwrap();

        assert_eq!(SyncConfig::load(&path), SyncConfig::default());
    }

    #[test]
    fn test_garbage_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.yaml");
        std::fs::write(&path, "default_bpm: [not, a, number").unwrap();

        assert_eq!(SyncConfig::load(&path), SyncConfig::default());
    }
}
