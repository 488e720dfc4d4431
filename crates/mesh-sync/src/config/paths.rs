//! Default location of the sync config file

use std::path::PathBuf;

/// File name of the sync config inside the mesh collection folder
pub const SYNC_CONFIG_FILENAME: &str = "sync.yaml";

/// Get the default sync config path
///
/// Returns: `~/Music/mesh-collection/sync.yaml`, next to the player config.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Music")
        .join("mesh-collection")
        .join(SYNC_CONFIG_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_in_collection() {
        let path = default_config_path();
        assert!(path.ends_with("mesh-collection/sync.yaml"));
    }
}
