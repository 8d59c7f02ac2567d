//! File System Utilities
//!
//! Configuration and data directory management.

use crate::error::{Error, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "keyspace", "keyspace-browser")
        .ok_or_else(|| Error::invalid("Could not determine project directories"))
}

/// Get or create the application's configuration directory
///
/// Platform-specific locations:
/// - **Linux**: `~/.config/keyspace-browser/` or `$XDG_CONFIG_HOME/keyspace-browser/`
/// - **macOS**: `~/Library/Application Support/dev.keyspace.keyspace-browser/`
/// - **Windows**: `C:\Users\<User>\AppData\Roaming\keyspace\keyspace-browser\config\`
pub fn get_or_create_config_dir() -> Result<PathBuf> {
    let project_dirs = project_dirs()?;
    let config_dir = project_dirs.config_dir();

    if !config_dir.exists() {
        fs::create_dir_all(config_dir)?;
    }

    Ok(config_dir.to_path_buf())
}

/// Get or create the data directory
///
/// Platform-specific locations:
/// - **Linux**: `~/.local/share/keyspace-browser/`
/// - **macOS**: `~/Library/Application Support/dev.keyspace.keyspace-browser/`
/// - **Windows**: `C:\Users\<User>\AppData\Roaming\keyspace\keyspace-browser\data\`
pub fn get_or_create_data_dir() -> Result<PathBuf> {
    let project_dirs = project_dirs()?;
    let data_dir = project_dirs.data_dir();

    if !data_dir.exists() {
        fs::create_dir_all(data_dir)?;
    }

    Ok(data_dir.to_path_buf())
}

/// Resolve a log directory; relative paths live under the data directory
pub fn resolve_log_dir(dir: &Path) -> Result<PathBuf> {
    let resolved = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        get_or_create_data_dir()?.join(dir)
    };

    if !resolved.exists() {
        fs::create_dir_all(&resolved)?;
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_log_dir_is_created() {
        let dir = std::env::temp_dir().join(format!("keyspace-browser-logs-{}", std::process::id()));
        let resolved = resolve_log_dir(&dir).expect("resolve");
        assert_eq!(resolved, dir);
        assert!(dir.is_dir());
        let _ = fs::remove_dir_all(&dir);
    }
}
