//! Platform paths for config and data

use std::path::{Path, PathBuf};

/// Expand a path, replacing a leading `~` with the user's home directory
///
/// # Examples
///
/// ```
/// use dropcraft_settings::expand_path;
/// use std::path::PathBuf;
///
/// let path = expand_path(&PathBuf::from("~/drops/tree.json"));
/// assert!(!path.starts_with("~"));
/// ```
pub fn expand_path(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}

/// Default config directory
///
/// - macOS: `~/Library/Application Support/Dropcraft`
/// - Linux: `$XDG_CONFIG_HOME/dropcraft` or `~/.config/dropcraft`
/// - Windows: `%APPDATA%\Dropcraft`
pub fn default_config_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        home_dir()
            .map(|h| h.join("Library/Application Support/Dropcraft"))
            .unwrap_or_else(|| PathBuf::from(".dropcraft"))
    }
    #[cfg(target_os = "linux")]
    {
        xdg_dir("XDG_CONFIG_HOME", ".config").join("dropcraft")
    }
    #[cfg(target_os = "windows")]
    {
        appdata_dir()
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        home_dir()
            .map(|h| h.join(".dropcraft"))
            .unwrap_or_else(|| PathBuf::from(".dropcraft"))
    }
}

/// Default data directory (where distributions are exported)
///
/// - macOS: `~/Library/Application Support/Dropcraft`
/// - Linux: `$XDG_DATA_HOME/dropcraft` or `~/.local/share/dropcraft`
/// - Windows: `%APPDATA%\Dropcraft`
pub fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        default_config_dir()
    }
    #[cfg(target_os = "linux")]
    {
        xdg_dir("XDG_DATA_HOME", ".local/share").join("dropcraft")
    }
    #[cfg(target_os = "windows")]
    {
        appdata_dir()
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        default_config_dir()
    }
}

#[cfg(target_os = "linux")]
fn xdg_dir(var: &str, fallback: &str) -> PathBuf {
    std::env::var(var).map(PathBuf::from).unwrap_or_else(|_| {
        home_dir()
            .map(|h| h.join(fallback))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

#[cfg(target_os = "windows")]
fn appdata_dir() -> PathBuf {
    std::env::var("APPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("Dropcraft")
}
