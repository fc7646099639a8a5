// Promptbook platform paths
// Where settings and the local library database live on each OS.

use std::path::PathBuf;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as os;
#[cfg(target_os = "macos")]
use macos as os;
#[cfg(target_os = "windows")]
use windows as os;

/// Database file name inside [`get_data_dir`].
pub const DATABASE_FILE: &str = "promptbook.db";

/// Directory holding `settings.json`.
///
/// - **Linux**: `$XDG_CONFIG_HOME/promptbook` or `~/.config/promptbook`
/// - **macOS**: `~/Library/Preferences/Promptbook`
/// - **Windows**: `%APPDATA%/Promptbook`
pub fn get_config_dir() -> PathBuf {
    os::get_config_dir()
}

/// Directory holding the local library database.
///
/// - **Linux**: `$XDG_DATA_HOME/promptbook` or `~/.local/share/promptbook`
/// - **macOS**: `~/Library/Application Support/Promptbook`
/// - **Windows**: `%LOCALAPPDATA%/Promptbook`
pub fn get_data_dir() -> PathBuf {
    os::get_data_dir()
}

/// Default location of the library database. `PROMPTBOOK_DATA_DIR` overrides
/// the directory.
pub fn get_database_path() -> PathBuf {
    match std::env::var("PROMPTBOOK_DATA_DIR") {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir).join(DATABASE_FILE),
        _ => get_data_dir().join(DATABASE_FILE),
    }
}
