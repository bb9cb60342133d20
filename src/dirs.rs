use std::path::PathBuf;

/// Returns the base directory for activity log data.
///
/// Uses `$A3S_ACTIVITY_HOME` if set, otherwise defaults to `~/.a3s/activity`.
pub fn activity_home() -> PathBuf {
    if let Ok(home) = std::env::var("A3S_ACTIVITY_HOME") {
        return PathBuf::from(home);
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".a3s")
        .join("activity")
}

/// Returns the path to the user configuration file.
pub fn config_path() -> PathBuf {
    activity_home().join("config.toml")
}
