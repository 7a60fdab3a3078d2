use anyhow::Result;
use std::path::PathBuf;

/// Returns the user's home directory.
///
/// `DAILYPAPER_HOME` takes precedence so tests and scripted runs can isolate
/// all state under a temporary directory.
pub fn home_dir() -> Result<PathBuf> {
    if let Ok(custom) = std::env::var("DAILYPAPER_HOME") {
        if !custom.trim().is_empty() {
            return Ok(PathBuf::from(custom));
        }
    }
    #[cfg(unix)]
    if let Ok(home) = std::env::var("HOME") {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir().ok_or_else(|| anyhow::anyhow!("home directory not found"))
}

/// Returns the dailypaper data directory (`~/.dailypaper`).
pub fn data_dir() -> Result<PathBuf> {
    Ok(home_dir()?.join(".dailypaper"))
}

/// Returns the SQLite database path.
///
/// Uses `DAILYPAPER_DB` when set, otherwise `~/.dailypaper/papers.db`.
pub fn database_path() -> Result<PathBuf> {
    if let Ok(custom) = std::env::var("DAILYPAPER_DB") {
        if !custom.trim().is_empty() {
            return Ok(PathBuf::from(custom));
        }
    }
    Ok(data_dir()?.join("papers.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dailypaper_test_utils::{env_guard, set_env_var};

    #[test]
    fn database_path_prefers_explicit_override() {
        let _g = env_guard();
        let _db = set_env_var("DAILYPAPER_DB", Some("/tmp/custom.db"));
        assert_eq!(database_path().unwrap(), PathBuf::from("/tmp/custom.db"));
    }

    #[test]
    fn data_dir_follows_dailypaper_home() {
        let _g = env_guard();
        let _db = set_env_var("DAILYPAPER_DB", None);
        let _home = set_env_var("DAILYPAPER_HOME", Some("/tmp/dp-home"));
        assert_eq!(data_dir().unwrap(), PathBuf::from("/tmp/dp-home/.dailypaper"));
        assert_eq!(
            database_path().unwrap(),
            PathBuf::from("/tmp/dp-home/.dailypaper/papers.db")
        );
    }

    #[cfg(unix)]
    #[test]
    fn blank_home_override_is_ignored() {
        let _g = env_guard();
        let _home = set_env_var("DAILYPAPER_HOME", Some("  "));
        let _unix_home = set_env_var("HOME", Some("/tmp/fallback-home"));
        assert_eq!(home_dir().unwrap(), PathBuf::from("/tmp/fallback-home"));
    }
}
