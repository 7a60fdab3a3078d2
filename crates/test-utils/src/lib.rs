//! Shared test utilities for dailypaper crates.
//!
//! Provides the process-wide env lock, an env var guard and a fixture that
//! lays out an isolated `~/.dailypaper` home in a tempdir.

use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard};

/// Serialize tests that mutate process-global state (env vars, cwd, etc).
///
/// Acquire this guard at the start of any test that modifies environment
/// variables to prevent race conditions between parallel tests.
pub fn env_guard() -> MutexGuard<'static, ()> {
    static TEST_SERIAL: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));
    TEST_SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

/// RAII guard for environment variables - restores original value on drop.
pub struct EnvVarGuard {
    key: &'static str,
    previous: Option<String>,
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        if let Some(v) = &self.previous {
            std::env::set_var(self.key, v);
        } else {
            std::env::remove_var(self.key);
        }
    }
}

/// Set an environment variable and return a guard that restores the original on drop.
///
/// # Example
/// ```
/// let _guard = dailypaper_test_utils::set_env_var("MY_VAR", Some("value"));
/// // MY_VAR is set to "value" until _guard drops
/// ```
pub fn set_env_var(key: &'static str, value: Option<&str>) -> EnvVarGuard {
    let previous = std::env::var(key).ok();
    if let Some(val) = value {
        std::env::set_var(key, val);
    } else {
        std::env::remove_var(key);
    }
    EnvVarGuard { key, previous }
}

/// Temp home with a pre-created `.dailypaper` data directory.
///
/// The tempdir is removed when the fixture drops.
pub struct TestFixture {
    pub tempdir: tempfile::TempDir,
    /// `$HOME/.dailypaper`
    pub data_dir: PathBuf,
}

impl TestFixture {
    /// Does NOT point `DAILYPAPER_HOME` at the tempdir; use `home_guard()`.
    pub fn new() -> std::io::Result<Self> {
        let tempdir = tempfile::tempdir()?;
        let data_dir = tempdir.path().join(".dailypaper");
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self { tempdir, data_dir })
    }

    pub fn home_path(&self) -> &Path {
        self.tempdir.path()
    }

    /// `$HOME/.dailypaper/config.toml` (not created).
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    /// `$HOME/.dailypaper/papers.db` (not created).
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("papers.db")
    }

    /// Sets `DAILYPAPER_HOME` to the tempdir and clears `DAILYPAPER_DB`.
    pub fn home_guard(&self) -> (EnvVarGuard, EnvVarGuard) {
        let home = set_env_var(
            "DAILYPAPER_HOME",
            Some(&self.home_path().to_string_lossy()),
        );
        let db = set_env_var("DAILYPAPER_DB", None);
        (home, db)
    }

    /// Write `content` to the config file and return its path.
    pub fn write_config(&self, content: &str) -> std::io::Result<PathBuf> {
        let path = self.config_path();
        std::fs::write(&path, content)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_guard_serializes_tests() {
        let _g = env_guard();
    }

    #[test]
    fn test_set_env_var_sets_and_restores() {
        let _g = env_guard();
        const KEY: &str = "DAILYPAPER_TEST_UTILS_TEST_VAR";
        std::env::remove_var(KEY);

        {
            let _guard = set_env_var(KEY, Some("test_value"));
            assert_eq!(std::env::var(KEY).ok(), Some("test_value".to_string()));
        }
        assert!(std::env::var(KEY).is_err());
    }

    #[test]
    fn test_set_env_var_restores_previous_value() {
        let _g = env_guard();
        const KEY: &str = "DAILYPAPER_TEST_RESTORE_VAR";
        std::env::set_var(KEY, "original");

        {
            let _guard = set_env_var(KEY, Some("changed"));
            assert_eq!(std::env::var(KEY).ok(), Some("changed".to_string()));
        }
        assert_eq!(std::env::var(KEY).ok(), Some("original".to_string()));

        std::env::remove_var(KEY);
    }

    #[test]
    fn test_set_env_var_removes_when_none() {
        let _g = env_guard();
        const KEY: &str = "DAILYPAPER_TEST_REMOVE_VAR";
        std::env::set_var(KEY, "exists");

        {
            let _guard = set_env_var(KEY, None);
            assert!(std::env::var(KEY).is_err());
        }
        assert_eq!(std::env::var(KEY).ok(), Some("exists".to_string()));

        std::env::remove_var(KEY);
    }

    #[test]
    fn test_fixture_creates_data_dir() {
        let fixture = TestFixture::new().expect("fixture creation");
        assert!(fixture.data_dir.is_dir());
        assert_eq!(fixture.data_dir, fixture.home_path().join(".dailypaper"));
        assert!(!fixture.database_path().exists());
    }

    #[test]
    fn test_fixture_write_config() {
        let fixture = TestFixture::new().expect("fixture creation");
        let path = fixture
            .write_config("[recommendation]\nrrf_k = 30\n")
            .expect("write config");
        let parsed: toml::Value = toml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed["recommendation"]["rrf_k"].as_integer(), Some(30));
    }

    #[test]
    fn test_fixture_home_guard() {
        let _g = env_guard();
        let fixture = TestFixture::new().expect("fixture creation");

        let original = std::env::var("DAILYPAPER_HOME").ok();
        {
            let _home = fixture.home_guard();
            assert_eq!(
                std::env::var("DAILYPAPER_HOME").unwrap(),
                fixture.home_path().to_string_lossy()
            );
            assert!(std::env::var("DAILYPAPER_DB").is_err());
        }
        assert_eq!(std::env::var("DAILYPAPER_HOME").ok(), original);
    }
}
