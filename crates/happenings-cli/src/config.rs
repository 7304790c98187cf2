// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use happenings_calendar::{APP_NAME, Platform};
use happenings_catalog::DEFAULT_TABLE;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_TIMEOUT: &str = "10s";
const DEFAULT_LOG_LEVEL: &str = "info";
const API_KEY_ENV: &str = "HAPPENINGS_API_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub catalog: Catalog,
    #[serde(default)]
    pub calendar: Calendar,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            catalog: Catalog::default(),
            calendar: Calendar::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub table: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            table: Some(DEFAULT_TABLE.to_owned()),
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Calendar {
    pub db_path: Option<String>,
    pub platform: Option<String>,
    pub allow_access: Option<bool>,
}

impl Default for Calendar {
    fn default() -> Self {
        Self {
            db_path: None,
            platform: Some(Platform::LocalOnly.as_str().to_owned()),
            allow_access: Some(true),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub dir: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("HAPPENINGS_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!(
                "cannot resolve config directory; set HAPPENINGS_CONFIG_PATH to the config file"
            )
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no `version`; add `version = 1` at the top",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(table) = &self.catalog.table
            && table.trim().is_empty()
        {
            bail!("catalog.table in {} must not be empty", path.display());
        }

        if let Some(timeout) = &self.catalog.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "catalog.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(db_path) = &self.calendar.db_path {
            happenings_calendar::validate_db_path(db_path)?;
        }

        if let Some(platform) = &self.calendar.platform {
            Platform::parse(platform).with_context(|| format!("invalid {}", path.display()))?;
        }

        if let Some(level) = &self.log.level {
            EnvFilter::try_new(level).with_context(|| {
                format!(
                    "log.level {level:?} in {} is not a valid filter (for example \"info\" or \"happenings_app=debug\")",
                    path.display()
                )
            })?;
        }

        Ok(())
    }

    pub fn catalog_base_url(&self) -> Option<&str> {
        self.catalog
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// The configured key, else `HAPPENINGS_API_KEY`.
    pub fn catalog_api_key(&self) -> Option<String> {
        self.catalog
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn catalog_table(&self) -> &str {
        self.catalog.table.as_deref().unwrap_or(DEFAULT_TABLE)
    }

    pub fn catalog_timeout(&self) -> Result<Duration> {
        parse_duration(self.catalog.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn calendar_db_path(&self) -> Result<PathBuf> {
        match &self.calendar.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => happenings_calendar::default_db_path(),
        }
    }

    pub fn calendar_platform(&self) -> Result<Platform> {
        match &self.calendar.platform {
            Some(platform) => Platform::parse(platform),
            None => Ok(Platform::default()),
        }
    }

    pub fn allow_calendar_access(&self) -> bool {
        self.calendar.allow_access.unwrap_or(true)
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.log.dir {
            return Ok(PathBuf::from(dir));
        }
        Ok(happenings_calendar::data_dir()
            .context("resolve log directory; set [log].dir to a writable directory")?
            .join("logs"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# happenings config\n# Place this file at: {}\n\nversion = 1\n\n[catalog]\n# Required unless you run with --demo.\nbase_url = \"https://your-project.supabase.co\"\n# Or set {} in the environment.\napi_key = \"\"\ntable = \"{}\"\ntimeout = \"{}\"\n\n[calendar]\n# Optional. Default is platform data dir (for example ~/.local/share/happenings/calendar.db)\n# db_path = \"/absolute/path/to/calendar.db\"\n# \"local\" gives exported calendars their own local source; \"account\" reuses the default calendar's.\nplatform = \"local\"\nallow_access = true\n\n[log]\nlevel = \"{}\"\n# dir = \"/absolute/path/to/logs\"\n",
            path.display(),
            API_KEY_ENV,
            DEFAULT_TABLE,
            DEFAULT_TIMEOUT,
            DEFAULT_LOG_LEVEL,
        )
    }
}

const DURATION_UNITS: [(&str, Duration); 3] = [
    ("ms", Duration::from_millis(1)),
    ("s", Duration::from_secs(1)),
    ("m", Duration::from_secs(60)),
];

/// Reads `<N>ms`, `<N>s` or `<N>m`. Longer suffixes are tried first so `ms` is not read as `m`.
fn parse_duration(raw: &str) -> Result<Duration> {
    let trimmed = raw.trim();
    let (count, unit) = DURATION_UNITS
        .iter()
        .find_map(|(suffix, unit)| trimmed.strip_suffix(suffix).map(|count| (count, *unit)))
        .ok_or_else(|| {
            anyhow!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 10s)")
        })?;
    let count: u32 = count
        .trim()
        .parse()
        .with_context(|| format!("invalid timeout duration {raw:?}"))?;
    unit.checked_mul(count)
        .ok_or_else(|| anyhow!("timeout duration {raw:?} is too large"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use happenings_calendar::Platform;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    pub(crate) fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.catalog_table(), "events");
        assert_eq!(config.catalog_timeout()?, Duration::from_secs(10));
        assert_eq!(config.calendar_platform()?, Platform::LocalOnly);
        assert!(config.allow_calendar_access());
        assert_eq!(config.log_level(), "info");
        assert!(config.catalog_base_url().is_none());
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[catalog]\ntable = \"events\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        assert!(error.to_string().contains("version = 1"));
        Ok(())
    }

    #[test]
    fn v1_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[catalog]\nbase_url = \"https://demo.supabase.co\"\napi_key = \"anon\"\ntable = \"happenings\"\ntimeout = \"2s\"\n[calendar]\nplatform = \"account\"\nallow_access = false\n[log]\nlevel = \"debug\"\ndir = \"/var/log/happenings\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.catalog_base_url(), Some("https://demo.supabase.co"));
        assert_eq!(config.catalog_api_key().as_deref(), Some("anon"));
        assert_eq!(config.catalog_table(), "happenings");
        assert_eq!(config.catalog_timeout()?, Duration::from_secs(2));
        assert_eq!(config.calendar_platform()?, Platform::AccountBacked);
        assert!(!config.allow_calendar_access());
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.log_dir()?, PathBuf::from("/var/log/happenings"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 3\n")?;
        let error = Config::load(&path).expect_err("v3 config should fail");
        assert!(error.to_string().contains("unsupported config version 3"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("HAPPENINGS_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("HAPPENINGS_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn api_key_falls_back_to_env() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n[catalog]\nbase_url = \"https://x.co\"\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("HAPPENINGS_API_KEY", "from-env");
        }
        let config = Config::load(&path)?;
        let key = config.catalog_api_key();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("HAPPENINGS_API_KEY");
        }
        assert_eq!(key.as_deref(), Some("from-env"));
        Ok(())
    }

    #[test]
    fn configured_api_key_wins_over_env() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n[catalog]\napi_key = \"from-config\"\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("HAPPENINGS_API_KEY", "from-env");
        }
        let config = Config::load(&path)?;
        let key = config.catalog_api_key();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("HAPPENINGS_API_KEY");
        }
        assert_eq!(key.as_deref(), Some("from-config"));
        Ok(())
    }

    #[test]
    fn calendar_path_uses_env_override_when_unset() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("HAPPENINGS_CALENDAR_PATH", "/from/env-only.db");
        }
        let config = Config::load(&path)?;
        let resolved = config.calendar_db_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("HAPPENINGS_CALENDAR_PATH");
        }
        assert_eq!(resolved, PathBuf::from("/from/env-only.db"));
        Ok(())
    }

    #[test]
    fn calendar_path_rejects_uri_style_value() -> Result<()> {
        let (_temp, path) =
            write_config("version = 1\n[calendar]\ndb_path = \"https://evil.example/cal.db\"\n")?;
        let error = Config::load(&path).expect_err("URI db_path should fail validation");
        assert!(error.to_string().contains("looks like a URI"));
        Ok(())
    }

    #[test]
    fn unknown_platform_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[calendar]\nplatform = \"android\"\n")?;
        let error = Config::load(&path).expect_err("unknown platform should fail");
        assert!(format!("{error:#}").contains("calendar.platform"));
        Ok(())
    }

    #[test]
    fn empty_table_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[catalog]\ntable = \"  \"\n")?;
        let error = Config::load(&path).expect_err("empty table should fail");
        assert!(error.to_string().contains("catalog.table"));
        Ok(())
    }

    #[test]
    fn timeout_parses_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        assert_eq!(parse_duration(" 15s ")?, Duration::from_secs(15));
        assert!(parse_duration("oops").is_err());
        assert!(parse_duration("5h").is_err());
        assert!(parse_duration("-5s").is_err());
        Ok(())
    }

    #[test]
    fn timeout_rejects_non_positive_values_in_config() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[catalog]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("must be positive"));
        Ok(())
    }

    #[test]
    fn bad_log_level_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[log]\nlevel = \"[[[\"\n")?;
        let error = Config::load(&path).expect_err("bad filter should fail");
        assert!(error.to_string().contains("log.level"));
        Ok(())
    }

    #[test]
    fn example_config_parses_back() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, Config::example_config(&path))?;
        let config = Config::load(&path)?;
        assert_eq!(config.catalog_table(), "events");
        assert_eq!(config.calendar_platform()?, Platform::LocalOnly);
        Ok(())
    }
}
