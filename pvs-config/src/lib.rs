//! Environment-variable configuration for the preview service.
//!
//! Mirrors the `ferrex-config` / `ferrex-server::infra::config::loader`
//! split: gather raw env strings, parse and validate them, and produce one
//! immutable [`Config`] value (or a [`ConfigError`] naming exactly which
//! variable was bad).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

mod plugin;
pub use plugin::PluginSpec;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be an integer: {value}")]
    InvalidInt { name: &'static str, value: String },
    #[error("{name} must be a duration (e.g. \"12\", \"12s\", \"5m\"): {value}")]
    InvalidDuration { name: &'static str, value: String },
    #[error("invalid plugin spec: {0}")]
    InvalidPlugin(String),
}

/// Any value besides the documented "falsey" strings is true.
///
/// Mirrors the original service's `boolean()` helper: empty/absent is
/// false; `0`, `off`, `no`, `false`, `none` (case-insensitive) are false;
/// everything else is true.
pub fn boolean(raw: Option<&str>) -> bool {
    match raw {
        None => false,
        Some(s) if s.is_empty() => false,
        Some(s) => !matches!(
            s.to_ascii_lowercase().as_str(),
            "0" | "off" | "no" | "false" | "none"
        ),
    }
}

/// Parses a bare integer (seconds) or a `humantime`-style suffixed
/// duration ("12s", "5m", "2h", "1d"). Returns `None` for an absent/empty
/// input.
pub fn interval(name: &'static str, raw: Option<&str>) -> Result<Option<Duration>, ConfigError> {
    let raw = match raw {
        Some(s) if !s.is_empty() => s,
        _ => return Ok(None),
    };

    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Some(Duration::from_secs(secs)));
    }

    humantime::parse_duration(raw)
        .map(Some)
        .map_err(|_| ConfigError::InvalidDuration { name, value: raw.to_string() })
}

fn parse_int<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match raw {
        None => Ok(default),
        Some(s) => s
            .parse()
            .map_err(|_| ConfigError::InvalidInt { name, value: s }),
    }
}

/// Process-wide, read-only configuration. Built once at startup; nothing
/// mutates it afterwards (spec §9 "Global state").
#[derive(Debug, Clone)]
pub struct Config {
    pub files_root: PathBuf,
    pub store_root: Option<PathBuf>,

    pub default_format: String,
    pub default_width: u32,
    pub default_height: u32,
    pub max_width: u32,
    pub max_height: u32,

    pub max_file_size: u64,
    pub max_pages: u32,

    pub cache_control: Option<Duration>,
    pub x_accel_redirect: Option<String>,

    pub soffice_addr: String,
    pub soffice_port: u16,
    pub soffice_timeout: Duration,
    pub soffice_retry: u32,
    pub max_office_workers: usize,

    pub cleanup_max_size: Option<u64>,
    pub cleanup_interval: Duration,
    pub store_max_age: Option<Duration>,

    pub metrics_enabled: bool,

    pub icons_root: Option<PathBuf>,
    pub icon_redirect: Option<String>,
    pub icon_resize: bool,

    pub plugins: Vec<PluginSpec>,

    pub host: String,
    pub port: u16,
}

impl Config {
    /// Loads configuration from the process environment (and, if present,
    /// a `.env` file), mirroring `ferrex_config`'s `ConfigLoader::load`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_env_map(|key| std::env::var(key).ok())
    }

    /// Testable variant: takes a lookup function instead of reading the
    /// real environment.
    pub fn from_env_map(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let files_root = get("PVS_FILES")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/mnt/files"));
        let store_root = get("PVS_STORE").map(PathBuf::from);

        let default_format = get("PVS_DEFAULT_FORMAT").unwrap_or_else(|| "image".to_string());
        let default_width = parse_int("PVS_DEFAULT_WIDTH", get("PVS_DEFAULT_WIDTH"), 320u32)?;
        let default_height = parse_int("PVS_DEFAULT_HEIGHT", get("PVS_DEFAULT_HEIGHT"), 240u32)?;
        let max_width = parse_int("PVS_MAX_WIDTH", get("PVS_MAX_WIDTH"), 800u32)?;
        let max_height = parse_int("PVS_MAX_HEIGHT", get("PVS_MAX_HEIGHT"), 600u32)?;

        let max_file_size = parse_int("PVS_MAX_FILE_SIZE", get("PVS_MAX_FILE_SIZE"), 0u64)?;
        let max_pages = parse_int("PVS_MAX_PAGES", get("PVS_MAX_PAGES"), 0u32)?;

        let cache_control_raw = get("PVS_CACHE_CONTROL");
        let cache_control = match interval("PVS_CACHE_CONTROL", cache_control_raw.as_deref())? {
            // PVS_CACHE_CONTROL is documented in minutes when given as a
            // bare integer (spec.md §6); humantime suffixes are taken
            // literally.
            Some(d) if cache_control_raw.as_deref().map(|s| s.parse::<u64>().is_ok()).unwrap_or(false) => {
                Some(d * 60)
            }
            other => other,
        };
        let x_accel_redirect = get("PVS_X_ACCEL_REDIRECT");

        let soffice_addr = get("PVS_SOFFICE_ADDR").unwrap_or_else(|| "127.0.0.1".to_string());
        let soffice_port = parse_int("PVS_SOFFICE_PORT", get("PVS_SOFFICE_PORT"), 2002u16)?;
        let soffice_timeout = interval("PVS_SOFFICE_TIMEOUT", get("PVS_SOFFICE_TIMEOUT").as_deref())?
            .unwrap_or(Duration::from_secs(12));
        let soffice_retry = parse_int("PVS_SOFFICE_RETRY", get("PVS_SOFFICE_RETRY"), 3u32)?;
        let max_office_workers =
            parse_int("PVS_MAX_OFFICE_WORKERS", get("PVS_MAX_OFFICE_WORKERS"), 0usize)?;

        let cleanup_max_size = match get("PVS_CLEANUP_MAX_SIZE") {
            None => None,
            Some(s) => Some(
                s.parse::<u64>()
                    .map_err(|_| ConfigError::InvalidInt { name: "PVS_CLEANUP_MAX_SIZE", value: s })?,
            ),
        };
        let cleanup_interval = interval("PVS_CLEANUP_INTERVAL", get("PVS_CLEANUP_INTERVAL").as_deref())?
            .unwrap_or(Duration::from_secs(60));
        let store_max_age = interval("PVS_STORE_MAX_AGE", get("PVS_STORE_MAX_AGE").as_deref())?;

        let metrics_enabled = boolean(get("PVS_METRICS").as_deref());

        let icons_root = get("PVS_ICONS").map(PathBuf::from);
        let icon_redirect = get("PVS_ICON_REDIRECT");
        let icon_resize = boolean(get("PVS_ICON_RESIZE").as_deref());

        let plugins = plugin::parse_plugins(get("PVS_PLUGINS").unwrap_or_default().as_str())?;

        let host = get("PVS_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_int("PVS_PORT", get("PVS_PORT"), 3000u16)?;

        Ok(Config {
            files_root,
            store_root,
            default_format,
            default_width,
            default_height,
            max_width,
            max_height,
            max_file_size,
            max_pages,
            cache_control,
            x_accel_redirect,
            soffice_addr,
            soffice_port,
            soffice_timeout,
            soffice_retry,
            max_office_workers,
            cleanup_max_size,
            cleanup_interval,
            store_max_age,
            metrics_enabled,
            icons_root,
            icon_redirect,
            icon_resize,
            plugins,
            host,
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_matches_falsey_table() {
        assert!(!boolean(None));
        assert!(!boolean(Some("")));
        for f in ["0", "off", "no", "false", "none", "OFF", "False"] {
            assert!(!boolean(Some(f)), "{f} should be falsey");
        }
        for t in ["1", "yes", "true", "on", "anything"] {
            assert!(boolean(Some(t)), "{t} should be truthy");
        }
    }

    #[test]
    fn interval_accepts_bare_seconds_and_suffixed() {
        assert_eq!(
            interval("X", Some("30")).unwrap(),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            interval("X", Some("2m")).unwrap(),
            Some(Duration::from_secs(120))
        );
        assert_eq!(interval("X", None).unwrap(), None);
        assert!(interval("X", Some("not-a-duration")).is_err());
    }

    #[test]
    fn cache_control_bare_int_is_minutes() {
        let cfg = Config::from_env_map(|key| match key {
            "PVS_CACHE_CONTROL" => Some("5".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.cache_control, Some(Duration::from_secs(300)));
    }

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::from_env_map(|_| None).unwrap();
        assert_eq!(cfg.files_root, PathBuf::from("/mnt/files"));
        assert_eq!(cfg.default_format, "image");
        assert_eq!(cfg.max_width, 800);
        assert_eq!(cfg.max_height, 600);
        assert_eq!(cfg.max_file_size, 0);
        assert_eq!(cfg.max_pages, 0);
        assert!(cfg.store_root.is_none());
        assert!(!cfg.metrics_enabled);
    }
}
