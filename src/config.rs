use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{drive::DEFAULT_DRIVE_BASE_URL, store::StoreBackend};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/video-cache-env";
pub const DEFAULT_CACHE_DIR: &str = "static/videos";
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";
pub const DEFAULT_LISTEN_PORT: u16 = 5000;
pub const DEFAULT_MAX_DOWNLOAD_MB: u64 = 500;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;

const KNOWN_KEYS: [&str; 8] = [
    "CACHE_DIR",
    "LISTEN_HOST",
    "LISTEN_PORT",
    "MAX_DOWNLOAD_MB",
    "CONNECT_TIMEOUT_SECS",
    "READ_TIMEOUT_SECS",
    "DRIVE_BASE_URL",
    "STORE_BACKEND",
];

/// Raw values as found in the env file, before defaults are applied.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub cache_dir: Option<PathBuf>,
    pub listen_host: Option<String>,
    pub listen_port: Option<u16>,
    pub max_download_mb: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    pub drive_base_url: Option<String>,
    pub store_backend: Option<StoreBackend>,
}

/// Values supplied on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub cache_dir: Option<PathBuf>,
    pub listen_host: Option<String>,
    pub listen_port: Option<u16>,
}

/// Fully resolved settings for one server process.
#[derive(Debug, Clone)]
pub struct Settings {
    pub cache_dir: PathBuf,
    pub listen_host: String,
    pub listen_port: u16,
    pub max_download_bytes: u64,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub drive_base_url: String,
    pub store_backend: StoreBackend,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            listen_host: DEFAULT_LISTEN_HOST.to_string(),
            listen_port: DEFAULT_LISTEN_PORT,
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_MB * 1024 * 1024,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            drive_base_url: DEFAULT_DRIVE_BASE_URL.to_string(),
            store_backend: StoreBackend::default(),
        }
    }
}

/// Parses `KEY="value"` lines. Blank lines and `#` comments are skipped,
/// unknown keys are ignored.
pub fn parse_env_vars(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value_raw)) = trimmed.split_once('=') {
            let value = value_raw.trim().trim_matches('"');
            vars.insert(key.trim().to_string(), value.to_string());
        }
    }
    vars
}

/// Builds an [`EnvConfig`] from key/value pairs, validating every value.
/// `origin` names where the values came from for error messages.
pub fn env_config_from_vars(vars: &HashMap<String, String>, origin: &str) -> Result<EnvConfig> {
    let mut cfg = EnvConfig::default();
    for (key, value) in vars {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.as_str() {
            "CACHE_DIR" => cfg.cache_dir = Some(PathBuf::from(value)),
            "LISTEN_HOST" => cfg.listen_host = Some(value.to_string()),
            "LISTEN_PORT" => {
                let port: u16 = value
                    .parse()
                    .with_context(|| format!("Parsing LISTEN_PORT from {origin}"))?;
                cfg.listen_port = Some(port);
            }
            "MAX_DOWNLOAD_MB" => {
                cfg.max_download_mb = Some(parse_positive(value, key, origin)?);
            }
            "CONNECT_TIMEOUT_SECS" => {
                cfg.connect_timeout_secs = Some(parse_positive(value, key, origin)?);
            }
            "READ_TIMEOUT_SECS" => {
                cfg.read_timeout_secs = Some(parse_positive(value, key, origin)?);
            }
            "DRIVE_BASE_URL" => cfg.drive_base_url = Some(value.to_string()),
            "STORE_BACKEND" => {
                let backend = StoreBackend::parse(value)
                    .with_context(|| format!("Parsing STORE_BACKEND from {origin}"))?;
                cfg.store_backend = Some(backend);
            }
            _ => {}
        }
    }
    Ok(cfg)
}

fn parse_positive(value: &str, key: &str, origin: &str) -> Result<u64> {
    let parsed: u64 = value
        .parse()
        .with_context(|| format!("Parsing {key} from {origin}"))?;
    if parsed == 0 {
        return Err(anyhow!("{key} in {origin} must be greater than zero"));
    }
    Ok(parsed)
}

pub fn read_env_config(path: &Path) -> Result<Option<EnvConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let vars = parse_env_vars(&content);
    env_config_from_vars(&vars, &path.display().to_string()).map(Some)
}

/// Known keys currently set in the process environment.
pub fn process_env_vars() -> HashMap<String, String> {
    KNOWN_KEYS
        .iter()
        .filter_map(|key| {
            std::env::var(key)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(|value| (key.to_string(), value))
        })
        .collect()
}

/// Layers the config file, then the environment, then CLI overrides on top
/// of the built-in defaults.
pub fn resolve_settings(
    file: Option<EnvConfig>,
    env: EnvConfig,
    overrides: Overrides,
) -> Settings {
    let defaults = Settings::default();
    let file = file.unwrap_or_default();

    let max_mb = env.max_download_mb.or(file.max_download_mb);
    let connect = env.connect_timeout_secs.or(file.connect_timeout_secs);
    let read = env.read_timeout_secs.or(file.read_timeout_secs);

    Settings {
        cache_dir: overrides
            .cache_dir
            .or(env.cache_dir)
            .or(file.cache_dir)
            .unwrap_or(defaults.cache_dir),
        listen_host: overrides
            .listen_host
            .or(env.listen_host)
            .or(file.listen_host)
            .unwrap_or(defaults.listen_host),
        listen_port: overrides
            .listen_port
            .or(env.listen_port)
            .or(file.listen_port)
            .unwrap_or(defaults.listen_port),
        max_download_bytes: max_mb
            .map(|mb| mb * 1024 * 1024)
            .unwrap_or(defaults.max_download_bytes),
        connect_timeout: connect
            .map(Duration::from_secs)
            .unwrap_or(defaults.connect_timeout),
        read_timeout: read.map(Duration::from_secs).unwrap_or(defaults.read_timeout),
        drive_base_url: env
            .drive_base_url
            .or(file.drive_base_url)
            .unwrap_or(defaults.drive_base_url),
        store_backend: env
            .store_backend
            .or(file.store_backend)
            .unwrap_or(defaults.store_backend),
    }
}

pub fn load_settings(config_path: &Path, overrides: Overrides) -> Result<Settings> {
    let file = read_env_config(config_path)?;
    let env = env_config_from_vars(&process_env_vars(), "the environment")?;
    Ok(resolve_settings(file, env, overrides))
}
