// Configuration loading and parsing (propline.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::RetryPolicy;
use crate::model::League;
use crate::reconcile::FeedSettings;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("no defaults/ or config/ directory under {base}; start propline from its install directory")]
    NoConfigSource { base: PathBuf },

    #[error("could not seed config from defaults ({path}): {source}")]
    Seed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("missing credential `{name}` in config/credentials.toml")]
    MissingCredential { name: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub upstream: UpstreamConfig,
    /// Parsed from `upstream.leagues`, in file order.
    pub leagues: Vec<League>,
    pub reconcile: ReconcileConfig,
    pub analytics: AnalyticsConfig,
    pub health: HealthConfig,
    pub data_paths: DataPaths,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// propline.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire propline.toml file.
#[derive(Debug, Clone, Deserialize)]
struct PropLineFile {
    database: DatabaseSection,
    upstream: UpstreamConfig,
    #[serde(default)]
    reconcile: ReconcileConfig,
    #[serde(default)]
    analytics: AnalyticsSection,
    #[serde(default)]
    health: HealthConfig,
    data: DataPaths,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub odds_base_url: String,
    pub game_log_base_url: String,
    pub leagues: Vec<String>,
    pub season: String,
    pub page_delay_ms: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub max_pages: usize,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    pub sub_batch_size: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { sub_batch_size: 50 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AnalyticsSection {
    #[serde(default)]
    windows: Option<Vec<usize>>,
    #[serde(default)]
    season: Option<String>,
}

/// Analytics settings. `season` falls back to `upstream.season`.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    pub windows: Vec<usize>,
    pub season: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    pub stale_after_days: i64,
    pub sample_limit: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            stale_after_days: 3,
            sample_limit: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub prop_type_aliases: String,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub odds_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Derived settings
// ---------------------------------------------------------------------------

impl Config {
    /// The upstream API key. Only needed once a live feed is built, so its
    /// absence is reported here rather than at load time.
    pub fn odds_api_key(&self) -> Result<&str, ConfigError> {
        self.credentials
            .odds_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingCredential {
                name: "odds_api_key".into(),
            })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.upstream.max_retries,
            backoff_base: Duration::from_millis(self.upstream.backoff_base_ms),
            backoff_max: Duration::from_millis(self.upstream.backoff_max_ms),
        }
    }

    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            retry: self.retry_policy(),
            page_delay: Duration::from_millis(self.upstream.page_delay_ms),
            max_pages: self.upstream.max_pages,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.request_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/propline.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// Nothing is seeded here; `load_config()` handles that.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- propline.toml (required) ---
    let main_path = config_dir.join("propline.toml");
    let main_text = read_file(&main_path)?;
    let file: PropLineFile = toml::from_str(&main_text).map_err(|e| ConfigError::ParseError {
        path: main_path.clone(),
        source: e,
    })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let leagues = parse_leagues(&file.upstream.leagues)?;
    let analytics = AnalyticsConfig {
        windows: file.analytics.windows.unwrap_or_else(|| vec![5, 10, 20]),
        season: file
            .analytics
            .season
            .unwrap_or_else(|| file.upstream.season.clone()),
    };

    let config = Config {
        db_path: file.database.path,
        upstream: file.upstream,
        leagues,
        reconcile: file.reconcile,
        analytics,
        health: file.health,
        data_paths: file.data,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Seed `config/` from the shipped `defaults/` directory.
///
/// Only files missing from `config/` are written; `*.example` templates stay
/// behind because they hold placeholder secrets. Returns the seeded paths.
pub fn seed_config_dir(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let shipped = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !shipped.is_dir() {
        // An installed copy may carry config/ alone.
        return if config_dir.is_dir() {
            Ok(Vec::new())
        } else {
            Err(ConfigError::NoConfigSource {
                base: base_dir.to_path_buf(),
            })
        };
    }

    std::fs::create_dir_all(&config_dir).map_err(|source| ConfigError::Seed {
        path: config_dir.clone(),
        source,
    })?;
    let listing = std::fs::read_dir(&shipped).map_err(|source| ConfigError::Seed {
        path: shipped.clone(),
        source,
    })?;

    let mut seeded = Vec::new();
    for entry in listing {
        let from = entry
            .map_err(|source| ConfigError::Seed {
                path: shipped.clone(),
                source,
            })?
            .path();
        let Some(name) = from.file_name().filter(|_| from.is_file()) else {
            continue;
        };
        if Path::new(name).extension().is_some_and(|ext| ext == "example") {
            continue;
        }
        let to = config_dir.join(name);
        if copy_if_absent(&from, &to)? {
            seeded.push(to);
        }
    }
    Ok(seeded)
}

/// Copy `from` to `to` unless `to` already exists. `create_new` keeps a
/// concurrent first start from clobbering a file written in between.
fn copy_if_absent(from: &Path, to: &Path) -> Result<bool, ConfigError> {
    use std::io::Write;

    let seed_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| ConfigError::Seed { path, source }
    };
    let mut dest = match std::fs::OpenOptions::new().write(true).create_new(true).open(to) {
        Ok(dest) => dest,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(seed_err(to)(e)),
    };
    let bytes = std::fs::read(from).map_err(seed_err(from))?;
    dest.write_all(&bytes).map_err(seed_err(to))?;
    Ok(true)
}

/// Seed defaults under the working directory, then load from there.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    seed_config_dir(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn parse_leagues(codes: &[String]) -> Result<Vec<League>, ConfigError> {
    let mut leagues = Vec::with_capacity(codes.len());
    for code in codes {
        let league: League = code.parse().map_err(|e: crate::model::UnknownLeague| ConfigError::ValidationError {
            field: "upstream.leagues".into(),
            message: e.to_string(),
        })?;
        if !leagues.contains(&league) {
            leagues.push(league);
        }
    }
    Ok(leagues)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.db_path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "database.path".into(),
            message: "must not be empty".into(),
        });
    }

    if config.leagues.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "upstream.leagues".into(),
            message: "must list at least one league".into(),
        });
    }

    if config.upstream.season.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "upstream.season".into(),
            message: "must not be empty".into(),
        });
    }

    let up = &config.upstream;
    let positive: &[(&str, u64)] = &[
        ("upstream.max_retries", up.max_retries as u64),
        ("upstream.max_pages", up.max_pages as u64),
        ("upstream.request_timeout_secs", up.request_timeout_secs),
        ("reconcile.sub_batch_size", config.reconcile.sub_batch_size as u64),
        ("health.sample_limit", config.health.sample_limit as u64),
    ];
    for (name, val) in positive {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be > 0".into(),
            });
        }
    }

    if up.backoff_base_ms > up.backoff_max_ms {
        return Err(ConfigError::ValidationError {
            field: "upstream.backoff_base_ms".into(),
            message: format!(
                "must be <= backoff_max_ms ({}), got {}",
                up.backoff_max_ms, up.backoff_base_ms
            ),
        });
    }

    if config.analytics.windows.iter().any(|w| *w == 0) {
        return Err(ConfigError::ValidationError {
            field: "analytics.windows".into(),
            message: "every window must be > 0".into(),
        });
    }

    if config.health.stale_after_days <= 0 {
        return Err(ConfigError::ValidationError {
            field: "health.stale_after_days".into(),
            message: format!("must be > 0, got {}", config.health.stale_after_days),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
