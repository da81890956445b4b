// Configuration loading and parsing (courtside.toml, credentials.toml).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Environment variable that overrides `catalog_api_key` from credentials.toml.
pub const API_KEY_ENV: &str = "COURTSIDE_CATALOG_API_KEY";

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

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub database: DatabaseConfig,
    pub persistence: PersistenceConfig,
    pub credentials: CredentialsConfig,
}

impl Config {
    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog.timeout_secs)
    }

    /// How often batched roster changes are flushed, or `None` when every
    /// mutation is saved immediately.
    pub fn flush_interval(&self) -> Option<Duration> {
        match self.persistence.save_policy {
            SavePolicy::Immediate => None,
            SavePolicy::Interval => Some(Duration::from_secs(self.persistence.interval_secs)),
        }
    }
}

// ---------------------------------------------------------------------------
// courtside.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire courtside.toml file.
#[derive(Debug, Clone, Deserialize)]
struct CourtsideFile {
    catalog: CatalogConfig,
    database: DatabaseConfig,
    #[serde(default)]
    persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub base_url: String,
    pub per_page: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// When roster snapshots are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavePolicy {
    /// After every successful mutation.
    Immediate,
    /// On a timer, only if something changed, and once more on shutdown.
    Interval,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    pub save_policy: SavePolicy,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        PersistenceConfig {
            save_policy: SavePolicy::Immediate,
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub catalog_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/courtside.toml` and
/// (optionally) `config/credentials.toml`, both relative to `base_dir`.
///
/// Does not copy defaults and ignores the environment; `load_config()` does
/// both.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- courtside.toml (required) ---
    let main_path = config_dir.join("courtside.toml");
    let main_text = read_file(&main_path)?;
    let file: CourtsideFile = toml::from_str(&main_text).map_err(|e| ConfigError::ParseError {
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

    let config = Config {
        catalog: file.catalog,
        database: file.database,
        persistence: file.persistence,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the crate root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        // create_new so user edits are never overwritten
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Load config relative to the current working directory, copying defaults
/// first and applying the `COURTSIDE_CATALOG_API_KEY` override.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    let config = load_config_from(&cwd)?;
    Ok(apply_api_key_override(config, std::env::var(API_KEY_ENV).ok()))
}

/// Replace the credentials-file key with `env_key` when it is set and
/// non-empty.
pub fn apply_api_key_override(mut config: Config, env_key: Option<String>) -> Config {
    if let Some(key) = env_key.filter(|k| !k.trim().is_empty()) {
        config.credentials.catalog_api_key = Some(key);
    }
    config
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.catalog.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "catalog.base_url".into(),
            message: "must not be empty".into(),
        });
    }

    let per_page = config.catalog.per_page;
    if !(1..=100).contains(&per_page) {
        return Err(ConfigError::ValidationError {
            field: "catalog.per_page".into(),
            message: format!("must be between 1 and 100 inclusive, got {per_page}"),
        });
    }

    if config.catalog.timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "catalog.timeout_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.database.path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "database.path".into(),
            message: "must not be empty".into(),
        });
    }

    if config.persistence.save_policy == SavePolicy::Interval
        && config.persistence.interval_secs == 0
    {
        return Err(ConfigError::ValidationError {
            field: "persistence.interval_secs".into(),
            message: "must be greater than 0 when save_policy is \"interval\"".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Helper: returns the path to the courtside-app crate root (works whether
    /// `cargo test` runs from the crate root or the workspace root).
    fn crate_root() -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        if cwd.join("defaults").exists() {
            cwd
        } else if cwd.join("crates/courtside-app/defaults").exists() {
            cwd.join("crates/courtside-app")
        } else {
            panic!("Cannot locate defaults/ directory from CWD {:?}", cwd);
        }
    }

    /// Helper: a scratch base dir with `defaults/` copied in and nothing in
    /// `config/` yet.
    fn scratch_with_defaults(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        for entry in fs::read_dir(crate_root().join("defaults")).unwrap() {
            let path = entry.unwrap().path();
            fs::copy(&path, tmp.join("defaults").join(path.file_name().unwrap())).unwrap();
        }
        tmp
    }

    /// Helper: a scratch base dir whose config/courtside.toml is `body`.
    fn scratch_with_main(name: &str, body: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config/courtside.toml"), body).unwrap();
        tmp
    }

    const VALID_MAIN: &str = r#"
[catalog]
base_url = "https://catalog.test/v1"
per_page = 25
timeout_secs = 5

[database]
path = "test.db"
"#;

    #[test]
    fn load_defaults_after_copy() {
        let tmp = scratch_with_defaults("courtside_config_defaults");

        let copied = ensure_config_files(&tmp).expect("should copy default configs");
        assert_eq!(copied, vec![tmp.join("config/courtside.toml")]);
        assert!(!tmp.join("config/credentials.toml.example").exists());

        let config = load_config_from(&tmp).expect("should load valid config");
        assert_eq!(config.catalog.base_url, "https://api.balldontlie.io/v1");
        assert_eq!(config.catalog.per_page, 10);
        assert_eq!(config.catalog.timeout_secs, 10);
        assert_eq!(config.database.path, "courtside.db");
        assert_eq!(config.persistence.save_policy, SavePolicy::Immediate);
        assert_eq!(config.flush_interval(), None);
        assert!(config.credentials.catalog_api_key.is_none());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_never_overwrites() {
        let tmp = scratch_with_defaults("courtside_config_no_overwrite");
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config/courtside.toml"), VALID_MAIN).unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert!(copied.is_empty());
        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.catalog.per_page, 25);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_defaults_and_config_is_an_error() {
        let tmp = std::env::temp_dir().join("courtside_config_nothing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        let err = ensure_config_files(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::DefaultsCopyError { .. }));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_main_file_is_file_not_found() {
        let tmp = std::env::temp_dir().join("courtside_config_missing_main");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        match load_config_from(&tmp).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with("courtside.toml")),
            other => panic!("expected FileNotFound, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn credentials_toml_with_api_key() {
        let tmp = scratch_with_main("courtside_config_with_creds", VALID_MAIN);
        fs::write(
            tmp.join("config/credentials.toml"),
            "catalog_api_key = \"test-key\"\n",
        )
        .unwrap();

        let config = load_config_from(&tmp).expect("should load with credentials.toml");
        assert_eq!(config.credentials.catalog_api_key.as_deref(), Some("test-key"));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn env_key_overrides_credentials_file() {
        let tmp = scratch_with_main("courtside_config_env_override", VALID_MAIN);
        fs::write(
            tmp.join("config/credentials.toml"),
            "catalog_api_key = \"from-file\"\n",
        )
        .unwrap();
        let config = load_config_from(&tmp).unwrap();

        let kept = apply_api_key_override(config.clone(), Some("  ".into()));
        assert_eq!(kept.credentials.catalog_api_key.as_deref(), Some("from-file"));

        let kept = apply_api_key_override(config.clone(), None);
        assert_eq!(kept.credentials.catalog_api_key.as_deref(), Some("from-file"));

        let replaced = apply_api_key_override(config, Some("from-env".into()));
        assert_eq!(
            replaced.credentials.catalog_api_key.as_deref(),
            Some("from-env")
        );

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn interval_policy_parses() {
        let body = format!(
            "{VALID_MAIN}\n[persistence]\nsave_policy = \"interval\"\ninterval_secs = 15\n"
        );
        let tmp = scratch_with_main("courtside_config_interval", &body);

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.persistence.save_policy, SavePolicy::Interval);
        assert_eq!(config.flush_interval(), Some(Duration::from_secs(15)));
        assert_eq!(config.catalog_timeout(), Duration::from_secs(5));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn unknown_save_policy_is_parse_error() {
        let body = format!("{VALID_MAIN}\n[persistence]\nsave_policy = \"sometimes\"\n");
        let tmp = scratch_with_main("courtside_config_bad_policy", &body);

        assert!(matches!(
            load_config_from(&tmp).unwrap_err(),
            ConfigError::ParseError { .. }
        ));

        let _ = fs::remove_dir_all(&tmp);
    }

    fn expect_validation_error(name: &str, body: &str, expected_field: &str) {
        let tmp = scratch_with_main(name, body);
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, expected_field),
            other => panic!("expected ValidationError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_per_page_zero() {
        expect_validation_error(
            "courtside_config_per_page_zero",
            &VALID_MAIN.replace("per_page = 25", "per_page = 0"),
            "catalog.per_page",
        );
    }

    #[test]
    fn rejects_per_page_over_limit() {
        expect_validation_error(
            "courtside_config_per_page_big",
            &VALID_MAIN.replace("per_page = 25", "per_page = 101"),
            "catalog.per_page",
        );
    }

    #[test]
    fn rejects_zero_timeout() {
        expect_validation_error(
            "courtside_config_zero_timeout",
            &VALID_MAIN.replace("timeout_secs = 5", "timeout_secs = 0"),
            "catalog.timeout_secs",
        );
    }

    #[test]
    fn rejects_blank_base_url() {
        expect_validation_error(
            "courtside_config_blank_url",
            &VALID_MAIN.replace("https://catalog.test/v1", " "),
            "catalog.base_url",
        );
    }

    #[test]
    fn rejects_zero_interval_when_batching() {
        expect_validation_error(
            "courtside_config_zero_interval",
            &format!("{VALID_MAIN}\n[persistence]\nsave_policy = \"interval\"\ninterval_secs = 0\n"),
            "persistence.interval_secs",
        );
    }

    #[test]
    fn zero_interval_is_fine_when_immediate() {
        let body =
            format!("{VALID_MAIN}\n[persistence]\nsave_policy = \"immediate\"\ninterval_secs = 0\n");
        let tmp = scratch_with_main("courtside_config_zero_interval_immediate", &body);
        assert!(load_config_from(&tmp).is_ok());
        let _ = fs::remove_dir_all(&tmp);
    }
}
