use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Layered configuration: defaults, then an optional `greencart.toml`,
/// then `GREENCART_*` environment variables, then programmatic overrides.
/// Validation runs once on the final merged value.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub catalog: CatalogConfig,
    pub matching: MatchingConfig,
    pub dialogue: DialogueConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub freshness_secs: u64,
    /// Optional on-disk copy of the bundled dataset; the embedded copy is
    /// used when absent or unreadable.
    pub bundled_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct MatchingConfig {
    pub fuzzy_threshold: u8,
    pub top_n: usize,
}

#[derive(Clone, Debug)]
pub struct DialogueConfig {
    pub pending_expiry_secs: u64,
    pub coupon_codes: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub backend_base_url: Option<String>,
    pub log_level: Option<String>,
    pub fuzzy_threshold: Option<u8>,
    pub pending_expiry_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                base_url: "http://localhost:8000".to_string(),
                timeout_secs: 6,
            },
            catalog: CatalogConfig { freshness_secs: 60, bundled_path: None },
            matching: MatchingConfig {
                fuzzy_threshold: crate::fuzzy::DEFAULT_THRESHOLD,
                top_n: crate::recommend::DEFAULT_TOP_N,
            },
            dialogue: DialogueConfig {
                pending_expiry_secs: 300,
                coupon_codes: vec![
                    "SAVE15".to_string(),
                    "ECO10".to_string(),
                    "GREEN5".to_string(),
                ],
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("greencart.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(backend) = patch.backend {
            if let Some(base_url) = backend.base_url {
                self.backend.base_url = base_url;
            }
            if let Some(timeout_secs) = backend.timeout_secs {
                self.backend.timeout_secs = timeout_secs;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(freshness_secs) = catalog.freshness_secs {
                self.catalog.freshness_secs = freshness_secs;
            }
            if let Some(bundled_path) = catalog.bundled_path {
                self.catalog.bundled_path = Some(bundled_path);
            }
        }

        if let Some(matching) = patch.matching {
            if let Some(fuzzy_threshold) = matching.fuzzy_threshold {
                self.matching.fuzzy_threshold = fuzzy_threshold;
            }
            if let Some(top_n) = matching.top_n {
                self.matching.top_n = top_n;
            }
        }

        if let Some(dialogue) = patch.dialogue {
            if let Some(pending_expiry_secs) = dialogue.pending_expiry_secs {
                self.dialogue.pending_expiry_secs = pending_expiry_secs;
            }
            if let Some(coupon_codes) = dialogue.coupon_codes {
                self.dialogue.coupon_codes = coupon_codes;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("GREENCART_BACKEND_BASE_URL") {
            self.backend.base_url = value;
        }
        if let Some(value) = read_env("GREENCART_BACKEND_TIMEOUT_SECS") {
            self.backend.timeout_secs = parse_u64("GREENCART_BACKEND_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GREENCART_CATALOG_FRESHNESS_SECS") {
            self.catalog.freshness_secs = parse_u64("GREENCART_CATALOG_FRESHNESS_SECS", &value)?;
        }
        if let Some(value) = read_env("GREENCART_CATALOG_BUNDLED_PATH") {
            self.catalog.bundled_path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("GREENCART_MATCHING_FUZZY_THRESHOLD") {
            self.matching.fuzzy_threshold =
                parse_u8("GREENCART_MATCHING_FUZZY_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("GREENCART_MATCHING_TOP_N") {
            self.matching.top_n = parse_u64("GREENCART_MATCHING_TOP_N", &value)? as usize;
        }

        if let Some(value) = read_env("GREENCART_DIALOGUE_PENDING_EXPIRY_SECS") {
            self.dialogue.pending_expiry_secs =
                parse_u64("GREENCART_DIALOGUE_PENDING_EXPIRY_SECS", &value)?;
        }
        if let Some(value) = read_env("GREENCART_DIALOGUE_COUPON_CODES") {
            self.dialogue.coupon_codes = value
                .split(',')
                .map(|code| code.trim().to_uppercase())
                .filter(|code| !code.is_empty())
                .collect();
        }

        if let Some(value) = read_env("GREENCART_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("GREENCART_SERVER_PORT") {
            self.server.port = parse_u16("GREENCART_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("GREENCART_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("GREENCART_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("GREENCART_LOGGING_LEVEL").or_else(|| read_env("GREENCART_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("GREENCART_LOGGING_FORMAT").or_else(|| read_env("GREENCART_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(backend_base_url) = overrides.backend_base_url {
            self.backend.base_url = backend_base_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(fuzzy_threshold) = overrides.fuzzy_threshold {
            self.matching.fuzzy_threshold = fuzzy_threshold;
        }
        if let Some(pending_expiry_secs) = overrides.pending_expiry_secs {
            self.dialogue.pending_expiry_secs = pending_expiry_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_backend(&self.backend)?;
        validate_catalog(&self.catalog)?;
        validate_matching(&self.matching)?;
        validate_dialogue(&self.dialogue)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("greencart.toml"), PathBuf::from("config/greencart.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_backend(backend: &BackendConfig) -> Result<(), ConfigError> {
    let url = backend.base_url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "backend.base_url must start with http:// or https://".to_string(),
        ));
    }

    if backend.timeout_secs == 0 || backend.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "backend.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if catalog.freshness_secs == 0 {
        return Err(ConfigError::Validation(
            "catalog.freshness_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_matching(matching: &MatchingConfig) -> Result<(), ConfigError> {
    if matching.fuzzy_threshold == 0 || matching.fuzzy_threshold > 100 {
        return Err(ConfigError::Validation(
            "matching.fuzzy_threshold must be in range 1..=100".to_string(),
        ));
    }

    if matching.top_n == 0 {
        return Err(ConfigError::Validation(
            "matching.top_n must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_dialogue(dialogue: &DialogueConfig) -> Result<(), ConfigError> {
    if dialogue.pending_expiry_secs == 0 {
        return Err(ConfigError::Validation(
            "dialogue.pending_expiry_secs must be greater than zero".to_string(),
        ));
    }

    if dialogue.coupon_codes.is_empty() {
        return Err(ConfigError::Validation(
            "dialogue.coupon_codes must list at least one accepted code".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u8(key: &str, value: &str) -> Result<u8, ConfigError> {
    value.parse::<u8>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    backend: Option<BackendPatch>,
    catalog: Option<CatalogPatch>,
    matching: Option<MatchingPatch>,
    dialogue: Option<DialoguePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct BackendPatch {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    freshness_secs: Option<u64>,
    bundled_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct MatchingPatch {
    fuzzy_threshold: Option<u8>,
    top_n: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct DialoguePatch {
    pending_expiry_secs: Option<u64>,
    coupon_codes: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_on_their_own() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.matching.fuzzy_threshold == 60, "default fuzzy threshold should be 60")?;
        ensure(config.matching.top_n == 3, "default top_n should be 3")?;
        ensure(
            config.dialogue.coupon_codes == ["SAVE15", "ECO10", "GREEN5"],
            "default coupon codes should be present",
        )?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_BACKEND_BASE_URL", "http://backend.test:9000");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("greencart.toml");
            fs::write(
                &path,
                r#"
[backend]
base_url = "${TEST_BACKEND_BASE_URL}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.backend.base_url == "http://backend.test:9000",
                "backend base url should be loaded from environment",
            )
        })();

        clear_vars(&["TEST_BACKEND_BASE_URL"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("GREENCART_BACKEND_BASE_URL", "http://from-env:8000");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("greencart.toml");
            fs::write(
                &path,
                r#"
[backend]
base_url = "http://from-file:8000"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.backend.base_url == "http://from-env:8000",
                "env backend url should win over file and defaults",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should win")
        })();

        clear_vars(&["GREENCART_BACKEND_BASE_URL"]);
        result
    }

    #[test]
    fn coupon_codes_env_override_is_split_and_uppercased() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("GREENCART_DIALOGUE_COUPON_CODES", "eco20, save5");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(
                config.dialogue.coupon_codes == ["ECO20", "SAVE5"],
                "coupon codes should be split on commas and uppercased",
            )
        })();

        clear_vars(&["GREENCART_DIALOGUE_COUPON_CODES"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("GREENCART_BACKEND_BASE_URL", "ftp://not-http");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("backend.base_url")
            );
            ensure(has_message, "validation failure should mention backend.base_url")
        })();

        clear_vars(&["GREENCART_BACKEND_BASE_URL"]);
        result
    }

    #[test]
    fn zero_backend_timeout_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("GREENCART_BACKEND_TIMEOUT_SECS", "0");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("backend.timeout_secs")
            );
            ensure(has_message, "validation failure should mention backend.timeout_secs")
        })();

        clear_vars(&["GREENCART_BACKEND_TIMEOUT_SECS"]);
        result
    }

    #[test]
    fn out_of_range_fuzzy_threshold_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = match AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                fuzzy_threshold: Some(101),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }) {
            Ok(_) => {
                return Err("expected validation failure but config load succeeded".to_string())
            }
            Err(error) => error,
        };

        ensure(
            matches!(
                error,
                ConfigError::Validation(ref message)
                    if message.contains("matching.fuzzy_threshold")
            ),
            "validation failure should mention matching.fuzzy_threshold",
        )
    }

    #[test]
    fn missing_required_file_is_an_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let missing = std::path::PathBuf::from("/nonexistent/greencart.toml");
        let error = match AppConfig::load(LoadOptions {
            config_path: Some(missing.clone()),
            require_file: true,
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected missing-file failure".to_string()),
            Err(error) => error,
        };

        ensure(
            matches!(error, ConfigError::MissingConfigFile(ref path) if *path == missing),
            "error should name the missing config file",
        )
    }
}
