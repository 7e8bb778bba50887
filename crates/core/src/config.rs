use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub chat: ChatConfig,
    pub calculation: CalculationConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub bot_token: SecretString,
}

/// Process-wide calculation constants. Loaded once at startup and never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct CalculationConfig {
    pub hours_per_fte: f64,
    pub cost_per_fte: f64,
    pub currency: String,
    pub year_range_min: i32,
    pub year_range_max: i32,
    pub month_names: Vec<String>,
}

impl Default for CalculationConfig {
    fn default() -> Self {
        Self {
            hours_per_fte: 168.0,
            cost_per_fte: 350_000.0,
            currency: "KZT".to_string(),
            year_range_min: 2020,
            year_range_max: 2030,
            month_names: DEFAULT_MONTH_NAMES.iter().map(|name| name.to_string()).collect(),
        }
    }
}

impl CalculationConfig {
    pub fn year_in_range(&self, year: i32) -> bool {
        (self.year_range_min..=self.year_range_max).contains(&year)
    }

    /// Display name for a 1-based month number.
    pub fn month_name(&self, month: u32) -> Option<&str> {
        let index = usize::try_from(month).ok()?.checked_sub(1)?;
        self.month_names.get(index).map(String::as_str)
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
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
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub bot_token: Option<String>,
    pub hours_per_fte: Option<f64>,
    pub cost_per_fte: Option<f64>,
    pub year_range_min: Option<i32>,
    pub year_range_max: Option<i32>,
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
            database: DatabaseConfig {
                url: "sqlite://merchhours.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            chat: ChatConfig { bot_token: String::new().into() },
            calculation: CalculationConfig::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
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
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("merchhours.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(chat) = patch.chat {
            if let Some(bot_token) = chat.bot_token {
                self.chat.bot_token = bot_token.into();
            }
        }

        if let Some(calculation) = patch.calculation {
            if let Some(hours_per_fte) = calculation.hours_per_fte {
                self.calculation.hours_per_fte = hours_per_fte;
            }
            if let Some(cost_per_fte) = calculation.cost_per_fte {
                self.calculation.cost_per_fte = cost_per_fte;
            }
            if let Some(currency) = calculation.currency {
                self.calculation.currency = currency;
            }
            if let Some(year_range_min) = calculation.year_range_min {
                self.calculation.year_range_min = year_range_min;
            }
            if let Some(year_range_max) = calculation.year_range_max {
                self.calculation.year_range_max = year_range_max;
            }
            if let Some(month_names) = calculation.month_names {
                self.calculation.month_names = month_names;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
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
        if let Some(value) = read_env("MERCHHOURS_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("MERCHHOURS_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("MERCHHOURS_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("MERCHHOURS_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("MERCHHOURS_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let bot_token = read_env("MERCHHOURS_CHAT_BOT_TOKEN").or_else(|| read_env("BOT_TOKEN"));
        if let Some(value) = bot_token {
            self.chat.bot_token = value.into();
        }

        if let Some(value) = read_env("MERCHHOURS_CALCULATION_HOURS_PER_FTE") {
            self.calculation.hours_per_fte =
                parse_env("MERCHHOURS_CALCULATION_HOURS_PER_FTE", &value)?;
        }
        if let Some(value) = read_env("MERCHHOURS_CALCULATION_COST_PER_FTE") {
            self.calculation.cost_per_fte =
                parse_env("MERCHHOURS_CALCULATION_COST_PER_FTE", &value)?;
        }
        if let Some(value) = read_env("MERCHHOURS_CALCULATION_CURRENCY") {
            self.calculation.currency = value;
        }
        if let Some(value) = read_env("MERCHHOURS_CALCULATION_YEAR_RANGE_MIN") {
            self.calculation.year_range_min =
                parse_env("MERCHHOURS_CALCULATION_YEAR_RANGE_MIN", &value)?;
        }
        if let Some(value) = read_env("MERCHHOURS_CALCULATION_YEAR_RANGE_MAX") {
            self.calculation.year_range_max =
                parse_env("MERCHHOURS_CALCULATION_YEAR_RANGE_MAX", &value)?;
        }

        if let Some(value) = read_env("MERCHHOURS_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("MERCHHOURS_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_env("MERCHHOURS_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("MERCHHOURS_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("MERCHHOURS_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("MERCHHOURS_LOGGING_LEVEL").or_else(|| read_env("MERCHHOURS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("MERCHHOURS_LOGGING_FORMAT").or_else(|| read_env("MERCHHOURS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.bot_token {
            self.chat.bot_token = bot_token.into();
        }
        if let Some(hours_per_fte) = overrides.hours_per_fte {
            self.calculation.hours_per_fte = hours_per_fte;
        }
        if let Some(cost_per_fte) = overrides.cost_per_fte {
            self.calculation.cost_per_fte = cost_per_fte;
        }
        if let Some(year_range_min) = overrides.year_range_min {
            self.calculation.year_range_min = year_range_min;
        }
        if let Some(year_range_max) = overrides.year_range_max {
            self.calculation.year_range_max = year_range_max;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_chat(&self.chat)?;
        validate_calculation(&self.calculation)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("merchhours.toml"), PathBuf::from("config/merchhours.toml")]
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

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_chat(chat: &ChatConfig) -> Result<(), ConfigError> {
    let bot_token = chat.bot_token.expose_secret();
    if bot_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "chat.bot_token is required. Set MERCHHOURS_CHAT_BOT_TOKEN (or BOT_TOKEN) to the token issued for the bot".to_string(),
        ));
    }

    let well_formed = bot_token
        .split_once(':')
        .map(|(bot_id, secret)| {
            !bot_id.is_empty() && bot_id.chars().all(|ch| ch.is_ascii_digit()) && !secret.is_empty()
        })
        .unwrap_or(false);
    if !well_formed {
        return Err(ConfigError::Validation(
            "chat.bot_token must look like `<numeric bot id>:<secret>`".to_string(),
        ));
    }

    Ok(())
}

fn validate_calculation(calculation: &CalculationConfig) -> Result<(), ConfigError> {
    if !calculation.hours_per_fte.is_finite() || calculation.hours_per_fte <= 0.0 {
        return Err(ConfigError::Validation(
            "calculation.hours_per_fte must be a finite number greater than zero".to_string(),
        ));
    }

    if !calculation.cost_per_fte.is_finite() || calculation.cost_per_fte < 0.0 {
        return Err(ConfigError::Validation(
            "calculation.cost_per_fte must be a finite, non-negative number".to_string(),
        ));
    }

    if calculation.currency.trim().is_empty() {
        return Err(ConfigError::Validation("calculation.currency must not be empty".to_string()));
    }

    if calculation.year_range_min > calculation.year_range_max {
        return Err(ConfigError::Validation(format!(
            "calculation.year_range_min ({}) must not exceed calculation.year_range_max ({})",
            calculation.year_range_min, calculation.year_range_max
        )));
    }

    if calculation.month_names.len() != 12 {
        return Err(ConfigError::Validation(format!(
            "calculation.month_names must contain exactly 12 entries (found {})",
            calculation.month_names.len()
        )));
    }
    if calculation.month_names.iter().any(|name| name.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "calculation.month_names must not contain empty names".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
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

fn parse_env<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    chat: Option<ChatPatch>,
    calculation: Option<CalculationPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPatch {
    bot_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CalculationPatch {
    hours_per_fte: Option<f64>,
    cost_per_fte: Option<f64>,
    currency: Option<String>,
    year_range_min: Option<i32>,
    year_range_max: Option<i32>,
    month_names: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
