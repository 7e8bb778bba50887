use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use merchhours_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let calculation = &config.calculation;
    let fields: Vec<(&str, String, Option<&str>)> = vec![
        ("database.url", config.database.url.clone(), Some("MERCHHOURS_DATABASE_URL")),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            Some("MERCHHOURS_DATABASE_MAX_CONNECTIONS"),
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            Some("MERCHHOURS_DATABASE_TIMEOUT_SECS"),
        ),
        (
            "chat.bot_token",
            redact_token(config.chat.bot_token.expose_secret()),
            Some(bot_token_env_key()),
        ),
        (
            "calculation.hours_per_fte",
            calculation.hours_per_fte.to_string(),
            Some("MERCHHOURS_CALCULATION_HOURS_PER_FTE"),
        ),
        (
            "calculation.cost_per_fte",
            calculation.cost_per_fte.to_string(),
            Some("MERCHHOURS_CALCULATION_COST_PER_FTE"),
        ),
        ("calculation.currency", calculation.currency.clone(), Some("MERCHHOURS_CALCULATION_CURRENCY")),
        (
            "calculation.year_range_min",
            calculation.year_range_min.to_string(),
            Some("MERCHHOURS_CALCULATION_YEAR_RANGE_MIN"),
        ),
        (
            "calculation.year_range_max",
            calculation.year_range_max.to_string(),
            Some("MERCHHOURS_CALCULATION_YEAR_RANGE_MAX"),
        ),
        ("calculation.month_names", calculation.month_names.join(", "), None),
        ("server.bind_address", config.server.bind_address.clone(), Some("MERCHHOURS_SERVER_BIND_ADDRESS")),
        (
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            Some("MERCHHOURS_SERVER_HEALTH_CHECK_PORT"),
        ),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            Some("MERCHHOURS_SERVER_GRACEFUL_SHUTDOWN_SECS"),
        ),
        ("logging.level", config.logging.level.clone(), Some("MERCHHOURS_LOGGING_LEVEL")),
        ("logging.format", format!("{:?}", config.logging.format), Some("MERCHHOURS_LOGGING_FORMAT")),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_key) in fields {
        let source =
            field_source(key, env_key, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    lines.join("\n")
}

/// The legacy `BOT_TOKEN` variable only counts when the namespaced one is absent.
fn bot_token_env_key() -> &'static str {
    if env::var_os("MERCHHOURS_CHAT_BOT_TOKEN").is_none() && env::var_os("BOT_TOKEN").is_some() {
        "BOT_TOKEN"
    } else {
        "MERCHHOURS_CHAT_BOT_TOKEN"
    }
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("merchhours.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/merchhours.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }

    "<redacted>".to_string()
}
