use crate::app_config::{AppConfig, Environment};
use crate::region::Region;
use crate::ConfigError;

/// Listing providers never rank more than this many items per category.
const MAX_PRODUCTS_PER_CATEGORY: usize = 50;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it with a plain
/// `HashMap`.
#[allow(clippy::too_many_lines)]
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_score = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value = or_default(var, default)
            .parse::<f64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if !(0.0..=100.0).contains(&value) {
            return Err(invalid(var, format!("{value} is outside 0..=100")));
        }
        Ok(value)
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("TRENDWATCH_ENV", "development"))?;

    let bind_addr = or_default("TRENDWATCH_BIND_ADDR", "0.0.0.0:8000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("TRENDWATCH_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("TRENDWATCH_LOG_LEVEL", "info");

    let region = or_default("TRENDWATCH_REGION", "US")
        .parse::<Region>()
        .map_err(|reason| invalid("TRENDWATCH_REGION", reason))?;
    let categories = parse_categories(region, optional("TRENDWATCH_CATEGORIES").as_deref())?;

    let products_per_category = parse_usize("TRENDWATCH_PRODUCTS_PER_CATEGORY", "50")?;
    if products_per_category == 0 || products_per_category > MAX_PRODUCTS_PER_CATEGORY {
        return Err(invalid(
            "TRENDWATCH_PRODUCTS_PER_CATEGORY",
            format!("must be between 1 and {MAX_PRODUCTS_PER_CATEGORY}"),
        ));
    }

    let listing_base_url = optional("TRENDWATCH_LISTING_BASE_URL");
    let listing_concurrency = parse_usize("TRENDWATCH_LISTING_CONCURRENCY", "2")?.max(1);
    let request_delay_ms = parse_u64("TRENDWATCH_REQUEST_DELAY_MS", "3000")?;
    let search_delay_ms = parse_u64("TRENDWATCH_SEARCH_DELAY_MS", "1000")?;
    let search_api_url = or_default(
        "TRENDWATCH_SEARCH_API_URL",
        "http://127.0.0.1:8081/interest",
    );
    let max_retries = parse_u32("TRENDWATCH_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_u64("TRENDWATCH_RETRY_BACKOFF_BASE_MS", "2000")?;
    let request_timeout_secs = parse_u64("TRENDWATCH_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("TRENDWATCH_USER_AGENT", DEFAULT_USER_AGENT);

    let hot_threshold = parse_score("TRENDWATCH_HOT_THRESHOLD", "70")?;
    let insight_min_score = parse_score("TRENDWATCH_INSIGHT_MIN_SCORE", "60")?;
    let insight_api_url = or_default(
        "TRENDWATCH_INSIGHT_API_URL",
        "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent",
    );
    let insight_api_key = optional("TRENDWATCH_INSIGHT_API_KEY");
    let webhook_url = optional("TRENDWATCH_WEBHOOK_URL");

    let scan_cron = or_default("TRENDWATCH_CRON", "0 0 6 * * *");
    let archive_after_days = parse_u32("TRENDWATCH_ARCHIVE_AFTER_DAYS", "30")?;

    let db_max_connections = parse_u32("TRENDWATCH_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("TRENDWATCH_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("TRENDWATCH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;
    if db_min_connections > db_max_connections {
        return Err(invalid(
            "TRENDWATCH_DB_MIN_CONNECTIONS",
            format!("{db_min_connections} exceeds TRENDWATCH_DB_MAX_CONNECTIONS ({db_max_connections})"),
        ));
    }

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        region,
        categories,
        products_per_category,
        listing_base_url,
        listing_concurrency,
        request_delay_ms,
        search_delay_ms,
        search_api_url,
        max_retries,
        retry_backoff_base_ms,
        request_timeout_secs,
        user_agent,
        hot_threshold,
        insight_min_score,
        insight_api_url,
        insight_api_key,
        webhook_url,
        scan_cron,
        archive_after_days,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "TRENDWATCH_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

/// Resolves the configured category list against the region catalog.
///
/// `None` selects every category in the region. Names are canonicalized to
/// the catalog spelling; duplicates are dropped.
fn parse_categories(region: Region, raw: Option<&str>) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(region
            .categories()
            .iter()
            .map(|c| c.name.to_string())
            .collect());
    };

    let mut out: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let category = region
            .category(name)
            .ok_or_else(|| ConfigError::InvalidEnvVar {
                var: "TRENDWATCH_CATEGORIES".to_string(),
                reason: format!("unknown category '{name}' for region {region}"),
            })?;
        if !out.iter().any(|c| c == category.name) {
            out.push(category.name.to_string());
        }
    }

    if out.is_empty() {
        return Err(ConfigError::InvalidEnvVar {
            var: "TRENDWATCH_CATEGORIES".to_string(),
            reason: "no categories listed".to_string(),
        });
    }
    Ok(out)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
