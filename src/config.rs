use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

/// Settings the signup engine is constructed with. Nothing in the engine reads
/// the environment directly; binaries build this once and pass it down.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub enable_waitlist: bool,
    pub presign_window_days: i64,
    pub waitlist_max_offers: usize,
    pub lock_retry_limit: usize,
    pub placeholder_username: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_waitlist: false,
            presign_window_days: 2,
            waitlist_max_offers: 10,
            lock_retry_limit: 5,
            placeholder_username: "deleted".to_string(),
        }
    }
}

pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub notify_url: Option<String>,
    pub engine: EngineConfig,
}

impl Config {
    pub fn load() -> Self {
        let defaults = EngineConfig::default();
        Self {
            database_url: env_or("DATABASE_URL", "sqlite://eighth.db".to_string()),
            host: env_or("HOST", "127.0.0.1".to_string()),
            port: env_or("PORT", 3000u16),
            notify_url: var("NOTIFY_URL").ok().filter(|v| !v.trim().is_empty()),
            engine: EngineConfig {
                enable_waitlist: var("ENABLE_WAITLIST")
                    .map(|raw| parse_flag(&raw))
                    .unwrap_or(defaults.enable_waitlist),
                presign_window_days: env_or("PRESIGN_WINDOW_DAYS", defaults.presign_window_days),
                waitlist_max_offers: env_or("WAITLIST_MAX_OFFERS", defaults.waitlist_max_offers),
                lock_retry_limit: env_or("LOCK_RETRY_LIMIT", defaults.lock_retry_limit),
                placeholder_username: env_or("PLACEHOLDER_USERNAME", defaults.placeholder_username),
            },
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        info!("Environment variable {key} not set");
    })
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Ok(raw) = var(key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };
    match raw.trim().parse() {
        Ok(v) => v,
        Err(e) => {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            default
        }
    }
}

pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_common_spellings() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" ON "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
        assert!(!parse_flag("enabled-ish"));
    }

    #[test]
    fn engine_defaults_match_documented_values() {
        let cfg = EngineConfig::default();
        assert!(!cfg.enable_waitlist);
        assert_eq!(cfg.presign_window_days, 2);
        assert_eq!(cfg.placeholder_username, "deleted");
    }

    #[test]
    fn unset_keys_use_the_default() {
        let v: i64 = env_or("EIGHTH_TEST_UNSET_NUMBER_KEY", 7);
        assert_eq!(v, 7);
    }

    #[test]
    fn invalid_numbers_fall_back_to_default() {
        env::set_var("EIGHTH_TEST_BAD_NUMBER_KEY", "seven");
        let v: usize = env_or("EIGHTH_TEST_BAD_NUMBER_KEY", 10);
        assert_eq!(v, 10);

        env::set_var("EIGHTH_TEST_GOOD_NUMBER_KEY", " 4 ");
        let v: usize = env_or("EIGHTH_TEST_GOOD_NUMBER_KEY", 10);
        assert_eq!(v, 4);
    }
}
