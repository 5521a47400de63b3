use std::env;
use std::time::Duration;

/// Runtime configuration, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub hold_ttl_seconds: i64,
    pub simulator_period: Duration,
    pub reaper_period: Duration,
    pub price_drift_tolerance: f64,
    pub payment_success_probability: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "insecure-test-secret".to_string(),
            hold_ttl_seconds: 900,
            simulator_period: Duration::from_secs(300),
            reaper_period: Duration::from_secs(60),
            price_drift_tolerance: 0.01,
            payment_success_probability: 1.0,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = AppConfig::default();
        AppConfig {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            hold_ttl_seconds: env_parse("HOLD_TTL_SECONDS", defaults.hold_ttl_seconds),
            simulator_period: Duration::from_secs(env_parse(
                "SIMULATOR_PERIOD_SECONDS",
                defaults.simulator_period.as_secs(),
            )),
            reaper_period: Duration::from_secs(env_parse(
                "REAPER_PERIOD_SECONDS",
                defaults.reaper_period.as_secs(),
            )),
            price_drift_tolerance: env_parse(
                "PRICE_DRIFT_TOLERANCE",
                defaults.price_drift_tolerance,
            ),
            payment_success_probability: env_parse(
                "PAYMENT_SUCCESS_PROBABILITY",
                defaults.payment_success_probability,
            ),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
