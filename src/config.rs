use std::collections::HashMap;
use thiserror::Error;

/// Service configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub pricing: PricingConfig,
    pub debt: DebtConfig,
    pub matching: MatchingConfig,
}

/// Fare computation constants.
#[derive(Debug, Clone, Copy)]
pub struct PricingConfig {
    pub base_fare: f64,
    pub rate_per_km: f64,
    /// Platform cut of the total fare, in [0, 1).
    pub commission_rate: f64,
    pub minimum_fare: f64,
}

/// Debt ledger thresholds.
#[derive(Debug, Clone, Copy)]
pub struct DebtConfig {
    /// Balance at or above which a driver is suspended.
    pub max_debt_limit: f64,
    /// Balance at or above which a warning is sent.
    pub warning_threshold: f64,
    pub auto_suspend: bool,
}

/// Candidate search and offer fan-out settings.
#[derive(Debug, Clone, Copy)]
pub struct MatchingConfig {
    pub search_radius_km: f64,
    /// How many candidates the matcher returns at most.
    pub candidate_limit: usize,
    /// How many of those receive the offer notification.
    pub offer_fanout: usize,
    pub traffic_factor: f64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn parse_f64(
    env_map: &HashMap<String, String>,
    key: &str,
    default: f64,
) -> Result<f64, ConfigError> {
    match env_map.get(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<f64>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a valid number".to_string())
        }),
    }
}

fn parse_usize(
    env_map: &HashMap<String, String>,
    key: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    match env_map.get(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<usize>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a valid integer".to_string())
        }),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let pricing = PricingConfig {
            base_fare: parse_f64(&env_map, "BASE_FARE", 5.0)?,
            rate_per_km: parse_f64(&env_map, "RATE_PER_KM", 2.0)?,
            commission_rate: parse_f64(&env_map, "COMMISSION_RATE", 0.2)?,
            minimum_fare: parse_f64(&env_map, "MINIMUM_FARE", 10.0)?,
        };
        if !(0.0..1.0).contains(&pricing.commission_rate) {
            return Err(ConfigError::InvalidValue(
                "COMMISSION_RATE".to_string(),
                "must be in [0, 1)".to_string(),
            ));
        }

        let debt = DebtConfig {
            max_debt_limit: parse_f64(&env_map, "MAX_DEBT_LIMIT", 100.0)?,
            warning_threshold: parse_f64(&env_map, "DEBT_WARNING_THRESHOLD", 70.0)?,
            auto_suspend: env_map
                .get("AUTO_SUSPEND")
                .map(|s| s.to_ascii_lowercase() == "true")
                .unwrap_or(true),
        };
        if debt.warning_threshold > debt.max_debt_limit {
            return Err(ConfigError::InvalidValue(
                "DEBT_WARNING_THRESHOLD".to_string(),
                "must not exceed MAX_DEBT_LIMIT".to_string(),
            ));
        }

        let matching = MatchingConfig {
            search_radius_km: parse_f64(&env_map, "SEARCH_RADIUS_KM", 10.0)?,
            candidate_limit: parse_usize(&env_map, "CANDIDATE_LIMIT", 10)?,
            offer_fanout: parse_usize(&env_map, "OFFER_FANOUT", 5)?,
            traffic_factor: parse_f64(&env_map, "TRAFFIC_FACTOR", 1.2)?,
        };

        Ok(Config {
            port,
            database_path,
            pricing,
            debt,
            matching,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn defaults_match_documented_constants() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.pricing.base_fare, 5.0);
        assert_eq!(config.pricing.rate_per_km, 2.0);
        assert_eq!(config.pricing.commission_rate, 0.2);
        assert_eq!(config.pricing.minimum_fare, 10.0);
        assert_eq!(config.debt.max_debt_limit, 100.0);
        assert_eq!(config.debt.warning_threshold, 70.0);
        assert!(config.debt.auto_suspend);
        assert_eq!(config.matching.search_radius_km, 10.0);
        assert_eq!(config.matching.offer_fanout, 5);
    }

    #[test]
    fn missing_database_path() {
        let result = Config::from_env_map(HashMap::new());
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn invalid_commission_rate() {
        let mut env_map = setup_required_env();
        env_map.insert("COMMISSION_RATE".to_string(), "1.5".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "COMMISSION_RATE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn warning_threshold_above_limit_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("DEBT_WARNING_THRESHOLD".to_string(), "150".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "DEBT_WARNING_THRESHOLD"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn invalid_numeric_value() {
        let mut env_map = setup_required_env();
        env_map.insert("BASE_FARE".to_string(), "cheap".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "BASE_FARE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn auto_suspend_can_be_disabled() {
        let mut env_map = setup_required_env();
        env_map.insert("AUTO_SUSPEND".to_string(), "false".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert!(!config.debt.auto_suspend);
    }
}
