use crate::domain::{Track, U256};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Clone)]
pub struct Config {
    pub ledger_rpc_url: String,
    pub deployment_path: String,
    pub track: Track,
    pub gas_price: U256,
    pub gas_limit: u64,
    /// `None` means ask the node.
    pub chain_id: Option<u64>,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    pub request_incentive: U256,
    pub private_key: Option<String>,
    pub keystore_path: Option<String>,
    pub keystore_password: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("ledger_rpc_url", &self.ledger_rpc_url)
            .field("deployment_path", &self.deployment_path)
            .field("track", &self.track)
            .field("gas_price", &self.gas_price)
            .field("gas_limit", &self.gas_limit)
            .field("chain_id", &self.chain_id)
            .field("confirmation_timeout", &self.confirmation_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("request_incentive", &self.request_incentive)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("keystore_path", &self.keystore_path)
            .field(
                "keystore_password",
                &self.keystore_password.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let ledger_rpc_url = env_map
            .get("LEDGER_RPC_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("LEDGER_RPC_URL".to_string()))?;

        let deployment_path = env_map
            .get("DEPLOYMENT_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DEPLOYMENT_PATH".to_string()))?;

        let track = env_map
            .get("TRACK")
            .map(|s| s.as_str())
            .unwrap_or("testing")
            .parse::<Track>()
            .map_err(|e| ConfigError::InvalidValue("TRACK".to_string(), e))?;

        let gas_price = parse_u256(&env_map, "GAS_PRICE", "2000000000")?;

        let gas_limit = env_map
            .get("GAS_LIMIT")
            .map(|s| s.as_str())
            .unwrap_or("8000000")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue("GAS_LIMIT".to_string(), "must be a valid u64".to_string())
            })?;

        let chain_id = env_map
            .get("CHAIN_ID")
            .map(|s| {
                s.parse::<u64>().map_err(|_| {
                    ConfigError::InvalidValue(
                        "CHAIN_ID".to_string(),
                        "must be a valid u64".to_string(),
                    )
                })
            })
            .transpose()?;

        let confirmation_timeout = parse_millis(&env_map, "CONFIRMATION_TIMEOUT_MS", "120000")?;
        let poll_interval = parse_millis(&env_map, "POLL_INTERVAL_MS", "500")?;
        if poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "POLL_INTERVAL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let request_incentive = parse_u256(&env_map, "REQUEST_INCENTIVE", "10000000000000000")?;

        let private_key = env_map.get("PRIVATE_KEY").cloned();
        let keystore_path = env_map.get("KEYSTORE_PATH").cloned();
        let keystore_password = env_map.get("KEYSTORE_PASSWORD").cloned();
        if keystore_path.is_some() && keystore_password.is_none() {
            return Err(ConfigError::MissingEnv("KEYSTORE_PASSWORD".to_string()));
        }

        Ok(Config {
            ledger_rpc_url,
            deployment_path,
            track,
            gas_price,
            gas_limit,
            chain_id,
            confirmation_timeout,
            poll_interval,
            request_incentive,
            private_key,
            keystore_path,
            keystore_password,
        })
    }
}

fn parse_u256(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<U256, ConfigError> {
    let raw = env_map.get(key).map(|s| s.as_str()).unwrap_or(default);
    U256::from_dec_str(raw).map_err(|_| {
        ConfigError::InvalidValue(key.to_string(), "must be a non-negative integer".to_string())
    })
}

fn parse_millis(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Duration, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), "must be a valid u64".to_string()))
}
