use std::str::FromStr;

use anyhow::Context;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5672;
pub const DEFAULT_USERNAME: &str = "rabbitmq_user";
pub const DEFAULT_PASSWORD: &str = "rabbitmq_pass";
pub const DEFAULT_HEARTBEAT_SECS: u16 = 600;

pub const DEFAULT_EXCHANGE: &str = "device.data.exchange";
pub const DEFAULT_ROUTING_KEY: &str = "device.data";

/// Static broker settings, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub heartbeat_secs: u16,
    pub exchange: String,
    pub routing_key: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            heartbeat_secs: DEFAULT_HEARTBEAT_SECS,
            exchange: DEFAULT_EXCHANGE.to_string(),
            routing_key: DEFAULT_ROUTING_KEY.to_string(),
        }
    }
}

impl BrokerConfig {
    /// Defaults overridden by any `RABBITMQ_*` variables set in the environment.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("RABBITMQ_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("RABBITMQ_PORT") {
            config.port = parse_var("RABBITMQ_PORT", &port)?;
        }
        if let Some(username) = lookup("RABBITMQ_USER") {
            config.username = username;
        }
        if let Some(password) = lookup("RABBITMQ_PASS") {
            config.password = password;
        }
        if let Some(heartbeat) = lookup("RABBITMQ_HEARTBEAT") {
            config.heartbeat_secs = parse_var("RABBITMQ_HEARTBEAT", &heartbeat)?;
        }
        if let Some(exchange) = lookup("RABBITMQ_EXCHANGE") {
            config.exchange = exchange;
        }
        if let Some(routing_key) = lookup("RABBITMQ_ROUTING_KEY") {
            config.routing_key = routing_key;
        }

        Ok(config)
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("Invalid value for {key}: {value:?}"))
}
