use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Default soft-lock TTL in seconds
    pub hold_ttl_seconds: i64,
    /// How often the expiry sweep runs
    pub sweep_interval_seconds: u64,
    /// Percentage tax applied across product families
    pub tax_rate: f64,
    /// Flat booking fee in minor units
    pub booking_fee: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of TESSERA)
            // Eg.. `TESSERA__SERVER__PORT=8080` would set the port
            .add_source(config::Environment::with_prefix("TESSERA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
