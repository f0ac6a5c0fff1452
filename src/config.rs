use std::sync::atomic::{AtomicU64, Ordering};

use validator::Validate;

#[derive(Deserialize, Debug, Validate)]
pub struct Config {
    #[validate(length(min = 1))]
    database_url: String,
    api_host: Option<String>,
    api_port: Option<usize>,
    /// how long a reservation lease keeps a slot held for a customer,
    /// in minutes; long enough for a payment flow, short enough to
    /// recycle abandoned holds
    #[serde(default = "default_lease_minutes")]
    lease_minutes: AtomicU64,
}

fn default_lease_minutes() -> AtomicU64 {
    AtomicU64::new(10)
}

lazy_static! {
    static ref CONFIG: Config = match envy::from_env::<Config>() {
        Ok(config) => {
            match config.validate() {
                Ok(()) => config,
                Err(e) => panic!("invalid environment variable: {}", e),
            }
        }
        Err(error) => panic!("Missing or incorrect environment variable: {}", error),
    };
}

impl Config {
    pub fn database_url() -> &'static str {
        CONFIG.database_url.as_ref()
    }

    pub fn api_host() -> &'static str {
        match &CONFIG.api_host {
            Some(host) => host.as_ref(),
            None => "localhost",
        }
    }

    pub fn api_port() -> usize {
        CONFIG.api_port.unwrap_or(8080)
    }

    pub fn lease_minutes() -> u64 {
        CONFIG.lease_minutes.load(Ordering::SeqCst)
    }

    pub fn set_lease_minutes(minutes: u64) {
        CONFIG.lease_minutes.store(minutes, Ordering::SeqCst)
    }
}
