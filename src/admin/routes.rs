use actix_web::web;
use actix_web::web::Json;
use actix_web::{get, post};

use crate::config::Config;
use crate::server::Response;

#[derive(Debug, Deserialize)]
pub struct LeaseConfig {
    pub minutes: u64,
}

#[get("/config")]
async fn show_config() -> Response {
    http_ok_json!(serde_json::json!({ "lease_minutes": Config::lease_minutes() }));
}

/// Adjust how long a reservation lease holds a slot. Applies to leases
/// taken after the change; running leases keep their expiry.
#[post("/config/lease-minutes")]
async fn set_lease_minutes(config: Json<LeaseConfig>) -> Response {
    if !(1..=120).contains(&config.minutes) {
        bad_request!("the lease duration should be within [1-120] minutes");
    }

    Config::set_lease_minutes(config.minutes);
    info!("lease duration set to {} minutes", config.minutes);

    http_ok_json!(serde_json::json!({ "lease_minutes": Config::lease_minutes() }));
}

pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(show_config);
    cfg.service(set_lease_minutes);
}
