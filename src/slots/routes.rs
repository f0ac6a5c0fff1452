use actix_web::http::StatusCode;
use actix_web::web;
use actix_web::web::{Data, HttpResponse, Json, Path, Query};
use actix_web::{get, post};
use chrono::NaiveDate;

use crate::config::Config;
use crate::db;
use crate::server;
use crate::slots::schedule;
use crate::slots::Slot;
use crate::turfs::Turf;

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub holder: String,
    pub lease_minutes: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct BlockRequest {
    pub reason: String,
}

#[get("/turfs/{id}/slots")]
async fn day_grid(turf_id: Path<i64>, query: Query<DayQuery>, pool: Data<db::Pool>) -> server::Response {
    let conn = pool.get()?;

    let slots = web::block(move || Slot::find_for_day(*turf_id, query.date, &conn)).await?;

    http_ok_json!(slots);
}

#[post("/turfs/{id}/slots/generate")]
async fn generate(
    turf_id: Path<i64>,
    request: Json<GenerateRequest>,
    pool: Data<db::Pool>,
) -> server::Response {
    let conn = pool.get()?;
    let date = request.date;

    let created = web::block(move || {
        let turf = Turf::find_by_id(*turf_id, &conn)?;
        let bands = turf.tariffs(&conn)?;

        schedule::generate_for_day(&turf, &bands, date, &conn)
    })
    .await?;

    http_created_json!(serde_json::json!({ "created": created }));
}

#[post("/slots/{id}/reserve")]
async fn reserve(
    slot_id: Path<i64>,
    request: Json<ReserveRequest>,
    pool: Data<db::Pool>,
) -> server::Response {
    let conn = pool.get()?;
    let request = request.into_inner();

    let reserved = web::block(move || {
        let minutes = request.lease_minutes.unwrap_or_else(Config::lease_minutes);

        if !(1..=120).contains(&minutes) {
            bad_request!("the lease duration should be within [1-120] minutes");
        }

        Slot::reserve(
            *slot_id,
            &request.holder,
            chrono::Duration::minutes(minutes as i64),
            &conn,
        )
    })
    .await?;

    http_ok_json!(serde_json::json!({ "reserved": reserved }));
}

#[post("/slots/{id}/release")]
async fn release(slot_id: Path<i64>, pool: Data<db::Pool>) -> server::Response {
    let conn = pool.get()?;

    web::block(move || Slot::release(*slot_id, &conn)).await?;

    Ok(HttpResponse::new(StatusCode::OK))
}

#[post("/slots/{id}/block")]
async fn block(
    slot_id: Path<i64>,
    request: Json<BlockRequest>,
    pool: Data<db::Pool>,
) -> server::Response {
    let conn = pool.get()?;

    let slot = web::block(move || Slot::block(*slot_id, &request.reason, &conn)).await?;

    http_ok_json!(slot);
}

#[post("/slots/{id}/unblock")]
async fn unblock(slot_id: Path<i64>, pool: Data<db::Pool>) -> server::Response {
    let conn = pool.get()?;

    let slot = web::block(move || Slot::unblock(*slot_id, &conn)).await?;

    http_ok_json!(slot);
}

pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(day_grid);
    cfg.service(generate);
    cfg.service(reserve);
    cfg.service(release);
    cfg.service(block);
    cfg.service(unblock);
}
