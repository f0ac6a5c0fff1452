use actix_web::web;
use actix_web::web::{Data, Json, Path, Query};
use actix_web::{get, post, put};

use crate::db;
use crate::server;
use crate::turfs::models::{CreateTurf, NewTariff, Tariff, Turf, TurfFilter};

#[get("/turfs")]
async fn find_all(query: Query<TurfFilter>, pool: Data<db::Pool>) -> server::Response {
    let conn = pool.get()?;

    let turfs = web::block(move || Turf::find_all(query.into_inner(), &conn)).await?;

    http_ok_json!(turfs);
}

#[get("/turfs/{id}")]
async fn find(turf_id: Path<i64>, pool: Data<db::Pool>) -> server::Response {
    let conn = pool.get()?;

    let turf = web::block(move || Turf::find_by_id(*turf_id, &conn)).await?;

    http_ok_json!(turf);
}

#[post("/turfs")]
async fn create(turf: Json<CreateTurf>, pool: Data<db::Pool>) -> server::Response {
    let conn = pool.get()?;

    let turf = web::block(move || Turf::create(turf.into_inner(), &conn)).await?;

    http_created_json!(turf);
}

#[put("/turfs")]
async fn update(turf: Json<Turf>, pool: Data<db::Pool>) -> server::Response {
    let conn = pool.get()?;

    let turf = web::block(move || turf.update(&conn)).await?;

    http_ok_json!(turf);
}

#[get("/turfs/{id}/tariffs")]
async fn tariffs(turf_id: Path<i64>, pool: Data<db::Pool>) -> server::Response {
    let conn = pool.get()?;

    let bands = web::block(move || Tariff::for_turf(*turf_id, &conn)).await?;

    http_ok_json!(bands);
}

#[post("/turfs/{id}/tariffs")]
async fn create_tariff(
    turf_id: Path<i64>,
    band: Json<NewTariff>,
    pool: Data<db::Pool>,
) -> server::Response {
    let mut band = band.into_inner();
    band.turf_id = turf_id.into_inner();

    let conn = pool.get()?;

    let band = web::block(move || band.save(&conn)).await?;

    http_created_json!(band);
}

pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(find_all);
    cfg.service(find);
    cfg.service(create);
    cfg.service(update);
    cfg.service(tariffs);
    cfg.service(create_tariff);
}
