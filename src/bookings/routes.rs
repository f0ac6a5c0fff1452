use actix_web::web;
use actix_web::web::{Data, Json, Path, Query};
use actix_web::{get, post};

use crate::bookings::models::{Booking, BookingFilter, CancelBooking, NewBooking};
use crate::db;
use crate::server;

#[get("/bookings")]
async fn find_all(query: Query<BookingFilter>, pool: Data<db::Pool>) -> server::Response {
    let conn = pool.get()?;

    let bookings = web::block(move || Booking::find_all(query.into_inner(), &conn)).await?;

    http_ok_json!(bookings);
}

#[get("/bookings/{id}")]
async fn find(booking_id: Path<i64>, pool: Data<db::Pool>) -> server::Response {
    let conn = pool.get()?;

    let booking = web::block(move || Booking::find_by_id(*booking_id, &conn)).await?;

    http_ok_json!(booking);
}

#[post("/bookings")]
async fn create(booking: Json<NewBooking>, pool: Data<db::Pool>) -> server::Response {
    let conn = pool.get()?;

    let booking = web::block(move || booking.save(&conn)).await?;

    http_created_json!(booking);
}

#[post("/bookings/{id}/cancel")]
async fn cancel(
    booking_id: Path<i64>,
    request: Json<CancelBooking>,
    pool: Data<db::Pool>,
) -> server::Response {
    let conn = pool.get()?;
    let request = request.into_inner();

    let booking = web::block(move || {
        Booking::cancel(
            *booking_id,
            request.slot_id,
            &request.cancelled_by,
            request.reason,
            &conn,
        )
    })
    .await?;

    http_ok_json!(booking);
}

pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(find_all);
    cfg.service(find);
    cfg.service(create);
    cfg.service(cancel);
}
