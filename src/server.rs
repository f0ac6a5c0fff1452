use actix_cors::Cors;
use actix_web::{get, middleware, web, App, HttpRequest, HttpResponse, HttpServer};

use crate::admin;
use crate::bookings;
use crate::config::Config;
use crate::db;
use crate::errors::ServiceError;
use crate::slots;
use crate::turfs;

pub type Response = Result<HttpResponse, ServiceError>;

#[get("/health")]
async fn health(_: HttpRequest) -> &'static str {
    "ok"
}

pub async fn launch(db_pool: db::Pool) -> std::io::Result<()> {
    HttpServer::new(move || {
        App::new()
            .data(db_pool.clone())
            .wrap(middleware::DefaultHeaders::new().header("X-Version", env!("CARGO_PKG_VERSION")))
            .wrap(middleware::Compress::default())
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::default())
            .wrap(Cors::permissive())
            .data(web::JsonConfig::default().limit(262_144))
            .data(web::PayloadConfig::default().limit(262_144))
            .service(health)
            .service(
                web::scope("/api")
                    .configure(turfs::routes::register)
                    .configure(slots::routes::register)
                    .configure(bookings::routes::register),
            )
            .service(web::scope("/admin").configure(admin::routes::register))
    })
    .bind(format!("{}:{}", Config::api_host(), Config::api_port()))?
    .run()
    .await
}
