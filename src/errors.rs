use actix_web::{error::ResponseError, HttpResponse};
use derive_more::Display;
use diesel::result::{DatabaseErrorKind, Error as DBError};
use std::convert::From;

#[derive(Debug, Display, PartialEq)]
pub enum ServiceError {
    #[display(fmt = "Internal Server Error")]
    InternalServerError,

    #[display(fmt = "BadRequest: {}", _0)]
    BadRequest(String),

    #[display(fmt = "Conflict: {}", _0)]
    Conflict(String),

    #[display(fmt = "Forbidden: {}", _0)]
    Forbidden(String),

    #[display(fmt = "Not Found: {}", _0)]
    NotFound(String),
}

// impl ResponseError trait allows to convert our errors into http responses with appropriate data
impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::InternalServerError => {
                HttpResponse::InternalServerError().json("Internal Server Error, Please try later")
            }
            ServiceError::BadRequest(ref message) => HttpResponse::BadRequest().json(message),
            ServiceError::Conflict(ref message) => HttpResponse::Conflict().json(message),
            ServiceError::Forbidden(ref message) => HttpResponse::Forbidden().json(message),
            ServiceError::NotFound(ref message) => HttpResponse::NotFound().json(message),
        }
    }
}

impl From<DBError> for ServiceError {
    fn from(error: DBError) -> ServiceError {
        error!("db error: {}", error);
        match error {
            DBError::NotFound => ServiceError::NotFound("requested record does not exist".into()),
            DBError::DatabaseError(kind, info) => {
                if let DatabaseErrorKind::UniqueViolation = kind {
                    let message = info.details().unwrap_or_else(|| info.message()).to_string();
                    return ServiceError::Conflict(message);
                }
                ServiceError::InternalServerError
            }
            _ => ServiceError::InternalServerError,
        }
    }
}

impl From<r2d2::Error> for ServiceError {
    fn from(error: r2d2::Error) -> ServiceError {
        error!("r2d2 connection pool error: {}", error);
        ServiceError::InternalServerError
    }
}

// the engine's own error has to survive the trip through web::block,
// otherwise a Conflict or NotFound reaches the caller as a 500
impl From<actix_threadpool::BlockingError<ServiceError>> for ServiceError {
    fn from(error: actix_threadpool::BlockingError<ServiceError>) -> ServiceError {
        match error {
            actix_threadpool::BlockingError::Error(error) => error,
            actix_threadpool::BlockingError::Canceled => {
                error!("actix threadpool canceled a blocking operation");
                ServiceError::InternalServerError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_threadpool::BlockingError;

    #[test]
    fn blocking_error_keeps_the_engine_error() {
        let conflict: ServiceError =
            BlockingError::Error(ServiceError::Conflict("slot is no longer available".into()))
                .into();
        assert_eq!(
            conflict,
            ServiceError::Conflict("slot is no longer available".into())
        );

        let not_found: ServiceError =
            BlockingError::Error(ServiceError::NotFound("slot not found".into())).into();
        assert_eq!(not_found, ServiceError::NotFound("slot not found".into()));

        let invalid: ServiceError =
            BlockingError::Error(ServiceError::BadRequest("the booking amount has to be above 0".into()))
                .into();
        assert_eq!(
            invalid,
            ServiceError::BadRequest("the booking amount has to be above 0".into())
        );
    }

    #[test]
    fn canceled_blocking_call_is_a_server_error() {
        let canceled: ServiceError = BlockingError::<ServiceError>::Canceled.into();
        assert_eq!(canceled, ServiceError::InternalServerError);
    }
}
