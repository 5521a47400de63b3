use std::io::Cursor;

use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::Request;
use rocket::Response;
use rocket_okapi::gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::response::OpenApiResponderInner;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Error kinds surfaced by the core. The kind is stable across releases;
/// the message is advisory.
#[derive(Error, Debug, Clone, Serialize)]
pub enum AppError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Seat unavailable: {0}")]
    SeatUnavailable(String),

    #[error("Flight not bookable: {0}")]
    FlightNotBookable(String),

    #[error("Price changed: {0}")]
    PriceChanged(String),

    #[error("Hold expired: {0}")]
    HoldExpired(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidArgument(_) => "InvalidArgument",
            AppError::NotFound(_) => "NotFound",
            AppError::Conflict(_) => "Conflict",
            AppError::SeatUnavailable(_) => "SeatUnavailable",
            AppError::FlightNotBookable(_) => "FlightNotBookable",
            AppError::PriceChanged(_) => "PriceChanged",
            AppError::HoldExpired(_) => "HoldExpired",
            AppError::InvalidState(_) => "InvalidState",
            AppError::PaymentFailed(_) => "PaymentFailed",
            AppError::AuthError(_) => "AuthError",
            AppError::Forbidden(_) => "Forbidden",
            AppError::Internal(_) => "Internal",
        }
    }

    /// Serialization failures and lock contention are safe to retry after
    /// the losing transaction has been rolled back.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Internal(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("database is locked")
                    || msg.contains("busy")
                    || msg.contains("deadlock")
                    || msg.contains("snapshot")
            }
            _ => false,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

// Format errors into an HTTP response at the route boundary.
#[rocket::async_trait]
impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'static> {
        let status = match self {
            AppError::InvalidArgument(_) => Status::BadRequest,
            AppError::NotFound(_) => Status::NotFound,
            AppError::Conflict(_)
            | AppError::SeatUnavailable(_)
            | AppError::FlightNotBookable(_)
            | AppError::PriceChanged(_)
            | AppError::InvalidState(_) => Status::Conflict,
            AppError::HoldExpired(_) => Status::Gone,
            AppError::PaymentFailed(_) => Status::PaymentRequired,
            AppError::AuthError(_) => Status::Unauthorized,
            AppError::Forbidden(_) => Status::Forbidden,
            AppError::Internal(_) => Status::InternalServerError,
        };

        let body = json!({
            "kind": self.kind(),
            "error": self.to_string(),
        });

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(None, Cursor::new(body.to_string()))
            .ok()
    }
}

impl OpenApiResponderInner for AppError {
    fn responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        Ok(Responses::default())
    }
}
