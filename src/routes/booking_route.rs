use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::models::booking::{BookingResponse, CreateBookingRequest, PnrStatusView};
use crate::services::booking_service::BookingService;
use crate::services::receipt::{PlainTextRenderer, ReceiptRenderer};
use crate::utils::error::AppError;
use crate::utils::jwt::AuthenticatedUser;

/// Create a hold: seats are reserved and the fare is frozen for the TTL.
#[openapi(tag = "Bookings")]
#[post("/bookings", format = "json", data = "<request>")]
pub async fn create_booking(
    request: Json<CreateBookingRequest>,
    auth: AuthenticatedUser,
    booking_service: &State<BookingService>,
) -> Result<Json<BookingResponse>, AppError> {
    let response = booking_service
        .create_hold(auth.user_id, request.into_inner())
        .await?;
    Ok(Json(response))
}

/// Full booking record by PNR.
#[openapi(tag = "Bookings")]
#[get("/bookings/<pnr>")]
pub async fn get_booking(
    pnr: String,
    _auth: AuthenticatedUser,
    booking_service: &State<BookingService>,
) -> Result<Json<BookingResponse>, AppError> {
    let response = booking_service.booking_by_pnr(&pnr).await?;
    Ok(Json(response))
}

/// Cancel by PNR (or booking reference before confirmation).
#[openapi(tag = "Bookings")]
#[delete("/bookings/<pnr>")]
pub async fn cancel_booking(
    pnr: String,
    auth: AuthenticatedUser,
    booking_service: &State<BookingService>,
) -> Result<Json<BookingResponse>, AppError> {
    let response = booking_service
        .cancel(&pnr, auth.user_id, auth.role)
        .await?;
    Ok(Json(response))
}

/// Redacted status view; no authentication required.
#[openapi(tag = "Bookings")]
#[get("/bookings/<pnr>/status")]
pub async fn pnr_status(
    pnr: String,
    booking_service: &State<BookingService>,
) -> Result<Json<PnrStatusView>, AppError> {
    let view = booking_service.pnr_status(&pnr).await?;
    Ok(Json(view))
}

/// Rendered receipt for a paid booking.
#[openapi(tag = "Bookings")]
#[get("/bookings/<pnr>/receipt")]
pub async fn receipt(
    pnr: String,
    _auth: AuthenticatedUser,
    booking_service: &State<BookingService>,
) -> Result<String, AppError> {
    let document = booking_service.receipt_document(&pnr).await?;
    let bytes = PlainTextRenderer.render(&document);
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
