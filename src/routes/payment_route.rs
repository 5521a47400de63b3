use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::models::booking::BookingResponse;
use crate::models::payment::{Payment, PaymentRequest};
use crate::services::booking_service::BookingService;
use crate::utils::error::AppError;
use crate::utils::jwt::AuthenticatedUser;

/// Pay for a held booking; on success the booking is confirmed and a PNR
/// is issued.
#[openapi(tag = "Payments")]
#[post("/payments", format = "json", data = "<request>")]
pub async fn pay(
    request: Json<PaymentRequest>,
    _auth: AuthenticatedUser,
    booking_service: &State<BookingService>,
) -> Result<Json<BookingResponse>, AppError> {
    let request = request.into_inner();
    let response = booking_service
        .pay(&request.booking_reference, request.amount, request.method)
        .await?;
    Ok(Json(response))
}

/// Look up one payment attempt by transaction id.
#[openapi(tag = "Payments")]
#[get("/payments/<transaction_id>")]
pub async fn get_payment(
    transaction_id: String,
    _auth: AuthenticatedUser,
    booking_service: &State<BookingService>,
) -> Result<Json<Payment>, AppError> {
    let payment = booking_service.payment_by_transaction(&transaction_id).await?;
    Ok(Json(payment))
}
