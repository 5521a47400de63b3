use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::models::flight::{FlightStatusUpdate, FlightSummary, GateAssignment};
use crate::models::user::Role;
use crate::services::flight_service::FlightService;
use crate::services::search_service::SearchService;
use crate::utils::error::AppError;
use crate::utils::jwt::AuthenticatedUser;

/// Update a flight's operational status and delay fields (airline staff).
#[openapi(tag = "Staff")]
#[patch("/staff/flights/<flight_id>/status", format = "json", data = "<update>")]
pub async fn update_status(
    flight_id: i64,
    update: Json<FlightStatusUpdate>,
    auth: AuthenticatedUser,
    flight_service: &State<FlightService>,
    search_service: &State<SearchService>,
) -> Result<Json<FlightSummary>, AppError> {
    auth.require_role(&[Role::AirlineStaff, Role::Admin])?;
    flight_service
        .update_status(flight_id, update.into_inner())
        .await?;
    Ok(Json(search_service.get_flight(flight_id).await?))
}

/// Assign a departure gate (airport authority).
#[openapi(tag = "Staff")]
#[patch("/staff/flights/<flight_id>/gate", format = "json", data = "<update>")]
pub async fn assign_gate(
    flight_id: i64,
    update: Json<GateAssignment>,
    auth: AuthenticatedUser,
    flight_service: &State<FlightService>,
    search_service: &State<SearchService>,
) -> Result<Json<FlightSummary>, AppError> {
    auth.require_role(&[Role::AirportAuthority, Role::Admin])?;
    flight_service
        .assign_gate(flight_id, update.into_inner())
        .await?;
    Ok(Json(search_service.get_flight(flight_id).await?))
}
