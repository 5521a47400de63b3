use chrono::NaiveDate;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::models::fare_history::FareHistorySample;
use crate::models::flight::{
    FlightSearchResponse, FlightSummary, ScheduleEntry, SearchQuery, SortKey,
};
use crate::models::seat::{CabinClass, SeatView};
use crate::services::flight_service::FlightService;
use crate::services::search_service::SearchService;
use crate::utils::error::AppError;

/// Search flights between two airports, with live per-tier fares.
#[openapi(tag = "Flights")]
#[get("/flights/search?<origin>&<destination>&<date>&<passengers>&<tier>&<sort>&<page>&<page_size>")]
#[allow(clippy::too_many_arguments)]
pub async fn search_flights(
    origin: String,
    destination: String,
    date: Option<String>,
    passengers: Option<i64>,
    tier: Option<String>,
    sort: Option<String>,
    page: Option<i64>,
    page_size: Option<i64>,
    search_service: &State<SearchService>,
) -> Result<Json<FlightSearchResponse>, AppError> {
    let date = date
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|_| AppError::InvalidArgument("invalid date, expected YYYY-MM-DD".into()))
        })
        .transpose()?;
    let tier = tier.map(|raw| CabinClass::parse(&raw)).transpose()?;
    let sort = sort
        .map(|raw| SortKey::parse(&raw))
        .transpose()?
        .unwrap_or(SortKey::Departure);

    let query = SearchQuery {
        origin: origin.to_uppercase(),
        destination: destination.to_uppercase(),
        date,
        passengers: passengers.unwrap_or(1),
        tier,
        sort,
        page: page.unwrap_or(1),
        page_size: page_size.unwrap_or(20),
    };
    let response = search_service.search(query).await?;
    Ok(Json(response))
}

/// Fetch one flight summary by id.
#[openapi(tag = "Flights")]
#[get("/flights/<flight_id>")]
pub async fn get_flight(
    flight_id: i64,
    search_service: &State<SearchService>,
) -> Result<Json<FlightSummary>, AppError> {
    let summary = search_service.get_flight(flight_id).await?;
    Ok(Json(summary))
}

/// Seat map for one flight, for seat selection.
#[openapi(tag = "Flights")]
#[get("/flights/<flight_id>/seats")]
pub async fn get_seats(
    flight_id: i64,
    flight_service: &State<FlightService>,
) -> Result<Json<Vec<SeatView>>, AppError> {
    let seats = flight_service.seats_for_flight(flight_id).await?;
    Ok(Json(seats))
}

/// Recorded fare samples for one flight, for fare charts.
#[openapi(tag = "Flights")]
#[get("/flights/<flight_id>/fare-history?<tier>")]
pub async fn fare_history(
    flight_id: i64,
    tier: Option<String>,
    flight_service: &State<FlightService>,
) -> Result<Json<Vec<FareHistorySample>>, AppError> {
    let tier = tier.map(|raw| CabinClass::parse(&raw)).transpose()?;
    let samples = flight_service.fare_history(flight_id, tier).await?;
    Ok(Json(samples))
}

/// Synthetic upcoming-schedule feed for one airline.
#[openapi(tag = "Flights")]
#[get("/airlines/<airline_code>/schedule")]
pub async fn schedule_feed(
    airline_code: String,
    flight_service: &State<FlightService>,
) -> Result<Json<Vec<ScheduleEntry>>, AppError> {
    let entries = flight_service
        .schedule_feed(&airline_code.to_uppercase())
        .await?;
    Ok(Json(entries))
}
