use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use crate::models::seat::CabinClass;
use crate::utils::error::{AppError, AppResult};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, sqlx::Type,
)]
pub enum FlightStatus {
    Scheduled,
    Boarding,
    Delayed,
    Departed,
    Landed,
    Cancelled,
}

impl FlightStatus {
    /// A flight stops accepting holds once it leaves the ground or is scrubbed.
    pub fn is_bookable(&self) -> bool {
        !matches!(
            self,
            FlightStatus::Cancelled | FlightStatus::Departed | FlightStatus::Landed
        )
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Flight {
    pub id: i64,
    pub flight_number: String,
    pub airline_code: String,
    pub origin_code: String,
    pub destination_code: String,
    pub aircraft_id: i64,
    pub departure_time: NaiveDateTime,
    pub arrival_time: NaiveDateTime,
    pub base_fares: Json<BTreeMap<CabinClass, f64>>,
    pub demand_index: i64,
    pub status: FlightStatus,
    pub delay_minutes: i64,
    pub delay_reason: Option<String>,
    pub gate: Option<String>,
}

impl Flight {
    pub fn base_fare(&self, tier: CabinClass) -> AppResult<f64> {
        self.base_fares.get(&tier).copied().ok_or_else(|| {
            AppError::InvalidArgument(format!(
                "flight {} has no {} fare",
                self.flight_number,
                tier.as_str()
            ))
        })
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.arrival_time - self.departure_time).num_minutes()
    }
}

/// Inputs for creating a catalog flight (seeding / admin).
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct NewFlight {
    pub flight_number: String,
    pub airline_code: String,
    pub origin_code: String,
    pub destination_code: String,
    pub aircraft_id: i64,
    pub departure_time: NaiveDateTime,
    pub arrival_time: NaiveDateTime,
    pub base_fares: BTreeMap<CabinClass, f64>,
    pub demand_index: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Price,
    Duration,
    Departure,
}

impl SortKey {
    pub fn parse(raw: &str) -> AppResult<SortKey> {
        match raw {
            "price" => Ok(SortKey::Price),
            "duration" => Ok(SortKey::Duration),
            "departure" => Ok(SortKey::Departure),
            other => Err(AppError::InvalidArgument(format!(
                "unknown sort key '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub origin: String,
    pub destination: String,
    pub date: Option<chrono::NaiveDate>,
    pub passengers: i64,
    pub tier: Option<CabinClass>,
    pub sort: SortKey,
    pub page: i64,
    pub page_size: i64,
}

/// One search result: static flight fields plus live fares and availability.
#[derive(Debug, Serialize, JsonSchema)]
pub struct FlightSummary {
    pub id: i64,
    pub flight_number: String,
    pub airline_code: String,
    pub origin_code: String,
    pub destination_code: String,
    pub departure_time: NaiveDateTime,
    pub arrival_time: NaiveDateTime,
    pub duration_minutes: i64,
    pub status: FlightStatus,
    pub delay_minutes: i64,
    pub gate: Option<String>,
    pub price_map: BTreeMap<CabinClass, f64>,
    pub seats_by_class: BTreeMap<CabinClass, i64>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct FlightSearchResponse {
    pub flights: Vec<FlightSummary>,
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FlightStatusUpdate {
    pub status: FlightStatus,
    pub delay_minutes: Option<i64>,
    pub delay_reason: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GateAssignment {
    pub gate: String,
}

/// Entry in the synthetic schedule feed for one airline.
#[derive(Debug, Serialize, JsonSchema)]
pub struct ScheduleEntry {
    pub flight_number: String,
    pub origin_code: String,
    pub destination_code: String,
    pub departure_time: NaiveDateTime,
    pub arrival_time: NaiveDateTime,
    pub status: FlightStatus,
    pub gate: Option<String>,
}
