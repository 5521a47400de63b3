use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::utils::error::{AppError, AppResult};

/// Fare bucket a seat (and a booking) belongs to. Stored verbatim as TEXT.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema, sqlx::Type,
)]
pub enum CabinClass {
    Economy,
    EconomyFlex,
    Business,
    First,
}

impl CabinClass {
    pub const ALL: [CabinClass; 4] = [
        CabinClass::Economy,
        CabinClass::EconomyFlex,
        CabinClass::Business,
        CabinClass::First,
    ];

    pub fn parse(raw: &str) -> AppResult<CabinClass> {
        match raw.to_ascii_lowercase().as_str() {
            "economy" => Ok(CabinClass::Economy),
            "economyflex" | "economy_flex" => Ok(CabinClass::EconomyFlex),
            "business" => Ok(CabinClass::Business),
            "first" => Ok(CabinClass::First),
            other => Err(AppError::InvalidArgument(format!(
                "unknown cabin class '{other}'"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CabinClass::Economy => "Economy",
            CabinClass::EconomyFlex => "EconomyFlex",
            CabinClass::Business => "Business",
            CabinClass::First => "First",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, sqlx::Type,
)]
pub enum SeatPosition {
    Window,
    Aisle,
    Middle,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, sqlx::Type,
)]
pub enum SeatStatus {
    Available,
    Held,
    Sold,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Seat {
    pub id: i64,
    pub flight_id: i64,
    pub seat_number: String,
    pub class: CabinClass,
    pub position: SeatPosition,
    pub surcharge: f64,
    pub status: SeatStatus,
    pub booking_id: Option<i64>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SeatView {
    pub id: i64,
    pub seat_number: String,
    pub class: CabinClass,
    pub position: SeatPosition,
    pub surcharge: f64,
    pub status: SeatStatus,
}

impl From<Seat> for SeatView {
    fn from(seat: Seat) -> Self {
        SeatView {
            id: seat.id,
            seat_number: seat.seat_number,
            class: seat.class,
            position: seat.position,
            surcharge: seat.surcharge,
            status: seat.status,
        }
    }
}
