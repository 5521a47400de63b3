use chrono::NaiveDateTime;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::flight::FlightStatus;
use crate::models::seat::CabinClass;
use crate::models::ticket::TicketView;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, sqlx::Type,
)]
pub enum BookingStatus {
    Held,
    PendingPayment,
    Confirmed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    /// States in which payment may still be attempted.
    pub fn is_payable(&self) -> bool {
        matches!(self, BookingStatus::Held | BookingStatus::PendingPayment)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Booking {
    pub id: i64,
    pub booking_reference: String,
    pub pnr: Option<String>,
    pub user_id: i64,
    pub flight_id: i64,
    pub tier: CabinClass,
    pub status: BookingStatus,
    pub total_fare: f64,
    pub paid_amount: Option<f64>,
    pub created_at: NaiveDateTime,
    pub hold_expires_at: NaiveDateTime,
    pub transaction_id: Option<String>,
}

/// One traveller in a hold request; `seat_id` pins a specific seat.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PassengerSpec {
    pub name: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub seat_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateBookingRequest {
    pub flight_id: i64,
    pub tier: CabinClass,
    pub passengers: Vec<PassengerSpec>,
    /// The unit fare the client last saw; holds fail if it drifted too far.
    pub quoted_fare: Option<f64>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct BookingResponse {
    pub id: i64,
    pub booking_reference: String,
    pub pnr: Option<String>,
    pub flight_id: i64,
    pub tier: CabinClass,
    pub status: BookingStatus,
    pub total_fare: f64,
    pub paid_amount: Option<f64>,
    pub created_at: NaiveDateTime,
    pub hold_expires_at: NaiveDateTime,
    pub transaction_id: Option<String>,
    pub tickets: Vec<TicketView>,
}

/// Redacted public status view, safe to expose without auth.
#[derive(Debug, Serialize, JsonSchema)]
pub struct PnrStatusView {
    pub pnr: String,
    pub status: BookingStatus,
    pub flight_number: String,
    pub origin_code: String,
    pub destination_code: String,
    pub departure_time: NaiveDateTime,
    pub arrival_time: NaiveDateTime,
    pub flight_status: FlightStatus,
}
