use schemars::JsonSchema;
use serde::Serialize;

use crate::models::seat::CabinClass;

/// Ticket joined with its seat, as returned inside a booking record.
/// Ticket numbers are assigned at confirmation; until then the row is
/// tentative.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, JsonSchema)]
pub struct TicketView {
    pub id: i64,
    pub passenger_name: String,
    pub passenger_age: Option<i64>,
    pub passenger_gender: Option<String>,
    pub seat_id: i64,
    pub seat_number: String,
    pub class: CabinClass,
    pub ticket_number: Option<String>,
}
