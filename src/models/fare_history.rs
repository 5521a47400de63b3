use chrono::NaiveDateTime;
use schemars::JsonSchema;
use serde::Serialize;

use crate::models::seat::CabinClass;

/// Append-only sample of the live fare at one simulator tick.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, JsonSchema)]
pub struct FareHistorySample {
    pub id: i64,
    pub flight_id: i64,
    pub tier: CabinClass,
    pub fare: f64,
    pub demand_index: i64,
    pub sampled_at: NaiveDateTime,
}
