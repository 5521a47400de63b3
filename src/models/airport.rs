use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow, Serialize, JsonSchema)]
pub struct Airport {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub city: String,
    pub country: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NewAirport {
    pub code: String,
    pub name: String,
    pub city: String,
    pub country: String,
}
