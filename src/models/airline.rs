use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow, Serialize, JsonSchema)]
pub struct Airline {
    pub id: i64,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NewAirline {
    pub code: String,
    pub name: String,
}
