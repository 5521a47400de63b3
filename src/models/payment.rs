use chrono::NaiveDateTime;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, sqlx::Type,
)]
pub enum PaymentMethod {
    Card,
    #[serde(rename = "UPI")]
    #[sqlx(rename = "UPI")]
    Upi,
    NetBanking,
    Wallet,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, sqlx::Type,
)]
pub enum PaymentStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, JsonSchema)]
pub struct Payment {
    pub id: i64,
    pub booking_reference: String,
    pub amount: f64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PaymentRequest {
    pub booking_reference: String,
    pub amount: f64,
    pub method: PaymentMethod,
}
