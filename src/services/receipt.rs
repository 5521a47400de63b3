use chrono::NaiveDateTime;
use schemars::JsonSchema;
use serde::Serialize;

use crate::models::seat::CabinClass;

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ReceiptPassenger {
    pub name: String,
    pub seat_number: String,
    pub class: CabinClass,
    pub ticket_number: Option<String>,
}

/// The structured record handed to a renderer. The core never concerns
/// itself with the rendered bytes.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ReceiptDocument {
    pub pnr: String,
    pub booking_reference: String,
    pub flight_number: String,
    pub airline_code: String,
    pub origin_code: String,
    pub destination_code: String,
    pub departure_time: NaiveDateTime,
    pub arrival_time: NaiveDateTime,
    pub passengers: Vec<ReceiptPassenger>,
    pub total_fare: f64,
    pub paid_amount: f64,
    pub paid_at: NaiveDateTime,
    pub transaction_id: String,
    pub cancelled: bool,
}

pub trait ReceiptRenderer: Send + Sync {
    fn render(&self, document: &ReceiptDocument) -> Vec<u8>;
}

/// Minimal renderer shipped with the core; PDF/HTML engines plug in behind
/// the same trait.
#[derive(Debug, Clone, Default)]
pub struct PlainTextRenderer;

impl ReceiptRenderer for PlainTextRenderer {
    fn render(&self, document: &ReceiptDocument) -> Vec<u8> {
        let mut out = String::new();
        let title = if document.cancelled {
            "CANCELLATION RECEIPT"
        } else {
            "BOOKING RECEIPT"
        };
        out.push_str(&format!("=== GaganYatra {title} ===\n"));
        out.push_str(&format!("PNR: {}\n", document.pnr));
        out.push_str(&format!("Reference: {}\n", document.booking_reference));
        out.push_str(&format!(
            "Flight: {} {}  {} -> {}\n",
            document.airline_code,
            document.flight_number,
            document.origin_code,
            document.destination_code
        ));
        out.push_str(&format!(
            "Departure: {}  Arrival: {}\n",
            document.departure_time, document.arrival_time
        ));
        out.push_str("Passengers:\n");
        for passenger in &document.passengers {
            out.push_str(&format!(
                "  {} - seat {} ({:?}){}\n",
                passenger.name,
                passenger.seat_number,
                passenger.class,
                passenger
                    .ticket_number
                    .as_deref()
                    .map(|t| format!(", ticket {t}"))
                    .unwrap_or_default()
            ));
        }
        out.push_str(&format!("Total fare: {:.2}\n", document.total_fare));
        out.push_str(&format!(
            "Paid: {:.2} at {} (transaction {})\n",
            document.paid_amount, document.paid_at, document.transaction_id
        ));
        out.into_bytes()
    }
}
