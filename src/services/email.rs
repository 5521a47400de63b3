use tracing::info;

use crate::services::receipt::ReceiptDocument;

/// Post-commit receipt hand-off. Delivery is fire-and-forget: a failure to
/// send never rolls back the confirmation that produced the receipt.
#[derive(Debug, Clone, Default)]
pub struct ReceiptMailer;

impl ReceiptMailer {
    pub fn enqueue(&self, document: ReceiptDocument) {
        tokio::spawn(async move {
            // Stand-in for an SMTP/queue client; the record is already
            // renderer-ready at this point.
            info!(
                pnr = %document.pnr,
                reference = %document.booking_reference,
                cancelled = document.cancelled,
                "receipt email queued"
            );
        });
    }
}
