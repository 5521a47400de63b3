use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::services::booking_service::BookingService;

/// Periodic actor that expires lapsed holds and reclaims their seats.
/// Cancellable between bookings; never propagates an error.
#[derive(Debug, Clone)]
pub struct HoldReaper {
    bookings: BookingService,
    period: Duration,
}

impl HoldReaper {
    pub fn new(bookings: BookingService, period: Duration) -> Self {
        HoldReaper { bookings, period }
    }

    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.bookings.expire_due_holds().await {
                        Ok(0) => {}
                        Ok(expired) => debug!(expired, "reaper released lapsed holds"),
                        Err(err) => warn!(%err, "reaper sweep failed"),
                    }
                }
                _ = stop.changed() => {
                    info!("hold reaper stopping");
                    return;
                }
            }
        }
    }
}
