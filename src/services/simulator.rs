use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use rand::Rng;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::db::Store;
use crate::models::flight::Flight;
use crate::services::flight_service::class_counts;
use crate::services::pricing::{compute_fare, FareSnapshot};
use crate::utils::error::AppResult;

/// Periodic actor that drifts each upcoming flight's demand index and
/// appends a fare-history sample per tier. Each flight is updated in its own
/// short transaction; a failure on one flight never aborts the tick.
#[derive(Debug, Clone)]
pub struct DemandSimulator {
    store: Store,
    period: Duration,
}

impl DemandSimulator {
    pub fn new(store: Store, period: Duration) -> Self {
        DemandSimulator { store, period }
    }

    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of a tokio interval fires immediately; swallow it so
        // the initial fares stay at their seeded values for one full period.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_tick().await {
                        Ok(updated) => debug!(updated, "demand tick complete"),
                        Err(err) => warn!(%err, "demand tick failed to enumerate flights"),
                    }
                }
                _ = stop.changed() => {
                    info!("demand simulator stopping");
                    return;
                }
            }
        }
    }

    /// One tick: returns the number of flights updated.
    pub async fn run_tick(&self) -> AppResult<u64> {
        let now = Utc::now().naive_utc();
        let flights = sqlx::query_as::<_, Flight>(
            "SELECT * FROM flights
             WHERE departure_time > ?
               AND status NOT IN ('Cancelled', 'Departed', 'Landed')",
        )
        .bind(now)
        .fetch_all(self.store.pool())
        .await?;

        let mut updated = 0;
        for flight in flights {
            match self.update_flight(&flight, now).await {
                Ok(()) => updated += 1,
                Err(err) => warn!(flight_id = flight.id, %err, "skipping flight in demand tick"),
            }
        }
        Ok(updated)
    }

    async fn update_flight(&self, flight: &Flight, now: NaiveDateTime) -> AppResult<()> {
        let hours_to_departure =
            (flight.departure_time - now).num_seconds() as f64 / 3600.0;
        let new_index = next_demand_index(flight.demand_index, hours_to_departure);

        let mut tx = self.store.begin().await?;
        sqlx::query("UPDATE flights SET demand_index = ? WHERE id = ?")
            .bind(new_index)
            .bind(flight.id)
            .execute(&mut *tx)
            .await?;

        let counts = class_counts(&mut *tx, flight.id).await?;
        for (tier, base_fare) in flight.base_fares.iter() {
            let (available, total) = counts.get(tier).copied().unwrap_or((0, 0));
            if total == 0 {
                continue;
            }
            let fare = compute_fare(&FareSnapshot {
                base_fare: *base_fare,
                seats_available: available,
                seats_total: total,
                hours_to_departure,
                demand_index: new_index,
                tier: *tier,
            })?;
            sqlx::query(
                "INSERT INTO fare_history (flight_id, tier, fare, demand_index, sampled_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(flight.id)
            .bind(*tier)
            .bind(fare)
            .bind(new_index)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Bounded random walk over [0, 100]. The upward pull grows as departure
/// approaches, simulating booking pressure.
fn next_demand_index(current: i64, hours_to_departure: f64) -> i64 {
    let pull = if hours_to_departure < 48.0 {
        6
    } else if hours_to_departure < 168.0 {
        3
    } else {
        1
    };
    let step = rand::thread_rng().gen_range(-8..=8) + pull;
    (current + step).clamp(0, 100)
}
