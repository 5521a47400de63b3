use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::Sqlite;

use crate::db::Store;
use crate::models::aircraft::{Aircraft, NewAircraft};
use crate::models::airline::{Airline, NewAirline};
use crate::models::airport::{Airport, NewAirport};
use crate::models::fare_history::FareHistorySample;
use crate::models::flight::{
    Flight, FlightStatusUpdate, GateAssignment, NewFlight, ScheduleEntry,
};
use crate::models::seat::{CabinClass, Seat, SeatPosition, SeatView};
use crate::utils::error::{AppError, AppResult};

const WINDOW_SURCHARGE: f64 = 200.0;
const AISLE_SURCHARGE: f64 = 150.0;

/// Map a unique-constraint violation to Conflict; everything else keeps its
/// original classification so transient failures stay retryable.
fn conflict_on_unique(err: sqlx::Error, message: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return AppError::Conflict(message.to_string());
        }
    }
    err.into()
}

/// Catalog operations: reference data, flight creation with seat
/// materialization, staff updates, and the synthetic schedule feed.
#[derive(Debug, Clone)]
pub struct FlightService {
    store: Store,
}

impl FlightService {
    pub fn new(store: Store) -> Self {
        FlightService { store }
    }

    pub async fn create_airport(&self, new: NewAirport) -> AppResult<Airport> {
        if new.code.len() != 3 {
            return Err(AppError::InvalidArgument(format!(
                "airport code '{}' must be 3 characters",
                new.code
            )));
        }
        let result = sqlx::query(
            "INSERT INTO airports (code, name, city, country) VALUES (?, ?, ?, ?)",
        )
        .bind(new.code.to_uppercase())
        .bind(&new.name)
        .bind(&new.city)
        .bind(&new.country)
        .execute(self.store.pool())
        .await
        .map_err(|err| conflict_on_unique(err, "airport code already registered"))?;

        self.airport_by_id(result.last_insert_rowid()).await
    }

    pub async fn create_airline(&self, new: NewAirline) -> AppResult<Airline> {
        if new.code.len() != 2 {
            return Err(AppError::InvalidArgument(format!(
                "airline code '{}' must be 2 characters",
                new.code
            )));
        }
        let result = sqlx::query("INSERT INTO airlines (code, name) VALUES (?, ?)")
            .bind(new.code.to_uppercase())
            .bind(&new.name)
            .execute(self.store.pool())
            .await
            .map_err(|err| conflict_on_unique(err, "airline code already registered"))?;

        let airline = sqlx::query_as::<_, Airline>("SELECT * FROM airlines WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(self.store.pool())
            .await?;
        Ok(airline)
    }

    pub async fn create_aircraft(&self, new: NewAircraft) -> AppResult<Aircraft> {
        let total =
            new.economy_seats + new.economy_flex_seats + new.business_seats + new.first_seats;
        if total <= 0 {
            return Err(AppError::InvalidArgument(
                "aircraft must have at least one seat".into(),
            ));
        }
        let result = sqlx::query(
            "INSERT INTO aircraft
                (registration, model, total_seats, economy_seats, economy_flex_seats,
                 business_seats, first_seats)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new.registration)
        .bind(&new.model)
        .bind(total)
        .bind(new.economy_seats)
        .bind(new.economy_flex_seats)
        .bind(new.business_seats)
        .bind(new.first_seats)
        .execute(self.store.pool())
        .await
        .map_err(|err| conflict_on_unique(err, "aircraft registration already known"))?;

        let aircraft = sqlx::query_as::<_, Aircraft>("SELECT * FROM aircraft WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(self.store.pool())
            .await?;
        Ok(aircraft)
    }

    /// Create a flight and materialize its seat map from the aircraft's
    /// cabin layout, all in one transaction.
    pub async fn create_flight(&self, new: NewFlight) -> AppResult<Flight> {
        if new.arrival_time <= new.departure_time {
            return Err(AppError::InvalidArgument(
                "arrival_time must be after departure_time".into(),
            ));
        }
        if new.base_fares.is_empty() {
            return Err(AppError::InvalidArgument(
                "base_fares must name at least one tier".into(),
            ));
        }
        if new.base_fares.values().any(|fare| *fare <= 0.0) {
            return Err(AppError::InvalidArgument(
                "base fares must be positive".into(),
            ));
        }
        if !(0..=100).contains(&new.demand_index) {
            return Err(AppError::InvalidArgument(
                "demand_index must lie in 0..=100".into(),
            ));
        }

        let mut tx = self.store.begin().await?;

        sqlx::query("SELECT code FROM airlines WHERE code = ?")
            .bind(&new.airline_code)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("airline {}", new.airline_code)))?;
        for code in [&new.origin_code, &new.destination_code] {
            sqlx::query("SELECT code FROM airports WHERE code = ?")
                .bind(code)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("airport {code}")))?;
        }
        let aircraft = sqlx::query_as::<_, Aircraft>("SELECT * FROM aircraft WHERE id = ?")
            .bind(new.aircraft_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("aircraft {}", new.aircraft_id)))?;

        let result = sqlx::query(
            "INSERT INTO flights
                (flight_number, airline_code, origin_code, destination_code, aircraft_id,
                 departure_time, arrival_time, base_fares, demand_index)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new.flight_number)
        .bind(&new.airline_code)
        .bind(&new.origin_code)
        .bind(&new.destination_code)
        .bind(new.aircraft_id)
        .bind(new.departure_time)
        .bind(new.arrival_time)
        .bind(sqlx::types::Json(&new.base_fares))
        .bind(new.demand_index)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            conflict_on_unique(
                err,
                &format!(
                    "flight {} already scheduled for that day",
                    new.flight_number
                ),
            )
        })?;
        let flight_id = result.last_insert_rowid();

        materialize_seats(&mut tx, flight_id, &aircraft).await?;

        tx.commit().await?;
        fetch_flight(self.store.pool(), flight_id).await
    }

    pub async fn get_flight(&self, flight_id: i64) -> AppResult<Flight> {
        fetch_flight(self.store.pool(), flight_id).await
    }

    /// Full seat map for seat selection in the booking flow.
    pub async fn seats_for_flight(&self, flight_id: i64) -> AppResult<Vec<SeatView>> {
        fetch_flight(self.store.pool(), flight_id).await?;
        let seats = sqlx::query_as::<_, Seat>(
            "SELECT * FROM seats WHERE flight_id = ?
             ORDER BY length(seat_number), seat_number",
        )
        .bind(flight_id)
        .fetch_all(self.store.pool())
        .await?;
        Ok(seats.into_iter().map(SeatView::from).collect())
    }

    /// Recorded fare samples for one flight, oldest first.
    pub async fn fare_history(
        &self,
        flight_id: i64,
        tier: Option<CabinClass>,
    ) -> AppResult<Vec<FareHistorySample>> {
        fetch_flight(self.store.pool(), flight_id).await?;
        let samples = match tier {
            Some(tier) => {
                sqlx::query_as::<_, FareHistorySample>(
                    "SELECT * FROM fare_history
                     WHERE flight_id = ? AND tier = ? ORDER BY sampled_at, id",
                )
                .bind(flight_id)
                .bind(tier)
                .fetch_all(self.store.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, FareHistorySample>(
                    "SELECT * FROM fare_history
                     WHERE flight_id = ? ORDER BY sampled_at, id",
                )
                .bind(flight_id)
                .fetch_all(self.store.pool())
                .await?
            }
        };
        Ok(samples)
    }

    /// Staff operation: status transition plus delay bookkeeping.
    pub async fn update_status(
        &self,
        flight_id: i64,
        update: FlightStatusUpdate,
    ) -> AppResult<Flight> {
        let mut tx = self.store.begin().await?;
        fetch_flight(&mut *tx, flight_id).await?;
        sqlx::query(
            "UPDATE flights SET status = ?, delay_minutes = ?, delay_reason = ? WHERE id = ?",
        )
        .bind(update.status)
        .bind(update.delay_minutes.unwrap_or(0))
        .bind(&update.delay_reason)
        .bind(flight_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        fetch_flight(self.store.pool(), flight_id).await
    }

    /// Airport-authority operation.
    pub async fn assign_gate(&self, flight_id: i64, update: GateAssignment) -> AppResult<Flight> {
        let mut tx = self.store.begin().await?;
        fetch_flight(&mut *tx, flight_id).await?;
        sqlx::query("UPDATE flights SET gate = ? WHERE id = ?")
            .bind(&update.gate)
            .bind(flight_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        fetch_flight(self.store.pool(), flight_id).await
    }

    /// Synthetic schedule feed: a deterministic projection of one airline's
    /// upcoming flights. Not consulted by the booking pipeline.
    pub async fn schedule_feed(&self, airline_code: &str) -> AppResult<Vec<ScheduleEntry>> {
        sqlx::query("SELECT code FROM airlines WHERE code = ?")
            .bind(airline_code)
            .fetch_optional(self.store.pool())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("airline {airline_code}")))?;

        let now = Utc::now().naive_utc();
        let flights = sqlx::query_as::<_, Flight>(
            "SELECT * FROM flights
             WHERE airline_code = ? AND departure_time > ?
             ORDER BY departure_time, id",
        )
        .bind(airline_code)
        .bind(now)
        .fetch_all(self.store.pool())
        .await?;

        Ok(flights
            .into_iter()
            .map(|f| ScheduleEntry {
                flight_number: f.flight_number,
                origin_code: f.origin_code,
                destination_code: f.destination_code,
                departure_time: f.departure_time,
                arrival_time: f.arrival_time,
                status: f.status,
                gate: f.gate,
            })
            .collect())
    }

    async fn airport_by_id(&self, id: i64) -> AppResult<Airport> {
        let airport = sqlx::query_as::<_, Airport>("SELECT * FROM airports WHERE id = ?")
            .bind(id)
            .fetch_one(self.store.pool())
            .await?;
        Ok(airport)
    }
}

/// Seat rows are laid out six abreast (A-F), premium cabins first. A and F
/// are windows, C and D aisles; window and aisle seats carry a surcharge.
async fn materialize_seats(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    flight_id: i64,
    aircraft: &Aircraft,
) -> AppResult<()> {
    const LETTERS: [char; 6] = ['A', 'B', 'C', 'D', 'E', 'F'];

    let mut row = 1;
    for (class, count) in aircraft.class_distribution() {
        let mut remaining = count;
        while remaining > 0 {
            let in_row = remaining.min(6) as usize;
            for letter in LETTERS.iter().take(in_row) {
                let position = match letter {
                    'A' | 'F' => SeatPosition::Window,
                    'C' | 'D' => SeatPosition::Aisle,
                    _ => SeatPosition::Middle,
                };
                let surcharge = match position {
                    SeatPosition::Window => WINDOW_SURCHARGE,
                    SeatPosition::Aisle => AISLE_SURCHARGE,
                    SeatPosition::Middle => 0.0,
                };
                sqlx::query(
                    "INSERT INTO seats (flight_id, seat_number, class, position, surcharge)
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(flight_id)
                .bind(format!("{row}{letter}"))
                .bind(class)
                .bind(position)
                .bind(surcharge)
                .execute(&mut **tx)
                .await?;
            }
            remaining -= in_row as i64;
            row += 1;
        }
    }
    Ok(())
}

pub(crate) async fn fetch_flight<'e, E>(exec: E, flight_id: i64) -> AppResult<Flight>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Flight>("SELECT * FROM flights WHERE id = ?")
        .bind(flight_id)
        .fetch_optional(exec)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("flight {flight_id}")))
}

/// Per-class (available, total) seat counts for one flight.
pub(crate) async fn class_counts<'e, E>(
    exec: E,
    flight_id: i64,
) -> AppResult<BTreeMap<CabinClass, (i64, i64)>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, (CabinClass, i64, i64)>(
        "SELECT class,
                COALESCE(SUM(status = 'Available'), 0),
                COUNT(*)
         FROM seats WHERE flight_id = ? GROUP BY class",
    )
    .bind(flight_id)
    .fetch_all(exec)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(class, available, total)| (class, (available, total)))
        .collect())
}
