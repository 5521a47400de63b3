use chrono::{Duration, NaiveDateTime, Utc};
use rand::Rng;
use sqlx::{Sqlite, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::Store;
use crate::models::booking::{Booking, BookingResponse, BookingStatus, CreateBookingRequest, PnrStatusView};
use crate::models::flight::Flight;
use crate::models::payment::{Payment, PaymentMethod, PaymentStatus};
use crate::models::seat::{Seat, SeatStatus};
use crate::models::ticket::TicketView;
use crate::models::user::Role;
use crate::services::email::ReceiptMailer;
use crate::services::flight_service::{class_counts, fetch_flight};
use crate::services::pricing::{compute_fare, round2, FareSnapshot};
use crate::services::receipt::{ReceiptDocument, ReceiptPassenger};
use crate::utils::error::{AppError, AppResult};
use crate::utils::pnr::{random_pnr, MAX_GENERATION_ATTEMPTS};
use crate::utils::retry::{retry, RetryPolicy};

pub const MAX_PASSENGERS: usize = 9;

/// Amounts are compared in major units; anything under half a minor unit
/// counts as equal.
const AMOUNT_EPSILON: f64 = 0.005;

#[derive(Debug)]
pub struct PaymentOutcome {
    pub success: bool,
    pub transaction_id: String,
}

/// Simulated settlement adapter. Success probability is configuration;
/// everything else about the charge is fictional.
#[derive(Debug, Clone)]
pub struct PaymentGateway {
    success_probability: f64,
}

impl PaymentGateway {
    pub fn new(success_probability: f64) -> Self {
        PaymentGateway {
            success_probability: success_probability.clamp(0.0, 1.0),
        }
    }

    pub fn charge(&self, _amount: f64, _method: PaymentMethod) -> PaymentOutcome {
        let success = rand::thread_rng().gen_bool(self.success_probability);
        PaymentOutcome {
            success,
            transaction_id: Uuid::new_v4().to_string(),
        }
    }
}

/// The booking pipeline: hold creation, payment and confirmation, expiry,
/// cancellation. Every step runs in its own transaction; the write-path
/// transactions are wrapped in the lock-race retry combinator.
#[derive(Debug, Clone)]
pub struct BookingService {
    store: Store,
    hold_ttl_seconds: i64,
    price_drift_tolerance: f64,
    gateway: PaymentGateway,
    mailer: ReceiptMailer,
    retry_policy: RetryPolicy,
}

impl BookingService {
    pub fn new(store: Store, config: &AppConfig) -> Self {
        BookingService {
            store,
            hold_ttl_seconds: config.hold_ttl_seconds,
            price_drift_tolerance: config.price_drift_tolerance,
            gateway: PaymentGateway::new(config.payment_success_probability),
            mailer: ReceiptMailer,
            retry_policy: RetryPolicy::default(),
        }
    }

    // ----- hold creation -------------------------------------------------

    pub async fn create_hold(
        &self,
        user_id: i64,
        request: CreateBookingRequest,
    ) -> AppResult<BookingResponse> {
        if request.passengers.is_empty() {
            return Err(AppError::InvalidArgument(
                "at least one passenger is required".into(),
            ));
        }
        if request.passengers.len() > MAX_PASSENGERS {
            return Err(AppError::InvalidArgument(format!(
                "passenger count exceeds the limit of {MAX_PASSENGERS}"
            )));
        }
        if let Some(quoted) = request.quoted_fare {
            if quoted <= 0.0 {
                return Err(AppError::InvalidArgument(
                    "quoted fare must be positive".into(),
                ));
            }
        }

        let booking_id = retry(&self.retry_policy, || {
            self.try_create_hold(user_id, &request)
        })
        .await?;
        self.booking_response_by_id(booking_id).await
    }

    async fn try_create_hold(
        &self,
        user_id: i64,
        request: &CreateBookingRequest,
    ) -> AppResult<i64> {
        let now = Utc::now().naive_utc();
        let mut tx = self.store.begin().await?;

        let flight = fetch_flight(&mut *tx, request.flight_id).await?;
        if !flight.status.is_bookable() {
            return Err(AppError::FlightNotBookable(format!(
                "flight {} is {:?}",
                flight.flight_number, flight.status
            )));
        }
        let base_fare = flight.base_fare(request.tier)?;

        // Capacity snapshot before allocation; this is what the fare sees.
        let counts = class_counts(&mut *tx, flight.id).await?;
        let (available, total) = counts.get(&request.tier).copied().unwrap_or((0, 0));
        if total == 0 {
            return Err(AppError::InvalidArgument(format!(
                "flight {} has no {} cabin",
                flight.flight_number,
                request.tier.as_str()
            )));
        }

        let seats = self.allocate_seats(&mut tx, &flight, request).await?;

        let hours_to_departure = (flight.departure_time - now).num_seconds() as f64 / 3600.0;
        let unit_fare = compute_fare(&FareSnapshot {
            base_fare,
            seats_available: available,
            seats_total: total,
            hours_to_departure,
            demand_index: flight.demand_index,
            tier: request.tier,
        })?;

        if let Some(quoted) = request.quoted_fare {
            if ((unit_fare - quoted) / quoted).abs() > self.price_drift_tolerance {
                return Err(AppError::PriceChanged(format!(
                    "quoted {quoted:.2} but the current fare is {unit_fare:.2}; please re-quote"
                )));
            }
        }

        let surcharges: f64 = seats.iter().map(|seat| seat.surcharge).sum();
        let total_fare = round2(unit_fare * request.passengers.len() as f64 + surcharges);

        let booking_reference = Uuid::new_v4().to_string();
        let hold_expires_at = now + Duration::seconds(self.hold_ttl_seconds);
        let result = sqlx::query(
            "INSERT INTO bookings
                (booking_reference, user_id, flight_id, tier, status, total_fare,
                 created_at, hold_expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&booking_reference)
        .bind(user_id)
        .bind(flight.id)
        .bind(request.tier)
        .bind(BookingStatus::Held)
        .bind(total_fare)
        .bind(now)
        .bind(hold_expires_at)
        .execute(&mut *tx)
        .await?;
        let booking_id = result.last_insert_rowid();

        for (passenger, seat) in request.passengers.iter().zip(&seats) {
            let updated = sqlx::query(
                "UPDATE seats SET status = ?, booking_id = ? WHERE id = ? AND status = ?",
            )
            .bind(SeatStatus::Held)
            .bind(booking_id)
            .bind(seat.id)
            .bind(SeatStatus::Available)
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() != 1 {
                return Err(AppError::SeatUnavailable(format!(
                    "seat {} was taken concurrently",
                    seat.seat_number
                )));
            }

            sqlx::query(
                "INSERT INTO tickets
                    (booking_id, flight_id, seat_id, passenger_name, passenger_age,
                     passenger_gender)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(booking_id)
            .bind(flight.id)
            .bind(seat.id)
            .bind(&passenger.name)
            .bind(passenger.age)
            .bind(&passenger.gender)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(%booking_reference, flight_id = flight.id, "hold created");
        Ok(booking_id)
    }

    /// Pin requested seats, then fill the rest with the next available seats
    /// of the tier in seat-number order. Returns one seat per passenger, in
    /// passenger order.
    async fn allocate_seats(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        flight: &Flight,
        request: &CreateBookingRequest,
    ) -> AppResult<Vec<Seat>> {
        let mut chosen: Vec<Option<Seat>> = vec![None; request.passengers.len()];
        let mut taken: Vec<i64> = Vec::new();

        for (idx, passenger) in request.passengers.iter().enumerate() {
            let Some(seat_id) = passenger.seat_id else {
                continue;
            };
            if taken.contains(&seat_id) {
                return Err(AppError::SeatUnavailable(format!(
                    "seat {seat_id} requested for more than one passenger"
                )));
            }
            let seat = sqlx::query_as::<_, Seat>(
                "SELECT * FROM seats WHERE id = ? AND flight_id = ?",
            )
            .bind(seat_id)
            .bind(flight.id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| {
                AppError::SeatUnavailable(format!("seat {seat_id} does not exist on this flight"))
            })?;
            if seat.status != SeatStatus::Available {
                return Err(AppError::SeatUnavailable(format!(
                    "seat {} is {:?}",
                    seat.seat_number, seat.status
                )));
            }
            if seat.class != request.tier {
                return Err(AppError::InvalidArgument(format!(
                    "seat {} is {} but the booking is {}",
                    seat.seat_number,
                    seat.class.as_str(),
                    request.tier.as_str()
                )));
            }
            taken.push(seat.id);
            chosen[idx] = Some(seat);
        }

        let unassigned = chosen.iter().filter(|slot| slot.is_none()).count();
        if unassigned > 0 {
            // length-first ordering keeps row 2 ahead of row 10
            let candidates = sqlx::query_as::<_, Seat>(
                "SELECT * FROM seats
                 WHERE flight_id = ? AND class = ? AND status = ?
                 ORDER BY length(seat_number), seat_number
                 LIMIT ?",
            )
            .bind(flight.id)
            .bind(request.tier)
            .bind(SeatStatus::Available)
            .bind((unassigned + taken.len()) as i64)
            .fetch_all(&mut **tx)
            .await?;

            let mut fill = candidates
                .into_iter()
                .filter(|seat| !taken.contains(&seat.id));
            for slot in chosen.iter_mut().filter(|slot| slot.is_none()) {
                *slot = Some(fill.next().ok_or_else(|| {
                    AppError::SeatUnavailable(format!(
                        "not enough {} seats available",
                        request.tier.as_str()
                    ))
                })?);
            }
        }

        Ok(chosen.into_iter().flatten().collect())
    }

    // ----- payment and confirmation --------------------------------------

    pub async fn pay(
        &self,
        booking_reference: &str,
        amount: f64,
        method: PaymentMethod,
    ) -> AppResult<BookingResponse> {
        let booking_id = retry(&self.retry_policy, || {
            self.try_pay(booking_reference, amount, method)
        })
        .await?;

        let response = self.booking_response_by_id(booking_id).await?;
        if response.status == BookingStatus::Confirmed {
            if let Some(pnr) = response.pnr.clone() {
                match self.receipt_document(&pnr).await {
                    Ok(document) => self.mailer.enqueue(document),
                    Err(err) => warn!(%pnr, %err, "could not build receipt for email"),
                }
            }
        }
        Ok(response)
    }

    async fn try_pay(
        &self,
        booking_reference: &str,
        amount: f64,
        method: PaymentMethod,
    ) -> AppResult<i64> {
        let now = Utc::now().naive_utc();
        let mut tx = self.store.begin().await?;

        let booking = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE booking_reference = ?",
        )
        .bind(booking_reference)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_reference}")))?;

        if !booking.status.is_payable() {
            return Err(AppError::InvalidState(format!(
                "booking is {:?}",
                booking.status
            )));
        }
        if now >= booking.hold_expires_at {
            return Err(AppError::HoldExpired(
                "the seat hold has lapsed; create a new booking".into(),
            ));
        }
        if amount + AMOUNT_EPSILON < booking.total_fare {
            return Err(AppError::InvalidArgument(format!(
                "amount {:.2} does not cover the quoted total {:.2}",
                amount, booking.total_fare
            )));
        }

        let outcome = self.gateway.charge(amount, method);
        let payment_status = if outcome.success {
            PaymentStatus::Success
        } else {
            PaymentStatus::Failed
        };
        sqlx::query(
            "INSERT INTO payments
                (booking_reference, amount, method, status, transaction_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(booking_reference)
        .bind(amount)
        .bind(method)
        .bind(payment_status)
        .bind(&outcome.transaction_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if !outcome.success {
            sqlx::query("UPDATE bookings SET status = ? WHERE id = ?")
                .bind(BookingStatus::PendingPayment)
                .bind(booking.id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            return Err(AppError::PaymentFailed(
                "payment was declined; retry before the hold expires".into(),
            ));
        }

        let pnr = issue_pnr(&mut tx).await?;
        sqlx::query(
            "UPDATE bookings
             SET status = ?, paid_amount = ?, transaction_id = ?, pnr = ?
             WHERE id = ?",
        )
        .bind(BookingStatus::Confirmed)
        .bind(amount)
        .bind(&outcome.transaction_id)
        .bind(&pnr)
        .bind(booking.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE seats SET status = ? WHERE booking_id = ? AND status = ?")
            .bind(SeatStatus::Sold)
            .bind(booking.id)
            .bind(SeatStatus::Held)
            .execute(&mut *tx)
            .await?;

        let ticket_ids: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM tickets WHERE booking_id = ? ORDER BY id")
                .bind(booking.id)
                .fetch_all(&mut *tx)
                .await?;
        for ticket_id in ticket_ids {
            sqlx::query("UPDATE tickets SET ticket_number = ? WHERE id = ?")
                .bind(ticket_number())
                .bind(ticket_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!(booking_reference, %pnr, "booking confirmed");
        Ok(booking.id)
    }

    // ----- expiry ---------------------------------------------------------

    /// Expire every lapsed hold, one transaction per booking. Per-booking
    /// failures are logged and skipped. Returns the number expired.
    pub async fn expire_due_holds(&self) -> AppResult<u64> {
        let now = Utc::now().naive_utc();
        let due: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM bookings
             WHERE status IN ('Held', 'PendingPayment') AND hold_expires_at <= ?",
        )
        .bind(now)
        .fetch_all(self.store.pool())
        .await?;

        let mut expired = 0;
        for booking_id in due {
            match self.expire_one(booking_id, now).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(err) => warn!(booking_id, %err, "failed to expire hold"),
            }
        }
        Ok(expired)
    }

    async fn expire_one(&self, booking_id: i64, now: NaiveDateTime) -> AppResult<bool> {
        let mut tx = self.store.begin().await?;
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?")
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(booking) = booking else {
            return Ok(false);
        };
        // Re-check under the transaction; a payment may have won the race.
        if !booking.status.is_payable() || now < booking.hold_expires_at {
            return Ok(false);
        }

        release_seats(&mut tx, booking.id).await?;
        sqlx::query("DELETE FROM tickets WHERE booking_id = ?")
            .bind(booking.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE bookings SET status = ? WHERE id = ?")
            .bind(BookingStatus::Expired)
            .bind(booking.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!(booking_id, "hold expired, seats released");
        Ok(true)
    }

    // ----- cancellation ---------------------------------------------------

    /// Cancel by PNR or, before confirmation (no PNR yet), by booking
    /// reference. Cancelling an already Cancelled or Expired booking is a
    /// no-op that returns the current state.
    pub async fn cancel(
        &self,
        identifier: &str,
        actor_id: i64,
        actor_role: Role,
    ) -> AppResult<BookingResponse> {
        let mut tx = self.store.begin().await?;
        let booking = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings
             WHERE (pnr = ? AND status != 'Expired') OR booking_reference = ?",
        )
        .bind(identifier.to_uppercase())
        .bind(identifier)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("booking {identifier}")))?;

        if actor_role == Role::Customer && booking.user_id != actor_id {
            return Err(AppError::Forbidden(
                "only the owner or staff may cancel a booking".into(),
            ));
        }

        match booking.status {
            BookingStatus::Cancelled | BookingStatus::Expired => {
                drop(tx);
                return self.booking_response_by_id(booking.id).await;
            }
            BookingStatus::Held | BookingStatus::PendingPayment => {
                release_seats(&mut tx, booking.id).await?;
                sqlx::query("DELETE FROM tickets WHERE booking_id = ?")
                    .bind(booking.id)
                    .execute(&mut *tx)
                    .await?;
            }
            BookingStatus::Confirmed => {
                // Seats return to the pool; paid_amount stays on the row for
                // the downstream refund flow.
                release_seats(&mut tx, booking.id).await?;
            }
        }

        sqlx::query("UPDATE bookings SET status = ? WHERE id = ?")
            .bind(BookingStatus::Cancelled)
            .bind(booking.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!(booking_id = booking.id, "booking cancelled");

        if booking.status == BookingStatus::Confirmed {
            if let Some(pnr) = booking.pnr.as_deref() {
                match self.receipt_document(pnr).await {
                    Ok(document) => self.mailer.enqueue(document),
                    Err(err) => warn!(%pnr, %err, "could not build cancellation receipt"),
                }
            }
        }

        self.booking_response_by_id(booking.id).await
    }

    // ----- lookups and receipts ------------------------------------------

    pub async fn booking_by_pnr(&self, pnr: &str) -> AppResult<BookingResponse> {
        let booking = self.fetch_by_pnr(pnr).await?;
        self.booking_response_by_id(booking.id).await
    }

    /// Redacted view safe for the public status endpoint.
    pub async fn pnr_status(&self, pnr: &str) -> AppResult<PnrStatusView> {
        let booking = self.fetch_by_pnr(pnr).await?;
        let flight = fetch_flight(self.store.pool(), booking.flight_id).await?;
        Ok(PnrStatusView {
            pnr: pnr.to_uppercase(),
            status: booking.status,
            flight_number: flight.flight_number,
            origin_code: flight.origin_code,
            destination_code: flight.destination_code,
            departure_time: flight.departure_time,
            arrival_time: flight.arrival_time,
            flight_status: flight.status,
        })
    }

    pub async fn payment_by_transaction(&self, transaction_id: &str) -> AppResult<Payment> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE transaction_id = ?")
            .bind(transaction_id)
            .fetch_optional(self.store.pool())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("transaction {transaction_id}")))
    }

    pub async fn receipt_document(&self, pnr: &str) -> AppResult<ReceiptDocument> {
        let booking = self.fetch_by_pnr(pnr).await?;
        let (Some(paid_amount), Some(transaction_id)) =
            (booking.paid_amount, booking.transaction_id.clone())
        else {
            return Err(AppError::InvalidState(
                "no payment on record for this booking".into(),
            ));
        };

        let flight = fetch_flight(self.store.pool(), booking.flight_id).await?;
        let payment = self.payment_by_transaction(&transaction_id).await?;
        let tickets = self.ticket_views(booking.id).await?;

        Ok(ReceiptDocument {
            pnr: pnr.to_uppercase(),
            booking_reference: booking.booking_reference,
            flight_number: flight.flight_number,
            airline_code: flight.airline_code,
            origin_code: flight.origin_code,
            destination_code: flight.destination_code,
            departure_time: flight.departure_time,
            arrival_time: flight.arrival_time,
            passengers: tickets
                .into_iter()
                .map(|ticket| ReceiptPassenger {
                    name: ticket.passenger_name,
                    seat_number: ticket.seat_number,
                    class: ticket.class,
                    ticket_number: ticket.ticket_number,
                })
                .collect(),
            total_fare: booking.total_fare,
            paid_amount,
            paid_at: payment.created_at,
            transaction_id,
            cancelled: booking.status == BookingStatus::Cancelled,
        })
    }

    async fn fetch_by_pnr(&self, pnr: &str) -> AppResult<Booking> {
        sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE pnr = ? AND status != 'Expired'",
        )
        .bind(pnr.to_uppercase())
        .fetch_optional(self.store.pool())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("pnr {pnr}")))
    }

    pub async fn booking_response_by_id(&self, booking_id: i64) -> AppResult<BookingResponse> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?")
            .bind(booking_id)
            .fetch_optional(self.store.pool())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
        let tickets = self.ticket_views(booking.id).await?;

        Ok(BookingResponse {
            id: booking.id,
            booking_reference: booking.booking_reference,
            pnr: booking.pnr,
            flight_id: booking.flight_id,
            tier: booking.tier,
            status: booking.status,
            total_fare: booking.total_fare,
            paid_amount: booking.paid_amount,
            created_at: booking.created_at,
            hold_expires_at: booking.hold_expires_at,
            transaction_id: booking.transaction_id,
            tickets,
        })
    }

    async fn ticket_views(&self, booking_id: i64) -> AppResult<Vec<TicketView>> {
        let tickets = sqlx::query_as::<_, TicketView>(
            "SELECT t.id, t.passenger_name, t.passenger_age, t.passenger_gender,
                    t.seat_id, s.seat_number, s.class, t.ticket_number
             FROM tickets t JOIN seats s ON s.id = t.seat_id
             WHERE t.booking_id = ?
             ORDER BY t.id",
        )
        .bind(booking_id)
        .fetch_all(self.store.pool())
        .await?;
        Ok(tickets)
    }
}

async fn release_seats(tx: &mut Transaction<'_, Sqlite>, booking_id: i64) -> AppResult<()> {
    sqlx::query("UPDATE seats SET status = ?, booking_id = NULL WHERE booking_id = ?")
        .bind(SeatStatus::Available)
        .bind(booking_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Allocate a PNR unique among non-Expired bookings. The partial unique
/// index backs this check; collisions are vanishingly rare.
async fn issue_pnr(tx: &mut Transaction<'_, Sqlite>) -> AppResult<String> {
    for _ in 0..MAX_GENERATION_ATTEMPTS {
        let candidate = random_pnr();
        let exists = sqlx::query(
            "SELECT 1 FROM bookings WHERE pnr = ? AND status != 'Expired'",
        )
        .bind(&candidate)
        .fetch_optional(&mut **tx)
        .await?;
        if exists.is_none() {
            return Ok(candidate);
        }
    }
    Err(AppError::Internal(
        "could not allocate a unique PNR".into(),
    ))
}

fn ticket_number() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("TKT{}", &suffix[..12].to_uppercase())
}
