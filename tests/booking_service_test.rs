use std::time::Duration;
use test_context::{test_context, AsyncTestContext};

use gaganyatra::config::AppConfig;
use gaganyatra::models::booking::{BookingStatus, CreateBookingRequest, PassengerSpec};
use gaganyatra::models::flight::{FlightStatus, FlightStatusUpdate};
use gaganyatra::models::payment::PaymentMethod;
use gaganyatra::models::seat::CabinClass;
use gaganyatra::models::user::Role;
use gaganyatra::services::booking_service::BookingService;
use gaganyatra::services::pricing::{compute_fare, round2, FareSnapshot};
use gaganyatra::services::reaper::HoldReaper;
use gaganyatra::utils::error::AppError;

mod common {
    pub mod test_utils;
}
use common::test_utils::TestEnv;

struct BookingContext {
    env: TestEnv,
    bookings: BookingService,
}

impl AsyncTestContext for BookingContext {
    async fn setup() -> Self {
        let env = TestEnv::new().await;
        let bookings = BookingService::new(env.store.clone(), &AppConfig::default());
        BookingContext { env, bookings }
    }
}

fn passengers(count: usize) -> Vec<PassengerSpec> {
    (0..count)
        .map(|i| PassengerSpec {
            name: format!("Passenger {}", i + 1),
            age: Some(30),
            gender: Some("female".to_string()),
            seat_id: None,
        })
        .collect()
}

fn request(flight_id: i64, tier: CabinClass, count: usize) -> CreateBookingRequest {
    CreateBookingRequest {
        flight_id,
        tier,
        passengers: passengers(count),
        quoted_fare: None,
    }
}

/// Expected unit fare for an untouched cabin 72h out at low demand.
fn expected_unit_fare(base: f64, available: i64, total: i64, demand: i64) -> f64 {
    compute_fare(&FareSnapshot {
        base_fare: base,
        seats_available: available,
        seats_total: total,
        hours_to_departure: 71.9,
        demand_index: demand,
        tier: CabinClass::Economy,
    })
    .unwrap()
}

#[test_context(BookingContext)]
#[tokio::test]
async fn happy_path_hold_pay_confirm(ctx: &mut BookingContext) {
    let aircraft = ctx.env.aircraft("VT-ITA", 3, 0, 0, 0).await;
    let flight = ctx
        .env
        .flight("6E123", aircraft, 72, &[(CabinClass::Economy, 5000.0)], 10)
        .await;
    let user = ctx.env.user("alice@example.com", Role::Customer).await;

    let hold = ctx
        .bookings
        .create_hold(user, request(flight.id, CabinClass::Economy, 1))
        .await
        .unwrap();

    // One passenger in seat 1A (window surcharge) at the quiet-demand fare.
    let unit = expected_unit_fare(5000.0, 3, 3, 10);
    assert_eq!(hold.status, BookingStatus::Held);
    assert_eq!(hold.total_fare, round2(unit + 200.0));
    assert!(hold.pnr.is_none());
    assert_eq!(hold.tickets.len(), 1);
    assert_eq!(hold.tickets[0].seat_number, "1A");
    assert!(hold.tickets[0].ticket_number.is_none());
    assert_eq!(
        ctx.env.seat_count(flight.id, CabinClass::Economy, "Held").await,
        1
    );

    let paid = ctx
        .bookings
        .pay(&hold.booking_reference, hold.total_fare, PaymentMethod::Card)
        .await
        .unwrap();

    assert_eq!(paid.status, BookingStatus::Confirmed);
    assert_eq!(paid.paid_amount, Some(hold.total_fare));
    assert!(paid.transaction_id.is_some());
    let pnr = paid.pnr.expect("confirmed booking must carry a PNR");
    assert_eq!(pnr.len(), 6);
    assert!(!pnr.contains(['0', 'O', '1', 'I']));
    assert!(paid.tickets.iter().all(|t| t.ticket_number.is_some()));

    assert_eq!(
        ctx.env.seat_count(flight.id, CabinClass::Economy, "Sold").await,
        1
    );
    assert_eq!(
        ctx.env
            .seat_count(flight.id, CabinClass::Economy, "Available")
            .await,
        2
    );
    ctx.env.assert_invariants().await;
}

#[test_context(BookingContext)]
#[tokio::test]
async fn concurrent_holds_exactly_one_wins(ctx: &mut BookingContext) {
    let aircraft = ctx.env.aircraft("VT-ITB", 1, 0, 0, 0).await;
    let flight = ctx
        .env
        .flight("6E124", aircraft, 72, &[(CabinClass::Economy, 5000.0)], 10)
        .await;
    let alice = ctx.env.user("alice@example.com", Role::Customer).await;
    let bob = ctx.env.user("bob@example.com", Role::Customer).await;

    let task_a = {
        let bookings = ctx.bookings.clone();
        let req = request(flight.id, CabinClass::Economy, 1);
        tokio::spawn(async move { bookings.create_hold(alice, req).await })
    };
    let task_b = {
        let bookings = ctx.bookings.clone();
        let req = request(flight.id, CabinClass::Economy, 1);
        tokio::spawn(async move { bookings.create_hold(bob, req).await })
    };

    let results = [task_a.await.unwrap(), task_b.await.unwrap()];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one concurrent hold must win");
    let loser = results.iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loser.as_ref().unwrap_err(),
        AppError::SeatUnavailable(_)
    ));

    assert_eq!(
        ctx.env.seat_count(flight.id, CabinClass::Economy, "Held").await,
        1
    );
    assert_eq!(
        ctx.env
            .seat_count(flight.id, CabinClass::Economy, "Available")
            .await,
        0
    );
    ctx.env.assert_invariants().await;
}

#[test_context(BookingContext)]
#[tokio::test]
async fn lapsed_hold_is_expired_and_seats_released(ctx: &mut BookingContext) {
    let aircraft = ctx.env.aircraft("VT-ITC", 3, 0, 0, 0).await;
    let flight = ctx
        .env
        .flight("6E125", aircraft, 72, &[(CabinClass::Economy, 5000.0)], 10)
        .await;
    let user = ctx.env.user("alice@example.com", Role::Customer).await;

    let hold = ctx
        .bookings
        .create_hold(user, request(flight.id, CabinClass::Economy, 2))
        .await
        .unwrap();
    ctx.env.force_hold_expiry(hold.id, 10).await;

    let expired = ctx.bookings.expire_due_holds().await.unwrap();
    assert_eq!(expired, 1);

    let booking = ctx.bookings.booking_response_by_id(hold.id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Expired);
    assert_eq!(
        ctx.env
            .seat_count(flight.id, CabinClass::Economy, "Available")
            .await,
        3
    );
    assert_eq!(ctx.env.ticket_count(hold.id).await, 0);
    ctx.env.assert_invariants().await;
}

#[test_context(BookingContext)]
#[tokio::test]
async fn payment_after_expiry_is_rejected(ctx: &mut BookingContext) {
    let aircraft = ctx.env.aircraft("VT-ITD", 3, 0, 0, 0).await;
    let flight = ctx
        .env
        .flight("6E126", aircraft, 72, &[(CabinClass::Economy, 5000.0)], 10)
        .await;
    let user = ctx.env.user("alice@example.com", Role::Customer).await;

    let hold = ctx
        .bookings
        .create_hold(user, request(flight.id, CabinClass::Economy, 1))
        .await
        .unwrap();
    ctx.env.force_hold_expiry(hold.id, 1).await;

    let result = ctx
        .bookings
        .pay(&hold.booking_reference, hold.total_fare, PaymentMethod::Upi)
        .await;
    assert!(matches!(result, Err(AppError::HoldExpired(_))));
}

#[test_context(BookingContext)]
#[tokio::test]
async fn price_drift_beyond_tolerance_is_rejected(ctx: &mut BookingContext) {
    let aircraft = ctx.env.aircraft("VT-ITE", 3, 0, 0, 0).await;
    let flight = ctx
        .env
        .flight("6E127", aircraft, 72, &[(CabinClass::Economy, 5000.0)], 10)
        .await;
    let user = ctx.env.user("alice@example.com", Role::Customer).await;

    // Client quoted while demand was quiet; demand spikes before the hold.
    let quoted = expected_unit_fare(5000.0, 3, 3, 10);
    ctx.env.set_demand(flight.id, 95).await;

    let mut req = request(flight.id, CabinClass::Economy, 1);
    req.quoted_fare = Some(quoted);
    let result = ctx.bookings.create_hold(user, req).await;
    assert!(matches!(result, Err(AppError::PriceChanged(_))));

    // Re-quoting at the current fare succeeds.
    let mut req = request(flight.id, CabinClass::Economy, 1);
    req.quoted_fare = Some(expected_unit_fare(5000.0, 3, 3, 95));
    assert!(ctx.bookings.create_hold(user, req).await.is_ok());
}

#[test_context(BookingContext)]
#[tokio::test]
async fn cancel_confirmed_releases_seats_and_keeps_payment(ctx: &mut BookingContext) {
    let aircraft = ctx.env.aircraft("VT-ITF", 3, 0, 0, 0).await;
    let flight = ctx
        .env
        .flight("6E128", aircraft, 72, &[(CabinClass::Economy, 5000.0)], 10)
        .await;
    let user = ctx.env.user("alice@example.com", Role::Customer).await;

    let hold = ctx
        .bookings
        .create_hold(user, request(flight.id, CabinClass::Economy, 1))
        .await
        .unwrap();
    let paid = ctx
        .bookings
        .pay(&hold.booking_reference, hold.total_fare, PaymentMethod::Card)
        .await
        .unwrap();
    let pnr = paid.pnr.clone().unwrap();

    let cancelled = ctx.bookings.cancel(&pnr, user, Role::Customer).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.paid_amount, Some(hold.total_fare));
    assert_eq!(
        ctx.env
            .seat_count(flight.id, CabinClass::Economy, "Available")
            .await,
        3
    );

    // Cancelling again is a no-op returning the current state.
    let again = ctx.bookings.cancel(&pnr, user, Role::Customer).await.unwrap();
    assert_eq!(again.status, BookingStatus::Cancelled);
    ctx.env.assert_invariants().await;
}

#[test_context(BookingContext)]
#[tokio::test]
async fn hold_then_cancel_leaks_nothing(ctx: &mut BookingContext) {
    let aircraft = ctx.env.aircraft("VT-ITG", 3, 0, 0, 0).await;
    let flight = ctx
        .env
        .flight("6E129", aircraft, 72, &[(CabinClass::Economy, 5000.0)], 10)
        .await;
    let user = ctx.env.user("alice@example.com", Role::Customer).await;

    let hold = ctx
        .bookings
        .create_hold(user, request(flight.id, CabinClass::Economy, 2))
        .await
        .unwrap();
    let cancelled = ctx
        .bookings
        .cancel(&hold.booking_reference, user, Role::Customer)
        .await
        .unwrap();

    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(
        ctx.env
            .seat_count(flight.id, CabinClass::Economy, "Available")
            .await,
        3
    );
    assert_eq!(ctx.env.ticket_count(hold.id).await, 0);
    ctx.env.assert_invariants().await;
}

#[test_context(BookingContext)]
#[tokio::test]
async fn other_customers_cannot_cancel(ctx: &mut BookingContext) {
    let aircraft = ctx.env.aircraft("VT-ITH", 3, 0, 0, 0).await;
    let flight = ctx
        .env
        .flight("6E130", aircraft, 72, &[(CabinClass::Economy, 5000.0)], 10)
        .await;
    let alice = ctx.env.user("alice@example.com", Role::Customer).await;
    let mallory = ctx.env.user("mallory@example.com", Role::Customer).await;

    let hold = ctx
        .bookings
        .create_hold(alice, request(flight.id, CabinClass::Economy, 1))
        .await
        .unwrap();

    let result = ctx
        .bookings
        .cancel(&hold.booking_reference, mallory, Role::Customer)
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    // Staff may cancel on the customer's behalf.
    let staff = ctx.env.user("staff@example.com", Role::AirlineStaff).await;
    let cancelled = ctx
        .bookings
        .cancel(&hold.booking_reference, staff, Role::AirlineStaff)
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
}

#[test_context(BookingContext)]
#[tokio::test]
async fn passenger_limit_is_nine(ctx: &mut BookingContext) {
    let aircraft = ctx.env.aircraft("VT-ITI", 12, 0, 0, 0).await;
    let flight = ctx
        .env
        .flight("6E131", aircraft, 72, &[(CabinClass::Economy, 5000.0)], 10)
        .await;
    let user = ctx.env.user("alice@example.com", Role::Customer).await;

    let nine = ctx
        .bookings
        .create_hold(user, request(flight.id, CabinClass::Economy, 9))
        .await
        .unwrap();
    assert_eq!(nine.tickets.len(), 9);

    let ten = ctx
        .bookings
        .create_hold(user, request(flight.id, CabinClass::Economy, 10))
        .await;
    assert!(matches!(ten, Err(AppError::InvalidArgument(_))));
}

#[test_context(BookingContext)]
#[tokio::test]
async fn underpayment_is_rejected(ctx: &mut BookingContext) {
    let aircraft = ctx.env.aircraft("VT-ITJ", 3, 0, 0, 0).await;
    let flight = ctx
        .env
        .flight("6E132", aircraft, 72, &[(CabinClass::Economy, 5000.0)], 10)
        .await;
    let user = ctx.env.user("alice@example.com", Role::Customer).await;

    let hold = ctx
        .bookings
        .create_hold(user, request(flight.id, CabinClass::Economy, 1))
        .await
        .unwrap();

    let result = ctx
        .bookings
        .pay(
            &hold.booking_reference,
            hold.total_fare - 1.0,
            PaymentMethod::Wallet,
        )
        .await;
    assert!(matches!(result, Err(AppError::InvalidArgument(_))));

    // The hold itself survives a rejected amount.
    let booking = ctx.bookings.booking_response_by_id(hold.id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Held);
}

#[test_context(BookingContext)]
#[tokio::test]
async fn failed_payment_is_retryable_until_expiry(ctx: &mut BookingContext) {
    let aircraft = ctx.env.aircraft("VT-ITK", 3, 0, 0, 0).await;
    let flight = ctx
        .env
        .flight("6E133", aircraft, 72, &[(CabinClass::Economy, 5000.0)], 10)
        .await;
    let user = ctx.env.user("alice@example.com", Role::Customer).await;

    let hold = ctx
        .bookings
        .create_hold(user, request(flight.id, CabinClass::Economy, 1))
        .await
        .unwrap();

    let declining = BookingService::new(
        ctx.env.store.clone(),
        &AppConfig {
            payment_success_probability: 0.0,
            ..AppConfig::default()
        },
    );
    let result = declining
        .pay(&hold.booking_reference, hold.total_fare, PaymentMethod::Card)
        .await;
    assert!(matches!(result, Err(AppError::PaymentFailed(_))));

    let booking = ctx.bookings.booking_response_by_id(hold.id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::PendingPayment);

    // A later attempt against a working gateway confirms the booking.
    let paid = ctx
        .bookings
        .pay(&hold.booking_reference, hold.total_fare, PaymentMethod::Card)
        .await
        .unwrap();
    assert_eq!(paid.status, BookingStatus::Confirmed);
    ctx.env.assert_invariants().await;
}

#[test_context(BookingContext)]
#[tokio::test]
async fn requested_seats_are_honored_and_contested(ctx: &mut BookingContext) {
    let aircraft = ctx.env.aircraft("VT-ITL", 6, 0, 0, 0).await;
    let flight = ctx
        .env
        .flight("6E134", aircraft, 72, &[(CabinClass::Economy, 5000.0)], 10)
        .await;
    let alice = ctx.env.user("alice@example.com", Role::Customer).await;
    let bob = ctx.env.user("bob@example.com", Role::Customer).await;

    let seat_id: i64 = sqlx::query_scalar(
        "SELECT id FROM seats WHERE flight_id = ? AND seat_number = '1D'",
    )
    .bind(flight.id)
    .fetch_one(ctx.env.store.pool())
    .await
    .unwrap();

    let mut req = request(flight.id, CabinClass::Economy, 1);
    req.passengers[0].seat_id = Some(seat_id);
    let hold = ctx.bookings.create_hold(alice, req).await.unwrap();
    assert_eq!(hold.tickets[0].seat_number, "1D");

    // The same seat cannot be pinned by a second booking.
    let mut req = request(flight.id, CabinClass::Economy, 1);
    req.passengers[0].seat_id = Some(seat_id);
    let contested = ctx.bookings.create_hold(bob, req).await;
    assert!(matches!(contested, Err(AppError::SeatUnavailable(_))));
}

#[test_context(BookingContext)]
#[tokio::test]
async fn seat_from_another_cabin_is_rejected(ctx: &mut BookingContext) {
    let aircraft = ctx.env.aircraft("VT-ITM", 3, 0, 3, 0).await;
    let flight = ctx
        .env
        .flight(
            "6E135",
            aircraft,
            72,
            &[(CabinClass::Economy, 5000.0), (CabinClass::Business, 9000.0)],
            10,
        )
        .await;
    let user = ctx.env.user("alice@example.com", Role::Customer).await;

    let business_seat: i64 = sqlx::query_scalar(
        "SELECT id FROM seats WHERE flight_id = ? AND class = 'Business' LIMIT 1",
    )
    .bind(flight.id)
    .fetch_one(ctx.env.store.pool())
    .await
    .unwrap();

    let mut req = request(flight.id, CabinClass::Economy, 1);
    req.passengers[0].seat_id = Some(business_seat);
    let result = ctx.bookings.create_hold(user, req).await;
    assert!(matches!(result, Err(AppError::InvalidArgument(_))));
}

#[test_context(BookingContext)]
#[tokio::test]
async fn cancelled_flight_is_not_bookable(ctx: &mut BookingContext) {
    let aircraft = ctx.env.aircraft("VT-ITN", 3, 0, 0, 0).await;
    let flight = ctx
        .env
        .flight("6E136", aircraft, 72, &[(CabinClass::Economy, 5000.0)], 10)
        .await;
    let user = ctx.env.user("alice@example.com", Role::Customer).await;

    ctx.env
        .flights
        .update_status(
            flight.id,
            FlightStatusUpdate {
                status: FlightStatus::Cancelled,
                delay_minutes: None,
                delay_reason: None,
            },
        )
        .await
        .unwrap();

    let result = ctx
        .bookings
        .create_hold(user, request(flight.id, CabinClass::Economy, 1))
        .await;
    assert!(matches!(result, Err(AppError::FlightNotBookable(_))));
}

#[test_context(BookingContext)]
#[tokio::test]
async fn total_fare_is_frozen_at_hold(ctx: &mut BookingContext) {
    let aircraft = ctx.env.aircraft("VT-ITO", 3, 0, 0, 0).await;
    let flight = ctx
        .env
        .flight("6E137", aircraft, 72, &[(CabinClass::Economy, 5000.0)], 10)
        .await;
    let user = ctx.env.user("alice@example.com", Role::Customer).await;

    let hold = ctx
        .bookings
        .create_hold(user, request(flight.id, CabinClass::Economy, 1))
        .await
        .unwrap();

    // Demand moves after the hold; the quote must not.
    ctx.env.set_demand(flight.id, 95).await;
    let paid = ctx
        .bookings
        .pay(&hold.booking_reference, hold.total_fare, PaymentMethod::Card)
        .await
        .unwrap();
    assert_eq!(paid.total_fare, hold.total_fare);
    assert_eq!(paid.paid_amount, Some(hold.total_fare));
}

#[test_context(BookingContext)]
#[tokio::test]
async fn receipt_reflects_the_confirmed_booking(ctx: &mut BookingContext) {
    let aircraft = ctx.env.aircraft("VT-ITP", 3, 0, 0, 0).await;
    let flight = ctx
        .env
        .flight("6E138", aircraft, 72, &[(CabinClass::Economy, 5000.0)], 10)
        .await;
    let user = ctx.env.user("alice@example.com", Role::Customer).await;

    let hold = ctx
        .bookings
        .create_hold(user, request(flight.id, CabinClass::Economy, 2))
        .await
        .unwrap();
    let paid = ctx
        .bookings
        .pay(&hold.booking_reference, hold.total_fare, PaymentMethod::Card)
        .await
        .unwrap();
    let pnr = paid.pnr.unwrap();

    let document = ctx.bookings.receipt_document(&pnr).await.unwrap();
    assert_eq!(document.pnr, pnr);
    assert_eq!(document.booking_reference, hold.booking_reference);
    assert_eq!(document.flight_number, "6E138");
    assert_eq!(document.passengers.len(), 2);
    assert_eq!(document.total_fare, hold.total_fare);
    assert!(!document.cancelled);

    // Unpaid bookings have no receipt.
    let unpaid_hold = ctx
        .bookings
        .create_hold(user, request(flight.id, CabinClass::Economy, 1))
        .await
        .unwrap();
    assert!(unpaid_hold.pnr.is_none());
}

#[test_context(BookingContext)]
#[tokio::test]
async fn pnr_status_view_is_redacted(ctx: &mut BookingContext) {
    let aircraft = ctx.env.aircraft("VT-ITQ", 3, 0, 0, 0).await;
    let flight = ctx
        .env
        .flight("6E139", aircraft, 72, &[(CabinClass::Economy, 5000.0)], 10)
        .await;
    let user = ctx.env.user("alice@example.com", Role::Customer).await;

    let hold = ctx
        .bookings
        .create_hold(user, request(flight.id, CabinClass::Economy, 1))
        .await
        .unwrap();
    let paid = ctx
        .bookings
        .pay(&hold.booking_reference, hold.total_fare, PaymentMethod::Card)
        .await
        .unwrap();
    let pnr = paid.pnr.unwrap();

    let view = ctx.bookings.pnr_status(&pnr).await.unwrap();
    assert_eq!(view.pnr, pnr);
    assert_eq!(view.status, BookingStatus::Confirmed);
    assert_eq!(view.flight_number, "6E139");

    let missing = ctx.bookings.pnr_status("ZZZZZZ").await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[test_context(BookingContext)]
#[tokio::test]
async fn reaper_actor_sweeps_and_stops(ctx: &mut BookingContext) {
    let aircraft = ctx.env.aircraft("VT-ITR", 3, 0, 0, 0).await;
    let flight = ctx
        .env
        .flight("6E140", aircraft, 72, &[(CabinClass::Economy, 5000.0)], 10)
        .await;
    let user = ctx.env.user("alice@example.com", Role::Customer).await;

    let hold = ctx
        .bookings
        .create_hold(user, request(flight.id, CabinClass::Economy, 1))
        .await
        .unwrap();
    ctx.env.force_hold_expiry(hold.id, 5).await;

    let reaper = HoldReaper::new(ctx.bookings.clone(), Duration::from_millis(50));
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(reaper.run(stop_rx));

    // Give the actor a few periods to sweep.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let booking = ctx.bookings.booking_response_by_id(hold.id).await.unwrap();
        if booking.status == BookingStatus::Expired {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "reaper never expired the lapsed hold"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    stop_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("reaper did not stop on signal")
        .unwrap();
}
