use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime, Utc};

use gaganyatra::db::Store;
use gaganyatra::models::aircraft::NewAircraft;
use gaganyatra::models::airline::NewAirline;
use gaganyatra::models::airport::NewAirport;
use gaganyatra::models::flight::{Flight, NewFlight};
use gaganyatra::models::seat::CabinClass;
use gaganyatra::models::user::Role;
use gaganyatra::services::flight_service::FlightService;

/// A fresh in-memory store per test, with reference data seeded: three
/// airports, one airline, and helpers to mint aircraft, flights and users.
pub struct TestEnv {
    pub store: Store,
    pub flights: FlightService,
}

impl TestEnv {
    pub async fn new() -> Self {
        let store = Store::connect("sqlite::memory:")
            .await
            .expect("failed to open in-memory store");
        store.migrate().await.expect("failed to create schema");
        let flights = FlightService::new(store.clone());

        for (code, name, city) in [
            ("DEL", "Indira Gandhi International Airport", "New Delhi"),
            ("BOM", "Chhatrapati Shivaji Maharaj International Airport", "Mumbai"),
            ("BLR", "Kempegowda International Airport", "Bengaluru"),
        ] {
            flights
                .create_airport(NewAirport {
                    code: code.to_string(),
                    name: name.to_string(),
                    city: city.to_string(),
                    country: "India".to_string(),
                })
                .await
                .expect("failed to seed airport");
        }
        flights
            .create_airline(NewAirline {
                code: "6E".to_string(),
                name: "IndiGo".to_string(),
            })
            .await
            .expect("failed to seed airline");

        TestEnv { store, flights }
    }

    pub async fn aircraft(
        &self,
        registration: &str,
        economy: i64,
        economy_flex: i64,
        business: i64,
        first: i64,
    ) -> i64 {
        self.flights
            .create_aircraft(NewAircraft {
                registration: registration.to_string(),
                model: "Airbus A320neo".to_string(),
                economy_seats: economy,
                economy_flex_seats: economy_flex,
                business_seats: business,
                first_seats: first,
            })
            .await
            .expect("failed to create aircraft")
            .id
    }

    /// A DEL -> BOM flight departing `hours_out` hours from now.
    pub async fn flight(
        &self,
        flight_number: &str,
        aircraft_id: i64,
        hours_out: i64,
        fares: &[(CabinClass, f64)],
        demand_index: i64,
    ) -> Flight {
        let departure = Utc::now().naive_utc() + Duration::hours(hours_out);
        self.flights
            .create_flight(NewFlight {
                flight_number: flight_number.to_string(),
                airline_code: "6E".to_string(),
                origin_code: "DEL".to_string(),
                destination_code: "BOM".to_string(),
                aircraft_id,
                departure_time: departure,
                arrival_time: departure + Duration::minutes(130),
                base_fares: fares.iter().copied().collect::<BTreeMap<_, _>>(),
                demand_index,
            })
            .await
            .expect("failed to create flight")
    }

    pub async fn user(&self, email: &str, role: Role) -> i64 {
        let result = sqlx::query(
            "INSERT INTO users (email, password, full_name, role) VALUES (?, ?, ?, ?)",
        )
        .bind(email)
        .bind("$2b$12$not-a-real-hash")
        .bind("Test User")
        .bind(role)
        .execute(self.store.pool())
        .await
        .expect("failed to create user");
        result.last_insert_rowid()
    }

    pub async fn set_demand(&self, flight_id: i64, demand_index: i64) {
        sqlx::query("UPDATE flights SET demand_index = ? WHERE id = ?")
            .bind(demand_index)
            .bind(flight_id)
            .execute(self.store.pool())
            .await
            .expect("failed to set demand index");
    }

    pub async fn force_hold_expiry(&self, booking_id: i64, seconds_ago: i64) {
        let past: NaiveDateTime = Utc::now().naive_utc() - Duration::seconds(seconds_ago);
        sqlx::query("UPDATE bookings SET hold_expires_at = ? WHERE id = ?")
            .bind(past)
            .bind(booking_id)
            .execute(self.store.pool())
            .await
            .expect("failed to rewind hold expiry");
    }

    pub async fn seat_count(&self, flight_id: i64, class: CabinClass, status: &str) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM seats WHERE flight_id = ? AND class = ? AND status = ?",
        )
        .bind(flight_id)
        .bind(class)
        .bind(status)
        .fetch_one(self.store.pool())
        .await
        .expect("failed to count seats")
    }

    pub async fn ticket_count(&self, booking_id: i64) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE booking_id = ?")
            .bind(booking_id)
            .fetch_one(self.store.pool())
            .await
            .expect("failed to count tickets")
    }

    /// The structural invariants that must hold whenever no transaction is
    /// in flight.
    pub async fn assert_invariants(&self) {
        // A held seat belongs to a booking that is still payable; a sold
        // seat to a confirmed one.
        let orphan_held: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM seats s
             WHERE s.status = 'Held' AND NOT EXISTS (
                 SELECT 1 FROM bookings b
                 WHERE b.id = s.booking_id AND b.status IN ('Held', 'PendingPayment'))",
        )
        .fetch_one(self.store.pool())
        .await
        .unwrap();
        assert_eq!(orphan_held, 0, "held seats without a live hold");

        let orphan_sold: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM seats s
             WHERE s.status = 'Sold' AND NOT EXISTS (
                 SELECT 1 FROM bookings b
                 WHERE b.id = s.booking_id AND b.status = 'Confirmed')",
        )
        .fetch_one(self.store.pool())
        .await
        .unwrap();
        assert_eq!(orphan_sold, 0, "sold seats without a confirmed booking");

        // No seat is referenced by two different bookings.
        let double_booked: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM (
                 SELECT t.seat_id FROM tickets t
                 JOIN bookings b ON b.id = t.booking_id
                 WHERE b.status = 'Confirmed'
                 GROUP BY t.seat_id HAVING COUNT(DISTINCT t.booking_id) > 1)",
        )
        .fetch_one(self.store.pool())
        .await
        .unwrap();
        assert_eq!(double_booked, 0, "seat referenced by two confirmed bookings");

        // Held + Sold per (flight, class) never exceeds the cabin size.
        let overcommitted: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM (
                 SELECT s.flight_id, s.class,
                        SUM(s.status IN ('Held', 'Sold')) AS committed,
                        COUNT(*) AS cabin
                 FROM seats s GROUP BY s.flight_id, s.class
                 HAVING committed > cabin)",
        )
        .fetch_one(self.store.pool())
        .await
        .unwrap();
        assert_eq!(overcommitted, 0, "cabin committed beyond capacity");

        // PNRs are unique among non-expired bookings.
        let pnr_dupes: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM (
                 SELECT pnr FROM bookings
                 WHERE pnr IS NOT NULL AND status != 'Expired'
                 GROUP BY pnr HAVING COUNT(*) > 1)",
        )
        .fetch_one(self.store.pool())
        .await
        .unwrap();
        assert_eq!(pnr_dupes, 0, "duplicate live PNRs");
    }
}
