use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};

use crate::utils::error::AppResult;

/// Process-wide storage handle. Constructed once at startup; every service
/// clones the pool out of it.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(sqlx::Error::from)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        // An in-memory database lives and dies with its connection, so the
        // pool must pin exactly one open forever.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 10 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Store { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin(&self) -> AppResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Create the schema if it does not exist. Idempotent; runs on startup.
    pub async fn migrate(&self) -> AppResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS airports (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        city TEXT NOT NULL,
        country TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS airlines (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS aircraft (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        registration TEXT NOT NULL UNIQUE,
        model TEXT NOT NULL,
        total_seats INTEGER NOT NULL,
        economy_seats INTEGER NOT NULL DEFAULT 0,
        economy_flex_seats INTEGER NOT NULL DEFAULT 0,
        business_seats INTEGER NOT NULL DEFAULT 0,
        first_seats INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        full_name TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'Customer'
    )",
    "CREATE TABLE IF NOT EXISTS flights (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        flight_number TEXT NOT NULL,
        airline_code TEXT NOT NULL REFERENCES airlines(code),
        origin_code TEXT NOT NULL REFERENCES airports(code),
        destination_code TEXT NOT NULL REFERENCES airports(code),
        aircraft_id INTEGER NOT NULL REFERENCES aircraft(id),
        departure_time TEXT NOT NULL,
        arrival_time TEXT NOT NULL,
        base_fares TEXT NOT NULL,
        demand_index INTEGER NOT NULL DEFAULT 30,
        status TEXT NOT NULL DEFAULT 'Scheduled',
        delay_minutes INTEGER NOT NULL DEFAULT 0,
        delay_reason TEXT,
        gate TEXT,
        CHECK (arrival_time > departure_time),
        CHECK (demand_index BETWEEN 0 AND 100)
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS flights_number_day_uindex
        ON flights (flight_number, date(departure_time))",
    "CREATE INDEX IF NOT EXISTS flights_route_idx
        ON flights (departure_time, origin_code, destination_code)",
    "CREATE TABLE IF NOT EXISTS seats (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        flight_id INTEGER NOT NULL REFERENCES flights(id) ON DELETE CASCADE,
        seat_number TEXT NOT NULL,
        class TEXT NOT NULL,
        position TEXT NOT NULL,
        surcharge REAL NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'Available',
        booking_id INTEGER,
        UNIQUE (flight_id, seat_number),
        CHECK (surcharge >= 0),
        CHECK ((status = 'Available') = (booking_id IS NULL))
    )",
    "CREATE TABLE IF NOT EXISTS bookings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        booking_reference TEXT NOT NULL UNIQUE,
        pnr TEXT,
        user_id INTEGER NOT NULL REFERENCES users(id),
        flight_id INTEGER NOT NULL REFERENCES flights(id),
        tier TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'Held',
        total_fare REAL NOT NULL,
        paid_amount REAL,
        created_at TEXT NOT NULL,
        hold_expires_at TEXT NOT NULL,
        transaction_id TEXT
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS bookings_pnr_uindex
        ON bookings (pnr) WHERE pnr IS NOT NULL AND status != 'Expired'",
    "CREATE TABLE IF NOT EXISTS tickets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        booking_id INTEGER NOT NULL REFERENCES bookings(id) ON DELETE CASCADE,
        flight_id INTEGER NOT NULL REFERENCES flights(id),
        seat_id INTEGER NOT NULL REFERENCES seats(id),
        passenger_name TEXT NOT NULL,
        passenger_age INTEGER,
        passenger_gender TEXT,
        ticket_number TEXT UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS payments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        booking_reference TEXT NOT NULL,
        amount REAL NOT NULL,
        method TEXT NOT NULL,
        status TEXT NOT NULL,
        transaction_id TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS fare_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        flight_id INTEGER NOT NULL REFERENCES flights(id),
        tier TEXT NOT NULL,
        fare REAL NOT NULL,
        demand_index INTEGER NOT NULL,
        sampled_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS fare_history_flight_idx
        ON fare_history (flight_id, sampled_at)",
];
