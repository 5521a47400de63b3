use crate::models::seat::CabinClass;
use crate::utils::error::{AppError, AppResult};

/// Everything the fare computation needs, detached from storage. Snapshots
/// are built by a thin loader; the computation itself never touches I/O.
#[derive(Debug, Clone, Copy)]
pub struct FareSnapshot {
    pub base_fare: f64,
    pub seats_available: i64,
    pub seats_total: i64,
    pub hours_to_departure: f64,
    pub demand_index: i64,
    pub tier: CabinClass,
}

/// Fares never exceed this multiple of the base fare.
pub const FARE_CAP_MULTIPLIER: f64 = 10.0;

fn inventory_factor(fill_ratio: f64) -> f64 {
    if fill_ratio <= 0.3 {
        1.0
    } else if fill_ratio <= 0.6 {
        1.10
    } else if fill_ratio <= 0.8 {
        1.25
    } else {
        1.45
    }
}

fn time_factor(hours_to_departure: f64) -> f64 {
    if hours_to_departure > 720.0 {
        1.0
    } else if hours_to_departure > 168.0 {
        1.05
    } else if hours_to_departure > 48.0 {
        1.15
    } else {
        1.30
    }
}

fn demand_factor(demand_index: i64) -> f64 {
    if demand_index < 25 {
        1.0
    } else if demand_index < 50 {
        1.15
    } else if demand_index < 75 {
        1.35
    } else {
        1.60
    }
}

pub fn class_factor(tier: CabinClass) -> f64 {
    match tier {
        CabinClass::Economy => 1.0,
        CabinClass::EconomyFlex => 1.2,
        CabinClass::Business => 1.8,
        CabinClass::First => 2.5,
    }
}

/// Fares are kept in major units with two decimals, like the fare columns.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute the live fare for one tier of one flight. Deterministic for a
/// fixed snapshot; clamped to [base_fare, 10 * base_fare].
pub fn compute_fare(snapshot: &FareSnapshot) -> AppResult<f64> {
    if snapshot.base_fare <= 0.0 {
        return Err(AppError::InvalidArgument(
            "base_fare must be positive".into(),
        ));
    }
    if snapshot.seats_total <= 0 {
        return Err(AppError::InvalidArgument(
            "seats_total must be positive".into(),
        ));
    }
    if snapshot.seats_available < 0 || snapshot.seats_available > snapshot.seats_total {
        return Err(AppError::InvalidArgument(format!(
            "seats_available {} out of range 0..={}",
            snapshot.seats_available, snapshot.seats_total
        )));
    }
    if !(0..=100).contains(&snapshot.demand_index) {
        return Err(AppError::InvalidArgument(format!(
            "demand_index {} outside 0..=100",
            snapshot.demand_index
        )));
    }

    let cap = snapshot.base_fare * FARE_CAP_MULTIPLIER;

    // Departure already passed: sell at the cap.
    if snapshot.hours_to_departure < 0.0 {
        return Ok(round2(cap));
    }

    let fill_ratio = 1.0 - snapshot.seats_available as f64 / snapshot.seats_total as f64;

    let fare = snapshot.base_fare
        * inventory_factor(fill_ratio)
        * time_factor(snapshot.hours_to_departure)
        * demand_factor(snapshot.demand_index)
        * class_factor(snapshot.tier);

    Ok(round2(fare.clamp(snapshot.base_fare, cap)))
}
