use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Utc};

use crate::db::Store;
use crate::models::flight::{
    Flight, FlightSearchResponse, FlightSummary, SearchQuery, SortKey,
};
use crate::services::flight_service::{class_counts, fetch_flight};
use crate::services::pricing::{compute_fare, FareSnapshot};
use crate::utils::error::{AppError, AppResult};

const MAX_PAGE_SIZE: i64 = 100;

/// Read-only flight search. Fares are computed from the latest committed
/// state at query time; nothing is locked or cached.
#[derive(Debug, Clone)]
pub struct SearchService {
    store: Store,
}

impl SearchService {
    pub fn new(store: Store) -> Self {
        SearchService { store }
    }

    pub async fn search(&self, query: SearchQuery) -> AppResult<FlightSearchResponse> {
        if query.passengers < 1 {
            return Err(AppError::InvalidArgument(
                "passenger count must be at least 1".into(),
            ));
        }
        if query.page < 1 || query.page_size < 1 || query.page_size > MAX_PAGE_SIZE {
            return Err(AppError::InvalidArgument(format!(
                "page must be >= 1 and page_size in 1..={MAX_PAGE_SIZE}"
            )));
        }
        for code in [&query.origin, &query.destination] {
            sqlx::query("SELECT code FROM airports WHERE code = ?")
                .bind(code)
                .fetch_optional(self.store.pool())
                .await?
                .ok_or_else(|| AppError::NotFound(format!("airport {code}")))?;
        }

        let flights = match query.date {
            Some(date) => {
                sqlx::query_as::<_, Flight>(
                    "SELECT * FROM flights
                     WHERE origin_code = ? AND destination_code = ?
                       AND status != 'Cancelled'
                       AND date(departure_time) = ?",
                )
                .bind(&query.origin)
                .bind(&query.destination)
                .bind(date)
                .fetch_all(self.store.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, Flight>(
                    "SELECT * FROM flights
                     WHERE origin_code = ? AND destination_code = ?
                       AND status != 'Cancelled'",
                )
                .bind(&query.origin)
                .bind(&query.destination)
                .fetch_all(self.store.pool())
                .await?
            }
        };

        let now = Utc::now().naive_utc();
        let mut summaries = Vec::with_capacity(flights.len());
        for flight in flights {
            if let Some(tier) = query.tier {
                if !flight.base_fares.contains_key(&tier) {
                    continue;
                }
            }
            summaries.push(self.summarize(flight, query.tier, now).await?);
        }

        sort_summaries(&mut summaries, query.sort);

        let offset = ((query.page - 1) * query.page_size) as usize;
        let flights: Vec<FlightSummary> = summaries
            .into_iter()
            .skip(offset)
            .take(query.page_size as usize)
            .collect();

        Ok(FlightSearchResponse {
            flights,
            page: query.page,
            page_size: query.page_size,
        })
    }

    pub async fn get_flight(&self, flight_id: i64) -> AppResult<FlightSummary> {
        let flight = fetch_flight(self.store.pool(), flight_id).await?;
        let now = Utc::now().naive_utc();
        self.summarize(flight, None, now).await
    }

    async fn summarize(
        &self,
        flight: Flight,
        only_tier: Option<crate::models::seat::CabinClass>,
        now: NaiveDateTime,
    ) -> AppResult<FlightSummary> {
        let counts = class_counts(self.store.pool(), flight.id).await?;
        let hours_to_departure = (flight.departure_time - now).num_seconds() as f64 / 3600.0;

        let mut price_map = BTreeMap::new();
        let mut seats_by_class = BTreeMap::new();
        for (tier, base_fare) in flight.base_fares.iter() {
            if only_tier.is_some_and(|t| t != *tier) {
                continue;
            }
            let (available, total) = counts.get(tier).copied().unwrap_or((0, 0));
            seats_by_class.insert(*tier, available);
            if total == 0 {
                continue;
            }
            let fare = compute_fare(&FareSnapshot {
                base_fare: *base_fare,
                seats_available: available,
                seats_total: total,
                hours_to_departure,
                demand_index: flight.demand_index,
                tier: *tier,
            })?;
            price_map.insert(*tier, fare);
        }

        Ok(FlightSummary {
            id: flight.id,
            flight_number: flight.flight_number,
            airline_code: flight.airline_code,
            origin_code: flight.origin_code,
            destination_code: flight.destination_code,
            duration_minutes: (flight.arrival_time - flight.departure_time).num_minutes(),
            departure_time: flight.departure_time,
            arrival_time: flight.arrival_time,
            status: flight.status,
            delay_minutes: flight.delay_minutes,
            gate: flight.gate,
            price_map,
            seats_by_class,
        })
    }
}

fn sort_summaries(summaries: &mut [FlightSummary], sort: SortKey) {
    match sort {
        // Cheapest tier decides; id keeps the order stable across equal fares.
        SortKey::Price => summaries.sort_by(|a, b| {
            let pa = cheapest(a);
            let pb = cheapest(b);
            pa.total_cmp(&pb).then(a.id.cmp(&b.id))
        }),
        SortKey::Duration => summaries
            .sort_by(|a, b| (a.duration_minutes, a.id).cmp(&(b.duration_minutes, b.id))),
        SortKey::Departure => {
            summaries.sort_by(|a, b| (a.departure_time, a.id).cmp(&(b.departure_time, b.id)))
        }
    }
}

fn cheapest(summary: &FlightSummary) -> f64 {
    summary
        .price_map
        .values()
        .fold(f64::INFINITY, |acc, fare| acc.min(*fare))
}
