#[macro_use]
extern crate rocket;

pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
pub mod swagger;
pub mod utils;

use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::make_swagger_ui;
use tokio::sync::watch;

use crate::config::AppConfig;
use crate::db::Store;
use crate::services::booking_service::BookingService;
use crate::services::flight_service::FlightService;
use crate::services::reaper::HoldReaper;
use crate::services::search_service::SearchService;
use crate::services::simulator::DemandSimulator;
use crate::services::user_service::UserService;

/// Assemble the application: services, routes, Swagger UI, and the two
/// background actors (demand simulator, hold reaper). Actors start on
/// liftoff and drain on shutdown.
pub fn build_rocket(store: Store, config: AppConfig) -> Rocket<Build> {
    let flight_service = FlightService::new(store.clone());
    let search_service = SearchService::new(store.clone());
    let booking_service = BookingService::new(store.clone(), &config);
    let user_service = UserService::new(store.clone(), &config);

    let simulator = DemandSimulator::new(store.clone(), config.simulator_period);
    let reaper = HoldReaper::new(booking_service.clone(), config.reaper_period);
    let (stop_tx, stop_rx) = watch::channel(false);
    let reaper_stop = stop_rx.clone();

    rocket::build()
        .manage(config)
        .manage(flight_service)
        .manage(search_service)
        .manage(booking_service)
        .manage(user_service)
        .mount(
            "/api",
            openapi_get_routes![
                routes::user_route::register,
                routes::user_route::login,
                routes::flight_route::search_flights,
                routes::flight_route::get_flight,
                routes::flight_route::get_seats,
                routes::flight_route::fare_history,
                routes::flight_route::schedule_feed,
                routes::booking_route::create_booking,
                routes::booking_route::get_booking,
                routes::booking_route::cancel_booking,
                routes::booking_route::pnr_status,
                routes::booking_route::receipt,
                routes::payment_route::pay,
                routes::payment_route::get_payment,
                routes::staff_route::update_status,
                routes::staff_route::assign_gate,
            ],
        )
        .mount("/swagger", make_swagger_ui(&swagger::swagger_ui()))
        .attach(AdHoc::on_liftoff("background actors", move |_| {
            Box::pin(async move {
                tokio::spawn(simulator.run(stop_rx));
                tokio::spawn(reaper.run(reaper_stop));
            })
        }))
        .attach(AdHoc::on_shutdown("stop background actors", move |_| {
            Box::pin(async move {
                let _ = stop_tx.send(true);
            })
        }))
        .attach(AdHoc::on_response("CORS", |_, res| {
            Box::pin(async move {
                res.set_header(rocket::http::Header::new(
                    "Access-Control-Allow-Origin",
                    "*",
                ));
            })
        }))
}
