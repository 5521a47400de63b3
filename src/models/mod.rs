pub mod aircraft;
pub mod airline;
pub mod airport;
pub mod booking;
pub mod fare_history;
pub mod flight;
pub mod payment;
pub mod seat;
pub mod ticket;
pub mod user;
