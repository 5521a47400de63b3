pub mod booking_service;
pub mod email;
pub mod flight_service;
pub mod pricing;
pub mod reaper;
pub mod receipt;
pub mod search_service;
pub mod simulator;
pub mod user_service;
