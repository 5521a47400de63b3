pub mod booking_route;
pub mod flight_route;
pub mod payment_route;
pub mod staff_route;
pub mod user_route;
