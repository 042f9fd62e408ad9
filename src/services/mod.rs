// src/services/mod.rs
pub mod driver_service;
pub mod fare_service;
pub mod messaging_service;
pub mod network_guard;
pub mod offer_timer;
pub mod passenger_service;
pub mod poller;
pub mod routing_service;
pub mod store_service;
pub mod user_service;
