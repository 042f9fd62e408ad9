pub mod errors;
pub mod models;
pub mod services;
pub mod state;


// Re-export commonly used types
pub use errors::{RideError, RideResult, ValidationError};
pub use models::{DriverProfile, Ride, RideDraft, RideStatus, RideType, VehicleType};
pub use services::driver_service::DriverOperations;
pub use services::passenger_service::PassengerOperations;
pub use services::user_service::UserOperations;
