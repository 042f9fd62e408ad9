use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::ride::{Party, RideStatus};

/// Main error type for the ride client
#[derive(Debug)]
pub enum RideError {
    // Lifecycle errors
    InvalidTransition { from: RideStatus, to: RideStatus },
    NotPermitted { party: Party, from: RideStatus, to: RideStatus },
    StatusConflict { expected: RideStatus, found: RideStatus },
    RideInFlight(RideStatus),
    NoCurrentRide,
    NoActiveOffer,
    NoNextStep(RideStatus),
    RideMismatch { expected: String, found: String },

    // Shared store errors
    StoreBackend(String),
    StoreSerialization(String),

    // External lookup errors
    RouteLookup(String),
    GeocodeLookup(String),
    NetworkTimeout,
    NetworkConnection(String),
    HttpClient(String),

    // Notification delivery errors
    NotificationDelivery(String),

    // Validation errors
    ValidationFailed(Vec<ValidationError>),
    MissingRequiredField(String),
    RoleNotHeld(String),

    // Configuration errors
    InvalidConfiguration(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for RideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RideError::InvalidTransition { from, to } => {
                write!(f, "Invalid ride transition: {} -> {}", from, to)
            }
            RideError::NotPermitted { party, from, to } => {
                write!(f, "{} may not move a ride from {} to {}", party, from, to)
            }
            RideError::StatusConflict { expected, found } => {
                write!(f, "Ride status changed: expected {}, found {}", expected, found)
            }
            RideError::RideInFlight(status) => {
                write!(f, "Another ride is already in flight ({})", status)
            }
            RideError::NoCurrentRide => write!(f, "No current ride in the shared store"),
            RideError::NoActiveOffer => write!(f, "No active ride offer"),
            RideError::NoNextStep(status) => write!(f, "No step follows {}", status),
            RideError::RideMismatch { expected, found } => {
                write!(f, "Ride mismatch: expected {}, found {}", expected, found)
            }

            RideError::StoreBackend(msg) => write!(f, "Shared store error: {}", msg),
            RideError::StoreSerialization(msg) => write!(f, "Shared store serialization error: {}", msg),

            RideError::RouteLookup(msg) => write!(f, "Route lookup failed: {}", msg),
            RideError::GeocodeLookup(msg) => write!(f, "Geocoding failed: {}", msg),
            RideError::NetworkTimeout => write!(f, "Network request timed out"),
            RideError::NetworkConnection(msg) => write!(f, "Network connection error: {}", msg),
            RideError::HttpClient(msg) => write!(f, "HTTP client error: {}", msg),

            RideError::NotificationDelivery(msg) => write!(f, "Notification delivery failed: {}", msg),

            RideError::ValidationFailed(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            RideError::MissingRequiredField(field) => write!(f, "Missing required field: {}", field),
            RideError::RoleNotHeld(role) => write!(f, "Role not held by user: {}", role),

            RideError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for RideError {}

// Convenience type alias for Results
pub type RideResult<T> = Result<T, RideError>;

impl From<reqwest::Error> for RideError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RideError::NetworkTimeout
        } else if err.is_connect() {
            RideError::NetworkConnection(err.to_string())
        } else {
            RideError::HttpClient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RideError {
    fn from(err: serde_json::Error) -> Self {
        RideError::StoreSerialization(err.to_string())
    }
}

impl RideError {
    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        RideError::ValidationFailed(vec![ValidationError {
            field: field.into(),
            message: message.into(),
        }])
    }

    /// Short text suitable for a transient notification.
    pub fn user_message(&self) -> String {
        match self {
            RideError::ValidationFailed(errors) => errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "Please check your input".to_string()),
            RideError::RideInFlight(_) => "You already have a ride in progress".to_string(),
            RideError::NoActiveOffer => "This ride offer is no longer available".to_string(),
            RideError::StatusConflict { found, .. } => {
                format!("The ride was updated elsewhere (now {})", found)
            }
            RideError::NetworkTimeout | RideError::NetworkConnection(_) => {
                "Network unavailable, please try again".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = RideError::InvalidTransition {
            from: RideStatus::Searching,
            to: RideStatus::InProgress,
        };
        assert_eq!(error.to_string(), "Invalid ride transition: searching -> in_progress");
    }

    #[test]
    fn test_validation_error() {
        let error = RideError::validation_error("pickup", "Please enter a pickup location");
        match &error {
            RideError::ValidationFailed(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "pickup");
            }
            _ => panic!("Expected ValidationFailed error"),
        }
        assert_eq!(error.user_message(), "Please enter a pickup location");
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        assert!(matches!(RideError::from(err), RideError::StoreSerialization(_)));
    }
}
