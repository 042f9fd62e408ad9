// src/models/history.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ride::{Ride, RideType};

/// Immutable snapshot of a ride, as kept in `rideHistory`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RideHistoryEntry {
    pub ride_id: Option<String>,
    pub pickup: String,
    pub dropoff: String,
    pub ride_type: RideType,
    pub distance: Option<f64>, // km
    pub fare: f64,
    pub timestamp: DateTime<Utc>,
}

/// Entry in `driverRideHistory`. Carries the passenger rating given at finish.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverRideRecord {
    #[serde(flatten)]
    pub entry: RideHistoryEntry,
    pub passenger_rating: Option<u8>,
}

impl RideHistoryEntry {
    pub fn snapshot(ride: &Ride) -> Self {
        Self {
            ride_id: Some(ride.id.clone()),
            pickup: ride.pickup.clone(),
            dropoff: ride.dropoff.clone(),
            ride_type: ride.ride_type,
            distance: ride.distance_km,
            fare: ride.fare(),
            timestamp: Utc::now(),
        }
    }
}

/// Newest first; when `cap` is set the oldest entries fall off the end.
pub fn prepend_capped<T>(list: &mut Vec<T>, item: T, cap: Option<usize>) {
    list.insert(0, item);
    if let Some(cap) = cap {
        list.truncate(cap);
    }
}
