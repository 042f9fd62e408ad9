// src/models/ride.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::driver::DriverProfile;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    #[default]
    Idle,       // No ride in flight
    Searching,  // Passenger confirmed, waiting for a driver
    Accepted,   // Driver accepted the offer
    Arrived,    // Driver at pickup
    InProgress, // Passenger on board
    Completed,  // Dropped off, waiting for the driver to finish
    Cancelled,  // Passenger cancelled
}

impl RideStatus {
    pub const FORWARD: [RideStatus; 6] = [
        RideStatus::Idle,
        RideStatus::Searching,
        RideStatus::Accepted,
        RideStatus::Arrived,
        RideStatus::InProgress,
        RideStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Idle => "idle",
            RideStatus::Searching => "searching",
            RideStatus::Accepted => "accepted",
            RideStatus::Arrived => "arrived",
            RideStatus::InProgress => "in_progress",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }

    /// Parses the raw value kept under the `rideStatus` key. Quoted JSON
    /// strings are accepted as well as bare words.
    pub fn parse(raw: &str) -> Option<Self> {
        let value = raw.trim().trim_matches('"');
        Self::FORWARD
            .iter()
            .chain(std::iter::once(&RideStatus::Cancelled))
            .find(|status| status.as_str() == value)
            .copied()
    }

    /// Position on the forward path; `Cancelled` sits off the path.
    pub fn ordinal(&self) -> Option<usize> {
        Self::FORWARD.iter().position(|s| s == self)
    }

    pub fn next_step(&self) -> Option<RideStatus> {
        match self {
            RideStatus::Accepted => Some(RideStatus::Arrived),
            RideStatus::Arrived => Some(RideStatus::InProgress),
            RideStatus::InProgress => Some(RideStatus::Completed),
            _ => None,
        }
    }

    /// A ride is in flight from confirmation until completion.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            RideStatus::Searching | RideStatus::Accepted | RideStatus::Arrived | RideStatus::InProgress
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: RideStatus) -> bool {
        use RideStatus::*;
        match (*self, next) {
            (Idle, Searching) => true,
            (Searching, Accepted) => true,
            (from, to) if from.next_step() == Some(to) => true,
            (from, Idle | Cancelled) if from.is_in_flight() => true,
            (Completed | Cancelled, Idle) => true,
            _ => false,
        }
    }

    /// Single designated writer per transition. Searching -> Idle is shared:
    /// the driver rejects, the passenger cancels.
    pub fn permits(&self, party: Party, next: RideStatus) -> bool {
        use RideStatus::*;
        if !self.can_transition_to(next) {
            return false;
        }
        match (*self, next, party) {
            (Idle, Searching, Party::Passenger) => true,
            (Searching, Accepted, Party::Driver) => true,
            (Searching, Idle, _) => true,
            (_, Arrived | InProgress | Completed, Party::Driver) => true,
            (Completed, Idle, Party::Driver) => true,
            (from, Idle | Cancelled, Party::Passenger) if from.is_in_flight() => true,
            (Cancelled, Idle, Party::Passenger) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Party {
    Passenger,
    Driver,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Passenger => f.write_str("passenger"),
            Party::Driver => f.write_str("driver"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RideType {
    Standard,
    Premium,
    Shared,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleType {
    Car,
    Bike,
    #[serde(rename = "CNG")]
    Cng,
    #[serde(rename = "SUV")]
    Suv, // Registration only, has no fare row
}

/// (longitude, latitude), serialized as a two element array.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct LngLat(pub f64, pub f64);

impl LngLat {
    pub fn longitude(&self) -> f64 {
        self.0
    }

    pub fn latitude(&self) -> f64 {
        self.1
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub id: String,
    pub pickup: String,
    pub dropoff: String,
    pub pickup_coords: Option<LngLat>,
    pub dropoff_coords: Option<LngLat>,
    pub ride_type: RideType,
    pub vehicle_type: VehicleType,
    pub distance_km: Option<f64>, // Filled once the route lookup resolves
    pub surge_multiplier: Option<f64>,
    pub status: RideStatus,
    #[serde(default)]
    pub driver_accepted: bool,
    pub driver: Option<DriverProfile>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    pub fn fare(&self) -> f64 {
        crate::services::fare_service::fare(
            self.distance_km,
            Some(self.vehicle_type),
            Some(self.ride_type),
            self.surge_multiplier,
        )
    }

    pub fn eta_minutes(&self) -> Option<u32> {
        crate::services::fare_service::eta_minutes(self.distance_km, self.vehicle_type)
    }
}

/// A ride being assembled by the passenger before confirmation.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RideDraft {
    pub pickup: String,
    pub dropoff: String,
    pub pickup_coords: Option<LngLat>,
    pub dropoff_coords: Option<LngLat>,
    pub ride_type: Option<RideType>,
    pub vehicle_type: Option<VehicleType>,
    pub distance_km: Option<f64>,
    pub surge_multiplier: Option<f64>,
}

impl RideDraft {
    pub fn has_both_coords(&self) -> bool {
        self.pickup_coords.is_some() && self.dropoff_coords.is_some()
    }

    pub fn fare(&self) -> f64 {
        crate::services::fare_service::fare(
            self.distance_km,
            self.vehicle_type,
            self.ride_type,
            self.surge_multiplier,
        )
    }

    pub fn into_ride(self, ride_type: RideType, vehicle_type: VehicleType) -> Ride {
        let now = Utc::now();
        Ride {
            id: Uuid::new_v4().to_string(),
            pickup: self.pickup,
            dropoff: self.dropoff,
            pickup_coords: self.pickup_coords,
            dropoff_coords: self.dropoff_coords,
            ride_type,
            vehicle_type,
            distance_km: self.distance_km,
            surge_multiplier: self.surge_multiplier,
            status: RideStatus::Searching,
            driver_accepted: false,
            driver: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path_is_single_step() {
        for pair in RideStatus::FORWARD.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(!RideStatus::Searching.can_transition_to(RideStatus::InProgress));
        assert!(!RideStatus::Accepted.can_transition_to(RideStatus::Completed));
        assert!(!RideStatus::Idle.can_transition_to(RideStatus::Accepted));
    }

    #[test]
    fn test_never_backward() {
        assert!(!RideStatus::Arrived.can_transition_to(RideStatus::Accepted));
        assert!(!RideStatus::InProgress.can_transition_to(RideStatus::Searching));
        assert!(!RideStatus::Completed.can_transition_to(RideStatus::InProgress));
    }

    #[test]
    fn test_searching_resolves_to_accepted_or_idle() {
        let reachable: Vec<_> = RideStatus::FORWARD
            .iter()
            .copied()
            .filter(|to| RideStatus::Searching.permits(Party::Driver, *to))
            .collect();
        assert_eq!(reachable, vec![RideStatus::Idle, RideStatus::Accepted]);
    }

    #[test]
    fn test_cancel_from_any_in_flight_state() {
        for from in [
            RideStatus::Searching,
            RideStatus::Accepted,
            RideStatus::Arrived,
            RideStatus::InProgress,
        ] {
            assert!(from.permits(Party::Passenger, RideStatus::Idle));
            assert!(from.permits(Party::Passenger, RideStatus::Cancelled));
        }
        assert!(!RideStatus::Idle.can_transition_to(RideStatus::Cancelled));
        assert!(!RideStatus::Completed.permits(Party::Passenger, RideStatus::Cancelled));
    }

    #[test]
    fn test_single_writer_per_transition() {
        assert!(!RideStatus::Searching.permits(Party::Passenger, RideStatus::Accepted));
        assert!(!RideStatus::Idle.permits(Party::Driver, RideStatus::Searching));
        assert!(!RideStatus::Accepted.permits(Party::Passenger, RideStatus::Arrived));
        assert!(!RideStatus::Accepted.permits(Party::Driver, RideStatus::Idle));
        assert!(RideStatus::Completed.permits(Party::Driver, RideStatus::Idle));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(RideStatus::parse("searching"), Some(RideStatus::Searching));
        assert_eq!(RideStatus::parse("\"in_progress\""), Some(RideStatus::InProgress));
        assert_eq!(RideStatus::parse("bogus"), None);
    }

    #[test]
    fn test_ride_json_shape() {
        let draft = RideDraft {
            pickup: "Gulshan 1".to_string(),
            dropoff: "Banani".to_string(),
            pickup_coords: Some(LngLat(90.41, 23.78)),
            dropoff_coords: Some(LngLat(90.40, 23.79)),
            ..Default::default()
        };
        let ride = draft.into_ride(RideType::Standard, VehicleType::Cng);
        let json = serde_json::to_value(&ride).unwrap();
        assert_eq!(json["status"], "searching");
        assert_eq!(json["vehicleType"], "CNG");
        assert_eq!(json["pickupCoords"][0], 90.41);
        assert_eq!(json["driverAccepted"], false);
        assert!(json["distanceKm"].is_null());
    }
}
