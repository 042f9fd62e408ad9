// src/services/fare_service.rs
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::models::ride::{RideDraft, RideType, VehicleType};

pub const DEFAULT_RATE: f64 = 1.5;
pub const FLAT_FEE: f64 = 5.0;
pub const MIN_FARE: f64 = 30.0;
pub const DEFAULT_SPEED_KMH: f64 = 30.0;
pub const SURGE_RANGE: Range<f64> = 1.0..1.5;

/// Per-km rate. Vehicles without a row (SUV) use `DEFAULT_RATE`.
pub fn base_rate(vehicle_type: VehicleType, ride_type: RideType) -> f64 {
    match (vehicle_type, ride_type) {
        (VehicleType::Car, RideType::Standard) => 1.5,
        (VehicleType::Car, RideType::Premium) => 2.5,
        (VehicleType::Car, RideType::Shared) => 1.0,
        (VehicleType::Bike, RideType::Standard) => 1.0,
        (VehicleType::Bike, RideType::Premium) => 1.5,
        (VehicleType::Bike, RideType::Shared) => 0.8,
        (VehicleType::Cng, RideType::Standard) => 1.2,
        (VehicleType::Cng, RideType::Premium) => 1.8,
        (VehicleType::Cng, RideType::Shared) => 0.9,
        _ => DEFAULT_RATE,
    }
}

pub fn average_speed_kmh(vehicle_type: VehicleType) -> f64 {
    match vehicle_type {
        VehicleType::Car => 30.0,
        VehicleType::Bike => 40.0,
        VehicleType::Cng => 25.0,
        _ => DEFAULT_SPEED_KMH,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn usable_distance(distance_km: Option<f64>) -> Option<f64> {
    distance_km.filter(|d| d.is_finite() && *d >= 0.0)
}

/// Fare for a ride. Total: any missing input yields `0.0`, an absent or
/// unusable surge counts as `1.0`.
pub fn fare(
    distance_km: Option<f64>,
    vehicle_type: Option<VehicleType>,
    ride_type: Option<RideType>,
    surge_multiplier: Option<f64>,
) -> f64 {
    let (Some(distance), Some(vehicle_type), Some(ride_type)) =
        (usable_distance(distance_km), vehicle_type, ride_type)
    else {
        return 0.0;
    };
    let surge = surge_multiplier
        .filter(|s| s.is_finite() && *s > 0.0)
        .unwrap_or(1.0);

    let raw = distance * base_rate(vehicle_type, ride_type) * surge;
    round2((raw + FLAT_FEE).max(MIN_FARE))
}

/// Whole hours at the vehicle's average speed, expressed in minutes.
pub fn eta_minutes(distance_km: Option<f64>, vehicle_type: VehicleType) -> Option<u32> {
    let distance = usable_distance(distance_km)?;
    let hours = (distance / average_speed_kmh(vehicle_type)).ceil();
    Some((hours * 60.0) as u32)
}

pub fn format_eta(eta: Option<u32>) -> String {
    match eta {
        Some(minutes) => format!("{} min", minutes),
        None => "--".to_string(),
    }
}

pub fn format_distance(distance_km: Option<f64>) -> String {
    match usable_distance(distance_km) {
        Some(distance) => format!("{:.2} km", distance),
        None => "--".to_string(),
    }
}

pub fn draw_surge<R: Rng>(rng: &mut R) -> f64 {
    rng.random_range(SURGE_RANGE)
}

/// Draws a surge once both coordinates are known. An existing surge is kept.
pub fn assign_surge<R: Rng>(draft: &mut RideDraft, rng: &mut R) -> Option<f64> {
    if draft.surge_multiplier.is_none() && draft.has_both_coords() {
        let surge = draw_surge(rng);
        tracing::debug!("Assigned surge multiplier {:.3}", surge);
        draft.surge_multiplier = Some(surge);
    }
    draft.surge_multiplier
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FareQuote {
    pub fare: f64,
    pub eta_minutes: Option<u32>,
    pub distance_km: Option<f64>,
    pub surge_multiplier: Option<f64>,
}

impl FareQuote {
    pub fn for_draft(draft: &RideDraft) -> Self {
        Self {
            fare: draft.fare(),
            eta_minutes: draft
                .vehicle_type
                .and_then(|vehicle_type| eta_minutes(draft.distance_km, vehicle_type)),
            distance_km: draft.distance_km,
            surge_multiplier: draft.surge_multiplier,
        }
    }

    pub fn eta_label(&self) -> String {
        format_eta(self.eta_minutes)
    }

    pub fn distance_label(&self) -> String {
        format_distance(self.distance_km)
    }
}
