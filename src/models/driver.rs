// src/models/driver.rs
use serde::{Deserialize, Serialize};

use crate::models::ride::VehicleType;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VehicleInfo {
    pub make: String,
    pub model: String,
    pub license: String, // Plate number
    pub color: String,
}

/// Driver details attached to a ride when the offer is accepted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DriverProfile {
    pub name: String,
    pub rating: f32, // Average rating (0-5)
    pub photo: Option<String>,
    pub vehicle: VehicleInfo,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverRegistration {
    pub vehicle_type: VehicleType,
    pub vehicle: VehicleInfo,
    pub photo: Option<String>,
}

impl DriverProfile {
    pub fn new(name: impl Into<String>, vehicle: VehicleInfo) -> Self {
        Self {
            name: name.into(),
            rating: 5.0,
            photo: None,
            vehicle,
        }
    }

    pub fn with_rating(mut self, rating: f32) -> Self {
        self.rating = rating.clamp(0.0, 5.0);
        self
    }

    pub fn vehicle_label(&self) -> String {
        format!(
            "{} {} {} ({})",
            self.vehicle.color, self.vehicle.make, self.vehicle.model, self.vehicle.license
        )
    }
}
