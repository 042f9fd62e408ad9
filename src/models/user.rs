// src/models/user.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{RideError, RideResult};
use crate::models::driver::{DriverProfile, DriverRegistration};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Passenger, // Someone booking rides
    Driver,    // Someone accepting and driving rides
    Admin,     // Platform administrator
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Passenger => f.write_str("passenger"),
            Role::Driver => f.write_str("driver"),
            Role::Admin => f.write_str("admin"),
        }
    }
}

/// Record kept under `registeredUser`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub roles: Vec<Role>,
    pub driver: Option<DriverRegistration>,
    pub registered_at: DateTime<Utc>,
}

/// Record kept under `user`: the signed-in identity and the role it is
/// currently acting as.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub name: String,
    pub email: String,
    pub roles: Vec<Role>,
    pub active_role: Role,
}

impl RegisteredUser {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        roles: Vec<Role>,
        driver: Option<DriverRegistration>,
    ) -> RideResult<Self> {
        let name = name.into();
        let email = email.into();
        let mut errors = Vec::new();

        if name.trim().is_empty() {
            errors.push(crate::errors::ValidationError {
                field: "name".to_string(),
                message: "Please enter your name".to_string(),
            });
        }
        if !email.contains('@') {
            errors.push(crate::errors::ValidationError {
                field: "email".to_string(),
                message: "Please enter a valid email".to_string(),
            });
        }
        if roles.is_empty() {
            errors.push(crate::errors::ValidationError {
                field: "roles".to_string(),
                message: "Please select a role".to_string(),
            });
        }
        if roles.contains(&Role::Driver) && driver.is_none() {
            errors.push(crate::errors::ValidationError {
                field: "driver".to_string(),
                message: "Drivers must register a vehicle".to_string(),
            });
        }
        if !errors.is_empty() {
            return Err(RideError::ValidationFailed(errors));
        }

        let mut roles = roles;
        roles.dedup();

        Ok(Self {
            name,
            email,
            phone: None,
            roles,
            driver,
            registered_at: Utc::now(),
        })
    }

    /// Profile shown to passengers, for users registered as drivers.
    pub fn driver_profile(&self) -> Option<DriverProfile> {
        self.driver.as_ref().map(|registration| DriverProfile {
            photo: registration.photo.clone(),
            ..DriverProfile::new(self.name.clone(), registration.vehicle.clone())
        })
    }
}

impl UserSession {
    pub fn sign_in(registered: &RegisteredUser, active_role: Role) -> RideResult<Self> {
        if !registered.roles.contains(&active_role) {
            return Err(RideError::RoleNotHeld(active_role.to_string()));
        }
        Ok(Self {
            name: registered.name.clone(),
            email: registered.email.clone(),
            roles: registered.roles.clone(),
            active_role,
        })
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn switch_role(&mut self, role: Role) -> RideResult<()> {
        if !self.has_role(role) {
            return Err(RideError::RoleNotHeld(role.to_string()));
        }
        tracing::info!("{} switched role {} -> {}", self.email, self.active_role, role);
        self.active_role = role;
        Ok(())
    }
}
