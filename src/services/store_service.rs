// src/services/store_service.rs
use async_trait::async_trait;
use chrono::Utc;
use redis::Client;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing;

use crate::errors::{RideError, RideResult};
use crate::models::{
    history::{DriverRideRecord, RideHistoryEntry, prepend_capped},
    ride::{Party, Ride, RideStatus},
    user::{RegisteredUser, UserSession},
};

pub const DEFAULT_PASSENGER_HISTORY_CAP: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Operation error: {0}")]
    OperationError(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(error: redis::RedisError) -> Self {
        match error.kind() {
            redis::ErrorKind::IoError => StoreError::ConnectionError(error.to_string()),
            redis::ErrorKind::AuthenticationFailed => {
                StoreError::ConnectionError("Authentication failed".to_string())
            }
            _ => StoreError::OperationError(error.to_string()),
        }
    }
}

impl From<StoreError> for RideError {
    fn from(error: StoreError) -> Self {
        RideError::StoreBackend(error.to_string())
    }
}

/// Keys shared between the passenger and driver clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    User,
    RegisteredUser,
    CurrentRide,
    RideStatus,
    RideHistory,
    DriverRideHistory,
    DriverEarnings,
}

impl StoreKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::User => "user",
            StoreKey::RegisteredUser => "registeredUser",
            StoreKey::CurrentRide => "currentRide",
            StoreKey::RideStatus => "rideStatus",
            StoreKey::RideHistory => "rideHistory",
            StoreKey::DriverRideHistory => "driverRideHistory",
            StoreKey::DriverEarnings => "driverEarnings",
        }
    }
}

/// String-valued key/value store. Every write replaces the whole value and
/// there is no locking: the last writer wins.
#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: StoreKey) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: StoreKey, value: String) -> Result<(), StoreError>;
    async fn remove(&self, key: StoreKey) -> Result<(), StoreError>;
}

// Memory store, the stand-in for browser local storage
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<&'static str, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key.as_str()).cloned())
    }

    async fn set(&self, key: StoreKey, value: String) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.as_str(), value);
        Ok(())
    }

    async fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.remove(key.as_str());
        Ok(())
    }
}

// Redis store, lets passenger and driver run as separate processes
pub struct RedisStore {
    client: Client,
    namespace: String,
}

impl RedisStore {
    pub fn new(redis_url: &str, namespace: impl Into<String>) -> Result<Self, StoreError> {
        let client =
            Client::open(redis_url).map_err(|e| StoreError::ConnectionError(e.to_string()))?;
        Ok(Self {
            client,
            namespace: namespace.into(),
        })
    }

    fn key(&self, key: StoreKey) -> String {
        format!("{}:{}", self.namespace, key.as_str())
    }

    async fn get_connection(&self) -> Result<redis::aio::Connection, StoreError> {
        Ok(self.client.get_async_connection().await?)
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn get(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
        let mut conn = self.get_connection().await?;
        let data: Option<String> = redis::cmd("GET")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await?;
        Ok(data)
    }

    async fn set(&self, key: StoreKey, value: String) -> Result<(), StoreError> {
        let mut conn = self.get_connection().await?;
        let _: () = redis::cmd("SET")
            .arg(self.key(key))
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        let mut conn = self.get_connection().await?;
        let _: () = redis::cmd("DEL")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

/// Typed access to the shared store.
///
/// Reads repair instead of failing: an absent, malformed or unparsable value
/// comes back as the empty default (no ride, `idle`, empty history, zero
/// earnings). Backend failures still propagate.
pub struct StoreService {
    store: Arc<dyn SharedStore>,
    passenger_history_cap: usize,
}

impl StoreService {
    pub fn new(store: Arc<dyn SharedStore>, passenger_history_cap: usize) -> Self {
        Self {
            store,
            passenger_history_cap,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), DEFAULT_PASSENGER_HISTORY_CAP)
    }

    pub fn backend(&self) -> Arc<dyn SharedStore> {
        self.store.clone()
    }

    async fn read_json<T: DeserializeOwned>(&self, key: StoreKey) -> RideResult<Option<T>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!("Discarding malformed {}: {}", key.as_str(), e);
                Ok(None)
            }
        }
    }

    async fn read_list<T: DeserializeOwned>(&self, key: StoreKey) -> RideResult<Vec<T>> {
        let Some(value) = self.read_json::<serde_json::Value>(key).await? else {
            return Ok(Vec::new());
        };
        let serde_json::Value::Array(items) = value else {
            tracing::warn!("Expected a list under {}, reading as empty", key.as_str());
            return Ok(Vec::new());
        };

        let total = items.len();
        let list: Vec<T> = items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect();
        if list.len() != total {
            tracing::warn!(
                "Skipped {} malformed entries under {}",
                total - list.len(),
                key.as_str()
            );
        }
        Ok(list)
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: StoreKey, value: &T) -> RideResult<()> {
        let json = serde_json::to_string(value)?;
        self.store.set(key, json).await?;
        Ok(())
    }

    // Ride record and status

    pub async fn current_ride(&self) -> RideResult<Option<Ride>> {
        self.read_json(StoreKey::CurrentRide).await
    }

    pub async fn ride_status(&self) -> RideResult<RideStatus> {
        let raw = self.store.get(StoreKey::RideStatus).await?;
        let status = match raw {
            Some(raw) => RideStatus::parse(&raw).unwrap_or_else(|| {
                tracing::warn!("Unknown ride status {:?}, treating as idle", raw);
                RideStatus::Idle
            }),
            None => RideStatus::Idle,
        };
        tracing::debug!("Read ride status: {}", status);
        Ok(status)
    }

    async fn write_status(&self, status: RideStatus) -> RideResult<()> {
        self.store
            .set(StoreKey::RideStatus, status.as_str().to_string())
            .await?;
        Ok(())
    }

    fn check_transition(party: Party, from: RideStatus, to: RideStatus) -> RideResult<()> {
        if !from.can_transition_to(to) {
            return Err(RideError::InvalidTransition { from, to });
        }
        if !from.permits(party, to) {
            return Err(RideError::NotPermitted { party, from, to });
        }
        Ok(())
    }

    async fn expect_status(&self, expected: RideStatus) -> RideResult<()> {
        let found = self.ride_status().await?;
        if found != expected {
            return Err(RideError::StatusConflict { expected, found });
        }
        Ok(())
    }

    /// Writes a brand new ride and moves `idle -> searching`.
    pub async fn open_ride(&self, ride: &Ride) -> RideResult<()> {
        let found = self.ride_status().await?;
        // A completed ride stays until the driver finishes it; a cancelled one counts as idle.
        if found.is_in_flight() || found == RideStatus::Completed {
            return Err(RideError::RideInFlight(found));
        }
        Self::check_transition(Party::Passenger, RideStatus::Idle, RideStatus::Searching)?;

        self.write_json(StoreKey::CurrentRide, ride).await?;
        self.write_status(RideStatus::Searching).await?;
        tracing::info!("Ride {} opened: {} -> {}", ride.id, ride.pickup, ride.dropoff);
        Ok(())
    }

    /// Moves the current ride from `expected` to `next` on behalf of `party`,
    /// applying `update` to the ride record before it is written back.
    pub async fn advance_ride<F>(
        &self,
        party: Party,
        expected: RideStatus,
        next: RideStatus,
        update: F,
    ) -> RideResult<Ride>
    where
        F: FnOnce(&mut Ride) + Send,
    {
        Self::check_transition(party, expected, next)?;
        self.expect_status(expected).await?;

        let mut ride = self.current_ride().await?.ok_or(RideError::NoCurrentRide)?;
        ride.status = next;
        ride.updated_at = Utc::now();
        update(&mut ride);

        // Record first so that a reader who sees the new status also sees the ride.
        self.write_json(StoreKey::CurrentRide, &ride).await?;
        self.write_status(next).await?;
        tracing::info!("Ride {} {} -> {} by {}", ride.id, expected, next, party);
        Ok(ride)
    }

    /// Clears the current ride and resets the status to `idle`.
    pub async fn close_ride(&self, party: Party, expected: RideStatus) -> RideResult<Option<Ride>> {
        Self::check_transition(party, expected, RideStatus::Idle)?;
        self.expect_status(expected).await?;

        let ride = self.current_ride().await?;
        self.store.remove(StoreKey::CurrentRide).await?;
        self.write_status(RideStatus::Idle).await?;
        tracing::info!(
            "Ride {} closed from {} by {}",
            ride.as_ref().map(|r| r.id.as_str()).unwrap_or("<none>"),
            expected,
            party
        );
        Ok(ride)
    }

    // Histories and earnings

    pub async fn ride_history(&self) -> RideResult<Vec<RideHistoryEntry>> {
        self.read_list(StoreKey::RideHistory).await
    }

    pub async fn record_passenger_ride(&self, entry: RideHistoryEntry) -> RideResult<Vec<RideHistoryEntry>> {
        let mut history = self.ride_history().await?;
        prepend_capped(&mut history, entry, Some(self.passenger_history_cap));
        self.write_json(StoreKey::RideHistory, &history).await?;
        Ok(history)
    }

    pub async fn driver_ride_history(&self) -> RideResult<Vec<DriverRideRecord>> {
        self.read_list(StoreKey::DriverRideHistory).await
    }

    pub async fn record_driver_ride(&self, record: DriverRideRecord) -> RideResult<Vec<DriverRideRecord>> {
        let mut history = self.driver_ride_history().await?;
        prepend_capped(&mut history, record, None);
        self.write_json(StoreKey::DriverRideHistory, &history).await?;
        Ok(history)
    }

    pub async fn driver_earnings(&self) -> RideResult<f64> {
        let raw = self.store.get(StoreKey::DriverEarnings).await?;
        Ok(raw.as_deref().map(parse_amount).unwrap_or(0.0))
    }

    /// Adds `amount` to the earnings accumulator and returns the new total.
    /// Earnings never decrease, so negative or non-finite amounts add nothing.
    pub async fn credit_earnings(&self, amount: f64) -> RideResult<f64> {
        let current = self.driver_earnings().await?;
        let credit = if amount.is_finite() && amount > 0.0 { amount } else { 0.0 };
        let total = ((current + credit) * 100.0).round() / 100.0;
        self.store
            .set(StoreKey::DriverEarnings, total.to_string())
            .await?;
        tracing::info!("Driver earnings {:.2} -> {:.2}", current, total);
        Ok(total)
    }

    // Identity records

    pub async fn user(&self) -> RideResult<Option<UserSession>> {
        self.read_json(StoreKey::User).await
    }

    pub async fn set_user(&self, session: &UserSession) -> RideResult<()> {
        self.write_json(StoreKey::User, session).await
    }

    pub async fn clear_user(&self) -> RideResult<()> {
        self.store.remove(StoreKey::User).await?;
        Ok(())
    }

    pub async fn registered_user(&self) -> RideResult<Option<RegisteredUser>> {
        self.read_json(StoreKey::RegisteredUser).await
    }

    pub async fn set_registered_user(&self, user: &RegisteredUser) -> RideResult<()> {
        self.write_json(StoreKey::RegisteredUser, user).await
    }
}

fn parse_amount(raw: &str) -> f64 {
    raw.trim()
        .trim_matches('"')
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}
