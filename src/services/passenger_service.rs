// src/services/passenger_service.rs
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing;

use crate::{
    errors::{RideError, RideResult, ValidationError},
    models::{
        driver::DriverProfile,
        history::RideHistoryEntry,
        ride::{LngLat, Party, Ride, RideDraft, RideStatus, RideType, VehicleType},
    },
    services::{
        fare_service::{self, FareQuote},
        messaging_service::{NotificationMessage, NotificationService, notify},
        poller::PollHandle,
        routing_service::{PlaceSuggestion, RoutePlanner},
        store_service::StoreService,
    },
};

/// What the passenger view shows after a poll noticed a status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: RideStatus,
    pub message: String,
    pub driver: Option<DriverProfile>,
}

pub fn status_message(previous: Option<RideStatus>, current: RideStatus) -> &'static str {
    match (previous, current) {
        (Some(RideStatus::Searching), RideStatus::Idle) => {
            "No driver accepted your ride. Please try again."
        }
        (Some(RideStatus::Cancelled), RideStatus::Idle) => "Ride cancelled.",
        (_, RideStatus::Idle) => "No active ride",
        (_, RideStatus::Searching) => "Looking for a driver...",
        (_, RideStatus::Accepted) => "Driver found! Your driver is on the way.",
        (_, RideStatus::Arrived) => "Your driver has arrived at the pickup point.",
        (_, RideStatus::InProgress) => "Ride in progress. Enjoy your trip!",
        (_, RideStatus::Completed) => "You have arrived. Thanks for riding!",
        (_, RideStatus::Cancelled) => "Ride cancelled.",
    }
}

#[async_trait]
pub trait PassengerOperations: Send + Sync {
    async fn confirm_ride(&self) -> RideResult<Ride>;
    async fn cancel_ride(&self) -> RideResult<()>;
    async fn poll_status(&self) -> RideResult<Option<StatusUpdate>>;
    async fn quote(&self) -> FareQuote;
    async fn history(&self) -> RideResult<Vec<RideHistoryEntry>>;
}

pub struct PassengerService {
    store: Arc<StoreService>,
    planner: Arc<RoutePlanner>,
    notification_service: Arc<dyn NotificationService>,
    draft: Mutex<RideDraft>,
    lookup_generation: AtomicU64,
    last_seen: Mutex<Option<RideStatus>>,
}

impl PassengerService {
    pub fn new(
        store: Arc<StoreService>,
        planner: Arc<RoutePlanner>,
        notification_service: Arc<dyn NotificationService>,
    ) -> Self {
        Self {
            store,
            planner,
            notification_service,
            draft: Mutex::new(RideDraft::default()),
            lookup_generation: AtomicU64::new(0),
            last_seen: Mutex::new(None),
        }
    }

    pub async fn draft(&self) -> RideDraft {
        self.draft.lock().await.clone()
    }

    pub async fn suggestions(&self, query: &str) -> Vec<PlaceSuggestion> {
        self.planner.suggestions(query).await
    }

    /// Sets the pickup. New coordinates invalidate the known distance and any
    /// route lookup still in flight.
    pub async fn set_pickup(&self, label: impl Into<String>, coords: Option<LngLat>) {
        let mut draft = self.draft.lock().await;
        draft.pickup = label.into();
        if draft.pickup_coords != coords {
            draft.pickup_coords = coords;
            draft.distance_km = None;
            self.lookup_generation.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub async fn set_dropoff(&self, label: impl Into<String>, coords: Option<LngLat>) {
        let mut draft = self.draft.lock().await;
        draft.dropoff = label.into();
        if draft.dropoff_coords != coords {
            draft.dropoff_coords = coords;
            draft.distance_km = None;
            self.lookup_generation.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub async fn select_place(&self, pickup: bool, place: PlaceSuggestion) {
        if pickup {
            self.set_pickup(place.label, Some(place.coords)).await;
        } else {
            self.set_dropoff(place.label, Some(place.coords)).await;
        }
    }

    pub async fn set_ride_type(&self, ride_type: RideType) {
        self.draft.lock().await.ride_type = Some(ride_type);
    }

    pub async fn set_vehicle_type(&self, vehicle_type: VehicleType) {
        self.draft.lock().await.vehicle_type = Some(vehicle_type);
    }

    /// Looks up the route distance once both coordinates are known and draws
    /// the surge. A result that arrives after the locations changed again is
    /// discarded.
    pub async fn refresh_route(&self) -> FareQuote {
        let (generation, from, to) = {
            let mut draft = self.draft.lock().await;
            fare_service::assign_surge(&mut draft, &mut rand::rng());
            match (draft.pickup_coords, draft.dropoff_coords) {
                (Some(from), Some(to)) => (self.lookup_generation.load(Ordering::SeqCst), from, to),
                _ => return FareQuote::for_draft(&draft),
            }
        };

        let distance = self.planner.distance_km(from, to).await;

        let mut draft = self.draft.lock().await;
        if self.lookup_generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Discarding stale route lookup (generation {})", generation);
        } else if let Some(distance) = distance {
            draft.distance_km = Some(distance);
        }
        FareQuote::for_draft(&draft)
    }

    pub async fn reset_draft(&self) {
        *self.draft.lock().await = RideDraft::default();
        self.lookup_generation.fetch_add(1, Ordering::SeqCst);
    }

    fn validate(draft: &RideDraft) -> RideResult<(RideType, VehicleType)> {
        let mut errors = Vec::new();
        if draft.pickup.trim().is_empty() || draft.dropoff.trim().is_empty() {
            errors.push(ValidationError {
                field: "route".to_string(),
                message: "Please enter both pickup and dropoff locations".to_string(),
            });
        }
        if draft.ride_type.is_none() {
            errors.push(ValidationError {
                field: "ride_type".to_string(),
                message: "Please choose a ride type".to_string(),
            });
        }
        if draft.vehicle_type.is_none() {
            errors.push(ValidationError {
                field: "vehicle_type".to_string(),
                message: "Please choose a vehicle".to_string(),
            });
        }

        match (draft.ride_type, draft.vehicle_type) {
            (Some(ride_type), Some(vehicle_type)) if errors.is_empty() => Ok((ride_type, vehicle_type)),
            _ => Err(RideError::ValidationFailed(errors)),
        }
    }

    /// Polls every `period` and forwards status changes.
    pub fn watch_status(
        self: Arc<Self>,
        period: Duration,
    ) -> (PollHandle, mpsc::UnboundedReceiver<StatusUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = PollHandle::spawn(period, move || {
            let service = self.clone();
            let tx = tx.clone();
            async move {
                match service.poll_status().await {
                    Ok(Some(update)) => {
                        let _ = tx.send(update);
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!("Passenger status poll failed: {}", e),
                }
            }
            .boxed()
        });
        (handle, rx)
    }
}

#[async_trait]
impl PassengerOperations for PassengerService {
    async fn confirm_ride(&self) -> RideResult<Ride> {
        let draft = self.draft().await;
        let (ride_type, vehicle_type) = match Self::validate(&draft) {
            Ok(types) => types,
            Err(e) => {
                notify(self.notification_service.as_ref(), NotificationMessage::rejected(&e)).await;
                return Err(e);
            }
        };

        let ride = draft.into_ride(ride_type, vehicle_type);
        tracing::info!("Confirming ride {} ({:?}, {:?})", ride.id, ride_type, vehicle_type);

        if let Err(e) = self.store.open_ride(&ride).await {
            notify(self.notification_service.as_ref(), NotificationMessage::rejected(&e)).await;
            return Err(e);
        }

        // Passenger history is written at confirmation, not at completion.
        self.store
            .record_passenger_ride(RideHistoryEntry::snapshot(&ride))
            .await?;

        notify(
            self.notification_service.as_ref(),
            NotificationMessage::searching_for_driver(&ride),
        )
        .await;
        self.reset_draft().await;
        Ok(ride)
    }

    async fn cancel_ride(&self) -> RideResult<()> {
        let status = self.store.ride_status().await?;
        if !status.is_in_flight() {
            return Err(RideError::InvalidTransition {
                from: status,
                to: RideStatus::Cancelled,
            });
        }

        self.store.close_ride(Party::Passenger, status).await?;
        // The next poll reports the reset to idle as this cancel.
        *self.last_seen.lock().await = Some(RideStatus::Cancelled);
        tracing::info!("Passenger cancelled ride while {}", status);
        notify(
            self.notification_service.as_ref(),
            NotificationMessage::ride_cancelled(status),
        )
        .await;
        Ok(())
    }

    async fn poll_status(&self) -> RideResult<Option<StatusUpdate>> {
        let status = self.store.ride_status().await?;
        let mut last_seen = self.last_seen.lock().await;
        if *last_seen == Some(status) {
            return Ok(None);
        }

        let driver = match status {
            RideStatus::Accepted | RideStatus::Arrived | RideStatus::InProgress | RideStatus::Completed => {
                self.store.current_ride().await?.and_then(|ride| ride.driver)
            }
            _ => None,
        };
        let update = StatusUpdate {
            status,
            message: status_message(*last_seen, status).to_string(),
            driver,
        };
        tracing::debug!("Passenger observed status {:?} -> {}", *last_seen, status);
        *last_seen = Some(status);
        Ok(Some(update))
    }

    async fn quote(&self) -> FareQuote {
        FareQuote::for_draft(&*self.draft.lock().await)
    }

    async fn history(&self) -> RideResult<Vec<RideHistoryEntry>> {
        self.store.ride_history().await
    }
}
