// src/services/driver_service.rs
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, watch};
use tracing;

use crate::{
    errors::{RideError, RideResult},
    models::{
        driver::DriverProfile,
        history::{DriverRideRecord, RideHistoryEntry},
        ride::{Party, Ride, RideStatus},
    },
    services::{
        messaging_service::{NotificationMessage, NotificationService, notify},
        offer_timer::{DEFAULT_OFFER_TIMEOUT_SECS, OfferTimer},
        poller::PollHandle,
        store_service::StoreService,
    },
};

/// A pending ride request shown to the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideOffer {
    pub ride: Ride,
    pub fare: f64,
    pub eta_minutes: Option<u32>,
    pub expires_in_secs: u32,
}

struct ActiveOffer {
    ride_id: String,
    timer: OfferTimer,
}

type OfferSlot = Arc<Mutex<Option<ActiveOffer>>>;

#[async_trait]
pub trait DriverOperations: Send + Sync {
    async fn poll_offer(&self) -> RideResult<Option<RideOffer>>;
    async fn accept_offer(&self) -> RideResult<Ride>;
    async fn reject_offer(&self) -> RideResult<()>;
    async fn advance_step(&self) -> RideResult<Ride>;
    async fn finish_ride(&self, passenger_rating: Option<u8>) -> RideResult<DriverRideRecord>;
    async fn earnings(&self) -> RideResult<f64>;
    async fn history(&self) -> RideResult<Vec<DriverRideRecord>>;
}

pub struct DriverService {
    store: Arc<StoreService>,
    notification_service: Arc<dyn NotificationService>,
    profile: RwLock<DriverProfile>,
    offer_timeout_secs: u32,
    active_offer: OfferSlot,
}

impl DriverService {
    pub fn new(
        store: Arc<StoreService>,
        notification_service: Arc<dyn NotificationService>,
        profile: DriverProfile,
    ) -> Self {
        Self {
            store,
            notification_service,
            profile: RwLock::new(profile),
            offer_timeout_secs: DEFAULT_OFFER_TIMEOUT_SECS,
            active_offer: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_offer_timeout(mut self, seconds: u32) -> Self {
        self.offer_timeout_secs = seconds;
        self
    }

    pub async fn profile(&self) -> DriverProfile {
        self.profile.read().await.clone()
    }

    pub async fn set_profile(&self, profile: DriverProfile) {
        *self.profile.write().await = profile;
    }

    pub async fn has_active_offer(&self) -> bool {
        self.active_offer.lock().await.is_some()
    }

    /// Remaining seconds of the offer on screen, if any.
    pub async fn offer_countdown(&self) -> Option<watch::Receiver<u32>> {
        self.active_offer
            .lock()
            .await
            .as_ref()
            .map(|offer| offer.timer.subscribe())
    }

    /// Index of the current step on the driver's progress bar
    /// (accepted = 0, arrived = 1, in progress = 2, completed = 3).
    pub fn step_index(status: RideStatus) -> Option<usize> {
        match status {
            RideStatus::Accepted => Some(0),
            RideStatus::Arrived => Some(1),
            RideStatus::InProgress => Some(2),
            RideStatus::Completed => Some(3),
            _ => None,
        }
    }

    async fn take_offer(&self) -> RideResult<ActiveOffer> {
        self.active_offer
            .lock()
            .await
            .take()
            .ok_or(RideError::NoActiveOffer)
    }

    /// Runs when the countdown reaches zero without an answer. Whoever takes
    /// the offer out of the slot first owns the outcome, so an accept or
    /// reject racing the last tick leaves nothing for expiry to do. The task
    /// only holds a weak slot: once the service is gone nothing is written.
    async fn expire_offer(
        store: Arc<StoreService>,
        notification_service: Arc<dyn NotificationService>,
        slot: Weak<Mutex<Option<ActiveOffer>>>,
        ride_id: String,
    ) {
        let Some(slot) = slot.upgrade() else {
            tracing::debug!("Driver view gone, offer for ride {} left untouched", ride_id);
            return;
        };
        let offer = {
            let mut guard = slot.lock().await;
            match guard.take() {
                Some(offer) if offer.ride_id == ride_id => offer,
                other => {
                    *guard = other;
                    return;
                }
            }
        };
        offer.timer.release();

        match store.close_ride(Party::Driver, RideStatus::Searching).await {
            Ok(_) => {
                tracing::info!("Offer for ride {} expired", ride_id);
                notify(
                    notification_service.as_ref(),
                    NotificationMessage::offer_expired(&ride_id),
                )
                .await;
            }
            Err(RideError::StatusConflict { found, .. }) => {
                tracing::debug!("Offer for ride {} expired after status moved to {}", ride_id, found);
            }
            Err(e) => tracing::error!("Failed to expire offer for ride {}: {}", ride_id, e),
        }
    }

    async fn drop_stale_offer(&self, status: RideStatus) {
        if let Some(offer) = self.active_offer.lock().await.take() {
            tracing::info!("Withdrawing offer for ride {}: status is now {}", offer.ride_id, status);
            offer.timer.cancel();
        }
    }

    /// Polls for offers every `period` until the handle is dropped.
    pub fn watch_offers(self: Arc<Self>, period: Duration) -> PollHandle {
        PollHandle::spawn(period, move || {
            let service = self.clone();
            async move {
                if let Err(e) = service.poll_offer().await {
                    tracing::warn!("Driver offer poll failed: {}", e);
                }
            }
            .boxed()
        })
    }
}

#[async_trait]
impl DriverOperations for DriverService {
    /// Surfaces the current ride as an offer when it is searching, not yet
    /// accepted and not already on screen. Starts the countdown.
    async fn poll_offer(&self) -> RideResult<Option<RideOffer>> {
        let status = self.store.ride_status().await?;
        tracing::debug!("Driver poll: status {}", status);
        if status != RideStatus::Searching {
            self.drop_stale_offer(status).await;
            return Ok(None);
        }

        let Some(ride) = self.store.current_ride().await? else {
            return Ok(None);
        };
        if ride.driver_accepted {
            return Ok(None);
        }

        let mut slot = self.active_offer.lock().await;
        if let Some(existing) = slot.as_ref() {
            if existing.ride_id == ride.id {
                return Ok(None);
            }
        }

        let ride_id = ride.id.clone();
        let timer = {
            let store = self.store.clone();
            let notification_service = self.notification_service.clone();
            let slot = Arc::downgrade(&self.active_offer);
            let ride_id = ride_id.clone();
            OfferTimer::start(self.offer_timeout_secs, move || {
                Self::expire_offer(store, notification_service, slot, ride_id)
            })
        };
        if let Some(previous) = slot.replace(ActiveOffer { ride_id, timer }) {
            previous.timer.cancel();
        }
        drop(slot);

        let offer = RideOffer {
            fare: ride.fare(),
            eta_minutes: ride.eta_minutes(),
            expires_in_secs: self.offer_timeout_secs,
            ride,
        };
        tracing::info!("Surfacing offer for ride {}", offer.ride.id);
        notify(
            self.notification_service.as_ref(),
            NotificationMessage::new_offer(&offer.ride, offer.expires_in_secs),
        )
        .await;
        Ok(Some(offer))
    }

    async fn accept_offer(&self) -> RideResult<Ride> {
        let offer = self.take_offer().await?;
        offer.timer.cancel();

        let current = self.store.current_ride().await?.ok_or(RideError::NoCurrentRide)?;
        if current.id != offer.ride_id {
            return Err(RideError::RideMismatch {
                expected: offer.ride_id,
                found: current.id,
            });
        }

        let profile = self.profile().await;
        let result = self
            .store
            .advance_ride(Party::Driver, RideStatus::Searching, RideStatus::Accepted, move |ride| {
                ride.driver_accepted = true;
                ride.driver = Some(profile);
            })
            .await;

        match result {
            Ok(ride) => {
                notify(
                    self.notification_service.as_ref(),
                    NotificationMessage::driver_assigned(&ride),
                )
                .await;
                Ok(ride)
            }
            Err(e) => {
                notify(self.notification_service.as_ref(), NotificationMessage::rejected(&e)).await;
                Err(e)
            }
        }
    }

    async fn reject_offer(&self) -> RideResult<()> {
        let offer = self.take_offer().await?;
        offer.timer.cancel();

        match self.store.close_ride(Party::Driver, RideStatus::Searching).await {
            Ok(_) => {}
            // Passenger got there first; the ride is already gone.
            Err(RideError::StatusConflict { found, .. }) => {
                tracing::debug!("Ride {} left searching ({}) before the decline", offer.ride_id, found);
            }
            Err(e) => return Err(e),
        }

        tracing::info!("Driver declined ride {}", offer.ride_id);
        notify(
            self.notification_service.as_ref(),
            NotificationMessage::offer_rejected(&offer.ride_id),
        )
        .await;
        Ok(())
    }

    async fn advance_step(&self) -> RideResult<Ride> {
        let status = self.store.ride_status().await?;
        let next = status.next_step().ok_or(RideError::NoNextStep(status))?;

        let ride = self
            .store
            .advance_ride(Party::Driver, status, next, |_| {})
            .await?;

        let message = if next == RideStatus::Completed {
            NotificationMessage::rate_passenger(&ride)
        } else {
            NotificationMessage::status_changed(&ride)
        };
        notify(self.notification_service.as_ref(), message).await;
        Ok(ride)
    }

    /// Closes a completed ride: records it in the driver history with the
    /// optional passenger rating, credits the fare and resets to idle.
    async fn finish_ride(&self, passenger_rating: Option<u8>) -> RideResult<DriverRideRecord> {
        if let Some(rating) = passenger_rating {
            if !(1..=5).contains(&rating) {
                return Err(RideError::validation_error(
                    "passenger_rating",
                    "Rating must be between 1 and 5",
                ));
            }
        }

        let status = self.store.ride_status().await?;
        if status != RideStatus::Completed {
            return Err(RideError::InvalidTransition {
                from: status,
                to: RideStatus::Idle,
            });
        }
        let ride = self.store.current_ride().await?.ok_or(RideError::NoCurrentRide)?;

        let record = DriverRideRecord {
            entry: RideHistoryEntry::snapshot(&ride),
            passenger_rating,
        };
        self.store.record_driver_ride(record.clone()).await?;
        let total = self.store.credit_earnings(record.entry.fare).await?;
        self.store.close_ride(Party::Driver, RideStatus::Completed).await?;

        tracing::info!(
            "Finished ride {} (fare {:.2}, earnings {:.2})",
            ride.id,
            record.entry.fare,
            total
        );
        Ok(record)
    }

    async fn earnings(&self) -> RideResult<f64> {
        self.store.driver_earnings().await
    }

    async fn history(&self) -> RideResult<Vec<DriverRideRecord>> {
        self.store.driver_ride_history().await
    }
}
