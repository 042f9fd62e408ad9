// src/state.rs
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    errors::{RideError, RideResult},
    models::driver::DriverProfile,
    services::{
        driver_service::DriverService,
        messaging_service::{NotificationService, TracingNotificationService, WebhookNotificationService},
        network_guard::{DEFAULT_EXPECTED_CHAIN_ID, NetworkGuard},
        offer_timer::DEFAULT_OFFER_TIMEOUT_SECS,
        passenger_service::PassengerService,
        poller::DEFAULT_POLL_INTERVAL,
        routing_service::{NominatimGeocodeProvider, OsrmRouteProvider, RoutePlanner},
        store_service::{DEFAULT_PASSENGER_HISTORY_CAP, MemoryStore, RedisStore, SharedStore, StoreService},
        user_service::UserService,
    },
};

pub struct AppState {
    pub store: Arc<StoreService>,
    pub user_service: Arc<UserService>,
    pub passenger_service: Arc<PassengerService>,
    pub driver_service: Arc<DriverService>,
    pub route_planner: Arc<RoutePlanner>,
    pub network_guard: Arc<NetworkGuard>,
    pub notification_service: Arc<dyn NotificationService>,
    pub config: AppConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis,
}

impl FromStr for StoreBackend {
    type Err = RideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "redis" => Ok(StoreBackend::Redis),
            other => Err(RideError::InvalidConfiguration(format!(
                "unknown store backend '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_backend: StoreBackend,
    pub redis_url: String,
    pub namespace: String,
    pub osrm_url: String,
    pub nominatim_url: String,
    pub expected_chain_id: u64,
    pub notify_webhook_url: Option<String>,
    pub poll_interval: Duration,
    pub offer_timeout_secs: u32,
    pub passenger_history_cap: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            namespace: "rideshare".to_string(),
            osrm_url: "https://router.project-osrm.org".to_string(),
            nominatim_url: "https://nominatim.openstreetmap.org".to_string(),
            expected_chain_id: DEFAULT_EXPECTED_CHAIN_ID,
            notify_webhook_url: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            offer_timeout_secs: DEFAULT_OFFER_TIMEOUT_SECS,
            passenger_history_cap: DEFAULT_PASSENGER_HISTORY_CAP,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> RideResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| RideError::InvalidConfiguration(format!("{} has an invalid value '{}'", name, raw)))
}

impl AppConfig {
    /// Reads the environment on top of the defaults.
    pub fn from_env() -> RideResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> RideResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("RIDESHARE_STORE") {
            config.store_backend = raw.parse()?;
        }
        if let Some(url) = lookup("REDIS_URL") {
            config.redis_url = url;
        }
        if let Some(namespace) = lookup("RIDESHARE_NAMESPACE") {
            config.namespace = namespace;
        }
        if let Some(url) = lookup("OSRM_URL") {
            config.osrm_url = url;
        }
        if let Some(url) = lookup("NOMINATIM_URL") {
            config.nominatim_url = url;
        }
        if let Some(raw) = lookup("EXPECTED_CHAIN_ID") {
            config.expected_chain_id = crate::services::network_guard::parse_chain_id(&raw)
                .ok_or_else(|| {
                    RideError::InvalidConfiguration(format!("EXPECTED_CHAIN_ID has an invalid value '{}'", raw))
                })?;
        }
        config.notify_webhook_url = lookup("NOTIFY_WEBHOOK_URL").filter(|url| !url.trim().is_empty());
        if let Some(raw) = lookup("POLL_INTERVAL_MS") {
            let millis: u64 = parse_var("POLL_INTERVAL_MS", &raw)?;
            if millis == 0 {
                return Err(RideError::InvalidConfiguration(
                    "POLL_INTERVAL_MS must be positive".to_string(),
                ));
            }
            config.poll_interval = Duration::from_millis(millis);
        }
        if let Some(raw) = lookup("OFFER_TIMEOUT_SECS") {
            config.offer_timeout_secs = parse_var("OFFER_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("PASSENGER_HISTORY_CAP") {
            config.passenger_history_cap = parse_var("PASSENGER_HISTORY_CAP", &raw)?;
        }

        Ok(config)
    }
}

impl AppState {
    pub fn new(config: AppConfig, driver_profile: DriverProfile) -> RideResult<Self> {
        let backend: Arc<dyn SharedStore> = match config.store_backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::Redis => Arc::new(RedisStore::new(&config.redis_url, config.namespace.clone())?),
        };
        let store = Arc::new(StoreService::new(backend, config.passenger_history_cap));

        let notification_service: Arc<dyn NotificationService> = match &config.notify_webhook_url {
            Some(url) => Arc::new(WebhookNotificationService::with_url(url.clone())),
            None => {
                tracing::warn!("NOTIFY_WEBHOOK_URL not set, notifications go to the log");
                Arc::new(TracingNotificationService)
            }
        };

        Ok(Self::with_services(config, store, notification_service, driver_profile))
    }

    /// Wires the services over an existing store and notifier.
    pub fn with_services(
        config: AppConfig,
        store: Arc<StoreService>,
        notification_service: Arc<dyn NotificationService>,
        driver_profile: DriverProfile,
    ) -> Self {
        let route_planner = Arc::new(RoutePlanner::new(
            Arc::new(OsrmRouteProvider::new(config.osrm_url.clone())),
            Arc::new(NominatimGeocodeProvider::new(config.nominatim_url.clone())),
            notification_service.clone(),
        ));
        Self::with_planner(config, store, notification_service, route_planner, driver_profile)
    }

    pub fn with_planner(
        config: AppConfig,
        store: Arc<StoreService>,
        notification_service: Arc<dyn NotificationService>,
        route_planner: Arc<RoutePlanner>,
        driver_profile: DriverProfile,
    ) -> Self {
        let user_service = Arc::new(UserService::new(store.clone(), notification_service.clone()));
        let passenger_service = Arc::new(PassengerService::new(
            store.clone(),
            route_planner.clone(),
            notification_service.clone(),
        ));
        let driver_service = Arc::new(
            DriverService::new(store.clone(), notification_service.clone(), driver_profile)
                .with_offer_timeout(config.offer_timeout_secs),
        );
        let network_guard = Arc::new(NetworkGuard::new(
            config.expected_chain_id,
            notification_service.clone(),
        ));

        Self {
            store,
            user_service,
            passenger_service,
            driver_service,
            route_planner,
            network_guard,
            notification_service,
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.offer_timeout_secs, 15);
        assert_eq!(config.passenger_history_cap, 5);
        assert_eq!(config.expected_chain_id, 11_155_111);
        assert_eq!(config.notify_webhook_url, None);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("RIDESHARE_STORE", "Redis"),
            ("POLL_INTERVAL_MS", "500"),
            ("EXPECTED_CHAIN_ID", "0x1"),
            ("NOTIFY_WEBHOOK_URL", "http://localhost:9000/hook"),
        ]))
        .unwrap();
        assert_eq!(config.store_backend, StoreBackend::Redis);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.expected_chain_id, 1);
        assert_eq!(config.notify_webhook_url.as_deref(), Some("http://localhost:9000/hook"));
    }

    fn driver() -> DriverProfile {
        DriverProfile::new(
            "Rahim",
            crate::models::driver::VehicleInfo {
                make: "Toyota".to_string(),
                model: "Axio".to_string(),
                license: "DHA-11-2233".to_string(),
                color: "White".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_new_uses_configured_store() {
        let config = AppConfig {
            passenger_history_cap: 2,
            ..AppConfig::default()
        };
        let state = AppState::new(config, driver()).unwrap();
        for n in 0..3 {
            state
                .store
                .record_passenger_ride(crate::models::history::RideHistoryEntry {
                    ride_id: Some(n.to_string()),
                    pickup: "Banani".to_string(),
                    dropoff: "Uttara".to_string(),
                    ride_type: crate::models::ride::RideType::Standard,
                    distance: None,
                    fare: 0.0,
                    timestamp: chrono::Utc::now(),
                })
                .await
                .unwrap();
        }
        assert_eq!(state.store.ride_history().await.unwrap().len(), 2);

        let redis = AppConfig {
            store_backend: StoreBackend::Redis,
            redis_url: "not a redis url".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(AppState::new(redis, driver()), Err(RideError::StoreBackend(_))));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for vars in [
            [("RIDESHARE_STORE", "sqlite")],
            [("POLL_INTERVAL_MS", "0")],
            [("OFFER_TIMEOUT_SECS", "soon")],
        ] {
            assert!(matches!(
                AppConfig::from_lookup(lookup(&vars)),
                Err(RideError::InvalidConfiguration(_))
            ));
        }
    }
}
