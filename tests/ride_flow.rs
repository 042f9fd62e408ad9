use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use rideshare_demo::{
    DriverOperations, PassengerOperations, RideResult,
    models::{DriverProfile, LngLat, RideStatus, RideType, VehicleInfo, VehicleType},
    services::{
        messaging_service::RecordingNotificationService,
        routing_service::{GeocodeProvider, PlaceSuggestion, RouteProvider, RoutePlanner, RouteSummary},
        store_service::StoreService,
    },
    state::{AppConfig, AppState},
};

struct FixedRoute(f64);

#[async_trait]
impl RouteProvider for FixedRoute {
    async fn route(&self, from: LngLat, to: LngLat) -> RideResult<RouteSummary> {
        Ok(RouteSummary {
            distance_meters: self.0,
            geometry: vec![from, to],
        })
    }
}

struct NoPlaces;

#[async_trait]
impl GeocodeProvider for NoPlaces {
    async fn suggest(&self, _query: &str, _limit: usize) -> RideResult<Vec<PlaceSuggestion>> {
        Ok(Vec::new())
    }
}

fn app(distance_meters: f64) -> (AppState, Arc<RecordingNotificationService>) {
    let notifications = Arc::new(RecordingNotificationService::new());
    let planner = Arc::new(RoutePlanner::new(
        Arc::new(FixedRoute(distance_meters)),
        Arc::new(NoPlaces),
        notifications.clone(),
    ));
    let driver = DriverProfile::new(
        "Rahim",
        VehicleInfo {
            make: "Toyota".to_string(),
            model: "Axio".to_string(),
            license: "DHA-11-2233".to_string(),
            color: "White".to_string(),
        },
    );
    let state = AppState::with_planner(
        AppConfig::default(),
        Arc::new(StoreService::in_memory()),
        notifications.clone(),
        planner,
        driver,
    );
    (state, notifications)
}

async fn book(state: &AppState) -> rideshare_demo::Ride {
    let passenger = &state.passenger_service;
    passenger.set_pickup("Gulshan 1", Some(LngLat(90.4163, 23.7806))).await;
    passenger.set_dropoff("Motijheel", Some(LngLat(90.4176, 23.7330))).await;
    passenger.set_ride_type(RideType::Premium).await;
    passenger.set_vehicle_type(VehicleType::Car).await;
    passenger.refresh_route().await;
    passenger.confirm_ride().await.unwrap()
}

#[tokio::test(start_paused = true)]
async fn completed_ride_credits_driver() {
    let (state, _) = app(100_000.0);
    let ride = book(&state).await;
    assert_eq!(ride.distance_km, Some(100.0));
    let fare = ride.fare();
    assert!(fare >= 255.0 && fare < 380.0);

    let offers = state.driver_service.clone().watch_offers(Duration::from_secs(2));
    let (status_poll, mut updates) = state
        .passenger_service
        .clone()
        .watch_status(Duration::from_secs(2));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(state.driver_service.has_active_offer().await);
    assert_eq!(updates.recv().await.map(|u| u.status), Some(RideStatus::Searching));

    state.driver_service.accept_offer().await.unwrap();
    let update = updates.recv().await.unwrap();
    assert_eq!(update.status, RideStatus::Accepted);
    assert_eq!(update.driver.map(|d| d.name), Some("Rahim".to_string()));

    for expected in [RideStatus::Arrived, RideStatus::InProgress, RideStatus::Completed] {
        let advanced = state.driver_service.advance_step().await.unwrap();
        assert_eq!(advanced.status, expected);
        assert_eq!(updates.recv().await.map(|u| u.status), Some(expected));
    }

    let record = state.driver_service.finish_ride(Some(5)).await.unwrap();
    assert_eq!(record.entry.ride_id.as_deref(), Some(ride.id.as_str()));
    assert_eq!(state.driver_service.earnings().await.unwrap(), fare);
    assert_eq!(state.driver_service.history().await.unwrap().len(), 1);
    assert_eq!(state.passenger_service.history().await.unwrap().len(), 1);
    assert_eq!(state.store.ride_status().await.unwrap(), RideStatus::Idle);

    offers.stop();
    status_poll.stop();
}

#[tokio::test(start_paused = true)]
async fn unanswered_offer_times_out() {
    let (state, notifications) = app(12_000.0);
    book(&state).await;

    let _offers = state.driver_service.clone().watch_offers(Duration::from_secs(2));
    let (_status_poll, mut updates) = state
        .passenger_service
        .clone()
        .watch_status(Duration::from_secs(2));

    tokio::time::sleep(Duration::from_secs(20)).await;

    assert_eq!(updates.recv().await.map(|u| u.status), Some(RideStatus::Searching));
    let timed_out = updates.recv().await.unwrap();
    assert_eq!(timed_out.status, RideStatus::Idle);
    assert_eq!(timed_out.message, "No driver accepted your ride. Please try again.");

    assert_eq!(notifications.count_titled("New ride request"), 1);
    assert_eq!(notifications.count_titled("Ride offer expired"), 1);
    assert!(!state.driver_service.has_active_offer().await);
    assert_eq!(state.driver_service.earnings().await.unwrap(), 0.0);
}
