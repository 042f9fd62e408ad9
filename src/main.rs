use std::time::Duration;

use rideshare_demo::{
    DriverOperations, PassengerOperations, RideResult, UserOperations,
    models::{DriverRegistration, LngLat, RegisteredUser, Role, RideType, VehicleInfo, VehicleType},
    services::fare_service,
    state::{AppConfig, AppState},
};

#[tokio::main]
async fn main() -> RideResult<()> {
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env()?;
    let registration = RegisteredUser::new(
        "Rahim",
        "rahim@example.com",
        vec![Role::Passenger, Role::Driver],
        Some(DriverRegistration {
            vehicle_type: VehicleType::Car,
            vehicle: VehicleInfo {
                make: "Toyota".to_string(),
                model: "Axio".to_string(),
                license: "DHA-11-2233".to_string(),
                color: "White".to_string(),
            },
            photo: None,
        }),
    )?;
    let driver_profile = registration
        .driver_profile()
        .ok_or_else(|| rideshare_demo::RideError::MissingRequiredField("driver".to_string()))?;

    let state = AppState::new(config, driver_profile)?;
    if state.store.ride_status().await?.is_in_flight() {
        tracing::warn!("A ride is already in flight in the shared store, demo may stop early");
    }

    state.user_service.register(registration).await?;
    state.user_service.sign_in("rahim@example.com", Role::Passenger).await?;
    state.network_guard.check("0xaa36a7").await;

    // Passenger books a ride
    let passenger = &state.passenger_service;
    passenger.set_pickup("Gulshan 1, Dhaka", Some(LngLat(90.4163, 23.7806))).await;
    passenger.set_dropoff("Motijheel, Dhaka", Some(LngLat(90.4176, 23.7330))).await;
    passenger.set_ride_type(RideType::Standard).await;
    passenger.set_vehicle_type(VehicleType::Car).await;
    let quote = passenger.refresh_route().await;
    println!(
        "Quote: fare {:.2}, distance {}, eta {}",
        quote.fare,
        quote.distance_label(),
        quote.eta_label()
    );
    let ride = passenger.confirm_ride().await?;
    println!("Ride {} confirmed", ride.id);

    let (status_poll, mut updates) = passenger.clone().watch_status(state.config.poll_interval);

    // Same user switches to the driver dashboard
    state.user_service.switch_role(Role::Driver).await?;
    let driver = &state.driver_service;
    match driver.poll_offer().await? {
        Some(offer) => println!(
            "Offer: {} -> {}, fare {:.2}, eta {}",
            offer.ride.pickup,
            offer.ride.dropoff,
            offer.fare,
            fare_service::format_eta(offer.eta_minutes)
        ),
        None => println!("No offer surfaced"),
    }
    driver.accept_offer().await?;
    for _ in 0..3 {
        let ride = driver.advance_step().await?;
        println!("Driver step: {}", ride.status);
    }

    tokio::time::sleep(state.config.poll_interval + Duration::from_millis(100)).await;
    while let Ok(update) = updates.try_recv() {
        println!("Passenger sees: {} ({})", update.message, update.status);
    }
    status_poll.stop();

    let record = driver.finish_ride(Some(5)).await?;
    println!("Finished ride, fare {:.2}", record.entry.fare);
    println!("Driver earnings: {:.2}", driver.earnings().await?);

    Ok(())
}
