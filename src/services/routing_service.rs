// src/services/routing_service.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing;

use crate::{
    errors::{RideError, RideResult},
    models::ride::LngLat,
    services::messaging_service::{NotificationMessage, NotificationService, notify},
};

pub const DEFAULT_SUGGESTION_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub distance_meters: f64,
    pub geometry: Vec<LngLat>,
}

impl RouteSummary {
    pub fn distance_km(&self) -> f64 {
        self.distance_meters / 1000.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSuggestion {
    pub label: String,
    pub coords: LngLat,
}

#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn route(&self, from: LngLat, to: LngLat) -> RideResult<RouteSummary>;
}

#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    async fn suggest(&self, query: &str, limit: usize) -> RideResult<Vec<PlaceSuggestion>>;
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .user_agent("rideshare-demo/0.1")
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}

// OSRM routing

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64, // meters
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<LngLat>,
}

pub fn parse_osrm_route(body: &str) -> RideResult<RouteSummary> {
    let response: OsrmResponse = serde_json::from_str(body)
        .map_err(|e| RideError::RouteLookup(format!("unreadable response: {}", e)))?;

    if response.code != "Ok" {
        return Err(RideError::RouteLookup(
            response.message.unwrap_or(response.code),
        ));
    }

    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| RideError::RouteLookup("no route found".to_string()))?;

    Ok(RouteSummary {
        distance_meters: route.distance,
        geometry: route.geometry.coordinates,
    })
}

pub struct OsrmRouteProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OsrmRouteProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: http_client(),
        }
    }
}

#[async_trait]
impl RouteProvider for OsrmRouteProvider {
    async fn route(&self, from: LngLat, to: LngLat) -> RideResult<RouteSummary> {
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}",
            self.base_url,
            from.longitude(),
            from.latitude(),
            to.longitude(),
            to.latitude()
        );
        tracing::debug!("Requesting route: {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[("overview", "full"), ("geometries", "geojson")])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() && !body.trim_start().starts_with('{') {
            return Err(RideError::RouteLookup(format!("status {}", status)));
        }
        parse_osrm_route(&body)
    }
}

// Nominatim geocoding

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    display_name: String,
    lat: String,
    lon: String,
}

pub fn parse_nominatim_places(body: &str) -> RideResult<Vec<PlaceSuggestion>> {
    let places: Vec<NominatimPlace> = serde_json::from_str(body)
        .map_err(|e| RideError::GeocodeLookup(format!("unreadable response: {}", e)))?;

    Ok(places
        .into_iter()
        .filter_map(|place| {
            let lon = place.lon.parse::<f64>().ok()?;
            let lat = place.lat.parse::<f64>().ok()?;
            Some(PlaceSuggestion {
                label: place.display_name,
                coords: LngLat(lon, lat),
            })
        })
        .collect())
}

pub struct NominatimGeocodeProvider {
    base_url: String,
    client: reqwest::Client,
}

impl NominatimGeocodeProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: http_client(),
        }
    }
}

#[async_trait]
impl GeocodeProvider for NominatimGeocodeProvider {
    async fn suggest(&self, query: &str, limit: usize) -> RideResult<Vec<PlaceSuggestion>> {
        let limit = limit.to_string();
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "json"), ("limit", limit.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RideError::GeocodeLookup(format!("status {}", status)));
        }
        let body = response.text().await?;
        parse_nominatim_places(&body)
    }
}

/// Front for the lookups a passenger triggers while composing a ride.
/// Failures never propagate: routes degrade to `None` with a notification,
/// suggestions degrade to an empty list with a log line.
pub struct RoutePlanner {
    routes: Arc<dyn RouteProvider>,
    geocoder: Arc<dyn GeocodeProvider>,
    notification_service: Arc<dyn NotificationService>,
}

impl RoutePlanner {
    pub fn new(
        routes: Arc<dyn RouteProvider>,
        geocoder: Arc<dyn GeocodeProvider>,
        notification_service: Arc<dyn NotificationService>,
    ) -> Self {
        Self {
            routes,
            geocoder,
            notification_service,
        }
    }

    pub async fn suggestions(&self, query: &str) -> Vec<PlaceSuggestion> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        match self.geocoder.suggest(query, DEFAULT_SUGGESTION_LIMIT).await {
            Ok(places) => places,
            Err(e) => {
                tracing::warn!("Suggestion lookup for '{}' failed: {}", query, e);
                Vec::new()
            }
        }
    }

    pub async fn route(&self, from: LngLat, to: LngLat) -> Option<RouteSummary> {
        match self.routes.route(from, to).await {
            Ok(route) => {
                tracing::debug!("Route resolved: {:.2} km", route.distance_km());
                Some(route)
            }
            Err(e) => {
                tracing::warn!("Route lookup failed: {}", e);
                notify(
                    self.notification_service.as_ref(),
                    NotificationMessage::lookup_failed("calculate the route", &e),
                )
                .await;
                None
            }
        }
    }

    pub async fn distance_km(&self, from: LngLat, to: LngLat) -> Option<f64> {
        self.route(from, to).await.map(|route| route.distance_km())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::services::messaging_service::RecordingNotificationService;

    fn planner(
        routes: StubRouteProvider,
        places: Option<Vec<PlaceSuggestion>>,
    ) -> (RoutePlanner, Arc<RecordingNotificationService>) {
        let notifications = Arc::new(RecordingNotificationService::new());
        let planner = RoutePlanner::new(
            Arc::new(routes),
            Arc::new(StubGeocodeProvider { places }),
            notifications.clone(),
        );
        (planner, notifications)
    }

    #[test]
    fn test_parse_osrm_route() {
        let body = r#"{"code":"Ok","routes":[{"distance":12345.6,"duration":900.1,
            "geometry":{"type":"LineString","coordinates":[[90.41,23.78],[90.40,23.79]]}}]}"#;
        let route = parse_osrm_route(body).unwrap();
        assert_eq!(route.distance_meters, 12345.6);
        assert_eq!(route.geometry.len(), 2);
        assert!((route.distance_km() - 12.3456).abs() < 1e-9);
    }

    #[test]
    fn test_parse_osrm_error_code() {
        let body = r#"{"code":"NoRoute","message":"Impossible route between points"}"#;
        match parse_osrm_route(body) {
            Err(RideError::RouteLookup(msg)) => assert_eq!(msg, "Impossible route between points"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_nominatim_skips_bad_coordinates() {
        let body = r#"[
            {"display_name":"Gulshan 1, Dhaka","lat":"23.7806","lon":"90.4163","importance":0.5},
            {"display_name":"Nowhere","lat":"n/a","lon":"90.0"}
        ]"#;
        let places = parse_nominatim_places(body).unwrap();
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].coords, LngLat(90.4163, 23.7806));
    }

    #[tokio::test]
    async fn test_route_failure_degrades_with_notification() {
        let (planner, notifications) = planner(StubRouteProvider::failing(), None);
        let distance = planner.distance_km(LngLat(90.41, 23.78), LngLat(90.40, 23.79)).await;
        assert_eq!(distance, None);
        assert_eq!(notifications.titles(), vec!["Could not calculate the route"]);
    }

    #[tokio::test]
    async fn test_suggestions_degrade_to_empty() {
        let (planner, notifications) = planner(StubRouteProvider::fixed(1000.0), None);
        assert!(planner.suggestions("Gulshan").await.is_empty());
        assert!(planner.suggestions("   ").await.is_empty());
        assert!(notifications.messages().is_empty());
    }

    #[tokio::test]
    async fn test_suggestions_limited() {
        let places = (0..8)
            .map(|n| PlaceSuggestion { label: format!("Place {n}"), coords: LngLat(90.0, 23.0) })
            .collect();
        let (planner, _) = planner(StubRouteProvider::fixed(1000.0), Some(places));
        assert_eq!(planner.suggestions("Place").await.len(), DEFAULT_SUGGESTION_LIMIT);
    }
}
