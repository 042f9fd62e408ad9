// src/services/messaging_service.rs
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::sync::Mutex;
use thiserror::Error;
use tracing;

use crate::{
    errors::{RideError, RideResult},
    models::ride::{Ride, RideStatus},
    services::fare_service,
};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Webhook send failed: {0}")]
    WebhookError(String),

    #[error("Webhook URL not configured")]
    NoWebhookUrl,
}

impl From<NotificationError> for RideError {
    fn from(error: NotificationError) -> Self {
        RideError::NotificationDelivery(error.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient, user-facing notification (toast).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationMessage {
    pub title: String,
    pub body: String,
    pub level: NotificationLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send(&self, message: NotificationMessage) -> RideResult<()>;
}

/// Sends and swallows delivery failures; a toast that cannot be shown must
/// never break the ride flow.
pub async fn notify(service: &dyn NotificationService, message: NotificationMessage) {
    let title = message.title.clone();
    if let Err(e) = service.send(message).await {
        tracing::error!("Failed to deliver notification '{}': {}", title, e);
    }
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("NOTIFY_WEBHOOK_URL").unwrap_or_default(),
        }
    }
}

/// Posts every notification as JSON to a webhook.
pub struct WebhookNotificationService {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookNotificationService {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self::new(WebhookConfig { url: url.into() })
    }
}

#[async_trait]
impl NotificationService for WebhookNotificationService {
    async fn send(&self, message: NotificationMessage) -> RideResult<()> {
        if self.config.url.is_empty() {
            return Err(NotificationError::NoWebhookUrl.into());
        }

        tracing::info!("Posting notification to webhook: {}", message.title);

        let response = self
            .client
            .post(&self.config.url)
            .json(&message)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Webhook request failed: {}", error_text);
            return Err(NotificationError::WebhookError(error_text).into());
        }

        tracing::debug!("Webhook notification sent successfully");
        Ok(())
    }
}

/// Logs notifications instead of showing them.
#[derive(Debug, Default)]
pub struct TracingNotificationService;

#[async_trait]
impl NotificationService for TracingNotificationService {
    async fn send(&self, message: NotificationMessage) -> RideResult<()> {
        match message.level {
            NotificationLevel::Warning | NotificationLevel::Error => {
                tracing::warn!("[NOTIFY] {} - {}", message.title, message.body)
            }
            _ => tracing::info!("[NOTIFY] {} - {}", message.title, message.body),
        }
        Ok(())
    }
}

/// Keeps every notification in memory; used by tests and the demo binary.
#[derive(Debug, Default)]
pub struct RecordingNotificationService {
    sent: Mutex<Vec<NotificationMessage>>,
}

impl RecordingNotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<NotificationMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn titles(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.title).collect()
    }

    pub fn count_titled(&self, title: &str) -> usize {
        self.messages().iter().filter(|m| m.title == title).count()
    }
}

#[async_trait]
impl NotificationService for RecordingNotificationService {
    async fn send(&self, message: NotificationMessage) -> RideResult<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message);
        }
        Ok(())
    }
}

// Helper functions for creating notifications
impl NotificationMessage {
    pub fn new(title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            level: NotificationLevel::Info,
            data: None,
        }
    }

    pub fn with_level(mut self, level: NotificationLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn searching_for_driver(ride: &Ride) -> Self {
        Self::new(
            "Searching for a driver",
            &format!("{} to {} - fare {:.2}", ride.pickup, ride.dropoff, ride.fare()),
        )
        .with_data(json!({ "type": "ride_requested", "ride_id": ride.id }))
    }

    pub fn new_offer(ride: &Ride, seconds: u32) -> Self {
        Self::new(
            "New ride request",
            &format!(
                "{} to {} ({}) - respond within {}s",
                ride.pickup,
                ride.dropoff,
                fare_service::format_distance(ride.distance_km),
                seconds
            ),
        )
        .with_data(json!({ "type": "ride_offer", "ride_id": ride.id, "fare": ride.fare() }))
    }

    pub fn offer_expired(ride_id: &str) -> Self {
        Self::new("Ride offer expired", "The request was not answered in time")
            .with_level(NotificationLevel::Warning)
            .with_data(json!({ "type": "offer_expired", "ride_id": ride_id }))
    }

    pub fn offer_rejected(ride_id: &str) -> Self {
        Self::new("Ride declined", "You declined the ride request")
            .with_data(json!({ "type": "offer_rejected", "ride_id": ride_id }))
    }

    pub fn driver_assigned(ride: &Ride) -> Self {
        let driver = ride
            .driver
            .as_ref()
            .map(|d| format!("{} - {}", d.name, d.vehicle_label()))
            .unwrap_or_else(|| "Your driver".to_string());
        Self::new("Ride accepted", &format!("{} is on the way", driver))
            .with_level(NotificationLevel::Success)
            .with_data(json!({ "type": "driver_assigned", "ride_id": ride.id }))
    }

    pub fn status_changed(ride: &Ride) -> Self {
        Self::new("Ride status updated", &format!("Ride is now {}", ride.status))
            .with_data(json!({ "type": "status_update", "ride_id": ride.id, "status": ride.status }))
    }

    pub fn rate_passenger(ride: &Ride) -> Self {
        Self::new(
            "Ride completed",
            &format!("Collect {:.2} and rate your passenger", ride.fare()),
        )
        .with_level(NotificationLevel::Success)
        .with_data(json!({ "type": "rating_prompt", "ride_id": ride.id }))
    }

    pub fn ride_cancelled(status: RideStatus) -> Self {
        Self::new("Ride cancelled", &format!("Cancelled while {}", status))
            .with_level(NotificationLevel::Warning)
    }

    pub fn lookup_failed(what: &str, error: &RideError) -> Self {
        Self::new(&format!("Could not {}", what), &error.user_message())
            .with_level(NotificationLevel::Error)
    }

    pub fn rejected(error: &RideError) -> Self {
        Self::new("Action not possible", &error.user_message()).with_level(NotificationLevel::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingNotificationService;

    #[async_trait]
    impl NotificationService for FailingNotificationService {
        async fn send(&self, _: NotificationMessage) -> RideResult<()> {
            Err(NotificationError::WebhookError("503".to_string()).into())
        }
    }

    #[tokio::test]
    async fn test_recording_service_keeps_order() {
        let service = RecordingNotificationService::new();
        notify(&service, NotificationMessage::new("one", "first")).await;
        notify(&service, NotificationMessage::new("two", "second")).await;
        assert_eq!(service.titles(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_notify_swallows_delivery_failure() {
        notify(&FailingNotificationService, NotificationMessage::new("lost", "never shown")).await;
    }

    #[tokio::test]
    async fn test_webhook_without_url_is_an_error() {
        let service = WebhookNotificationService::with_url("");
        let err = service.send(NotificationMessage::new("t", "b")).await.unwrap_err();
        assert!(matches!(err, RideError::NotificationDelivery(_)));
    }

    #[test]
    fn test_message_serializes_level_lowercase() {
        let message = NotificationMessage::new("t", "b").with_level(NotificationLevel::Warning);
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["level"], "warning");
        assert!(json.get("data").is_none());
    }
}
