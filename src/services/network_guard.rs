// src/services/network_guard.rs
use serde::Serialize;
use std::sync::Arc;
use tracing;

use crate::services::messaging_service::{
    NotificationLevel, NotificationMessage, NotificationService, notify,
};

/// Sepolia
pub const DEFAULT_EXPECTED_CHAIN_ID: u64 = 11_155_111;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum NetworkCheck {
    Matched,
    Mismatch { expected: u64, found: Option<u64> },
}

impl NetworkCheck {
    pub fn is_match(&self) -> bool {
        matches!(self, NetworkCheck::Matched)
    }
}

/// Parses a chain id as reported by a wallet: `0x` hex or plain decimal.
pub fn parse_chain_id(raw: &str) -> Option<u64> {
    let raw = raw.trim().trim_matches('"');
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

/// Compares the wallet's network with the expected one. A mismatch only
/// warns; nothing that does not touch the chain is blocked.
pub struct NetworkGuard {
    expected_chain_id: u64,
    notification_service: Arc<dyn NotificationService>,
}

impl NetworkGuard {
    pub fn new(expected_chain_id: u64, notification_service: Arc<dyn NotificationService>) -> Self {
        Self {
            expected_chain_id,
            notification_service,
        }
    }

    pub fn expected_chain_id(&self) -> u64 {
        self.expected_chain_id
    }

    pub async fn check(&self, reported: &str) -> NetworkCheck {
        let found = parse_chain_id(reported);
        if found == Some(self.expected_chain_id) {
            tracing::debug!("Wallet on expected network {}", self.expected_chain_id);
            return NetworkCheck::Matched;
        }

        tracing::warn!(
            "Wallet network {:?} does not match expected {}",
            reported,
            self.expected_chain_id
        );
        notify(
            self.notification_service.as_ref(),
            NotificationMessage::new(
                "Wrong network",
                &format!(
                    "Please switch your wallet to network {} for on-chain actions",
                    self.expected_chain_id
                ),
            )
            .with_level(NotificationLevel::Warning),
        )
        .await;
        NetworkCheck::Mismatch {
            expected: self.expected_chain_id,
            found,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::messaging_service::RecordingNotificationService;

    #[test]
    fn test_parse_chain_id() {
        assert_eq!(parse_chain_id("0xaa36a7"), Some(11_155_111));
        assert_eq!(parse_chain_id("11155111"), Some(11_155_111));
        assert_eq!(parse_chain_id("\"0x1\""), Some(1));
        assert_eq!(parse_chain_id("mainnet"), None);
        assert_eq!(parse_chain_id(""), None);
    }

    #[tokio::test]
    async fn test_mismatch_warns_without_blocking() {
        let notifications = Arc::new(RecordingNotificationService::new());
        let guard = NetworkGuard::new(DEFAULT_EXPECTED_CHAIN_ID, notifications.clone());

        assert_eq!(guard.check("0xaa36a7").await, NetworkCheck::Matched);
        assert!(notifications.messages().is_empty());

        let check = guard.check("0x1").await;
        assert_eq!(
            check,
            NetworkCheck::Mismatch { expected: DEFAULT_EXPECTED_CHAIN_ID, found: Some(1) }
        );
        assert!(!check.is_match());
        assert_eq!(notifications.titles(), vec!["Wrong network"]);
    }
}
