// src/services/user_service.rs
use async_trait::async_trait;
use std::sync::Arc;
use tracing;

use crate::{
    errors::{RideError, RideResult},
    models::{
        driver::DriverProfile,
        user::{RegisteredUser, Role, UserSession},
    },
    services::{
        messaging_service::{NotificationLevel, NotificationMessage, NotificationService, notify},
        store_service::StoreService,
    },
};

#[async_trait]
pub trait UserOperations: Send + Sync {
    async fn register(&self, user: RegisteredUser) -> RideResult<RegisteredUser>;
    async fn sign_in(&self, email: &str, role: Role) -> RideResult<UserSession>;
    async fn current_session(&self) -> RideResult<Option<UserSession>>;
    async fn switch_role(&self, role: Role) -> RideResult<UserSession>;
    async fn sign_out(&self) -> RideResult<()>;
    async fn driver_profile(&self) -> RideResult<Option<DriverProfile>>;
}

pub struct UserService {
    store: Arc<StoreService>,
    notification_service: Arc<dyn NotificationService>,
}

impl UserService {
    pub fn new(store: Arc<StoreService>, notification_service: Arc<dyn NotificationService>) -> Self {
        Self {
            store,
            notification_service,
        }
    }
}

#[async_trait]
impl UserOperations for UserService {
    async fn register(&self, user: RegisteredUser) -> RideResult<RegisteredUser> {
        tracing::info!("Registering {} with roles {:?}", user.email, user.roles);
        self.store.set_registered_user(&user).await?;
        notify(
            self.notification_service.as_ref(),
            NotificationMessage::new("Registration complete", &format!("Welcome, {}", user.name))
                .with_level(NotificationLevel::Success),
        )
        .await;
        Ok(user)
    }

    async fn sign_in(&self, email: &str, role: Role) -> RideResult<UserSession> {
        let registered = self
            .store
            .registered_user()
            .await?
            .filter(|user| user.email.eq_ignore_ascii_case(email.trim()))
            .ok_or_else(|| RideError::validation_error("email", "No account registered for this email"))?;

        let session = UserSession::sign_in(&registered, role)?;
        self.store.set_user(&session).await?;
        tracing::info!("{} signed in as {}", session.email, session.active_role);
        Ok(session)
    }

    async fn current_session(&self) -> RideResult<Option<UserSession>> {
        self.store.user().await
    }

    async fn switch_role(&self, role: Role) -> RideResult<UserSession> {
        let mut session = self
            .store
            .user()
            .await?
            .ok_or_else(|| RideError::MissingRequiredField("user".to_string()))?;
        session.switch_role(role)?;
        self.store.set_user(&session).await?;
        Ok(session)
    }

    async fn sign_out(&self) -> RideResult<()> {
        if let Some(session) = self.store.user().await? {
            tracing::info!("{} signed out", session.email);
        }
        self.store.clear_user().await
    }

    async fn driver_profile(&self) -> RideResult<Option<DriverProfile>> {
        Ok(self
            .store
            .registered_user()
            .await?
            .and_then(|user| user.driver_profile()))
    }
}
