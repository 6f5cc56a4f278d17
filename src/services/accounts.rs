//! Account service
//!
//! Registration and activation flows. Each operation opens a transaction
//! scope, performs its writes, dispatches the matching events, and
//! commits the scope so deferred notifications run exactly once.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;

use crate::db::repositories::{
    ActivationTokenRepository, AuthorRepository, GroupRepository, UserRepository,
};
use crate::events::{Event, EventBus, TxScope};
use crate::models::{User, COMMON_GROUP};

/// Registration and activation operations.
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    authors: Arc<dyn AuthorRepository>,
    tokens: Arc<dyn ActivationTokenRepository>,
    groups: Arc<dyn GroupRepository>,
    bus: Arc<EventBus>,
    token_retention_days: i64,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        authors: Arc<dyn AuthorRepository>,
        tokens: Arc<dyn ActivationTokenRepository>,
        groups: Arc<dyn GroupRepository>,
        bus: Arc<EventBus>,
        token_retention_days: i64,
    ) -> Self {
        Self {
            users,
            authors,
            tokens,
            groups,
            bus,
            token_retention_days,
        }
    }

    /// Register a new account. Provisioning (group, author profile,
    /// activation token) and the welcome email flow from the
    /// `UserCreated` event.
    pub async fn register(&self, username: &str, email: &str) -> Result<User> {
        if self.users.get_by_email(email).await?.is_some() {
            anyhow::bail!("Email already registered: {}", email);
        }

        let mut scope = TxScope::new();

        let user = self
            .users
            .create(&User::new(username.to_string(), email.to_string(), false))
            .await
            .context("Failed to create user")?;

        self.bus
            .dispatch(&Event::UserCreated { user: user.clone() }, &mut scope)
            .await;

        scope.commit().await;
        Ok(user)
    }

    /// Register an account arriving from an external identity provider.
    ///
    /// The provider already verified the email address, so the account is
    /// provisioned directly with a pre-activated token and no welcome or
    /// activation email is sent.
    pub async fn register_social(&self, username: &str, email: &str) -> Result<User> {
        if self.users.get_by_email(email).await?.is_some() {
            anyhow::bail!("Email already registered: {}", email);
        }

        let user = self
            .users
            .create(&User::new(username.to_string(), email.to_string(), false))
            .await
            .context("Failed to create user")?;

        let common = self.groups.get_or_create(COMMON_GROUP).await?;
        self.groups.add_member(common.id, user.id).await?;
        self.authors.get_or_create(user.id).await?;
        self.tokens.create_for_user(user.id, true).await?;

        tracing::info!("Social account provisioned for {}", user.email);
        Ok(user)
    }

    /// Activate the account behind a token value.
    ///
    /// Returns `false` when the token does not exist, was already
    /// activated, or outlived the retention window without being swept
    /// yet; the success email and authors role grant only ever run on
    /// the first flip.
    pub async fn activate(&self, token_value: &str) -> Result<bool> {
        let Some(existing) = self.tokens.get_by_token(token_value).await? else {
            tracing::debug!("Activation rejected: token unknown");
            return Ok(false);
        };
        if existing.is_expired(Utc::now(), self.token_retention_days) {
            tracing::info!(
                "Activation rejected: token for user {} expired",
                existing.user_id
            );
            return Ok(false);
        }

        let mut scope = TxScope::new();

        let Some(token) = self.tokens.activate(token_value).await? else {
            tracing::debug!("Activation rejected: token already used");
            return Ok(false);
        };

        self.bus
            .dispatch(
                &Event::ActivationTokenSaved {
                    token,
                    created: false,
                    was_activated: false,
                },
                &mut scope,
            )
            .await;

        scope.commit().await;
        Ok(true)
    }
}
