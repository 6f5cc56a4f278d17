//! Post-commit notifier
//!
//! The handlers behind the event bus: account provisioning on
//! registration, notification fan-out on publication, the activation
//! success path, and cache invalidation for subscriptions and comments.
//!
//! Cache invalidation runs synchronously at dispatch time (a stale entry
//! self-heals, so it has no correctness dependency on the commit).
//! Notification delivery is deferred to the commit via the scope and
//! re-fetches its entity by identity first, so it never acts on a
//! rolled-back or half-written snapshot.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::{keys, Cache};
use crate::config::SiteConfig;
use crate::db::repositories::{
    ActivationTokenRepository, AuthorRepository, GroupRepository, PostRepository,
    SubscriptionRepository, UserRepository,
};
use crate::models::{PostKind, User, AUTHORS_GROUP, COMMON_GROUP};
use crate::services::email::Mailer;

use super::bus::{EventBus, EventHandler};
use super::event::{EntityKind, Event, Transition};
use super::scope::TxScope;

/// Shared state for all event handlers.
pub struct Notifier {
    users: Arc<dyn UserRepository>,
    authors: Arc<dyn AuthorRepository>,
    tokens: Arc<dyn ActivationTokenRepository>,
    posts: Arc<dyn PostRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    groups: Arc<dyn GroupRepository>,
    cache: Arc<Cache>,
    mailer: Arc<dyn Mailer>,
    site: SiteConfig,
}

impl Notifier {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn UserRepository>,
        authors: Arc<dyn AuthorRepository>,
        tokens: Arc<dyn ActivationTokenRepository>,
        posts: Arc<dyn PostRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        groups: Arc<dyn GroupRepository>,
        cache: Arc<Cache>,
        mailer: Arc<dyn Mailer>,
        site: SiteConfig,
    ) -> Self {
        Self {
            users,
            authors,
            tokens,
            posts,
            subscriptions,
            groups,
            cache,
            mailer,
            site,
        }
    }

    /// Provision a freshly created non-staff user: common group, author
    /// profile, activation token, then a deferred welcome email.
    async fn handle_user_created(self: Arc<Self>, user: &User, scope: &mut TxScope) -> Result<()> {
        if user.is_staff {
            tracing::debug!("User {} is staff, skipping provisioning", user.id);
            return Ok(());
        }

        tracing::info!("Provisioning newly registered user: {}", user.email);

        let common = self.groups.get_or_create(COMMON_GROUP).await?;
        self.groups.add_member(common.id, user.id).await?;

        let (_profile, profile_created) = self.authors.get_or_create(user.id).await?;
        if profile_created {
            tracing::info!("Created author profile for user {}", user.id);
        }

        let token = self.tokens.create_for_user(user.id, false).await?;
        let activation_url = self.site.activation_url(&token.token);

        let user_id = user.id;
        scope.on_commit(EntityKind::User, user_id, move || async move {
            self.deliver_welcome(user_id, activation_url).await
        });

        Ok(())
    }

    /// Deferred: re-fetch the user and send the welcome email.
    async fn deliver_welcome(&self, user_id: i64, activation_url: String) -> Result<()> {
        let Some(user) = self.users.get_by_id(user_id).await? else {
            tracing::warn!("User {} vanished before welcome email was sent", user_id);
            return Ok(());
        };

        self.mailer
            .send_welcome(&user, &activation_url)
            .await
            .with_context(|| format!("Failed to send welcome email to {}", user.email))?;

        tracing::info!("Welcome email sent to {}", user.email);
        Ok(())
    }

    /// React to a post insert: invalidate listings, then defer the
    /// notification fan-out when categories were attached at creation.
    async fn handle_post_created(
        self: Arc<Self>,
        event: &Event,
        scope: &mut TxScope,
    ) -> Result<()> {
        let Event::PostCreated { post, category_ids } = event else {
            return Ok(());
        };

        tracing::info!("New {} created: '{}' (id={})", post.kind, post.title, post.id);

        self.cache.invalidate(keys::LATEST_NEWS).await;
        self.cache.invalidate(keys::NEWS_LIST).await;
        self.cache.invalidate(&keys::post(post.id)).await;
        self.cache.invalidate(keys::CATEGORIES_LIST).await;

        if !category_ids.is_empty() {
            self.schedule_post_notifications(post.id, scope);
        }

        Ok(())
    }

    /// React to categories being attached to an existing post.
    fn handle_post_categories_added(self: Arc<Self>, post_id: i64, scope: &mut TxScope) {
        tracing::debug!("Categories attached to post {}", post_id);
        self.schedule_post_notifications(post_id, scope);
    }

    /// Defer the notification fan-out for a post. Keyed by post id, so a
    /// create plus a category attach in the same transaction collapse into
    /// one delivery.
    fn schedule_post_notifications(self: Arc<Self>, post_id: i64, scope: &mut TxScope) {
        scope.on_commit(EntityKind::Post, post_id, move || async move {
            self.process_post_notifications(post_id).await
        });
    }

    /// Deferred: re-fetch the post and dispatch to the delivery path for
    /// its kind.
    async fn process_post_notifications(&self, post_id: i64) -> Result<()> {
        let Some(post) = self.posts.get_by_id(post_id).await? else {
            tracing::warn!("Post {} vanished before notification dispatch", post_id);
            return Ok(());
        };

        match post.kind {
            PostKind::News => {
                let categories = self.posts.categories_of(post.id).await?;

                // Dedupe recipients subscribed to several of the post's categories
                let mut recipients: BTreeMap<i64, User> = BTreeMap::new();
                for category in &categories {
                    for subscriber in self.subscriptions.subscribers_of(category.id).await? {
                        recipients.entry(subscriber.id).or_insert(subscriber);
                    }
                }

                let recipients: Vec<User> = recipients.into_values().collect();
                self.mailer
                    .send_news_notification(&post, &recipients)
                    .await
                    .with_context(|| format!("News fan-out failed for post {}", post.id))?;

                tracing::info!(
                    "News notifications dispatched for post {} ({} recipient(s))",
                    post.id,
                    recipients.len()
                );
            }
            PostKind::Article => {
                self.mailer
                    .send_article_notification(&post)
                    .await
                    .with_context(|| format!("Article notification failed for post {}", post.id))?;

                tracing::info!("Article notification dispatched for post {}", post.id);
            }
        }

        Ok(())
    }

    /// React to an activation token write. Only the `false -> true` edge
    /// defers the success notification and role grant; a re-save of an
    /// already-activated token is a no-op.
    async fn handle_token_saved(
        self: Arc<Self>,
        event: &Event,
        scope: &mut TxScope,
    ) -> Result<()> {
        let Event::ActivationTokenSaved {
            token,
            created,
            was_activated,
        } = event
        else {
            return Ok(());
        };

        if *created || *was_activated || !token.activated {
            tracing::debug!(
                "Token {} save did not cross the activation edge, ignoring",
                token.id
            );
            return Ok(());
        }

        tracing::info!("Account activated for user {}", token.user_id);

        let token_id = token.id;
        let token_value = token.token.clone();
        scope.on_commit(EntityKind::ActivationToken, token_id, move || async move {
            self.deliver_activation_success(token_value).await
        });

        Ok(())
    }

    /// Deferred: re-fetch the token, confirm it is still activated, send
    /// the success email, and grant the authors role.
    async fn deliver_activation_success(&self, token_value: String) -> Result<()> {
        let Some(token) = self.tokens.get_by_token(&token_value).await? else {
            tracing::warn!("Activation token vanished before success notification");
            return Ok(());
        };
        if !token.activated {
            tracing::warn!("Token {} no longer activated, skipping notification", token.id);
            return Ok(());
        }

        let Some(user) = self.users.get_by_id(token.user_id).await? else {
            tracing::warn!("User {} vanished before activation notification", token.user_id);
            return Ok(());
        };

        self.mailer
            .send_activation_success(&user)
            .await
            .with_context(|| format!("Failed to send activation success email to {}", user.email))?;
        tracing::info!("Activation success email sent to {}", user.email);

        if !self.groups.is_member(AUTHORS_GROUP, user.id).await? {
            let authors = self.groups.get_or_create(AUTHORS_GROUP).await?;
            self.groups.add_member(authors.id, user.id).await?;
            tracing::info!("User {} added to the {} group", user.id, AUTHORS_GROUP);
        }

        Ok(())
    }

    /// React to a subscription insert or delete: invalidate the user's
    /// subscription list and the category's subscriber count.
    async fn handle_subscription_changed(&self, user_id: i64, category_id: i64) {
        self.cache.invalidate(&keys::user_subscriptions(user_id)).await;
        self.cache
            .invalidate(&keys::category_subscribers_count(category_id))
            .await;
    }

    /// React to a comment insert: invalidate the post's comment caches.
    async fn handle_comment_created(&self, post_id: i64) {
        self.cache.invalidate(&keys::post_comments(post_id)).await;
        self.cache.invalidate(&keys::post_comments_count(post_id)).await;
    }

    /// React to an author profile delete: revoke the authors role.
    async fn handle_author_profile_deleted(&self, user_id: i64) -> Result<()> {
        self.groups
            .remove_member(AUTHORS_GROUP, user_id)
            .await
            .with_context(|| format!("Failed to revoke authors role for user {}", user_id))?;

        tracing::info!("Authors role revoked for user {}", user_id);
        Ok(())
    }
}

// Handler adapters binding Notifier methods to the bus.

struct UserCreatedHandler(Arc<Notifier>);

#[async_trait]
impl EventHandler for UserCreatedHandler {
    async fn handle(&self, event: &Event, scope: &mut TxScope) -> Result<()> {
        if let Event::UserCreated { user } = event {
            Arc::clone(&self.0).handle_user_created(user, scope).await?;
        }
        Ok(())
    }
}

struct PostCreatedHandler(Arc<Notifier>);

#[async_trait]
impl EventHandler for PostCreatedHandler {
    async fn handle(&self, event: &Event, scope: &mut TxScope) -> Result<()> {
        Arc::clone(&self.0).handle_post_created(event, scope).await
    }
}

struct PostCategoriesHandler(Arc<Notifier>);

#[async_trait]
impl EventHandler for PostCategoriesHandler {
    async fn handle(&self, event: &Event, scope: &mut TxScope) -> Result<()> {
        if let Event::PostCategoriesAdded { post_id, .. } = event {
            Arc::clone(&self.0).handle_post_categories_added(*post_id, scope);
        }
        Ok(())
    }
}

struct TokenSavedHandler(Arc<Notifier>);

#[async_trait]
impl EventHandler for TokenSavedHandler {
    async fn handle(&self, event: &Event, scope: &mut TxScope) -> Result<()> {
        Arc::clone(&self.0).handle_token_saved(event, scope).await
    }
}

struct SubscriptionChangedHandler(Arc<Notifier>);

#[async_trait]
impl EventHandler for SubscriptionChangedHandler {
    async fn handle(&self, event: &Event, _scope: &mut TxScope) -> Result<()> {
        match event {
            Event::SubscriptionCreated { subscription } => {
                tracing::info!(
                    "New subscription: user {} -> category {}",
                    subscription.user_id,
                    subscription.category_id
                );
                self.0
                    .handle_subscription_changed(subscription.user_id, subscription.category_id)
                    .await;
            }
            Event::SubscriptionDeleted { subscription } => {
                tracing::info!(
                    "Subscription removed: user {} -> category {}",
                    subscription.user_id,
                    subscription.category_id
                );
                self.0
                    .handle_subscription_changed(subscription.user_id, subscription.category_id)
                    .await;
            }
            _ => {}
        }
        Ok(())
    }
}

struct CommentCreatedHandler(Arc<Notifier>);

#[async_trait]
impl EventHandler for CommentCreatedHandler {
    async fn handle(&self, event: &Event, _scope: &mut TxScope) -> Result<()> {
        if let Event::CommentCreated { comment } = event {
            self.0.handle_comment_created(comment.post_id).await;
        }
        Ok(())
    }
}

struct AuthorDeletedHandler(Arc<Notifier>);

#[async_trait]
impl EventHandler for AuthorDeletedHandler {
    async fn handle(&self, event: &Event, _scope: &mut TxScope) -> Result<()> {
        if let Event::AuthorProfileDeleted { user_id, .. } = event {
            self.0.handle_author_profile_deleted(*user_id).await?;
        }
        Ok(())
    }
}

/// Build the event bus with every handler binding. Called once at process
/// start; the resulting bus is immutable afterwards.
pub fn build_bus(notifier: Arc<Notifier>) -> EventBus {
    let mut bus = EventBus::new();

    bus.register(
        EntityKind::User,
        Transition::Created,
        Arc::new(UserCreatedHandler(Arc::clone(&notifier))),
    );
    bus.register(
        EntityKind::Post,
        Transition::Created,
        Arc::new(PostCreatedHandler(Arc::clone(&notifier))),
    );
    bus.register(
        EntityKind::Post,
        Transition::RelationChanged,
        Arc::new(PostCategoriesHandler(Arc::clone(&notifier))),
    );
    bus.register(
        EntityKind::ActivationToken,
        Transition::Updated,
        Arc::new(TokenSavedHandler(Arc::clone(&notifier))),
    );
    bus.register(
        EntityKind::Subscription,
        Transition::Created,
        Arc::new(SubscriptionChangedHandler(Arc::clone(&notifier))),
    );
    bus.register(
        EntityKind::Subscription,
        Transition::Deleted,
        Arc::new(SubscriptionChangedHandler(Arc::clone(&notifier))),
    );
    bus.register(
        EntityKind::Comment,
        Transition::Created,
        Arc::new(CommentCreatedHandler(Arc::clone(&notifier))),
    );
    bus.register(
        EntityKind::AuthorProfile,
        Transition::Deleted,
        Arc::new(AuthorDeletedHandler(notifier)),
    );

    bus
}
