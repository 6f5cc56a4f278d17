//! Publishing service
//!
//! Post, comment, and subscription operations. Like the account flows,
//! each operation dispatches through the event bus inside a transaction
//! scope, so cache invalidation happens eagerly and notification fan-out
//! is deferred to the commit.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::db::repositories::{
    AuthorRepository, CommentRepository, PostRepository, SubscriptionRepository,
};
use crate::events::{Event, EventBus, TxScope};
use crate::models::{Comment, CreatePostInput, Post, Subscription};

/// Post, comment, and subscription operations.
pub struct PublishingService {
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    authors: Arc<dyn AuthorRepository>,
    bus: Arc<EventBus>,
}

impl PublishingService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        comments: Arc<dyn CommentRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        authors: Arc<dyn AuthorRepository>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            posts,
            comments,
            subscriptions,
            authors,
            bus,
        }
    }

    /// Create a post, optionally attaching categories in the same
    /// transaction. Subscriber notification only fires when at least one
    /// category is attached, and fires once even if categories are added
    /// again before the commit.
    pub async fn create_post(
        &self,
        input: &CreatePostInput,
        category_ids: &[i64],
    ) -> Result<Post> {
        let mut scope = TxScope::new();

        let post = self
            .posts
            .create(input)
            .await
            .context("Failed to create post")?;

        if !category_ids.is_empty() {
            self.posts.add_categories(post.id, category_ids).await?;
        }

        self.bus
            .dispatch(
                &Event::PostCreated {
                    post: post.clone(),
                    category_ids: category_ids.to_vec(),
                },
                &mut scope,
            )
            .await;

        scope.commit().await;
        Ok(post)
    }

    /// Attach categories to an existing post.
    pub async fn add_categories(&self, post_id: i64, category_ids: &[i64]) -> Result<()> {
        if category_ids.is_empty() {
            return Ok(());
        }
        if self.posts.get_by_id(post_id).await?.is_none() {
            anyhow::bail!("Post {} not found", post_id);
        }

        let mut scope = TxScope::new();

        self.posts.add_categories(post_id, category_ids).await?;

        self.bus
            .dispatch(
                &Event::PostCategoriesAdded {
                    post_id,
                    category_ids: category_ids.to_vec(),
                },
                &mut scope,
            )
            .await;

        scope.commit().await;
        Ok(())
    }

    /// Create a comment on a post.
    pub async fn create_comment(
        &self,
        post_id: i64,
        user_id: i64,
        body: &str,
    ) -> Result<Comment> {
        if self.posts.get_by_id(post_id).await?.is_none() {
            anyhow::bail!("Post {} not found", post_id);
        }

        let mut scope = TxScope::new();

        let comment = self
            .comments
            .create(post_id, user_id, body)
            .await
            .context("Failed to create comment")?;

        self.bus
            .dispatch(
                &Event::CommentCreated {
                    comment: comment.clone(),
                },
                &mut scope,
            )
            .await;

        scope.commit().await;
        Ok(comment)
    }

    /// Subscribe a user to a category.
    pub async fn subscribe(&self, user_id: i64, category_id: i64) -> Result<Subscription> {
        let mut scope = TxScope::new();

        let subscription = self
            .subscriptions
            .create(user_id, category_id)
            .await
            .context("Failed to create subscription")?;

        self.bus
            .dispatch(
                &Event::SubscriptionCreated {
                    subscription: subscription.clone(),
                },
                &mut scope,
            )
            .await;

        scope.commit().await;
        Ok(subscription)
    }

    /// Remove a subscription. Returns `false` when it did not exist.
    pub async fn unsubscribe(&self, user_id: i64, category_id: i64) -> Result<bool> {
        let mut scope = TxScope::new();

        let Some(subscription) = self.subscriptions.delete(user_id, category_id).await? else {
            return Ok(false);
        };

        self.bus
            .dispatch(&Event::SubscriptionDeleted { subscription }, &mut scope)
            .await;

        scope.commit().await;
        Ok(true)
    }

    /// Delete a user's author profile, revoking the authors role.
    /// Returns `false` when the user has no profile.
    pub async fn delete_author_profile(&self, user_id: i64) -> Result<bool> {
        let Some(profile) = self.authors.get_by_user(user_id).await? else {
            tracing::debug!("User {} has no author profile to delete", user_id);
            return Ok(false);
        };

        let mut scope = TxScope::new();

        self.authors.delete(profile.id).await?;

        self.bus
            .dispatch(
                &Event::AuthorProfileDeleted {
                    profile_id: profile.id,
                    user_id,
                },
                &mut scope,
            )
            .await;

        scope.commit().await;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{keys, Cache, CacheLayer, MemoryCache};
    use crate::config::SiteConfig;
    use crate::db::repositories::{
        CategoryRepository, GroupRepository, SqlxActivationTokenRepository, SqlxAuthorRepository,
        SqlxCategoryRepository, SqlxCommentRepository, SqlxGroupRepository, SqlxPostRepository,
        SqlxSubscriptionRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::events::{build_bus, Notifier};
    use crate::models::{PostKind, User, AUTHORS_GROUP};
    use crate::services::email::Mailer;
    use async_trait::async_trait;
    use sqlx::SqlitePool;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingMailer {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_welcome(&self, user: &User, _url: &str) -> Result<()> {
            self.sent.lock().unwrap().push(format!("welcome:{}", user.email));
            Ok(())
        }

        async fn send_activation_success(&self, user: &User) -> Result<()> {
            self.sent.lock().unwrap().push(format!("activated:{}", user.email));
            Ok(())
        }

        async fn send_article_notification(&self, post: &Post) -> Result<()> {
            self.sent.lock().unwrap().push(format!("article:{}", post.id));
            Ok(())
        }

        async fn send_news_notification(&self, post: &Post, recipients: &[User]) -> Result<()> {
            let mut emails: Vec<&str> = recipients.iter().map(|u| u.email.as_str()).collect();
            emails.sort_unstable();
            self.sent
                .lock()
                .unwrap()
                .push(format!("news:{}:[{}]", post.id, emails.join(",")));
            Ok(())
        }
    }

    struct Fixture {
        pool: SqlitePool,
        service: PublishingService,
        mailer: Arc<RecordingMailer>,
        cache: Arc<Cache>,
        author: User,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let mailer = Arc::new(RecordingMailer::default());
        let cache = Arc::new(Cache::Memory(MemoryCache::default()));
        let site = SiteConfig {
            base_url: "http://testserver".to_string(),
            name: "Newswire".to_string(),
        };

        let notifier = Arc::new(Notifier::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxAuthorRepository::boxed(pool.clone()),
            SqlxActivationTokenRepository::boxed(pool.clone()),
            SqlxPostRepository::boxed(pool.clone()),
            SqlxSubscriptionRepository::boxed(pool.clone()),
            SqlxGroupRepository::boxed(pool.clone()),
            cache.clone(),
            mailer.clone(),
            site,
        ));

        let service = PublishingService::new(
            SqlxPostRepository::boxed(pool.clone()),
            SqlxCommentRepository::boxed(pool.clone()),
            SqlxSubscriptionRepository::boxed(pool.clone()),
            SqlxAuthorRepository::boxed(pool.clone()),
            Arc::new(build_bus(notifier)),
        );

        let users = SqlxUserRepository::new(pool.clone());
        let author = users
            .create(&User::new("author".to_string(), "author@example.com".to_string(), false))
            .await
            .expect("create author");

        Fixture {
            pool,
            service,
            mailer,
            cache,
            author,
        }
    }

    fn news_input(author_id: i64) -> CreatePostInput {
        CreatePostInput {
            title: "Breaking".to_string(),
            body: "Something happened".to_string(),
            kind: PostKind::News,
            author_id,
        }
    }

    async fn subscriber(pool: &SqlitePool, email: &str, category_id: i64) -> User {
        let users = SqlxUserRepository::new(pool.clone());
        let user = users
            .create(&User::new(email.to_string(), email.to_string(), false))
            .await
            .expect("create user");
        SqlxSubscriptionRepository::new(pool.clone())
            .create(user.id, category_id)
            .await
            .expect("subscribe");
        user
    }

    #[tokio::test]
    async fn test_news_post_notifies_subscribers() {
        let f = setup().await;
        let categories = SqlxCategoryRepository::new(f.pool.clone());
        let tech = categories.create("tech").await.expect("category");

        subscriber(&f.pool, "a@example.com", tech.id).await;
        subscriber(&f.pool, "b@example.com", tech.id).await;

        let post = f
            .service
            .create_post(&news_input(f.author.id), &[tech.id])
            .await
            .expect("create post");

        let sent = f.mailer.sent();
        assert_eq!(
            sent,
            vec![format!("news:{}:[a@example.com,b@example.com]", post.id)]
        );
    }

    #[tokio::test]
    async fn test_news_post_without_categories_sends_nothing() {
        let f = setup().await;

        f.service
            .create_post(&news_input(f.author.id), &[])
            .await
            .expect("create post");

        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_cross_category_recipients_deduplicated() {
        let f = setup().await;
        let categories = SqlxCategoryRepository::new(f.pool.clone());
        let tech = categories.create("tech").await.expect("category");
        let sport = categories.create("sport").await.expect("category");

        // One user in both categories
        let both = subscriber(&f.pool, "both@example.com", tech.id).await;
        SqlxSubscriptionRepository::new(f.pool.clone())
            .create(both.id, sport.id)
            .await
            .expect("subscribe");

        let post = f
            .service
            .create_post(&news_input(f.author.id), &[tech.id, sport.id])
            .await
            .expect("create post");

        assert_eq!(
            f.mailer.sent(),
            vec![format!("news:{}:[both@example.com]", post.id)]
        );
    }

    #[tokio::test]
    async fn test_article_post_sends_staff_notification() {
        let f = setup().await;
        let categories = SqlxCategoryRepository::new(f.pool.clone());
        let tech = categories.create("tech").await.expect("category");

        let input = CreatePostInput {
            title: "Deep dive".to_string(),
            body: "Long read".to_string(),
            kind: PostKind::Article,
            author_id: f.author.id,
        };
        let post = f
            .service
            .create_post(&input, &[tech.id])
            .await
            .expect("create post");

        assert_eq!(f.mailer.sent(), vec![format!("article:{}", post.id)]);
    }

    #[tokio::test]
    async fn test_add_categories_after_create_notifies_once() {
        let f = setup().await;
        let categories = SqlxCategoryRepository::new(f.pool.clone());
        let tech = categories.create("tech").await.expect("category");
        subscriber(&f.pool, "a@example.com", tech.id).await;

        let post = f
            .service
            .create_post(&news_input(f.author.id), &[])
            .await
            .expect("create post");
        assert!(f.mailer.sent().is_empty());

        f.service
            .add_categories(post.id, &[tech.id])
            .await
            .expect("add categories");

        assert_eq!(f.mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_add_categories_to_missing_post_fails() {
        let f = setup().await;

        let result = f.service.add_categories(9999, &[1]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_post_creation_invalidates_listings() {
        let f = setup().await;

        f.cache
            .set(keys::LATEST_NEWS, &vec!["stale".to_string()], Duration::from_secs(60))
            .await
            .expect("seed cache");
        f.cache
            .set(keys::NEWS_LIST, &vec!["stale".to_string()], Duration::from_secs(60))
            .await
            .expect("seed cache");

        f.service
            .create_post(&news_input(f.author.id), &[])
            .await
            .expect("create post");

        let latest: Option<Vec<String>> = f.cache.get(keys::LATEST_NEWS).await.expect("get");
        let list: Option<Vec<String>> = f.cache.get(keys::NEWS_LIST).await.expect("get");
        assert!(latest.is_none());
        assert!(list.is_none());
    }

    #[tokio::test]
    async fn test_comment_invalidates_post_comment_caches() {
        let f = setup().await;
        let post = f
            .service
            .create_post(&news_input(f.author.id), &[])
            .await
            .expect("create post");

        f.cache
            .set(&keys::post_comments(post.id), &vec!["stale".to_string()], Duration::from_secs(60))
            .await
            .expect("seed cache");
        f.cache
            .set(&keys::post_comments_count(post.id), &0i64, Duration::from_secs(60))
            .await
            .expect("seed cache");

        f.service
            .create_comment(post.id, f.author.id, "first!")
            .await
            .expect("comment");

        let comments: Option<Vec<String>> =
            f.cache.get(&keys::post_comments(post.id)).await.expect("get");
        let count: Option<i64> = f
            .cache
            .get(&keys::post_comments_count(post.id))
            .await
            .expect("get");
        assert!(comments.is_none());
        assert!(count.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_unsubscribe_invalidate_caches() {
        let f = setup().await;
        let categories = SqlxCategoryRepository::new(f.pool.clone());
        let tech = categories.create("tech").await.expect("category");

        f.cache
            .set(&keys::user_subscriptions(f.author.id), &vec!["stale".to_string()], Duration::from_secs(60))
            .await
            .expect("seed cache");
        f.service
            .subscribe(f.author.id, tech.id)
            .await
            .expect("subscribe");
        let subs: Option<Vec<String>> = f
            .cache
            .get(&keys::user_subscriptions(f.author.id))
            .await
            .expect("get");
        assert!(subs.is_none());

        f.cache
            .set(&keys::category_subscribers_count(tech.id), &1i64, Duration::from_secs(60))
            .await
            .expect("seed cache");
        assert!(f
            .service
            .unsubscribe(f.author.id, tech.id)
            .await
            .expect("unsubscribe"));
        let count: Option<i64> = f
            .cache
            .get(&keys::category_subscribers_count(tech.id))
            .await
            .expect("get");
        assert!(count.is_none());

        // Second unsubscribe finds nothing
        assert!(!f
            .service
            .unsubscribe(f.author.id, tech.id)
            .await
            .expect("unsubscribe"));
    }

    #[tokio::test]
    async fn test_delete_author_profile_revokes_role() {
        let f = setup().await;

        let authors = SqlxAuthorRepository::new(f.pool.clone());
        authors.get_or_create(f.author.id).await.expect("profile");

        let groups = SqlxGroupRepository::new(f.pool.clone());
        let authors_group = groups.get_or_create(AUTHORS_GROUP).await.expect("group");
        groups
            .add_member(authors_group.id, f.author.id)
            .await
            .expect("add member");

        assert!(f
            .service
            .delete_author_profile(f.author.id)
            .await
            .expect("delete"));

        assert!(!groups
            .is_member(AUTHORS_GROUP, f.author.id)
            .await
            .expect("check"));

        // Profile already gone
        assert!(!f
            .service
            .delete_author_profile(f.author.id)
            .await
            .expect("delete"));
    }
}
