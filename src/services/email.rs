//! Email service
//!
//! Outbound email is fire-and-forget from the notifier's perspective: each
//! send may fail independently and the caller logs and swallows the error.
//! Retry and backoff, if any, belong to the SMTP relay, not to this crate.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use std::sync::Arc;

use crate::config::EmailConfig;
use crate::db::repositories::GroupRepository;
use crate::models::{Post, User, AUTHORS_GROUP};

/// Outbound email seam.
///
/// The notifier talks to this trait so tests can record sends instead of
/// hitting an SMTP relay.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Welcome email with the account activation link
    async fn send_welcome(&self, user: &User, activation_url: &str) -> Result<()>;

    /// Confirmation that the account was activated
    async fn send_activation_success(&self, user: &User) -> Result<()>;

    /// Immediate notification for a new article
    async fn send_article_notification(&self, post: &Post) -> Result<()>;

    /// News notification fanned out to category subscribers
    async fn send_news_notification(&self, post: &Post, recipients: &[User]) -> Result<()>;
}

/// SMTP-backed mailer using lettre
pub struct SmtpMailer {
    config: EmailConfig,
    site_name: String,
    groups: Arc<dyn GroupRepository>,
}

impl SmtpMailer {
    /// Create a new SMTP mailer from configuration
    pub fn new(config: EmailConfig, site_name: String, groups: Arc<dyn GroupRepository>) -> Self {
        Self {
            config,
            site_name,
            groups,
        }
    }

    /// Resolve the addresses for an article notification: the authors
    /// group, falling back to the editorial address while the group is
    /// still empty.
    async fn article_recipients(&self) -> Result<Vec<String>> {
        let emails = self.groups.member_emails(AUTHORS_GROUP).await?;
        if emails.is_empty() {
            return Ok(vec![self.config.from_address.clone()]);
        }
        Ok(emails)
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        if self.config.smtp_host.is_empty() {
            return Err(anyhow!(
                "SMTP host not configured. Set 'email.smtp_host' or NEWSWIRE_SMTP_HOST."
            ));
        }

        let creds = Credentials::new(
            self.config.smtp_username.clone(),
            self.config.smtp_password.clone(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .credentials(creds)
            .port(self.config.smtp_port)
            .build();

        Ok(mailer)
    }

    fn build_message(&self, to_email: &str, subject: &str, body: &str) -> Result<Message> {
        let from = format!("{} <{}>", self.config.from_name, self.config.from_address);

        Message::builder()
            .from(from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(to_email.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| anyhow!("Failed to build email: {}", e))
    }

    async fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<()> {
        let message = self.build_message(to_email, subject, body)?;
        let transport = self.transport()?;

        transport
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_welcome(&self, user: &User, activation_url: &str) -> Result<()> {
        let subject = format!("[{}] Welcome!", self.site_name);
        let body = format!(
            "Hi {},\n\nWelcome to {}. Activate your account by following this link:\n\n{}\n\n\
             The link is valid for 7 days.\n\n{} team",
            user.username, self.site_name, activation_url, self.site_name
        );

        self.send(&user.email, &subject, &body).await
    }

    async fn send_activation_success(&self, user: &User) -> Result<()> {
        let subject = format!("[{}] Account activated", self.site_name);
        let body = format!(
            "Hi {},\n\nYour account is now active. You can publish and subscribe to categories.\n\n{} team",
            user.username, self.site_name
        );

        self.send(&user.email, &subject, &body).await
    }

    async fn send_article_notification(&self, post: &Post) -> Result<()> {
        let subject = format!("[{}] New article: {}", self.site_name, post.title);
        let body = format!(
            "A new article was published:\n\n{}\n\n{}\n\n{} team",
            post.title, post.body, self.site_name
        );

        let recipients = self.article_recipients().await?;

        let mut sent = 0usize;
        for recipient in &recipients {
            // One bad recipient must not stop the rest of the fan-out
            match self.send(recipient, &subject, &body).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!(
                        "Failed to send article notification to {}: {:#}",
                        recipient,
                        e
                    );
                }
            }
        }

        if sent == 0 {
            return Err(anyhow!(
                "Article notification for post {} reached none of {} recipient(s)",
                post.id,
                recipients.len()
            ));
        }

        tracing::info!(
            "Sent {}/{} article notifications for post {}",
            sent,
            recipients.len(),
            post.id
        );

        Ok(())
    }

    async fn send_news_notification(&self, post: &Post, recipients: &[User]) -> Result<()> {
        if recipients.is_empty() {
            tracing::debug!("No subscribers for post {}, skipping fan-out", post.id);
            return Ok(());
        }

        let subject = format!("[{}] {}", self.site_name, post.title);

        let mut sent = 0usize;
        for recipient in recipients {
            let body = format!(
                "Hi {},\n\nNews from a category you follow:\n\n{}\n\n{}\n\n{} team",
                recipient.username, post.title, post.body, self.site_name
            );

            // One bad recipient must not stop the rest of the fan-out
            match self.send(&recipient.email, &subject, &body).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!(
                        "Failed to send news notification to {}: {:#}",
                        recipient.email,
                        e
                    );
                }
            }
        }

        tracing::info!(
            "Sent {}/{} news notifications for post {}",
            sent,
            recipients.len(),
            post.id
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxGroupRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::PostKind;
    use chrono::Utc;
    use sqlx::SqlitePool;

    async fn mailer_without_host() -> (SqlitePool, SmtpMailer) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let mailer = SmtpMailer::new(
            EmailConfig::default(),
            "Newswire".to_string(),
            SqlxGroupRepository::boxed(pool.clone()),
        );
        (pool, mailer)
    }

    fn user() -> User {
        User::new("tester".to_string(), "tester@example.com".to_string(), false)
    }

    fn post() -> Post {
        let now = Utc::now();
        Post {
            id: 1,
            title: "T".to_string(),
            body: "B".to_string(),
            kind: PostKind::News,
            author_id: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_send_fails_without_smtp_host() {
        let (_pool, mailer) = mailer_without_host().await;

        let err = mailer
            .send_welcome(&user(), "http://localhost/activate/x/")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SMTP host not configured"));
    }

    #[tokio::test]
    async fn test_news_fan_out_with_no_recipients_is_ok() {
        let (_pool, mailer) = mailer_without_host().await;

        // Empty fan-out never needs a transport, so it succeeds
        mailer
            .send_news_notification(&post(), &[])
            .await
            .expect("empty fan-out should be a no-op");
    }

    #[tokio::test]
    async fn test_article_recipients_fall_back_to_editorial_address() {
        let (_pool, mailer) = mailer_without_host().await;

        // Nobody in the authors group yet
        let recipients = mailer.article_recipients().await.expect("resolve");
        assert_eq!(recipients, vec!["noreply@localhost".to_string()]);
    }

    #[tokio::test]
    async fn test_article_recipients_are_authors_group_members() {
        let (pool, mailer) = mailer_without_host().await;

        let users = SqlxUserRepository::new(pool.clone());
        let member = users
            .create(&User::new("w".to_string(), "w@example.com".to_string(), false))
            .await
            .expect("Failed to create user");

        let groups = SqlxGroupRepository::new(pool);
        let authors = groups.get_or_create(AUTHORS_GROUP).await.expect("group");
        groups.add_member(authors.id, member.id).await.expect("add");

        let recipients = mailer.article_recipients().await.expect("resolve");
        assert_eq!(recipients, vec!["w@example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_build_message_rejects_invalid_recipient() {
        let (_pool, mailer) = mailer_without_host().await;
        let result = mailer.build_message("not-an-address", "s", "b");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_build_message_valid() {
        let (_pool, mailer) = mailer_without_host().await;
        let result = mailer.build_message("ok@example.com", "s", "b");
        assert!(result.is_ok());
    }
}
