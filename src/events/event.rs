//! Lifecycle event payloads
//!
//! Events carry typed snapshots of the entity taken at emit time. The
//! snapshot is only used for guard evaluation; deferred actions re-fetch
//! authoritative state by identity because the persistence layer may emit
//! before all related writes land.

use crate::models::{ActivationToken, Comment, Post, Subscription, User};

/// The entity kinds that emit lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    AuthorProfile,
    ActivationToken,
    Post,
    Subscription,
    Comment,
}

/// The lifecycle transition an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Entity row was inserted
    Created,
    /// Entity row was rewritten
    Updated,
    /// A many-to-many relation of the entity changed
    RelationChanged,
    /// Entity row was removed
    Deleted,
}

/// A lifecycle event with its typed payload snapshot.
#[derive(Debug, Clone)]
pub enum Event {
    /// A user row was inserted
    UserCreated { user: User },
    /// An author profile was removed
    AuthorProfileDeleted { profile_id: i64, user_id: i64 },
    /// A post was inserted; `category_ids` is the category set attached at
    /// creation time (may be empty)
    PostCreated { post: Post, category_ids: Vec<i64> },
    /// Categories were attached to an existing post
    PostCategoriesAdded { post_id: i64, category_ids: Vec<i64> },
    /// An activation token row was written. `created` marks an insert;
    /// `was_activated` is the flag value before this write, so the
    /// activation edge is `!created && !was_activated && token.activated`.
    ActivationTokenSaved {
        token: ActivationToken,
        created: bool,
        was_activated: bool,
    },
    /// A subscription was inserted
    SubscriptionCreated { subscription: Subscription },
    /// A subscription was removed
    SubscriptionDeleted { subscription: Subscription },
    /// A comment was inserted
    CommentCreated { comment: Comment },
}

impl Event {
    /// The entity kind this event belongs to.
    pub fn kind(&self) -> EntityKind {
        match self {
            Event::UserCreated { .. } => EntityKind::User,
            Event::AuthorProfileDeleted { .. } => EntityKind::AuthorProfile,
            Event::PostCreated { .. } => EntityKind::Post,
            Event::PostCategoriesAdded { .. } => EntityKind::Post,
            Event::ActivationTokenSaved { .. } => EntityKind::ActivationToken,
            Event::SubscriptionCreated { .. } => EntityKind::Subscription,
            Event::SubscriptionDeleted { .. } => EntityKind::Subscription,
            Event::CommentCreated { .. } => EntityKind::Comment,
        }
    }

    /// The transition this event describes.
    pub fn transition(&self) -> Transition {
        match self {
            Event::UserCreated { .. } => Transition::Created,
            Event::AuthorProfileDeleted { .. } => Transition::Deleted,
            Event::PostCreated { .. } => Transition::Created,
            Event::PostCategoriesAdded { .. } => Transition::RelationChanged,
            Event::ActivationTokenSaved { created, .. } => {
                if *created {
                    Transition::Created
                } else {
                    Transition::Updated
                }
            }
            Event::SubscriptionCreated { .. } => Transition::Created,
            Event::SubscriptionDeleted { .. } => Transition::Deleted,
            Event::CommentCreated { .. } => Transition::Created,
        }
    }

    /// The identity of the acting entity, used for logging and deferral
    /// deduplication.
    pub fn entity_id(&self) -> i64 {
        match self {
            Event::UserCreated { user } => user.id,
            Event::AuthorProfileDeleted { profile_id, .. } => *profile_id,
            Event::PostCreated { post, .. } => post.id,
            Event::PostCategoriesAdded { post_id, .. } => *post_id,
            Event::ActivationTokenSaved { token, .. } => token.id,
            Event::SubscriptionCreated { subscription } => subscription.id,
            Event::SubscriptionDeleted { subscription } => subscription.id,
            Event::CommentCreated { comment } => comment.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn token(created: bool, activated: bool) -> Event {
        Event::ActivationTokenSaved {
            token: ActivationToken {
                id: 5,
                user_id: 1,
                token: "t".to_string(),
                activated,
                created_at: Utc::now(),
            },
            created,
            was_activated: false,
        }
    }

    #[test]
    fn test_token_transition_depends_on_created() {
        assert_eq!(token(true, false).transition(), Transition::Created);
        assert_eq!(token(false, true).transition(), Transition::Updated);
    }

    #[test]
    fn test_event_identity() {
        let event = token(false, true);
        assert_eq!(event.kind(), EntityKind::ActivationToken);
        assert_eq!(event.entity_id(), 5);
    }

    #[test]
    fn test_post_events_share_kind() {
        let created = Event::PostCategoriesAdded {
            post_id: 9,
            category_ids: vec![1],
        };
        assert_eq!(created.kind(), EntityKind::Post);
        assert_eq!(created.transition(), Transition::RelationChanged);
        assert_eq!(created.entity_id(), 9);
    }
}
