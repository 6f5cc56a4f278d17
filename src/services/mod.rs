//! Services layer - Business logic
//!
//! This module contains the write-side services that perform persistence
//! writes and emit lifecycle events, the outbound email service, and the
//! retention sweep.

pub mod accounts;
pub mod email;
pub mod publishing;
pub mod retention;

pub use accounts::AccountService;
pub use email::{Mailer, SmtpMailer};
pub use publishing::PublishingService;
pub use retention::RetentionService;
