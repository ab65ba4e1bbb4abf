//! Notification plumbing for the voting proxy service.
//!
//! - [`NotificationBus`]: in-process fan-out of [`Notification`]s, backed by
//!   `tokio::sync::broadcast`. Enqueueing never blocks and never fails.
//! - [`OutboxPersistence`]: background task writing every notification to
//!   the `notification_outbox` table for the external messaging worker.
//! - [`delivery`]: SMTP delivery of campaign-manager digests.

pub mod bus;
pub mod delivery;
pub mod persistence;

pub use bus::{Notification, NotificationBus};
pub use delivery::email::{DigestEmail, EmailConfig, EmailDelivery, EmailError};
pub use persistence::OutboxPersistence;
