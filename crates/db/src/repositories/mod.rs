//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Multi-statement writes open
//! their own transaction.

pub mod campaign_manager_repo;
pub mod commune_repo;
pub mod notification_outbox_repo;
pub mod person_repo;
pub mod voting_proxy_repo;
pub mod voting_proxy_request_repo;

pub use campaign_manager_repo::CampaignManagerRepo;
pub use commune_repo::CommuneRepo;
pub use notification_outbox_repo::NotificationOutboxRepo;
pub use person_repo::PersonRepo;
pub use voting_proxy_repo::VotingProxyRepo;
pub use voting_proxy_request_repo::VotingProxyRequestRepo;
