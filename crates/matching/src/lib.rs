//! Matching of voting proxies with voting proxy requests.
//!
//! The engines here run against the [`Registry`] trait and publish their
//! side effects on a [`NotificationBus`](procura_events::NotificationBus):
//!
//! - [`assignment::run_matching_pass`] offers pending requests to proxies;
//! - [`responses`] applies a proxy's accept / decline and confirmations;
//! - [`outreach::find_candidates_for_requests`] invites new proxies;
//! - [`forwarding::forward_pending_requests_to_campaign_managers`] hands
//!   what is left to district campaign managers;
//! - [`intake`] registers requests and proxies.

pub mod assignment;
pub mod error;
pub mod forwarding;
pub mod intake;
pub mod outreach;
pub mod registry;
pub mod responses;

pub use error::EngineError;
pub use registry::pg::PgRegistry;
pub use registry::Registry;
