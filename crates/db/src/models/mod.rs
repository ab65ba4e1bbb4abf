//! Row structs and DTOs.
//!
//! Each submodule contains the `FromRow` structs read back from its tables
//! and the DTOs the repositories accept for writes. Conversions into the
//! `procura_core` domain types live next to the rows that feed them.

pub mod campaign_manager;
pub mod commune;
pub mod notification;
pub mod person;
pub mod voting_proxy;
pub mod voting_proxy_request;
