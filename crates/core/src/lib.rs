//! Domain types and pure matching logic for the voting-proxy service.
//!
//! This crate has no I/O: the database layer, the notification bus and the
//! engines all build on the types and functions defined here.

pub mod error;
pub mod forwarding;
pub mod geo;
pub mod intake;
pub mod jurisdiction;
pub mod matching;
pub mod notifications;
pub mod outreach;
pub mod status;
pub mod types;
