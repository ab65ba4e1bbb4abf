//! Periodic driver for the voting proxy engines.

pub mod config;
pub mod jobs;
