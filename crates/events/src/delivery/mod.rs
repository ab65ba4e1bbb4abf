//! Delivery channels the service talks to directly. Everything else goes
//! through the outbox.

pub mod email;
