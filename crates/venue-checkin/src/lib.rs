//! Venue occupancy and check-in coordination for exam sites.
//!
//! The crate exposes the coordination core consumed by the admin console and
//! the miniprogram client: a venue registry, per-venue waiting queues, a
//! single-use QR token service, the check-in state machine that ties them
//! together, and a status broadcaster for polling clients.

pub mod checkin;
pub mod config;
pub mod error;
pub mod telemetry;
