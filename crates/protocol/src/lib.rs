//! Wire types for the posecast telemetry protocol.
//!
//! This crate contains the serde-serializable messages exchanged with the
//! remote service over a text WebSocket. These types represent the
//! "protocol layer" - the shapes of data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * 1:1 with protocol: field names are the contract, not Rust conventions
//! * Stable: Changes only when the wire protocol changes
//!
//! Session behavior (when a message may be sent, what happens on receipt) lives
//! in the `posecast` crate.

pub mod client;
pub mod server;

pub use client::*;
pub use server::*;
