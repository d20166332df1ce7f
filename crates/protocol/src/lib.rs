//! Wire types for the trace control protocol.
//!
//! This crate contains the serde-serializable types exchanged between the
//! session controller and its worker endpoints: commands broadcast when a
//! session phase begins, and the acknowledgments and unsolicited messages
//! endpoints send back. These types represent the "protocol layer" - the
//! shapes of data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization and the
//!   category-spec parser
//! * Transport-agnostic: The controller core never assumes how a command
//!   physically reaches a worker
//!
//! The session state machine and acknowledgment handling live in
//! `tracehub-core`, built on top of these types.

pub mod command;
pub mod filter;
pub mod reply;

pub use command::*;
pub use filter::*;
pub use reply::*;
