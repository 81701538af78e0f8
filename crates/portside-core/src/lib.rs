//! Core systems for Portside.
//!
//! This crate provides the signal/slot mechanism used by the networking
//! crates for event delivery: socket events and inbound messages are
//! emitted through [`Signal`]s, and callers subscribe with closures.
//!
//! # Example
//!
//! ```
//! use portside_core::Signal;
//!
//! let message_received = Signal::<String>::new();
//!
//! // Subscribe a listener; the returned id is a stable handle.
//! let id = message_received.connect(|text| {
//!     println!("received: {}", text);
//! });
//!
//! message_received.emit("hello".to_string());
//!
//! // Unsubscribe without affecting other listeners.
//! message_received.disconnect(id);
//! ```

pub mod signal;

pub use signal::{Signal, SlotGuard, SlotId};
