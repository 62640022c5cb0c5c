//! Telephony platform connection over the Asterisk REST Interface.
//!
//! [`Telephony`] is the seam the IVR core is written against; [`AriClient`]
//! is the real implementation (REST for channel control, a WebSocket for
//! signaling events). Tests run against the in-memory fake in
//! [`crate::ivr::testing`].

mod client;
mod events;

pub use client::{AriClient, Telephony};
pub use events::{AriChannel, AriEvent, AriPlayback};
