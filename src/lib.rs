pub mod app;
pub mod ari;
pub mod config;
pub mod event;
pub mod ivr;
pub mod lookup;

/// The telephony platform's opaque handle for one call's media/control path.
pub type ChannelId = String;
