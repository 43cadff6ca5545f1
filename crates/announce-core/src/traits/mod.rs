//! Core traits for the announce system
//!
//! - [`AnnounceTransport`]: Opens outbound announce exchanges
//! - [`HostBridge`]: Host-provided settings queried at initialization

pub mod transport;
pub mod host;

pub use transport::{AnnounceRequest, AnnounceTransport, ExchangeOutcome, PendingExchange};
pub use host::HostBridge;
