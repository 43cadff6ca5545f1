// # Announce Transport Trait
//
// Defines how the engine turns a prebuilt announce request into one
// outbound exchange.
//
// ## Implementations
//
// - HTTP: `announce-http` crate (reqwest)
// - Tests: scripted transports in `tests/common`
//
// ## Two steps
//
// ```text
// open(&request) ──Err──▶ connection could not even be requested (immediate failure)
//      │
//      Ok(PendingExchange) ──await──▶ ExchangeOutcome::{Status, Transport}
// ```
//
// `open` runs synchronously on the engine thread; the returned future is
// spawned onto the engine's runtime and multiplexed with every other
// target's exchange.

use http::HeaderMap;
use std::future::Future;
use std::pin::Pin;

/// A fully built announce request
///
/// Built once per target when host settings become known and reused for
/// every cycle afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceRequest {
    /// Absolute URL (`http://host:port/path`)
    pub url: String,
    /// Request headers (user agent, protocol version, content type)
    pub headers: HeaderMap,
    /// URL-encoded form body
    pub body: String,
}

impl AnnounceRequest {
    /// Whether the request carries something to send
    pub fn is_well_formed(&self) -> bool {
        !self.url.is_empty() && !self.body.is_empty()
    }
}

/// What came back from one exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The master-server answered with this HTTP status
    Status(u16),
    /// No response: connection refused, timeout, reset, ...
    Transport(String),
}

/// An exchange in flight
pub type PendingExchange = Pin<Box<dyn Future<Output = ExchangeOutcome> + Send + 'static>>;

/// Trait for announce transports
///
/// # Trust Level: Untrusted
///
/// Transports execute exactly one request per `open` call.
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (failure counting is owned by `Target`)
/// - ❌ Spawn tasks or threads (the engine drives the returned future)
/// - ❌ Touch target state or diagnostics
pub trait AnnounceTransport: Send + Sync {
    /// Start one exchange for `request`
    ///
    /// # Returns
    ///
    /// - `Ok(PendingExchange)`: A future resolving to the exchange outcome
    /// - `Err(Error)`: If the connection cannot be requested at all
    fn open(&self, request: &AnnounceRequest) -> Result<PendingExchange, crate::Error>;

    /// Transport name (for logging/debugging)
    fn transport_name(&self) -> &'static str;
}
