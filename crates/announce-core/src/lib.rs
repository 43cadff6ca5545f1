// # announce-core
//
// Core library for announcing a game server to its master-servers.
//
// ## Architecture Overview
//
// - **Address**: Parses `[scheme://]host[:port][/path]` directory addresses
// - **Target**: Per-master-server state machine with a failure circuit breaker
// - **AnnounceEngine**: Background thread multiplexing every exchange on one driver
// - **Diagnostics**: Thread-safe queue of console lines, drained on the host thread
// - **AnnounceService**: Host lifecycle glue (load / initialize / tick / shutdown)
// - **AnnounceTransport**: Trait for the network side of one exchange
// - **HostBridge**: Trait for host-provided server settings
//
// ## Design Principles
//
// 1. **Single owner**: After start, targets live on the engine thread only
// 2. **Prompt stop**: A stop request is noticed within one poll slice
// 3. **Library-First**: The daemon is just another host of `AnnounceService`

pub mod address;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod service;
pub mod target;
pub mod traits;

// Re-export core types for convenience
pub use address::Address;
pub use config::{AnnounceConfig, ServerSettings};
pub use diagnostics::{Diagnostic, DiagnosticSink, Diagnostics, Severity, TracingSink};
pub use engine::AnnounceEngine;
pub use error::{Error, Result};
pub use service::AnnounceService;
pub use target::{Target, TargetId, TargetState, TargetStatus, Verdict};
pub use traits::{AnnounceRequest, AnnounceTransport, ExchangeOutcome, HostBridge, PendingExchange};
