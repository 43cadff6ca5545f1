// # Host Bridge Trait
//
// The host process owns the game server's settings. The announce service
// asks for them exactly once, inside `on_initialize`, and bakes them into
// every target's payload.

use crate::config::ServerSettings;

/// Host-provided accessors
pub trait HostBridge {
    /// Current server settings (only the listening port is used)
    fn server_settings(&self) -> ServerSettings;

    /// Protocol/API version reported to master-servers
    fn server_version(&self) -> u32;
}
