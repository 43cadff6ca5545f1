//! Minimal embedding example for announce-core
//!
//! A game server that hosts the announce service in-process: it loads the
//! service, hands over its settings at initialize, calls the tick from its
//! frame loop and shuts the service down on exit.
//!
//! The transport here is a dry run that never touches the network, so the
//! example can be run anywhere.

use announce_core::traits::{AnnounceRequest, AnnounceTransport, ExchangeOutcome, PendingExchange};
use announce_core::{AnnounceConfig, AnnounceService, HostBridge, Result, ServerSettings};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;

/// The game server as seen by the announcer
struct GameServer {
    port: u16,
    version: u32,
}

impl HostBridge for GameServer {
    fn server_settings(&self) -> ServerSettings {
        ServerSettings { port: self.port }
    }

    fn server_version(&self) -> u32 {
        self.version
    }
}

/// Transport that accepts every announce without sending anything
struct DryRunTransport {
    announces: Arc<AtomicUsize>,
}

impl AnnounceTransport for DryRunTransport {
    fn open(&self, request: &AnnounceRequest) -> Result<PendingExchange> {
        self.announces.fetch_add(1, Ordering::SeqCst);
        info!("dry run: POST {} body={}", request.url, request.body);
        Ok(Box::pin(async { ExchangeOutcome::Status(200) }))
    }

    fn transport_name(&self) -> &'static str {
        "dry-run"
    }
}

fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let announces = Arc::new(AtomicUsize::new(0));
    let transport = Arc::new(DryRunTransport {
        announces: Arc::clone(&announces),
    });

    let config = AnnounceConfig::new(["master.example.org/announce.php", "backup.example.org:8080"])
        .with_verbose(true)
        .with_update_interval_secs(1);

    let mut service = match AnnounceService::load(config, transport) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("announcer not loaded: {}", e);
            return;
        }
    };

    let server = GameServer {
        port: 8192,
        version: 67000,
    };
    if !service.on_initialize(&server) {
        eprintln!("announcer unregistered itself");
        return;
    }

    // Three seconds of a 20 fps frame loop
    for _ in 0..60 {
        service.on_tick();
        std::thread::sleep(Duration::from_millis(50));
    }

    let statuses = service.on_shutdown();
    info!(
        "{} announce(s) sent to {} master-server(s)",
        announces.load(Ordering::SeqCst),
        statuses.len()
    );
}
