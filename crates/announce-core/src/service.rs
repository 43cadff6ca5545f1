// # Announce Service
//
// Glue between a host process's lifecycle callbacks and the engine.
//
// ```text
// load()            ── host loads the plug-in: parse addresses, build targets
// on_initialize()   ── host settings known: build payloads, start the engine
// on_tick()         ── every host frame: drain diagnostics to the console
// on_shutdown()     ── stop and join the engine, flush what is left
// ```
//
// A service that ends up with nothing to announce to unregisters itself:
// `load` fails outright, and `on_initialize` returns `false` when no target
// with a payload and a usable port is left. Once unregistered, lifecycle
// calls are no-ops.

use crate::address::Address;
use crate::config::AnnounceConfig;
use crate::diagnostics::Diagnostics;
use crate::engine::AnnounceEngine;
use crate::error::{Error, Result};
use crate::target::{Target, TargetId, TargetStatus};
use crate::traits::{AnnounceTransport, HostBridge};
use std::sync::Arc;
use tracing::{debug, info};

/// Display name of the service
pub const SERVICE_NAME: &str = "Master-server Announce";

const BANNER_RULE: &str = "------------------------------------------------------------------";

/// Host-facing announce service
pub struct AnnounceService {
    config: AnnounceConfig,
    diagnostics: Diagnostics,
    transport: Arc<dyn AnnounceTransport>,
    /// Targets built at load time, consumed by `on_initialize`
    targets: Vec<Target>,
    engine: Option<AnnounceEngine>,
    /// Targets handed to the engine
    active_targets: usize,
    registered: bool,
}

impl AnnounceService {
    /// Load the service from configuration
    ///
    /// Ill-formed addresses are reported and skipped. Lines produced here
    /// are printed before returning, since the host has no tick running yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no address survives parsing. The host
    /// must not register any lifecycle callback in that case.
    pub fn load(config: AnnounceConfig, transport: Arc<dyn AnnounceTransport>) -> Result<Self> {
        let diagnostics = Diagnostics::new(config.verbose);
        Self::print_banner(&diagnostics);

        if let Err(e) = config.validate() {
            diagnostics.error(e.to_string());
            diagnostics.drain_and_print();
            return Err(e);
        }

        let mut targets = Vec::with_capacity(config.servers.len());
        for (position, raw) in config.servers.iter().enumerate() {
            match Address::parse(raw) {
                Ok(address) => {
                    diagnostics.verbose_info(format!(
                        "Master-server '{}' added to the announce list",
                        address
                    ));
                    targets.push(Target::new(
                        TargetId::new(position),
                        address,
                        diagnostics.clone(),
                    ));
                }
                Err(e) => {
                    debug!("Rejected master-server address {:?}: {}", raw, e);
                    diagnostics
                        .verbose_error(format!("Master-server '{}' is an ill formed address", raw));
                }
            }
        }

        if targets.is_empty() {
            let err = Error::config("No master-servers specified. No reason to load the plug-in.");
            diagnostics.error(err.to_string());
            diagnostics.drain_and_print();
            return Err(err);
        }

        diagnostics.verbose_info(format!("Successfully loaded {}", SERVICE_NAME));
        diagnostics.drain_and_print();

        Ok(Self {
            config,
            diagnostics,
            transport,
            targets,
            engine: None,
            active_targets: 0,
            registered: true,
        })
    }

    fn print_banner(diagnostics: &Diagnostics) {
        diagnostics.info(BANNER_RULE);
        diagnostics.info(format!("Plug-in: {}", SERVICE_NAME));
        diagnostics.info(format!("Version: {}", env!("CARGO_PKG_VERSION")));
        diagnostics.info(BANNER_RULE);
    }

    /// Whether the host should keep delivering lifecycle calls
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Whether the engine thread is running
    pub fn is_announcing(&self) -> bool {
        self.engine.as_ref().is_some_and(AnnounceEngine::is_running)
    }

    /// Targets built at load time and not yet handed to the engine
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Number of targets the engine was started with
    pub fn active_targets(&self) -> usize {
        self.active_targets
    }

    /// Shared diagnostics queue
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Configuration in use
    pub fn config(&self) -> &AnnounceConfig {
        &self.config
    }

    /// The host finished initializing
    ///
    /// Queries host settings once, builds every payload and starts the
    /// engine. Returns `false` when the service unregistered itself because
    /// no target is left to announce to, or none of those left is valid.
    pub fn on_initialize(&mut self, host: &dyn HostBridge) -> bool {
        if !self.registered || self.engine.is_some() {
            return self.registered;
        }

        let settings = host.server_settings();
        let version = host.server_version();
        debug!(
            "Host settings: port={}, version={}",
            settings.port, version
        );

        let mut ready = Vec::with_capacity(self.targets.len());
        for mut target in self.targets.drain(..) {
            match target.generate(settings, version, &self.config.user_agent) {
                Ok(()) => ready.push(target),
                Err(e) => self.diagnostics.error(format!(
                    "Master-server '{}' dropped: {}",
                    target.address(),
                    e
                )),
            }
        }

        if ready.is_empty() {
            self.diagnostics
                .error("No master-server could be prepared. Announcing is disabled.");
            self.registered = false;
            return false;
        }

        // Invalid targets never leave Idle
        if !ready.iter().any(Target::is_valid) {
            self.diagnostics
                .error("No valid master-server left to announce to. Announcing is disabled.");
            self.registered = false;
            return false;
        }

        let active_targets = ready.len();

        let mut engine = AnnounceEngine::new(
            ready,
            Arc::clone(&self.transport),
            self.config.effective_interval(),
            self.diagnostics.clone(),
        );

        if let Err(e) = engine.start() {
            self.diagnostics
                .error(format!("Failed to start the announce thread: {}", e));
            self.registered = false;
            return false;
        }

        info!(
            "Announcing to {} master-server(s) via {} every {:?}",
            active_targets,
            engine.transport_name(),
            engine.interval()
        );
        self.engine = Some(engine);
        self.active_targets = active_targets;
        self.diagnostics
            .verbose_info("Announce plug-in was successfully initialized");
        true
    }

    /// Per-frame host callback: print queued diagnostics
    pub fn on_tick(&self) -> usize {
        if !self.registered {
            return 0;
        }
        self.diagnostics.drain_and_print()
    }

    /// The host is shutting down
    ///
    /// Stops and joins the engine, flushes the remaining diagnostics and
    /// unregisters. Returns the final status of every target that was
    /// announcing; later calls return an empty list.
    pub fn on_shutdown(&mut self) -> Vec<TargetStatus> {
        self.registered = false;

        let statuses = match self.engine.take() {
            Some(mut engine) => engine.stop(),
            None => Vec::new(),
        };

        self.diagnostics.drain_and_print();
        statuses
    }
}

impl Drop for AnnounceService {
    fn drop(&mut self) {
        if self.engine.is_some() {
            self.on_shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{AnnounceRequest, ExchangeOutcome, PendingExchange};

    struct NullTransport;

    impl AnnounceTransport for NullTransport {
        fn open(&self, _request: &AnnounceRequest) -> Result<PendingExchange> {
            Ok(Box::pin(async { ExchangeOutcome::Status(200) }))
        }

        fn transport_name(&self) -> &'static str {
            "null"
        }
    }

    #[test]
    fn test_load_builds_targets_in_order() {
        let config = AnnounceConfig::new(["b.example.org", "", "a.example.org:81/x"]);
        let service = AnnounceService::load(config, Arc::new(NullTransport)).unwrap();

        let urls: Vec<_> = service
            .targets()
            .iter()
            .map(|t| t.address().full_url().to_string())
            .collect();
        assert_eq!(urls, ["http://b.example.org:80/", "http://a.example.org:81/x"]);
        assert_eq!(service.targets()[1].id().index(), 2);
        assert!(service.is_registered());
        assert!(!service.is_announcing());
    }

    #[test]
    fn test_load_without_addresses_fails() {
        let err = AnnounceService::load(AnnounceConfig::default(), Arc::new(NullTransport))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));

        let err = AnnounceService::load(
            AnnounceConfig::new(["http://", ":80"]),
            Arc::new(NullTransport),
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_flushes_diagnostics() {
        let service = AnnounceService::load(
            AnnounceConfig::new(["a.example.org"]).with_verbose(true),
            Arc::new(NullTransport),
        )
        .unwrap();
        assert!(service.diagnostics().is_empty());
    }
}
