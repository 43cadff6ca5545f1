//! Contract Test: Host Lifecycle
//!
//! Constraints verified:
//! - Loading without a usable address fails and leaves nothing registered
//! - Host settings are read once, at initialize, and baked into payloads
//! - Targets whose payload cannot be built are dropped before scheduling
//! - Shutdown stops the engine, flushes diagnostics and unregisters
//!
//! If this test fails, someone has:
//! - Started the engine with no targets
//! - Re-read host settings per round
//! - Left the engine running after shutdown

mod common;

use announce_core::traits::ExchangeOutcome;
use announce_core::{AnnounceConfig, AnnounceService, Error};
use common::*;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

#[test]
fn load_without_servers_declines() {
    // Scenario: empty master-server list
    let transport = Arc::new(ScriptedTransport::accepting());
    let result = AnnounceService::load(AnnounceConfig::new(["", "   "]), transport.clone());

    match result {
        Err(Error::Config(msg)) => {
            assert_eq!(msg, "No master-servers specified. No reason to load the plug-in.")
        }
        Err(other) => panic!("expected a config error, got {:?}", other),
        Ok(_) => panic!("service must not load without servers"),
    }
    assert_eq!(transport.open_count(), 0);
}

#[test]
fn load_skips_ill_formed_addresses() {
    let transport = Arc::new(ScriptedTransport::accepting());
    let service = AnnounceService::load(
        AnnounceConfig::new(["https://", "a.example.org"]),
        transport,
    )
    .expect("one address survives");

    assert_eq!(service.targets().len(), 1);
    assert_eq!(service.targets()[0].address().host(), "a.example.org");
}

#[test]
fn full_lifecycle_announces_with_host_settings() {
    let transport = Arc::new(ScriptedTransport::accepting());
    let host = StaticHost::new();
    let mut service = AnnounceService::load(
        AnnounceConfig::new(["a.example.org", "b.example.org:81/list"]),
        transport.clone(),
    )
    .expect("service loads");

    assert!(service.on_initialize(&host));
    assert!(service.is_announcing());
    assert_eq!(host.settings_calls(), 1);

    sleep(Duration::from_millis(150));
    service.on_tick();

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.body, "port=8192");
        assert_eq!(request.headers["vcmp-version"], "67000");
        assert_eq!(request.headers["user-agent"], "VCMP/0.4");
    }

    let statuses = service.on_shutdown();
    assert_eq!(statuses.len(), 2);
    assert!(statuses.iter().all(|s| s.failures == 0));
    assert!(!service.is_registered());
    assert!(!service.is_announcing());
    assert!(service.diagnostics().is_empty());

    // Later lifecycle calls are no-ops
    assert!(service.on_shutdown().is_empty());
    assert_eq!(service.on_tick(), 0);
    assert!(!service.on_initialize(&host));
    assert_eq!(host.settings_calls(), 1);
}

#[test]
fn unusable_payloads_unregister_the_service() {
    let transport = Arc::new(ScriptedTransport::accepting());
    let config = AnnounceConfig::new(["a.example.org"]).with_user_agent("bad\nagent");
    let mut service = AnnounceService::load(config, transport.clone()).expect("service loads");

    assert!(!service.on_initialize(&StaticHost::new()));
    assert!(!service.is_registered());
    assert!(!service.is_announcing());

    let texts = drained_texts(service.diagnostics());
    assert!(texts.iter().any(|t| t.contains("dropped")));

    sleep(Duration::from_millis(100));
    assert_eq!(transport.open_count(), 0);
}

#[test]
fn bad_port_target_is_kept_but_skipped() {
    let transport = Arc::new(ScriptedTransport::accepting());
    let mut service = AnnounceService::load(
        AnnounceConfig::new(["a.example.org:http", "b.example.org"]),
        transport.clone(),
    )
    .expect("service loads");
    assert_eq!(service.targets().len(), 2);
    assert!(!service.targets()[0].is_valid());

    assert!(service.on_initialize(&StaticHost::new()));
    sleep(Duration::from_millis(150));
    let statuses = service.on_shutdown();

    assert_eq!(transport.open_count(), 1);
    assert_eq!(transport.opens_for("http://b.example.org:80/"), 1);
    assert_eq!(statuses.len(), 2);
    assert!(!statuses[0].valid);
}

#[test]
fn rejected_announces_surface_on_tick() {
    let transport = Arc::new(ScriptedTransport::with_fallback(ExchangeOutcome::Status(
        403,
    )));
    let mut service = AnnounceService::load(
        AnnounceConfig::new(["a.example.org"]).with_verbose(true),
        transport,
    )
    .expect("service loads");

    assert!(service.on_initialize(&StaticHost::new()));
    sleep(Duration::from_millis(150));

    let texts = drained_texts(service.diagnostics());
    assert!(texts.iter().any(|t| t.contains("server version may not have been accepted")));

    let statuses = service.on_shutdown();
    assert_eq!(statuses[0].failures, 1);
}

#[test]
fn only_usable_targets_are_counted() {
    let transport = Arc::new(ScriptedTransport::accepting());
    let mut service = AnnounceService::load(
        AnnounceConfig::new(["http://", "a.example.org", "", "b.example.org:81"]),
        transport,
    )
    .expect("service loads");
    assert_eq!(service.active_targets(), 0);

    assert!(service.on_initialize(&StaticHost::new()));
    assert_eq!(service.active_targets(), 2);
    assert_eq!(service.on_shutdown().len(), 2);
}

#[test]
fn all_invalid_targets_unregister_the_service() {
    let transport = Arc::new(ScriptedTransport::accepting());
    let mut service = AnnounceService::load(
        AnnounceConfig::new(["a.example.org:http", "b.example.org:0"]),
        transport.clone(),
    )
    .expect("service loads");
    assert_eq!(service.targets().len(), 2);

    assert!(!service.on_initialize(&StaticHost::new()));
    assert!(!service.is_registered());
    assert!(!service.is_announcing());
    assert_eq!(service.active_targets(), 0);

    let texts = drained_texts(service.diagnostics());
    assert!(texts.iter().any(|t| t.contains("No valid master-server left")));

    sleep(Duration::from_millis(100));
    assert_eq!(transport.open_count(), 0);
    assert!(service.on_shutdown().is_empty());
}
