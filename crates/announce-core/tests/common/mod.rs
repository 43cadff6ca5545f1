//! Test doubles and common utilities for announce contract tests
//!
//! The transports here never touch the network. They count every `open`
//! call so tests can assert how often the engine announced.

#![allow(dead_code)]

use announce_core::config::ServerSettings;
use announce_core::diagnostics::Diagnostics;
use announce_core::error::{Error, Result};
use announce_core::traits::{
    AnnounceRequest, AnnounceTransport, ExchangeOutcome, HostBridge, PendingExchange,
};
use announce_core::{Address, Target, TargetId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Port reported by [`StaticHost`]
pub const HOST_PORT: u16 = 8192;

/// Version reported by [`StaticHost`]
pub const HOST_VERSION: u32 = 67000;

/// A transport answering each URL with a fixed outcome
pub struct ScriptedTransport {
    /// Outcome per URL; unknown URLs get `fallback`
    script: HashMap<String, ExchangeOutcome>,
    fallback: ExchangeOutcome,
    /// Delay before every outcome resolves
    latency: Duration,
    open_count: Arc<AtomicUsize>,
    opened_urls: Arc<Mutex<Vec<String>>>,
    requests: Arc<Mutex<Vec<AnnounceRequest>>>,
}

impl ScriptedTransport {
    /// Every URL is answered with 200
    pub fn accepting() -> Self {
        Self::with_fallback(ExchangeOutcome::Status(200))
    }

    /// Every URL is answered with `outcome`
    pub fn with_fallback(fallback: ExchangeOutcome) -> Self {
        Self {
            script: HashMap::new(),
            fallback,
            latency: Duration::from_millis(10),
            open_count: Arc::new(AtomicUsize::new(0)),
            opened_urls: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer `url` with `outcome`
    pub fn respond(mut self, url: &str, outcome: ExchangeOutcome) -> Self {
        self.script.insert(url.to_string(), outcome);
        self
    }

    /// Delay every outcome by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Total number of `open` calls
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    /// Number of `open` calls for one URL
    pub fn opens_for(&self, url: &str) -> usize {
        self.opened_urls
            .lock()
            .unwrap()
            .iter()
            .filter(|opened| opened.as_str() == url)
            .count()
    }

    /// Every request handed to the transport, in order
    pub fn requests(&self) -> Vec<AnnounceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl AnnounceTransport for ScriptedTransport {
    fn open(&self, request: &AnnounceRequest) -> Result<PendingExchange> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        self.opened_urls.lock().unwrap().push(request.url.clone());
        self.requests.lock().unwrap().push(request.clone());

        let outcome = self
            .script
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone());
        let latency = self.latency;

        Ok(Box::pin(async move {
            tokio::time::sleep(latency).await;
            outcome
        }))
    }

    fn transport_name(&self) -> &'static str {
        "scripted"
    }
}

/// A transport whose exchanges never complete
pub struct HangingTransport {
    open_count: Arc<AtomicUsize>,
}

impl HangingTransport {
    pub fn new() -> Self {
        Self {
            open_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }
}

impl AnnounceTransport for HangingTransport {
    fn open(&self, _request: &AnnounceRequest) -> Result<PendingExchange> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(std::future::pending::<ExchangeOutcome>()))
    }

    fn transport_name(&self) -> &'static str {
        "hanging"
    }
}

/// A transport that can never open a connection
pub struct RefusingTransport {
    open_count: Arc<AtomicUsize>,
}

impl RefusingTransport {
    pub fn new() -> Self {
        Self {
            open_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }
}

impl AnnounceTransport for RefusingTransport {
    fn open(&self, request: &AnnounceRequest) -> Result<PendingExchange> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        Err(Error::transport(format!("cannot connect to {}", request.url)))
    }

    fn transport_name(&self) -> &'static str {
        "refusing"
    }
}

/// A host with fixed settings
pub struct StaticHost {
    pub port: u16,
    pub version: u32,
    settings_calls: AtomicUsize,
}

impl StaticHost {
    pub fn new() -> Self {
        Self {
            port: HOST_PORT,
            version: HOST_VERSION,
            settings_calls: AtomicUsize::new(0),
        }
    }

    pub fn settings_calls(&self) -> usize {
        self.settings_calls.load(Ordering::SeqCst)
    }
}

impl HostBridge for StaticHost {
    fn server_settings(&self) -> ServerSettings {
        self.settings_calls.fetch_add(1, Ordering::SeqCst);
        ServerSettings { port: self.port }
    }

    fn server_version(&self) -> u32 {
        self.version
    }
}

/// Build a target with its payload already generated
pub fn ready_target(index: usize, raw: &str, diagnostics: &Diagnostics) -> Target {
    let mut target = Target::new(
        TargetId::new(index),
        Address::parse(raw).expect("test address parses"),
        diagnostics.clone(),
    );
    target
        .generate(ServerSettings { port: HOST_PORT }, HOST_VERSION, "VCMP/0.4")
        .expect("payload generation succeeds");
    target
}

/// Drive a target through one exchange without an engine
pub fn run_exchange(target: &mut Target, outcome: ExchangeOutcome) {
    assert!(target.begin_update().is_some(), "target accepts an update");
    target.mark_awaiting_reply();
    target.complete(outcome).expect("completion is accepted");
}

/// Texts of every queued diagnostic
pub fn drained_texts(diagnostics: &Diagnostics) -> Vec<String> {
    diagnostics.drain().into_iter().map(|d| d.text).collect()
}
