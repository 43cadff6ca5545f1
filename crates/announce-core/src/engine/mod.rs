//! Announce engine
//!
//! The AnnounceEngine is responsible for:
//! - Owning every Target once started (one-time handoff to its own thread)
//! - Announcing to all targets immediately, then once per interval
//! - Multiplexing all in-flight exchanges on a single I/O driver
//! - Noticing a stop request within one poll slice
//!
//! ## Architecture
//!
//! ```text
//!  host thread                          "announce" thread
//!  AnnounceEngine                       Scheduler (current-thread runtime)
//!    running flag  ── start(targets) ─▶   select! {
//!    JoinHandle                             exchange done  ─▶ Target::complete
//!                  ◀── stop() ───────       poll tick 250ms ─▶ maybe a round
//!                      Vec<TargetStatus>  }
//! ```
//!
//! ## Threading
//!
//! Target state and network I/O live exclusively on the announce thread.
//! The only state shared with the host thread is the stop flag and the
//! diagnostics queue.

use crate::config::MIN_UPDATE_INTERVAL;
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::target::{Target, TargetId, TargetStatus};
use crate::traits::{AnnounceTransport, ExchangeOutcome};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

/// Length of one poll slice; bounds how long a stop request can go unnoticed
pub const POLL_SLICE: Duration = Duration::from_millis(250);

/// Name given to the engine's background thread
pub const THREAD_NAME: &str = "announce";

/// Core announce engine
///
/// ## Lifecycle
///
/// 1. Create with [`AnnounceEngine::new()`]
/// 2. Start with [`AnnounceEngine::start()`]; the targets move to the
///    background thread and the first round goes out immediately
/// 3. Stop with [`AnnounceEngine::stop()`]; the call joins the thread and
///    returns the final status of every target
///
/// Dropping a running engine stops it.
pub struct AnnounceEngine {
    /// Targets awaiting handoff; empty once started
    targets: Vec<Target>,

    /// Transport shared by every target
    transport: Arc<dyn AnnounceTransport>,

    /// Time between announce rounds
    interval: Duration,

    /// Console conduit
    diagnostics: Diagnostics,

    /// Keep-running flag observed every poll slice
    running: Arc<AtomicBool>,

    /// Background thread, present while started
    thread: Option<JoinHandle<Vec<TargetStatus>>>,
}

impl AnnounceEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `targets`: Targets with generated payloads
    /// - `transport`: Transport used for every exchange
    /// - `interval`: Time between rounds, clamped to at least one second
    /// - `diagnostics`: Queue that receives console lines
    pub fn new(
        targets: Vec<Target>,
        transport: Arc<dyn AnnounceTransport>,
        interval: Duration,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            targets,
            transport,
            interval: interval.max(MIN_UPDATE_INTERVAL),
            diagnostics,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// Effective time between rounds
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Name of the transport every exchange goes through
    pub fn transport_name(&self) -> &'static str {
        self.transport.transport_name()
    }

    /// Number of poll slices that make up one interval
    pub fn polls_per_cycle(&self) -> u64 {
        polls_per_cycle(self.interval)
    }

    /// Whether the background thread has been started and not yet stopped
    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Hand the targets to a new background thread and start announcing
    ///
    /// # Errors
    ///
    /// - The engine was already started
    /// - There are no targets to announce to
    /// - The thread could not be spawned
    pub fn start(&mut self) -> Result<()> {
        if self.thread.is_some() {
            return Err(Error::engine("announce engine already started"));
        }
        if self.targets.is_empty() {
            return Err(Error::engine("no targets to announce to"));
        }

        let scheduler = Scheduler {
            targets: std::mem::take(&mut self.targets),
            transport: Arc::clone(&self.transport),
            polls_per_cycle: self.polls_per_cycle(),
            diagnostics: self.diagnostics.clone(),
            running: Arc::clone(&self.running),
            exchanges: JoinSet::new(),
            in_flight: HashMap::new(),
        };

        self.running.store(true, Ordering::Release);
        let spawned = std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || scheduler.run());

        match spawned {
            Ok(handle) => {
                debug!(
                    "Announce thread spawned (transport={}, interval={:?})",
                    self.transport.transport_name(),
                    self.interval
                );
                self.thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(Error::Io(e))
            }
        }
    }

    /// Ask the background thread to stop and wait for it
    ///
    /// Returns the final status of every target. Calling `stop` on an engine
    /// that was never started returns the status of the pending targets.
    pub fn stop(&mut self) -> Vec<TargetStatus> {
        self.running.store(false, Ordering::Release);

        match self.thread.take() {
            Some(handle) => match handle.join() {
                Ok(statuses) => {
                    debug!("Announce thread joined");
                    statuses
                }
                Err(_) => {
                    error!("Announce thread panicked");
                    Vec::new()
                }
            },
            None => self.targets.iter().map(Target::status).collect(),
        }
    }
}

impl Drop for AnnounceEngine {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop();
        }
    }
}

fn polls_per_cycle(interval: Duration) -> u64 {
    let polls = interval.as_millis() / POLL_SLICE.as_millis();
    u64::try_from(polls).unwrap_or(u64::MAX).max(1)
}

/// State owned by the background thread
struct Scheduler {
    targets: Vec<Target>,
    transport: Arc<dyn AnnounceTransport>,
    polls_per_cycle: u64,
    diagnostics: Diagnostics,
    running: Arc<AtomicBool>,
    /// In-flight exchanges
    exchanges: JoinSet<ExchangeOutcome>,
    /// Exchange task → owning target
    in_flight: HashMap<task::Id, TargetId>,
}

impl Scheduler {
    fn run(mut self) -> Vec<TargetStatus> {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                self.diagnostics
                    .error(format!("Failed to create the announce runtime: {}", e));
                return self.statuses();
            }
        };

        runtime.block_on(self.drive());
        self.statuses()
    }

    async fn drive(&mut self) {
        self.diagnostics.verbose_info("Announce thread started.");

        // First announce goes out right away
        self.announce_round();

        let mut poll =
            tokio::time::interval_at(tokio::time::Instant::now() + POLL_SLICE, POLL_SLICE);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls = 0u64;

        while self.running.load(Ordering::Acquire) {
            tokio::select! {
                Some(joined) = self.exchanges.join_next_with_id() => {
                    self.on_exchange_done(joined);
                }

                _ = poll.tick() => {
                    polls += 1;
                    if polls >= self.polls_per_cycle && self.running.load(Ordering::Acquire) {
                        polls = 0;
                        self.announce_round();
                    }
                }
            }
        }

        // Cancel whatever is still in flight; those targets are not judged
        self.exchanges.shutdown().await;
        let abandoned: Vec<TargetId> = self.in_flight.drain().map(|(_, id)| id).collect();
        for target_id in abandoned {
            if let Some(target) = self.target_mut(target_id) {
                target.abandon();
            }
        }

        debug!("Announce loop exited");
        self.diagnostics.verbose_info("Announce thread stopped.");
    }

    fn announce_round(&mut self) {
        debug!(
            "Announce round over {} target(s) via {}",
            self.targets.len(),
            self.transport.transport_name()
        );

        for target in self.targets.iter_mut() {
            let opened = match target.begin_update() {
                Some(request) => self.transport.open(request),
                None => continue,
            };

            match opened {
                Ok(exchange) => {
                    target.mark_awaiting_reply();
                    let handle = self.exchanges.spawn(exchange);
                    self.in_flight.insert(handle.id(), target.id());
                }
                Err(e) => {
                    debug!(
                        "Target {} could not open a {} exchange: {}",
                        target.id(),
                        self.transport.transport_name(),
                        e
                    );
                    target.connect_failed(&e);
                }
            }
        }
    }

    fn on_exchange_done(&mut self, joined: std::result::Result<(task::Id, ExchangeOutcome), JoinError>) {
        let (task_id, outcome) = match joined {
            Ok(done) => done,
            Err(e) => (
                e.id(),
                ExchangeOutcome::Transport(format!("exchange task failed: {}", e)),
            ),
        };

        let Some(target_id) = self.in_flight.remove(&task_id) else {
            warn!("Exchange {} finished with no owning target", task_id);
            return;
        };

        if let Some(target) = self.target_mut(target_id) {
            debug!("Target {} exchange finished: {:?}", target_id, outcome);
            target.complete(outcome);
        }
    }

    fn target_mut(&mut self, id: TargetId) -> Option<&mut Target> {
        self.targets.iter_mut().find(|target| target.id() == id)
    }

    fn statuses(&self) -> Vec<TargetStatus> {
        self.targets.iter().map(Target::status).collect()
    }
}
