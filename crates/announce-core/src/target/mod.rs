//! Per-master-server state machine
//!
//! ```text
//!            begin_update()            mark_awaiting_reply()
//!   ┌──────┐ ─────────────▶ ┌────────────┐ ─────────────▶ ┌───────────────┐
//!   │ Idle │                │ Connecting │                │ AwaitingReply │
//!   └──────┘ ◀───────────── └────────────┘                └───────────────┘
//!      ▲      connect_failed()                                    │
//!      └──────────────────────────────────────────────────────────┘
//!                         complete(outcome) / abandon()
//! ```
//!
//! Every failed exchange bumps the failure counter; a 200 resets it. At
//! [`FAILURE_THRESHOLD`] consecutive failures the target is invalidated for
//! the rest of the process and `begin_update()` refuses to start anything.
//!
//! Targets never open sockets. The engine asks for the prebuilt request,
//! hands it to the transport, and reports the outcome back here.

use crate::address::Address;
use crate::config::ServerSettings;
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::traits::{AnnounceRequest, ExchangeOutcome};
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use std::fmt;

/// Consecutive failures after which a target is permanently disabled
pub const FAILURE_THRESHOLD: u32 = 1000;

/// Header carrying the game server's protocol version
pub const VERSION_HEADER: &str = "vcmp-version";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Stable identifier of a target inside one engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(usize);

impl TargetId {
    /// Create an identifier from a list position
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position of the target in configuration order
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Connection state of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetState {
    /// No exchange in flight
    Idle,
    /// Request handed to the transport, connection being requested
    Connecting,
    /// Request sent, waiting for the response
    AwaitingReply,
}

/// Why a master-server rejected (or never answered) an announce
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// 400
    MalformedData,
    /// 403
    VersionRejected,
    /// 405
    MethodNotAllowed,
    /// 408
    GameServerUnreachable,
    /// 500
    MasterServerError,
    /// Any other status code
    UnexpectedStatus(u16),
    /// No response at all
    Transport(String),
}

impl Rejection {
    fn describe(&self, url: &str) -> String {
        match self {
            Rejection::MalformedData => format!(
                "Master-server '{}' denied request due to malformed data",
                url
            ),
            Rejection::VersionRejected => format!(
                "Master-server '{}' denied request, server version may not have been accepted",
                url
            ),
            Rejection::MethodNotAllowed => format!(
                "Master-server '{}' denied request, the request method is not supported",
                url
            ),
            Rejection::GameServerUnreachable => format!(
                "Master-server '{}' timed out while trying to reach your server; are your ports forwarded?",
                url
            ),
            Rejection::MasterServerError => format!(
                "Master-server '{}' had an unexpected error while processing your request",
                url
            ),
            Rejection::UnexpectedStatus(code) => format!(
                "Master-server '{}' responded with unexpected code {}",
                url, code
            ),
            Rejection::Transport(reason) => {
                format!("Master-server '{}' could not be reached: {}", url, reason)
            }
        }
    }
}

/// Classification of one exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// 200: the announce was accepted
    Accepted,
    /// Anything else
    Rejected(Rejection),
}

impl Verdict {
    /// Classify an exchange outcome
    pub fn classify(outcome: &ExchangeOutcome) -> Self {
        let rejection = match outcome {
            ExchangeOutcome::Status(200) => return Verdict::Accepted,
            ExchangeOutcome::Status(400) => Rejection::MalformedData,
            ExchangeOutcome::Status(403) => Rejection::VersionRejected,
            ExchangeOutcome::Status(405) => Rejection::MethodNotAllowed,
            ExchangeOutcome::Status(408) => Rejection::GameServerUnreachable,
            ExchangeOutcome::Status(500) => Rejection::MasterServerError,
            ExchangeOutcome::Status(code) => Rejection::UnexpectedStatus(*code),
            ExchangeOutcome::Transport(reason) => Rejection::Transport(reason.clone()),
        };
        Verdict::Rejected(rejection)
    }

    /// Whether the announce was accepted
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// Read-only snapshot of a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetStatus {
    /// Target identifier
    pub id: TargetId,
    /// Full master-server URL
    pub url: String,
    /// Connection state at snapshot time
    pub state: TargetState,
    /// Whether the target is still eligible for updates
    pub valid: bool,
    /// Consecutive failures
    pub failures: u32,
}

/// One master-server directory
#[derive(Debug)]
pub struct Target {
    id: TargetId,
    address: Address,
    valid: bool,
    failures: u32,
    payload: Option<AnnounceRequest>,
    state: TargetState,
    diagnostics: Diagnostics,
}

impl Target {
    /// Create a target for a parsed address
    ///
    /// A target whose port fragment is not a usable TCP port starts out
    /// invalid: it is kept for bookkeeping but never updated.
    pub fn new(id: TargetId, address: Address, diagnostics: Diagnostics) -> Self {
        let valid = address.port_number().is_some();
        if !valid {
            diagnostics.verbose_error(format!(
                "Master-server '{}' was marked as invalid",
                address.full_url()
            ));
        }

        Self {
            id,
            address,
            valid,
            failures: 0,
            payload: None,
            state: TargetState::Idle,
            diagnostics,
        }
    }

    /// Target identifier
    pub fn id(&self) -> TargetId {
        self.id
    }

    /// Master-server address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Whether the target is eligible for updates
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Consecutive failures since the last success
    pub fn failure_count(&self) -> u32 {
        self.failures
    }

    /// Current connection state
    pub fn state(&self) -> TargetState {
        self.state
    }

    /// Prebuilt request, if generated
    pub fn payload(&self) -> Option<&AnnounceRequest> {
        self.payload.as_ref()
    }

    /// Snapshot of the target
    pub fn status(&self) -> TargetStatus {
        TargetStatus {
            id: self.id,
            url: self.address.full_url().to_string(),
            state: self.state,
            valid: self.valid,
            failures: self.failures,
        }
    }

    /// Build the announce request from host settings
    ///
    /// # Errors
    ///
    /// Returns [`Error::Payload`] when a header cannot be encoded or the
    /// resulting request is empty. The caller drops such targets.
    pub fn generate(
        &mut self,
        settings: ServerSettings,
        server_version: u32,
        user_agent: &str,
    ) -> Result<()> {
        let user_agent = HeaderValue::from_str(user_agent).map_err(|e| {
            Error::payload(format!("invalid user agent {:?}: {}", user_agent, e))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, user_agent);
        headers.insert(
            HeaderName::from_static(VERSION_HEADER),
            HeaderValue::from(server_version),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));

        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("port", &settings.port.to_string())
            .finish();

        let request = AnnounceRequest {
            url: self.address.full_url().to_string(),
            headers,
            body,
        };

        if !request.is_well_formed() {
            return Err(Error::payload(format!(
                "empty announce request for '{}'",
                self.address
            )));
        }

        self.payload = Some(request);
        Ok(())
    }

    /// Start an update
    ///
    /// Returns the request to send, or `None` when the target is invalid,
    /// already has an exchange in flight, or has no payload.
    pub fn begin_update(&mut self) -> Option<&AnnounceRequest> {
        if !self.valid {
            self.diagnostics.verbose_info(format!(
                "Skipping invalid master-list: `{}`",
                self.address
            ));
            return None;
        }

        if self.state != TargetState::Idle {
            tracing::debug!(
                "Target {} still has an exchange in flight ({:?}), skipping",
                self.id,
                self.state
            );
            return None;
        }

        if self.payload.is_none() {
            tracing::warn!("Target {} has no payload, skipping", self.id);
            return None;
        }

        self.diagnostics
            .verbose_info(format!("Announcing on master-list: `{}`", self.address));
        self.state = TargetState::Connecting;
        self.payload.as_ref()
    }

    /// The transport accepted the request; wait for the reply
    pub fn mark_awaiting_reply(&mut self) {
        if self.state == TargetState::Connecting {
            self.state = TargetState::AwaitingReply;
        }
    }

    /// The connection could not be requested at all
    pub fn connect_failed(&mut self, error: &Error) {
        self.state = TargetState::Idle;
        self.diagnostics.verbose_error(
            Rejection::Transport(error.to_string()).describe(self.address.full_url()),
        );
        self.failed();
    }

    /// Record the outcome of the in-flight exchange
    ///
    /// Returns `None` for a completion that arrives while the target is idle.
    pub fn complete(&mut self, outcome: ExchangeOutcome) -> Option<Verdict> {
        if self.state == TargetState::Idle {
            tracing::warn!("Target {} received a completion while idle", self.id);
            return None;
        }
        self.state = TargetState::Idle;

        if let ExchangeOutcome::Status(code) = outcome {
            self.diagnostics.verbose_info(format!(
                "Master-list ({}) responded with code: {}",
                self.address, code
            ));
        }

        let verdict = Verdict::classify(&outcome);
        match &verdict {
            Verdict::Accepted => {
                self.diagnostics.verbose_info(format!(
                    "Successfully announced on master-server '{}'",
                    self.address
                ));
                self.succeeded();
            }
            Verdict::Rejected(rejection) => {
                self.diagnostics
                    .verbose_error(rejection.describe(self.address.full_url()));
                self.failed();
            }
        }

        Some(verdict)
    }

    /// Drop the in-flight exchange without judging it (engine shutdown)
    pub fn abandon(&mut self) {
        self.state = TargetState::Idle;
    }

    fn failed(&mut self) {
        self.failures = self.failures.saturating_add(1);
        if self.valid && self.failures >= FAILURE_THRESHOLD {
            self.valid = false;
            self.diagnostics.error(format!(
                "Master-server '{}' was marked as invalid after {} failures",
                self.address, self.failures
            ));
        }
    }

    fn succeeded(&mut self) {
        self.failures = 0;
        self.valid = true;
    }
}
