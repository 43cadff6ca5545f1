// # HTTP Announce Transport
//
// This crate provides the reqwest-based transport for the announce engine.
//
// ## Exchange
//
// One announce is one `POST` of the target's prebuilt form body to its
// full URL, carrying the prebuilt headers. The status of the final
// response is reported back verbatim; classifying it is the target's job.
//
// ## Redirects
//
// Followed here rather than by reqwest, which would downgrade a POST to a
// GET on 301/302 and lose the form body:
//
// ```text
// 301 302 307 308  ── same method, same headers, same body
// 303              ── GET, no body
// ```
//
// At most [`MAX_REDIRECTS`] hops; a longer chain is a transport failure.
//
// Idle connections are not pooled: each announce opens a fresh connection,
// so a master-server that went away is noticed on the next round.

use announce_core::traits::{AnnounceRequest, AnnounceTransport, ExchangeOutcome, PendingExchange};
use announce_core::{Error, Result};

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, LOCATION};
use reqwest::{Method, StatusCode, Url};
use tracing::debug;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of redirects followed per announce
pub const MAX_REDIRECTS: usize = 10;

/// HTTP transport for master-server announces
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// HTTP client
    client: reqwest::Client,

    /// Per-request timeout
    timeout: Duration,
}

impl HttpTransport {
    /// Create a new HTTP transport
    ///
    /// # Parameters
    ///
    /// - `timeout`: Upper bound for each request of an exchange (connect, send, reply)
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend or client cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(Error::config("Request timeout must be > 0"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| Error::transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// Per-request timeout in use
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl AnnounceTransport for HttpTransport {
    fn open(&self, request: &AnnounceRequest) -> Result<PendingExchange> {
        let url = Url::parse(&request.url).map_err(|e| {
            Error::transport(format!("Cannot build request for {}: {}", request.url, e))
        })?;
        let first = build_request(
            &self.client,
            Method::POST,
            url,
            &request.headers,
            &request.body,
        )
        .map_err(|e| {
            Error::transport(format!("Cannot build request for {}: {}", request.url, e))
        })?;

        let client = self.client.clone();
        let headers = request.headers.clone();
        let body = request.body.clone();

        Ok(Box::pin(async move {
            exchange(client, first, headers, body).await
        }))
    }

    fn transport_name(&self) -> &'static str {
        "http"
    }
}

fn build_request(
    client: &reqwest::Client,
    method: Method,
    url: Url,
    headers: &HeaderMap,
    body: &str,
) -> reqwest::Result<reqwest::Request> {
    if method == Method::GET {
        let mut headers = headers.clone();
        headers.remove(CONTENT_TYPE);
        return client.get(url).headers(headers).build();
    }

    client
        .request(method, url)
        .headers(headers.clone())
        .body(body.to_string())
        .build()
}

/// Run one announce, following redirects by hand
async fn exchange(
    client: reqwest::Client,
    first: reqwest::Request,
    headers: HeaderMap,
    body: String,
) -> ExchangeOutcome {
    let mut next = first;

    for _ in 0..=MAX_REDIRECTS {
        let method = next.method().clone();
        let url = next.url().clone();

        let response = match client.execute(next).await {
            Ok(response) => response,
            Err(e) => {
                debug!("{} {} failed: {}", method, url, e);
                return ExchangeOutcome::Transport(describe_error(&e));
            }
        };

        let status = response.status();
        let Some(location) = redirect_location(&response) else {
            debug!("{} {} -> {}", method, url, status.as_u16());
            return ExchangeOutcome::Status(status.as_u16());
        };

        let method = if status == StatusCode::SEE_OTHER {
            Method::GET
        } else {
            method
        };
        debug!("{} {} redirected ({}) to {}", method, url, status.as_u16(), location);

        next = match build_request(&client, method, location, &headers, &body) {
            Ok(request) => request,
            Err(e) => return ExchangeOutcome::Transport(describe_error(&e)),
        };
    }

    ExchangeOutcome::Transport("too many redirects".to_string())
}

/// Where a redirect response points, resolved against the response URL
///
/// `None` for non-redirect statuses and for redirects without a usable
/// `Location`; those responses are reported as they are.
fn redirect_location(response: &reqwest::Response) -> Option<Url> {
    let follows = matches!(
        response.status(),
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    );
    if !follows {
        return None;
    }

    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    response.url().join(location).ok()
}

fn describe_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}
