// # Master-server addresses
//
// Turns a configured address string into connection parameters.
//
// ## Grammar
//
// ```text
// [http:// | https://] host [ ":" port ] [ "/" path ]
// ```
//
// - The scheme is stripped and ignored; announces always go out over plain HTTP.
// - A `:` ends the host, even when a `/` appears later in the string.
// - Only without a `:` does the first `/` end the host.
// - Port defaults to `80`, path defaults to `/`.
//
// No DNS resolution and no numeric validation happen here. The port is kept
// as the raw fragment; [`Address::port_number`] is the checked view used by
// code that actually needs a TCP port.

use crate::error::{Error, Result};
use std::fmt;

/// Port used when the address carries no `:` separator
pub const DEFAULT_PORT: &str = "80";

/// Path used when the address carries no `/` separator
pub const DEFAULT_PATH: &str = "/";

const SCHEMES: &[&str] = &["http://", "https://"];

/// A parsed master-server address
///
/// Immutable after construction; the derived forms are computed once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    host: String,
    port: String,
    path: String,
    full_url: String,
    connect_address: String,
}

impl Address {
    /// Parse a raw address string
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] when no host can be extracted
    /// (empty or blank input, or nothing before the first separator).
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let rest = SCHEMES
            .iter()
            .find_map(|scheme| raw.strip_prefix(scheme))
            .unwrap_or(raw);

        let port_sep = rest.find(':');
        let path_sep = rest[port_sep.unwrap_or(0)..]
            .find('/')
            .map(|offset| offset + port_sep.unwrap_or(0));

        let host_end = port_sep.or(path_sep).unwrap_or(rest.len());
        let host = &rest[..host_end];
        if host.is_empty() {
            return Err(Error::invalid_address(format!(
                "no host could be extracted from '{}'",
                raw
            )));
        }

        let port = match port_sep {
            Some(sep) => &rest[sep + 1..path_sep.unwrap_or(rest.len())],
            None => DEFAULT_PORT,
        };

        let path = match path_sep {
            Some(sep) => &rest[sep..],
            None => DEFAULT_PATH,
        };

        Ok(Self::from_parts(host, port, path))
    }

    fn from_parts(host: &str, port: &str, path: &str) -> Self {
        Self {
            host: host.to_string(),
            port: port.to_string(),
            path: path.to_string(),
            full_url: format!("http://{}:{}{}", host, port, path),
            connect_address: format!("{}:{}", host, port),
        }
    }

    /// Host name or IP literal
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Raw port fragment as written (or the default)
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Request path, always starting with `/` unless written otherwise
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `http://host:port/path`
    pub fn full_url(&self) -> &str {
        &self.full_url
    }

    /// `host:port`
    pub fn connect_address(&self) -> &str {
        &self.connect_address
    }

    /// Port fragment as a TCP port number
    ///
    /// Returns `None` for non-numeric, empty, zero or out-of-range fragments.
    pub fn port_number(&self) -> Option<u16> {
        self.port.parse::<u16>().ok().filter(|port| *port != 0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_url)
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
