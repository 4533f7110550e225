// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Listen endpoints.
//!
//! An [`Endpoint`] is either a TCP host/port pair or a UNIX domain socket
//! path. [`Endpoint::parse`] reads the `--listen` URI grammar:
//!
//! ```text
//! tcp://host:port
//! http://host:port
//! unix:/path/to/socket       unix:///path/to/socket
//! ```
//!
//! All validation happens here, before anything touches the network.

use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Host used when none is given.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Port used when neither flags, `PORT` nor configuration provide one.
pub const DEFAULT_PORT: u16 = 3000;

/// Where a server listens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// TCP socket.
    Tcp {
        /// Host name or IP literal, without brackets.
        host: String,
        /// Port in 1..=65535, or 0 once resolved to "any free port".
        port: u16,
    },
    /// UNIX domain socket.
    Unix {
        /// Socket file path.
        path: PathBuf,
    },
}

impl Endpoint {
    /// A TCP endpoint.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Endpoint::Tcp {
            host: host.into(),
            port,
        }
    }

    /// A UNIX socket endpoint.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Endpoint::Unix { path: path.into() }
    }

    /// Parses a `--listen` URI. A TCP URI without a port gets
    /// `default_port`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownScheme`] for schemes other than tcp, http and unix;
    /// [`Error::InvalidPort`] for a bad port; [`Error::Config`] for
    /// anything malformed.
    pub fn parse(uri: &str, default_port: u16) -> Result<Self> {
        let uri = uri.trim();
        let (scheme, rest) = uri
            .split_once(':')
            .ok_or_else(|| Error::Config(format!("Invalid --listen endpoint: {}", uri)))?;

        let valid_scheme = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid_scheme {
            return Err(Error::Config(format!("Invalid --listen endpoint: {}", uri)));
        }

        match scheme.to_ascii_lowercase().as_str() {
            "unix" => parse_unix(uri, rest),
            "tcp" | "http" => parse_tcp(uri, rest, default_port),
            other => Err(Error::UnknownScheme(format!("{}:", other))),
        }
    }

    /// Whether this is a UNIX socket endpoint.
    pub fn is_unix(&self) -> bool {
        matches!(self, Endpoint::Unix { .. })
    }

    /// The TCP port, if any.
    pub fn port(&self) -> Option<u16> {
        match self {
            Endpoint::Tcp { port, .. } => Some(*port),
            Endpoint::Unix { .. } => None,
        }
    }

    /// Same endpoint on a different port. UNIX endpoints are unchanged.
    pub fn with_port(&self, port: u16) -> Self {
        match self {
            Endpoint::Tcp { host, .. } => Endpoint::tcp(host.clone(), port),
            unix => unix.clone(),
        }
    }

    /// `host:port` in socket-address form (IPv6 hosts bracketed).
    pub fn authority(&self) -> Option<String> {
        match self {
            Endpoint::Tcp { host, port } if host.contains(':') => {
                Some(format!("[{}]:{}", host, port))
            }
            Endpoint::Tcp { host, port } => Some(format!("{}:{}", host, port)),
            Endpoint::Unix { .. } => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { .. } => {
                write!(f, "http://{}", self.authority().unwrap_or_default())
            }
            Endpoint::Unix { path } => write!(f, "unix:{}", path.display()),
        }
    }
}

fn parse_unix(uri: &str, rest: &str) -> Result<Endpoint> {
    let rest = strip_query(rest);
    let path = match rest.strip_prefix("//") {
        // unix://host/path keeps only the path
        Some(after) => after.find('/').map(|i| &after[i..]).unwrap_or(""),
        None => rest,
    };
    if path.is_empty() {
        return Err(Error::Config(format!(
            "UNIX socket endpoint has no path: {}",
            uri
        )));
    }
    Ok(Endpoint::unix(path))
}

fn parse_tcp(uri: &str, rest: &str, default_port: u16) -> Result<Endpoint> {
    let authority = rest
        .strip_prefix("//")
        .ok_or_else(|| Error::Config(format!("Invalid --listen endpoint: {}", uri)))?;
    let authority = authority
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    // Drop userinfo
    let authority = authority.rsplit('@').next().unwrap_or_default();

    let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, after) = bracketed
            .split_once(']')
            .ok_or_else(|| Error::Config(format!("Invalid IPv6 host in endpoint: {}", uri)))?;
        let port = match after {
            "" => None,
            p => Some(p.strip_prefix(':').ok_or_else(|| {
                Error::Config(format!("Invalid --listen endpoint: {}", uri))
            })?),
        };
        (host, port)
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    if host.is_empty() {
        return Err(Error::Config(format!(
            "TCP endpoint has no host: {}",
            uri
        )));
    }

    let port = match port {
        Some(p) if !p.is_empty() => validate_port(p)?,
        _ => default_port,
    };
    Ok(Endpoint::tcp(host, port))
}

fn strip_query(s: &str) -> &str {
    s.split(['?', '#']).next().unwrap_or_default()
}

/// Validates a user-supplied port: an integer in 1..=65535.
pub fn validate_port(value: &str) -> Result<u16> {
    let trimmed = value.trim();
    match trimmed.parse::<u32>() {
        Ok(port) if (1..=65535).contains(&port) => Ok(port as u16),
        _ => Err(Error::InvalidPort(value.to_string())),
    }
}

/// Combines `--host`, `--port` and `--listen` into one endpoint.
///
/// `--listen` excludes both `--host` and `--port`; supplying them together
/// fails with [`Error::ConflictingOptions`].
pub fn resolve_endpoint(
    host: Option<&str>,
    port: Option<&str>,
    listen: Option<&str>,
    default_port: u16,
) -> Result<Endpoint> {
    if listen.is_some() && (host.is_some() || port.is_some()) {
        return Err(Error::ConflictingOptions(
            "Both host/port and listen provided. You can only use one.".into(),
        ));
    }

    if let Some(listen) = listen {
        return Endpoint::parse(listen, default_port);
    }

    let port = match port {
        Some(p) => validate_port(p)?,
        None => default_port,
    };
    let host = match host {
        Some(h) if !h.trim().is_empty() => h.trim(),
        _ => DEFAULT_HOST,
    };
    Ok(Endpoint::tcp(host, port))
}
