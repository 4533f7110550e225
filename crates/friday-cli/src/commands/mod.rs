// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! - `start`: Serve the built application (default command)
//! - `build`: Compile the source tree, optionally keep watching
//! - `dev`: Build, serve and restart on change
//! - `lint`: Type-check and lint once

use friday::endpoint::{resolve_endpoint, Endpoint};

use crate::cli::ListenArgs;
use crate::config::{self, Config};

/// Build command.
pub mod build;
/// Development server command.
pub mod dev;
/// Lint command.
pub mod lint;
/// Production server command.
pub mod start;

/// Resolves the listen endpoint for `start` and `dev`.
///
/// `port_env` is the raw `PORT` value. It is only read, and only has to be
/// valid, when neither `--port` nor an endpoint URI was given. A configured
/// host applies only when neither `--host` nor an endpoint URI was given.
pub fn endpoint_for(
    args: &ListenArgs,
    config: &Config,
    port_env: Option<&str>,
) -> friday::Result<Endpoint> {
    let default_port = if args.overrides_port() {
        config.dev.port
    } else {
        config::port_from(port_env)?.unwrap_or(config.dev.port)
    };

    let listen = args.listen_uri();
    let endpoint = resolve_endpoint(
        args.host.as_deref(),
        args.port.as_deref(),
        listen.as_deref(),
        default_port,
    )?;

    match endpoint {
        Endpoint::Tcp { port, .. } if args.host.is_none() && listen.is_none() => {
            Ok(Endpoint::tcp(&config.dev.host, port))
        }
        other => Ok(other),
    }
}
