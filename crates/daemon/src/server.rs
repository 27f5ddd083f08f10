// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP server and connection handling.

use std::sync::Arc;
use std::time::Duration;

use brood_core::bench::Candidate;
use brood_core::{Clock, Coordinator, CoordinatorError};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::protocol::{self, ProtocolError, Request, Response, PROTOCOL_VERSION};

/// Serve requests on one connection until the client hangs up or idles out
pub async fn handle_connection<C: Clock + 'static>(
    coordinator: Arc<Coordinator<Candidate, C>>,
    stream: TcpStream,
    timeout: Duration,
) -> Result<(), ServerError> {
    let peer = stream.peer_addr().ok();
    let (mut reader, mut writer) = stream.into_split();

    loop {
        let request = match protocol::read_request(&mut reader, timeout).await {
            Ok(req) => req,
            Err(ProtocolError::ConnectionClosed) => {
                debug!(?peer, "client disconnected");
                return Ok(());
            }
            Err(ProtocolError::Timeout) => {
                debug!(?peer, "idle connection closed");
                return Ok(());
            }
            Err(e) => return Err(ServerError::Protocol(e)),
        };

        debug!(?peer, request = request.name(), "received request");

        // Job calls may block on an upstream
        let handler = Arc::clone(&coordinator);
        let response = tokio::task::spawn_blocking(move || handle_request(&handler, request))
            .await
            .map_err(|e| ServerError::Handler(e.to_string()))?;

        protocol::write_response(&mut writer, &response, timeout).await?;
    }
}

fn error_response(e: CoordinatorError) -> Response {
    warn!(error = %e, "request rejected");
    Response::Error {
        message: e.to_string(),
    }
}

/// Answer a single request
pub fn handle_request<C: Clock>(coordinator: &Coordinator<Candidate, C>, request: Request) -> Response {
    match request {
        Request::Hello { version } => {
            if version != PROTOCOL_VERSION {
                warn!(client_version = %version, "client speaks a different protocol version");
            }
            Response::Hello {
                version: PROTOCOL_VERSION.to_string(),
            }
        }

        Request::Register { key } => match coordinator.register(&key) {
            Ok(registration) => Response::Registered { registration },
            Err(e) => error_response(e),
        },

        Request::GetTask { client } => match coordinator.get_task(client) {
            Ok(task) => Response::Task { task },
            Err(e) => error_response(e),
        },

        Request::ReturnResult { client, result } => match coordinator.return_result(client, result) {
            Ok(status) => Response::Status { status },
            Err(e) => error_response(e),
        },

        Request::Poll { client } => match coordinator.poll(client) {
            Ok(status) => Response::Status { status },
            Err(e) => error_response(e),
        },

        Request::IsAlive { client } => match coordinator.is_alive(client) {
            Ok(alive) => Response::Alive { alive },
            Err(e) => error_response(e),
        },

        Request::GetInitChunk { client, max_tasks } => {
            match coordinator.get_init_chunk(client, max_tasks) {
                Ok(tasks) => Response::InitChunk { tasks },
                Err(e) => error_response(e),
            }
        }

        Request::GetOptChunk { client, max_tasks } => {
            match coordinator.get_opt_chunk(client, max_tasks) {
                Ok(chunk) => Response::OptChunk { chunk },
                Err(e) => error_response(e),
            }
        }

        Request::SyncPool {
            client,
            individuals,
            max_back,
            chunk_start,
        } => match coordinator.sync_pool(client, individuals, max_back, chunk_start) {
            Ok(individuals) => Response::Pool { individuals },
            Err(e) => error_response(e),
        },

        Request::Status => Response::Summary {
            summary: coordinator.summary(),
        },
    }
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Request handler failed: {0}")]
    Handler(String),
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
