// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol between masters, proxies and clients.
//!
//! Every message is a 4-byte big-endian length followed by a JSON body.
//! Connections are persistent; a client sends one request and reads one
//! response, as many times as it likes.

use std::io::{Read, Write};
use std::time::Duration;

use brood_core::bench::Candidate;
use brood_core::{
    ClientId, CoordinatorSummary, IndividualId, JobStatus, OptChunk, Registration, Task,
    TaskResult, TransportError,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version, checked by `Hello`
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default per-frame timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest accepted frame body
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    Hello {
        version: String,
    },
    Register {
        key: String,
    },
    GetTask {
        client: ClientId,
    },
    ReturnResult {
        client: ClientId,
        result: TaskResult<Candidate>,
    },
    Poll {
        client: ClientId,
    },
    IsAlive {
        client: ClientId,
    },
    GetInitChunk {
        client: ClientId,
        max_tasks: usize,
    },
    GetOptChunk {
        client: ClientId,
        max_tasks: usize,
    },
    SyncPool {
        client: ClientId,
        individuals: Vec<Candidate>,
        max_back: usize,
        chunk_start: IndividualId,
    },
    /// Progress and registry counters, for status displays
    Status,
}

impl Request {
    /// Short name for logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Request::Hello { .. } => "hello",
            Request::Register { .. } => "register",
            Request::GetTask { .. } => "get_task",
            Request::ReturnResult { .. } => "return_result",
            Request::Poll { .. } => "poll",
            Request::IsAlive { .. } => "is_alive",
            Request::GetInitChunk { .. } => "get_init_chunk",
            Request::GetOptChunk { .. } => "get_opt_chunk",
            Request::SyncPool { .. } => "sync_pool",
            Request::Status => "status",
        }
    }

    /// Whether the server answers a resend of this request the same way.
    /// Chunk requests reserve new work each time; registration mints an ID.
    pub fn is_retry_safe(&self) -> bool {
        !matches!(
            self,
            Request::Register { .. }
                | Request::GetInitChunk { .. }
                | Request::GetOptChunk { .. }
                | Request::SyncPool { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Hello { version: String },
    Registered { registration: Registration },
    Task { task: Option<Task<Candidate>> },
    Status { status: JobStatus },
    Alive { alive: bool },
    InitChunk { tasks: Vec<Task<Candidate>> },
    OptChunk { chunk: OptChunk },
    Pool { individuals: Vec<Candidate> },
    Summary { summary: CoordinatorSummary },
    Error { message: String },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message of {size} bytes exceeds the {max} byte limit")]
    MessageTooLarge { size: usize, max: usize },

    #[error("timed out")]
    Timeout,

    #[error("connection closed")]
    ConnectionClosed,
}

impl From<ProtocolError> for TransportError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::Io(e) => TransportError::Io(e),
            ProtocolError::Timeout => TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "frame timed out",
            )),
            ProtocolError::ConnectionClosed => TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed",
            )),
            other => TransportError::Protocol(other.to_string()),
        }
    }
}

/// Serialize a message to JSON (no length prefix)
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(message)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn frame_len(prefix: [u8; 4]) -> Result<usize, ProtocolError> {
    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(len)
}

fn frame_prefix(data: &[u8]) -> Result<[u8; 4], ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok((data.len() as u32).to_be_bytes())
}

fn closed_on_eof(e: std::io::Error) -> ProtocolError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        ProtocolError::ConnectionClosed
    } else {
        ProtocolError::Io(e)
    }
}

// ============================================================================
// Async framing (server side)
// ============================================================================

/// Read one length-prefixed message
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix).await.map_err(closed_on_eof)?;
    let mut body = vec![0u8; frame_len(prefix)?];
    reader.read_exact(&mut body).await.map_err(closed_on_eof)?;
    Ok(body)
}

/// Write one length-prefixed message
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    let prefix = frame_prefix(data)?;
    writer.write_all(&prefix).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Request, ProtocolError> {
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let bytes = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &bytes))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

// ============================================================================
// Blocking framing (client side)
// ============================================================================

pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix).map_err(closed_on_eof)?;
    let mut body = vec![0u8; frame_len(prefix)?];
    reader.read_exact(&mut body).map_err(closed_on_eof)?;
    Ok(body)
}

pub fn write_frame<W: Write>(writer: &mut W, data: &[u8]) -> Result<(), ProtocolError> {
    let prefix = frame_prefix(data)?;
    writer.write_all(&prefix)?;
    writer.write_all(data)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
