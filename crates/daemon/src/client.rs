// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blocking TCP client for a remote master or proxy

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Mutex;
use std::time::Duration;

use brood_core::bench::Candidate;
use brood_core::{
    ClientId, CoordinatorSummary, IndividualId, JobStatus, OptChunk, Registration, Task,
    TaskResult, TransportError, Upstream,
};
use tracing::debug;

use crate::protocol::{self, ProtocolError, Request, Response, PROTOCOL_VERSION};

/// One persistent connection, re-opened when the server drops it
pub struct RemoteMaster {
    addr: String,
    timeout: Duration,
    conn: Mutex<Option<TcpStream>>,
}

impl RemoteMaster {
    /// Lazily connecting client
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
            conn: Mutex::new(None),
        }
    }

    /// Connect now and check the server speaks our protocol version
    pub fn connect(addr: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Self::new(addr, timeout);
        let version = client.hello()?;
        if version != PROTOCOL_VERSION {
            return Err(TransportError::Protocol(format!(
                "server speaks protocol {}, we speak {}",
                version, PROTOCOL_VERSION
            )));
        }
        Ok(client)
    }

    pub fn hello(&self) -> Result<String, TransportError> {
        match self.call(Request::Hello {
            version: PROTOCOL_VERSION.to_string(),
        })? {
            Response::Hello { version } => Ok(version),
            other => Err(unexpected(other, "hello")),
        }
    }

    pub fn summary(&self) -> Result<CoordinatorSummary, TransportError> {
        match self.call(Request::Status)? {
            Response::Summary { summary } => Ok(summary),
            other => Err(unexpected(other, "status")),
        }
    }

    fn open(&self) -> Result<TcpStream, TransportError> {
        let connect_err = |source| TransportError::Connect {
            addr: self.addr.clone(),
            source,
        };
        let addrs: Vec<SocketAddr> = self
            .addr
            .to_socket_addrs()
            .map_err(connect_err)?
            .collect();

        let mut last = std::io::Error::new(ErrorKind::NotFound, "address resolved to nothing");
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.timeout))?;
                    stream.set_write_timeout(Some(self.timeout))?;
                    stream.set_nodelay(true)?;
                    debug!(%addr, "connected");
                    return Ok(stream);
                }
                Err(e) => last = e,
            }
        }
        Err(connect_err(last))
    }

    fn exchange(stream: &mut TcpStream, body: &[u8]) -> Result<Response, ProtocolError> {
        protocol::write_frame(stream, body)?;
        protocol::decode(&protocol::read_frame(stream)?)
    }

    /// Send one request. A reused connection the server has since closed
    /// is replaced before sending; one that fails mid-exchange is retried
    /// only for requests that are safe to resend.
    fn call(&self, request: Request) -> Result<Response, TransportError> {
        let body = protocol::encode(&request)?;
        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());

        let (mut stream, reused) = match conn.take() {
            Some(stream) if is_open(&stream) => (stream, true),
            Some(_) => {
                debug!(request = request.name(), "server closed the idle connection");
                (self.open()?, false)
            }
            None => (self.open()?, false),
        };

        let response = match Self::exchange(&mut stream, &body) {
            Err(e) if reused && is_stale(&e) && request.is_retry_safe() => {
                debug!(request = request.name(), error = %e, "stale connection, resending");
                stream = self.open()?;
                Self::exchange(&mut stream, &body)?
            }
            other => other?,
        };
        *conn = Some(stream);
        Ok(response)
    }
}

/// Nothing buffered and no EOF pending on an idle connection
fn is_open(stream: &TcpStream) -> bool {
    if stream.set_nonblocking(true).is_err() {
        return false;
    }
    let mut byte = [0u8; 1];
    let idle = matches!(stream.peek(&mut byte), Err(e) if e.kind() == ErrorKind::WouldBlock);
    stream.set_nonblocking(false).is_ok() && idle
}

/// The server closed an idle connection before reading our request
fn is_stale(e: &ProtocolError) -> bool {
    match e {
        ProtocolError::ConnectionClosed => true,
        ProtocolError::Io(e) => matches!(
            e.kind(),
            ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
        ),
        _ => false,
    }
}

fn unexpected(response: Response, call: &'static str) -> TransportError {
    match response {
        Response::Error { message } => TransportError::Rejected(message),
        _ => TransportError::UnexpectedResponse(call),
    }
}

impl Upstream<Candidate> for RemoteMaster {
    fn register(&self, key: &str) -> Result<Registration, TransportError> {
        match self.call(Request::Register {
            key: key.to_string(),
        })? {
            Response::Registered { registration } => Ok(registration),
            other => Err(unexpected(other, "register")),
        }
    }

    fn get_task(&self, client: ClientId) -> Result<Option<Task<Candidate>>, TransportError> {
        match self.call(Request::GetTask { client })? {
            Response::Task { task } => Ok(task),
            other => Err(unexpected(other, "get_task")),
        }
    }

    fn return_result(
        &self,
        client: ClientId,
        result: TaskResult<Candidate>,
    ) -> Result<JobStatus, TransportError> {
        match self.call(Request::ReturnResult { client, result })? {
            Response::Status { status } => Ok(status),
            other => Err(unexpected(other, "return_result")),
        }
    }

    fn poll(&self, client: ClientId) -> Result<JobStatus, TransportError> {
        match self.call(Request::Poll { client })? {
            Response::Status { status } => Ok(status),
            other => Err(unexpected(other, "poll")),
        }
    }

    fn is_alive(&self, client: ClientId) -> Result<bool, TransportError> {
        match self.call(Request::IsAlive { client })? {
            Response::Alive { alive } => Ok(alive),
            other => Err(unexpected(other, "is_alive")),
        }
    }

    fn get_init_chunk(
        &self,
        client: ClientId,
        max_tasks: usize,
    ) -> Result<Vec<Task<Candidate>>, TransportError> {
        match self.call(Request::GetInitChunk { client, max_tasks })? {
            Response::InitChunk { tasks } => Ok(tasks),
            other => Err(unexpected(other, "get_init_chunk")),
        }
    }

    fn get_opt_chunk(&self, client: ClientId, max_tasks: usize) -> Result<OptChunk, TransportError> {
        match self.call(Request::GetOptChunk { client, max_tasks })? {
            Response::OptChunk { chunk } => Ok(chunk),
            other => Err(unexpected(other, "get_opt_chunk")),
        }
    }

    fn sync_pool(
        &self,
        client: ClientId,
        individuals: Vec<Candidate>,
        max_back: usize,
        chunk_start: IndividualId,
    ) -> Result<Vec<Candidate>, TransportError> {
        match self.call(Request::SyncPool {
            client,
            individuals,
            max_back,
            chunk_start,
        })? {
            Response::Pool { individuals } => Ok(individuals),
            other => Err(unexpected(other, "sync_pool")),
        }
    }
}
