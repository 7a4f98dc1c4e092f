// src/server/mod.rs - TCP command server for the blind
//!
//! Every connection carries exactly one request. The server reads it, answers
//! and closes the connection itself; clients reconnect for the next request.

pub mod protocol;

pub use protocol::{parse_request, ProtocolError, Reply, Request, MAX_REQUEST_BYTES};

use crate::config::ServerConfig;
use crate::motion::BlindHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct CommandServer {
    listener: TcpListener,
    blind: BlindHandle,
    read_timeout: Duration,
    shutdown_grace: Duration,
    permits: Arc<Semaphore>,
}

impl CommandServer {
    pub async fn bind(config: &ServerConfig, blind: BlindHandle) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind).await?;
        tracing::info!("Command server listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            blind,
            read_timeout: config.read_timeout(),
            shutdown_grace: config.shutdown_grace(),
            permits: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` fires, then give in-flight
    /// handlers the grace period before aborting them.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let CommandServer {
            listener,
            blind,
            read_timeout,
            shutdown_grace,
            permits,
        } = self;
        let mut handlers = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Command server shutting down");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let blind = blind.clone();
                        let permits = permits.clone();
                        handlers.spawn(async move {
                            // bounds how many requests are served at once
                            let Ok(_permit) = permits.acquire_owned().await else {
                                return;
                            };
                            tracing::debug!("Connection from {}", peer);
                            if let Err(e) = handle_connection(stream, peer, &blind, read_timeout).await {
                                tracing::warn!("Connection from {} failed: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => tracing::warn!("Failed to accept connection: {}", e),
                },
                Some(finished) = handlers.join_next(), if !handlers.is_empty() => {
                    if let Err(e) = finished {
                        tracing::error!("Connection handler panicked: {}", e);
                    }
                }
            }
        }
        drop(listener);

        let drain = async {
            while let Some(finished) = handlers.join_next().await {
                if let Err(e) = finished {
                    tracing::error!("Connection handler panicked: {}", e);
                }
            }
        };
        if tokio::time::timeout(shutdown_grace, drain).await.is_err() {
            tracing::warn!("Aborting {} connection handler(s) still running", handlers.len());
            handlers.shutdown().await;
        }
        tracing::info!("Command server stopped");
        Ok(())
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    blind: &BlindHandle,
    read_timeout: Duration,
) -> Result<(), ServerError> {
    let mut buf = vec![0u8; MAX_REQUEST_BYTES];
    let request = match tokio::time::timeout(read_timeout, stream.read(&mut buf)).await {
        Ok(read) => parse_request(&buf[..read?]),
        Err(_) => Err(ProtocolError::Timeout),
    };

    let reply = respond(blind, request);
    tracing::info!("{} -> {}", peer, reply.to_wire());
    stream.write_all(reply.to_wire().as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Decide the reply to one request, forwarding new instructions to the blind.
pub fn respond(blind: &BlindHandle, request: Result<Request, ProtocolError>) -> Reply {
    match request {
        Err(e) => {
            tracing::debug!("Bad request: {}", e);
            Reply::BadRequest
        }
        Ok(Request::Status) => Reply::Status(blind.current_instruction_value()),
        Ok(Request::Instruct(command)) => match blind.instruct_if_changed(command) {
            Some(_) => Reply::Accepted,
            None => {
                tracing::debug!("Already doing '{}'", command);
                Reply::NotModified
            }
        },
    }
}
