// src/client.rs - Client side of the command protocol, used by remotes and sensors
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no reply within {0:?}")]
    Timeout(Duration),
}

/// Send one payload on a fresh connection and return the server's reply.
pub async fn send_instruction(
    addr: impl ToSocketAddrs,
    payload: &str,
    timeout: Duration,
) -> Result<String, ClientError> {
    let exchange = async {
        let mut stream = TcpStream::connect(addr).await?;
        stream.write_all(payload.as_bytes()).await?;
        stream.shutdown().await?;

        let mut reply = String::new();
        stream.read_to_string(&mut reply).await?;
        Ok::<_, std::io::Error>(reply)
    };

    let reply = tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| ClientError::Timeout(timeout))??;
    tracing::debug!("Sent '{}', got '{}'", payload, reply);
    Ok(reply)
}
