//! Timeout enforcement for outbound TCP dials.

use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::time;

use crate::error::LbError;

/// Connect to `address`, failing after `timeout`.
pub async fn connect(address: &str, timeout: Duration) -> Result<TcpStream, LbError> {
    match time::timeout(timeout, TcpStream::connect(address)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(LbError::Dial {
            address: address.to_string(),
            source,
        }),
        Err(_) => Err(LbError::DialTimeout {
            address: address.to_string(),
            timeout,
        }),
    }
}

/// Connect and measure how long the handshake took.
pub async fn timed_connect(address: &str, timeout: Duration) -> Result<(TcpStream, Duration), LbError> {
    let start = Instant::now();
    let stream = connect(address, timeout).await?;
    Ok((stream, start.elapsed()))
}
