use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;

use crate::error::FlushError;

/// A connection to the metrics collector, open for one flush cycle.
pub type SinkStream = Box<dyn AsyncWrite + Send + Unpin>;

/// Where flushed metric lines are written.
#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Open a fresh connection.
    async fn connect(&self) -> Result<SinkStream, FlushError>;

    /// Human readable destination, for logs and errors.
    fn address(&self) -> &str;
}

/// Graphite plaintext listener reached over TCP.
pub struct GraphiteSink {
    addr: String,
    connect_timeout: Duration,
}

impl GraphiteSink {
    pub fn new(addr: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl MetricSink for GraphiteSink {
    async fn connect(&self) -> Result<SinkStream, FlushError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| FlushError::Timeout {
                addr: self.addr.clone(),
                timeout: self.connect_timeout,
            })?
            .map_err(|source| FlushError::Connect {
                addr: self.addr.clone(),
                source,
            })?;
        stream.set_nodelay(true).ok();
        Ok(Box::new(stream))
    }

    fn address(&self) -> &str {
        &self.addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_and_writes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let sink = GraphiteSink::new(addr.clone(), Duration::from_secs(5));
        assert_eq!(sink.address(), addr);

        let mut stream = sink.connect().await.unwrap();
        let (mut peer, _) = listener.accept().await.unwrap();
        stream.write_all(b"a.b 1 60\n").await.unwrap();
        stream.shutdown().await.unwrap();
        drop(stream);

        let mut received = String::new();
        peer.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "a.b 1 60\n");
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let sink = GraphiteSink::new(addr, Duration::from_secs(5));

        assert!(matches!(
            sink.connect().await,
            Err(FlushError::Connect { .. })
        ));
    }
}
