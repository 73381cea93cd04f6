use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use crate::codec::FrameCodec;
use crate::error::{ProtocolError, ProtocolResult};
use crate::message::TransferMessage;

/// One request/reply channel to a peer.
#[async_trait]
pub trait PeerConnection: Send {
    async fn call(&mut self, request: &TransferMessage) -> ProtocolResult<TransferMessage>;

    /// `false` once the channel can no longer be trusted to be in sync.
    fn is_healthy(&self) -> bool;

    /// Called when a call was abandoned mid-flight.
    fn mark_broken(&mut self);
}

/// Opens connections to peers by URI.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(&self, uri: &str) -> ProtocolResult<Box<dyn PeerConnection>>;
}

/// Framed messages over TCP. URIs are `host:port`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpConnector;

#[async_trait]
impl PeerConnector for TcpConnector {
    async fn connect(&self, uri: &str) -> ProtocolResult<Box<dyn PeerConnection>> {
        let stream = TcpStream::connect(uri).await?;
        stream.set_nodelay(true)?;
        debug!(peer = %uri, "connected");
        Ok(Box::new(TcpConnection {
            stream,
            healthy: true,
        }))
    }
}

/// A TCP connection speaking the framed protocol.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    healthy: bool,
}

impl TcpConnection {
    async fn exchange(&mut self, request: &TransferMessage) -> ProtocolResult<TransferMessage> {
        FrameCodec::write_frame(&mut self.stream, request).await?;
        FrameCodec::read_frame(&mut self.stream)
            .await?
            .ok_or(ProtocolError::ConnectionClosed)
    }
}

#[async_trait]
impl PeerConnection for TcpConnection {
    async fn call(&mut self, request: &TransferMessage) -> ProtocolResult<TransferMessage> {
        let reply = self.exchange(request).await;
        if reply.is_err() {
            self.healthy = false;
        }
        reply
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }

    fn mark_broken(&mut self) {
        self.healthy = false;
    }
}
