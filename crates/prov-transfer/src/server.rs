use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use prov_protocol::{CallContext, FrameCodec, ProtocolError, ProtocolResult, TransferMessage, WireError};
use prov_types::ErrorKind;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TransferResult;
use crate::responder::Responder;

/// Serves a [`Responder`] over framed TCP.
///
/// Each connection gets its own task and may carry any number of
/// request/reply exchanges. Every request runs under `request_timeout`.
pub struct TransferServer {
    listener: TcpListener,
    responder: Arc<Responder>,
    request_timeout: Duration,
}

impl TransferServer {
    pub async fn bind(addr: SocketAddr, responder: Arc<Responder>, request_timeout: Duration) -> TransferResult<Self> {
        let listener = TcpListener::bind(addr).await.map_err(ProtocolError::from)?;
        Ok(Self {
            listener,
            responder,
            request_timeout,
        })
    }

    /// The bound address; useful after binding port 0.
    pub fn local_addr(&self) -> TransferResult<SocketAddr> {
        Ok(self.listener.local_addr().map_err(ProtocolError::from)?)
    }

    /// Accept connections until `shutdown` is cancelled.
    pub async fn serve(self, shutdown: CancellationToken) -> TransferResult<()> {
        info!(addr = %self.local_addr()?, "transfer responder listening");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("transfer responder shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (socket, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(err) => {
                            warn!(error = %err, "accept failed");
                            continue;
                        }
                    };
                    let responder = Arc::clone(&self.responder);
                    let timeout = self.request_timeout;
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        match serve_connection(socket, responder, timeout, shutdown).await {
                            Ok(()) => debug!(%peer, "connection closed"),
                            Err(err) => debug!(%peer, error = %err, "connection dropped"),
                        }
                    });
                }
            }
        }
    }
}

async fn serve_connection(
    mut socket: TcpStream,
    responder: Arc<Responder>,
    request_timeout: Duration,
    shutdown: CancellationToken,
) -> ProtocolResult<()> {
    socket.set_nodelay(true)?;
    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            frame = FrameCodec::read_frame(&mut socket) => frame,
        };
        let request = match frame {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(err @ (ProtocolError::Deserialization(_) | ProtocolError::InvalidMessageType(_))) => {
                // The frame was read whole, so the stream is still in sync.
                warn!(error = %err, "undecodable request");
                let reply = TransferMessage::Error(WireError::from_kind(ErrorKind::InvalidArgument, err.to_string()));
                FrameCodec::write_frame(&mut socket, &reply).await?;
                continue;
            }
            Err(err) => return Err(err),
        };
        let ctx = CallContext::with_timeout(request_timeout);
        let reply = responder.handle(&ctx, request).await;
        FrameCodec::write_frame(&mut socket, &reply).await?;
    }
}

#[cfg(test)]
mod tests {
    use prov_protocol::{AcceptAssetMsg, ConnectionPool, TcpConnector};
    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::responder::ResponderOptions;

    fn reject(ack: &str) -> TransferMessage {
        TransferMessage::AcceptAsset(AcceptAssetMsg {
            ack_id: ack.into(),
            accepted: false,
            message: "no".into(),
            new_id: String::new(),
            new_secret: String::new(),
            old_id: String::new(),
            old_secret: String::new(),
        })
    }

    async fn start() -> (SocketAddr, CancellationToken, tokio::task::JoinHandle<TransferResult<()>>) {
        let responder = Arc::new(Responder::from_options(ResponderOptions::default()));
        let server = TransferServer::bind(
            SocketAddr::from(([127, 0, 0, 1], 0)),
            responder,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(server.serve(shutdown.clone()));
        (addr, shutdown, task)
    }

    #[tokio::test]
    async fn serves_several_requests_per_connection() {
        let (addr, shutdown, task) = start().await;
        let pool = ConnectionPool::new(Arc::new(TcpConnector), 1);
        let ctx = CallContext::with_timeout(Duration::from_secs(5));
        let uri = addr.to_string();

        for ack in ["a", "b", "c"] {
            let reply = pool.call(&ctx, &uri, &reject(ack)).await.unwrap();
            assert!(matches!(reply, TransferMessage::AcceptAssetReply(r) if r.error.is_none()));
        }
        assert_eq!(pool.idle_count(&ctx, &uri).await.unwrap(), 1);

        shutdown.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn undecodable_frame_gets_an_error_reply() {
        let (addr, shutdown, _task) = start().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        // Well-formed frame header, tag 3, garbage payload.
        stream.write_all(&[0, 0, 0, 2, 3, 0xff]).await.unwrap();
        let reply = FrameCodec::read_frame(&mut stream).await.unwrap().unwrap();
        assert!(matches!(reply, TransferMessage::Error(_)));
        shutdown.cancel();
    }
}
