use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::context::{CallContext, DeadlineMutex};
use crate::error::{ProtocolError, ProtocolResult};
use crate::message::TransferMessage;
use crate::transport::{PeerConnection, PeerConnector};

type IdleConnections = HashMap<String, Vec<Box<dyn PeerConnection>>>;

/// Idle connections per peer URI.
///
/// A checked-out connection belongs exclusively to its caller until it is
/// checked back in. Unhealthy connections are dropped on check-in.
pub struct ConnectionPool {
    connector: Arc<dyn PeerConnector>,
    idle: DeadlineMutex<IdleConnections>,
    max_idle_per_peer: usize,
}

impl ConnectionPool {
    pub fn new(connector: Arc<dyn PeerConnector>, max_idle_per_peer: usize) -> Self {
        Self {
            connector,
            idle: DeadlineMutex::new(HashMap::new()),
            max_idle_per_peer,
        }
    }

    /// Reuse an idle healthy connection or dial a new one.
    pub async fn checkout(&self, ctx: &CallContext, uri: &str) -> ProtocolResult<Box<dyn PeerConnection>> {
        {
            let mut idle = self.idle.lock(ctx).await.map_err(ProtocolError::Deadline)?;
            if let Some(conns) = idle.get_mut(uri) {
                while let Some(conn) = conns.pop() {
                    if conn.is_healthy() {
                        return Ok(conn);
                    }
                }
            }
        }
        ctx.run(self.connector.connect(uri))
            .await
            .map_err(ProtocolError::Deadline)?
    }

    /// Return a connection. If the pool lock cannot be taken before `ctx`
    /// ends, the connection is closed instead.
    pub async fn checkin(&self, ctx: &CallContext, uri: &str, conn: Box<dyn PeerConnection>) {
        if !conn.is_healthy() {
            debug!(peer = %uri, "discarding broken connection");
            return;
        }
        match self.idle.lock(ctx).await {
            Ok(mut idle) => {
                let slot = idle.entry(uri.to_string()).or_default();
                if slot.len() < self.max_idle_per_peer {
                    slot.push(conn);
                }
            }
            Err(reason) => debug!(peer = %uri, %reason, "closing connection instead of pooling"),
        }
    }

    /// Send one request on `conn`, bounded by `ctx`.
    ///
    /// An interrupted call leaves the connection out of sync, so it is
    /// marked broken and the error is `Interrupted`.
    pub async fn call_on(
        ctx: &CallContext,
        conn: &mut dyn PeerConnection,
        request: &TransferMessage,
    ) -> ProtocolResult<TransferMessage> {
        let outcome = ctx.run(conn.call(request)).await;
        match outcome {
            Ok(reply) => reply,
            Err(reason) => {
                conn.mark_broken();
                Err(ProtocolError::Interrupted(reason))
            }
        }
    }

    /// Checkout, call, and always check the connection back in.
    pub async fn call(
        &self,
        ctx: &CallContext,
        uri: &str,
        request: &TransferMessage,
    ) -> ProtocolResult<TransferMessage> {
        let mut conn = self.checkout(ctx, uri).await?;
        let reply = Self::call_on(ctx, conn.as_mut(), request).await;
        self.checkin(ctx, uri, conn).await;
        reply
    }

    /// Idle connections currently pooled for `uri`.
    pub async fn idle_count(&self, ctx: &CallContext, uri: &str) -> ProtocolResult<usize> {
        let idle = self.idle.lock(ctx).await.map_err(ProtocolError::Deadline)?;
        Ok(idle.get(uri).map_or(0, Vec::len))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use prov_types::ErrorKind;

    use super::*;
    use crate::message::AcceptAssetReply;

    struct Echo {
        healthy: bool,
        stall: bool,
    }

    #[async_trait]
    impl PeerConnection for Echo {
        async fn call(&mut self, _request: &TransferMessage) -> ProtocolResult<TransferMessage> {
            if self.stall {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(TransferMessage::AcceptAssetReply(AcceptAssetReply { error: None }))
        }

        fn is_healthy(&self) -> bool {
            self.healthy
        }

        fn mark_broken(&mut self) {
            self.healthy = false;
        }
    }

    #[derive(Default)]
    struct CountingConnector {
        dials: AtomicUsize,
        stall: bool,
    }

    #[async_trait]
    impl PeerConnector for CountingConnector {
        async fn connect(&self, _uri: &str) -> ProtocolResult<Box<dyn PeerConnection>> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(Echo {
                healthy: true,
                stall: self.stall,
            }))
        }
    }

    fn ping() -> TransferMessage {
        TransferMessage::AcceptAssetReply(AcceptAssetReply { error: None })
    }

    #[tokio::test]
    async fn connections_are_reused() {
        let connector = Arc::new(CountingConnector::default());
        let pool = ConnectionPool::new(connector.clone(), 4);
        let ctx = CallContext::with_timeout(Duration::from_secs(5));

        pool.call(&ctx, "peer", &ping()).await.unwrap();
        pool.call(&ctx, "peer", &ping()).await.unwrap();
        assert_eq!(connector.dials.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count(&ctx, "peer").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn interrupted_call_discards_connection() {
        let connector = Arc::new(CountingConnector {
            stall: true,
            ..Default::default()
        });
        let pool = ConnectionPool::new(connector.clone(), 4);

        let ctx = CallContext::with_timeout(Duration::from_millis(30));
        let err = pool.call(&ctx, "peer", &ping()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutcomeUnknown);

        let ctx = CallContext::with_timeout(Duration::from_secs(5));
        assert_eq!(pool.idle_count(&ctx, "peer").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn expired_context_fails_before_dialing() {
        let connector = Arc::new(CountingConnector::default());
        let pool = ConnectionPool::new(connector.clone(), 4);
        let ctx = CallContext::background();
        ctx.cancel();

        let err = pool.call(&ctx, "peer", &ping()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);
        assert_eq!(connector.dials.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn idle_list_is_bounded() {
        let connector = Arc::new(CountingConnector::default());
        let pool = ConnectionPool::new(connector.clone(), 1);
        let ctx = CallContext::with_timeout(Duration::from_secs(5));

        let a = pool.checkout(&ctx, "peer").await.unwrap();
        let b = pool.checkout(&ctx, "peer").await.unwrap();
        pool.checkin(&ctx, "peer", a).await;
        pool.checkin(&ctx, "peer", b).await;
        assert_eq!(pool.idle_count(&ctx, "peer").await.unwrap(), 1);
    }
}
