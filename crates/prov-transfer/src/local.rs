//! In-process transport: peers addressed by name, served by a local
//! [`Responder`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use prov_protocol::{
    CallContext, FrameCodec, PeerConnection, PeerConnector, ProtocolError, ProtocolResult,
    TransferMessage,
};

use crate::responder::Responder;

/// Routes connections to responders living in the same process.
///
/// Messages still go through the frame codec, so anything that would not
/// survive the wire fails here too.
#[derive(Default)]
pub struct LocalConnector {
    routes: RwLock<HashMap<String, Arc<Responder>>>,
}

impl LocalConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `responder` reachable at `uri`, replacing any earlier route.
    pub fn register(&self, uri: impl Into<String>, responder: Arc<Responder>) {
        if let Ok(mut routes) = self.routes.write() {
            routes.insert(uri.into(), responder);
        }
    }

    fn route(&self, uri: &str) -> Option<Arc<Responder>> {
        self.routes.read().ok()?.get(uri).cloned()
    }
}

#[async_trait]
impl PeerConnector for LocalConnector {
    async fn connect(&self, uri: &str) -> ProtocolResult<Box<dyn PeerConnection>> {
        let responder = self
            .route(uri)
            .ok_or_else(|| ProtocolError::UnknownPeer(uri.to_string()))?;
        Ok(Box::new(LocalConnection {
            responder,
            healthy: true,
        }))
    }
}

struct LocalConnection {
    responder: Arc<Responder>,
    healthy: bool,
}

#[async_trait]
impl PeerConnection for LocalConnection {
    async fn call(&mut self, request: &TransferMessage) -> ProtocolResult<TransferMessage> {
        let (request, _) = FrameCodec::decode(&FrameCodec::encode(request)?)?;
        let reply = self.responder.handle(&CallContext::background(), request).await;
        let (reply, _) = FrameCodec::decode(&FrameCodec::encode(&reply)?)?;
        Ok(reply)
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }

    fn mark_broken(&mut self) {
        self.healthy = false;
    }
}
