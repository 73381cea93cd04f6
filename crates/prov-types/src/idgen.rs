use crate::id::NodeId;

/// Source of fresh, globally unique node ids.
pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> NodeId;
}

/// Produces `<graph_name>:<uuid-v4>` ids.
#[derive(Clone, Debug)]
pub struct UuidIdGenerator {
    graph_name: String,
}

impl UuidIdGenerator {
    pub fn new(graph_name: impl Into<String>) -> Self {
        Self {
            graph_name: graph_name.into(),
        }
    }

    pub fn graph_name(&self) -> &str {
        &self.graph_name
    }
}

impl IdGenerator for UuidIdGenerator {
    fn new_id(&self) -> NodeId {
        NodeId::qualified(&self.graph_name, uuid::Uuid::new_v4())
    }
}
