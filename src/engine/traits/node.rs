// ABOUTME: Cluster node operations for the container engine.
// ABOUTME: Lists nodes with their manager/leader status.

use super::shared_types::NodeInfo;
use async_trait::async_trait;

#[async_trait]
pub trait NodeOps: Send + Sync {
    /// All nodes in the cluster.
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, NodeError>;

    /// The current manager leader.
    async fn leader_node(&self) -> Result<NodeInfo, NodeError> {
        self.list_nodes()
            .await?
            .into_iter()
            .find(|node| node.is_leader)
            .ok_or(NodeError::NoLeader)
    }
}

/// Errors from node operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("cluster has no leader node")]
    NoLeader,

    #[error("engine is not part of a swarm: {0}")]
    NotInCluster(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
