//! Access to the broker's topic metadata

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a topic metadata backend
#[derive(Debug, Error)]
pub enum TopicClientError {
    #[error("ZooKeeper error: {0}")]
    ZooKeeper(#[from] zookeeper_client::Error),

    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: zookeeper_client::Error,
    },

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid topic name '{name}': {reason}")]
    InvalidTopicName { name: String, reason: String },

    #[error("no live brokers registered")]
    NoBrokers,

    #[error("replication factor {replicas} larger than available brokers {brokers}")]
    InsufficientBrokers { replicas: i32, brokers: usize },

    #[error(
        "assignment of {partitions} partitions x {replicas} replicas needs up to {bytes} bytes, \
         ZooKeeper nodes hold at most {limit}"
    )]
    AssignmentTooLarge {
        partitions: i32,
        replicas: i32,
        bytes: u64,
        limit: u64,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Query and create topics in the broker's metadata store
///
/// Implementations own connection handling and timeouts; callers issue each
/// request once and never retry.
#[async_trait]
pub trait TopicMetadataClient: Send + Sync {
    /// Check whether a topic with the given name exists
    async fn exists(&self, name: &str) -> Result<bool, TopicClientError>;

    /// Create a topic with the given layout and configuration overrides
    async fn create(
        &self,
        name: &str,
        partitions: i32,
        replicas: i32,
        config: &BTreeMap<String, String>,
    ) -> Result<(), TopicClientError>;
}
