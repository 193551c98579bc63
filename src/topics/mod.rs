//! Kafka topic requirements and their reconciliation
//!
//! - [`spec`] reads the topics a Pod requires from its annotations
//! - [`reconciler`] converges one topic against the metadata store
//! - [`client`] is the seam to the metadata store, [`zookeeper`] its ZooKeeper implementation

pub mod client;
pub mod reconciler;
pub mod spec;
pub mod zookeeper;

pub use client::{TopicClientError, TopicMetadataClient};
pub use reconciler::{ReconciliationOutcome, TopicReconciler};
pub use spec::{TOPICS_ANNOTATION, TopicSpec, TopicSpecError, parse_topic_list, required_topics};
pub use zookeeper::ZooKeeperTopicClient;
