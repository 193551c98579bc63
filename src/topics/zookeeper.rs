//! ZooKeeper-backed topic metadata client
//!
//! Topics are managed through Kafka's ZooKeeper layout:
//! - `/brokers/ids/<id>` - live brokers
//! - `/brokers/topics/<name>` - partition to replica assignment
//! - `/config/topics/<name>` - topic-level configuration overrides
//!
//! Each operation opens its own session and is bounded by the configured timeout.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};
use zookeeper_client as zk;

use super::client::{TopicClientError, TopicMetadataClient};
use crate::config::WebhookConfig;

const BROKER_IDS_PATH: &str = "/brokers/ids";
const BROKER_TOPICS_PATH: &str = "/brokers/topics";
const TOPIC_CONFIG_PATH: &str = "/config/topics";

/// Longest topic name Kafka accepts
const MAX_TOPIC_NAME_LENGTH: usize = 249;

/// Default `jute.maxbuffer`, the largest payload a ZooKeeper node accepts
pub const MAX_NODE_BYTES: u64 = 0xfffff;

/// `{"version":1,"partitions":{}}`
const ASSIGNMENT_ENVELOPE_BYTES: u64 = 29;

/// Payload of `/config/topics/<name>`
#[derive(Serialize)]
struct TopicConfigNode<'a> {
    version: u8,
    config: &'a BTreeMap<String, String>,
}

/// Payload of `/brokers/topics/<name>`
#[derive(Serialize)]
struct PartitionAssignmentNode {
    version: u8,
    partitions: BTreeMap<String, Vec<i32>>,
}

/// Topic metadata client speaking to the Kafka cluster's ZooKeeper ensemble
#[derive(Clone, Debug)]
pub struct ZooKeeperTopicClient {
    address: String,
    timeout: Duration,
}

impl ZooKeeperTopicClient {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    pub fn from_config(config: &WebhookConfig) -> Self {
        Self::new(config.zookeeper_url.clone(), config.zookeeper_timeout)
    }

    async fn session(&self) -> Result<zk::Client, TopicClientError> {
        zk::Client::connect(&self.address)
            .await
            .map_err(|source| TopicClientError::Connect {
                address: self.address.clone(),
                source,
            })
    }

    /// Run an operation under the configured timeout
    async fn bounded<T, F>(&self, operation: F) -> Result<T, TopicClientError>
    where
        F: Future<Output = Result<T, TopicClientError>>,
    {
        tokio::time::timeout(self.timeout, operation)
            .await
            .map_err(|_| TopicClientError::Timeout(self.timeout))?
    }

    async fn live_brokers(client: &zk::Client) -> Result<Vec<i32>, TopicClientError> {
        let children = match client.list_children(BROKER_IDS_PATH).await {
            Ok(children) => children,
            Err(zk::Error::NoNode) => return Err(TopicClientError::NoBrokers),
            Err(e) => return Err(e.into()),
        };

        let mut brokers: Vec<i32> = children
            .iter()
            .filter_map(|id| match id.parse::<i32>() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(node = %id, "Ignoring broker registration with non-numeric id");
                    None
                }
            })
            .collect();
        brokers.sort_unstable();
        Ok(brokers)
    }

    async fn write_topic_config(
        client: &zk::Client,
        name: &str,
        config: &BTreeMap<String, String>,
    ) -> Result<(), TopicClientError> {
        let path = format!("{}/{}", TOPIC_CONFIG_PATH, name);
        let data = serde_json::to_vec(&TopicConfigNode { version: 1, config })?;
        let options = zk::CreateMode::Persistent.with_acls(zk::Acls::anyone_all());

        match client.create(&path, &data, &options).await {
            Ok(_) => Ok(()),
            Err(zk::Error::NodeExists) => {
                // Left behind by an earlier deletion or a concurrent creation
                debug!(path = %path, "Topic config node exists, overwriting");
                client.set_data(&path, &data, None).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create_topic(
        &self,
        name: &str,
        partitions: i32,
        replicas: i32,
        config: &BTreeMap<String, String>,
    ) -> Result<(), TopicClientError> {
        validate_topic_name(name)?;

        let client = self.session().await?;
        let brokers = Self::live_brokers(&client).await?;
        check_assignment(&brokers, partitions, replicas)?;

        let (start_index, replica_shift) = {
            let mut rng = rand::rng();
            (
                rng.random_range(0..brokers.len()),
                rng.random_range(0..brokers.len()),
            )
        };
        let assignment =
            assign_replicas(&brokers, partitions, replicas, start_index, replica_shift);

        Self::write_topic_config(&client, name, config).await?;

        let path = format!("{}/{}", BROKER_TOPICS_PATH, name);
        let data = serde_json::to_vec(&PartitionAssignmentNode {
            version: 1,
            partitions: assignment
                .into_iter()
                .enumerate()
                .map(|(partition, replicas)| (partition.to_string(), replicas))
                .collect(),
        })?;
        let options = zk::CreateMode::Persistent.with_acls(zk::Acls::anyone_all());

        match client.create(&path, &data, &options).await {
            Ok(_) => {
                info!(
                    topic = %name,
                    partitions,
                    replicas,
                    brokers = ?brokers,
                    "Wrote topic partition assignment"
                );
                Ok(())
            }
            Err(zk::Error::NodeExists) => {
                info!(topic = %name, "Topic was created concurrently");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl TopicMetadataClient for ZooKeeperTopicClient {
    async fn exists(&self, name: &str) -> Result<bool, TopicClientError> {
        // A name with '/' would resolve to a child of another topic's node
        validate_topic_name(name)?;

        self.bounded(async {
            let client = self.session().await?;
            let path = format!("{}/{}", BROKER_TOPICS_PATH, name);
            let stat = client.check_stat(&path).await?;
            Ok(stat.is_some())
        })
        .await
    }

    async fn create(
        &self,
        name: &str,
        partitions: i32,
        replicas: i32,
        config: &BTreeMap<String, String>,
    ) -> Result<(), TopicClientError> {
        self.bounded(self.create_topic(name, partitions, replicas, config))
            .await
    }
}

/// Check a topic name against Kafka's naming rules
pub fn validate_topic_name(name: &str) -> Result<(), TopicClientError> {
    let invalid = |reason: &str| TopicClientError::InvalidTopicName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name == "." || name == ".." {
        return Err(invalid("'.' and '..' are reserved"));
    }
    if name.len() > MAX_TOPIC_NAME_LENGTH {
        return Err(invalid(&format!(
            "longer than {} characters",
            MAX_TOPIC_NAME_LENGTH
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(invalid(&format!(
            "character '{}' is not allowed, use [a-zA-Z0-9._-]",
            c
        )));
    }
    Ok(())
}

/// Check that a topic layout can be placed on the live brokers and stored in ZooKeeper
///
/// Runs before any assignment is built, so oversized requests never allocate.
pub fn check_assignment(
    brokers: &[i32],
    partitions: i32,
    replicas: i32,
) -> Result<(), TopicClientError> {
    if brokers.is_empty() {
        return Err(TopicClientError::NoBrokers);
    }
    if usize::try_from(replicas).map_or(true, |r| r < 1 || r > brokers.len()) {
        return Err(TopicClientError::InsufficientBrokers {
            replicas,
            brokers: brokers.len(),
        });
    }

    let bytes = assignment_size_bound(brokers, partitions, replicas);
    if bytes > MAX_NODE_BYTES {
        return Err(TopicClientError::AssignmentTooLarge {
            partitions,
            replicas,
            bytes,
            limit: MAX_NODE_BYTES,
        });
    }
    Ok(())
}

/// Upper bound on the serialized size of a `/brokers/topics/<name>` payload
fn assignment_size_bound(brokers: &[i32], partitions: i32, replicas: i32) -> u64 {
    let digits = |n: i64| n.to_string().len() as u64;
    let widest_broker = brokers.iter().map(|&b| digits(i64::from(b))).max().unwrap_or(1);
    let widest_key = digits(i64::from(partitions.saturating_sub(1)).max(0));
    let partitions = u64::try_from(partitions).unwrap_or(0);
    let replicas = u64::try_from(replicas).unwrap_or(0);

    // "<key>":[<id>,<id>],
    let per_partition = (widest_key + 5).saturating_add(replicas.saturating_mul(widest_broker + 1));
    ASSIGNMENT_ENVELOPE_BYTES.saturating_add(partitions.saturating_mul(per_partition))
}

/// Spread partition replicas over brokers the way Kafka does without rack awareness
///
/// The first replica of each partition walks the broker list round-robin from
/// `start_index`; followers are offset by a shift that advances once per full
/// pass over the brokers. Callers check the layout with [`check_assignment`] first.
#[allow(clippy::indexing_slicing)] // every index is reduced modulo the broker count
pub fn assign_replicas(
    brokers: &[i32],
    partitions: i32,
    replicas: i32,
    start_index: usize,
    replica_shift: usize,
) -> Vec<Vec<i32>> {
    let count = brokers.len();
    if count == 0 {
        return Vec::new();
    }

    let mut shift = replica_shift;
    (0..usize::try_from(partitions).unwrap_or(0))
        .map(|partition| {
            if partition > 0 && partition % count == 0 {
                shift += 1;
            }
            let first = (partition + start_index) % count;
            let mut assigned = vec![brokers[first]];
            for follower in 0..usize::try_from(replicas - 1).unwrap_or(0) {
                let offset = 1 + (shift + follower) % (count - 1);
                assigned.push(brokers[(first + offset) % count]);
            }
            assigned
        })
        .collect()
}
