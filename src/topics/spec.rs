//! Topic requirements declared on a Pod
//!
//! A Pod lists the topics it depends on in a single annotation whose value is a
//! JSON array of topic objects:
//!
//! ```json
//! [{"name": "orders", "partitions": 3, "replicas": 2, "config": {"retention.ms": 86400000}}]
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Annotation carrying the JSON list of required topics
pub const TOPICS_ANNOTATION: &str = "topic-initializer.kafka.scholz.cz/topics";

/// Partition count used when the annotation omits `partitions`
pub const DEFAULT_PARTITIONS: i32 = 1;
/// Replication factor used when the annotation omits `replicas`
pub const DEFAULT_REPLICAS: i32 = 1;

/// Largest partition count a Pod may request
pub const MAX_PARTITIONS: i32 = 10_000;
/// Largest replication factor a Pod may request (Kafka stores it as a short)
pub const MAX_REPLICAS: i32 = i16::MAX as i32;

/// A single topic required by a Pod
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TopicSpec {
    pub name: String,

    #[serde(default = "default_partitions")]
    pub partitions: i32,

    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Topic-level configuration overrides (e.g. `retention.ms`)
    #[serde(default, deserialize_with = "deserialize_config")]
    pub config: BTreeMap<String, String>,

    /// Reserved: verify the topic but never create it
    #[serde(rename = "assert", default)]
    pub assert_only: bool,

    #[serde(rename = "create", default = "default_create")]
    pub create_if_missing: bool,
}

impl TopicSpec {
    /// Create a spec with default partitions, replicas and policy flags
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partitions: DEFAULT_PARTITIONS,
            replicas: DEFAULT_REPLICAS,
            config: BTreeMap::new(),
            assert_only: false,
            create_if_missing: true,
        }
    }

    pub fn with_partitions(mut self, partitions: i32) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_replicas(mut self, replicas: i32) -> Self {
        self.replicas = replicas;
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn without_creation(mut self) -> Self {
        self.create_if_missing = false;
        self
    }
}

fn default_partitions() -> i32 {
    DEFAULT_PARTITIONS
}

fn default_replicas() -> i32 {
    DEFAULT_REPLICAS
}

fn default_create() -> bool {
    true
}

/// Accept scalar config values and store them in their textual form
fn deserialize_config<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;
    use serde_json::Value;

    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key, s)),
            Value::Number(n) => Ok((key, n.to_string())),
            Value::Bool(b) => Ok((key, b.to_string())),
            other => Err(D::Error::custom(format!(
                "config value for '{}' must be a string, number or boolean, got {}",
                key, other
            ))),
        })
        .collect()
}

/// Errors raised while reading the topic annotation
#[derive(Debug, Error)]
pub enum TopicSpecError {
    #[error("topic annotation is not a valid topic list: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("topic at position {index} has an empty name")]
    EmptyName { index: usize },

    #[error("topic '{name}' requests {value} {field}, must be at least 1")]
    NonPositive {
        name: String,
        field: &'static str,
        value: i32,
    },

    #[error("topic '{name}' requests {value} {field}, at most {max} allowed")]
    TooLarge {
        name: String,
        field: &'static str,
        value: i32,
        max: i32,
    },
}

/// Read the required topics from a Pod's annotations
///
/// A missing annotation means the Pod has no topic requirements. Any malformed
/// entry rejects the whole list.
pub fn required_topics(
    annotations: &BTreeMap<String, String>,
) -> Result<Vec<TopicSpec>, TopicSpecError> {
    match annotations.get(TOPICS_ANNOTATION) {
        Some(value) => parse_topic_list(value),
        None => Ok(Vec::new()),
    }
}

/// Parse an annotation value into topic specs, preserving order
pub fn parse_topic_list(value: &str) -> Result<Vec<TopicSpec>, TopicSpecError> {
    let topics: Vec<TopicSpec> = serde_json::from_str(value)?;

    for (index, topic) in topics.iter().enumerate() {
        if topic.name.trim().is_empty() {
            return Err(TopicSpecError::EmptyName { index });
        }
        for (field, value, max) in [
            ("partitions", topic.partitions, MAX_PARTITIONS),
            ("replicas", topic.replicas, MAX_REPLICAS),
        ] {
            if value < 1 {
                return Err(TopicSpecError::NonPositive {
                    name: topic.name.clone(),
                    field,
                    value,
                });
            }
            if value > max {
                return Err(TopicSpecError::TooLarge {
                    name: topic.name.clone(),
                    field,
                    value,
                    max,
                });
            }
        }
    }

    Ok(topics)
}
