//! Converge a single required topic: query, then create if allowed

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use super::client::TopicMetadataClient;
use super::spec::TopicSpec;

/// Result of reconciling one topic
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// The topic was already present
    AlreadyExists,
    /// The topic was missing and has been created
    Created,
    /// The topic is missing and its spec forbids creating it
    CreationDisabled,
    /// Querying or creating the topic failed
    Failed(String),
}

impl ReconciliationOutcome {
    /// Whether this outcome satisfies the Pod's requirement
    pub fn is_success(&self) -> bool {
        matches!(self, Self::AlreadyExists | Self::Created)
    }

    /// Short label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::AlreadyExists => "already_exists",
            Self::Created => "created",
            Self::CreationDisabled => "creation_disabled",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for ReconciliationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists => write!(f, "topic already exists"),
            Self::Created => write!(f, "topic created"),
            Self::CreationDisabled => {
                write!(f, "topic doesn't exist and topic creation is disabled")
            }
            Self::Failed(reason) => write!(f, "{}", reason),
        }
    }
}

/// Reconciles topics against the broker's metadata store
///
/// Each call issues at most one create request and never retries.
#[derive(Clone)]
pub struct TopicReconciler {
    client: Arc<dyn TopicMetadataClient>,
}

impl TopicReconciler {
    pub fn new(client: Arc<dyn TopicMetadataClient>) -> Self {
        Self { client }
    }

    pub async fn reconcile(&self, topic: &TopicSpec) -> ReconciliationOutcome {
        let name = topic.name.as_str();

        let exists = match self.client.exists(name).await {
            Ok(exists) => exists,
            Err(e) => {
                error!(topic = %name, error = %e, "Failed to query topic");
                return ReconciliationOutcome::Failed(format!(
                    "failed to query topic {}: {}",
                    name, e
                ));
            }
        };

        if exists {
            info!(topic = %name, assert_only = topic.assert_only, "Topic already exists");
            return ReconciliationOutcome::AlreadyExists;
        }

        if !topic.create_if_missing {
            warn!(
                topic = %name,
                assert_only = topic.assert_only,
                "Topic doesn't exist and topic creation is disabled"
            );
            return ReconciliationOutcome::CreationDisabled;
        }

        info!(
            topic = %name,
            partitions = topic.partitions,
            replicas = topic.replicas,
            config = ?topic.config,
            "Topic doesn't exist, creating"
        );

        match self
            .client
            .create(name, topic.partitions, topic.replicas, &topic.config)
            .await
        {
            Ok(()) => {
                info!(topic = %name, "Topic created");
                ReconciliationOutcome::Created
            }
            Err(e) => {
                error!(topic = %name, error = %e, "Failed to create topic");
                ReconciliationOutcome::Failed(format!("failed to create topic {}: {}", name, e))
            }
        }
    }
}
