//! Admission decision for a Pod's topic requirements
//!
//! Every required topic is reconciled in its own task. All tasks run to
//! completion, even when a sibling fails or the caller goes away, so a rejected
//! Pod never leaves an abandoned create request behind. The verdict is the
//! conjunction of the individual outcomes.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info, warn};

use crate::health::HealthState;
use crate::topics::{
    ReconciliationOutcome, TopicMetadataClient, TopicReconciler, TopicSpec, required_topics,
};

/// Message returned for every denied admission; details only go to the logs
pub const REJECTION_MESSAGE: &str =
    "Rejected by Kafka Topic Initializer. See logs for more details.";

/// Final allow/deny decision for one admission request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmissionVerdict {
    pub allowed: bool,
    pub status_message: Option<String>,
}

impl AdmissionVerdict {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            status_message: None,
        }
    }

    pub fn denied(message: &str) -> Self {
        Self {
            allowed: false,
            status_message: Some(message.to_string()),
        }
    }
}

/// Outcome of one topic in a batch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicResult {
    pub topic: String,
    pub outcome: ReconciliationOutcome,
}

/// Fold per-topic outcomes into a verdict
///
/// Allowed only when every topic exists or was created; the order of the
/// outcomes does not matter.
pub fn decide<'a, I>(outcomes: I) -> AdmissionVerdict
where
    I: IntoIterator<Item = &'a ReconciliationOutcome>,
{
    if outcomes.into_iter().all(ReconciliationOutcome::is_success) {
        AdmissionVerdict::allowed()
    } else {
        AdmissionVerdict::denied(REJECTION_MESSAGE)
    }
}

/// Admits Pods whose required topics exist or can be provisioned
#[derive(Clone)]
pub struct TopicAdmission {
    reconciler: TopicReconciler,
    health_state: Option<Arc<HealthState>>,
}

impl TopicAdmission {
    pub fn new(client: Arc<dyn TopicMetadataClient>) -> Self {
        Self {
            reconciler: TopicReconciler::new(client),
            health_state: None,
        }
    }

    /// Record per-topic outcomes in the given health state's metrics
    pub fn with_health_state(mut self, health_state: Arc<HealthState>) -> Self {
        self.health_state = Some(health_state);
        self
    }

    /// Decide whether a Pod with these annotations may be admitted
    pub async fn admit(&self, pod: &str, annotations: &BTreeMap<String, String>) -> AdmissionVerdict {
        let topics = match required_topics(annotations) {
            Ok(topics) => topics,
            Err(e) => {
                error!(pod = %pod, error = %e, "Failed to parse topic annotation, rejecting");
                return AdmissionVerdict::denied(REJECTION_MESSAGE);
            }
        };

        if topics.is_empty() {
            info!(pod = %pod, "Pod doesn't contain any relevant annotation and will be allowed");
            return AdmissionVerdict::allowed();
        }

        for topic in &topics {
            info!(pod = %pod, topic = %topic.name, "Pod requires topic");
        }

        let results = self.reconcile_all(topics).await;
        let verdict = decide(results.iter().map(|r| &r.outcome));

        if verdict.allowed {
            info!(pod = %pod, topics = results.len(), "All required topics are available");
        } else {
            for result in results.iter().filter(|r| !r.outcome.is_success()) {
                warn!(
                    pod = %pod,
                    topic = %result.topic,
                    outcome = %result.outcome,
                    "Required topic unavailable"
                );
            }
            warn!(pod = %pod, message = REJECTION_MESSAGE, "Rejecting admission");
        }

        verdict
    }

    /// Reconcile every topic concurrently and wait for all of them
    ///
    /// Results are returned in the order of `topics`.
    pub async fn reconcile_all(&self, topics: Vec<TopicSpec>) -> Vec<TopicResult> {
        let mut names = Vec::with_capacity(topics.len());
        let handles: Vec<_> = topics
            .into_iter()
            .map(|topic| {
                names.push(topic.name.clone());
                let reconciler = self.reconciler.clone();
                tokio::spawn(async move { reconciler.reconcile(&topic).await })
            })
            .collect();

        let results: Vec<TopicResult> = join_all(handles)
            .await
            .into_iter()
            .zip(names)
            .map(|(joined, topic)| {
                let outcome = joined.unwrap_or_else(|e| {
                    error!(topic = %topic, error = %e, "Topic reconciliation task failed");
                    ReconciliationOutcome::Failed(format!("reconciliation task failed: {}", e))
                });
                TopicResult { topic, outcome }
            })
            .collect();

        if let Some(state) = &self.health_state {
            for result in &results {
                state.metrics.record_topic_outcome(result.outcome.label());
            }
        }

        results
    }
}
