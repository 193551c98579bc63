pub mod config;
pub mod health;
pub mod topics;
pub mod webhooks;

pub use config::{ConfigError, WebhookConfig};
pub use health::{HealthState, Metrics};
pub use topics::{
    ReconciliationOutcome, TOPICS_ANNOTATION, TopicClientError, TopicMetadataClient,
    TopicReconciler, TopicSpec, TopicSpecError, ZooKeeperTopicClient, parse_topic_list,
    required_topics,
};
pub use webhooks::{
    AdmissionVerdict, REJECTION_MESSAGE, TopicAdmission, WebhookError, create_webhook_router,
    run_webhook_server,
};
