//! Admission webhook gating Pods on their Kafka topic requirements
//!
//! A Pod lists the topics it needs in an annotation. Before the Pod is
//! admitted, every listed topic is looked up and, if missing and allowed,
//! created. The Pod is admitted only when all of its topics are available.

pub mod admission;
mod server;

pub use admission::{AdmissionVerdict, REJECTION_MESSAGE, TopicAdmission, TopicResult, decide};
pub use server::{
    ADMISSION_API_VERSION, ADMISSION_REVIEW_KIND, AdmissionReview, AdmissionReviewResponse,
    AdmissionReviewStatus, FailureStatus, PodObject, ReviewPayload, WebhookError,
    create_response, create_webhook_router, run_webhook_server,
};
