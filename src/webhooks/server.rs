//! Webhook HTTP server handlers
//!
//! Every path and method is routed to the admission handler, which decodes the
//! AdmissionReview, decides on the embedded Pod and encodes the verdict.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info};

use super::admission::{AdmissionVerdict, TopicAdmission};
use crate::config::WebhookConfig;
use crate::health::HealthState;

/// Kind every inbound review must carry
pub const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";
/// API version of the rendered response envelope
pub const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1alpha1";

/// Kubernetes AdmissionReview request
///
/// The v1alpha1 layout carries the object under `spec`; later versions use
/// `request`. Both are accepted.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    pub api_version: Option<String>,
    pub kind: String,
    pub spec: Option<ReviewPayload>,
    pub request: Option<ReviewPayload>,
}

impl AdmissionReview {
    /// Take the Pod under review, preferring the v1alpha1 location
    pub fn into_pod(self) -> Option<PodObject> {
        self.spec
            .and_then(|spec| spec.object)
            .or_else(|| self.request.and_then(|request| request.object))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPayload {
    pub uid: Option<String>,
    pub operation: Option<String>,
    pub object: Option<PodObject>,
}

/// The Pod-like object under admission
///
/// Annotations and `generateName` are read from the top level first and from
/// `metadata` otherwise.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodObject {
    pub annotations: Option<BTreeMap<String, String>>,
    pub generate_name: Option<String>,
    pub metadata: Option<ObjectMeta>,
}

impl PodObject {
    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.annotations
            .clone()
            .or_else(|| self.metadata.as_ref().and_then(|m| m.annotations.clone()))
            .unwrap_or_default()
    }

    /// Name used to identify the Pod in logs
    pub fn display_name(&self) -> String {
        self.generate_name
            .clone()
            .or_else(|| {
                self.metadata
                    .as_ref()
                    .and_then(|m| m.generate_name.clone().or_else(|| m.name.clone()))
            })
            .unwrap_or_else(|| "<unnamed>".to_string())
    }
}

/// AdmissionReview response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewResponse {
    pub kind: String,
    pub api_version: String,
    pub status: AdmissionReviewStatus,
}

/// Verdict section of the response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewStatus {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<FailureStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureStatus {
    pub status: String,
    pub message: String,
    pub reason: String,
}

/// Shared state for webhook handlers
pub(crate) struct WebhookState {
    pub admission: TopicAdmission,
    pub health_state: Option<Arc<HealthState>>,
}

impl WebhookState {
    pub fn new(admission: TopicAdmission, health_state: Option<Arc<HealthState>>) -> Self {
        Self {
            admission,
            health_state,
        }
    }
}

/// Create the webhook router with a single catch-all route
pub fn create_webhook_router(
    admission: TopicAdmission,
    health_state: Option<Arc<HealthState>>,
) -> Router {
    let state = Arc::new(WebhookState::new(admission, health_state));
    Router::new().fallback(handle_review).with_state(state)
}

/// Admission webhook handler
pub(crate) async fn handle_review(
    State(state): State<Arc<WebhookState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    debug!(method = %method, uri = %uri, bytes = body.len(), "Received request");

    let raw: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            error!(uri = %uri, error = %e, "Request body is not JSON");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let kind = raw.get("kind").and_then(serde_json::Value::as_str);
    if kind != Some(ADMISSION_REVIEW_KIND) {
        error!(uri = %uri, kind = ?kind, "Kind is not AdmissionReview");
        return StatusCode::BAD_REQUEST.into_response();
    }

    let review: AdmissionReview = match serde_json::from_value(raw) {
        Ok(review) => review,
        Err(e) => {
            error!(uri = %uri, error = %e, "Failed to parse AdmissionReview");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let pod = match review.into_pod() {
        Some(pod) => pod,
        None => {
            error!(uri = %uri, "AdmissionReview carries no object");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let pod_name = pod.display_name();
    let annotations = pod.annotations();
    info!(pod = %pod_name, "Admitting pod");

    let verdict = state.admission.admit(&pod_name, &annotations).await;

    if let Some(health) = &state.health_state {
        health
            .metrics
            .record_admission(verdict.allowed, started.elapsed().as_secs_f64());
    }

    info!(pod = %pod_name, allowed = verdict.allowed, "Responding to admission review");
    (StatusCode::OK, Json(create_response(&verdict))).into_response()
}

/// Render a verdict as an AdmissionReview response
pub fn create_response(verdict: &AdmissionVerdict) -> AdmissionReviewResponse {
    AdmissionReviewResponse {
        kind: ADMISSION_REVIEW_KIND.to_string(),
        api_version: ADMISSION_API_VERSION.to_string(),
        status: AdmissionReviewStatus {
            allowed: verdict.allowed,
            status: match (&verdict.status_message, verdict.allowed) {
                (Some(message), false) => Some(FailureStatus {
                    status: "Failure".to_string(),
                    message: message.clone(),
                    reason: message.clone(),
                }),
                _ => None,
            },
        },
    }
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0 on the configured port and serves every path. TLS
/// certificates are loaded from the configured PEM files. The health state, if
/// given, is marked ready once the certificates are loaded.
pub async fn run_webhook_server(
    config: &WebhookConfig,
    admission: TopicAdmission,
    health_state: Option<Arc<HealthState>>,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let app = create_webhook_router(admission, health_state.clone());

    let tls = RustlsConfig::from_pem_file(
        PathBuf::from(&config.cert_path),
        PathBuf::from(&config.key_path),
    )
    .await
    .map_err(WebhookError::TlsConfig)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.webhook_port));
    let handle = Handle::new();
    if let Some(state) = &health_state {
        tokio::spawn(mark_ready_when_listening(handle.clone(), state.clone()));
    }

    let served = axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await;

    if let Some(state) = &health_state {
        state.set_ready(false).await;
    }
    served.map_err(WebhookError::Server)
}

/// Report ready once the server behind `handle` has bound its port
///
/// Readiness stays false when the bind fails.
pub async fn mark_ready_when_listening(handle: Handle, state: Arc<HealthState>) {
    match handle.listening().await {
        Some(addr) => {
            info!("Webhook server listening on {} with TLS", addr);
            state.set_ready(true).await;
        }
        None => error!("Webhook server failed to bind, staying unready"),
    }
}

/// Errors that can occur when running the webhook server
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("TLS configuration error: {0}")]
    TlsConfig(#[source] std::io::Error),

    #[error("Webhook server error: {0}")]
    Server(#[source] std::io::Error),
}
