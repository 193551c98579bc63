// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for topic parsing and admission decisions
//!
//! These tests use proptest to generate random topic lists and outcomes and verify that:
//! 1. The verdict is a pure, order-independent conjunction over outcomes
//! 2. Well-formed annotations always parse to the declared topics with defaults filled in
//! 3. Arbitrary annotation text never panics the parser
//! 4. Admission never calls the broker more than once per topic for each operation

#[path = "../common/mod.rs"]
mod common;

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use common::*;
use topic_webhook::topics::spec::{DEFAULT_PARTITIONS, DEFAULT_REPLICAS};
use topic_webhook::webhooks::decide;
use topic_webhook::{
    AdmissionVerdict, REJECTION_MESSAGE, ReconciliationOutcome, TopicAdmission, parse_topic_list,
};

// =============================================================================
// Strategies
// =============================================================================

fn outcome_strategy() -> impl Strategy<Value = ReconciliationOutcome> {
    prop_oneof![
        Just(ReconciliationOutcome::AlreadyExists),
        Just(ReconciliationOutcome::Created),
        Just(ReconciliationOutcome::CreationDisabled),
        "[a-z ]{0,20}".prop_map(ReconciliationOutcome::Failed),
    ]
}

fn topic_name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9._-]{1,40}"
}

/// A topic entry as it would appear in the annotation, with optional fields
#[derive(Clone, Debug)]
struct TopicEntry {
    name: String,
    partitions: Option<i32>,
    replicas: Option<i32>,
    create: Option<bool>,
    config: BTreeMap<String, String>,
}

impl TopicEntry {
    fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::json!({ "name": self.name });
        if let Some(p) = self.partitions {
            object["partitions"] = p.into();
        }
        if let Some(r) = self.replicas {
            object["replicas"] = r.into();
        }
        if let Some(c) = self.create {
            object["create"] = c.into();
        }
        if !self.config.is_empty() {
            object["config"] = serde_json::to_value(&self.config).unwrap();
        }
        object
    }
}

fn topic_entry_strategy() -> impl Strategy<Value = TopicEntry> {
    (
        topic_name_strategy(),
        proptest::option::of(1i32..=100),
        proptest::option::of(1i32..=5),
        proptest::option::of(any::<bool>()),
        proptest::collection::btree_map("[a-z.]{1,15}", "[a-z0-9]{0,10}", 0..4),
    )
        .prop_map(|(name, partitions, replicas, create, config)| TopicEntry {
            name,
            partitions,
            replicas,
            create,
            config,
        })
}

fn annotation_value(entries: &[TopicEntry]) -> String {
    serde_json::Value::Array(entries.iter().map(TopicEntry::to_json).collect()).to_string()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// =============================================================================
// Decision properties
// =============================================================================

proptest! {
    #[test]
    fn verdict_is_conjunction(outcomes in proptest::collection::vec(outcome_strategy(), 0..12)) {
        let verdict = decide(outcomes.iter());
        let expected = outcomes.iter().all(|o| matches!(
            o,
            ReconciliationOutcome::AlreadyExists | ReconciliationOutcome::Created
        ));
        prop_assert_eq!(verdict.allowed, expected);
        if expected {
            prop_assert_eq!(verdict, AdmissionVerdict::allowed());
        } else {
            prop_assert_eq!(verdict.status_message.as_deref(), Some(REJECTION_MESSAGE));
        }
    }

    #[test]
    fn verdict_is_order_independent(outcomes in proptest::collection::vec(outcome_strategy(), 0..12)) {
        let forward = decide(outcomes.iter());
        let backward = decide(outcomes.iter().rev());
        prop_assert_eq!(forward, backward);
    }
}

// =============================================================================
// Parsing properties
// =============================================================================

proptest! {
    #[test]
    fn well_formed_annotation_round_trips(entries in proptest::collection::vec(topic_entry_strategy(), 0..8)) {
        let topics = parse_topic_list(&annotation_value(&entries)).unwrap();
        prop_assert_eq!(topics.len(), entries.len());

        for (topic, entry) in topics.iter().zip(&entries) {
            prop_assert_eq!(&topic.name, &entry.name);
            prop_assert_eq!(topic.partitions, entry.partitions.unwrap_or(DEFAULT_PARTITIONS));
            prop_assert_eq!(topic.replicas, entry.replicas.unwrap_or(DEFAULT_REPLICAS));
            prop_assert_eq!(topic.create_if_missing, entry.create.unwrap_or(true));
            prop_assert!(!topic.assert_only);
            prop_assert_eq!(&topic.config, &entry.config);
        }
    }

    #[test]
    fn arbitrary_annotation_never_panics(value in ".{0,200}") {
        let _ = parse_topic_list(&value);
    }

    #[test]
    fn non_positive_counts_rejected(name in topic_name_strategy(), count in -100i32..=0) {
        let partitions = serde_json::json!([{ "name": name, "partitions": count }]).to_string();
        let replicas = serde_json::json!([{ "name": name, "replicas": count }]).to_string();
        prop_assert!(parse_topic_list(&partitions).is_err());
        prop_assert!(parse_topic_list(&replicas).is_err());
    }
}

// =============================================================================
// Admission properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn admission_calls_broker_once_per_topic(
        raw_entries in proptest::collection::vec(topic_entry_strategy(), 1..6),
        existing in proptest::collection::vec(any::<bool>(), 6),
    ) {
        // Same-named entries race each other; keep the first of each name
        let mut seen = BTreeSet::new();
        let entries: Vec<TopicEntry> = raw_entries
            .into_iter()
            .filter(|e| seen.insert(e.name.clone()))
            .collect();

        let mut client = FakeTopicClient::new();
        for (entry, exists) in entries.iter().zip(&existing) {
            if *exists {
                client = client.with_topic(&entry.name);
            }
        }
        let client = client.build();
        let admission = TopicAdmission::new(client.clone());
        let annotations = topic_annotations(&annotation_value(&entries));

        let verdict = runtime().block_on(admission.admit("prop-pod-", &annotations));

        prop_assert_eq!(client.exists_calls(), entries.len());
        prop_assert!(client.create_calls().len() <= entries.len());

        // Creation only happens for topics that allow it
        for call in client.create_calls() {
            prop_assert!(entries.iter().any(|e| e.name == call.name && e.create.unwrap_or(true)));
        }

        // Denied exactly when some missing topic forbids creation
        let blocked = entries.iter().any(|e| !e.create.unwrap_or(true) && !client.has_topic(&e.name));
        prop_assert_eq!(verdict.allowed, !blocked);
    }
}
