// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Integration tests for the ZooKeeper topic client
//!
//! These tests require a running ZooKeeper server, taken from `ZOOKEEPER_URL`
//! (default `127.0.0.1:2181`). Tests are marked with #[ignore] and must be run
//! explicitly:
//!
//! ```bash
//! ZOOKEEPER_URL=127.0.0.1:2181 cargo test --test integration -- --ignored
//! ```
//!
//! Every test works under its own chroot, so tests may run in parallel and
//! never touch a real Kafka layout.



pub use ensemble::*;
