//! # Latejoin Testkit
//!
//! Testing utilities for latejoin.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Fixed addressing and codec cases every implementation must reproduce
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: An authority and a peer wired to one in-memory broker
//!
//! ## Golden Vectors
//!
//! ```rust
//! use latejoin_testkit::vectors::verify_all_vectors;
//!
//! for (name, ok) in verify_all_vectors() {
//!     assert!(ok, "{name}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use latejoin_testkit::generators::{channel_id, session_id};
//!
//! proptest! {
//!     #[test]
//!     fn topics_roundtrip(session in session_id(), channel in channel_id()) {
//!         let topic = latejoin_core::topic_for(&session, channel);
//!         prop_assert_eq!(latejoin_core::channel_for(&topic).unwrap(), channel);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use latejoin_testkit::fixtures::{score_snapshot, SessionFixture};
//!
//! async fn example() {
//!     let fixture = SessionFixture::new().await;
//!     fixture.authority.broadcast_snapshot(score_snapshot()).await.unwrap();
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{fast_drill, non_utf8_payload, score_snapshot, SessionFixture};
