//! Blindship Test - Shared test utilities for the Blindship broker.
//!
//! Provides a scriptable [`FakeCarrier`], fixtures, and [`TestBroker`], an
//! in-memory broker with an owner already on file.
//!
//! ```rust,ignore
//! use blindship_test::prelude::*;
//!
//! #[tokio::test]
//! async fn test_resolve() {
//!     let broker = TestBroker::builder()
//!         .with_fake(FakeCarrier::new("acme"))
//!         .build()
//!         .await;
//!     let token = broker.issue_token(&["acme"], &["Ground"]).await;
//!     let resolution = broker
//!         .state
//!         .resolver
//!         .resolve(&token, &test_carrier("acme"))
//!         .await
//!         .unwrap();
//!     assert_eq!(resolution.address, broker.address.fields());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
