//! # msgsync Testkit
//!
//! Test utilities for msgsync.
//!
//! This crate provides:
//! - An account fixture that encrypts wire bodies with a fresh key
//! - Property-based test generators using proptest
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use msgsync_testkit::prelude::*;
//!
//! #[test]
//! fn downloads_messages() {
//!     init_test_tracing();
//!     let account = TestAccount::new("acct");
//!     let bodies = account.messages(1..=10);
//!     // ... serve `bodies` from a remote and run a download
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
