//! # revdoc Testkit
//!
//! Test utilities for revdoc.
//!
//! This crate provides:
//! - Test fixtures and store helpers
//! - A fault-injecting key-value store
//! - Property-based test generators using proptest
//! - Concurrency stress helpers
//! - Test logging setup
//!
//! ## Usage
//!
//! ```rust
//! use revdoc_testkit::prelude::*;
//!
//! with_temp_store(|store| {
//!     let page = scenarios::page_doctype(store);
//!     assert_eq!(page.code, "page");
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faulty;
pub mod fixtures;
pub mod generators;
pub mod stress;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faulty::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use crate::init_test_logging;
}

pub use faulty::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;

static LOGGING: Once = Once::new();

/// Installs a test-friendly `tracing` subscriber once per process.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`. Output goes
/// through the test harness writer so it is captured per test.
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
