//! Integration tests for athena-cursor.
//!
//! Everything runs offline: the query service is the in-process mock,
//! object storage is in memory, and the embedded engine reads local files.
//!
//! Run with: `cargo test --test integration_tests`

mod integration;
