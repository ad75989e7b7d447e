//! Integration tests for athena-cursor.
//!
//! Each module drives the public API end to end against the mock service.

pub mod common;
pub mod columnar_test;
pub mod cursor_test;
pub mod engine_test;
pub mod paginated_test;
pub mod writer_test;
