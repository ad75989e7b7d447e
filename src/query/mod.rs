//! Execution client.
//!
//! Submits statements to the query service and tracks them to a terminal
//! state.

mod executor;
mod handle;

pub use executor::{ExecutionClient, TABLE_LIST_PAGE_SIZE};
pub use handle::ExecutionHandle;
