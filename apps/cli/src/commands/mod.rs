//! Command implementations.

pub mod ideas;
pub mod identify;

use std::time::Duration;
use upcycle_core::ActionOptions;

/// Builds the per-invocation options from the `--timeout` flag.
pub fn action_options(timeout_secs: Option<u64>) -> ActionOptions {
    ActionOptions { deadline: timeout_secs.map(Duration::from_secs) }
}
