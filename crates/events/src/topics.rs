//! Topic constants.
//!
//! Topics follow the pattern `contentflow.<domain>.<event>`.

/// A back-end reported a task result and its status row was persisted.
pub const TASK_FINISHED: &str = "contentflow.task.finished";

/// A synchronization run for one user completed.
pub const SYNC_COMPLETE: &str = "contentflow.sync.complete";

/// Prefix matching every task event.
pub const TASK_PREFIX: &str = "contentflow.task.";
