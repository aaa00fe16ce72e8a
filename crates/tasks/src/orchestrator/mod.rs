//! Task orchestrator -- owns the task lifecycle and every status-row change.
//!
//! Split into focused submodules:
//! - `core`: the orchestrator struct, construction and status reads
//! - `create`: task creation and scheduling
//! - `dispatch`: handing scheduled tasks to back-ends
//! - `ingest`: result ingestion with the always-persist status step
//! - `cascade`: backend-feedback tasks derived from finished analysis

mod cascade;
mod core;
mod create;
mod dispatch;
mod ingest;
#[cfg(test)]
mod tests;

pub use self::core::{TaskOrchestrator, TaskSubmitter};
pub use self::dispatch::DispatchReport;
pub use self::ingest::IngestReport;
