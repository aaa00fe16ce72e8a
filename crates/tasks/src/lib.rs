pub mod content;
pub mod error;
pub mod handlers;
pub mod merge;
pub mod orchestrator;
pub mod partition;
pub mod scheduler;

pub use content::ContentService;
pub use error::{ContentError, IngestError, OrchestratorError};
pub use handlers::{HandlerTable, TaskHandler};
pub use merge::{MergePlan, MergedContent, ResultMerger};
pub use orchestrator::{DispatchReport, IngestReport, TaskOrchestrator, TaskSubmitter};
pub use partition::{partition, Batches};
pub use scheduler::{
    JobDescriptor, JobHandler, QueuedScheduler, Scheduler, SchedulerError, TokioScheduler,
};
