//! Domain models for jobs, schedules, executions, and queue messages.

mod execution;
mod job;
mod queue_message;
mod schedule;

pub use execution::{ExecutionStatus, JobExecution, NewJobExecution};
pub use job::{Job, JobType, NewJob};
pub use queue_message::{QueueMessage, QueueResult, QueueResultStatus};
pub use schedule::{JobSchedule, NewJobSchedule};
