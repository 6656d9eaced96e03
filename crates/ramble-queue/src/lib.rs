pub mod backoff;
pub mod error;
pub mod handler;
pub mod runner;

pub use error::{QueueError, Result};
pub use handler::{TaskHandler, TaskOutcome};
pub use runner::{QueueStatus, TaskQueueRunner};
