pub mod backup;
pub mod debug;
pub mod error;
pub mod kernel;
pub mod lens;
pub mod scheduler;
pub mod session;
pub mod text;

pub use backup::BackupDocument;
pub use debug::DebugFacade;
pub use error::{KernelError, Result};
pub use kernel::{Kernel, ProcessTextResult};
pub use lens::LensRouter;
pub use scheduler::interval_to_cron_expr;
pub use session::SessionManager;
