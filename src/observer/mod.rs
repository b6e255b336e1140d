// Model lifecycle hooks: definitions, per-write dispatch and deferred execution

pub mod error;
pub mod pipeline;
pub mod scheduler;
pub mod traits;

pub use error::{FlushReport, HookError};
pub use pipeline::HookDispatch;
pub use scheduler::{HookScheduler, HookTask, ScheduledHook};
pub use traits::{HookPoint, ModelDefinition};
