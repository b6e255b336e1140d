pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod model;
pub mod observer;
pub mod types;

pub use error::{ModelError, ModelResult};
pub use filter::{FindOptions, SortDescriptor, SortDirection};
pub use model::{Model, ModelBuilder, ModelInstance, Pending};
pub use observer::{HookError, HookPoint, HookScheduler, ModelDefinition};
