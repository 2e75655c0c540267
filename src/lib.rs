pub mod command;
pub mod config;
pub mod job;
pub mod protocol;

pub use command::{Command, CommandError, CommandKind};
pub use config::{ConfigError, ServerConfig};
pub use job::{Job, JobRunner, WorkflowRunner};
