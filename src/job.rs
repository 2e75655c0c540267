//! External job invocation.
//!
//! A [`JobRunner`] turns a validated job into a finished process. The daemon
//! uses [`WorkflowRunner`], which runs the configured workflow script and
//! blocks the calling worker until it exits. There is no timeout.
use std::{
    io,
    process::{Command, ExitStatus},
};

use log::{debug, info};

use crate::config::ServerConfig;

const INTERPRETER: &str = "python";

/// A `START` request after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub input: String,
    pub output: String,
}

/// Runs a job to completion.
///
/// `Err` means the job could not be launched at all; a job that ran and
/// failed is an `Ok` with a non-success status.
pub trait JobRunner: Send + Sync {
    fn run_job(&self, job: &Job) -> io::Result<ExitStatus>;
}

/// Launches `[prefix..] python <workflow> [flag] -i <shared><input> -o <shared><output>`.
#[derive(Debug, Clone)]
pub struct WorkflowRunner {
    program: String,
    base_args: Vec<String>,
    shared_dir: String,
}

impl WorkflowRunner {
    pub fn new(config: &ServerConfig) -> Self {
        let mut words = config
            .command_prefix
            .iter()
            .cloned()
            .chain([
                INTERPRETER.to_string(),
                config.workflow_file.display().to_string(),
            ])
            .chain(config.log_level.flag().map(str::to_string));

        // The chain always yields at least the interpreter.
        let program = words.next().unwrap_or_else(|| INTERPRETER.to_string());
        Self {
            program,
            base_args: words.collect(),
            shared_dir: config.shared_dir.clone(),
        }
    }

    pub fn command(&self, job: &Job) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.base_args)
            .arg("-i")
            .arg(format!("{}{}", self.shared_dir, job.input))
            .arg("-o")
            .arg(format!("{}{}", self.shared_dir, job.output));
        command
    }
}

impl JobRunner for WorkflowRunner {
    fn run_job(&self, job: &Job) -> io::Result<ExitStatus> {
        let mut command = self.command(job);
        debug!("launching job: {command:?}");

        let status = command.status()?;
        info!("job {} -> {} exited with {status}", job.input, job.output);
        Ok(status)
    }
}
