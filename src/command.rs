//! Command registry and dispatch.
//!
//! Every request names a command in its `cmd` field. The registry is the
//! [`CommandKind`] enum: each kind knows its wire name and the fields a request
//! must carry. [`dispatch`] looks the command up, checks the schema, builds a
//! typed [`Command`] and runs it.
//!
//! # Commands
//!
//! - `START`: requires `input` and `output`; runs one workflow job through the
//!   configured [`JobRunner`].
//!
//! # Example
//! ```rust
//! use taskmgr::command::{CommandKind, missing_fields};
//! use serde_json::json;
//!
//! let doc = json!({ "cmd": "START", "input": "a.txt" });
//! let fields = doc.as_object().unwrap();
//! assert_eq!(missing_fields(fields, CommandKind::Start.required_fields()), ["output"]);
//! ```
use log::error;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    job::{Job, JobRunner},
    protocol::Request,
};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unrecognized command '{0}'")]
    UnknownCommand(String),

    #[error("invalid '{command}' command, missing fields: {}", .fields.join(", "))]
    MissingFields {
        command: &'static str,
        fields: Vec<&'static str>,
    },

    #[error("invalid '{command}' command, field '{field}' must be a string")]
    InvalidField {
        command: &'static str,
        field: &'static str,
    },
}

/// Commands the server knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Start,
}

impl CommandKind {
    pub const ALL: [CommandKind; 1] = [CommandKind::Start];

    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Start => "START",
        }
    }

    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            CommandKind::Start => &["input", "output"],
        }
    }

    pub fn lookup(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start(Job),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Start(_) => CommandKind::Start,
        }
    }

    /// Run the command to completion on the calling thread.
    ///
    /// A job that cannot be launched, or exits unsuccessfully, is logged but
    /// still counts as handled.
    pub fn execute(&self, runner: &dyn JobRunner) {
        match self {
            Command::Start(job) => match runner.run_job(job) {
                Ok(status) if !status.success() => {
                    error!(
                        "job {} -> {} failed with {status}",
                        job.input, job.output
                    );
                }
                Ok(_) => {}
                Err(e) => error!("failed to launch job {} -> {}: {e}", job.input, job.output),
            },
        }
    }
}

impl TryFrom<&Request> for Command {
    type Error = CommandError;

    fn try_from(req: &Request) -> Result<Self, Self::Error> {
        let kind = CommandKind::lookup(req.cmd())
            .ok_or_else(|| CommandError::UnknownCommand(req.cmd().to_string()))?;

        let fields = req.fields();
        let missing = missing_fields(fields, kind.required_fields());
        if !missing.is_empty() {
            return Err(CommandError::MissingFields {
                command: kind.name(),
                fields: missing,
            });
        }

        match kind {
            CommandKind::Start => Ok(Command::Start(Job {
                input: string_field(fields, kind, "input")?,
                output: string_field(fields, kind, "output")?,
            })),
        }
    }
}

/// Every name in `required` that is not a key of `document`, in order.
pub fn missing_fields(
    document: &Map<String, Value>,
    required: &'static [&'static str],
) -> Vec<&'static str> {
    required
        .iter()
        .copied()
        .filter(|field| !document.contains_key(*field))
        .collect()
}

/// Presence check only; values are not inspected.
pub fn validate(document: &Map<String, Value>, required: &'static [&'static str]) -> bool {
    missing_fields(document, required).is_empty()
}

/// Validate `req` against the registry and run it.
pub fn dispatch(req: &Request, runner: &dyn JobRunner) -> Result<Command, CommandError> {
    let command = Command::try_from(req)?;
    command.execute(runner);
    Ok(command)
}

fn string_field(
    fields: &Map<String, Value>,
    kind: CommandKind,
    field: &'static str,
) -> Result<String, CommandError> {
    match fields.get(field) {
        Some(Value::String(value)) => Ok(value.clone()),
        _ => Err(CommandError::InvalidField {
            command: kind.name(),
            field,
        }),
    }
}
