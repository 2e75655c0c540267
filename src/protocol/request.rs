use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("malformed JSON payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("request is not a JSON object")]
    NotAnObject,
    #[error("request has no 'cmd' field")]
    MissingCommand,
    #[error("'cmd' field must be a string, got {0}")]
    InvalidCommand(Value),
}

/// A decoded request document: a JSON object with a string `cmd`.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    cmd: String,
    fields: Map<String, Value>,
}

impl Request {
    pub fn parse(payload: &[u8]) -> Result<Self, RequestError> {
        let value: Value = serde_json::from_slice(payload)?;
        value.try_into()
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    /// The whole document, `cmd` included.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl TryFrom<Value> for Request {
    type Error = RequestError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(fields) = value else {
            return Err(RequestError::NotAnObject);
        };

        let cmd = match fields.get("cmd") {
            Some(Value::String(cmd)) => cmd.clone(),
            Some(other) => return Err(RequestError::InvalidCommand(other.clone())),
            None => return Err(RequestError::MissingCommand),
        };

        Ok(Self { cmd, fields })
    }
}
