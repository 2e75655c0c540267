use serde::{Deserialize, Serialize};

/// The two replies the server ever sends: `{"result":"OK"}` or `{"result":"FAIL"}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "UPPERCASE")]
pub enum Response {
    Ok,
    Fail,
}

impl<T, E> From<&Result<T, E>> for Response {
    fn from(value: &Result<T, E>) -> Self {
        match value {
            Ok(_) => Response::Ok,
            Err(_) => Response::Fail,
        }
    }
}
