use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("cannot {action} while the host is {phase}")]
    InvalidPhase {
        phase: &'static str,
        action: &'static str,
    },

    #[error("module not found: {0}")]
    ModuleNotFound(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("script error in {chunk}: {message}")]
    ScriptFault { chunk: String, message: String },

    #[error("fatal script error: {0}")]
    Fatal(String),

    #[error("no fused archive attached, cannot run {0}")]
    NotFused(String),

    #[error("script engine error: {0}")]
    Engine(String),
}

impl HostError {
    pub(crate) fn fault(chunk: impl Into<String>, err: mlua::Error) -> Self {
        HostError::ScriptFault {
            chunk: chunk.into(),
            message: err.to_string(),
        }
    }
}

impl From<mlua::Error> for HostError {
    fn from(err: mlua::Error) -> Self {
        HostError::Engine(err.to_string())
    }
}
