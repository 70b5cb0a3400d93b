use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("unable to load {source_name}: {reason}")]
    Load { source_name: String, reason: String },

    #[error("malformed transcript row {line}, column {column}: '{value}'")]
    Parse {
        line: usize,
        column: usize,
        value: String,
    },

    #[error("bad time value: '{input}'")]
    BadTime { input: String },

    #[error("bad url: '{input}'")]
    BadUrl { input: String },

    #[error("unknown key: '{name}'")]
    UnknownKey { name: String },

    #[error("bad control script line {line}: {reason}")]
    Script { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type ChatResult<T> = Result<T, ChatError>;
