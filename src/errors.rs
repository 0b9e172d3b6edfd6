use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotesError {
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("PARSE_FAILURE: {0}")]
    Parse(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("NO_ROOT: {0}")]
    NoRoot(String),
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),
    #[error("WATCH_FAILURE: {0}")]
    Watch(String),
}

impl From<std::io::Error> for NotesError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for NotesError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

impl From<notify::Error> for NotesError {
    fn from(value: notify::Error) -> Self {
        Self::Watch(value.to_string())
    }
}

pub type NotesResult<T> = Result<T, NotesError>;
