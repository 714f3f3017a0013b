use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmartdError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for SmartdError {
    fn from(e: serde_json::Error) -> Self {
        SmartdError::Serialize(e.to_string())
    }
}
