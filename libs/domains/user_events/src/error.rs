use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    /// Payload is not a JSON object with string `operation` and `email` fields
    #[error("Malformed user event: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::Malformed(err.to_string())
    }
}
