use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpectralEventsError {
    #[error("Input shape mismatch: {0}")]
    InputShape(String),

    #[error("Parameter out of range: {0}")]
    ParameterRange(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Input file not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Failed to parse input: {0}")]
    Parse(String),

    #[error("Missing variable: {0}")]
    MissingVariable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SpectralEventsError>;
