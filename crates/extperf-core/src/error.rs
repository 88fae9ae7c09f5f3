use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Page or extension instrumentation could not be read
    #[error("Collection error: {0}")]
    Collection(String),

    /// A page-state check exceeded its time bound
    #[error("Detection timed out after {timeout_ms} ms: {operation}")]
    DetectionTimeout { operation: String, timeout_ms: u64 },

    /// A DOM target vanished between detection and action
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// The browser or tab went away mid-measurement
    #[error("Target unreachable: {0}")]
    TargetUnreachable(String),

    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Failed to serialize or parse JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short machine-friendly name of the error kind, used in failure records
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Collection(_) => "CollectionError",
            Error::DetectionTimeout { .. } => "DetectionTimeout",
            Error::ElementNotFound(_) => "ElementNotFound",
            Error::TargetUnreachable(_) => "TargetUnreachable",
            Error::Timeout { .. } => "Timeout",
            Error::InvalidInput(_) => "InvalidInput",
            Error::Browser(_) => "BrowserError",
            Error::Serialization(_) => "SerializationError",
            Error::Io(_) => "IoError",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
