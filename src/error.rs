use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unsupported Git provider for URL: {0}")]
    UnsupportedProvider(String),

    #[error("Malformed repository URL: {0}")]
    MalformedUrl(String),

    #[error("HTTP request to {endpoint} failed with status {status}")]
    HttpRequest { status: u16, endpoint: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Release note generation failed: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status of a failed provider request, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpRequest { status, .. } => Some(*status),
            _ => None,
        }
    }
}
