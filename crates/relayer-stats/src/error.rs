// Error types shared by the stores, the remote client and the engine

use thiserror::Error;

/// Errors raised by store collaborators
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised while talking to a chain's LCD endpoint
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Errors that abort a whole run
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to load chain configuration: {0}")]
    ChainConfig(StoreError),
}

/// Why one side of a channel pair produced no client update time
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Chain {0} config not found")]
    MissingChainConfig(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
