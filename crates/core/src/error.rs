pub type Result<T> = eyre::Result<T>;

#[derive(Debug, thiserror::Error)]
pub enum ClamError {
    #[error("unsupported clamd address {0:?} (expected unix:///path or tcp://host:port)")]
    Address(String),
    #[error("could not connect to clamd at {location}: {source}")]
    Connect {
        location: String,
        source: std::io::Error,
    },
    #[error("clamd IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out waiting for clamd reply")]
    Timeout,
    #[error("unexpected reply from clamd: {0:?}")]
    UnexpectedReply(String),
    #[error("client is not connected")]
    Disconnected,
    #[error("INSTREAM chunk size must be nonzero")]
    InvalidChunkSize,
    #[error("malformed clamd reply: {0:?}")]
    MalformedReply(String),
}
