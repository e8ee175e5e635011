/// Errors shared across the relay crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// The text-generation call failed (network, malformed response, auth, timeout).
    #[error("completion failed: {0}")]
    Completion(String),

    /// The outbound send-message call failed.
    #[error("channel error: {0}")]
    Channel(String),

    /// An inbound webhook payload is missing the expected structure.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("database error: {0}")]
    Database(String),
}

pub type Result<T> = std::result::Result<T, Error>;
