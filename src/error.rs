//! Error types for the streaming engine

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, RadioError>;

/// Errors that can end a streaming session or a registry operation
#[derive(Debug, thiserror::Error)]
pub enum RadioError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("DNS lookup failed for {0}")]
    DnsFailure(String),

    #[error("Connection failed: {0}")]
    ConnectFailure(String),

    #[error("SSL handshake failed: {0}")]
    TlsHandshakeFailure(String),

    #[error("HTTP error {0}")]
    HttpError(u16),

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("Response headers too large")]
    HeaderTooLarge,

    #[error("Invalid response: {0}")]
    MalformedResponse(String),

    #[error("Failed to fetch playlist: {0}")]
    PlaylistFetchFailure(String),

    #[error("No segments in playlist")]
    NoSegments,

    #[error("Decoder init failed: {0}")]
    DecoderInitFailure(String),

    #[error("Thread creation failed: {0}")]
    ThreadCreationFailure(String),

    #[error("Stream ended")]
    StreamEnded,

    /// Local file I/O (station registry, catalog directory)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A curated catalog descriptor could not be parsed
    #[error("Catalog error: {0}")]
    Catalog(#[from] serde_json::Error),

    #[error("Station registry is full")]
    RegistryFull,
}

impl RadioError {
    /// Whether this error terminates a streaming session.
    ///
    /// Registry and catalog errors never reach a session, everything else
    /// moves it to `Error` and requires a new `play()`.
    pub fn is_session_fatal(&self) -> bool {
        !matches!(
            self,
            RadioError::Io(_) | RadioError::Catalog(_) | RadioError::RegistryFull
        )
    }

    pub(crate) fn connect(msg: impl Into<String>) -> Self {
        Self::ConnectFailure(msg.into())
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }
}
