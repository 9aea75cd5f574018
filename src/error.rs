use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for iAro.
///
/// Each boundary subsystem defines its own error variant. The conversation
/// core itself (sessions, history, media lifecycle) raises no errors: its
/// operations are total over in-memory state. Flow and binary code uses
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum IaroError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("provider: {0}")]
    Provider(#[from] ProviderError),

    #[error("transcription: {0}")]
    Transcription(#[from] TranscriptionError),

    #[error("search: {0}")]
    Search(#[from] SearchError),

    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    // Generic fallthrough (wraps anyhow for interop)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing API key: {0}")]
    MissingKey(&'static str),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Model provider errors ──────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {provider} failed: {message}")]
    Request { provider: String, message: String },

    #[error("{provider} returned status {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} response had no candidates")]
    EmptyResponse { provider: String },

    #[error("could not read media file {path}: {source}")]
    MediaRead {
        path: String,
        source: std::io::Error,
    },
}

// ─── Transcription errors ───────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("could not read audio file {path}: {source}")]
    AudioRead {
        path: String,
        source: std::io::Error,
    },

    #[error("transcription request failed: {0}")]
    Request(String),

    #[error("transcription returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("no transcript in response")]
    EmptyTranscript,
}

// ─── Search / news / weather errors ─────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("search returned status {status}")]
    Status { status: u16 },

    #[error("no results for query")]
    NoResults,

    #[error("feed parse failed: {0}")]
    FeedParse(String),

    #[error("provider: {0}")]
    Provider(#[from] ProviderError),
}

// ─── Transport errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    Send(String),

    #[error("media save failed: {0}")]
    MediaSave(String),

    #[error("media not supported by this transport")]
    MediaUnsupported,
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, IaroError>;
