use std::path::PathBuf;
use thiserror::Error;

/// The JSON backend failed during encode or decode.
#[derive(Debug, Error)]
#[error("json codec error: {0}")]
pub struct CodecError(String);

impl CodecError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

/// Everything that can go wrong while intercepting, replaying, or recording.
///
/// Errors propagate to the test as failures; nothing here is swallowed. The
/// only warn-and-continue path in the crate is an unknown matcher tag during
/// matching, which is logged and treated as a non-match.
#[derive(Debug, Error)]
pub enum TapeError {
    /// No cassette entry matched and the record mode forbids recording.
    #[error(
        "stub '{stub}': no cassette entry matches {method} {url} [body {body_hash}] \
         (cassette: {cassette}); nearest entries: {nearest:?}",
        cassette = .path.display()
    )]
    CassetteMiss {
        stub: String,
        path: PathBuf,
        method: String,
        url: String,
        body_hash: String,
        nearest: Vec<String>,
    },

    /// A cassette line failed to decode at install time.
    #[error("cassette {cassette}: line {line} failed to decode: {source}", cassette = .path.display())]
    CassetteLoad {
        path: PathBuf,
        line: usize,
        #[source]
        source: CodecError,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The upstream transport failed in a recording mode. Nothing was
    /// appended to the cassette.
    #[error("upstream request failed while recording: {0}")]
    Recorder(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cassette {cassette}: {source}", cassette = .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TapeError {
    /// Map onto the host client's error type at the `HttpClient` seam.
    /// A miss reads as 404 so test output shows the diagnostic dump; every
    /// other failure is a 500.
    pub fn into_client_error(self) -> http_client::Error {
        let status: u16 = match self {
            TapeError::CassetteMiss { .. } => 404,
            _ => 500,
        };
        http_client::Error::from_str(status, self.to_string())
    }
}
