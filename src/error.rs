/// Error type for manifest and ebuild operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed manifest line. Manifest parsing is strict: one bad line
    /// aborts the whole read.
    #[error("invalid manifest entry: {0}")]
    InvalidManifestEntry(String),

    /// A hash name outside the supported manifest algorithm set.
    #[error("unknown checksum algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Non-success HTTP status while fetching a distfile.
    #[error("bad status {status} fetching {url}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The URL that was fetched.
        url: String,
    },

    /// Connection or read failure while fetching a distfile.
    #[error("transport error fetching {url}: {reason}")]
    Transport {
        /// The URL that was fetched.
        url: String,
        /// The underlying failure.
        reason: String,
    },

    /// A requested digest accumulator failed to initialize.
    #[error("initializing {0} digest")]
    DigestInit(&'static str),

    /// I/O error reading or writing a manifest or ebuild file.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for portage-manifest operations.
pub type Result<T> = std::result::Result<T, Error>;
