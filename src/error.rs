/// Error types for the mimedb library
use std::fmt;
use std::io;

/// Result type alias for mimedb operations
pub type Result<T> = std::result::Result<T, MimeError>;

/// Main error type for mimedb operations
///
/// Most recoverable conditions (malformed data lines, missing files,
/// unreadable caches) never surface as errors at all; per the shared-mime-info
/// contract they degrade to a less specific classification. This type covers
/// the cases where an explicit failure is still meaningful, such as opening a
/// binary cache by hand.
#[derive(Debug)]
pub enum MimeError {
    /// I/O errors
    Io(io::Error),

    /// Memory mapping errors
    Mmap(String),

    /// Binary cache file is too small to contain a valid header
    CacheTooSmall {
        /// Actual file size in bytes
        size: usize,
        /// Minimum required size in bytes
        required: usize,
    },

    /// Binary cache version is not supported (major must be 1, minor 1-2)
    UnsupportedCacheVersion {
        /// Major version found in the header
        major: u16,
        /// Minor version found in the header
        minor: u16,
    },

    /// Format/parsing errors
    Format(String),
}

impl fmt::Display for MimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MimeError::Io(e) => write!(f, "I/O error: {}", e),
            MimeError::Mmap(msg) => write!(f, "Memory mapping error: {}", msg),
            MimeError::CacheTooSmall { size, required } => {
                write!(
                    f,
                    "Cache too small: {} bytes (need at least {})",
                    size, required
                )
            }
            MimeError::UnsupportedCacheVersion { major, minor } => {
                write!(
                    f,
                    "Unsupported cache version {}.{} (expected 1.1 or 1.2)",
                    major, minor
                )
            }
            MimeError::Format(msg) => write!(f, "Format error: {}", msg),
        }
    }
}

impl std::error::Error for MimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MimeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MimeError {
    fn from(err: io::Error) -> Self {
        MimeError::Io(err)
    }
}
