use thiserror::Error;

/// Failure of a cheat-search round. The session is left untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchErrorCode {
    #[error("no emulation is active")]
    NoEmulationActive,

    #[error("virtual addresses are not accessible while address translation is disabled")]
    VirtualAddressesCurrentlyNotAccessible,

    #[error("invalid search parameters")]
    InvalidParameters,
}

#[derive(Error, Debug)]
pub enum MovieError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("a movie is already active")]
    AlreadyActive,

    #[error("no movie is active")]
    NotActive,

    #[error("no controller or Wii Remote is enabled for recording")]
    NoInputDevices,

    #[error("invalid recording file: bad DTM magic")]
    InvalidHeader,

    #[error("recording file is truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("movie state chunk could not be encoded: {0}")]
    StateEncoding(String),
}

#[derive(Error, Debug)]
pub enum ChecksumError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checksum worker exited without reporting")]
    WorkerLost,
}
