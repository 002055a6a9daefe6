pub mod cheats;
pub mod error;
pub mod movie;

pub use error::{ChecksumError, MovieError, SearchErrorCode};
