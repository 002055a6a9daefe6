use serde::{Deserialize, Serialize};

use crate::error::MovieError;

/// Movie bookkeeping stored inside every save state, whether or not a movie
/// is active. Totals are not part of it; they come from the recording file
/// when the state is loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieStateChunk {
    pub current_frame: u64,
    pub current_byte: u64,
    pub current_lag_count: u64,
    pub current_input_count: u64,
    pub polled: bool,
    pub tick_count_at_last_input: u64,
}

impl MovieStateChunk {
    pub fn to_postcard_bytes(&self) -> Result<Vec<u8>, MovieError> {
        postcard::to_stdvec(self).map_err(|e| MovieError::StateEncoding(e.to_string()))
    }

    pub fn from_postcard_bytes(bytes: &[u8]) -> Result<Self, MovieError> {
        postcard::from_bytes(bytes).map_err(|e| MovieError::StateEncoding(e.to_string()))
    }
}
