//! DTM input movies: recording, playback and the on-disk format.
//!
//! A movie is a 256-byte header followed by the raw input stream. Pad polls
//! append fixed 8-byte [`ControllerState`] snapshots; Wii Remote reports
//! append a length byte and the report. Playback replays the stream in poll
//! order, so any divergence in emulation shows up as a desync.

pub mod checksum;
pub mod display;
mod engine;
pub mod header;
mod host;
pub mod pad;
mod state;

pub use checksum::{ChecksumJob, Md5Digest};
pub use display::InputDisplay;
pub use engine::{
    GcManipFunction, Movie, PlayMode, SCRATCH_STATE_NAME, WiiManipFunction, sibling_state_path,
};
pub use header::{DTM_MAGIC, DtmHeader, HEADER_SIZE, MovieConfig, is_movie_header};
pub use host::{
    BootInfo, ControllerType, ControllerTypeArray, DspRoms, MovieHost, RecordingSettings,
    WiimoteEnabledArray,
};
pub use pad::{CONTROLLER_STATE_SIZE, ControllerState, PadStateFlags};
pub use state::MovieStateChunk;
