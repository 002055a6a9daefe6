use std::{
    ffi::OsString,
    fmt,
    fs::{self, File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use cubium_core::controller::{GcPadStatus, MAX_SI_CHANNELS, MAX_WIIMOTES, SiDevice};
use tracing::{debug, info, warn};

use super::{
    checksum::{
        ChecksumJob, DSP_COEF_BYTE_SIZE, DSP_IROM_BYTE_SIZE, Md5Digest, dsp_rom_hash,
        revision_to_bytes,
    },
    display::{InputDisplay, pad_display_string, wiimote_display_string},
    header::{DtmHeader, GAME_ID_LEN, HEADER_SIZE, REVISION_LEN},
    host::{BootInfo, ControllerType, ControllerTypeArray, DspRoms, MovieHost, WiimoteEnabledArray},
    pad::{CONTROLLER_STATE_SIZE, ControllerState, PadStateFlags},
    state::MovieStateChunk,
};
use crate::error::MovieError;

/// Scratch save state written when recording starts mid-game.
pub const SCRATCH_STATE_NAME: &str = "dtm.sav";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlayMode {
    #[default]
    None,
    Recording,
    Playing,
}

pub type GcManipFunction = Box<dyn FnMut(&mut GcPadStatus, usize) + Send>;
pub type WiiManipFunction = Box<dyn FnMut(&mut [u8], usize) + Send>;

#[derive(Debug)]
enum ChecksumPurpose {
    /// Store the digest in the recording being made.
    Record,
    /// Compare against the digest embedded in the movie being played.
    Verify(Md5Digest),
}

#[derive(Debug)]
struct PendingChecksum {
    job: ChecksumJob,
    purpose: ChecksumPurpose,
}

/// `<movie>.sav`, the save state that accompanies a recording made from one.
pub fn sibling_state_path(movie_path: &Path) -> PathBuf {
    let mut name = OsString::from(movie_path.as_os_str());
    name.push(".sav");
    PathBuf::from(name)
}

fn alert(host: &mut dyn MovieHost, message: &str) {
    warn!("{message}");
    host.panic_alert(message);
}

fn notify(host: &mut dyn MovieHost, message: &str, duration_ms: u32) {
    info!("{message}");
    host.display_message(message, duration_ms);
}

fn game_ids_match(recorded: &str, running: &str) -> bool {
    recorded
        .bytes()
        .take(GAME_ID_LEN)
        .eq(running.bytes().take(GAME_ID_LEN))
}

/// Input recording and playback state for one emulation session.
///
/// Every operation takes the emulator services it needs as `host`; the
/// engine itself owns only movie state. Callers serialize access per the
/// thread each entry point is meant for (host, emu or CPU thread), except
/// for the display strings, which are shared through [`InputDisplay`].
pub struct Movie {
    read_only: bool,
    rerecords: u32,
    play_mode: PlayMode,

    controllers: ControllerTypeArray,
    wiimotes: WiimoteEnabledArray,
    pad_state: ControllerState,
    header: DtmHeader,
    input: Vec<u8>,
    current_byte: usize,

    current_frame: u64,
    total_frames: u64,
    current_lag_count: u64,
    total_lag_count: u64,
    current_input_count: u64,
    total_input_count: u64,
    total_tick_count: u64,
    tick_count_at_last_input: u64,
    recording_start_time: u64,

    save_config: bool,
    netplay: bool,
    clear_save: bool,
    disc_change_pending: bool,
    reset_pending: bool,
    author: String,
    disc_change: String,
    md5: Md5Digest,
    bongos: u8,
    memcards: u8,
    revision: [u8; REVISION_LEN],
    dsp_irom_hash: u32,
    dsp_coef_hash: u32,

    recording_from_save_state: bool,
    polled: bool,

    display: InputDisplay,
    gc_manip: Option<GcManipFunction>,
    wii_manip: Option<WiiManipFunction>,

    current_file_name: Option<PathBuf>,
    checksum: Option<PendingChecksum>,
}

impl Default for Movie {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Movie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Movie")
            .field("play_mode", &self.play_mode)
            .field("read_only", &self.read_only)
            .field("current_byte", &self.current_byte)
            .field("input_len", &self.input.len())
            .field("current_frame", &self.current_frame)
            .field("total_frames", &self.total_frames)
            .finish_non_exhaustive()
    }
}

impl Movie {
    pub fn new() -> Self {
        Self {
            read_only: true,
            rerecords: 0,
            play_mode: PlayMode::None,
            controllers: [ControllerType::None; MAX_SI_CHANNELS],
            wiimotes: [false; MAX_WIIMOTES],
            pad_state: ControllerState::default(),
            header: DtmHeader::default(),
            input: Vec::new(),
            current_byte: 0,
            current_frame: 0,
            total_frames: 0,
            current_lag_count: 0,
            total_lag_count: 0,
            current_input_count: 0,
            total_input_count: 0,
            total_tick_count: 0,
            tick_count_at_last_input: 0,
            recording_start_time: 0,
            save_config: false,
            netplay: false,
            clear_save: false,
            disc_change_pending: false,
            reset_pending: false,
            author: String::new(),
            disc_change: String::new(),
            md5: [0; 16],
            bongos: 0,
            memcards: 0,
            revision: [0; REVISION_LEN],
            dsp_irom_hash: 0,
            dsp_coef_hash: 0,
            recording_from_save_state: false,
            polled: false,
            display: InputDisplay::new(),
            gc_manip: None,
            wii_manip: None,
            current_file_name: None,
            checksum: None,
        }
    }

    /// Boot hook, called whether or not a movie is active (possibly after
    /// [`Movie::begin_recording_input`] or [`Movie::play_input`]).
    pub fn init(&mut self, host: &mut dyn MovieHost, boot: &BootInfo) {
        self.current_file_name = boot.disc_path.clone();
        self.polled = false;
        self.save_config = false;

        if self.is_playing_input() {
            self.read_header(host);
            self.start_checksum_verify(host);
            let running = host.game_id();
            if !game_ids_match(&self.header.game_id, &running) {
                let message = format!(
                    "The recorded game ({}) is not the same as the selected game ({running})",
                    self.header.game_id
                );
                alert(host, &message);
                self.end_play_input(host, false);
            }
        }

        if self.is_recording_input() {
            self.gather_settings(host);
            self.start_checksum_record(host);
            self.tick_count_at_last_input = 0;
        }

        self.pad_state = ControllerState::default();
        self.display.clear();

        if !self.is_movie_active() {
            self.recording_from_save_state = false;
            self.rerecords = 0;
            self.current_byte = 0;
            self.current_frame = 0;
            self.current_lag_count = 0;
            self.current_input_count = 0;
        }
    }

    pub fn shutdown(&mut self) {
        self.current_input_count = 0;
        self.total_input_count = 0;
        self.total_frames = 0;
        self.tick_count_at_last_input = 0;
        self.input.clear();
    }

    /// Once per emulated video interval.
    pub fn frame_update(&mut self) {
        self.current_frame += 1;
        if !self.polled {
            self.current_lag_count += 1;
        }
        if self.is_recording_input() {
            self.total_frames = self.current_frame;
            self.total_lag_count = self.current_lag_count;
        }
        self.polled = false;
    }

    /// Once per input event.
    pub fn input_update(&mut self, host: &dyn MovieHost) {
        self.current_input_count += 1;
        if self.is_recording_input() {
            let ticks = host.ticks();
            self.total_input_count = self.current_input_count;
            self.total_tick_count += ticks.saturating_sub(self.tick_count_at_last_input);
            self.tick_count_at_last_input = ticks;
        }
    }

    pub fn set_polled_device(&mut self) {
        self.polled = true;
    }

    pub fn set_read_only(&mut self, host: &mut dyn MovieHost, enabled: bool) {
        if self.read_only != enabled {
            let message = if enabled {
                "Read-only mode."
            } else {
                "Read+Write mode."
            };
            notify(host, message, 1000);
        }
        self.read_only = enabled;
    }

    pub fn set_clear_save(&mut self, enabled: bool) {
        self.clear_save = enabled;
    }

    /// Records a disc swap so it is replayed at the same poll.
    pub fn signal_disc_change(&mut self, host: &mut dyn MovieHost, new_path: &str) {
        if !self.is_recording_input() {
            return;
        }
        let filename = new_path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(new_path)
            .to_string();
        if filename.len() > super::header::DISC_CHANGE_LEN {
            let message = format!(
                "The disc change to \"{filename}\" could not be saved in the .dtm file.\n\
                 The filename of the disc image must not be longer than 40 characters."
            );
            alert(host, &message);
        }
        self.disc_change = filename;
        self.disc_change_pending = true;
    }

    pub fn set_reset(&mut self, reset: bool) {
        self.reset_pending = reset;
    }

    pub fn play_mode(&self) -> PlayMode {
        self.play_mode
    }

    pub fn is_recording_input(&self) -> bool {
        self.play_mode == PlayMode::Recording
    }

    pub fn is_playing_input(&self) -> bool {
        self.play_mode == PlayMode::Playing
    }

    pub fn is_movie_active(&self) -> bool {
        self.play_mode != PlayMode::None
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_recording_input_from_save_state(&self) -> bool {
        self.recording_from_save_state
    }

    pub fn is_just_starting_recording_input_from_save_state(&self) -> bool {
        self.recording_from_save_state && self.current_frame == 0
    }

    pub fn is_just_starting_playing_input_from_save_state(&self) -> bool {
        self.recording_from_save_state && self.current_frame == 1 && self.is_playing_input()
    }

    pub fn is_using_pad(&self, controller: usize) -> bool {
        self.controllers
            .get(controller)
            .is_some_and(|&ty| ty != ControllerType::None)
    }

    pub fn is_using_bongo(&self, controller: usize) -> bool {
        controller < MAX_SI_CHANNELS && self.bongos & (1 << controller) != 0
    }

    pub fn is_using_gba(&self, controller: usize) -> bool {
        self.controllers.get(controller) == Some(&ControllerType::Gba)
    }

    pub fn is_using_wiimote(&self, wiimote: usize) -> bool {
        self.wiimotes.get(wiimote).copied().unwrap_or(false)
    }

    pub fn is_using_memcard(&self, memcard: usize) -> bool {
        memcard < 2 && self.memcards & (1 << memcard) != 0
    }

    pub fn is_config_saved(&self) -> bool {
        self.save_config
    }

    pub fn is_starting_from_clear_save(&self) -> bool {
        self.clear_save
    }

    pub fn is_netplay_recording(&self) -> bool {
        self.netplay
    }

    pub fn recording_start_time(&self) -> u64 {
        self.recording_start_time
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn current_lag_count(&self) -> u64 {
        self.current_lag_count
    }

    pub fn total_lag_count(&self) -> u64 {
        self.total_lag_count
    }

    pub fn current_input_count(&self) -> u64 {
        self.current_input_count
    }

    pub fn total_input_count(&self) -> u64 {
        self.total_input_count
    }

    pub fn total_tick_count(&self) -> u64 {
        self.total_tick_count
    }

    pub fn rerecord_count(&self) -> u32 {
        self.rerecords
    }

    pub fn current_byte(&self) -> usize {
        self.current_byte
    }

    /// The recorded or loaded input stream.
    pub fn input_stream(&self) -> &[u8] {
        &self.input
    }

    pub fn md5(&self) -> Md5Digest {
        self.md5
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn disc_change(&self) -> &str {
        &self.disc_change
    }

    /// Header of the movie most recently loaded, for settings that are
    /// applied outside the engine (graphics options).
    pub fn loaded_header(&self) -> &DtmHeader {
        &self.header
    }

    /// Pushes the movie's pad assignment onto the SI bus.
    pub fn change_pads(&mut self, host: &mut dyn MovieHost) {
        if !host.is_running() {
            return;
        }

        let configured: ControllerTypeArray =
            std::array::from_fn(|i| ControllerType::from_si_device(host.si_device(i)));
        if configured == self.controllers {
            return;
        }

        for channel in 0..MAX_SI_CHANNELS {
            let device = if self.is_using_gba(channel) {
                SiDevice::GbaEmulated
            } else if self.is_using_pad(channel) {
                let current = host.si_device(channel);
                if current.is_gc_controller() {
                    current
                } else if self.is_using_bongo(channel) {
                    SiDevice::TaruKonga
                } else {
                    SiDevice::GcController
                }
            } else {
                SiDevice::None
            };
            host.change_si_device(channel, device);
        }
    }

    /// Pushes the movie's Wii Remote assignment onto the emulated remotes.
    /// With `instantly`, an already matching assignment is left alone since
    /// reconnecting a remote can desync it.
    pub fn change_wii_pads(&mut self, host: &mut dyn MovieHost, instantly: bool) {
        let configured: WiimoteEnabledArray = std::array::from_fn(|i| host.wiimote_enabled(i));
        if instantly && configured == self.wiimotes {
            return;
        }
        for wiimote in 0..MAX_WIIMOTES {
            host.set_wiimote_enabled(wiimote, self.wiimotes[wiimote]);
        }
    }

    pub fn begin_recording_input(
        &mut self,
        host: &mut dyn MovieHost,
        controllers: ControllerTypeArray,
        wiimotes: WiimoteEnabledArray,
    ) -> Result<(), MovieError> {
        if self.is_movie_active() {
            return Err(MovieError::AlreadyActive);
        }
        if controllers.iter().all(|&c| c == ControllerType::None)
            && wiimotes.iter().all(|&w| !w)
        {
            return Err(MovieError::NoInputDevices);
        }

        self.controllers = controllers;
        self.wiimotes = wiimotes;
        self.current_frame = 0;
        self.total_frames = 0;
        self.current_lag_count = 0;
        self.total_lag_count = 0;
        self.current_input_count = 0;
        self.total_input_count = 0;
        self.total_tick_count = 0;
        self.tick_count_at_last_input = 0;
        self.bongos = 0;
        self.memcards = 0;

        if host.netplay_running() {
            self.netplay = true;
            self.recording_start_time = host.netplay_emulated_time();
        } else if let Some(rtc) = host.custom_rtc() {
            self.recording_start_time = rtc;
        } else {
            self.recording_start_time = host.local_time();
        }

        self.rerecords = 0;

        for channel in 0..MAX_SI_CHANNELS {
            if host.si_device(channel) == SiDevice::TaruKonga {
                self.bongos |= 1 << channel;
            }
        }

        if host.is_running_and_started() {
            let save_path = host.state_saves_dir().join(SCRATCH_STATE_NAME);
            if save_path.exists() {
                if let Err(err) = fs::remove_file(&save_path) {
                    warn!("failed to remove {}: {err}", save_path.display());
                }
            }
            if !host.save_state(&save_path) {
                warn!("failed to write {}", save_path.display());
            }
            self.recording_from_save_state = true;

            self.start_checksum_record(host);
            self.gather_settings(host);
        } else {
            // Remotes must start from a clean state before the game boots.
            host.reset_all_wiimotes();
        }

        self.play_mode = PlayMode::Recording;
        self.author = host.movie_author();
        self.input.clear();
        self.current_byte = 0;

        notify(host, "Starting movie recording", 2000);
        Ok(())
    }

    /// Captures a polled pad into the display and the pending snapshot.
    pub fn check_pad_status(&mut self, pad: &GcPadStatus, controller: usize) {
        self.pad_state =
            ControllerState::from_pad_status(pad, self.disc_change_pending, self.reset_pending);
        self.disc_change_pending = false;
        self.reset_pending = false;
        self.display
            .set_pad(controller, pad_display_string(&self.pad_state, controller));
    }

    pub fn record_input(&mut self, pad: &GcPadStatus, controller: usize) {
        if !self.is_recording_input() || !self.is_using_pad(controller) {
            return;
        }
        self.check_pad_status(pad, controller);

        self.input.resize(self.current_byte, 0);
        self.input.extend_from_slice(&self.pad_state.to_bytes());
        self.current_byte += CONTROLLER_STATE_SIZE;
    }

    /// Updates the display for a Wii Remote report and records it.
    pub fn check_wiimote_status(&mut self, host: &dyn MovieHost, wiimote: usize, report: &[u8]) {
        self.display
            .set_wiimote(wiimote, wiimote_display_string(wiimote, report));
        if self.is_recording_input() {
            self.record_wiimote(host, wiimote, report);
        }
    }

    pub fn record_wiimote(&mut self, host: &dyn MovieHost, wiimote: usize, data: &[u8]) {
        if !self.is_recording_input() || !self.is_using_wiimote(wiimote) {
            return;
        }
        let Ok(size) = u8::try_from(data.len()) else {
            warn!("Wii Remote report of {} bytes cannot be recorded", data.len());
            return;
        };

        self.input_update(host);
        self.input.resize(self.current_byte, 0);
        self.input.push(size);
        self.input.extend_from_slice(data);
        self.current_byte += 1 + data.len();
    }

    /// Loads a recording for playback.
    ///
    /// Returns the path of the accompanying save state when the movie starts
    /// from one and the file exists; the caller loads it.
    pub fn play_input(
        &mut self,
        host: &mut dyn MovieHost,
        movie_path: &Path,
    ) -> Result<Option<PathBuf>, MovieError> {
        if self.is_movie_active() {
            return Err(MovieError::AlreadyActive);
        }

        let bytes = fs::read(movie_path)?;
        let header = match DtmHeader::decode(&bytes) {
            Ok(header) => header,
            Err(MovieError::InvalidHeader) => {
                alert(host, "Invalid recording file");
                return Err(MovieError::InvalidHeader);
            }
            Err(err) => return Err(err),
        };

        self.header = header;
        self.read_header(host);
        self.total_frames = self.header.frame_count;
        self.total_lag_count = self.header.lag_count;
        self.total_input_count = self.header.input_count;
        self.total_tick_count = self.header.tick_count;
        self.current_frame = 0;
        self.current_lag_count = 0;
        self.current_input_count = 0;

        self.play_mode = PlayMode::Playing;

        // Remotes must start from a clean state before the game boots.
        host.reset_all_wiimotes();

        self.input = bytes[HEADER_SIZE..].to_vec();
        self.current_byte = 0;
        info!(
            "playing {} ({} frames, {} input bytes)",
            movie_path.display(),
            self.total_frames,
            self.input.len()
        );

        let mut savestate = None;
        if self.header.from_save_state {
            let state_path = sibling_state_path(movie_path);
            if state_path.exists() {
                savestate = Some(state_path);
            }
            self.recording_from_save_state = true;
            self.load_input(host, movie_path);
        }

        Ok(savestate)
    }

    /// Called after a save state is loaded while a movie is active.
    ///
    /// Re-reads the recording, bumps its rerecord count in read-write mode,
    /// and checks that the stream up to the state's cursor matches what is
    /// in memory, warning on any divergence.
    pub fn load_input(&mut self, host: &mut dyn MovieHost, movie_path: &Path) {
        let opened = OpenOptions::new().read(true).write(true).open(movie_path);
        let mut bytes = Vec::new();
        let mut file = match opened.and_then(|mut f| f.read_to_end(&mut bytes).map(|_| f)) {
            Ok(file) => file,
            Err(err) => {
                debug!("failed to open {}: {err}", movie_path.display());
                alert(host, &format!("Failed to read {}", movie_path.display()));
                self.end_play_input(host, false);
                return;
            }
        };

        self.header = match DtmHeader::decode(&bytes) {
            Ok(header) => header,
            Err(_) => {
                let message = format!(
                    "Savestate movie {} is corrupted, movie recording stopping...",
                    movie_path.display()
                );
                alert(host, &message);
                self.end_play_input(host, false);
                return;
            }
        };
        self.read_header(host);

        if !self.read_only {
            self.rerecords += 1;
            self.header.num_rerecords = self.rerecords;
            let written = file
                .seek(SeekFrom::Start(0))
                .and_then(|_| file.write_all(&self.header.encode()));
            if let Err(err) = written {
                warn!("failed to update rerecord count in {}: {err}", movie_path.display());
            }
        }
        drop(file);

        self.change_pads(host);
        if host.is_wii() {
            self.change_wii_pads(host, true);
        }

        let saved = &bytes[HEADER_SIZE..];
        let mut after_end = false;

        // Only happens when data was cut from the file by hand.
        if self.current_byte > saved.len() {
            let message = format!(
                "Warning: You loaded a save whose movie ends before the current frame in the \
                 save (byte {} < {}) (frame {} < {}). You should load another save before \
                 continuing.",
                saved.len() + HEADER_SIZE,
                self.current_byte.saturating_add(HEADER_SIZE),
                self.header.frame_count,
                self.current_frame
            );
            alert(host, &message);
            after_end = true;
        }

        if !self.read_only || self.input.is_empty() {
            self.total_frames = self.header.frame_count;
            self.total_lag_count = self.header.lag_count;
            self.total_input_count = self.header.input_count;
            self.total_tick_count = self.header.tick_count;
            self.tick_count_at_last_input = self.header.tick_count;
            self.input = saved.to_vec();
        } else if self.current_byte > 0 && self.current_byte <= saved.len() {
            if self.current_byte > self.input.len() {
                after_end = true;
                let message = format!(
                    "Warning: You loaded a save that's after the end of the current movie. \
                     (byte {} > {}) (input {} > {}). You should load another save before \
                     continuing, or load this state with read-only mode off.",
                    self.current_byte.saturating_add(HEADER_SIZE),
                    self.input.len() + HEADER_SIZE,
                    self.current_input_count,
                    self.total_input_count
                );
                alert(host, &message);
            } else {
                self.verify_prefix(host, &saved[..self.current_byte]);
            }
        }

        self.save_config = self.header.save_config;

        if after_end {
            self.end_play_input(host, false);
        } else if self.read_only {
            if self.play_mode != PlayMode::Playing {
                self.play_mode = PlayMode::Playing;
                notify(host, "Switched to playback", 2000);
            }
        } else if self.play_mode != PlayMode::Recording {
            self.play_mode = PlayMode::Recording;
            notify(host, "Switched to recording", 2000);
        }
    }

    /// Compares the in-memory stream against the file's prefix up to the
    /// save state's cursor, then adopts the file's prefix.
    fn verify_prefix(&mut self, host: &mut dyn MovieHost, movie_prefix: &[u8]) {
        let Some(mismatch) = movie_prefix
            .iter()
            .zip(&self.input)
            .position(|(movie, current)| movie != current)
        else {
            return;
        };

        if self.is_using_wiimote(0) {
            let byte_offset = mismatch + HEADER_SIZE;
            let message = format!(
                "Warning: You loaded a save whose movie mismatches on byte {byte_offset} \
                 ({byte_offset:#x}). You should load another save before continuing, or load \
                 this state with read-only mode off. Otherwise you'll probably get a desync."
            );
            alert(host, &message);
        } else {
            let frame = mismatch / CONTROLLER_STATE_SIZE;
            let offset = frame * CONTROLLER_STATE_SIZE;
            let current = ControllerState::from_bytes(&self.input[offset..]).unwrap_or_default();
            let movie = ControllerState::from_bytes(&movie_prefix[offset..]).unwrap_or_default();
            let message = format!(
                "Warning: You loaded a save whose movie mismatches on frame {frame}. You should \
                 load another save before continuing, or load this state with read-only mode \
                 off. Otherwise you'll probably get a desync.\n\n\
                 More information: The current movie is {} frames long and the savestate's \
                 movie is {} frames long.\n\n\
                 On frame {frame}, the current movie presses:\n{}\n\n\
                 On frame {frame}, the savestate's movie presses:\n{}",
                self.total_frames,
                self.header.frame_count,
                current.describe(),
                movie.describe(),
            );
            alert(host, &message);
        }

        self.input[..movie_prefix.len()].copy_from_slice(movie_prefix);
    }

    fn check_input_end(&mut self, host: &mut dyn MovieHost) {
        let past_recorded_ticks =
            host.ticks() > self.total_tick_count && !self.recording_from_save_state;
        if self.current_byte >= self.input.len() || past_recorded_ticks {
            self.end_play_input(host, !self.read_only);
        }
    }

    /// Overwrites a polled pad with the next recorded snapshot.
    ///
    /// Playback relies on pads being polled in the same order as during
    /// recording.
    pub fn play_controller(
        &mut self,
        host: &mut dyn MovieHost,
        pad: &mut GcPadStatus,
        controller: usize,
    ) {
        if !self.is_playing_input() || !self.is_using_pad(controller) || self.input.is_empty() {
            return;
        }

        let end = self.current_byte.checked_add(CONTROLLER_STATE_SIZE);
        let Some((end, state)) = end.and_then(|end| {
            self.input
                .get(self.current_byte..end)
                .and_then(ControllerState::from_bytes)
                .map(|state| (end, state))
        }) else {
            let message = format!(
                "Premature movie end in PlayController. {} + {} > {}",
                self.current_byte,
                CONTROLLER_STATE_SIZE,
                self.input.len()
            );
            alert(host, &message);
            self.end_play_input(host, !self.read_only);
            return;
        };
        self.pad_state = state;
        self.current_byte = end;

        state.apply_to(pad);

        if state.pressed(PadStateFlags::DISC) && !host.auto_change_disc() {
            host.cpu_break();
            let message = format!("Change the disc to {}", self.disc_change);
            alert(host, &message);
        }
        if state.pressed(PadStateFlags::RESET) {
            host.reset_button_tap();
        }

        self.display
            .set_pad(controller, pad_display_string(&state, controller));
        self.check_input_end(host);
    }

    /// Overwrites a Wii Remote report with the next recorded one. The stored
    /// size must equal `report.len()`; anything else is a fatal desync.
    pub fn play_wiimote(&mut self, host: &mut dyn MovieHost, wiimote: usize, report: &mut [u8]) -> bool {
        if !self.is_playing_input() || !self.is_using_wiimote(wiimote) || self.input.is_empty() {
            return false;
        }

        let Some(&size_in_movie) = self.input.get(self.current_byte) else {
            let message = format!(
                "Premature movie end in PlayWiimote. {} > {}",
                self.current_byte,
                self.input.len()
            );
            alert(host, &message);
            self.end_play_input(host, !self.read_only);
            return false;
        };

        let size = report.len();
        if size != usize::from(size_in_movie) {
            let remark = if self.controllers.iter().all(|&c| c == ControllerType::None) {
                " Try re-creating the recording with all GameCube controllers disabled \
                 (in Configure > GameCube > Device Settings)."
            } else {
                ""
            };
            let message = format!(
                "Fatal desync. Aborting playback. (Error in PlayWiimote: {size_in_movie} != \
                 {size}, byte {}.){remark}",
                self.current_byte
            );
            alert(host, &message);
            self.end_play_input(host, !self.read_only);
            return false;
        }

        self.current_byte += 1;
        let end = self.current_byte.checked_add(size);
        let Some((end, payload)) =
            end.and_then(|end| self.input.get(self.current_byte..end).map(|p| (end, p)))
        else {
            let message = format!(
                "Premature movie end in PlayWiimote. {} + {size} > {}",
                self.current_byte,
                self.input.len()
            );
            alert(host, &message);
            self.end_play_input(host, !self.read_only);
            return false;
        };
        report.copy_from_slice(payload);
        self.current_byte = end;
        self.current_input_count += 1;

        self.check_input_end(host);
        true
    }

    /// Ends playback. With `cont`, the active movie instead switches to
    /// recording from the current position. Totals are kept so a later save
    /// state load can still compare against the stream.
    pub fn end_play_input(&mut self, host: &mut dyn MovieHost, cont: bool) {
        if cont {
            if !self.is_movie_active() {
                warn!("cannot resume recording without an active movie");
                return;
            }
            self.play_mode = PlayMode::Recording;
            notify(host, "Reached movie end. Resuming recording.", 2000);
        } else if self.is_movie_active() {
            self.rerecords = 0;
            self.current_byte = 0;
            self.play_mode = PlayMode::None;
            notify(host, "Movie End.", 2000);
            self.recording_from_save_state = false;
        }
    }

    fn build_header(&self, host: &dyn MovieHost) -> DtmHeader {
        let is_wii = host.is_wii();
        let mut controllers = 0u8;
        let mut gba_controllers = 0u8;
        for i in 0..MAX_SI_CHANNELS {
            if self.is_using_gba(i) {
                gba_controllers |= 1 << i;
            }
            if self.is_using_pad(i) {
                controllers |= 1 << i;
            }
            if self.is_using_wiimote(i) && is_wii {
                controllers |= 1 << (i + 4);
            }
        }

        DtmHeader {
            game_id: host.game_id(),
            is_wii,
            controllers,
            from_save_state: self.recording_from_save_state,
            frame_count: self.total_frames,
            input_count: self.total_input_count,
            lag_count: self.total_lag_count,
            unique_id: 0,
            num_rerecords: self.rerecords,
            author: self.author.clone(),
            md5: self.md5,
            recording_start_time: self.recording_start_time,
            save_config: true,
            config: host.movie_config(),
            memcards: self.memcards,
            clear_save: self.clear_save,
            bongos: self.bongos,
            netplay: self.netplay,
            gba_controllers,
            disc_change: self.disc_change.clone(),
            revision: self.revision,
            dsp_irom_hash: self.dsp_irom_hash,
            dsp_coef_hash: self.dsp_coef_hash,
            tick_count: self.total_tick_count,
        }
    }

    fn write_recording(&self, host: &dyn MovieHost, path: &Path) -> Result<(), MovieError> {
        let header = self.build_header(host);
        let mut file = File::create(path)?;
        header.write_to(&mut file)?;
        file.write_all(&self.input)?;

        if self.recording_from_save_state {
            let scratch = host.state_saves_dir().join(SCRATCH_STATE_NAME);
            fs::copy(scratch, sibling_state_path(path))?;
        }
        Ok(())
    }

    /// Writes the header and stream to `path`, plus `<path>.sav` when the
    /// recording started from a save state. A disc checksum still being
    /// computed for this recording is waited for first. The outcome is also shown as an
    /// on-screen message.
    pub fn save_recording(
        &mut self,
        host: &mut dyn MovieHost,
        path: &Path,
    ) -> Result<(), MovieError> {
        if self
            .checksum
            .as_ref()
            .is_some_and(|pending| matches!(pending.purpose, ChecksumPurpose::Record))
        {
            self.wait_checksum(host);
        }
        let result = self.write_recording(&*host, path);
        match &result {
            Ok(()) => notify(host, &format!("DTM {} saved", path.display()), 2000),
            Err(err) => {
                warn!("saving {} failed: {err}", path.display());
                host.display_message(&format!("Failed to save {}", path.display()), 2000);
            }
        }
        result
    }

    /// Snapshot of the counters a save state carries.
    pub fn state_chunk(&self) -> MovieStateChunk {
        MovieStateChunk {
            current_frame: self.current_frame,
            current_byte: self.current_byte as u64,
            current_lag_count: self.current_lag_count,
            current_input_count: self.current_input_count,
            polled: self.polled,
            tick_count_at_last_input: self.tick_count_at_last_input,
        }
    }

    /// Restores counters from a save state. Follow with
    /// [`Movie::load_input`] when a movie is active.
    pub fn restore_state_chunk(&mut self, chunk: &MovieStateChunk) {
        self.current_frame = chunk.current_frame;
        self.current_byte = usize::try_from(chunk.current_byte).unwrap_or(usize::MAX);
        self.current_lag_count = chunk.current_lag_count;
        self.current_input_count = chunk.current_input_count;
        self.polled = chunk.polled;
        self.tick_count_at_last_input = chunk.tick_count_at_last_input;
    }

    fn read_header(&mut self, host: &mut dyn MovieHost) {
        let header = &self.header;
        for i in 0..MAX_SI_CHANNELS {
            self.controllers[i] = if header.gba_controllers & (1 << i) != 0 {
                ControllerType::Gba
            } else if header.controllers & (1 << i) != 0 {
                ControllerType::Gc
            } else {
                ControllerType::None
            };
            self.wiimotes[i] = header.controllers & (1 << (i + 4)) != 0;
        }
        self.recording_start_time = header.recording_start_time;
        self.rerecords = self.rerecords.max(header.num_rerecords);

        if header.save_config {
            self.save_config = true;
            self.clear_save = header.clear_save;
            self.memcards = header.memcards;
            self.bongos = header.bongos;
            self.netplay = header.netplay;
            self.revision = header.revision;
            host.apply_movie_config(&self.header);
        } else {
            self.gather_settings(host);
        }

        self.disc_change = self.header.disc_change.clone();
        self.author = self.header.author.clone();
        self.md5 = self.header.md5;
        self.dsp_irom_hash = self.header.dsp_irom_hash;
        self.dsp_coef_hash = self.header.dsp_coef_hash;
    }

    fn gather_settings(&mut self, host: &dyn MovieHost) {
        let settings = host.recording_settings();
        self.save_config = true;
        self.netplay = settings.netplay;
        self.clear_save = settings.clear_save;
        self.memcards |= settings.memcards;
        self.revision = revision_to_bytes(&settings.revision);
        (self.dsp_irom_hash, self.dsp_coef_hash) = match &settings.dsp {
            DspRoms::Hle => (0, 0),
            DspRoms::Lle { irom, coef } => (
                dsp_rom_hash(irom, DSP_IROM_BYTE_SIZE),
                dsp_rom_hash(coef, DSP_COEF_BYTE_SIZE),
            ),
        };
    }

    fn start_checksum_record(&mut self, host: &mut dyn MovieHost) {
        let Some(path) = self.current_file_name.clone() else {
            return;
        };
        notify(host, "Calculating checksum of game file...", 2000);
        self.checksum = Some(PendingChecksum {
            job: ChecksumJob::spawn(path),
            purpose: ChecksumPurpose::Record,
        });
    }

    fn start_checksum_verify(&mut self, host: &mut dyn MovieHost) {
        let Some(path) = self.current_file_name.clone() else {
            return;
        };
        if !self.header.has_md5() {
            return;
        }
        notify(host, "Verifying checksum...", 2000);
        self.checksum = Some(PendingChecksum {
            job: ChecksumJob::spawn(path),
            purpose: ChecksumPurpose::Verify(self.md5),
        });
    }

    /// Whether a disc checksum job is still outstanding.
    pub fn checksum_pending(&self) -> bool {
        self.checksum.is_some()
    }

    /// Non-blocking check for a finished checksum job. Returns `true` when
    /// a job completed during this call.
    pub fn poll_checksum(&mut self, host: &mut dyn MovieHost) -> bool {
        let Some(outcome) = self.checksum.as_ref().and_then(|p| p.job.poll()) else {
            return false;
        };
        if let Some(pending) = self.checksum.take() {
            self.finish_checksum(host, pending.purpose, outcome);
        }
        true
    }

    /// Blocks until the outstanding checksum job, if any, completes.
    pub fn wait_checksum(&mut self, host: &mut dyn MovieHost) {
        if let Some(pending) = self.checksum.take() {
            let outcome = pending.job.wait();
            self.finish_checksum(host, pending.purpose, outcome);
        }
    }

    fn finish_checksum(
        &mut self,
        host: &mut dyn MovieHost,
        purpose: ChecksumPurpose,
        outcome: Result<Md5Digest, crate::error::ChecksumError>,
    ) {
        let digest = match outcome {
            Ok(digest) => digest,
            Err(err) => {
                debug!("disc checksum skipped: {err}");
                return;
            }
        };
        match purpose {
            ChecksumPurpose::Record => {
                self.md5 = digest;
                notify(host, "Finished calculating checksum.", 2000);
            }
            ChecksumPurpose::Verify(expected) if expected == digest => {
                notify(host, "Checksum of current game matches the recorded game.", 2000);
            }
            ChecksumPurpose::Verify(_) => {
                notify(
                    host,
                    "Checksum of current game does not match the recorded game!",
                    3000,
                );
            }
        }
    }

    /// Handle for reading display strings from another thread.
    pub fn input_display(&self) -> InputDisplay {
        self.display.clone()
    }

    /// Display text for every device in use. Without an active movie the
    /// device set is taken from the current configuration.
    pub fn get_input_display(&mut self, host: &dyn MovieHost) -> String {
        if !self.is_movie_active() {
            for i in 0..MAX_SI_CHANNELS {
                self.controllers[i] = match host.si_device(i) {
                    SiDevice::GbaEmulated => ControllerType::Gba,
                    SiDevice::None => ControllerType::None,
                    _ => ControllerType::Gc,
                };
                self.wiimotes[i] = host.wiimote_enabled(i);
            }
        }
        let pads = std::array::from_fn(|i| self.is_using_pad(i));
        self.display.render(pads, self.wiimotes)
    }

    pub fn set_gc_input_manip(&mut self, func: Option<GcManipFunction>) {
        self.gc_manip = func;
    }

    pub fn set_wii_input_manip(&mut self, func: Option<WiiManipFunction>) {
        self.wii_manip = func;
    }

    pub fn call_gc_input_manip(&mut self, pad: &mut GcPadStatus, controller: usize) {
        if let Some(func) = self.gc_manip.as_mut() {
            func(pad, controller);
        }
    }

    pub fn call_wii_input_manip(&mut self, report: &mut [u8], wiimote: usize) {
        if let Some(func) = self.wii_manip.as_mut() {
            func(report, wiimote);
        }
    }
}
