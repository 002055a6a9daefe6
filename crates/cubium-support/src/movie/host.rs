//! What the movie engine needs from the surrounding emulator.

use std::{
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use cubium_core::controller::{MAX_SI_CHANNELS, SiDevice};

use super::header::{DtmHeader, MovieConfig};

/// How a pad port takes part in a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ControllerType {
    #[default]
    None,
    Gc,
    Gba,
}

impl ControllerType {
    /// Classifies the device currently configured on an SI port.
    pub fn from_si_device(device: SiDevice) -> Self {
        if device == SiDevice::GbaEmulated {
            ControllerType::Gba
        } else if device.is_gc_controller() {
            ControllerType::Gc
        } else {
            ControllerType::None
        }
    }
}

pub type ControllerTypeArray = [ControllerType; MAX_SI_CHANNELS];
pub type WiimoteEnabledArray = [bool; cubium_core::controller::MAX_WIIMOTES];

/// DSP configuration captured at recording start.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DspRoms {
    #[default]
    Hle,
    /// Raw IROM and COEF images as found on disk.
    Lle { irom: Vec<u8>, coef: Vec<u8> },
}

/// Values gathered from the emulator when a recording starts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordingSettings {
    /// Bit 0: slot A, bit 1: slot B.
    pub memcards: u8,
    pub clear_save: bool,
    pub netplay: bool,
    /// Source revision of the running build.
    pub revision: String,
    pub dsp: DspRoms,
}

/// Boot parameters the engine cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootInfo {
    /// Disc image path when booting from a disc, `None` for other sources.
    pub disc_path: Option<PathBuf>,
}

/// Emulator services consumed by [`super::Movie`].
///
/// Calls arrive from whichever thread drives the engine; implementors route
/// them to the right subsystem.
pub trait MovieHost {
    /// Core has a running machine.
    fn is_running(&self) -> bool;

    /// Core is running and has finished booting.
    fn is_running_and_started(&self) -> bool;

    /// Emulated CPU ticks since boot.
    fn ticks(&self) -> u64;

    fn game_id(&self) -> String;

    fn is_wii(&self) -> bool;

    /// Modal alert for conditions that need the user's attention.
    fn panic_alert(&mut self, message: &str);

    /// Transient on-screen status message.
    fn display_message(&mut self, message: &str, duration_ms: u32);

    fn si_device(&self, channel: usize) -> SiDevice;

    fn change_si_device(&mut self, channel: usize, device: SiDevice);

    fn wiimote_enabled(&self, wiimote: usize) -> bool;

    /// Connects or disconnects an emulated Wii Remote.
    fn set_wiimote_enabled(&mut self, wiimote: usize, enabled: bool);

    fn reset_all_wiimotes(&mut self);

    /// Directory holding save states; the scratch `dtm.sav` lives here.
    fn state_saves_dir(&self) -> PathBuf;

    fn save_state(&mut self, path: &Path) -> bool;

    fn movie_author(&self) -> String;

    /// Current emulator settings to embed in a recording.
    fn movie_config(&self) -> MovieConfig;

    /// Layers the settings embedded in a recording over the user's.
    fn apply_movie_config(&mut self, header: &DtmHeader);

    fn recording_settings(&self) -> RecordingSettings;

    /// Swaps to the disc named in a recorded disc change. `false` when the
    /// disc could not be found.
    fn auto_change_disc(&mut self) -> bool;

    /// Stops the emulated CPU at the next opportunity.
    fn cpu_break(&mut self);

    fn reset_button_tap(&mut self);

    fn netplay_running(&self) -> bool {
        false
    }

    fn netplay_emulated_time(&self) -> u64 {
        0
    }

    /// Configured custom RTC value, if enabled.
    fn custom_rtc(&self) -> Option<u64> {
        None
    }

    /// Local time in seconds since 1970.
    fn local_time(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}
