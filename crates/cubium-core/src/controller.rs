//! GameCube pad status as produced by the serial interface, plus the device
//! kinds that can sit on an SI port.

use bitflags::bitflags;

/// Number of serial interface ports.
pub const MAX_SI_CHANNELS: usize = 4;
/// Number of emulated Wii Remotes.
pub const MAX_WIIMOTES: usize = 4;

/// Neutral position of both analog sticks.
pub const STICK_CENTER: u8 = 0x80;

bitflags! {
    /// Digital button mask reported by a GameCube pad.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct PadButtons: u16 {
        const LEFT = 0x0001;
        const RIGHT = 0x0002;
        const DOWN = 0x0004;
        const UP = 0x0008;
        const TRIGGER_Z = 0x0010;
        const TRIGGER_R = 0x0020;
        const TRIGGER_L = 0x0040;
        const USE_ORIGIN = 0x0080;
        const A = 0x0100;
        const B = 0x0200;
        const X = 0x0400;
        const Y = 0x0800;
        const START = 0x1000;
        const GET_ORIGIN = 0x2000;
    }
}

/// Device-level pad status polled once per SI transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GcPadStatus {
    pub button: PadButtons,
    pub stick_x: u8,
    pub stick_y: u8,
    pub substick_x: u8,
    pub substick_y: u8,
    pub trigger_left: u8,
    pub trigger_right: u8,
    pub analog_a: u8,
    pub analog_b: u8,
    pub is_connected: bool,
}

impl Default for GcPadStatus {
    fn default() -> Self {
        Self {
            button: PadButtons::empty(),
            stick_x: STICK_CENTER,
            stick_y: STICK_CENTER,
            substick_x: STICK_CENTER,
            substick_y: STICK_CENTER,
            trigger_left: 0,
            trigger_right: 0,
            analog_a: 0,
            analog_b: 0,
            is_connected: true,
        }
    }
}

/// Device plugged into an SI port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SiDevice {
    #[default]
    None,
    GcController,
    WiiUAdapter,
    Steering,
    DanceMat,
    /// DK Bongos.
    TaruKonga,
    /// Emulated Game Boy Advance link.
    GbaEmulated,
    Keyboard,
}

impl SiDevice {
    /// Devices that speak the standard pad protocol and can be recorded as
    /// GameCube controllers.
    pub fn is_gc_controller(self) -> bool {
        matches!(
            self,
            SiDevice::GcController
                | SiDevice::WiiUAdapter
                | SiDevice::Steering
                | SiDevice::DanceMat
                | SiDevice::TaruKonga
        )
    }
}
