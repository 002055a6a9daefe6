//! The 8-byte controller snapshot stored in the input stream.

use bitflags::bitflags;
use cubium_core::controller::{GcPadStatus, PadButtons};

pub const CONTROLLER_STATE_SIZE: usize = 8;

bitflags! {
    /// Digital half of a [`ControllerState`], stored as a little-endian u16.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct PadStateFlags: u16 {
        const START = 1 << 0;
        const A = 1 << 1;
        const B = 1 << 2;
        const X = 1 << 3;
        const Y = 1 << 4;
        const Z = 1 << 5;
        const DPAD_UP = 1 << 6;
        const DPAD_DOWN = 1 << 7;
        const DPAD_LEFT = 1 << 8;
        const DPAD_RIGHT = 1 << 9;
        const L = 1 << 10;
        const R = 1 << 11;
        /// Disc change requested on this poll.
        const DISC = 1 << 12;
        /// Reset button tapped on this poll.
        const RESET = 1 << 13;
        const IS_CONNECTED = 1 << 14;
        const GET_ORIGIN = 1 << 15;
    }
}

/// Pad button to snapshot flag, in the order both directions translate.
const BUTTON_MAP: [(PadButtons, PadStateFlags); 13] = [
    (PadButtons::A, PadStateFlags::A),
    (PadButtons::B, PadStateFlags::B),
    (PadButtons::X, PadStateFlags::X),
    (PadButtons::Y, PadStateFlags::Y),
    (PadButtons::TRIGGER_Z, PadStateFlags::Z),
    (PadButtons::START, PadStateFlags::START),
    (PadButtons::UP, PadStateFlags::DPAD_UP),
    (PadButtons::DOWN, PadStateFlags::DPAD_DOWN),
    (PadButtons::LEFT, PadStateFlags::DPAD_LEFT),
    (PadButtons::RIGHT, PadStateFlags::DPAD_RIGHT),
    (PadButtons::TRIGGER_L, PadStateFlags::L),
    (PadButtons::TRIGGER_R, PadStateFlags::R),
    (PadButtons::GET_ORIGIN, PadStateFlags::GET_ORIGIN),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ControllerState {
    pub flags: PadStateFlags,
    pub trigger_l: u8,
    pub trigger_r: u8,
    pub analog_stick_x: u8,
    pub analog_stick_y: u8,
    pub c_stick_x: u8,
    pub c_stick_y: u8,
}

impl ControllerState {
    /// Captures a polled pad. Disc-change and reset are event flags supplied
    /// by the engine, not by the pad.
    pub fn from_pad_status(status: &GcPadStatus, disc: bool, reset: bool) -> Self {
        let mut flags = PadStateFlags::empty();
        for (button, flag) in BUTTON_MAP {
            flags.set(flag, status.button.contains(button));
        }
        flags.set(PadStateFlags::IS_CONNECTED, status.is_connected);
        flags.set(PadStateFlags::DISC, disc);
        flags.set(PadStateFlags::RESET, reset);

        Self {
            flags,
            trigger_l: status.trigger_left,
            trigger_r: status.trigger_right,
            analog_stick_x: status.stick_x,
            analog_stick_y: status.stick_y,
            c_stick_x: status.substick_x,
            c_stick_y: status.substick_y,
        }
    }

    /// Overwrites the device-level status with this snapshot.
    ///
    /// The button mask is rebuilt from scratch with `USE_ORIGIN` always set;
    /// a pressed A or B also drives its analog value to full. Analog A/B are
    /// otherwise left as polled.
    pub fn apply_to(&self, status: &mut GcPadStatus) {
        status.is_connected = self.is_connected();
        status.trigger_left = self.trigger_l;
        status.trigger_right = self.trigger_r;
        status.stick_x = self.analog_stick_x;
        status.stick_y = self.analog_stick_y;
        status.substick_x = self.c_stick_x;
        status.substick_y = self.c_stick_y;

        let mut button = PadButtons::USE_ORIGIN;
        for (pad_button, flag) in BUTTON_MAP {
            if self.flags.contains(flag) {
                button |= pad_button;
            }
        }
        if self.flags.contains(PadStateFlags::A) {
            status.analog_a = 0xFF;
        }
        if self.flags.contains(PadStateFlags::B) {
            status.analog_b = 0xFF;
        }
        status.button = button;
    }

    pub fn is_connected(&self) -> bool {
        self.flags.contains(PadStateFlags::IS_CONNECTED)
    }

    pub fn pressed(&self, flag: PadStateFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn to_bytes(&self) -> [u8; CONTROLLER_STATE_SIZE] {
        let [lo, hi] = self.flags.bits().to_le_bytes();
        [
            lo,
            hi,
            self.trigger_l,
            self.trigger_r,
            self.analog_stick_x,
            self.analog_stick_y,
            self.c_stick_x,
            self.c_stick_y,
        ]
    }

    /// Decodes the first [`CONTROLLER_STATE_SIZE`] bytes, `None` if short.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let raw = bytes.first_chunk::<CONTROLLER_STATE_SIZE>()?;
        Some(Self {
            flags: PadStateFlags::from_bits_retain(u16::from_le_bytes([raw[0], raw[1]])),
            trigger_l: raw[2],
            trigger_r: raw[3],
            analog_stick_x: raw[4],
            analog_stick_y: raw[5],
            c_stick_x: raw[6],
            c_stick_y: raw[7],
        })
    }

    /// Field summary used in desync reports.
    pub fn describe(&self) -> String {
        let b = |flag| u8::from(self.flags.contains(flag));
        format!(
            "Start={}, A={}, B={}, X={}, Y={}, Z={}, DUp={}, DDown={}, DLeft={}, DRight={}, \
             L={}, R={}, LT={}, RT={}, AnalogX={}, AnalogY={}, CX={}, CY={}, Connected={}",
            b(PadStateFlags::START),
            b(PadStateFlags::A),
            b(PadStateFlags::B),
            b(PadStateFlags::X),
            b(PadStateFlags::Y),
            b(PadStateFlags::Z),
            b(PadStateFlags::DPAD_UP),
            b(PadStateFlags::DPAD_DOWN),
            b(PadStateFlags::DPAD_LEFT),
            b(PadStateFlags::DPAD_RIGHT),
            b(PadStateFlags::L),
            b(PadStateFlags::R),
            self.trigger_l,
            self.trigger_r,
            self.analog_stick_x,
            self.analog_stick_y,
            self.c_stick_x,
            self.c_stick_y,
            b(PadStateFlags::IS_CONNECTED),
        )
    }
}
