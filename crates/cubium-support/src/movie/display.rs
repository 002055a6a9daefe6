//! On-screen input display strings.
//!
//! Slots are written from the CPU thread while a pad or Wii Remote is polled
//! and read from the render thread, hence the shared lock.

use std::sync::Arc;

use cubium_core::controller::{MAX_SI_CHANNELS, MAX_WIIMOTES};
use parking_lot::Mutex;

use super::pad::{ControllerState, PadStateFlags};

const SLOT_COUNT: usize = MAX_SI_CHANNELS + MAX_WIIMOTES;

/// Cloneable handle to the per-device display slots.
#[derive(Debug, Clone, Default)]
pub struct InputDisplay {
    slots: Arc<Mutex<[String; SLOT_COUNT]>>,
}

impl InputDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pad(&self, controller: usize, text: String) {
        if controller < MAX_SI_CHANNELS {
            self.slots.lock()[controller] = text;
        }
    }

    pub fn set_wiimote(&self, wiimote: usize, text: String) {
        if wiimote < MAX_WIIMOTES {
            self.slots.lock()[MAX_SI_CHANNELS + wiimote] = text;
        }
    }

    pub fn clear(&self) {
        self.slots.lock().iter_mut().for_each(String::clear);
    }

    /// One line per enabled device, pads first.
    pub fn render(&self, pads: [bool; MAX_SI_CHANNELS], wiimotes: [bool; MAX_WIIMOTES]) -> String {
        let slots = self.slots.lock();
        let mut out = String::new();
        let enabled = pads.iter().chain(wiimotes.iter());
        for (slot, _) in slots.iter().zip(enabled).filter(|(_, on)| **on) {
            out.push_str(slot);
            out.push('\n');
        }
        out
    }
}

/// Renders one trigger-style axis: empty at rest, bare prefix at full.
pub fn analog_1d_to_string(v: u32, prefix: &str, range: u32) -> String {
    if v == 0 {
        String::new()
    } else if v == range {
        prefix.to_string()
    } else {
        format!("{prefix}:{v}")
    }
}

/// Renders a stick. Positions at the center or the rails collapse to
/// direction names; anything else prints raw coordinates.
pub fn analog_2d_to_string(x: u32, y: u32, prefix: &str, range: u32) -> String {
    let center = range / 2 + 1;
    let on_rail = |v: u32| v <= 1 || v == center || v >= range;

    if !(on_rail(x) && on_rail(y)) {
        return format!("{prefix}:{x},{y}");
    }

    let horizontal = if x < center { "LEFT" } else { "RIGHT" };
    let vertical = if y < center { "DOWN" } else { "UP" };
    match (x != center, y != center) {
        (true, true) => format!("{prefix}:{horizontal},{vertical}"),
        (true, false) => format!("{prefix}:{horizontal}"),
        (false, true) => format!("{prefix}:{vertical}"),
        (false, false) => String::new(),
    }
}

pub fn pad_display_string(state: &ControllerState, controller: usize) -> String {
    let mut out = format!("P{}:", controller + 1);

    if !state.is_connected() {
        out.push_str(" DISCONNECTED");
        return out;
    }

    const LABELS: [(PadStateFlags, &str); 11] = [
        (PadStateFlags::A, " A"),
        (PadStateFlags::B, " B"),
        (PadStateFlags::X, " X"),
        (PadStateFlags::Y, " Y"),
        (PadStateFlags::Z, " Z"),
        (PadStateFlags::START, " START"),
        (PadStateFlags::DPAD_UP, " UP"),
        (PadStateFlags::DPAD_DOWN, " DOWN"),
        (PadStateFlags::DPAD_LEFT, " LEFT"),
        (PadStateFlags::DPAD_RIGHT, " RIGHT"),
        (PadStateFlags::RESET, " RESET"),
    ];
    for (flag, label) in LABELS {
        if state.pressed(flag) {
            out.push_str(label);
        }
    }

    out += &analog_1d_to_string(state.trigger_l.into(), " L", 255);
    out += &analog_1d_to_string(state.trigger_r.into(), " R", 255);
    out += &analog_2d_to_string(
        state.analog_stick_x.into(),
        state.analog_stick_y.into(),
        " ANA",
        255,
    );
    out += &analog_2d_to_string(state.c_stick_x.into(), state.c_stick_y.into(), " C", 255);
    out
}

fn report_has_core(report_id: u8) -> bool {
    matches!(report_id, 0x30..=0x37 | 0x3e | 0x3f)
}

fn report_has_accel(report_id: u8) -> bool {
    matches!(report_id, 0x31 | 0x33 | 0x35 | 0x37 | 0x3e | 0x3f)
}

/// Renders core buttons and accelerometer data of a Wii Remote input report
/// (`report[0]` is the report id). Extension and IR payloads are not decoded.
pub fn wiimote_display_string(wiimote: usize, report: &[u8]) -> String {
    let mut out = format!("R{}:", wiimote + 1);
    let Some(&report_id) = report.first() else {
        return out;
    };

    if report_has_core(report_id) && report.len() >= 3 {
        let (lo, hi) = (report[1], report[2]);
        let buttons: [(bool, &str); 11] = [
            (lo & 0x01 != 0, " LEFT"),
            (lo & 0x02 != 0, " RIGHT"),
            (lo & 0x04 != 0, " DOWN"),
            (lo & 0x08 != 0, " UP"),
            (hi & 0x08 != 0, " A"),
            (hi & 0x04 != 0, " B"),
            (lo & 0x10 != 0, " +"),
            (hi & 0x10 != 0, " -"),
            (hi & 0x02 != 0, " 1"),
            (hi & 0x01 != 0, " 2"),
            (hi & 0x80 != 0, " HOME"),
        ];
        for (pressed, label) in buttons {
            if pressed {
                out.push_str(label);
            }
        }

        if report_has_accel(report_id) && report.len() >= 6 {
            // Low accelerometer bits ride in the unused button bits.
            let x = (u32::from(report[3]) << 2) | u32::from((lo >> 5) & 0x3);
            let y = (u32::from(report[4]) << 2) | (u32::from((hi >> 5) & 0x1) << 1);
            let z = (u32::from(report[5]) << 2) | (u32::from((hi >> 6) & 0x1) << 1);
            out.push_str(&format!(" ACC:{x},{y},{z}"));
        }
    }
    out
}
