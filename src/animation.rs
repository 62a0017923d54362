//! The animation phase table and its interpreter.
//!
//! Animations are data: a phase is two bytes, a tick count and a flags byte
//! selecting the start and end colour of a linear crossfade. Negative counts
//! jump backwards through the table, 127 holds a phase forever, and bit 7 of
//! the flags marks the points where an animation counts as finished. New
//! animations are added by extending the table.

use crate::colors::{Palette, Rgb};

/// One animation phase.
///
/// `length` multiplexes the phase kind: positive values are a duration in
/// ticks, negative values jump back by that many entries, and 127 holds the
/// phase forever. Zero is reserved.
///
/// `flags` bit 7 marks "complete here"; bits 4..6 select the start colour
/// and bits 0..2 the end colour, so a phase reads naturally in hex (`0x61`
/// fades from selector 6 to selector 1). Selector 0 is the caller's colour
/// `a`, 1 is colour `b`, and 2 and up index the palette.
#[derive(Copy, Clone, Debug)]
pub struct Phase {
    pub length: i8,
    pub flags: u8,
}

const COMPLETE: u8 = 0x80;
const HOLD_FOREVER: i8 = 127;

const TICKS_FULLY_ON: i8 = 2;
const TICKS_TURNING_OFF: i8 = 20;
const TICKS_FULLY_OFF: i8 = 4;
const TICKS_TURNING_ON: i8 = 20;

const COLOR_SWITCH_TICKS: i8 = 20;
const INTERMEDIATE_RED_TICKS: i8 = 1;

/// Start of the flashing overlay loop.
pub(crate) const FLASHING: u8 = 0;
/// Start of the plain two-step crossfade.
pub(crate) const SWITCH_DIRECT: u8 = 5;
/// Terminal hold phase shared by both crossfades.
pub(crate) const SWITCH_DONE: u8 = 7;
/// Start of the crossfade that dips through red.
pub(crate) const SWITCH_VIA_RED: u8 = 8;

// Selector nibbles: 0 = colour a, 1 = colour b, 2 = palette red,
// 6 = palette undefined (black).
pub(crate) const PHASES: [Phase; 14] = [
    // Flashing; colour a is the head's current colour.
    Phase { length: TICKS_FULLY_ON, flags: COMPLETE | 0x00 },
    Phase { length: TICKS_TURNING_OFF, flags: 0x06 },
    Phase { length: TICKS_FULLY_OFF, flags: 0x66 },
    Phase { length: TICKS_TURNING_ON, flags: 0x60 },
    Phase { length: -4, flags: 0x00 },
    // Direct colour change from a to b.
    Phase { length: COLOR_SWITCH_TICKS / 2, flags: 0x06 },
    Phase { length: COLOR_SWITCH_TICKS / 2, flags: 0x61 },
    Phase { length: HOLD_FOREVER, flags: COMPLETE | 0x11 },
    // Colour change from a to b with an intermediate stop at red.
    Phase { length: COLOR_SWITCH_TICKS / 4, flags: 0x06 },
    Phase { length: COLOR_SWITCH_TICKS / 4, flags: 0x62 },
    Phase { length: INTERMEDIATE_RED_TICKS, flags: 0x22 },
    Phase { length: COLOR_SWITCH_TICKS / 4, flags: 0x26 },
    Phase { length: COLOR_SWITCH_TICKS / 4, flags: 0x61 },
    Phase { length: HOLD_FOREVER, flags: COMPLETE | 0x11 },
];

/// No zero lengths, every jump lands in range on a positive-length phase,
/// and the table cannot run off its end.
const fn table_is_wellformed(table: &[Phase]) -> bool {
    let mut i = 0;
    while i < table.len() {
        let length = table[i].length;
        if length == 0 {
            return false;
        }
        if length < 0 {
            let target = i as i32 + length as i32;
            if target < 0 || table[target as usize].length <= 0 {
                return false;
            }
        }
        if length > 0 && length != HOLD_FOREVER && i == table.len() - 1 {
            return false;
        }
        i += 1;
    }
    true
}

const _: () = assert!(table_is_wellformed(&PHASES));

/// A cursor into the phase table.
#[derive(Clone, Debug)]
pub struct Player {
    timestep: u8,
    index: u8,
}

impl Player {
    pub(crate) const fn new(start: u8) -> Self {
        Player { timestep: 0, index: start }
    }

    /// Restart at a new table position.
    pub(crate) fn restart(&mut self, index: u8) {
        self.timestep = 0;
        self.index = index;
    }

    /// Whether the phase under the cursor carries the completion marker.
    pub(crate) fn is_complete(&self) -> bool {
        self.resolve().1.flags & COMPLETE != 0
    }

    /// Advance one tick, producing the blended colour for this step.
    pub(crate) fn step(&mut self, a: Rgb, b: Rgb, palette: &Palette) -> Rgb {
        let (index, phase) = self.resolve();
        self.index = index;

        let start = select(a, b, palette, phase.flags >> 4 & 0x7);
        let end = select(a, b, palette, phase.flags & 0x7);
        let out = Rgb::new(
            blend(start.r, end.r, self.timestep, phase.length),
            blend(start.g, end.g, self.timestep, phase.length),
            blend(start.b, end.b, self.timestep, phase.length),
        );

        self.timestep = self.timestep.wrapping_add(1);
        if phase.length != HOLD_FOREVER && self.timestep >= phase.length as u8 {
            self.timestep = 0;
            self.index += 1;
        }
        out
    }

    /// The phase under the cursor after chasing any backward jumps.
    fn resolve(&self) -> (u8, Phase) {
        let mut index = self.index;
        let mut phase = PHASES[index as usize];
        while phase.length < 0 {
            index = (index as i16 + phase.length as i16) as u8;
            phase = PHASES[index as usize];
        }
        (index, phase)
    }
}

fn select(a: Rgb, b: Rgb, palette: &Palette, selector: u8) -> Rgb {
    match selector {
        0 => a,
        1 => b,
        _ => palette.by_index(selector as usize - 2),
    }
}

/// Linear interpolation between two channel values.
fn blend(start: u8, end: u8, timestep: u8, length: i8) -> u8 {
    let diff = end as i32 - start as i32;
    (start as i32 + timestep as i32 * diff / length as i32) as u8
}
