//! Signal aspect colours and the persisted colour palette.

use crate::storage::{Storage, PALETTE_OFFSET};

/// Colours a signal head can show.
///
/// `Undefined` doubles as the off state and always renders black.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ColorName {
    Red = 0,
    Green,
    Yellow,
    Lunar,
    Undefined,
}

/// Number of palette entries.
pub const COLOR_COUNT: usize = 5;

/// One RGB triple as sent to the strip.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }
}

pub(crate) const DEFAULT_COLORS: [Rgb; COLOR_COUNT] = [
    Rgb::new(255, 0, 0),   // red
    Rgb::new(0, 255, 0),   // green
    Rgb::new(127, 127, 0), // yellow
    Rgb::new(96, 96, 96),  // lunar
    Rgb::new(0, 0, 0),     // undefined / off
];

/// The colour values actually rendered, one per [`ColorName`].
///
/// Persisted next to the configuration record and exposed to the programming
/// engine as a window of 15 CV bytes, colour index × 3 + channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    colors: [Rgb; COLOR_COUNT],
}

impl Palette {
    pub const fn new() -> Self {
        Palette { colors: DEFAULT_COLORS }
    }

    /// Load the palette bytes from the store.
    pub fn load<S: Storage>(store: &mut S) -> Self {
        let mut palette = Palette::new();
        for index in 0..(3 * COLOR_COUNT) as u8 {
            palette.set_in_ram(index, store.read_byte(PALETTE_OFFSET + index as usize));
        }
        palette
    }

    /// Write the default palette back to the store and adopt it in RAM.
    pub fn restore_defaults<S: Storage>(&mut self, store: &mut S) {
        self.colors = DEFAULT_COLORS;
        for index in 0..(3 * COLOR_COUNT) as u8 {
            store.update_byte(PALETTE_OFFSET + index as usize, self.channel(index));
        }
    }

    pub fn color(&self, name: ColorName) -> Rgb {
        self.colors[name as usize]
    }

    /// Palette entry by position, for the animation phase colour selectors.
    pub(crate) fn by_index(&self, index: usize) -> Rgb {
        self.colors.get(index).copied().unwrap_or(Rgb::new(0, 0, 0))
    }

    /// One byte of the CV window: colour index × 3 + channel (R, G, B).
    pub fn channel(&self, index: u8) -> u8 {
        let color = self.colors[index as usize / 3];
        match index % 3 {
            0 => color.r,
            1 => color.g,
            _ => color.b,
        }
    }

    /// Update one byte of the CV window, writing through to the store.
    pub fn set_channel<S: Storage>(&mut self, store: &mut S, index: u8, value: u8) {
        store.update_byte(PALETTE_OFFSET + index as usize, value);
        self.set_in_ram(index, value);
    }

    fn set_in_ram(&mut self, index: u8, value: u8) {
        let color = &mut self.colors[index as usize / 3];
        match index % 3 {
            0 => color.r = value,
            1 => color.g = value,
            _ => color.b = value,
        }
    }
}
