//! Output frame composition.

use crate::colors::Rgb;
use crate::config::BRIGHTNESS_MAX;

/// Channel bytes per head on the strip.
pub const CHANNELS_PER_HEAD: usize = 3;

/// Where composed frames go: the platform's strip transmitter, which is
/// expected to push the bytes out synchronously.
pub trait PixelSink {
    fn send(&mut self, pixels: &[u8]);
}

/// Lay head colours out as channel bytes, optionally swapped to GRB wire
/// order and scaled by brightness. Returns the number of bytes written.
pub fn compose(colors: &[Rgb], grb: bool, brightness: u8, out: &mut [u8]) -> usize {
    let mut len = 0;
    for (head, color) in colors.iter().enumerate() {
        let base = head * CHANNELS_PER_HEAD;
        if base + CHANNELS_PER_HEAD > out.len() {
            break;
        }
        let (first, second) = if grb { (color.g, color.r) } else { (color.r, color.g) };
        out[base] = first;
        out[base + 1] = second;
        out[base + 2] = color.b;
        len = base + CHANNELS_PER_HEAD;
    }
    if brightness < BRIGHTNESS_MAX {
        for channel in out[..len].iter_mut() {
            *channel = (*channel as u16 * brightness as u16 / BRIGHTNESS_MAX as u16) as u8;
        }
    }
    len
}
