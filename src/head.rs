//! Per-signal-head aspect state.

use crate::animation::{self, Player};
use crate::colors::{ColorName, Palette, Rgb};

/// One signal head: the colour transition in flight plus the flashing
/// overlay.
///
/// Colour changes are animated. A change requested while another is running
/// is parked in `pending` and picked up when the running one completes, so a
/// burst of setpoints collapses to the latest. Transitions involving red use
/// the plain crossfade; everything else dips through red first, as the
/// prototype does.
#[derive(Clone, Debug)]
pub struct SignalHead {
    from: ColorName,
    to: ColorName,
    pending: Option<ColorName>,
    flashing: bool,
    color_anim: Player,
    flash_anim: Player,
}

impl SignalHead {
    /// A head holding steady red, the boot aspect.
    pub const fn new() -> Self {
        SignalHead {
            from: ColorName::Red,
            to: ColorName::Red,
            pending: None,
            flashing: false,
            color_anim: Player::new(animation::SWITCH_DONE),
            flash_anim: Player::new(animation::FLASHING),
        }
    }

    /// Request a new aspect colour.
    pub fn set_color(&mut self, color: ColorName) {
        if self.to != color {
            self.pending = Some(color);
        }
    }

    /// Switch the flashing overlay on or off.
    ///
    /// Turning it off lets the current blink cycle finish first.
    pub fn set_flashing(&mut self, flashing: bool) {
        self.flashing = flashing;
    }

    /// Advance one animation tick and return the colour to show.
    pub fn update(&mut self, palette: &Palette) -> Rgb {
        let mut out = self
            .color_anim
            .step(palette.color(self.from), palette.color(self.to), palette);

        if self.color_anim.is_complete() {
            if let Some(next) = self.pending.take() {
                self.from = self.to;
                self.to = next;
                let start = if self.from == ColorName::Red || self.to == ColorName::Red {
                    animation::SWITCH_DIRECT
                } else {
                    animation::SWITCH_VIA_RED
                };
                self.color_anim.restart(start);
            }
        }

        if self.flashing || !self.flash_anim.is_complete() {
            out = self
                .flash_anim
                .step(out, palette.color(ColorName::Undefined), palette);
        }

        out
    }
}
