//! Interrupt-side glue.
//!
//! On hardware the frame assembler runs in the sampling-timer interrupt
//! while the foreground polls for packets. `SharedReceiver` wraps the
//! assembler in a critical-section mutex so both contexts can reach it
//! through a `static`; the foreground read stays short because completed
//! packets are latched by the assembler's own counter.

use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::digital::InputPin;

use crate::packet::Packet;
use crate::receiver::DccReceiver;

pub struct SharedReceiver {
    inner: Mutex<RefCell<DccReceiver>>,
}

impl SharedReceiver {
    pub const fn new() -> Self {
        SharedReceiver {
            inner: Mutex::new(RefCell::new(DccReceiver::new())),
        }
    }

    /// Sampling-timer interrupt entry: read the line and feed the level.
    pub fn sample<Pin: InputPin>(&self, pin: &mut Pin) {
        self.receive_bit(pin.is_high().unwrap_or(false));
    }

    /// Feed one already-sampled bit.
    pub fn receive_bit(&self, bit: bool) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).receive_bit(bit));
    }

    /// Fetch the packet completed since the last poll, if any.
    pub fn take_new(&self) -> Option<Packet> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).take_new())
    }
}
