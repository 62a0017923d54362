//! Reconstructing DCC packets from the rail signal.
//!
//! The wire encodes a '1' as a short (~58 µs) half period and a '0' as a
//! long (~100 µs) one. On every falling edge the platform arms a one-shot
//! timer of [`SAMPLE_DELAY_US`]; when it fires, the line level *is* the bit:
//! still low means the long zero wave is ongoing, already high again means
//! the short one wave ended. The sampled bits feed the frame assembler here.

use crate::packet::Packet;

/// Nominal half-period of a '1' bit in microseconds.
pub const ONE_HALF_PERIOD_US: u8 = 58;
/// Nominal half-period of a '0' bit in microseconds.
pub const ZERO_HALF_PERIOD_US: u8 = 100;
/// Delay from the falling edge to the level sample, halfway between the two
/// half-periods.
pub const SAMPLE_DELAY_US: u8 =
    ((ONE_HALF_PERIOD_US as u16 + ZERO_HALF_PERIOD_US as u16) / 2) as u8;

const PREAMBLE_BITS: u8 = 10;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ReceiveState {
    /// Counting consecutive '1' bits. A '0' resets the count, unless ten
    /// ones have been seen already; then it is the separator starting the
    /// first byte.
    Preamble(u8),
    /// Shifting in data bits, most significant first.
    ByteBit(u8),
    /// The bit after a byte: '0' continues with another byte, '1' ends the
    /// packet.
    AwaitSeparator,
}

/// The frame assembler.
///
/// Fed one bit per falling edge from the sampling interrupt; completed,
/// checksum-clean packets bump a wrapping counter that the foreground polls
/// through [`take_new`](Self::take_new). The packet slot is single-buffered:
/// the reader has until the end of the next preamble to fetch it, which at
/// DCC rates is milliseconds.
#[derive(Clone, Debug)]
pub struct DccReceiver {
    state: ReceiveState,
    packet: Packet,
    current: u8,
    running_xor: u8,
    completed: u8,
    last_read: u8,
}

impl DccReceiver {
    pub const fn new() -> Self {
        DccReceiver {
            state: ReceiveState::Preamble(0),
            packet: Packet::new(),
            current: 0,
            running_xor: 0,
            completed: 0,
            last_read: 0,
        }
    }

    /// Feed the level sampled [`SAMPLE_DELAY_US`] after a falling edge; a
    /// high level is a '1' bit.
    pub fn receive_bit(&mut self, bit: bool) {
        match self.state {
            ReceiveState::Preamble(seen) => {
                if bit {
                    if seen < PREAMBLE_BITS {
                        self.state = ReceiveState::Preamble(seen + 1);
                    }
                } else if seen >= PREAMBLE_BITS {
                    self.packet.clear();
                    self.current = 0;
                    self.running_xor = 0;
                    self.state = ReceiveState::ByteBit(0);
                } else {
                    self.state = ReceiveState::Preamble(0);
                }
            }
            ReceiveState::ByteBit(index) => {
                self.current = self.current << 1 | bit as u8;
                self.state = if index == 7 {
                    ReceiveState::AwaitSeparator
                } else {
                    ReceiveState::ByteBit(index + 1)
                };
            }
            ReceiveState::AwaitSeparator => {
                self.running_xor ^= self.current;
                if self.packet.push(self.current).is_err() {
                    self.state = ReceiveState::Preamble(0);
                    return;
                }
                if bit {
                    // End of packet; corrupt ones are dropped silently.
                    if self.running_xor == 0 {
                        self.completed = self.completed.wrapping_add(1);
                    }
                    self.state = ReceiveState::Preamble(0);
                } else if self.packet.is_full() {
                    // No room for the next byte: wait for the next preamble.
                    self.state = ReceiveState::Preamble(0);
                } else {
                    self.current = 0;
                    self.state = ReceiveState::ByteBit(0);
                }
            }
        }
    }

    /// The packet completed since the last call, if any.
    pub fn take_new(&mut self) -> Option<Packet> {
        if self.completed == self.last_read {
            return None;
        }
        self.last_read = self.completed;
        Some(self.packet.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_preamble(receiver: &mut DccReceiver, size: usize) {
        for _ in 0..size {
            receiver.receive_bit(true);
        }
    }

    fn write_byte(receiver: &mut DccReceiver, byte: u8) {
        receiver.receive_bit(false);
        for bit in (0..8).rev() {
            receiver.receive_bit(byte & 1 << bit != 0);
        }
    }

    fn write_terminator(receiver: &mut DccReceiver) {
        receiver.receive_bit(true);
    }

    #[test]
    fn no_message_initially() {
        let mut receiver = DccReceiver::new();
        assert!(receiver.take_new().is_none());
    }

    #[test]
    fn receives_a_message() {
        let mut receiver = DccReceiver::new();
        write_preamble(&mut receiver, 12);
        write_byte(&mut receiver, 0xF0);
        write_byte(&mut receiver, 0x0F);
        write_byte(&mut receiver, 0xFF);
        write_terminator(&mut receiver);

        let packet = receiver.take_new().expect("packet");
        assert_eq!(packet.data(), &[0xF0, 0x0F, 0xFF]);
        assert!(receiver.take_new().is_none());
    }

    #[test]
    fn short_preamble_is_rejected() {
        let mut receiver = DccReceiver::new();
        write_preamble(&mut receiver, 5);
        write_byte(&mut receiver, 0xFF);
        write_byte(&mut receiver, 0x00);
        write_byte(&mut receiver, 0xFF);
        write_terminator(&mut receiver);

        assert!(receiver.take_new().is_none());
    }

    #[test]
    fn ten_preamble_bits_are_the_boundary() {
        let mut receiver = DccReceiver::new();
        write_preamble(&mut receiver, 9);
        write_byte(&mut receiver, 0x55);
        write_byte(&mut receiver, 0x55);
        write_terminator(&mut receiver);
        assert!(receiver.take_new().is_none());

        // The same bytes behind exactly ten ones are accepted.
        let mut receiver = DccReceiver::new();
        write_preamble(&mut receiver, 10);
        write_byte(&mut receiver, 0x55);
        write_byte(&mut receiver, 0x55);
        write_terminator(&mut receiver);
        assert_eq!(receiver.take_new().expect("packet").data(), &[0x55, 0x55]);
    }

    #[test]
    fn bad_checksum_is_dropped() {
        let mut receiver = DccReceiver::new();
        write_preamble(&mut receiver, 12);
        write_byte(&mut receiver, 0xFF);
        write_byte(&mut receiver, 0x00);
        write_byte(&mut receiver, 0xFE);
        write_terminator(&mut receiver);

        assert!(receiver.take_new().is_none());
    }

    #[test]
    fn overlong_message_is_dropped_and_resynchronised() {
        let mut receiver = DccReceiver::new();
        write_preamble(&mut receiver, 12);
        for _ in 0..100 {
            write_byte(&mut receiver, 0x00);
        }
        write_terminator(&mut receiver);
        assert!(receiver.take_new().is_none());

        // The stream recovers at the next preamble.
        write_preamble(&mut receiver, 12);
        write_byte(&mut receiver, 0xA5);
        write_byte(&mut receiver, 0xA5);
        write_terminator(&mut receiver);
        assert_eq!(receiver.take_new().expect("packet").data(), &[0xA5, 0xA5]);
    }

    #[test]
    fn eleventh_byte_overflows_the_buffer() {
        let mut receiver = DccReceiver::new();
        write_preamble(&mut receiver, 12);
        // Ten zero bytes XOR to zero, but the eleventh byte cannot be
        // stored, so the packet must not complete.
        for _ in 0..11 {
            write_byte(&mut receiver, 0x00);
        }
        write_terminator(&mut receiver);
        assert!(receiver.take_new().is_none());
    }

    #[test]
    fn counter_wraps_without_losing_messages() {
        let mut receiver = DccReceiver::new();
        for _ in 0..300 {
            write_preamble(&mut receiver, 12);
            write_byte(&mut receiver, 0x81);
            write_byte(&mut receiver, 0x81);
            write_terminator(&mut receiver);
            assert!(receiver.take_new().is_some());
        }
    }
}
