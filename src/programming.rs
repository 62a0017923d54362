//! The service-mode and POM programming engine.
//!
//! Commands arrive as the programming portion of a packet, checksum
//! included. Per RCN-214 a command only executes once it has been received
//! twice in identical form; the one-slot duplicate buffer is shared between
//! service mode and POM and survives until the next general reset.

use heapless::Vec;

use crate::packet::MAX_PACKET_LEN;

/// CV access as the programming engine sees it.
pub trait CvAccess {
    /// Read a CV; unsupported CVs yield `None`.
    fn read_cv(&mut self, cv: u16) -> Option<u8>;
    /// Write a CV, reporting whether the write was accepted.
    fn write_cv(&mut self, cv: u16, value: u8) -> bool;
    /// Bits a bit-write operation may alter in this CV.
    fn write_mask(&self, cv: u16) -> u8;
}

// Direct-mode sub-operations in bits 2..3 of the first byte.
const OP_MASK: u8 = 0xC;
const OP_VERIFY_BYTE: u8 = 0x4;
const OP_BIT_MANIPULATION: u8 = 0x8;
const OP_WRITE_BYTE: u8 = 0xC;

/// The register acting as the paged-mode page register.
const PAGE_REGISTER: u8 = 6;
/// Register 5 aliases CV 29.
const CONFIGURATION_REGISTER: u8 = 5;

/// Handles direct, register and paged CV access.
pub struct ProgrammingEngine {
    last_message: Vec<u8, MAX_PACKET_LEN>,
    // Paged-mode page, 0-based (the protocol counts from 1). Volatile.
    page: u8,
}

impl ProgrammingEngine {
    pub const fn new() -> Self {
        ProgrammingEngine { last_message: Vec::new(), page: 0 }
    }

    /// Forget the duplicate buffer (on a general reset).
    pub fn clear(&mut self) {
        self.last_message.clear();
    }

    /// Handle one programming message, checksum included.
    ///
    /// `register_mode` admits the legacy 3-byte register and paged accesses
    /// and is only set in service mode. Returns whether to acknowledge.
    pub fn process<C: CvAccess>(
        &mut self,
        message: &[u8],
        register_mode: bool,
        cvs: &mut C,
    ) -> bool {
        // Nothing executes until the command station repeats itself.
        let repeated = message == &self.last_message[..];
        self.last_message.clear();
        self.last_message.extend_from_slice(message).ok();
        if !repeated {
            return false;
        }

        if message.len() == 3 && register_mode {
            return self.process_register(message, cvs);
        }
        if message.len() != 4 {
            return false;
        }
        self.process_direct(message, cvs)
    }

    /// Register mode: `0111-CRRR value checksum`, with paged mode layered on
    /// top through the page register.
    fn process_register<C: CvAccess>(&mut self, message: &[u8], cvs: &mut C) -> bool {
        let register = (message[0] & 0x7) + 1;
        let write = message[0] & 0x8 != 0;
        let value = message[1];

        if register == PAGE_REGISTER {
            // Page preset. The protocol's page 0 wraps to the 256th page.
            if write {
                self.page = value.wrapping_sub(1);
                return true;
            }
            return value.wrapping_sub(1) == self.page;
        }

        let cv = match register {
            CONFIGURATION_REGISTER => 29,
            r if r < CONFIGURATION_REGISTER => self.page as u16 * 4 + r as u16,
            r => r as u16,
        };
        if write {
            cvs.write_cv(cv, value)
        } else {
            cvs.read_cv(cv) == Some(value)
        }
    }

    /// Direct mode: `xxxx-CCAA cv-low value checksum`.
    fn process_direct<C: CvAccess>(&mut self, message: &[u8], cvs: &mut C) -> bool {
        let cv = (message[0] as u16 & 0x3) << 8 | message[1] as u16;
        let cv = cv + 1;
        let value = message[2];

        match message[0] & OP_MASK {
            // RCN-214: never confirm a byte verify for CVs we do not have.
            OP_VERIFY_BYTE => cvs.read_cv(cv) == Some(value),
            OP_WRITE_BYTE => cvs.write_cv(cv, value),
            OP_BIT_MANIPULATION if value & 0xE0 == 0xE0 => {
                let bit_index = value & 0x7;
                let bit_value = value >> 3 & 0x1;
                let mask = 1u8 << bit_index;
                if value & 0x10 == 0 {
                    // RCN-214: confirm any bit value for CVs we do not have.
                    match cvs.read_cv(cv) {
                        None => true,
                        Some(current) => current >> bit_index & 0x1 == bit_value,
                    }
                } else {
                    match cvs.read_cv(cv) {
                        Some(current) if mask & cvs.write_mask(cv) != 0 => {
                            let new = if bit_value != 0 {
                                current | mask
                            } else {
                                current & !mask
                            };
                            cvs.write_cv(cv, new)
                        }
                        _ => false,
                    }
                }
            }
            _ => false,
        }
    }
}
