//! The persisted configuration record and the CV registry over it.

use bitflags::bitflags;

use crate::storage::{
    Storage, ACTIVE_HEADS_OFFSET, ADDRESS_OFFSET, BRIGHTNESS_OFFSET, COLOR_ORDER_OFFSET,
    EXTENDED_AREA_OFFSET, WORKAROUNDS_OFFSET,
};

/// Full output brightness; CV 47 clamps here.
pub const BRIGHTNESS_MAX: u8 = 100;
/// Number of heads this hardware can drive.
pub const MAX_SIGNAL_HEADS: u8 = 3;
/// Highest usable base address: the top of the 11-bit output address space
/// minus the reserved broadcast slot.
pub const MAX_ADDRESS: u16 = 2046;

/// CV 64 value for RGB channel order on the wire.
pub const COLOR_ORDER_RGB: u8 = 0;
/// CV 64 value for GRB channel order (WS2812-style strips).
pub const COLOR_ORDER_GRB: u8 = 1;

pub(crate) const CV_ADDRESS_LOW: u16 = 1;
pub(crate) const CV_VERSION: u16 = 7;
pub(crate) const CV_MANUFACTURER: u16 = 8;
pub(crate) const CV_ADDRESS_HIGH: u16 = 9;
pub(crate) const CV_ADDRESS_HIGH_ALT: u16 = 17;
pub(crate) const CV_ADDRESS_LOW_ALT: u16 = 18;
pub(crate) const CV_BASE_CONFIGURATION: u16 = 29;
pub(crate) const CV_EXTENDED_AREA_HIGH: u16 = 31;
pub(crate) const CV_EXTENDED_AREA_LOW: u16 = 32;
pub(crate) const CV_BRIGHTNESS: u16 = 47;
pub(crate) const CV_COLOR_BASE: u16 = 48;
pub(crate) const CV_COLOR_END: u16 = 62;
pub(crate) const CV_COLOR_ORDER: u16 = 64;
pub(crate) const CV_NUM_SIGNAL_HEADS: u16 = 65;
pub(crate) const CV_WORKAROUNDS: u16 = 66;

// CV 29 for a basic accessory decoder with output addressing. Not writable
// beyond re-confirming this value.
const CONFIGURATION_ACCESSORY_DECODER: u8 = 1 << 7;
const CONFIGURATION_OUTPUT_ADDRESSING: u8 = 1 << 6;
pub(crate) const BASE_CONFIGURATION: u8 =
    CONFIGURATION_ACCESSORY_DECODER | CONFIGURATION_OUTPUT_ADDRESSING;

/// Decoder version reported in CV 7.
pub(crate) const DECODER_VERSION: u8 = 1;
/// Manufacturer ID for home-made and public-domain decoders (CV 8).
pub(crate) const MANUFACTURER_ID: u8 = 0x0D;

bitflags! {
    /// Command-station quirk switches (CV 66).
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Workarounds: u8 {
        /// Some command stations address POM packets at the decoder address
        /// while switching the very same DCC address as decoder/port pairs.
        const POM_DECODER_ADDRESSING = 1 << 0;
    }
}

/// The configuration record, loaded once at startup and written through to
/// the store on every CV write.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DecoderConfig {
    /// First output address this decoder answers to; each signal head takes
    /// three consecutive addresses.
    pub address: u16,
    pub brightness: u8,
    /// Raw CV 64 byte; exactly [`COLOR_ORDER_GRB`] selects GRB wire order.
    pub color_order: u8,
    pub active_heads: u8,
    pub workarounds: Workarounds,
    /// CV 31 / CV 32 extended-area pointers.
    pub extended_area: [u8; 2],
}

impl DecoderConfig {
    pub const DEFAULT: DecoderConfig = DecoderConfig {
        address: 1,
        brightness: BRIGHTNESS_MAX,
        color_order: COLOR_ORDER_GRB,
        active_heads: 1,
        workarounds: Workarounds::empty(),
        extended_area: [0, 0],
    };

    /// Load the record, correcting out-of-range values in RAM only.
    pub fn load<S: Storage>(store: &mut S) -> Self {
        let mut config = DecoderConfig {
            address: u16::from_le_bytes([
                store.read_byte(ADDRESS_OFFSET),
                store.read_byte(ADDRESS_OFFSET + 1),
            ]),
            brightness: store.read_byte(BRIGHTNESS_OFFSET),
            color_order: store.read_byte(COLOR_ORDER_OFFSET),
            active_heads: store.read_byte(ACTIVE_HEADS_OFFSET),
            workarounds: Workarounds::from_bits_truncate(store.read_byte(WORKAROUNDS_OFFSET)),
            extended_area: [
                store.read_byte(EXTENDED_AREA_OFFSET),
                store.read_byte(EXTENDED_AREA_OFFSET + 1),
            ],
        };
        if config.active_heads > MAX_SIGNAL_HEADS {
            config.active_heads = 1;
        }
        if config.brightness > BRIGHTNESS_MAX {
            config.brightness = BRIGHTNESS_MAX;
        }
        if config.address == 0 || config.address > MAX_ADDRESS {
            config.address = 1;
        }
        config
    }

    /// Write the factory-default record to the store.
    pub fn write_defaults<S: Storage>(store: &mut S) {
        let defaults = DecoderConfig::DEFAULT;
        let address = defaults.address.to_le_bytes();
        store.update_byte(ADDRESS_OFFSET, address[0]);
        store.update_byte(ADDRESS_OFFSET + 1, address[1]);
        store.update_byte(BRIGHTNESS_OFFSET, defaults.brightness);
        store.update_byte(COLOR_ORDER_OFFSET, defaults.color_order);
        store.update_byte(ACTIVE_HEADS_OFFSET, defaults.active_heads);
        store.update_byte(WORKAROUNDS_OFFSET, defaults.workarounds.bits());
        store.update_byte(EXTENDED_AREA_OFFSET, defaults.extended_area[0]);
        store.update_byte(EXTENDED_AREA_OFFSET + 1, defaults.extended_area[1]);
    }

    pub fn is_grb(&self) -> bool {
        self.color_order == COLOR_ORDER_GRB
    }

    /// The configuration CVs this record backs; the colour window and the
    /// constant CVs 7/8 live with the decoder.
    pub fn cv_value(&self, cv: u16) -> Option<u8> {
        match cv {
            CV_ADDRESS_LOW | CV_ADDRESS_LOW_ALT => Some(self.address.to_le_bytes()[0]),
            CV_ADDRESS_HIGH | CV_ADDRESS_HIGH_ALT => Some(self.address.to_le_bytes()[1]),
            CV_BASE_CONFIGURATION => Some(BASE_CONFIGURATION),
            CV_EXTENDED_AREA_HIGH => Some(self.extended_area[0]),
            CV_EXTENDED_AREA_LOW => Some(self.extended_area[1]),
            CV_BRIGHTNESS => Some(self.brightness),
            CV_COLOR_ORDER => Some(self.color_order),
            CV_NUM_SIGNAL_HEADS => Some(self.active_heads),
            CV_WORKAROUNDS => Some(self.workarounds.bits()),
            _ => None,
        }
    }

    /// Write a configuration CV, mirroring it to the store.
    pub fn set_cv<S: Storage>(&mut self, store: &mut S, cv: u16, value: u8) -> bool {
        match cv {
            CV_ADDRESS_LOW | CV_ADDRESS_LOW_ALT => {
                self.set_address(store, self.address & 0xFF00 | value as u16);
                true
            }
            CV_ADDRESS_HIGH | CV_ADDRESS_HIGH_ALT => {
                self.set_address(store, self.address & 0x00FF | (value as u16) << 8);
                true
            }
            // Pretend-writes of the fixed value succeed so that tools which
            // probe-then-write are not confused.
            CV_BASE_CONFIGURATION => value == BASE_CONFIGURATION,
            CV_EXTENDED_AREA_HIGH => {
                self.extended_area[0] = value;
                store.update_byte(EXTENDED_AREA_OFFSET, value);
                true
            }
            CV_EXTENDED_AREA_LOW => {
                self.extended_area[1] = value;
                store.update_byte(EXTENDED_AREA_OFFSET + 1, value);
                true
            }
            CV_BRIGHTNESS => {
                self.brightness = value.min(BRIGHTNESS_MAX);
                store.update_byte(BRIGHTNESS_OFFSET, self.brightness);
                true
            }
            CV_COLOR_ORDER => {
                self.color_order = value;
                store.update_byte(COLOR_ORDER_OFFSET, value);
                true
            }
            CV_NUM_SIGNAL_HEADS => {
                self.active_heads = value.min(MAX_SIGNAL_HEADS);
                store.update_byte(ACTIVE_HEADS_OFFSET, self.active_heads);
                true
            }
            CV_WORKAROUNDS => {
                self.workarounds = Workarounds::from_bits_truncate(value);
                store.update_byte(WORKAROUNDS_OFFSET, self.workarounds.bits());
                true
            }
            _ => false,
        }
    }

    fn set_address<S: Storage>(&mut self, store: &mut S, address: u16) {
        self.address = address;
        let bytes = address.to_le_bytes();
        store.update_byte(ADDRESS_OFFSET, bytes[0]);
        store.update_byte(ADDRESS_OFFSET + 1, bytes[1]);
    }

    /// Bits a bit-write operation may change in a CV.
    pub fn write_mask(cv: u16) -> u8 {
        match cv {
            CV_WORKAROUNDS => Workarounds::all().bits(),
            _ => 0xFF,
        }
    }
}
