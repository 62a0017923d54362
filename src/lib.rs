#![cfg_attr(not(test), no_std)]

//! Core logic of a DCC accessory decoder driving RGB colour-light signal
//! heads.
//!
//! The crate is hardware-independent: edge-sampled bits come in through
//! [`DccReceiver`] (or [`SharedReceiver`] from an interrupt), pixel frames
//! leave through a [`PixelSink`], configuration persists through a
//! [`Storage`] byte store, and the shared animation/acknowledgement timer
//! hides behind [`TickTimer`].

mod animation;
mod colors;
mod config;
mod decoder;
mod head;
mod packet;
mod pixels;
mod programming;
mod receiver;
mod storage;
mod sync;

pub use colors::{ColorName, Palette, Rgb, COLOR_COUNT};
pub use config::{
    DecoderConfig, Workarounds, BRIGHTNESS_MAX, COLOR_ORDER_GRB, COLOR_ORDER_RGB, MAX_ADDRESS,
    MAX_SIGNAL_HEADS,
};
pub use decoder::{AckOutput, Decoder, DecoderMode, TickTimer};
pub use head::SignalHead;
pub use packet::{AccessoryCommand, Packet, BROADCAST_DECODER_ADDRESS, MAX_PACKET_LEN};
pub use pixels::{compose, PixelSink, CHANNELS_PER_HEAD};
pub use programming::{CvAccess, ProgrammingEngine};
pub use receiver::{DccReceiver, ONE_HALF_PERIOD_US, SAMPLE_DELAY_US, ZERO_HALF_PERIOD_US};
pub use storage::{RamStorage, Storage, STORAGE_SIZE};
pub use sync::SharedReceiver;
