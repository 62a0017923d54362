//! Host simulator: feeds a scripted stream of DCC packets through the bit
//! receiver into the decoder and renders the signal heads as coloured
//! blocks in the terminal. The "EEPROM" persists to `decoder_state.bin`, so
//! programmed CVs survive a restart just like on the real hardware.

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::prelude::*;
use std::rc::Rc;

use lightsignal::{
    AckOutput, Decoder, DecoderConfig, Palette, PixelSink, SharedReceiver, Storage, TickTimer,
    STORAGE_SIZE,
};

const STATE_FILE: &str = "decoder_state.bin";

/// File-backed EEPROM stand-in, shared so it can be saved on exit.
#[derive(Clone)]
struct SimStorage {
    bytes: Rc<RefCell<[u8; STORAGE_SIZE]>>,
}

impl SimStorage {
    fn load_or_default() -> Self {
        let mut bytes = [0xFFu8; STORAGE_SIZE];
        match File::open(STATE_FILE).and_then(|mut file| file.read_exact(&mut bytes)) {
            Ok(()) => (),
            Err(_) => {
                let store = SimStorage { bytes: Rc::new(RefCell::new(bytes)) };
                let mut fresh = store.clone();
                DecoderConfig::write_defaults(&mut fresh);
                Palette::new().restore_defaults(&mut fresh);
                return store;
            }
        }
        SimStorage { bytes: Rc::new(RefCell::new(bytes)) }
    }

    fn save(&self) {
        if let Ok(mut file) = File::create(STATE_FILE) {
            file.write_all(&self.bytes.borrow()[..]).ok();
        }
    }
}

impl Storage for SimStorage {
    fn read_byte(&mut self, offset: usize) -> u8 {
        self.bytes.borrow().get(offset).copied().unwrap_or(0xFF)
    }

    fn update_byte(&mut self, offset: usize, value: u8) {
        if let Some(byte) = self.bytes.borrow_mut().get_mut(offset) {
            *byte = value;
        }
    }
}

/// Renders each frame as true-colour blocks on one status line.
struct Terminal {
    current: Rc<RefCell<Vec<u8>>>,
}

impl PixelSink for Terminal {
    fn send(&mut self, pixels: &[u8]) {
        *self.current.borrow_mut() = pixels.to_vec();
    }
}

struct AckPin {
    pulses: Rc<Cell<usize>>,
}

impl embedded_hal::digital::ErrorType for AckPin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for AckPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.pulses.set(self.pulses.get() + 1);
        Ok(())
    }
}

/// The loop below fires the shared timer itself every 20 ms, so the timer
/// needs no state of its own.
struct LoopTimer;

impl TickTimer for LoopTimer {
    fn start_animation(&mut self) {}
    fn start_ack(&mut self) {}
    fn stop(&mut self) {}
}

/// Encode packet bytes as wire bits: preamble, separators, checksum,
/// terminator.
fn transmit(receiver: &SharedReceiver, bytes: &[u8]) {
    for _ in 0..14 {
        receiver.receive_bit(true);
    }
    let checksum = bytes.iter().fold(0u8, |xor, byte| xor ^ byte);
    for &byte in bytes.iter().chain(std::iter::once(&checksum)) {
        receiver.receive_bit(false);
        for bit in (0..8).rev() {
            receiver.receive_bit(byte & 1 << bit != 0);
        }
    }
    receiver.receive_bit(true);
}

/// Accessory packet bytes for an output address.
fn accessory(output: u16, direction: bool, activate: bool) -> [u8; 2] {
    let raw = (output + 3) & 0x7FF;
    let decoder = raw >> 2;
    let port = (raw & 0x3) as u8;
    [
        0x80 | (decoder & 0x3F) as u8,
        0x80 | ((!(decoder >> 6) & 0x7) as u8) << 4
            | (activate as u8) << 3
            | port << 1
            | direction as u8,
    ]
}

fn print_frame(tick: u32, frame: &[u8], grb: bool, label: &str) {
    print!("\r[{:5}] ", tick);
    for head in frame.chunks(3) {
        // Undo the wire order swap for the terminal.
        let (r, g, b) = if grb {
            (head[1], head[0], head[2])
        } else {
            (head[0], head[1], head[2])
        };
        print!("\x1b[38;2;{};{};{}m\u{2588}\u{2588}\x1b[0m ", r, g, b);
    }
    print!("{:40}", label);
    std::io::stdout().flush().ok();
}

fn main() {
    let store = SimStorage::load_or_default();
    let receiver = SharedReceiver::new();
    let frame = Rc::new(RefCell::new(Vec::new()));
    let pulses = Rc::new(Cell::new(0));

    let mut decoder = Decoder::new(
        store.clone(),
        Terminal { current: frame.clone() },
        AckOutput::Pin(AckPin { pulses: pulses.clone() }),
        LoopTimer,
    );

    println!(
        "lightsignal simulator: address {}, {} head(s), brightness {}",
        decoder.config().address,
        decoder.config().active_heads,
        decoder.config().brightness,
    );

    // One event per entry: at the given tick, send the packet.
    let base = decoder.config().address;
    let script: Vec<(u32, Vec<u8>, &str)> = vec![
        (50, accessory(base, true, true).to_vec(), "green"),
        (150, accessory(base + 1, true, true).to_vec(), "yellow"),
        (250, accessory(base + 2, true, true).to_vec(), "flashing on"),
        (400, accessory(base + 2, false, true).to_vec(), "flashing off"),
        (470, accessory(base + 1, false, true).to_vec(), "lunar"),
        (570, accessory(base, false, true).to_vec(), "red"),
        // Service mode: reset, then set brightness to 60 (twice, as the
        // standard demands), then return to the main.
        (650, vec![0x00, 0x00], "service mode"),
        (655, vec![0x7C, 0x2E, 60], "write CV47=60"),
        (660, vec![0x7C, 0x2E, 60], "write CV47=60 (repeat)"),
        (680, accessory(base, true, true).to_vec(), "green, dimmed"),
        (780, vec![0xBF, 0x80], "emergency off"),
        (850, accessory(base, false, true).to_vec(), "recovered, red"),
    ];

    let mut label = "boot";
    for tick in 0..950u32 {
        for (at, bytes, name) in &script {
            if *at == tick {
                transmit(&receiver, bytes);
                label = *name;
            }
        }
        while let Some(packet) = receiver.take_new() {
            decoder.process_packet(&packet);
        }

        decoder.timer_fired();
        decoder.poll_animation();
        let grb = decoder.config().is_grb();
        print_frame(tick, &frame.borrow(), grb, label);

        std::thread::sleep(std::time::Duration::from_millis(20));
    }
    println!();
    println!("acknowledgement pulses sent: {}", pulses.get());

    store.save();
}
