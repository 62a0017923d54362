//! The decoder proper: packet dispatch, programming sessions, and the
//! animation pump.

use embedded_hal::digital::OutputPin;

use crate::colors::{ColorName, Palette, Rgb};
use crate::config::{self, DecoderConfig, Workarounds};
use crate::head::SignalHead;
use crate::packet::{AccessoryCommand, Packet, BROADCAST_DECODER_ADDRESS};
use crate::pixels::{compose, PixelSink, CHANNELS_PER_HEAD};
use crate::programming::{CvAccess, ProgrammingEngine};
use crate::storage::Storage;

/// Operating states of the decoder.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecoderMode {
    Operation,
    EmergencyStop,
    ResetReceived,
    Programming,
    SendingAck,
}

/// The shared hardware timer, reconfigured between its two cadences.
pub trait TickTimer {
    /// Run periodically at the ~20 ms animation cadence.
    fn start_animation(&mut self);
    /// Run once after the ~6 ms acknowledgement pulse width.
    fn start_ack(&mut self);
    /// Stop the timer.
    fn stop(&mut self);
}

/// How programming acknowledgements are produced: a dedicated pin, or a
/// full-white flash on the strip where no pin is wired.
pub enum AckOutput<A> {
    Pin(A),
    Leds,
}

const MAX_HEADS: usize = config::MAX_SIGNAL_HEADS as usize;
const FRAME_LEN: usize = MAX_HEADS * CHANNELS_PER_HEAD;

/// The whole decoder: configuration, palette, signal heads and the protocol
/// state machines, bound to the platform services.
///
/// The foreground loop feeds packets through [`process_packet`] and pumps
/// animation through [`poll_animation`]; the shared timer interrupt calls
/// [`timer_fired`]. On hardware the instance lives behind a critical-section
/// lock reachable from both contexts.
///
/// [`process_packet`]: Self::process_packet
/// [`poll_animation`]: Self::poll_animation
/// [`timer_fired`]: Self::timer_fired
pub struct Decoder<S, P, A, T> {
    config: DecoderConfig,
    palette: Palette,
    heads: [SignalHead; MAX_HEADS],
    programming: ProgrammingEngine,
    mode: DecoderMode,
    ticks: u8,
    rendered_tick: u8,
    store: S,
    pixels: P,
    ack: AckOutput<A>,
    timer: T,
}

impl<S, P, A, T> Decoder<S, P, A, T>
where
    S: Storage,
    P: PixelSink,
    A: OutputPin,
    T: TickTimer,
{
    /// Load configuration and palette from the store, blank the strip and
    /// start the animation cadence.
    pub fn new(mut store: S, pixels: P, ack: AckOutput<A>, mut timer: T) -> Self {
        let config = DecoderConfig::load(&mut store);
        let palette = Palette::load(&mut store);
        timer.start_animation();
        let mut decoder = Decoder {
            config,
            palette,
            heads: [SignalHead::new(), SignalHead::new(), SignalHead::new()],
            programming: ProgrammingEngine::new(),
            mode: DecoderMode::Operation,
            ticks: 0,
            // Out of step with `ticks` so the very first poll paints the
            // boot aspect.
            rendered_tick: 0xFF,
            store,
            pixels,
            ack,
            timer,
        };
        decoder.blank_leds();
        decoder
    }

    pub fn mode(&self) -> DecoderMode {
        self.mode
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Read any CV, constants and the colour window included.
    pub fn read_cv(&mut self, cv: u16) -> Option<u8> {
        DecoderCvs {
            config: &mut self.config,
            palette: &mut self.palette,
            store: &mut self.store,
        }
        .read_cv(cv)
    }

    /// Write any CV. Writing 8 into CV 8 performs the factory reset.
    pub fn write_cv(&mut self, cv: u16, value: u8) -> bool {
        DecoderCvs {
            config: &mut self.config,
            palette: &mut self.palette,
            store: &mut self.store,
        }
        .write_cv(cv, value)
    }

    /// Shared timer interrupt.
    pub fn timer_fired(&mut self) {
        match self.mode {
            DecoderMode::SendingAck => {
                self.timer.stop();
                self.end_ack();
                self.mode = DecoderMode::Programming;
            }
            DecoderMode::Operation => {
                self.ticks = self.ticks.wrapping_add(1);
            }
            _ => {}
        }
    }

    /// Handle a complete packet from the receiver.
    pub fn process_packet(&mut self, packet: &Packet) {
        // While the acknowledgement pulse is out everything is ignored; the
        // command station is only repeating programming packets anyway.
        if self.mode == DecoderMode::SendingAck {
            return;
        }

        if packet.is_general_reset() {
            if self.mode == DecoderMode::Operation {
                self.timer.stop();
                self.blank_leds();
                self.programming.clear();
                self.mode = DecoderMode::ResetReceived;
            }
            return;
        }

        // Programming packets share their leading pattern with short
        // locomotive addresses; they only count after a reset or further
        // programming traffic.
        if self.mode != DecoderMode::Operation && packet.is_possibly_programming() {
            self.mode = DecoderMode::Programming;
            let ack = {
                let mut cvs = DecoderCvs {
                    config: &mut self.config,
                    palette: &mut self.palette,
                    store: &mut self.store,
                };
                self.programming.process(packet.data(), true, &mut cvs)
            };
            if ack {
                self.send_ack();
            }
            return;
        }

        if self.mode != DecoderMode::EmergencyStop {
            self.enter_operation();
        }

        let Some(command) = AccessoryCommand::decode(packet) else {
            // Locomotive packets and anything else malformed: not ours.
            return;
        };

        if command.decoder_address == BROADCAST_DECODER_ADDRESS
            && !command.direction
            && !command.activate
        {
            // Fleet-wide emergency off. Sticks until an accessory command
            // for this decoder arrives.
            self.blank_leds();
            self.mode = DecoderMode::EmergencyStop;
            return;
        }

        // POM: a 6-byte accessory packet carrying a direct-mode access.
        if packet.len() == 6 && packet.data()[2] & 0xF0 == 0xE0 {
            let workaround = self
                .config
                .workarounds
                .contains(Workarounds::POM_DECODER_ADDRESSING);
            let addressed = if workaround && !command.activate {
                // Stations with the quirk send "decoder 10 port 0" for a POM
                // at DCC address 10 while switching the same address as
                // decoder/port pairs; match the decoder address for those.
                command.decoder_address == self.config.address
            } else {
                self.addresses_us(command.output_address)
            };
            if !addressed {
                return;
            }
            let ack = {
                let mut cvs = DecoderCvs {
                    config: &mut self.config,
                    palette: &mut self.palette,
                    store: &mut self.store,
                };
                self.programming.process(&packet.data()[2..], false, &mut cvs)
            };
            if ack {
                self.send_ack();
            }
            return;
        }

        if !self.addresses_us(command.output_address) {
            return;
        }
        self.enter_operation();

        if !command.activate {
            // Sent when the station thinks the solenoid has been powered
            // long enough; nothing to do for a light signal.
            return;
        }

        let relative = (command.output_address - self.config.address) as u8;
        // Invert so head 0 is the top of the mast.
        let head = (self.config.active_heads - 1 - relative / 3) as usize;
        match relative % 3 {
            0 => self.heads[head].set_color(if command.direction {
                ColorName::Green
            } else {
                ColorName::Red
            }),
            1 => self.heads[head].set_color(if command.direction {
                ColorName::Yellow
            } else {
                ColorName::Lunar
            }),
            _ => self.heads[head].set_flashing(command.direction),
        }
    }

    /// Advance the animation if a tick has elapsed; returns whether a frame
    /// went out. Missed ticks coalesce into one.
    pub fn poll_animation(&mut self) -> bool {
        if self.mode != DecoderMode::Operation {
            return false;
        }
        if self.ticks == self.rendered_tick {
            return false;
        }
        self.rendered_tick = self.ticks;
        self.render_frame();
        true
    }

    fn render_frame(&mut self) {
        let active = self.config.active_heads as usize;
        let mut colors = [Rgb::new(0, 0, 0); MAX_HEADS];
        for (head, color) in self.heads[..active].iter_mut().zip(colors.iter_mut()) {
            *color = head.update(&self.palette);
        }
        let mut frame = [0u8; FRAME_LEN];
        let len = compose(
            &colors[..active],
            self.config.is_grb(),
            self.config.brightness,
            &mut frame,
        );
        self.pixels.send(&frame[..len]);
    }

    fn blank_leds(&mut self) {
        let frame = [0u8; FRAME_LEN];
        let len = self.config.active_heads as usize * CHANNELS_PER_HEAD;
        self.pixels.send(&frame[..len]);
    }

    /// Each head occupies three consecutive output addresses.
    fn addresses_us(&self, output_address: u16) -> bool {
        output_address >= self.config.address
            && output_address < self.config.address + self.config.active_heads as u16 * 3
    }

    fn enter_operation(&mut self) {
        if self.mode != DecoderMode::Operation {
            self.mode = DecoderMode::Operation;
            self.timer.start_animation();
        }
    }

    fn send_ack(&mut self) {
        // POM runs in normal operation and never pulses.
        if self.mode == DecoderMode::Operation {
            return;
        }
        match &mut self.ack {
            AckOutput::Pin(pin) => {
                pin.set_high().ok();
            }
            AckOutput::Leds => {
                // No ack pin wired: spike the supply current with full
                // white instead.
                let frame = [0xFF; FRAME_LEN];
                let len = self.config.active_heads as usize * CHANNELS_PER_HEAD;
                self.pixels.send(&frame[..len]);
            }
        }
        self.mode = DecoderMode::SendingAck;
        self.timer.start_ack();
    }

    fn end_ack(&mut self) {
        match &mut self.ack {
            AckOutput::Pin(pin) => {
                pin.set_low().ok();
            }
            AckOutput::Leds => self.blank_leds(),
        }
    }
}

/// The full CV space: the configuration record plus the colour window, the
/// constant identification CVs and the factory reset.
struct DecoderCvs<'a, S: Storage> {
    config: &'a mut DecoderConfig,
    palette: &'a mut Palette,
    store: &'a mut S,
}

impl<S: Storage> CvAccess for DecoderCvs<'_, S> {
    fn read_cv(&mut self, cv: u16) -> Option<u8> {
        match cv {
            config::CV_COLOR_BASE..=config::CV_COLOR_END => {
                Some(self.palette.channel((cv - config::CV_COLOR_BASE) as u8))
            }
            config::CV_VERSION => Some(config::DECODER_VERSION),
            config::CV_MANUFACTURER => Some(config::MANUFACTURER_ID),
            _ => self.config.cv_value(cv),
        }
    }

    fn write_cv(&mut self, cv: u16, value: u8) -> bool {
        match cv {
            config::CV_COLOR_BASE..=config::CV_COLOR_END => {
                self.palette
                    .set_channel(self.store, (cv - config::CV_COLOR_BASE) as u8, value);
                true
            }
            config::CV_MANUFACTURER => {
                if value == 8 {
                    // Eight into CV 8: back to the factory state.
                    DecoderConfig::write_defaults(self.store);
                    *self.config = DecoderConfig::DEFAULT;
                    self.palette.restore_defaults(self.store);
                    true
                } else {
                    false
                }
            }
            _ => self.config.set_cv(self.store, cv, value),
        }
    }

    fn write_mask(&self, cv: u16) -> u8 {
        DecoderConfig::write_mask(cv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RamStorage;
    use std::vec::Vec;

    struct FrameLog {
        frames: std::rc::Rc<std::cell::RefCell<Vec<Vec<u8>>>>,
    }

    impl PixelSink for FrameLog {
        fn send(&mut self, pixels: &[u8]) {
            self.frames.borrow_mut().push(pixels.to_vec());
        }
    }

    #[derive(Default)]
    struct TestPin {
        level: std::rc::Rc<std::cell::Cell<bool>>,
        pulses: std::rc::Rc<std::cell::Cell<usize>>,
    }

    impl embedded_hal::digital::ErrorType for TestPin {
        type Error = core::convert::Infallible;
    }

    impl OutputPin for TestPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.level.set(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.level.set(true);
            self.pulses.set(self.pulses.get() + 1);
            Ok(())
        }
    }

    #[derive(Default)]
    struct TestTimer {
        animation_starts: std::rc::Rc<std::cell::Cell<usize>>,
        ack_starts: std::rc::Rc<std::cell::Cell<usize>>,
    }

    impl TickTimer for TestTimer {
        fn start_animation(&mut self) {
            self.animation_starts.set(self.animation_starts.get() + 1);
        }

        fn start_ack(&mut self) {
            self.ack_starts.set(self.ack_starts.get() + 1);
        }

        fn stop(&mut self) {}
    }

    struct Harness {
        decoder: Decoder<RamStorage, FrameLog, TestPin, TestTimer>,
        frames: std::rc::Rc<std::cell::RefCell<Vec<Vec<u8>>>>,
        ack_level: std::rc::Rc<std::cell::Cell<bool>>,
        ack_pulses: std::rc::Rc<std::cell::Cell<usize>>,
    }

    fn harness() -> Harness {
        harness_with(|_| {})
    }

    fn harness_with(prepare: impl FnOnce(&mut RamStorage)) -> Harness {
        let mut store = RamStorage::new();
        DecoderConfig::write_defaults(&mut store);
        let mut palette = Palette::new();
        palette.restore_defaults(&mut store);
        prepare(&mut store);

        let frames = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let pin = TestPin::default();
        let ack_level = pin.level.clone();
        let ack_pulses = pin.pulses.clone();
        let mut decoder = Decoder::new(
            store,
            FrameLog { frames: frames.clone() },
            AckOutput::Pin(pin),
            TestTimer::default(),
        );
        // RGB order keeps the frame assertions readable.
        decoder.write_cv(64, 0);
        frames.borrow_mut().clear();
        Harness { decoder, frames, ack_level, ack_pulses }
    }

    fn packet(bytes: &[u8]) -> Packet {
        let mut data = bytes.to_vec();
        data.push(bytes.iter().fold(0, |xor, byte| xor ^ byte));
        Packet::from_bytes(&data)
    }

    fn tick(harness: &mut Harness) -> Option<Vec<u8>> {
        harness.decoder.timer_fired();
        if harness.decoder.poll_animation() {
            harness.frames.borrow_mut().last().cloned()
        } else {
            None
        }
    }

    fn settle(harness: &mut Harness, ticks: usize) -> Vec<u8> {
        let mut last = Vec::new();
        for _ in 0..ticks {
            if let Some(frame) = tick(harness) {
                last = frame;
            }
        }
        last
    }

    /// Accessory packet bytes for an output address, re-mirroring RCN-213.
    fn accessory(output: u16, direction: bool, activate: bool) -> Packet {
        let raw = (output + 3) & 0x7FF;
        let decoder = raw >> 2;
        let port = (raw & 0x3) as u8;
        let byte0 = 0x80 | (decoder & 0x3F) as u8;
        let byte1 = 0x80
            | ((!(decoder >> 6) & 0x7) as u8) << 4
            | (activate as u8) << 3
            | port << 1
            | direction as u8;
        packet(&[byte0, byte1])
    }

    #[test]
    fn first_poll_paints_the_boot_aspect() {
        let mut harness = harness();
        assert!(harness.decoder.poll_animation());
        assert_eq!(harness.frames.borrow().last().unwrap(), &[255, 0, 0]);
    }

    #[test]
    fn green_command_starts_a_transition() {
        let mut harness = harness();
        harness.decoder.process_packet(&accessory(1, true, true));
        assert_eq!(settle(&mut harness, 25), [0, 255, 0]);
    }

    #[test]
    fn deactivate_commands_are_ignored() {
        let mut harness = harness();
        harness.decoder.process_packet(&accessory(1, true, false));
        assert_eq!(settle(&mut harness, 25), [255, 0, 0]);
    }

    #[test]
    fn second_output_selects_yellow_or_lunar() {
        let mut harness = harness();
        harness.decoder.process_packet(&accessory(2, true, true));
        assert_eq!(settle(&mut harness, 25), [127, 127, 0]);
        harness.decoder.process_packet(&accessory(2, false, true));
        // Yellow to lunar dips through red on the way.
        assert_eq!(settle(&mut harness, 40), [96, 96, 96]);
    }

    #[test]
    fn third_output_toggles_flashing() {
        let mut harness = harness();
        harness.decoder.process_packet(&accessory(3, true, true));
        // Deep in the blink cycle the head goes fully dark.
        let mut saw_dark = false;
        for _ in 0..46 {
            if let Some(frame) = tick(&mut harness) {
                saw_dark |= frame == [0, 0, 0];
            }
        }
        assert!(saw_dark);
    }

    #[test]
    fn head_numbering_is_inverted_with_multiple_heads() {
        let mut harness = harness();
        harness.decoder.write_cv(65, 3);
        // Output addresses 4..=6 drive the middle head; 1..=3 is the top,
        // which sits last on the strip.
        harness.decoder.process_packet(&accessory(4, true, true));
        let frame = settle(&mut harness, 25);
        assert_eq!(frame.len(), 9);
        assert_eq!(&frame[..3], &[255, 0, 0]);
        assert_eq!(&frame[3..6], &[0, 255, 0]);
        assert_eq!(&frame[6..], &[255, 0, 0]);
    }

    #[test]
    fn commands_outside_the_address_range_are_ignored() {
        let mut harness = harness();
        harness.decoder.process_packet(&accessory(17, true, true));
        assert_eq!(settle(&mut harness, 25), [255, 0, 0]);
    }

    #[test]
    fn emergency_off_blanks_and_sticks() {
        let mut harness = harness();
        harness.decoder.process_packet(&packet(&[0xBF, 0x80]));
        assert_eq!(harness.decoder.mode(), DecoderMode::EmergencyStop);
        assert_eq!(harness.frames.borrow().last().unwrap(), &[0, 0, 0]);

        // No animation while stopped, not even for queued commands.
        harness.frames.borrow_mut().clear();
        harness.decoder.process_packet(&accessory(17, true, true));
        settle(&mut harness, 5);
        assert!(harness.frames.borrow().is_empty());
        assert_eq!(harness.decoder.mode(), DecoderMode::EmergencyStop);

        // A command for this decoder releases it.
        harness.decoder.process_packet(&accessory(1, true, true));
        assert_eq!(harness.decoder.mode(), DecoderMode::Operation);
        assert_eq!(settle(&mut harness, 25), [0, 255, 0]);
    }

    #[test]
    fn reset_blanks_and_enters_programming_on_a_service_packet() {
        let mut harness = harness();
        harness.decoder.process_packet(&packet(&[0x00, 0x00]));
        assert_eq!(harness.decoder.mode(), DecoderMode::ResetReceived);
        assert_eq!(harness.frames.borrow().last().unwrap(), &[0, 0, 0]);

        harness.decoder.process_packet(&packet(&[0x7C, 0x2E, 0x32]));
        assert_eq!(harness.decoder.mode(), DecoderMode::Programming);
    }

    #[test]
    fn programming_packets_are_loco_packets_in_operation() {
        let mut harness = harness();
        harness.decoder.process_packet(&packet(&[0x7C, 0x2E, 0x32]));
        harness.decoder.process_packet(&packet(&[0x7C, 0x2E, 0x32]));
        assert_eq!(harness.decoder.mode(), DecoderMode::Operation);
        assert_eq!(harness.decoder.read_cv(47), Some(100));
    }

    #[test]
    fn repeated_write_acknowledges_and_takes_effect() {
        let mut harness = harness();
        harness.decoder.process_packet(&packet(&[0x00, 0x00]));
        let write = packet(&[0x7C, 0x2E, 0x32]);
        harness.decoder.process_packet(&write);
        assert_eq!(harness.ack_pulses.get(), 0);
        harness.decoder.process_packet(&write);
        assert_eq!(harness.ack_pulses.get(), 1);
        assert!(harness.ack_level.get());
        assert_eq!(harness.decoder.mode(), DecoderMode::SendingAck);

        // Packets are ignored while the pulse is out.
        harness.decoder.process_packet(&accessory(1, true, true));
        assert_eq!(harness.decoder.mode(), DecoderMode::SendingAck);

        // The pulse timer returns the decoder to programming.
        harness.decoder.timer_fired();
        assert!(!harness.ack_level.get());
        assert_eq!(harness.decoder.mode(), DecoderMode::Programming);
        assert_eq!(harness.decoder.read_cv(47), Some(0x32));
    }

    #[test]
    fn animation_resumes_after_a_programming_session() {
        let mut harness = harness();
        harness.decoder.process_packet(&packet(&[0x00, 0x00]));
        let write = packet(&[0x7C, 0x2E, 0x32]);
        harness.decoder.process_packet(&write);
        harness.decoder.process_packet(&write);
        harness.decoder.timer_fired();

        // Back on the main: brightness 50 scales the red boot aspect.
        harness.decoder.process_packet(&accessory(1, false, true));
        assert_eq!(harness.decoder.mode(), DecoderMode::Operation);
        assert_eq!(settle(&mut harness, 3), [127, 0, 0]);
    }

    #[test]
    fn factory_reset_restores_defaults() {
        let mut harness = harness();
        harness.decoder.write_cv(47, 10);
        harness.decoder.write_cv(50, 9);
        harness.decoder.process_packet(&packet(&[0x00, 0x00]));
        let reset = packet(&[0x7C, 0x07, 0x08]);
        harness.decoder.process_packet(&reset);
        harness.decoder.process_packet(&reset);
        assert_eq!(harness.decoder.read_cv(47), Some(100));
        assert_eq!(harness.decoder.read_cv(50), Some(0));
        assert_eq!(harness.decoder.read_cv(64), Some(1));
    }

    #[test]
    fn pom_writes_without_acknowledging() {
        let mut harness = harness();
        // POM write CV 47 = 60 at output address 1.
        let mut bytes = accessory(1, false, false).data()[..2].to_vec();
        bytes.extend_from_slice(&[0xEC, 0x2E, 60]);
        let pom = packet(&bytes);
        harness.decoder.process_packet(&pom);
        harness.decoder.process_packet(&pom);
        assert_eq!(harness.decoder.read_cv(47), Some(60));
        assert_eq!(harness.ack_pulses.get(), 0);
        assert_eq!(harness.decoder.mode(), DecoderMode::Operation);
    }

    #[test]
    fn pom_for_another_output_is_ignored() {
        let mut harness = harness();
        let mut bytes = accessory(9, false, false).data()[..2].to_vec();
        bytes.extend_from_slice(&[0xEC, 0x2E, 60]);
        let pom = packet(&bytes);
        harness.decoder.process_packet(&pom);
        harness.decoder.process_packet(&pom);
        assert_eq!(harness.decoder.read_cv(47), Some(100));
    }

    #[test]
    fn pom_decoder_addressing_workaround() {
        let mut harness = harness();
        harness.decoder.write_cv(1, 10);
        harness.decoder.write_cv(66, 1);

        // Decoder address 10, port 0, C clear: only matched with the
        // workaround enabled.
        let byte0 = 0x80 | 10;
        let byte1 = 0x80 | 0x70;
        let pom = packet(&[byte0, byte1, 0xEC, 0x2E, 40]);
        harness.decoder.process_packet(&pom);
        harness.decoder.process_packet(&pom);
        assert_eq!(harness.decoder.read_cv(47), Some(40));
    }

    #[test]
    fn leds_acknowledgement_flashes_white() {
        let mut store = RamStorage::new();
        DecoderConfig::write_defaults(&mut store);
        let mut palette = Palette::new();
        palette.restore_defaults(&mut store);
        let frames = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut decoder: Decoder<_, _, TestPin, _> = Decoder::new(
            store,
            FrameLog { frames: frames.clone() },
            AckOutput::Leds,
            TestTimer::default(),
        );

        decoder.process_packet(&packet(&[0x00, 0x00]));
        let write = packet(&[0x7C, 0x2E, 0x32]);
        decoder.process_packet(&write);
        decoder.process_packet(&write);
        assert_eq!(frames.borrow().last().unwrap(), &[0xFF, 0xFF, 0xFF]);
        decoder.timer_fired();
        assert_eq!(frames.borrow().last().unwrap(), &[0, 0, 0]);
        assert_eq!(decoder.mode(), DecoderMode::Programming);
    }

    #[test]
    fn register_mode_is_reachable_after_a_reset() {
        let mut harness = harness();
        harness.decoder.process_packet(&packet(&[0x00, 0x00]));
        harness.decoder.process_packet(&packet(&[0x7C, 0x2E, 0x32]));
        // Presetting the page register acknowledges once repeated.
        let preset = packet(&[0x7D, 0x02]);
        harness.decoder.process_packet(&preset);
        harness.decoder.process_packet(&preset);
        harness.decoder.timer_fired();
        assert_eq!(harness.ack_pulses.get(), 1);

        // Register 8 reads CV 8, the manufacturer ID.
        let verify = packet(&[0x77, 0x0D]);
        harness.decoder.process_packet(&verify);
        harness.decoder.process_packet(&verify);
        assert_eq!(harness.ack_pulses.get(), 2);
    }

    #[test]
    fn ticks_coalesce_into_one_frame() {
        let mut harness = harness();
        for _ in 0..5 {
            harness.decoder.timer_fired();
        }
        assert!(harness.decoder.poll_animation());
        assert!(!harness.decoder.poll_animation());
        assert_eq!(harness.frames.borrow().len(), 1);
    }
}
