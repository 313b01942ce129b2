//! Device models for exercising the driver without hardware: an SB16 DSP and the two ISA DMA
//! controllers with their page registers.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use retroplat_dos::{IoPortBus, PortIoDevice};

use crate::dsp::{cmd, ACK_16BIT, READ_DATA, READ_STATUS, RESET, WRITE};

/// How a modelled card responds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CardBehavior {
    pub version: (u8, u8),
    /// Never signals data ready.
    pub dead: bool,
    pub reset_reply: u8,
    /// Status reads after a reset before the reply shows up.
    pub reset_latency_polls: u32,
    /// Write-status reads that report busy before each accepted byte.
    pub write_busy_polls: u32,
}

impl Default for CardBehavior {
    fn default() -> Self {
        Self {
            version: (4, 5),
            dead: false,
            reset_reply: 0xAA,
            reset_latency_polls: 0,
            write_busy_polls: 0,
        }
    }
}

#[derive(Debug, Default)]
struct CardState {
    behavior: CardBehavior,
    output: VecDeque<u8>,
    reset_high: bool,
    latency: u32,
    busy: u32,
    command: Vec<u8>,
    written: Vec<u8>,
    resets: u32,
    speaker_on: bool,
    sample_rate: Option<u16>,
    mode: Option<u8>,
    block_len: Option<u16>,
    auto_init: bool,
    acks_16bit: u32,
}

/// Sound Blaster 16 DSP. Clones share state.
#[derive(Clone, Debug)]
pub struct Sb16Model {
    base: u16,
    state: Rc<RefCell<CardState>>,
}

impl Sb16Model {
    pub fn new(base: u16) -> Self {
        Self::with_behavior(base, CardBehavior::default())
    }

    pub fn with_behavior(base: u16, behavior: CardBehavior) -> Self {
        Self {
            base,
            state: Rc::new(RefCell::new(CardState {
                behavior,
                ..CardState::default()
            })),
        }
    }

    pub fn attach(&self, bus: &mut IoPortBus) {
        bus.register_range(self.base, 0x10, Box::new(self.clone()));
    }

    /// Every byte written to the DSP command port, in order.
    pub fn written(&self) -> Vec<u8> {
        self.state.borrow().written.clone()
    }

    pub fn resets(&self) -> u32 {
        self.state.borrow().resets
    }

    pub fn speaker_on(&self) -> bool {
        self.state.borrow().speaker_on
    }

    pub fn sample_rate(&self) -> Option<u16> {
        self.state.borrow().sample_rate
    }

    pub fn mode(&self) -> Option<u8> {
        self.state.borrow().mode
    }

    /// Samples per block minus one, as programmed.
    pub fn block_len(&self) -> Option<u16> {
        self.state.borrow().block_len
    }

    pub fn auto_init(&self) -> bool {
        self.state.borrow().auto_init
    }

    pub fn acks_16bit(&self) -> u32 {
        self.state.borrow().acks_16bit
    }
}

impl CardState {
    fn params_needed(command: u8) -> usize {
        match command {
            cmd::SET_OUTPUT_RATE => 2,
            cmd::START_16BIT_AUTOINIT => 3,
            _ => 0,
        }
    }

    fn accept(&mut self, byte: u8) {
        self.written.push(byte);
        self.command.push(byte);
        let needed = Self::params_needed(self.command[0]);
        if self.command.len() <= needed {
            return;
        }
        let command = std::mem::take(&mut self.command);
        match command[0] {
            cmd::GET_VERSION => {
                let (major, minor) = self.behavior.version;
                self.output.push_back(major);
                self.output.push_back(minor);
            }
            cmd::SPEAKER_ON => self.speaker_on = true,
            cmd::SPEAKER_OFF => self.speaker_on = false,
            cmd::EXIT_16BIT_AUTOINIT => self.auto_init = false,
            cmd::SET_OUTPUT_RATE => {
                self.sample_rate = Some(u16::from_be_bytes([command[1], command[2]]));
            }
            cmd::START_16BIT_AUTOINIT => {
                self.mode = Some(command[1]);
                self.block_len = Some(u16::from_le_bytes([command[2], command[3]]));
                self.auto_init = true;
            }
            _ => {}
        }
    }
}

impl PortIoDevice for Sb16Model {
    fn read(&mut self, port: u16) -> u8 {
        let mut s = self.state.borrow_mut();
        match port - self.base {
            READ_STATUS => {
                if s.behavior.dead {
                    0
                } else if s.latency > 0 {
                    s.latency -= 1;
                    0
                } else if s.output.is_empty() {
                    0
                } else {
                    0x80
                }
            }
            READ_DATA => s.output.pop_front().unwrap_or(0),
            WRITE => {
                if s.busy > 0 {
                    s.busy -= 1;
                    0x80
                } else {
                    0
                }
            }
            ACK_16BIT => {
                s.acks_16bit += 1;
                0
            }
            _ => 0xFF,
        }
    }

    fn write(&mut self, port: u16, value: u8) {
        let mut s = self.state.borrow_mut();
        match port - self.base {
            RESET => {
                if value & 1 != 0 {
                    s.reset_high = true;
                } else if s.reset_high {
                    s.reset_high = false;
                    s.resets += 1;
                    s.output.clear();
                    s.command.clear();
                    s.speaker_on = false;
                    s.auto_init = false;
                    if !s.behavior.dead {
                        let reply = s.behavior.reset_reply;
                        s.output.push_back(reply);
                    }
                    s.latency = s.behavior.reset_latency_polls;
                }
            }
            WRITE => {
                s.busy = s.behavior.write_busy_polls;
                s.accept(value);
            }
            _ => {}
        }
    }
}

/// Snapshot of one DMA channel's registers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DmaChannelRegs {
    pub masked: bool,
    pub mode: u8,
    pub page: u8,
    /// Base address register (words on the 16-bit controller).
    pub address: u16,
    /// Base count register, one less than the transfer length.
    pub count: u16,
}

#[derive(Debug)]
struct DmaState {
    channels: [DmaChannelRegs; 8],
    current: [u16; 8],
    flip_flop: [bool; 2],
    clear_mask_writes: [u32; 2],
}

/// Both 8237 controllers plus page registers. All channels start masked.
#[derive(Clone, Debug)]
pub struct DmaControllerModel {
    state: Rc<RefCell<DmaState>>,
}

impl Default for DmaControllerModel {
    fn default() -> Self {
        Self::new()
    }
}

const PAGE_PORTS: [u16; 8] = [0x87, 0x83, 0x81, 0x82, 0x8F, 0x8B, 0x89, 0x8A];

impl DmaControllerModel {
    pub fn new() -> Self {
        let channels = [DmaChannelRegs {
            masked: true,
            ..Default::default()
        }; 8];
        Self {
            state: Rc::new(RefCell::new(DmaState {
                channels,
                current: [0; 8],
                flip_flop: [false; 2],
                clear_mask_writes: [0; 2],
            })),
        }
    }

    pub fn attach(&self, bus: &mut IoPortBus) {
        bus.register_range(0x00, 0x10, Box::new(self.clone()));
        bus.register_range(0x80, 0x10, Box::new(self.clone()));
        bus.register_range(0xC0, 0x20, Box::new(self.clone()));
    }

    pub fn channel(&self, ch: u8) -> DmaChannelRegs {
        self.state.borrow().channels[usize::from(ch)]
    }

    /// Set what the current-count register reads back, as the transfer would advance it.
    pub fn set_current_count(&self, ch: u8, count: u16) {
        self.state.borrow_mut().current[usize::from(ch)] = count;
    }

    /// Writes to the "clear mask register" port of the 8-bit (`0`) or 16-bit (`1`) controller.
    pub fn clear_mask_writes(&self, controller: usize) -> u32 {
        self.state.borrow().clear_mask_writes[controller]
    }
}

impl DmaState {
    fn latch_write(&mut self, controller: usize, old: u16, value: u8) -> u16 {
        let hi = self.flip_flop[controller];
        self.flip_flop[controller] = !hi;
        if hi {
            (old & 0x00FF) | (u16::from(value) << 8)
        } else {
            (old & 0xFF00) | u16::from(value)
        }
    }

    fn single_mask(&mut self, controller: usize, value: u8) {
        let ch = controller * 4 + usize::from(value & 3);
        self.channels[ch].masked = value & 0x04 != 0;
    }

    fn clear_mask(&mut self, controller: usize) {
        self.clear_mask_writes[controller] += 1;
        for ch in &mut self.channels[controller * 4..controller * 4 + 4] {
            ch.masked = false;
        }
    }

    /// `(controller, channel, is_count)` for an address/count port.
    fn decode_channel_port(port: u16) -> Option<(usize, usize, bool)> {
        match port {
            0x00..=0x07 => Some((0, usize::from(port / 2), port % 2 == 1)),
            0xC0..=0xCF => {
                let reg = (port - 0xC0) / 2;
                Some((1, 4 + usize::from(reg / 2), reg % 2 == 1))
            }
            _ => None,
        }
    }
}

impl PortIoDevice for DmaControllerModel {
    fn read(&mut self, port: u16) -> u8 {
        let mut s = self.state.borrow_mut();
        match DmaState::decode_channel_port(port) {
            Some((controller, ch, true)) => {
                let hi = s.flip_flop[controller];
                s.flip_flop[controller] = !hi;
                let [lo, high] = s.current[ch].to_le_bytes();
                if hi {
                    high
                } else {
                    lo
                }
            }
            _ => 0,
        }
    }

    fn write(&mut self, port: u16, value: u8) {
        let mut s = self.state.borrow_mut();
        if let Some(ch) = PAGE_PORTS.iter().position(|&p| p == port) {
            s.channels[ch].page = value;
            return;
        }
        if let Some((controller, ch, is_count)) = DmaState::decode_channel_port(port) {
            if is_count {
                let old = s.channels[ch].count;
                let new = s.latch_write(controller, old, value);
                s.channels[ch].count = new;
                s.current[ch] = new;
            } else {
                let old = s.channels[ch].address;
                let new = s.latch_write(controller, old, value);
                s.channels[ch].address = new;
            }
            return;
        }
        match port {
            0x0A => s.single_mask(0, value),
            0x0B => s.channels[usize::from(value & 3)].mode = value,
            0x0C => s.flip_flop[0] = false,
            0x0E => s.clear_mask(0),
            0xD4 => s.single_mask(1, value),
            0xD6 => s.channels[4 + usize::from(value & 3)].mode = value,
            0xD8 => s.flip_flop[1] = false,
            0xDC => s.clear_mask(1),
            _ => {}
        }
    }
}
