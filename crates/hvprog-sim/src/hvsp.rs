//! Behavioural model of a serial high-voltage target die.
//!
//! Shifts 11-bit instruction/data frames on SCI edges, one SDO bit out per
//! pulse. A response loaded at the end of a frame is presented as
//! `byte << 3` in the next frame, which models the three-pulse trail the
//! real protocol has. Busy operations hold SDO low on the virtual clock;
//! a wedged die never releases it, exercising the engine's forced-reset
//! path.

use hvprog_core::port::{Direction, Line};
use hvprog_core::protocol::opcodes;

use crate::port::{Edge, Wires};

const FLASH_SIZE: usize = 128 * 1024;
const EEPROM_SIZE: usize = 512;

/// How long the die stays busy after a write, in virtual microseconds.
const BUSY_US: u64 = 3000;

/// A serial high-voltage die with its memories and shift registers.
pub struct SerialDie {
    /// Signature bytes returned for addresses 0..3.
    pub signature: [u8; 3],
    /// Flash contents, byte-addressed (two bytes per word).
    pub flash: Vec<u8>,
    /// EEPROM contents.
    pub eeprom: Vec<u8>,
    /// Fuse bytes: low, high, extended, lock.
    pub fuses: [u8; 4],

    command: u8,
    addr_lo: u8,
    addr_hi: u8,
    data_lo: u8,
    data_hi: u8,
    /// Words latched but not yet committed: (low address byte, low, high).
    page: Vec<(u8, u8, u8)>,

    sii_shift: u16,
    sdi_shift: u16,
    out_shift: u16,
    bit_count: u8,
    sdo_bit: bool,
    last_instr: u8,
    /// SDO reports ready/busy instead of shift data until the next frame.
    ready_mode: bool,

    busy_until: u64,
    wedged: bool,
    entered: bool,

    /// Page commits observed.
    pub page_commits: usize,
    /// VPP reset pulses observed after mode entry.
    pub resets: usize,
}

impl SerialDie {
    /// Fresh die, erased.
    pub fn new() -> Self {
        Self {
            signature: [0x1E, 0x93, 0x0B],
            flash: vec![0xFF; FLASH_SIZE],
            eeprom: vec![0xFF; EEPROM_SIZE],
            fuses: [0x6A, 0xFF, 0xFF, 0xFF],
            command: 0,
            addr_lo: 0,
            addr_hi: 0,
            data_lo: 0,
            data_hi: 0,
            page: Vec::new(),
            sii_shift: 0,
            sdi_shift: 0,
            out_shift: 0,
            bit_count: 0,
            sdo_bit: false,
            last_instr: 0,
            ready_mode: false,
            busy_until: 0,
            wedged: false,
            entered: false,
            page_commits: 0,
            resets: 0,
        }
    }

    /// Make every busy operation hang forever, so the engine's poll cap
    /// and forced reset kick in.
    pub fn set_wedged(&mut self, wedged: bool) {
        self.wedged = wedged;
    }

    /// Whether the entry sequencing has been recognised.
    pub fn entered(&self) -> bool {
        self.entered
    }

    pub(crate) fn on_edge(&mut self, line: Line, edge: Edge, w: &Wires) {
        match (line, edge) {
            (Line::Vpp, Edge::Rising) => {
                // Entry wants VDD up with SCI and the serial lines held low
                // by the programmer; the parallel probes raise VPP with the
                // bus floating, which keeps this die out.
                if !self.entered
                    && w.high(Line::Vdd)
                    && !w.high(Line::Sci)
                    && w.bus_dir == Direction::Output
                {
                    log::trace!("serial die entered programming mode");
                    self.entered = true;
                }
            }
            (Line::Vpp, Edge::Falling) => {
                if self.entered {
                    self.resets += 1;
                    self.busy_until = 0;
                    self.ready_mode = false;
                }
            }
            (Line::Sci, Edge::Rising) => self.clock(w),
            _ => {}
        }
    }

    /// One SCI pulse: shift SII/SDI in, one SDO bit out; decode the frame
    /// on the eleventh pulse.
    fn clock(&mut self, w: &Wires) {
        if !self.entered {
            return;
        }
        self.ready_mode = false;

        self.sii_shift = (self.sii_shift << 1) | w.high(Line::Sii) as u16;
        self.sdi_shift = (self.sdi_shift << 1) | w.high(Line::Sdi) as u16;
        self.sdo_bit = (self.out_shift >> 10) & 1 != 0;
        self.out_shift <<= 1;

        self.bit_count += 1;
        if self.bit_count == 11 {
            self.bit_count = 0;
            let instr = ((self.sii_shift & 0x7FF) >> 2) as u8;
            let data = ((self.sdi_shift & 0x7FF) >> 2) as u8;
            let response = self.execute(instr, data, w.now_us);
            self.out_shift = (response as u16) << 3;
            self.last_instr = instr;
        }
    }

    fn execute(&mut self, instr: u8, data: u8, now_us: u64) -> u8 {
        match instr {
            opcodes::SII_LOAD_COMMAND => self.command = data,
            opcodes::SII_LOAD_ADDR_LOW => self.addr_lo = data,
            opcodes::SII_LOAD_ADDR_HIGH => self.addr_hi = data,
            opcodes::SII_LOAD_DATA_LOW => self.data_lo = data,
            opcodes::SII_LOAD_DATA_HIGH => self.data_hi = data,
            // EEPROM latch; the value is already in the data register.
            opcodes::SII_LATCH_EEPROM => {}
            0x68 => return self.read_low(),
            0x78 => return self.read_high(),
            0x7A => return self.fuses[1],
            0x6A => return self.fuses[2],
            // Arming halves of the strobe pairs.
            0x64 | 0x74 | 0x66 | 0x7D => {}
            // Committing halves; which operation fires depends on the pair.
            0x6C | 0x7C | 0x6E => self.strobe(instr, now_us),
            _ => {}
        }
        0
    }

    fn strobe(&mut self, instr: u8, now_us: u64) {
        match (self.last_instr, instr) {
            (0x64, 0x6C) => self.commit_low_target(now_us),
            (0x74, 0x7C) => {
                if self.command == opcodes::CMD_WRITE_FUSE {
                    self.fuses[1] = self.data_lo;
                    self.begin_busy(now_us);
                }
            }
            (0x66, 0x6E) => {
                if self.command == opcodes::CMD_WRITE_FUSE {
                    self.fuses[2] = self.data_lo;
                    self.begin_busy(now_us);
                }
            }
            (0x7D, 0x7C) => {
                if self.command == opcodes::CMD_WRITE_FLASH {
                    self.page.push((self.addr_lo, self.data_lo, self.data_hi));
                }
            }
            _ => {}
        }
    }

    /// The (0x64, 0x6C) pair: its target depends on the loaded command.
    fn commit_low_target(&mut self, now_us: u64) {
        match self.command {
            opcodes::CMD_WRITE_FUSE => {
                self.fuses[0] = self.data_lo;
                self.begin_busy(now_us);
            }
            opcodes::CMD_WRITE_LOCK => {
                self.fuses[3] = self.data_lo;
                self.begin_busy(now_us);
            }
            opcodes::CMD_WRITE_EEPROM => {
                let addr = ((self.addr_hi as usize) << 8) | self.addr_lo as usize;
                if let Some(slot) = self.eeprom.get_mut(addr) {
                    *slot = self.data_lo;
                }
                self.begin_busy(now_us);
            }
            opcodes::CMD_WRITE_FLASH => {
                let base = (self.addr_hi as u32) << 8;
                for (lo, low, high) in self.page.drain(..) {
                    let idx = ((base | lo as u32) * 2) as usize;
                    if let Some(slot) = self.flash.get_mut(idx) {
                        *slot = low;
                    }
                    if let Some(slot) = self.flash.get_mut(idx + 1) {
                        *slot = high;
                    }
                }
                self.page_commits += 1;
                self.begin_busy(now_us);
            }
            opcodes::CMD_CHIP_ERASE => {
                self.flash.fill(0xFF);
                self.eeprom.fill(0xFF);
                self.fuses[3] = 0xFF;
                self.begin_busy(now_us);
            }
            _ => {}
        }
    }

    fn begin_busy(&mut self, now_us: u64) {
        self.busy_until = now_us + BUSY_US;
        self.ready_mode = true;
    }

    fn read_low(&self) -> u8 {
        match self.command {
            opcodes::CMD_READ_SIGNATURE => self.signature[(self.addr_lo % 3) as usize],
            opcodes::CMD_READ_FLASH => {
                let idx = self.word_index();
                self.flash.get(idx).copied().unwrap_or(0xFF)
            }
            opcodes::CMD_READ_EEPROM => {
                let addr = ((self.addr_hi as usize) << 8) | self.addr_lo as usize;
                self.eeprom.get(addr).copied().unwrap_or(0xFF)
            }
            opcodes::CMD_READ_FUSE => self.fuses[0],
            _ => 0,
        }
    }

    fn read_high(&self) -> u8 {
        match self.command {
            opcodes::CMD_READ_FLASH => {
                let idx = self.word_index() + 1;
                self.flash.get(idx).copied().unwrap_or(0xFF)
            }
            opcodes::CMD_READ_FUSE => self.fuses[3],
            _ => 0,
        }
    }

    fn word_index(&self) -> usize {
        let word = ((self.addr_hi as usize) << 8) | self.addr_lo as usize;
        word * 2
    }

    /// Value presented on SDO (bit 0 of the data bus).
    pub(crate) fn drive_bus(&self, w: &Wires) -> Option<u8> {
        if !self.entered || self.wedged {
            return Some(0);
        }
        if w.now_us < self.busy_until {
            return Some(0);
        }
        if self.ready_mode {
            return Some(1);
        }
        Some(self.sdo_bit as u8)
    }
}

impl Default for SerialDie {
    fn default() -> Self {
        Self::new()
    }
}
