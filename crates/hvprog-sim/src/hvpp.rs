//! Behavioural model of a parallel-wired target die.
//!
//! Latches commands, addresses and data on XTAL1 edges, words into the
//! page buffer on PAGEL, programs on the falling WR strobe and drives the
//! bus while OE is asserted. Mode entry is recognised from the variant's
//! power sequencing: the full-bus die wants VPP raised while the
//! prog-enable lines sit low with WR/OE released, the short-bus die wants
//! VPP raised while WR/OE are still held low.

use hvprog_core::port::{Direction, Line};
use hvprog_core::protocol::{opcodes, ParallelBus};

use crate::port::{Edge, Wires};

const FLASH_SIZE: usize = 512 * 1024;
const EEPROM_SIZE: usize = 2048;

/// A parallel die with its memories and programming state.
pub struct ParallelDie {
    bus: ParallelBus,
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
    ext: u8,
    data_lo: u8,
    data_hi: u8,
    /// Words latched but not yet committed: (low address byte, low, high).
    page: Vec<(u8, u8, u8)>,
    entered: bool,

    /// Extended bank loads observed.
    pub bank_loads: usize,
    /// Page commits observed.
    pub page_commits: usize,
    /// VPP reset pulses observed after mode entry.
    pub resets: usize,
}

impl ParallelDie {
    /// Fresh die, erased, on the given wiring.
    pub fn new(bus: ParallelBus) -> Self {
        Self {
            bus,
            signature: [0x1E, 0x97, 0x02],
            flash: vec![0xFF; FLASH_SIZE],
            eeprom: vec![0xFF; EEPROM_SIZE],
            fuses: [0x62, 0x99, 0xFF, 0xFF],
            command: 0,
            addr_lo: 0,
            addr_hi: 0,
            ext: 0,
            data_lo: 0,
            data_hi: 0,
            page: Vec::new(),
            entered: false,
            bank_loads: 0,
            page_commits: 0,
            resets: 0,
        }
    }

    /// Whether the entry sequencing has been recognised.
    pub fn entered(&self) -> bool {
        self.entered
    }

    /// Second fuse-select line as wired on this die.
    fn select2(&self, w: &Wires) -> bool {
        match self.bus {
            ParallelBus::Full => w.high(Line::Bs2),
            ParallelBus::Short => w.high(Line::Xa1),
        }
    }

    /// Fuse index for the read select encoding.
    fn read_select(&self, w: &Wires) -> usize {
        match (w.high(Line::Bs1), self.select2(w)) {
            (false, false) => 0, // low fuse
            (true, true) => 1,   // high fuse
            (false, true) => 2,  // extended fuse
            (true, false) => 3,  // lock bits
        }
    }

    /// Fuse index for the write select encoding, which differs from the
    /// read encoding. Lock bits travel under their own command.
    fn write_select(&self, w: &Wires) -> Option<usize> {
        match (w.high(Line::Bs1), self.select2(w)) {
            (false, false) => Some(0),
            (true, false) => Some(1),
            (false, true) => Some(2),
            (true, true) => None,
        }
    }

    fn word_base(&self) -> u32 {
        ((self.ext as u32) << 16) | ((self.addr_hi as u32) << 8)
    }

    pub(crate) fn on_edge(&mut self, line: Line, edge: Edge, w: &Wires) {
        match (line, edge) {
            (Line::Vpp, Edge::Rising) => self.check_entry(w),
            (Line::Vpp, Edge::Falling) => {
                if self.entered {
                    self.resets += 1;
                }
            }
            (Line::Xtal1, Edge::Rising) => self.latch(w),
            (Line::Pagel, Edge::Rising) => {
                if self.entered {
                    self.page.push((self.addr_lo, self.data_lo, self.data_hi));
                }
            }
            (Line::Wr, Edge::Falling) => self.write_strobe(w),
            _ => {}
        }
    }

    fn check_entry(&mut self, w: &Wires) {
        if self.entered {
            return;
        }
        let prog_enable_low = !w.high(Line::Xa0)
            && !w.high(Line::Xa1)
            && !w.high(Line::Bs1)
            && !w.high(Line::Pagel);
        self.entered = match self.bus {
            ParallelBus::Full => prog_enable_low && w.high(Line::Wr) && w.high(Line::Oe),
            ParallelBus::Short => !w.high(Line::Wr) && !w.high(Line::Oe) && w.high(Line::Vdd),
        };
        if self.entered {
            log::trace!("{:?} die entered programming mode", self.bus);
        }
    }

    /// XTAL1 latch: XA1/XA0 pick command, address or data; BS selects the
    /// half. A high BS2 with XA low is the extended bank load (the short
    /// bus has no BS2 pin and never sees one).
    fn latch(&mut self, w: &Wires) {
        if w.bus_dir != Direction::Output {
            return;
        }
        let xa0 = w.high(Line::Xa0);
        let xa1 = w.high(Line::Xa1);
        match (xa1, xa0) {
            (true, false) => self.command = w.bus_out,
            (false, false) => {
                if self.bus.has_bs2() && w.high(Line::Bs2) {
                    self.ext = w.bus_out;
                    self.bank_loads += 1;
                } else if w.high(Line::Bs1) {
                    self.addr_hi = w.bus_out;
                } else {
                    self.addr_lo = w.bus_out;
                }
            }
            (false, true) => {
                if w.high(Line::Bs1) {
                    self.data_hi = w.bus_out;
                } else {
                    self.data_lo = w.bus_out;
                }
            }
            (true, true) => {}
        }
    }

    fn write_strobe(&mut self, w: &Wires) {
        if !self.entered {
            return;
        }
        match self.command {
            opcodes::CMD_WRITE_FLASH => {
                let base = self.word_base();
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
            }
            opcodes::CMD_WRITE_EEPROM => {
                let addr = ((self.addr_hi as usize) << 8) | self.addr_lo as usize;
                if let Some(slot) = self.eeprom.get_mut(addr) {
                    *slot = self.data_lo;
                }
            }
            opcodes::CMD_WRITE_FUSE => {
                if let Some(index) = self.write_select(w) {
                    self.fuses[index] = self.data_lo;
                }
            }
            opcodes::CMD_WRITE_LOCK => self.fuses[3] = self.data_lo,
            opcodes::CMD_CHIP_ERASE => {
                self.flash.fill(0xFF);
                self.eeprom.fill(0xFF);
                self.fuses[3] = 0xFF;
            }
            _ => {}
        }
    }

    /// Value the die drives while OE is asserted, if any.
    pub(crate) fn drive_bus(&self, w: &Wires) -> Option<u8> {
        if !self.entered || w.high(Line::Oe) {
            return None;
        }
        let value = match self.command {
            opcodes::CMD_READ_SIGNATURE => self.signature[(self.addr_lo % 3) as usize],
            opcodes::CMD_READ_FLASH => {
                let word = self.word_base() | self.addr_lo as u32;
                let idx = (word * 2 + w.high(Line::Bs1) as u32) as usize;
                self.flash.get(idx).copied().unwrap_or(0xFF)
            }
            opcodes::CMD_READ_EEPROM => {
                let addr = ((self.addr_hi as usize) << 8) | self.addr_lo as usize;
                self.eeprom.get(addr).copied().unwrap_or(0xFF)
            }
            opcodes::CMD_READ_FUSE => self.fuses[self.read_select(w)],
            _ => 0x00,
        };
        Some(value)
    }
}
