//! Signal-level protocol drivers for the three wiring variants.
//!
//! `parallel` and `serial` hold the raw sequences; [`ProtocolDriver`]
//! dispatches one logical operation set over them based on the variant the
//! detector fixed for the session.

pub mod opcodes;
pub mod parallel;
pub mod serial;

use crate::fuse::{self, FuseKind};
use crate::port::{Direction, Level, Line, TargetPort};
use crate::timing::Timings;

/// The wiring variant of the attached target, fixed once per session by the
/// detector. Selects which driver every subsequent operation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceVariant {
    /// Full parallel bus with both byte-select lines.
    FullParallel,
    /// Reduced parallel bus; XA1 doubles as the second select line.
    ShortBus,
    /// Serial high-voltage programming over SCI/SDI/SII/SDO.
    SerialHv,
}

impl DeviceVariant {
    /// The parallel wiring flavour, if this variant is parallel at all.
    pub fn parallel_bus(self) -> Option<ParallelBus> {
        match self {
            Self::FullParallel => Some(ParallelBus::Full),
            Self::ShortBus => Some(ParallelBus::Short),
            Self::SerialHv => None,
        }
    }
}

/// Flavour of the parallel wiring. The short bus has no BS2 line and uses
/// XA1 in its place for fuse selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParallelBus {
    /// All select lines present.
    Full,
    /// No BS2 line.
    Short,
}

impl ParallelBus {
    /// Whether the BS2 line exists on this wiring.
    pub fn has_bs2(self) -> bool {
        matches!(self, Self::Full)
    }

    /// The second fuse-select line: BS2 on the full bus, XA1 on the short
    /// bus.
    pub fn select2(self) -> Line {
        match self {
            Self::Full => Line::Bs2,
            Self::Short => Line::Xa1,
        }
    }
}

/// Pulse VPP low to force a physical reset of a wedged target.
///
/// The sole recovery path when a busy poll never clears. Session state is
/// not guaranteed consistent afterwards; the host must issue a fresh
/// connect.
pub fn reset_target<P: TargetPort>(port: &mut P, t: &Timings) {
    port.set_line(Line::Vpp, Level::Low);
    port.wait_ms(t.reset_pulse_ms);
    port.set_line(Line::Vpp, Level::High);
}

/// Cache of the last-issued extended address bank.
///
/// The bank-select load is only re-issued when bits 24:17 of the requested
/// byte address differ from the cached value. Consulted by the parallel
/// flash-read and page-commit paths; the serial variant's 16-bit word
/// addressing never needs it.
#[derive(Debug, Default)]
pub struct BankTracker {
    current: u8,
}

impl BankTracker {
    /// Fresh tracker with bank 0 considered issued, matching the target's
    /// power-on state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget any issued bank; called on connect.
    pub fn reset(&mut self) {
        self.current = 0;
    }

    /// Issue the bank-select load for `address` if its bank differs from
    /// the cached one.
    pub fn update<P: TargetPort>(&mut self, port: &mut P, t: &Timings, address: u32) {
        let bank = ((address >> 17) & 0xFF) as u8;
        if bank == self.current {
            return;
        }
        self.current = bank;
        log::debug!("switching to address bank {:#04x}", bank);

        port.set_bus_direction(Direction::Output);
        port.set_line(Line::Xa0, Level::Low);
        port.set_line(Line::Xa1, Level::Low);
        port.set_line(Line::Bs1, Level::Low);
        port.set_line(Line::Bs2, Level::High);
        port.write_bus(bank);
        parallel::pulse_xtal1(port, t);
    }
}

/// One logical operation set dispatched over the variant's raw sequences.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolDriver {
    variant: DeviceVariant,
}

impl ProtocolDriver {
    /// Driver for a fixed variant.
    pub fn new(variant: DeviceVariant) -> Self {
        Self { variant }
    }

    /// The variant this driver speaks.
    pub fn variant(&self) -> DeviceVariant {
        self.variant
    }

    /// Read one signature byte.
    pub fn read_signature<P: TargetPort>(&self, port: &mut P, t: &Timings, index: u8) -> u8 {
        match self.variant.parallel_bus() {
            Some(bus) => parallel::read_signature(port, t, bus, index),
            None => serial::read_signature(port, t, index),
        }
    }

    /// Read one flash byte at a byte address.
    pub fn read_flash<P: TargetPort>(
        &self,
        port: &mut P,
        t: &Timings,
        bank: &mut BankTracker,
        address: u32,
    ) -> u8 {
        match self.variant.parallel_bus() {
            Some(bus) => parallel::read_flash(port, t, bus, bank, address),
            None => serial::read_flash(port, t, address),
        }
    }

    /// Read one EEPROM byte.
    pub fn read_eeprom<P: TargetPort>(&self, port: &mut P, t: &Timings, address: u16) -> u8 {
        match self.variant.parallel_bus() {
            Some(bus) => parallel::read_eeprom(port, t, bus, address),
            None => serial::read_eeprom(port, t, address),
        }
    }

    /// Load the write-flash command, opening a fresh page in the target's
    /// page buffer.
    pub fn start_page_load<P: TargetPort>(&self, port: &mut P, t: &Timings) {
        match self.variant.parallel_bus() {
            Some(bus) => parallel::load_command(port, t, bus, opcodes::CMD_WRITE_FLASH),
            None => {
                serial::exchange(port, t, opcodes::SII_LOAD_COMMAND, opcodes::CMD_WRITE_FLASH);
            }
        }
    }

    /// Load one flash word into the target's page buffer.
    ///
    /// `poll_mode` is accepted for interface compatibility with the host
    /// protocol and never branched on.
    pub fn load_flash_word<P: TargetPort>(
        &self,
        port: &mut P,
        t: &Timings,
        address: u32,
        low: u8,
        high: u8,
        _poll_mode: u8,
    ) {
        match self.variant.parallel_bus() {
            Some(bus) => parallel::load_flash_word(port, t, bus, address, low, high),
            None => serial::load_flash_word(port, t, address, low, high),
        }
    }

    /// Commit the target's page buffer at the page containing `address`.
    pub fn commit_page<P: TargetPort>(
        &self,
        port: &mut P,
        t: &Timings,
        bank: &mut BankTracker,
        address: u32,
    ) {
        log::debug!("page commit at {:#08x}", address);
        match self.variant.parallel_bus() {
            Some(bus) => parallel::commit_page(port, t, bus, bank, address),
            None => serial::commit_page(port, t, address),
        }
    }

    /// Write one EEPROM byte.
    pub fn write_eeprom<P: TargetPort>(&self, port: &mut P, t: &Timings, address: u16, data: u8) {
        match self.variant.parallel_bus() {
            Some(bus) => parallel::write_eeprom(port, t, bus, address, data),
            None => serial::write_eeprom(port, t, address, data),
        }
    }

    /// Read a fuse or lock byte.
    pub fn read_fuse<P: TargetPort>(&self, port: &mut P, t: &Timings, kind: FuseKind) -> u8 {
        fuse::read_fuse(port, t, self.variant, kind)
    }

    /// Write a fuse or lock byte.
    pub fn write_fuse<P: TargetPort>(&self, port: &mut P, t: &Timings, kind: FuseKind, value: u8) {
        fuse::write_fuse(port, t, self.variant, kind, value)
    }

    /// Erase flash, EEPROM and lock bits.
    pub fn chip_erase<P: TargetPort>(&self, port: &mut P, t: &Timings) {
        match self.variant.parallel_bus() {
            Some(bus) => parallel::chip_erase(port, t, bus),
            None => serial::chip_erase(port, t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Port that records XTAL1 pulses issued while the bank-select lines
    /// are asserted.
    struct RecordPort {
        bs2: bool,
        xa0: bool,
        xa1: bool,
        bank_loads: usize,
        last_bank: u8,
        bus: u8,
    }

    impl RecordPort {
        fn new() -> Self {
            Self {
                bs2: false,
                xa0: false,
                xa1: false,
                bank_loads: 0,
                last_bank: 0,
                bus: 0,
            }
        }
    }

    impl TargetPort for RecordPort {
        fn set_line(&mut self, line: Line, level: Level) {
            let high = level == Level::High;
            match line {
                Line::Bs2 => self.bs2 = high,
                Line::Xa0 => self.xa0 = high,
                Line::Xa1 => self.xa1 = high,
                Line::Xtal1 if high => {
                    if self.bs2 && !self.xa0 && !self.xa1 {
                        self.bank_loads += 1;
                        self.last_bank = self.bus;
                    }
                }
                _ => {}
            }
        }
        fn set_bus_direction(&mut self, _dir: Direction) {}
        fn write_bus(&mut self, value: u8) {
            self.bus = value;
        }
        fn read_bus(&mut self) -> u8 {
            0
        }
        fn attach(&mut self) {}
        fn detach(&mut self) {}
        fn wait_us(&mut self, _us: u32) {}
    }

    #[test]
    fn bank_load_issued_once_per_distinct_bank() {
        let mut port = RecordPort::new();
        let t = Timings::default();
        let mut tracker = BankTracker::new();

        // Bank 0 is the power-on state, never re-issued.
        tracker.update(&mut port, &t, 0x0001_0000);
        assert_eq!(port.bank_loads, 0);

        tracker.update(&mut port, &t, 0x0002_0000);
        assert_eq!(port.bank_loads, 1);
        assert_eq!(port.last_bank, 1);

        // Same bank again, no new load.
        tracker.update(&mut port, &t, 0x0002_ABCD);
        assert_eq!(port.bank_loads, 1);

        tracker.update(&mut port, &t, 0x0000_0010);
        assert_eq!(port.bank_loads, 2);
        assert_eq!(port.last_bank, 0);
    }

    #[test]
    fn reset_clears_cached_bank() {
        let mut port = RecordPort::new();
        let t = Timings::default();
        let mut tracker = BankTracker::new();

        tracker.update(&mut port, &t, 0x0002_0000);
        tracker.reset();
        tracker.update(&mut port, &t, 0x0002_0000);
        assert_eq!(port.bank_loads, 2);
    }
}
