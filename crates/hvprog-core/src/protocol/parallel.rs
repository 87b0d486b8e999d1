//! Raw sequences for the parallel wiring variants.
//!
//! Commands, addresses and data travel over the shared 8-bit bus and are
//! latched by XTAL1 strobes, with XA0/XA1 selecting the load type and
//! BS1/BS2 selecting the byte or register half. The short bus lacks BS2;
//! callers pass the [`ParallelBus`] flavour so the sequences drive only the
//! lines that exist.

use super::opcodes;
use super::{BankTracker, ParallelBus};
use crate::port::{Direction, Level, Line, TargetPort};
use crate::timing::Timings;

/// One XTAL1 strobe.
pub fn pulse_xtal1<P: TargetPort>(port: &mut P, t: &Timings) {
    port.set_line(Line::Xtal1, Level::High);
    port.wait_us(t.xtal_pulse_us);
    port.set_line(Line::Xtal1, Level::Low);
    port.wait_us(t.xtal_pulse_us);
}

/// Load the command register. XA = [1:0], BS1 low.
pub fn load_command<P: TargetPort>(port: &mut P, t: &Timings, bus: ParallelBus, command: u8) {
    port.set_bus_direction(Direction::Output);
    port.write_bus(command);
    port.set_line(Line::Xa1, Level::High);
    port.set_line(Line::Xa0, Level::Low);
    port.set_line(Line::Bs1, Level::Low);
    if bus.has_bs2() {
        port.set_line(Line::Bs2, Level::Low);
    }
    port.wait_us(t.bus_settle_us);
    pulse_xtal1(port, t);
}

/// Load one half of the address register. XA = [0:0], BS1 selects the half.
pub fn load_address<P: TargetPort>(
    port: &mut P,
    t: &Timings,
    bus: ParallelBus,
    byte: u8,
    high: bool,
) {
    port.set_line(Line::Xa1, Level::Low);
    port.set_line(Line::Xa0, Level::Low);
    port.set_line(Line::Bs1, if high { Level::High } else { Level::Low });
    if bus.has_bs2() {
        port.set_line(Line::Bs2, Level::Low);
    }
    port.set_bus_direction(Direction::Output);
    port.write_bus(byte);
    port.wait_us(t.addr_settle_us);
    pulse_xtal1(port, t);
}

/// Read one signature byte.
pub fn read_signature<P: TargetPort>(port: &mut P, t: &Timings, bus: ParallelBus, index: u8) -> u8 {
    load_command(port, t, bus, opcodes::CMD_READ_SIGNATURE);
    load_address(port, t, bus, index, false);
    port.set_bus_direction(Direction::Input);
    port.set_line(Line::Oe, Level::Low);
    port.wait_ms(t.sig_settle_ms);
    let result = port.read_bus();
    port.set_line(Line::Oe, Level::High);
    result
}

/// Read one flash byte. The byte address maps to a word address plus BS1
/// for the high byte; the bank tracker re-issues the extended bank load
/// only when the 128 KiB bank changes.
pub fn read_flash<P: TargetPort>(
    port: &mut P,
    t: &Timings,
    bus: ParallelBus,
    bank: &mut BankTracker,
    address: u32,
) -> u8 {
    load_command(port, t, bus, opcodes::CMD_READ_FLASH);
    bank.update(port, t, address);
    load_address(port, t, bus, (address >> 9) as u8, true);
    load_address(port, t, bus, (address >> 1) as u8, false);

    port.set_bus_direction(Direction::Input);
    let half = if address & 1 != 0 { Level::High } else { Level::Low };
    port.set_line(Line::Bs1, half);
    port.set_line(Line::Oe, Level::Low);
    port.wait_us(t.bus_settle_us);
    let result = port.read_bus();
    port.set_line(Line::Oe, Level::High);
    result
}

/// Read one EEPROM byte.
pub fn read_eeprom<P: TargetPort>(port: &mut P, t: &Timings, bus: ParallelBus, address: u16) -> u8 {
    load_command(port, t, bus, opcodes::CMD_READ_EEPROM);
    load_address(port, t, bus, (address >> 8) as u8, true);
    load_address(port, t, bus, address as u8, false);
    port.set_bus_direction(Direction::Input);
    port.set_line(Line::Bs1, Level::Low);
    port.set_line(Line::Oe, Level::Low);
    port.wait_us(t.bus_settle_us);
    let result = port.read_bus();
    port.set_line(Line::Oe, Level::High);
    result
}

/// Load one word into the target's page buffer and latch it with PAGEL.
pub fn load_flash_word<P: TargetPort>(
    port: &mut P,
    t: &Timings,
    bus: ParallelBus,
    address: u32,
    low: u8,
    high: u8,
) {
    load_address(port, t, bus, (address >> 1) as u8, false);

    port.set_line(Line::Xa0, Level::High);
    port.set_line(Line::Xa1, Level::Low);
    port.write_bus(low);
    pulse_xtal1(port, t);

    port.set_line(Line::Bs1, Level::High);
    port.write_bus(high);
    pulse_xtal1(port, t);

    port.set_line(Line::Pagel, Level::High);
    port.wait_us(t.bus_settle_us);
    port.set_line(Line::Pagel, Level::Low);
    port.wait_us(t.bus_settle_us);
}

/// Commit the page containing `address`: re-assert the page address, strobe
/// WR, settle, then park the command register.
pub fn commit_page<P: TargetPort>(
    port: &mut P,
    t: &Timings,
    bus: ParallelBus,
    bank: &mut BankTracker,
    address: u32,
) {
    load_address(port, t, bus, (address >> 9) as u8, true);
    bank.update(port, t, address);

    port.set_line(Line::Wr, Level::Low);
    port.wait_us(t.page_strobe_us);
    port.set_line(Line::Wr, Level::High);
    port.wait_ms(t.page_settle_ms);

    load_command(port, t, bus, opcodes::CMD_NOP);
}

/// Write one EEPROM byte: load command, address and data, then strobe WR.
pub fn write_eeprom<P: TargetPort>(
    port: &mut P,
    t: &Timings,
    bus: ParallelBus,
    address: u16,
    data: u8,
) {
    load_command(port, t, bus, opcodes::CMD_WRITE_EEPROM);
    load_address(port, t, bus, (address >> 8) as u8, true);
    load_address(port, t, bus, address as u8, false);

    port.set_line(Line::Xa1, Level::Low);
    port.set_line(Line::Xa0, Level::High);
    port.write_bus(data);
    port.wait_us(t.bus_settle_us);
    pulse_xtal1(port, t);

    port.set_line(Line::Wr, Level::Low);
    port.wait_ms(t.fuse_strobe_ms);
    port.set_line(Line::Wr, Level::High);
    port.wait_ms(t.eeprom_settle_ms);
}

/// Chip erase: load the erase command and strobe WR.
pub fn chip_erase<P: TargetPort>(port: &mut P, t: &Timings, bus: ParallelBus) {
    load_command(port, t, bus, opcodes::CMD_CHIP_ERASE);
    port.set_line(Line::Wr, Level::Low);
    port.wait_us(t.erase_strobe_us);
    port.set_line(Line::Wr, Level::High);
    port.wait_ms(t.erase_settle_ms);
}
