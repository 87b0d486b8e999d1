//! Raw sequences for the serial high-voltage variant.
//!
//! Every operation is built from 11-bit full-duplex frames shifted over
//! SCI, with the instruction on SII, data on SDI and the target answering
//! on SDO (bit 0 of the data bus). The target's response trails its own
//! output by exactly three clock pulses, hence the right shift in
//! [`exchange`].

use super::opcodes;
use super::reset_target;
use crate::port::{Direction, Level, Line, TargetPort};
use crate::timing::Timings;

/// Shift one instruction/data frame out and return the inbound byte.
///
/// Both bytes are packed into 11-bit frames (`byte << 2`) and shifted
/// MSB-first over 11 clock pulses while one inbound bit is sampled per
/// pulse. The accumulated inbound frame is right-shifted by 3 to account
/// for the target's trailing response.
pub fn exchange<P: TargetPort>(port: &mut P, t: &Timings, instr: u8, data: u8) -> u8 {
    let command = (instr as u16) << 2;
    let dat = (data as u16) << 2;
    let mut request: u16 = 0;

    port.set_bus_direction(Direction::Input);
    for i in 0..11 {
        let bit = 10 - i;
        port.wait_us(t.sci_setup_us);
        let sii = if command >> bit & 1 != 0 { Level::High } else { Level::Low };
        port.set_line(Line::Sii, sii);
        let sdi = if dat >> bit & 1 != 0 { Level::High } else { Level::Low };
        port.set_line(Line::Sdi, sdi);
        port.set_line(Line::Sci, Level::High);
        port.wait_us(t.sci_setup_us);
        port.set_line(Line::Sci, Level::Low);
        if port.read_bus() & 0x01 != 0 {
            request |= 1 << bit;
        }
    }
    (request >> 3) as u8
}

/// Shorthand for a strobe or readback pair of instructions. Returns the
/// byte sampled during the second frame.
fn exchange_pair<P: TargetPort>(port: &mut P, t: &Timings, pair: (u8, u8)) -> u8 {
    exchange(port, t, pair.0, 0x00);
    exchange(port, t, pair.1, 0x00)
}

/// Wait for the target to clear its busy indication on SDO.
///
/// Polls at a fixed spacing up to the iteration cap; hitting the cap means
/// the target is wedged and triggers a forced physical reset. No error
/// propagates upward in that case; the host is expected to start over with
/// a fresh connect.
pub fn wait_busy<P: TargetPort>(port: &mut P, t: &Timings) {
    port.wait_us(t.busy_initial_us);
    let mut polls: u32 = 0;
    while port.read_bus() & 0x01 == 0 {
        port.wait_us(t.busy_poll_us);
        polls += 1;
        if polls == t.busy_poll_cap {
            log::warn!("target stuck busy after {} polls, forcing reset", polls);
            reset_target(port, t);
            return;
        }
    }
}

/// Read one signature byte.
pub fn read_signature<P: TargetPort>(port: &mut P, t: &Timings, index: u8) -> u8 {
    exchange(port, t, opcodes::SII_LOAD_COMMAND, opcodes::CMD_READ_SIGNATURE);
    exchange(port, t, opcodes::SII_LOAD_ADDR_LOW, index);
    exchange_pair(port, t, opcodes::SII_READ_LOW)
}

/// Read one flash byte at a byte address.
pub fn read_flash<P: TargetPort>(port: &mut P, t: &Timings, address: u32) -> u8 {
    exchange(port, t, opcodes::SII_LOAD_COMMAND, opcodes::CMD_READ_FLASH);
    exchange(port, t, opcodes::SII_LOAD_ADDR_LOW, (address >> 1) as u8);
    exchange(port, t, opcodes::SII_LOAD_ADDR_HIGH, (address >> 9) as u8);
    exchange(port, t, opcodes::SII_READ_LOW.0, 0x00);

    if address & 1 != 0 {
        exchange_pair(port, t, opcodes::SII_READ_HIGH)
    } else {
        exchange_pair(port, t, opcodes::SII_READ_LOW)
    }
}

/// Read one EEPROM byte.
pub fn read_eeprom<P: TargetPort>(port: &mut P, t: &Timings, address: u16) -> u8 {
    exchange(port, t, opcodes::SII_LOAD_COMMAND, opcodes::CMD_READ_EEPROM);
    exchange(port, t, opcodes::SII_LOAD_ADDR_LOW, address as u8);
    exchange(port, t, opcodes::SII_LOAD_ADDR_HIGH, (address >> 8) as u8);
    exchange_pair(port, t, opcodes::SII_READ_LOW)
}

/// Load one word into the target's page buffer.
pub fn load_flash_word<P: TargetPort>(port: &mut P, t: &Timings, address: u32, low: u8, high: u8) {
    exchange(port, t, opcodes::SII_LOAD_ADDR_LOW, (address >> 1) as u8);
    exchange(port, t, opcodes::SII_LOAD_DATA_LOW, low);
    exchange(port, t, opcodes::SII_LOAD_DATA_HIGH, high);
    exchange_pair(port, t, opcodes::SII_LATCH_HIGH);
}

/// Commit the page containing `address`: strobe, wait for the target to
/// finish, then park the command register.
pub fn commit_page<P: TargetPort>(port: &mut P, t: &Timings, address: u32) {
    exchange(port, t, opcodes::SII_LOAD_ADDR_HIGH, (address >> 9) as u8);
    exchange_pair(port, t, opcodes::SII_WRITE_LOW);
    wait_busy(port, t);
    exchange(port, t, opcodes::SII_LOAD_COMMAND, opcodes::CMD_NOP);
}

/// Write one EEPROM byte and wait for the target to finish.
pub fn write_eeprom<P: TargetPort>(port: &mut P, t: &Timings, address: u16, data: u8) {
    exchange(port, t, opcodes::SII_LOAD_COMMAND, opcodes::CMD_WRITE_EEPROM);
    exchange(port, t, opcodes::SII_LOAD_ADDR_LOW, address as u8);
    exchange(port, t, opcodes::SII_LOAD_ADDR_HIGH, (address >> 8) as u8);
    exchange(port, t, opcodes::SII_LOAD_DATA_LOW, data);
    exchange(port, t, opcodes::SII_LATCH_EEPROM, 0x00);
    exchange_pair(port, t, opcodes::SII_WRITE_LOW);
    wait_busy(port, t);
}

/// Chip erase, followed by the busy wait.
pub fn chip_erase<P: TargetPort>(port: &mut P, t: &Timings) {
    exchange(port, t, opcodes::SII_LOAD_COMMAND, opcodes::CMD_CHIP_ERASE);
    exchange_pair(port, t, opcodes::SII_WRITE_LOW);
    wait_busy(port, t);
}
