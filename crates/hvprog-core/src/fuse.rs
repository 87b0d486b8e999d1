//! Fuse and lock-bit access.
//!
//! The parallel variants select the target byte with BS1 plus a second
//! line (BS2 on the full bus, XA1 on the short bus); note that reads and
//! writes use different select encodings. The serial variant uses one of
//! four disjoint instruction pairs per kind, with writes followed by the
//! busy wait.

use crate::port::{Direction, Level, Line, TargetPort};
use crate::protocol::{opcodes, parallel, serial, DeviceVariant, ParallelBus};
use crate::timing::Timings;

/// The configuration byte to access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuseKind {
    /// Low fuse byte.
    Low,
    /// High fuse byte.
    High,
    /// Extended fuse byte.
    Extended,
    /// Lock bits.
    Lock,
}

/// Serial readback pair per kind.
fn serial_read_pair(kind: FuseKind) -> (u8, u8) {
    match kind {
        FuseKind::Low => opcodes::SII_READ_LOW,
        FuseKind::High => opcodes::SII_READ_HIGH_FUSE,
        FuseKind::Extended => opcodes::SII_READ_EXT,
        FuseKind::Lock => opcodes::SII_READ_HIGH,
    }
}

/// Serial write strobe pair per kind. Lock bits share the low-byte pair
/// under the lock-write command.
fn serial_write_pair(kind: FuseKind) -> (u8, u8) {
    match kind {
        FuseKind::Low | FuseKind::Lock => opcodes::SII_WRITE_LOW,
        FuseKind::High => opcodes::SII_WRITE_HIGH,
        FuseKind::Extended => opcodes::SII_WRITE_EXT,
    }
}

/// Assert the parallel read selects for a kind.
fn parallel_read_select<P: TargetPort>(port: &mut P, bus: ParallelBus, kind: FuseKind) {
    let sel2 = bus.select2();
    match kind {
        FuseKind::High => {
            port.set_line(Line::Bs1, Level::High);
            port.set_line(sel2, Level::High);
        }
        FuseKind::Low => {
            port.set_line(Line::Bs1, Level::Low);
            port.set_line(sel2, Level::Low);
        }
        FuseKind::Extended => {
            port.set_line(Line::Bs1, Level::Low);
            if bus.has_bs2() {
                port.set_line(Line::Bs2, Level::High);
            }
            port.set_line(Line::Xa1, Level::High);
        }
        FuseKind::Lock => {
            port.set_line(Line::Bs1, Level::High);
            if bus.has_bs2() {
                port.set_line(Line::Bs2, Level::Low);
            }
            port.set_line(Line::Xa1, Level::Low);
        }
    }
}

/// Assert the parallel write selects for a kind. Lock writes carry their
/// target in the command code and need no selects.
fn parallel_write_select<P: TargetPort>(port: &mut P, bus: ParallelBus, kind: FuseKind) {
    let sel2 = bus.select2();
    match kind {
        FuseKind::Low => {
            port.set_line(Line::Bs1, Level::Low);
            port.set_line(sel2, Level::Low);
        }
        FuseKind::High => {
            port.set_line(Line::Bs1, Level::High);
            port.set_line(sel2, Level::Low);
        }
        FuseKind::Extended => {
            port.set_line(Line::Bs1, Level::Low);
            port.set_line(sel2, Level::High);
        }
        FuseKind::Lock => {}
    }
}

/// Read a fuse or lock byte via the active variant.
pub fn read_fuse<P: TargetPort>(
    port: &mut P,
    t: &Timings,
    variant: DeviceVariant,
    kind: FuseKind,
) -> u8 {
    match variant.parallel_bus() {
        Some(bus) => {
            parallel::load_command(port, t, bus, opcodes::CMD_READ_FUSE);
            port.set_bus_direction(Direction::Input);
            parallel_read_select(port, bus, kind);
            port.set_line(Line::Oe, Level::Low);
            port.wait_ms(t.sig_settle_ms);
            let result = port.read_bus();
            port.set_line(Line::Oe, Level::High);
            result
        }
        None => {
            serial::exchange(port, t, opcodes::SII_LOAD_COMMAND, opcodes::CMD_READ_FUSE);
            let pair = serial_read_pair(kind);
            serial::exchange(port, t, pair.0, 0x00);
            serial::exchange(port, t, pair.1, 0x00)
        }
    }
}

/// Write a fuse or lock byte via the active variant.
pub fn write_fuse<P: TargetPort>(
    port: &mut P,
    t: &Timings,
    variant: DeviceVariant,
    kind: FuseKind,
    value: u8,
) {
    let command = match kind {
        FuseKind::Lock => opcodes::CMD_WRITE_LOCK,
        _ => opcodes::CMD_WRITE_FUSE,
    };
    log::debug!("writing {:?} fuse = {:#04x}", kind, value);

    match variant.parallel_bus() {
        Some(bus) => {
            port.set_line(Line::Pagel, Level::Low);
            parallel::load_command(port, t, bus, command);
            port.wait_us(t.fuse_load_settle_us);

            port.set_line(Line::Xa1, Level::Low);
            port.set_line(Line::Xa0, Level::High);
            port.write_bus(value);
            port.wait_us(t.fuse_load_settle_us);
            parallel::pulse_xtal1(port, t);

            parallel_write_select(port, bus, kind);
            port.wait_us(t.fuse_load_settle_us);
            port.set_line(Line::Wr, Level::Low);
            port.wait_ms(t.fuse_strobe_ms);
            port.set_line(Line::Wr, Level::High);
            port.wait_ms(t.fuse_settle_ms);
        }
        None => {
            serial::exchange(port, t, opcodes::SII_LOAD_COMMAND, command);
            serial::exchange(port, t, opcodes::SII_LOAD_DATA_LOW, value);
            let pair = serial_write_pair(kind);
            serial::exchange(port, t, pair.0, 0x00);
            serial::exchange(port, t, pair.1, 0x00);
            serial::wait_busy(port, t);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_pairs_are_disjoint_per_kind() {
        let kinds = [FuseKind::Low, FuseKind::High, FuseKind::Extended, FuseKind::Lock];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(serial_read_pair(*a), serial_read_pair(*b));
            }
        }
    }
}
