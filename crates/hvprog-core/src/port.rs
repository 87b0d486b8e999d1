//! Hardware seam for the programmer's target-facing signals.
//!
//! The engine never touches registers directly; every electrical operation
//! goes through [`TargetPort`]. One implementation drives real pins (see the
//! `hal` module behind the `embedded-hal` feature), another backs the lines
//! with a behavioural model of the target die for host-side testing
//! (the `hvprog-sim` crate).

/// Logic level on a control line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Driven low.
    Low,
    /// Driven high. For `Vpp` this means the 12 V programming voltage.
    High,
}

/// Direction of the shared 8-bit data bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Bus released, target may drive it.
    Input,
    /// Bus driven by the programmer.
    Output,
}

/// Control lines of the high-voltage programming header.
///
/// The serial variant reuses the same header: `Sci`/`Sdi`/`Sii` are
/// dedicated lines, while the target's SDO answer is sampled on bit 0 of
/// the data bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    /// 12 V programming voltage applied to the target's reset pin.
    Vpp,
    /// Target supply rail.
    Vdd,
    /// Clock strobe latching commands, addresses and data.
    Xtal1,
    /// Page-buffer word latch.
    Pagel,
    /// Load-type select bit 0.
    Xa0,
    /// Load-type select bit 1.
    Xa1,
    /// Byte/register select 1.
    Bs1,
    /// Byte/register select 2 (full parallel bus only).
    Bs2,
    /// Write strobe, active low.
    Wr,
    /// Output enable, active low.
    Oe,
    /// Serial clock (serial high-voltage variant).
    Sci,
    /// Serial data in (serial high-voltage variant).
    Sdi,
    /// Serial instruction in (serial high-voltage variant).
    Sii,
    /// Serial data out; driven low during serial mode entry, afterwards an
    /// input read through bit 0 of the data bus.
    Sdo,
}

impl Line {
    /// Number of distinct lines, for array-indexed port implementations.
    pub const COUNT: usize = 14;
}

/// Target-facing port: signal lines, the shared data bus and the blocking
/// delay primitives all protocol timing is built from.
///
/// All operations are infallible; a port either controls real pins (which
/// cannot report errors at this level) or a simulation. Delays block the
/// calling context, which is fine because nothing else runs during
/// byte-level signaling.
pub trait TargetPort {
    /// Drive a control line to a level.
    fn set_line(&mut self, line: Line, level: Level);

    /// Switch the data bus direction.
    fn set_bus_direction(&mut self, dir: Direction);

    /// Drive a byte onto the data bus. Only meaningful while the bus
    /// direction is [`Direction::Output`].
    fn write_bus(&mut self, value: u8);

    /// Sample the data bus.
    fn read_bus(&mut self) -> u8;

    /// Claim the signal lines: configure pin directions for a session.
    fn attach(&mut self);

    /// Release the signal lines and power down the target rails.
    fn detach(&mut self);

    /// Busy-wait for the given number of microseconds.
    fn wait_us(&mut self, us: u32);

    /// Busy-wait for the given number of milliseconds.
    ///
    /// Default implementation loops over [`TargetPort::wait_us`].
    fn wait_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.wait_us(1000);
        }
    }
}
