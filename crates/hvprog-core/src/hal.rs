//! `embedded-hal` 1.0 adapter for the port trait.
//!
//! Lets a board implement [`TargetPort`] from its HAL pins. Enable the
//! `embedded-hal` feature:
//!
//! ```toml
//! [dependencies]
//! hvprog-core = { version = "0.1", features = ["embedded-hal"] }
//! ```
//!
//! The control lines go through one erased [`OutputPin`] type per line (most
//! HALs provide a degraded/any-pin type); the shared data bus cannot be
//! expressed with `embedded-hal` pins because it switches direction at run
//! time, so the board supplies it through the small [`DataBus`] trait.

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::port::{Direction, Level, Line, TargetPort};

/// Board-side implementation of the shared 8-bit data bus.
pub trait DataBus {
    /// Switch the bus pins between input and output.
    fn set_direction(&mut self, dir: Direction);

    /// Drive a byte onto the bus.
    fn write(&mut self, value: u8);

    /// Sample the bus.
    fn read(&mut self) -> u8;
}

/// [`TargetPort`] over `embedded-hal` pins, a [`DataBus`] and a delay
/// provider.
///
/// The `lines` array is indexed by [`Line`] in declaration order.
pub struct HalPort<B, O, D> {
    bus: B,
    lines: [O; Line::COUNT],
    delay: D,
}

impl<B, O, D> HalPort<B, O, D>
where
    B: DataBus,
    O: OutputPin<Error = Infallible>,
    D: DelayNs,
{
    /// Wrap a bus, the control line pins and a delay provider.
    pub fn new(bus: B, lines: [O; Line::COUNT], delay: D) -> Self {
        Self { bus, lines, delay }
    }

    /// Tear the adapter apart again, e.g. to reuse the pins.
    pub fn release(self) -> (B, [O; Line::COUNT], D) {
        (self.bus, self.lines, self.delay)
    }
}

impl<B, O, D> TargetPort for HalPort<B, O, D>
where
    B: DataBus,
    O: OutputPin<Error = Infallible>,
    D: DelayNs,
{
    fn set_line(&mut self, line: Line, level: Level) {
        let pin = &mut self.lines[line as usize];
        let result = match level {
            Level::High => pin.set_high(),
            Level::Low => pin.set_low(),
        };
        match result {
            Ok(()) => {}
            Err(infallible) => match infallible {},
        }
    }

    fn set_bus_direction(&mut self, dir: Direction) {
        self.bus.set_direction(dir);
    }

    fn write_bus(&mut self, value: u8) {
        self.bus.write(value);
    }

    fn read_bus(&mut self) -> u8 {
        self.bus.read()
    }

    fn attach(&mut self) {
        self.bus.set_direction(Direction::Input);
    }

    fn detach(&mut self) {
        self.set_line(Line::Vdd, Level::Low);
        self.set_line(Line::Vpp, Level::Low);
        self.bus.set_direction(Direction::Input);
    }

    fn wait_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    fn wait_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
