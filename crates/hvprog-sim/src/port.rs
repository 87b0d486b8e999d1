//! The simulated port: line state, virtual clock and die hookup.

use hvprog_core::port::{Direction, Level, Line, TargetPort};
use hvprog_core::protocol::ParallelBus;

use crate::hvpp::ParallelDie;
use crate::hvsp::SerialDie;

/// Signal edge delivered to a die model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Edge {
    Rising,
    Falling,
}

/// Snapshot of everything on the wires, shared with the die models.
pub(crate) struct Wires {
    lines: [bool; Line::COUNT],
    pub(crate) bus_out: u8,
    pub(crate) bus_dir: Direction,
    pub(crate) now_us: u64,
}

impl Wires {
    fn new() -> Self {
        Self {
            lines: [false; Line::COUNT],
            bus_out: 0,
            bus_dir: Direction::Input,
            now_us: 0,
        }
    }

    pub(crate) fn high(&self, line: Line) -> bool {
        self.lines[line as usize]
    }
}

/// The die attached to the simulated port, if any.
pub enum Die {
    /// No target wired up; every read floats low.
    Detached,
    /// A parallel-wired die.
    Parallel(ParallelDie),
    /// A serial high-voltage die.
    Serial(SerialDie),
}

/// Fake [`TargetPort`] backed by a die model and a virtual clock.
///
/// `wait_us`/`wait_ms` advance the clock without sleeping, so sessions
/// with second-long detection windows still run instantly in tests.
pub struct SimPort {
    wires: Wires,
    die: Die,
}

impl SimPort {
    /// Port with a die on the given wiring.
    pub fn with_die(die: Die) -> Self {
        Self {
            wires: Wires::new(),
            die,
        }
    }

    /// Port with a full-parallel die attached.
    pub fn full_parallel() -> Self {
        Self::with_die(Die::Parallel(ParallelDie::new(ParallelBus::Full)))
    }

    /// Port with a short-bus die attached.
    pub fn short_bus() -> Self {
        Self::with_die(Die::Parallel(ParallelDie::new(ParallelBus::Short)))
    }

    /// Port with a serial high-voltage die attached.
    pub fn serial_hv() -> Self {
        Self::with_die(Die::Serial(SerialDie::new()))
    }

    /// Port with nothing attached.
    pub fn detached() -> Self {
        Self::with_die(Die::Detached)
    }

    /// The attached die.
    pub fn die(&self) -> &Die {
        &self.die
    }

    /// The attached parallel die, if that is what is wired up.
    pub fn parallel_die(&self) -> Option<&ParallelDie> {
        match &self.die {
            Die::Parallel(die) => Some(die),
            _ => None,
        }
    }

    /// Mutable access to the attached parallel die.
    pub fn parallel_die_mut(&mut self) -> Option<&mut ParallelDie> {
        match &mut self.die {
            Die::Parallel(die) => Some(die),
            _ => None,
        }
    }

    /// The attached serial die, if that is what is wired up.
    pub fn serial_die(&self) -> Option<&SerialDie> {
        match &self.die {
            Die::Serial(die) => Some(die),
            _ => None,
        }
    }

    /// Mutable access to the attached serial die.
    pub fn serial_die_mut(&mut self) -> Option<&mut SerialDie> {
        match &mut self.die {
            Die::Serial(die) => Some(die),
            _ => None,
        }
    }

    /// Virtual time elapsed since construction, in microseconds.
    pub fn elapsed_us(&self) -> u64 {
        self.wires.now_us
    }
}

impl TargetPort for SimPort {
    fn set_line(&mut self, line: Line, level: Level) {
        let was = self.wires.high(line);
        let now = level == Level::High;
        self.wires.lines[line as usize] = now;

        let edge = match (was, now) {
            (false, true) => Edge::Rising,
            (true, false) => Edge::Falling,
            _ => return,
        };
        match &mut self.die {
            Die::Parallel(die) => die.on_edge(line, edge, &self.wires),
            Die::Serial(die) => die.on_edge(line, edge, &self.wires),
            Die::Detached => {}
        }
    }

    fn set_bus_direction(&mut self, dir: Direction) {
        self.wires.bus_dir = dir;
    }

    fn write_bus(&mut self, value: u8) {
        self.wires.bus_out = value;
    }

    fn read_bus(&mut self) -> u8 {
        // Reading back our own drive while the bus is an output.
        if self.wires.bus_dir == Direction::Output {
            return self.wires.bus_out;
        }
        match &self.die {
            Die::Parallel(die) => die.drive_bus(&self.wires).unwrap_or(0),
            Die::Serial(die) => die.drive_bus(&self.wires).unwrap_or(0),
            Die::Detached => 0,
        }
    }

    fn attach(&mut self) {}

    fn detach(&mut self) {
        self.set_line(Line::Vdd, Level::Low);
        self.set_line(Line::Vpp, Level::Low);
        self.wires.bus_dir = Direction::Input;
    }

    fn wait_us(&mut self, us: u32) {
        self.wires.now_us += us as u64;
    }

    fn wait_ms(&mut self, ms: u32) {
        self.wires.now_us += ms as u64 * 1000;
    }
}
