//! Seam for the sibling single-wire programming engine.
//!
//! Targets of the alternate chip family speak a different block protocol
//! behind the same transport. That engine is an external collaborator; the
//! session only routes the four alternate-family requests through this
//! trait.

/// Alternate-family programming engine.
pub trait AltFamily {
    /// Whether an engine is actually present. Reported through the
    /// capability bitmask.
    fn available(&self) -> bool {
        true
    }

    /// Bring the target into its programming mode. `idle_delay` is the
    /// host-supplied guard-time parameter.
    fn connect(&mut self, idle_delay: u16);

    /// Leave programming mode and release the target.
    fn disconnect(&mut self);

    /// Fill `buf` from the alternate memory space starting at `address`.
    fn read_block(&mut self, address: u16, buf: &mut [u8]);

    /// Write `data` to the alternate memory space starting at `address`.
    fn write_block(&mut self, address: u16, data: &[u8]);
}

/// Null engine for builds without alternate-family support. All block
/// operations are no-ops and the capability bit stays clear.
#[derive(Debug, Default)]
pub struct NoAltFamily;

impl AltFamily for NoAltFamily {
    fn available(&self) -> bool {
        false
    }

    fn connect(&mut self, _idle_delay: u16) {}

    fn disconnect(&mut self) {}

    fn read_block(&mut self, _address: u16, buf: &mut [u8]) {
        buf.fill(0xFF);
    }

    fn write_block(&mut self, _address: u16, _data: &[u8]) {}
}
