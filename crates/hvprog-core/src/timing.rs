//! Fixed delays and poll caps used by the protocol drivers.
//!
//! Collected into one injectable struct so simulated sessions can shrink
//! the long windows. The per-variant mode-entry sequencing is not
//! configurable; those delays are part of the entry waveforms and live in
//! [`crate::detect`].

/// Protocol timing parameters. [`Default`] gives the values the firmware
/// has always used.
#[derive(Debug, Clone)]
pub struct Timings {
    /// XTAL1 strobe half-period in microseconds.
    pub xtal_pulse_us: u32,
    /// Setup time around each serial clock edge in microseconds.
    pub sci_setup_us: u32,
    /// Generic bus settle time in microseconds (command loads, output-enable
    /// reads, PAGEL strobes).
    pub bus_settle_us: u32,
    /// Settle time after driving an address byte, in microseconds.
    pub addr_settle_us: u32,
    /// Output-enable settle for signature and fuse reads, in milliseconds.
    pub sig_settle_ms: u32,
    /// Initial wait before the first serial busy poll, in microseconds.
    pub busy_initial_us: u32,
    /// Spacing between serial busy polls, in microseconds.
    pub busy_poll_us: u32,
    /// Serial busy poll iteration cap; hitting it forces a physical reset.
    pub busy_poll_cap: u32,
    /// Width of the forced reset pulse on VPP, in milliseconds.
    pub reset_pulse_ms: u32,
    /// Width of the page-write strobe, in microseconds.
    pub page_strobe_us: u32,
    /// Settle time after a page commit, in milliseconds.
    pub page_settle_ms: u32,
    /// Settle time after loading a fuse value, in microseconds.
    pub fuse_load_settle_us: u32,
    /// Width of the fuse write strobe, in milliseconds.
    pub fuse_strobe_ms: u32,
    /// Settle time after a fuse write, in milliseconds.
    pub fuse_settle_ms: u32,
    /// Settle time after a parallel EEPROM byte write, in milliseconds.
    pub eeprom_settle_ms: u32,
    /// Width of the chip-erase strobe, in microseconds.
    pub erase_strobe_us: u32,
    /// Settle time after a chip erase, in milliseconds.
    pub erase_settle_ms: u32,
    /// Spacing between signature polls during detection, in milliseconds.
    pub detect_poll_ms: u32,
    /// Signature poll retries per variant before moving on. Together with
    /// `detect_poll_ms` this bounds each detection attempt to roughly one
    /// second.
    pub detect_retries: u32,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            xtal_pulse_us: 5,
            sci_setup_us: 1,
            bus_settle_us: 1,
            addr_settle_us: 5,
            sig_settle_ms: 1,
            busy_initial_us: 50,
            busy_poll_us: 10,
            busy_poll_cap: 0xFFF,
            reset_pulse_ms: 10,
            page_strobe_us: 1,
            page_settle_ms: 8,
            fuse_load_settle_us: 10,
            fuse_strobe_ms: 1,
            fuse_settle_ms: 100,
            eeprom_settle_ms: 10,
            erase_strobe_us: 200,
            erase_settle_ms: 150,
            detect_poll_ms: 1,
            detect_retries: 1000,
        }
    }
}
