//! Device variant detection.
//!
//! Sequentially applies each variant's power/enable waveform, then polls
//! the first signature byte in a bounded retry loop. The first variant
//! whose target answers with the vendor signature wins; exhausting all
//! three is a detection failure.
//!
//! The full-bus and short-bus paths share the same signature check and
//! differ only in their entry sequencing, so a short-bus target that
//! happens to answer the full-bus probe is taken as full bus. That
//! fallthrough matches the wiring the two variants share.

use crate::error::{Error, Result};
use crate::port::{Direction, Level, Line, TargetPort};
use crate::protocol::{parallel, DeviceVariant, ProtocolDriver};
use crate::timing::Timings;

/// First signature byte every supported target family answers with.
pub const VENDOR_SIGNATURE: u8 = 0x1E;

/// Try each variant in order and return the first one whose target
/// responds within the detection window.
pub fn detect<P: TargetPort>(port: &mut P, t: &Timings) -> Result<DeviceVariant> {
    for variant in [
        DeviceVariant::FullParallel,
        DeviceVariant::ShortBus,
        DeviceVariant::SerialHv,
    ] {
        log::debug!("trying {:?} entry", variant);
        enter_mode(port, t, variant);
        if poll_signature(port, t, variant) {
            log::debug!("target detected as {:?}", variant);
            return Ok(variant);
        }
    }
    log::debug!("no target answered during detection");
    Err(Error::DetectionFailed)
}

/// Apply the power/enable sequencing for one variant.
fn enter_mode<P: TargetPort>(port: &mut P, t: &Timings, variant: DeviceVariant) {
    match variant {
        DeviceVariant::FullParallel => enter_full_parallel(port, t),
        DeviceVariant::ShortBus => enter_short_bus(port),
        DeviceVariant::SerialHv => enter_serial_hv(port),
    }
}

/// Poll signature byte 0 until it matches or the retry budget runs out.
fn poll_signature<P: TargetPort>(port: &mut P, t: &Timings, variant: DeviceVariant) -> bool {
    let driver = ProtocolDriver::new(variant);
    for _ in 0..=t.detect_retries {
        if driver.read_signature(port, t, 0) == VENDOR_SIGNATURE {
            return true;
        }
        port.wait_ms(t.detect_poll_ms);
    }
    false
}

fn enter_full_parallel<P: TargetPort>(port: &mut P, t: &Timings) {
    port.set_line(Line::Vpp, Level::High);
    port.set_line(Line::Xtal1, Level::Low);
    port.set_line(Line::Xa0, Level::High);
    port.set_line(Line::Xa1, Level::High);
    port.wait_ms(10);

    port.set_line(Line::Vpp, Level::Low);
    port.wait_ms(10);

    // The target wants at least six clock edges before mode entry.
    for _ in 0..10 {
        parallel::pulse_xtal1(port, t);
        port.wait_us(10);
    }

    // Prog_enable = 0000.
    port.set_line(Line::Pagel, Level::Low);
    port.set_line(Line::Xa0, Level::Low);
    port.set_line(Line::Xa1, Level::Low);
    port.set_line(Line::Bs1, Level::Low);
    port.wait_ms(20);

    port.set_line(Line::Vpp, Level::High);
    port.wait_ms(50);
}

fn enter_short_bus<P: TargetPort>(port: &mut P) {
    port.set_line(Line::Vdd, Level::Low);
    port.wait_ms(200);
    port.set_line(Line::Xa0, Level::Low);
    port.set_line(Line::Xa1, Level::Low);
    port.set_line(Line::Bs1, Level::Low);
    port.set_line(Line::Wr, Level::Low);
    port.set_line(Line::Oe, Level::Low);
    port.set_line(Line::Vpp, Level::Low);
    port.wait_ms(20);
    port.set_line(Line::Vdd, Level::High);
    port.wait_ms(10);
    port.set_line(Line::Vpp, Level::High);
    port.wait_ms(500);
    port.set_line(Line::Wr, Level::High);
    port.set_line(Line::Oe, Level::High);
}

fn enter_serial_hv<P: TargetPort>(port: &mut P) {
    port.set_line(Line::Vdd, Level::Low);
    port.set_line(Line::Sci, Level::Low);
    port.set_bus_direction(Direction::Output);
    port.set_line(Line::Sdi, Level::Low);
    port.set_line(Line::Sii, Level::Low);
    port.set_line(Line::Sdo, Level::Low);
    port.set_line(Line::Vpp, Level::Low);
    port.wait_ms(10);
    port.set_line(Line::Vdd, Level::High);
    port.set_line(Line::Vpp, Level::High);
    port.wait_ms(20);
    port.set_bus_direction(Direction::Input);
    port.wait_us(500);
}
