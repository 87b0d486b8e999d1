//! The session state machine behind the transport boundary.
//!
//! One [`Session`] owns the port, the cursor and all per-session state the
//! firmware used to keep in globals. The transport drives it strictly
//! synchronously: one [`Session::setup`] call, then zero or more chunk
//! calls, no overlap. The session holds exclusive control of the signal
//! lines for its whole lifetime.

use crate::alt::{AltFamily, NoAltFamily};
use crate::detect;
use crate::error::{Error, Result};
use crate::fuse::FuseKind;
use crate::port::{Level, Line, TargetPort};
use crate::protocol::{BankTracker, DeviceVariant, ProtocolDriver};
use crate::request::{BlockFlags, Capabilities, Reply, Request};
use crate::timing::Timings;

/// Transport frame size. A read chunk shorter than this ends the transfer,
/// so hosts must request exactly the total they declared at setup for the
/// convention to terminate correctly.
pub const FRAME_LEN: usize = 8;

/// What the engine is currently streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Between operations. Initial, and terminal per operation.
    Idle,
    /// Streaming flash bytes to the host.
    ReadFlash,
    /// Streaming EEPROM bytes to the host.
    ReadEeprom,
    /// Receiving flash bytes from the host.
    WriteFlash,
    /// Receiving EEPROM bytes from the host.
    WriteEeprom,
    /// Streaming an alternate-family block to the host.
    ReadAltBlock,
    /// Receiving an alternate-family block from the host.
    WriteAltBlock,
}

/// Progress report for a write chunk, encoded on the wire as 0/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// More chunks expected.
    MoreExpected,
    /// The declared total has been written; the session is idle again.
    Complete,
}

impl WriteStatus {
    /// Wire encoding of the status byte.
    pub fn wire_value(self) -> u8 {
        match self {
            Self::MoreExpected => 0,
            Self::Complete => 1,
        }
    }
}

/// Write buffering for paged flash.
///
/// Latches the low byte of each word until its high byte arrives, counts
/// words toward the page boundary, and asks the driver for a page commit
/// exactly when the counter reaches zero.
#[derive(Debug)]
struct PageBuffer {
    /// Page size in words; zero means unbuffered writes.
    page_words: u8,
    /// Words left before the next commit.
    remaining: u8,
    /// Pending low byte of an uncommitted word. Only valid between a
    /// low-byte write and the immediately following high-byte write.
    latch: Option<u8>,
}

impl PageBuffer {
    fn new() -> Self {
        Self {
            page_words: 0,
            remaining: 0,
            latch: None,
        }
    }

    /// Apply the page size from a write-flash setup. The counter only
    /// restarts on the first block of a transfer; later blocks continue
    /// the page in progress.
    fn configure(&mut self, page_size_bytes: u16, first: bool) {
        self.page_words = (page_size_bytes / 2) as u8;
        if first {
            self.remaining = self.page_words;
            self.latch = None;
        }
    }

    fn enabled(&self) -> bool {
        self.page_words > 0
    }

    /// Whether a partially filled page is pending commit.
    fn partial(&self) -> bool {
        self.remaining != self.page_words
    }

    /// Feed one flash byte through the buffer. Even addresses latch the
    /// low byte without a device transaction; odd addresses load the full
    /// word and may trigger a page commit.
    fn write_byte<P: TargetPort>(
        &mut self,
        port: &mut P,
        t: &Timings,
        driver: ProtocolDriver,
        bank: &mut BankTracker,
        address: u32,
        data: u8,
    ) {
        if address & 1 == 0 {
            if !self.enabled() || self.remaining == self.page_words {
                driver.start_page_load(port, t);
            }
            self.latch = Some(data);
            return;
        }

        let low = self.latch.take().unwrap_or(0);
        let poll_mode = if self.enabled() { 0 } else { 1 };
        driver.load_flash_word(port, t, address, low, data, poll_mode);

        if self.enabled() {
            self.remaining = self.remaining.saturating_sub(1);
            if self.remaining == 0 {
                driver.commit_page(port, t, bank, address);
                self.remaining = self.page_words;
            }
        }
    }
}

/// Top-level orchestrator owning the port, the cursor and the protocol
/// driver fixed by detection.
pub struct Session<P, A = NoAltFamily> {
    port: P,
    alt: A,
    timings: Timings,
    variant: Option<DeviceVariant>,
    bank: BankTracker,
    state: SessionState,
    address: u32,
    remaining: u16,
    block_flags: BlockFlags,
    page: PageBuffer,
    /// Sticky addressing mode: once the host sets a long address, legacy
    /// 16-bit setup addresses are ignored until the next connect.
    long_addressing: bool,
    sck_option: u8,
}

impl<P: TargetPort> Session<P> {
    /// Session without an alternate-family engine.
    pub fn new(port: P) -> Self {
        Self::with_alt(port, NoAltFamily)
    }
}

impl<P: TargetPort, A: AltFamily> Session<P, A> {
    /// Session routing alternate-family requests to `alt`.
    pub fn with_alt(port: P, alt: A) -> Self {
        Self {
            port,
            alt,
            timings: Timings::default(),
            variant: None,
            bank: BankTracker::new(),
            state: SessionState::Idle,
            address: 0,
            remaining: 0,
            block_flags: BlockFlags::empty(),
            page: PageBuffer::new(),
            long_addressing: false,
            sck_option: 0,
        }
    }

    /// Current streaming state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The variant detection fixed, if any.
    pub fn variant(&self) -> Option<DeviceVariant> {
        self.variant
    }

    /// The port, e.g. for inspecting a simulated target.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Mutable access to the port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Mutable access to the timing parameters.
    pub fn timings_mut(&mut self) -> &mut Timings {
        &mut self.timings
    }

    /// The alternate-family engine.
    pub fn alt(&self) -> &A {
        &self.alt
    }

    /// Mutable access to the alternate-family engine.
    pub fn alt_mut(&mut self) -> &mut A {
        &mut self.alt
    }

    fn driver(&self) -> Result<ProtocolDriver> {
        self.variant.map(ProtocolDriver::new).ok_or(Error::InvalidState)
    }

    /// Handle a raw 8-byte setup packet.
    pub fn setup(&mut self, packet: &[u8; 8]) -> Reply {
        match Request::parse(packet) {
            Some(request) => self.handle(request),
            None => Reply::Empty,
        }
    }

    /// Handle a decoded request. Pure dispatch: sets state and cursor
    /// fields, replies immediately or announces a streaming transfer.
    pub fn handle(&mut self, request: Request) -> Reply {
        match request {
            Request::Connect => {
                log::debug!("connect");
                self.port.attach();
                self.port.set_line(Line::Wr, Level::High);
                self.port.set_line(Line::Oe, Level::High);
                self.bank.reset();
                self.long_addressing = false;
                self.state = SessionState::Idle;
                Reply::Empty
            }
            Request::Disconnect => {
                log::debug!("disconnect");
                self.port.detach();
                self.variant = None;
                self.state = SessionState::Idle;
                Reply::Empty
            }
            Request::EnterProgrammingMode => {
                match detect::detect(&mut self.port, &self.timings) {
                    Ok(variant) => {
                        self.variant = Some(variant);
                        Reply::byte(0)
                    }
                    Err(_) => {
                        self.variant = None;
                        Reply::byte(1)
                    }
                }
            }
            Request::ReadFlash { address, count } => {
                self.begin(SessionState::ReadFlash, address, count);
                Reply::Streaming
            }
            Request::ReadEeprom { address, count } => {
                self.begin(SessionState::ReadEeprom, address, count);
                Reply::Streaming
            }
            Request::WriteFlash {
                address,
                page_size,
                flags,
                count,
            } => {
                self.begin(SessionState::WriteFlash, address, count);
                self.page.configure(page_size, flags.contains(BlockFlags::FIRST));
                self.block_flags = flags;
                Reply::Streaming
            }
            Request::WriteEeprom { address, count } => {
                self.begin(SessionState::WriteEeprom, address, count);
                self.page.configure(0, false);
                self.block_flags = BlockFlags::empty();
                Reply::Streaming
            }
            Request::SetLongAddress { address } => {
                self.long_addressing = true;
                self.address = address;
                Reply::Empty
            }
            Request::SetSckOption { code } => {
                self.sck_option = code;
                Reply::byte(0)
            }
            Request::AltConnect { idle_delay } => {
                self.alt.connect(idle_delay);
                Reply::Empty
            }
            Request::AltDisconnect => {
                self.alt.disconnect();
                Reply::Empty
            }
            Request::ReadAltBlock { address, count } => {
                self.address = address as u32;
                self.remaining = count;
                self.state = SessionState::ReadAltBlock;
                Reply::Streaming
            }
            Request::WriteAltBlock { address, count } => {
                self.address = address as u32;
                self.remaining = count;
                self.state = SessionState::WriteAltBlock;
                Reply::Streaming
            }
            Request::GetCapabilities => {
                let mut caps = Capabilities::empty();
                if self.alt.available() {
                    caps |= Capabilities::ALT_BLOCK;
                }
                Reply::bytes(&caps.bits().to_le_bytes())
            }
        }
    }

    /// Enter a streaming state. The legacy 16-bit setup address only takes
    /// effect while the session is not in extended addressing mode.
    fn begin(&mut self, state: SessionState, address: u16, count: u16) {
        if !self.long_addressing {
            self.address = address as u32;
        }
        self.remaining = count;
        self.state = state;
        log::debug!(
            "{:?} at {:#08x}, {} bytes",
            state,
            self.address,
            count
        );
    }

    /// Fill `buf` with the next bytes of a streaming read.
    ///
    /// A chunk shorter than [`FRAME_LEN`] implicitly ends the transfer and
    /// returns the session to idle. Alternate-family reads do not
    /// self-terminate; the host ends them with its next setup.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.state {
            SessionState::ReadFlash | SessionState::ReadEeprom => {
                let driver = self.driver()?;
                for slot in buf.iter_mut() {
                    *slot = if self.state == SessionState::ReadFlash {
                        driver.read_flash(&mut self.port, &self.timings, &mut self.bank, self.address)
                    } else {
                        driver.read_eeprom(&mut self.port, &self.timings, self.address as u16)
                    };
                    self.address += 1;
                }
                if buf.len() < FRAME_LEN {
                    self.state = SessionState::Idle;
                }
                Ok(buf.len())
            }
            SessionState::ReadAltBlock => {
                self.alt.read_block(self.address as u16, buf);
                self.address += buf.len() as u32;
                Ok(buf.len())
            }
            _ => Err(Error::InvalidState),
        }
    }

    /// Consume the next bytes of a streaming write.
    ///
    /// Bytes beyond the declared total are not consumed. On reaching the
    /// total the session goes idle and, if this was the last block with a
    /// partial page pending, forces a final page commit first.
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<WriteStatus> {
        match self.state {
            SessionState::WriteFlash | SessionState::WriteEeprom => {}
            SessionState::WriteAltBlock => {
                self.alt.write_block(self.address as u16, data);
                self.address += data.len() as u32;
                self.remaining = self.remaining.saturating_sub(data.len() as u16);
                if self.remaining == 0 {
                    self.state = SessionState::Idle;
                    return Ok(WriteStatus::Complete);
                }
                return Ok(WriteStatus::MoreExpected);
            }
            _ => return Err(Error::InvalidState),
        }

        let driver = self.driver()?;
        let mut status = WriteStatus::MoreExpected;

        for &byte in data {
            if self.remaining == 0 {
                break;
            }

            if self.state == SessionState::WriteFlash {
                self.page.write_byte(
                    &mut self.port,
                    &self.timings,
                    driver,
                    &mut self.bank,
                    self.address,
                    byte,
                );
            } else {
                driver.write_eeprom(&mut self.port, &self.timings, self.address as u16, byte);
            }

            self.remaining -= 1;
            if self.remaining == 0 {
                self.state = SessionState::Idle;
                if self.block_flags.contains(BlockFlags::LAST)
                    && self.page.enabled()
                    && self.page.partial()
                {
                    // Last block with a page still open: flush it now.
                    driver.commit_page(&mut self.port, &self.timings, &mut self.bank, self.address);
                }
                status = WriteStatus::Complete;
            }

            self.address += 1;
        }

        Ok(status)
    }

    /// Read a fuse or lock byte. Only valid once detection has fixed a
    /// variant.
    pub fn read_fuse(&mut self, kind: FuseKind) -> Result<u8> {
        let driver = self.driver()?;
        Ok(driver.read_fuse(&mut self.port, &self.timings, kind))
    }

    /// Write a fuse or lock byte. Only valid once detection has fixed a
    /// variant.
    pub fn write_fuse(&mut self, kind: FuseKind, value: u8) -> Result<()> {
        let driver = self.driver()?;
        driver.write_fuse(&mut self.port, &self.timings, kind, value);
        Ok(())
    }

    /// Erase flash, EEPROM and lock bits. Only valid once detection has
    /// fixed a variant.
    pub fn chip_erase(&mut self) -> Result<()> {
        let driver = self.driver()?;
        driver.chip_erase(&mut self.port, &self.timings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::Direction;
    use crate::request::codes;

    struct NullPort;

    impl TargetPort for NullPort {
        fn set_line(&mut self, _line: Line, _level: Level) {}
        fn set_bus_direction(&mut self, _dir: Direction) {}
        fn write_bus(&mut self, _value: u8) {}
        fn read_bus(&mut self) -> u8 {
            0
        }
        fn attach(&mut self) {}
        fn detach(&mut self) {}
        fn wait_us(&mut self, _us: u32) {}
    }

    #[test]
    fn chunk_calls_while_idle_are_rejected() {
        let mut session = Session::new(NullPort);
        let mut buf = [0u8; 8];
        assert_eq!(session.read_chunk(&mut buf), Err(Error::InvalidState));
        assert_eq!(session.write_chunk(&[0x00]), Err(Error::InvalidState));
    }

    #[test]
    fn chunk_calls_in_wrong_direction_are_rejected() {
        let mut session = Session::new(NullPort);
        session.handle(Request::ReadFlash {
            address: 0,
            count: 8,
        });
        assert_eq!(session.write_chunk(&[0x00]), Err(Error::InvalidState));
    }

    #[test]
    fn unknown_setup_packet_yields_empty_reply() {
        let mut session = Session::new(NullPort);
        assert_eq!(session.setup(&[0, 99, 0, 0, 0, 0, 0, 0]), Reply::Empty);
    }

    #[test]
    fn sck_option_is_stored_and_acknowledged() {
        let mut session = Session::new(NullPort);
        let reply = session.setup(&[0, codes::SET_SCK_OPTION, 3, 0, 0, 0, 0, 0]);
        assert_eq!(reply, Reply::byte(0));
        assert_eq!(session.sck_option, 3);
    }

    #[test]
    fn capabilities_without_alt_engine_are_empty() {
        let mut session = Session::new(NullPort);
        assert_eq!(
            session.handle(Request::GetCapabilities),
            Reply::bytes(&[0, 0, 0, 0])
        );
    }
}
