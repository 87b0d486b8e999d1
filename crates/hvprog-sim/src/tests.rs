//! End-to-end tests driving a [`Session`] against the simulated dies,
//! exercising the same setup/chunk contract the transport uses.

use hvprog_core::alt::AltFamily;
use hvprog_core::fuse::FuseKind;
use hvprog_core::request::codes;
use hvprog_core::{DeviceVariant, Reply, Session, SessionState, WriteStatus};

use crate::SimPort;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Raw 8-byte setup packet: code in byte 1, parameters in bytes 2..8.
fn packet(code: u8, params: [u8; 6]) -> [u8; 8] {
    let mut p = [0u8; 8];
    p[1] = code;
    p[2..].copy_from_slice(&params);
    p
}

/// Connect and run detection, expecting success.
fn ready_session(port: SimPort) -> Session<SimPort> {
    let mut session = Session::new(port);
    assert_eq!(session.setup(&packet(codes::CONNECT, [0; 6])), Reply::Empty);
    assert_eq!(
        session.setup(&packet(codes::ENTER_PROG_MODE, [0; 6])),
        Reply::byte(0)
    );
    session
}

/// Push a write payload through in transport-sized chunks, returning the
/// final status.
fn push(session: &mut Session<SimPort>, data: &[u8]) -> WriteStatus {
    let mut status = WriteStatus::MoreExpected;
    for chunk in data.chunks(8) {
        status = session.write_chunk(chunk).unwrap();
    }
    status
}

/// Pull `count` bytes of a streaming read in transport-sized chunks.
fn pull(session: &mut Session<SimPort>, count: usize) -> Vec<u8> {
    let mut out = vec![0u8; count];
    for chunk in out.chunks_mut(8) {
        let len = chunk.len();
        assert_eq!(session.read_chunk(chunk).unwrap(), len);
    }
    out
}

#[test]
fn detects_full_parallel_target() {
    init_logs();
    let session = ready_session(SimPort::full_parallel());
    assert_eq!(session.variant(), Some(DeviceVariant::FullParallel));
    assert!(session.port().parallel_die().unwrap().entered());
}

#[test]
fn detects_short_bus_target() {
    let session = ready_session(SimPort::short_bus());
    assert_eq!(session.variant(), Some(DeviceVariant::ShortBus));
}

#[test]
fn detects_serial_hv_target() {
    let session = ready_session(SimPort::serial_hv());
    assert_eq!(session.variant(), Some(DeviceVariant::SerialHv));
    assert!(session.port().serial_die().unwrap().entered());
}

#[test]
fn detection_fails_with_no_target() {
    let mut session = Session::new(SimPort::detached());
    session.setup(&packet(codes::CONNECT, [0; 6]));
    assert_eq!(
        session.setup(&packet(codes::ENTER_PROG_MODE, [0; 6])),
        Reply::byte(1)
    );
    assert_eq!(session.variant(), None);
}

#[test]
fn flash_roundtrip_full_parallel() {
    let mut session = ready_session(SimPort::full_parallel());

    // Two bytes at 0x10, page size 64, single first+last block.
    let setup = packet(codes::WRITE_FLASH, [0x10, 0x00, 64, 0x03, 2, 0]);
    assert_eq!(session.setup(&setup), Reply::Streaming);
    assert_eq!(push(&mut session, &[0x34, 0x12]), WriteStatus::Complete);
    assert_eq!(session.state(), SessionState::Idle);

    let die = session.port().parallel_die().unwrap();
    assert_eq!(&die.flash[0x10..0x12], &[0x34, 0x12]);

    let setup = packet(codes::READ_FLASH, [0x10, 0x00, 0, 0, 2, 0]);
    assert_eq!(session.setup(&setup), Reply::Streaming);
    assert_eq!(pull(&mut session, 2), vec![0x34, 0x12]);
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn flash_roundtrip_serial_hv() {
    let mut session = ready_session(SimPort::serial_hv());

    let setup = packet(codes::WRITE_FLASH, [0x10, 0x00, 64, 0x03, 4, 0]);
    assert_eq!(session.setup(&setup), Reply::Streaming);
    assert_eq!(
        push(&mut session, &[0xDE, 0xAD, 0xBE, 0xEF]),
        WriteStatus::Complete
    );

    let setup = packet(codes::READ_FLASH, [0x10, 0x00, 0, 0, 4, 0]);
    assert_eq!(session.setup(&setup), Reply::Streaming);
    assert_eq!(pull(&mut session, 4), vec![0xDE, 0xAD, 0xBE, 0xEF]);
}

#[test]
fn flash_roundtrip_short_bus() {
    let mut session = ready_session(SimPort::short_bus());

    let setup = packet(codes::WRITE_FLASH, [0x00, 0x00, 16, 0x03, 4, 0]);
    assert_eq!(session.setup(&setup), Reply::Streaming);
    assert_eq!(
        push(&mut session, &[0x01, 0x02, 0x03, 0x04]),
        WriteStatus::Complete
    );

    let setup = packet(codes::READ_FLASH, [0x00, 0x00, 0, 0, 4, 0]);
    assert_eq!(session.setup(&setup), Reply::Streaming);
    assert_eq!(pull(&mut session, 4), vec![0x01, 0x02, 0x03, 0x04]);
}

#[test]
fn full_pages_commit_exactly_at_the_boundary() {
    // Page size 8 bytes = 4 words; 24 bytes land as three full pages.
    let mut session = ready_session(SimPort::full_parallel());
    let setup = packet(codes::WRITE_FLASH, [0x00, 0x00, 8, 0x03, 24, 0]);
    session.setup(&setup);
    let data: Vec<u8> = (0..24).collect();
    assert_eq!(push(&mut session, &data), WriteStatus::Complete);
    assert_eq!(session.port().parallel_die().unwrap().page_commits, 3);
}

#[test]
fn last_block_flushes_a_partial_page() {
    // 20 bytes over 8-byte pages: two full commits plus the final flush.
    let mut session = ready_session(SimPort::full_parallel());
    let setup = packet(codes::WRITE_FLASH, [0x00, 0x00, 8, 0x03, 20, 0]);
    session.setup(&setup);
    let data: Vec<u8> = (0..20).collect();
    assert_eq!(push(&mut session, &data), WriteStatus::Complete);
    assert_eq!(session.port().parallel_die().unwrap().page_commits, 3);

    let setup = packet(codes::READ_FLASH, [0x00, 0x00, 0, 0, 20, 0]);
    session.setup(&setup);
    assert_eq!(pull(&mut session, 20), data);
}

#[test]
fn intermediate_block_leaves_the_page_open() {
    // Same 20 bytes without the last flag: the partial page stays pending.
    let mut session = ready_session(SimPort::full_parallel());
    let setup = packet(codes::WRITE_FLASH, [0x00, 0x00, 8, 0x01, 20, 0]);
    session.setup(&setup);
    let data: Vec<u8> = (0..20).collect();
    assert_eq!(push(&mut session, &data), WriteStatus::Complete);
    assert_eq!(session.port().parallel_die().unwrap().page_commits, 2);
}

#[test]
fn unbuffered_write_never_commits_pages() {
    let mut session = ready_session(SimPort::full_parallel());
    let setup = packet(codes::WRITE_FLASH, [0x00, 0x00, 0, 0x03, 4, 0]);
    session.setup(&setup);
    assert_eq!(push(&mut session, &[1, 2, 3, 4]), WriteStatus::Complete);
    assert_eq!(session.port().parallel_die().unwrap().page_commits, 0);
}

#[test]
fn bank_load_reissued_only_on_bank_change() {
    let mut session = ready_session(SimPort::full_parallel());

    // Cross into the second 128 KiB bank.
    session.setup(&packet(codes::SET_LONG_ADDRESS, [0x00, 0x00, 0x02, 0x00, 0, 0]));
    session.setup(&packet(codes::READ_FLASH, [0, 0, 0, 0, 2, 0]));
    pull(&mut session, 2);
    assert_eq!(session.port().parallel_die().unwrap().bank_loads, 1);

    // Still in the same bank: the cursor carried past 0x20000.
    session.setup(&packet(codes::READ_FLASH, [0, 0, 0, 0, 2, 0]));
    pull(&mut session, 2);
    assert_eq!(session.port().parallel_die().unwrap().bank_loads, 1);

    // Back to bank zero.
    session.setup(&packet(codes::SET_LONG_ADDRESS, [0x00, 0x00, 0x00, 0x00, 0, 0]));
    session.setup(&packet(codes::READ_FLASH, [0, 0, 0, 0, 2, 0]));
    pull(&mut session, 2);
    assert_eq!(session.port().parallel_die().unwrap().bank_loads, 2);
}

#[test]
fn short_final_chunk_ends_a_streaming_read() {
    let mut session = ready_session(SimPort::full_parallel());
    session.setup(&packet(codes::READ_EEPROM, [0, 0, 0, 0, 10, 0]));

    let mut buf = [0u8; 8];
    session.read_chunk(&mut buf).unwrap();
    assert_eq!(session.state(), SessionState::ReadEeprom);

    session.read_chunk(&mut buf[..2]).unwrap();
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn eeprom_roundtrip_full_parallel() {
    let mut session = ready_session(SimPort::full_parallel());
    session.setup(&packet(codes::WRITE_EEPROM, [5, 0, 0, 0, 3, 0]));
    assert_eq!(push(&mut session, &[0xAA, 0xBB, 0xCC]), WriteStatus::Complete);
    assert_eq!(
        &session.port().parallel_die().unwrap().eeprom[5..8],
        &[0xAA, 0xBB, 0xCC]
    );

    session.setup(&packet(codes::READ_EEPROM, [5, 0, 0, 0, 3, 0]));
    assert_eq!(pull(&mut session, 3), vec![0xAA, 0xBB, 0xCC]);
}

#[test]
fn eeprom_roundtrip_serial_hv() {
    let mut session = ready_session(SimPort::serial_hv());
    session.setup(&packet(codes::WRITE_EEPROM, [0x40, 0x00, 0, 0, 2, 0]));
    assert_eq!(push(&mut session, &[0x5A, 0xA5]), WriteStatus::Complete);

    session.setup(&packet(codes::READ_EEPROM, [0x40, 0x00, 0, 0, 2, 0]));
    assert_eq!(pull(&mut session, 2), vec![0x5A, 0xA5]);
}

#[test]
fn write_bytes_beyond_declared_total_are_dropped() {
    let mut session = ready_session(SimPort::full_parallel());
    session.setup(&packet(codes::WRITE_EEPROM, [0, 0, 0, 0, 2, 0]));
    assert_eq!(
        session.write_chunk(&[1, 2, 3, 4]).unwrap(),
        WriteStatus::Complete
    );

    let die = session.port().parallel_die().unwrap();
    assert_eq!(&die.eeprom[0..3], &[1, 2, 0xFF]);
}

#[test]
fn fuse_roundtrip_full_parallel() {
    let mut session = ready_session(SimPort::full_parallel());

    session.write_fuse(FuseKind::Low, 0xE2).unwrap();
    session.write_fuse(FuseKind::High, 0xD9).unwrap();
    session.write_fuse(FuseKind::Extended, 0xF4).unwrap();
    session.write_fuse(FuseKind::Lock, 0xFC).unwrap();

    assert_eq!(session.read_fuse(FuseKind::Low).unwrap(), 0xE2);
    assert_eq!(session.read_fuse(FuseKind::High).unwrap(), 0xD9);
    assert_eq!(session.read_fuse(FuseKind::Extended).unwrap(), 0xF4);
    assert_eq!(session.read_fuse(FuseKind::Lock).unwrap(), 0xFC);
}

#[test]
fn fuse_roundtrip_short_bus() {
    // The short bus routes the second select through XA1.
    let mut session = ready_session(SimPort::short_bus());
    session.write_fuse(FuseKind::High, 0xDA).unwrap();
    session.write_fuse(FuseKind::Extended, 0xF5).unwrap();
    assert_eq!(session.read_fuse(FuseKind::High).unwrap(), 0xDA);
    assert_eq!(session.read_fuse(FuseKind::Extended).unwrap(), 0xF5);
}

#[test]
fn fuse_roundtrip_serial_hv() {
    let mut session = ready_session(SimPort::serial_hv());

    session.write_fuse(FuseKind::Low, 0xE2).unwrap();
    session.write_fuse(FuseKind::High, 0xD9).unwrap();
    session.write_fuse(FuseKind::Extended, 0xF4).unwrap();
    session.write_fuse(FuseKind::Lock, 0xFC).unwrap();

    assert_eq!(session.read_fuse(FuseKind::Low).unwrap(), 0xE2);
    assert_eq!(session.read_fuse(FuseKind::High).unwrap(), 0xD9);
    assert_eq!(session.read_fuse(FuseKind::Extended).unwrap(), 0xF4);
    assert_eq!(session.read_fuse(FuseKind::Lock).unwrap(), 0xFC);
}

#[test]
fn wedged_serial_target_gets_a_forced_reset() {
    init_logs();
    let mut session = ready_session(SimPort::serial_hv());
    assert_eq!(session.port().serial_die().unwrap().resets, 0);

    session.port_mut().serial_die_mut().unwrap().set_wedged(true);
    session.write_fuse(FuseKind::Low, 0x5A).unwrap();
    assert_eq!(session.port().serial_die().unwrap().resets, 1);
}

#[test]
fn chip_erase_clears_memories_and_lock_bits() {
    let mut session = ready_session(SimPort::serial_hv());

    session.setup(&packet(codes::WRITE_EEPROM, [0, 0, 0, 0, 1, 0]));
    push(&mut session, &[0x42]);
    session.write_fuse(FuseKind::Lock, 0xFC).unwrap();

    session.chip_erase().unwrap();

    let die = session.port().serial_die().unwrap();
    assert_eq!(die.eeprom[0], 0xFF);
    assert_eq!(die.fuses[3], 0xFF);
}

/// Stand-in alternate-family engine recording what the session routes to
/// it.
struct TestAlt {
    connected: bool,
    idle_delay: u16,
    mem: Vec<u8>,
}

impl TestAlt {
    fn new() -> Self {
        Self {
            connected: false,
            idle_delay: 0,
            mem: vec![0xFF; 256],
        }
    }
}

impl AltFamily for TestAlt {
    fn connect(&mut self, idle_delay: u16) {
        self.connected = true;
        self.idle_delay = idle_delay;
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn read_block(&mut self, address: u16, buf: &mut [u8]) {
        let start = address as usize;
        buf.copy_from_slice(&self.mem[start..start + buf.len()]);
    }

    fn write_block(&mut self, address: u16, data: &[u8]) {
        let start = address as usize;
        self.mem[start..start + data.len()].copy_from_slice(data);
    }
}

#[test]
fn alt_block_requests_route_to_the_alt_engine() {
    let mut session = Session::with_alt(SimPort::detached(), TestAlt::new());

    assert_eq!(
        session.setup(&packet(codes::GET_CAPABILITIES, [0; 6])),
        Reply::bytes(&1u32.to_le_bytes())
    );

    session.setup(&packet(codes::ALT_CONNECT, [0x34, 0x12, 0, 0, 0, 0]));
    assert!(session.alt().connected);
    assert_eq!(session.alt().idle_delay, 0x1234);

    let data: Vec<u8> = (0..16).collect();
    session.setup(&packet(codes::WRITE_ALT_BLOCK, [0, 0, 0, 0, 16, 0]));
    assert_eq!(session.write_chunk(&data[..8]).unwrap(), WriteStatus::MoreExpected);
    assert_eq!(session.write_chunk(&data[8..]).unwrap(), WriteStatus::Complete);
    assert_eq!(&session.alt().mem[..16], &data[..]);

    session.setup(&packet(codes::READ_ALT_BLOCK, [0, 0, 0, 0, 16, 0]));
    let mut buf = [0u8; 8];
    session.read_chunk(&mut buf).unwrap();
    assert_eq!(&buf, &data[..8]);
    session.read_chunk(&mut buf).unwrap();
    assert_eq!(&buf, &data[8..]);

    // Alt reads never self-terminate; the next setup ends them.
    assert_eq!(session.state(), SessionState::ReadAltBlock);
    session.setup(&packet(codes::CONNECT, [0; 6]));
    assert_eq!(session.state(), SessionState::Idle);

    session.setup(&packet(codes::ALT_DISCONNECT, [0; 6]));
    assert!(!session.alt().connected);
}

#[test]
fn virtual_clock_advances_without_sleeping() {
    let session = ready_session(SimPort::full_parallel());
    // Detection alone covers tens of milliseconds of waveform time.
    assert!(session.port().elapsed_us() > 10_000);
}
