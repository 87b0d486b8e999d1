//! Command codes for the parallel bus and instruction bytes for the serial
//! high-voltage frame protocol.

// ============================================================================
// Parallel command register codes (loaded with XA = [1:0])
// ============================================================================

/// No operation; also loaded after a page commit to park the command register.
pub const CMD_NOP: u8 = 0x00;
/// Read flash, byte selected by BS1.
pub const CMD_READ_FLASH: u8 = 0x02;
/// Read EEPROM.
pub const CMD_READ_EEPROM: u8 = 0x03;
/// Read fuse or lock bits, selected by BS1/BS2.
pub const CMD_READ_FUSE: u8 = 0x04;
/// Read signature bytes.
pub const CMD_READ_SIGNATURE: u8 = 0x08;
/// Write flash (page load and page commit).
pub const CMD_WRITE_FLASH: u8 = 0x10;
/// Write EEPROM.
pub const CMD_WRITE_EEPROM: u8 = 0x11;
/// Write lock bits.
pub const CMD_WRITE_LOCK: u8 = 0x20;
/// Write a fuse byte, selected by BS1/BS2.
pub const CMD_WRITE_FUSE: u8 = 0x40;
/// Chip erase.
pub const CMD_CHIP_ERASE: u8 = 0x80;

// ============================================================================
// Serial instruction bytes (SII values of an 11-bit frame)
// ============================================================================

/// Load the command register from the data byte.
pub const SII_LOAD_COMMAND: u8 = 0x4C;
/// Load the low address byte.
pub const SII_LOAD_ADDR_LOW: u8 = 0x0C;
/// Load the high address byte.
pub const SII_LOAD_ADDR_HIGH: u8 = 0x1C;
/// Load the low data byte.
pub const SII_LOAD_DATA_LOW: u8 = 0x2C;
/// Load the high data byte.
pub const SII_LOAD_DATA_HIGH: u8 = 0x3C;
/// Latch the EEPROM data byte before the write strobes.
pub const SII_LATCH_EEPROM: u8 = 0x6D;

// Strobe/readback pairs. The first instruction of a pair arms the operation,
// the second carries it out; for reads the result arrives in the frame
// shifted during the second instruction.

/// Write strobe pair for the low-byte target (low fuse, lock bits, EEPROM,
/// page commit, chip erase).
pub const SII_WRITE_LOW: (u8, u8) = (0x64, 0x6C);
/// Write strobe pair for the high fuse.
pub const SII_WRITE_HIGH: (u8, u8) = (0x74, 0x7C);
/// Write strobe pair for the extended fuse.
pub const SII_WRITE_EXT: (u8, u8) = (0x66, 0x6E);
/// Read pair for the low byte of the selected memory.
pub const SII_READ_LOW: (u8, u8) = (0x68, 0x6C);
/// Read pair for the high byte of the selected memory (flash high byte,
/// lock bits).
pub const SII_READ_HIGH: (u8, u8) = (0x78, 0x7C);
/// Read pair for the high fuse.
pub const SII_READ_HIGH_FUSE: (u8, u8) = (0x7A, 0x7E);
/// Read pair for the extended fuse.
pub const SII_READ_EXT: (u8, u8) = (0x6A, 0x6E);
/// Latch pair for the high byte of a flash word during page load.
pub const SII_LATCH_HIGH: (u8, u8) = (0x7D, 0x7C);
