//! Host request parsing and reply shapes.
//!
//! The transport hands the engine the raw 8-byte setup packet: byte 1 is
//! the request code, bytes 2..8 the parameters, multi-byte fields
//! little-endian. The numbering is the classic programmer wire protocol,
//! so existing host tools keep working.

use bitflags::bitflags;

/// Request codes as they appear on the wire.
pub mod codes {
    /// Power up and claim the signal lines.
    pub const CONNECT: u8 = 1;
    /// Release the lines and power down.
    pub const DISCONNECT: u8 = 2;
    /// Begin a streaming flash read.
    pub const READ_FLASH: u8 = 4;
    /// Run variant detection; replies with a one-byte status.
    pub const ENTER_PROG_MODE: u8 = 5;
    /// Begin a streaming flash write.
    pub const WRITE_FLASH: u8 = 6;
    /// Begin a streaming EEPROM read.
    pub const READ_EEPROM: u8 = 7;
    /// Begin a streaming EEPROM write.
    pub const WRITE_EEPROM: u8 = 8;
    /// Switch to 32-bit extended addressing for the rest of the session.
    pub const SET_LONG_ADDRESS: u8 = 9;
    /// Store the clock-speed option code.
    pub const SET_SCK_OPTION: u8 = 10;
    /// Connect the alternate-family engine.
    pub const ALT_CONNECT: u8 = 11;
    /// Disconnect the alternate-family engine.
    pub const ALT_DISCONNECT: u8 = 12;
    /// Begin a streaming alternate-family block read.
    pub const READ_ALT_BLOCK: u8 = 15;
    /// Begin a streaming alternate-family block write.
    pub const WRITE_ALT_BLOCK: u8 = 16;
    /// Query the capability bitmask.
    pub const GET_CAPABILITIES: u8 = 127;
}

bitflags! {
    /// Position of a write-flash block within the whole transfer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BlockFlags: u8 {
        /// First block: resets the page counter.
        const FIRST = 0x01;
        /// Last block: forces a final partial-page commit.
        const LAST = 0x02;
    }
}

bitflags! {
    /// Capability bitmask returned by `GET_CAPABILITIES`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        /// The alternate-family block protocol is available.
        const ALT_BLOCK = 0x01;
    }
}

/// A decoded host request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Claim the lines and prepare for a session.
    Connect,
    /// Release the lines.
    Disconnect,
    /// Run variant detection.
    EnterProgrammingMode,
    /// Streaming flash read.
    ReadFlash {
        /// Legacy 16-bit start address, ignored under extended addressing.
        address: u16,
        /// Total bytes the host will pull.
        count: u16,
    },
    /// Streaming flash write.
    WriteFlash {
        /// Legacy 16-bit start address, ignored under extended addressing.
        address: u16,
        /// Page size in bytes; zero disables write buffering.
        page_size: u16,
        /// Block position flags.
        flags: BlockFlags,
        /// Total bytes the host will push.
        count: u16,
    },
    /// Streaming EEPROM read.
    ReadEeprom {
        /// Start address.
        address: u16,
        /// Total bytes the host will pull.
        count: u16,
    },
    /// Streaming EEPROM write.
    WriteEeprom {
        /// Start address.
        address: u16,
        /// Total bytes the host will push.
        count: u16,
    },
    /// Switch to 32-bit addressing and set the cursor.
    SetLongAddress {
        /// Full 32-bit byte address.
        address: u32,
    },
    /// Store the clock-speed option.
    SetSckOption {
        /// Option code, stored verbatim.
        code: u8,
    },
    /// Connect the alternate-family engine.
    AltConnect {
        /// Idle delay parameter forwarded to the engine.
        idle_delay: u16,
    },
    /// Disconnect the alternate-family engine.
    AltDisconnect,
    /// Streaming alternate-family block read.
    ReadAltBlock {
        /// Start address.
        address: u16,
        /// Total bytes the host will pull.
        count: u16,
    },
    /// Streaming alternate-family block write.
    WriteAltBlock {
        /// Start address.
        address: u16,
        /// Total bytes the host will push.
        count: u16,
    },
    /// Query the capability bitmask.
    GetCapabilities,
}

impl Request {
    /// Decode a raw 8-byte setup packet. Returns `None` for request codes
    /// this engine does not implement; the session answers those with an
    /// empty reply.
    pub fn parse(packet: &[u8; 8]) -> Option<Request> {
        let address = u16::from_le_bytes([packet[2], packet[3]]);
        let count = u16::from_le_bytes([packet[6], packet[7]]);

        match packet[1] {
            codes::CONNECT => Some(Self::Connect),
            codes::DISCONNECT => Some(Self::Disconnect),
            codes::ENTER_PROG_MODE => Some(Self::EnterProgrammingMode),
            codes::READ_FLASH => Some(Self::ReadFlash { address, count }),
            codes::WRITE_FLASH => {
                // Page size: byte 4 is the low 8 bits, the high nibble of
                // byte 5 gives bits 8..11. The low nibble of byte 5 holds
                // the block flags.
                let page_size = packet[4] as u16 | ((packet[5] as u16 & 0xF0) << 4);
                let flags = BlockFlags::from_bits_truncate(packet[5] & 0x0F);
                Some(Self::WriteFlash {
                    address,
                    page_size,
                    flags,
                    count,
                })
            }
            codes::READ_EEPROM => Some(Self::ReadEeprom { address, count }),
            codes::WRITE_EEPROM => Some(Self::WriteEeprom { address, count }),
            codes::SET_LONG_ADDRESS => Some(Self::SetLongAddress {
                address: u32::from_le_bytes([packet[2], packet[3], packet[4], packet[5]]),
            }),
            codes::SET_SCK_OPTION => Some(Self::SetSckOption { code: packet[2] }),
            codes::ALT_CONNECT => Some(Self::AltConnect {
                idle_delay: address,
            }),
            codes::ALT_DISCONNECT => Some(Self::AltDisconnect),
            codes::READ_ALT_BLOCK => Some(Self::ReadAltBlock { address, count }),
            codes::WRITE_ALT_BLOCK => Some(Self::WriteAltBlock { address, count }),
            codes::GET_CAPABILITIES => Some(Self::GetCapabilities),
            _ => None,
        }
    }
}

/// What the engine answers to a setup packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Zero-length reply.
    Empty,
    /// Immediate short reply.
    Data(heapless::Vec<u8, 8>),
    /// The host will follow with read/write chunk calls; the transport
    /// encodes this as its streaming sentinel reply length.
    Streaming,
}

impl Reply {
    /// Single-byte reply.
    pub fn byte(value: u8) -> Self {
        Self::bytes(&[value])
    }

    /// Short reply from a slice. At most 8 bytes are carried, which covers
    /// every reply this protocol defines.
    pub fn bytes(data: &[u8]) -> Self {
        let mut buf = heapless::Vec::new();
        let _ = buf.extend_from_slice(data);
        Reply::Data(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_write_flash_page_size_encoding() {
        // page size 0x380 = byte4 0x80 + high nibble 0x3 of byte5,
        // flags in the low nibble.
        let packet = [0, codes::WRITE_FLASH, 0x34, 0x12, 0x80, 0x33, 0x00, 0x01];
        let req = Request::parse(&packet).unwrap();
        assert_eq!(
            req,
            Request::WriteFlash {
                address: 0x1234,
                page_size: 0x380,
                flags: BlockFlags::FIRST | BlockFlags::LAST,
                count: 0x0100,
            }
        );
    }

    #[test]
    fn parses_long_address_little_endian() {
        let packet = [0, codes::SET_LONG_ADDRESS, 0x78, 0x56, 0x34, 0x12, 0, 0];
        assert_eq!(
            Request::parse(&packet),
            Some(Request::SetLongAddress {
                address: 0x1234_5678
            })
        );
    }

    #[test]
    fn unknown_codes_are_rejected() {
        let packet = [0, 99, 0, 0, 0, 0, 0, 0];
        assert_eq!(Request::parse(&packet), None);
    }

    #[test]
    fn read_requests_take_address_and_count() {
        let packet = [0, codes::READ_EEPROM, 0x00, 0x01, 0, 0, 0x0A, 0x00];
        assert_eq!(
            Request::parse(&packet),
            Some(Request::ReadEeprom {
                address: 0x0100,
                count: 10
            })
        );
    }
}
