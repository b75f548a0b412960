//! Record layout inside the block region.
//!
//! Blocks 1.. hold a packed sequence of records. Each record is a 7-byte
//! entry header followed by `size` bytes of payload:
//!
//! | Offset | Size | Field       |
//! |--------|------|-------------|
//! | 0      | 1    | file slot   |
//! | 1      | 2    | size        |
//! | 3      | 2    | available   |
//! | 5      | 2    | crc         |

use byteorder::{ByteOrder, LittleEndian};
use std::io::{self, Read};

use crate::checksum::Crc16;
use crate::superblock::{FileDescriptor, Slot};

/// Size of one addressable block on the medium.
pub const BLOCK_SIZE: u32 = 512;
/// Encoded size of an [`EntryHeader`].
pub const ENTRY_HEADER_SIZE: usize = 7;
/// Largest payload a single record may carry.
pub const MAX_ENTRY_SIZE: u16 = BLOCK_SIZE as u16 - ENTRY_HEADER_SIZE as u16;
/// Bytes of the entry header covered by its checksum.
const ENTRY_CRC_SPAN: usize = ENTRY_HEADER_SIZE - 2;

/// Position of the next entry header on the medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Cursor {
    pub block:  u32,
    pub offset: u16,
}

impl Cursor {
    pub fn new(block: u32, offset: u16) -> Self {
        Self { block, offset }
    }

    /// Start of the block after this one. Saturates at `u32::MAX`, which no
    /// header block count can exceed.
    pub fn next_block(self) -> Self {
        Self { block: self.block.saturating_add(1), offset: 0 }
    }

    /// Advance by `len` bytes, rolling over once the block is exhausted.
    pub fn advance(self, len: u16) -> Self {
        let offset = self.offset as u32 + len as u32;
        if offset >= BLOCK_SIZE {
            self.next_block()
        } else {
            Self { block: self.block, offset: offset as u16 }
        }
    }

    /// Absolute byte position on the medium.
    pub fn position(self) -> u64 {
        self.block as u64 * BLOCK_SIZE as u64 + self.offset as u64
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.block, self.offset)
    }
}

/// Fixed-size header preceding every record payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub file:      u8,
    pub size:      u16,
    pub available: u16,
    pub crc:       u16,
    raw:           [u8; ENTRY_HEADER_SIZE],
}

impl EntryHeader {
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut raw = [0u8; ENTRY_HEADER_SIZE];
        reader.read_exact(&mut raw)?;
        Ok(Self::from_bytes(raw))
    }

    pub fn from_bytes(raw: [u8; ENTRY_HEADER_SIZE]) -> Self {
        Self {
            file:      raw[0],
            size:      LittleEndian::read_u16(&raw[1..3]),
            available: LittleEndian::read_u16(&raw[3..5]),
            crc:       LittleEndian::read_u16(&raw[5..7]),
            raw,
        }
    }

    /// The on-disk bytes this header was decoded from.
    pub fn as_bytes(&self) -> &[u8; ENTRY_HEADER_SIZE] {
        &self.raw
    }
}

/// Why a position did not hold a usable record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// File index outside the six slots.
    BadSlot,
    /// Payload size zero or larger than a block can hold.
    BadSize,
    /// Reserved capacity zero or larger than a block can hold.
    BadAvailable,
    /// Fields plausible but the checksum disagrees.
    ChecksumMismatch { stored: u16, computed: u16 },
}

/// Structural validation of an entry header.
///
/// Returns the owning slot, or the first field found out of range.
pub fn validate(entry: &EntryHeader) -> Result<Slot, SkipReason> {
    let slot = Slot::new(entry.file).ok_or(SkipReason::BadSlot)?;
    if entry.size == 0 || entry.size > MAX_ENTRY_SIZE {
        return Err(SkipReason::BadSize);
    }
    if entry.available == 0 || entry.available > MAX_ENTRY_SIZE {
        return Err(SkipReason::BadAvailable);
    }
    Ok(slot)
}

/// Checksum of a record as the writer computes it: seeded with the owning
/// file's version, over the entry header minus its crc field, then the payload.
pub fn record_checksum(file: &FileDescriptor, entry: &EntryHeader, payload: &[u8]) -> u16 {
    Crc16::new(file.version)
        .update(&entry.as_bytes()[..ENTRY_CRC_SPAN])
        .update(payload)
        .finish()
}
