//! Single-step record decoder.
//!
//! [`decode`] looks at exactly one cursor position and reports what is there
//! together with the position to look at next. It holds no state of its own;
//! the caller owns the cursor.
//!
//! Any record that fails validation ends the current block: the writer packs
//! records front to back, so a bad header means the rest of the block is
//! either unwritten or can no longer be framed.

use std::io::{self, Read, Seek, SeekFrom};

use crate::block::{record_checksum, validate, Cursor, EntryHeader, SkipReason, ENTRY_HEADER_SIZE};
use crate::superblock::{Slot, Superblock};

/// A record that passed structural and checksum validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub slot:    Slot,
    pub entry:   EntryHeader,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Valid(Record),
    Skip(SkipReason),
}

impl Outcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Outcome::Valid(_))
    }
}

/// Result of decoding one cursor position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub at:      Cursor,
    pub outcome: Outcome,
    pub next:    Cursor,
}

/// Decode the record at `cursor`.
///
/// Only genuine I/O failures (including a short read of the entry header or
/// payload) are returned as `Err`; corruption is an [`Outcome::Skip`].
pub fn decode<R>(reader: &mut R, header: &Superblock, cursor: Cursor) -> io::Result<Decoded>
where
    R: Read + Seek,
{
    reader.seek(SeekFrom::Start(cursor.position()))?;
    let entry = EntryHeader::read(&mut *reader)?;

    let skip = |reason| Decoded { at: cursor, outcome: Outcome::Skip(reason), next: cursor.next_block() };

    let slot = match validate(&entry) {
        Ok(slot) => slot,
        Err(reason) => return Ok(skip(reason)),
    };

    let mut payload = vec![0u8; entry.size as usize];
    reader.read_exact(&mut payload)?;

    let computed = record_checksum(header.file(slot), &entry, &payload);
    if computed != entry.crc {
        return Ok(skip(SkipReason::ChecksumMismatch { stored: entry.crc, computed }));
    }

    let next = cursor.advance(entry.size + ENTRY_HEADER_SIZE as u16);
    Ok(Decoded {
        at: cursor,
        outcome: Outcome::Valid(Record { slot, entry, payload }),
        next,
    })
}
