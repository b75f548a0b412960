//! The fkfs header region (block 0).
//!
//! The firmware keeps two copies of the header back-to-back at byte 0 and
//! alternates between them on every update, bumping `generation` each time.
//! Whichever copy carries the larger generation is the current one.
//!
//! All fields are little-endian and packed; no padding between fields.
//!
//! | Offset | Size | Field        |
//! |--------|------|--------------|
//! | 0      | 1    | version      |
//! | 1      | 4    | generation   |
//! | 5      | 4    | block        |
//! | 9      | 2    | offset       |
//! | 11     | 4    | time         |
//! | 15     | 156  | files[6]     |
//! | 171    | 2    | crc          |

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read};
use thiserror::Error;

use crate::checksum::crc16_update;

/// Number of logical file slots a card can multiplex.
pub const FILE_SLOTS: usize = 6;
/// Width of the NUL-padded name field.
pub const FILE_NAME_LEN: usize = 12;
/// Encoded size of one [`FileDescriptor`].
pub const FILE_DESCRIPTOR_SIZE: usize = FILE_NAME_LEN + 2 + 4 + 4 + 4;
/// Encoded size of one header copy.
pub const HEADER_SIZE: usize = 1 + 4 + 4 + 2 + 4 + FILE_SLOTS * FILE_DESCRIPTOR_SIZE + 2;
/// Number of redundant header copies at the start of the medium.
pub const HEADER_COPIES: usize = 2;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Header region truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Index of one of the six logical files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct Slot(u8);

impl Slot {
    /// `None` unless `raw < FILE_SLOTS`.
    pub fn new(raw: u8) -> Option<Self> {
        ((raw as usize) < FILE_SLOTS).then_some(Slot(raw))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Every slot in ascending order.
    pub fn all() -> impl Iterator<Item = Slot> {
        (0..FILE_SLOTS as u8).map(Slot)
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "f#{}", self.0)
    }
}

/// Per-slot file metadata stored in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileDescriptor {
    pub name:        [u8; FILE_NAME_LEN],
    /// Seeds every record checksum belonging to this file.
    pub version:     u16,
    pub start_block: u32,
    pub end_block:   u32,
    pub size:        u32,
}

impl FileDescriptor {
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut name = [0u8; FILE_NAME_LEN];
        reader.read_exact(&mut name)?;
        Ok(Self {
            name,
            version:     reader.read_u16::<LittleEndian>()?,
            start_block: reader.read_u32::<LittleEndian>()?,
            end_block:   reader.read_u32::<LittleEndian>()?,
            size:        reader.read_u32::<LittleEndian>()?,
        })
    }

    /// Name with the NUL padding stripped. Invalid UTF-8 is replaced.
    pub fn name(&self) -> String {
        let end = self.name.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

/// One decoded header copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub version:    u8,
    pub generation: u32,
    /// Number of blocks written so far, header block included.
    pub block:      u32,
    /// Writer's offset inside `block` at the time of the update.
    pub offset:     u16,
    /// Creation time, seconds since the Unix epoch.
    pub time:       u32,
    pub files:      [FileDescriptor; FILE_SLOTS],
    pub crc:        u16,
    computed_crc:   u16,
}

impl Superblock {
    /// Decode one header copy from exactly [`HEADER_SIZE`] bytes.
    pub fn read<R: Read>(mut reader: R) -> Result<Self, HeaderError> {
        let mut raw = [0u8; HEADER_SIZE];
        let found = read_up_to(&mut reader, &mut raw)?;
        if found < HEADER_SIZE {
            return Err(HeaderError::Truncated { expected: HEADER_SIZE, found });
        }
        Ok(Self::parse(&raw)?)
    }

    fn parse(raw: &[u8; HEADER_SIZE]) -> io::Result<Self> {
        let mut cur = Cursor::new(&raw[..]);
        let version    = cur.read_u8()?;
        let generation = cur.read_u32::<LittleEndian>()?;
        let block      = cur.read_u32::<LittleEndian>()?;
        let offset     = cur.read_u16::<LittleEndian>()?;
        let time       = cur.read_u32::<LittleEndian>()?;
        let mut files  = [FileDescriptor::default(); FILE_SLOTS];
        for file in files.iter_mut() {
            *file = FileDescriptor::read(&mut cur)?;
        }
        let crc = cur.read_u16::<LittleEndian>()?;
        Ok(Self {
            version,
            generation,
            block,
            offset,
            time,
            files,
            crc,
            computed_crc: crc16_update(0, &raw[..HEADER_SIZE - 2]),
        })
    }

    /// Descriptor for `slot`.
    pub fn file(&self, slot: Slot) -> &FileDescriptor {
        &self.files[slot.index()]
    }

    /// Checksum recomputed from the on-disk bytes, seed 0, trailing field excluded.
    pub fn computed_crc(&self) -> u16 {
        self.computed_crc
    }

    /// Whether the stored checksum agrees with the recomputed one.
    ///
    /// Diagnostic only; a mismatch never rejects the image.
    pub fn checksum_matches(&self) -> bool {
        self.crc == self.computed_crc
    }
}

/// Decode every redundant copy from the start of the medium.
pub fn read_copies<R: Read>(mut reader: R) -> Result<Vec<Superblock>, HeaderError> {
    let mut raw = [0u8; HEADER_SIZE * HEADER_COPIES];
    let found = read_up_to(&mut reader, &mut raw)?;
    if found < raw.len() {
        return Err(HeaderError::Truncated { expected: raw.len(), found });
    }
    raw.chunks_exact(HEADER_SIZE)
        .map(Superblock::read)
        .collect()
}

/// Index of the authoritative copy: highest generation wins, later copies
/// win ties. `None` only for an empty slice.
pub fn select_current(copies: &[Superblock]) -> Option<usize> {
    // `max_by_key` yields the last of several equal maxima.
    (0..copies.len()).max_by_key(|&i| copies[i].generation)
}

/// Decode every copy and pick the current one.
///
/// Returns all copies in on-disk order with the index of the current copy.
pub fn read_selected<R: Read>(reader: R) -> Result<(Vec<Superblock>, usize), HeaderError> {
    let copies = read_copies(reader)?;
    // read_copies never yields an empty list without failing first.
    let current = select_current(&copies)
        .ok_or(HeaderError::Truncated { expected: HEADER_SIZE * HEADER_COPIES, found: 0 })?;
    Ok((copies, current))
}

/// Decode both copies and return the current one.
pub fn read_current<R: Read>(reader: R) -> Result<Superblock, HeaderError> {
    let (mut copies, current) = read_selected(reader)?;
    Ok(copies.swap_remove(current))
}

fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Write;

    fn encode(generation: u32, block: u32, name: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u8(1).unwrap();
        out.write_u32::<LittleEndian>(generation).unwrap();
        out.write_u32::<LittleEndian>(block).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u32::<LittleEndian>(1_500_000_000).unwrap();
        for i in 0..FILE_SLOTS {
            let mut n = [0u8; FILE_NAME_LEN];
            if i == 0 {
                n[..name.len()].copy_from_slice(name.as_bytes());
            }
            out.write_all(&n).unwrap();
            out.write_u16::<LittleEndian>(i as u16 + 1).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
        }
        let crc = crc16_update(0, &out);
        out.write_u16::<LittleEndian>(crc).unwrap();
        out
    }

    fn pair(g0: u32, g1: u32) -> Vec<u8> {
        let mut img = encode(g0, 10, "first.log");
        img.extend(encode(g1, 20, "second.log"));
        img
    }

    #[test]
    fn layout_size() {
        assert_eq!(FILE_DESCRIPTOR_SIZE, 26);
        assert_eq!(HEADER_SIZE, 173);
        assert_eq!(encode(0, 0, "").len(), HEADER_SIZE);
    }

    #[test]
    fn newer_second_copy_wins() {
        let sb = read_current(&pair(3, 4)[..]).unwrap();
        assert_eq!(sb.generation, 4);
        assert_eq!(sb.block, 20);
    }

    #[test]
    fn newer_first_copy_wins() {
        let sb = read_current(&pair(9, 4)[..]).unwrap();
        assert_eq!(sb.generation, 9);
        assert_eq!(sb.files[0].name(), "first.log");
    }

    #[test]
    fn tie_favours_second_copy() {
        let sb = read_current(&pair(5, 5)[..]).unwrap();
        assert_eq!(sb.block, 20);
        assert_eq!(sb.files[0].name(), "second.log");
    }

    #[test]
    fn decodes_descriptors() {
        let sb = read_current(&pair(0, 1)[..]).unwrap();
        assert_eq!(sb.version, 1);
        assert_eq!(sb.time, 1_500_000_000);
        for slot in Slot::all() {
            assert_eq!(sb.file(slot).version, slot.index() as u16 + 1);
        }
        assert_eq!(sb.files[1].name(), "");
        assert!(sb.checksum_matches());
    }

    #[test]
    fn bad_header_checksum_is_not_fatal() {
        let mut img = pair(1, 2);
        let last = img.len() - 1;
        img[last] ^= 0xFF;
        let sb = read_current(&img[..]).unwrap();
        assert_eq!(sb.generation, 2);
        assert!(!sb.checksum_matches());
    }

    #[test]
    fn short_region_is_truncated() {
        let img = pair(1, 2);
        match read_current(&img[..HEADER_SIZE + 10]) {
            Err(HeaderError::Truncated { expected, found }) => {
                assert_eq!(expected, HEADER_SIZE * 2);
                assert_eq!(found, HEADER_SIZE + 10);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[test]
    fn selection_over_more_copies() {
        let copies: Vec<Superblock> = [4u32, 9, 2, 9, 1]
            .iter()
            .map(|&g| Superblock::read(&encode(g, 0, "")[..]).unwrap())
            .collect();
        assert_eq!(select_current(&copies), Some(3));
        assert_eq!(select_current(&[]), None);
    }

    #[test]
    fn selected_index_matches_current_copy() {
        let (copies, current) = read_selected(&pair(7, 3)[..]).unwrap();
        assert_eq!(copies.len(), HEADER_COPIES);
        assert_eq!(current, 0);
        assert_eq!(copies[current], read_current(&pair(7, 3)[..]).unwrap());
    }

    #[test]
    fn slot_bounds() {
        assert!(Slot::new(5).is_some());
        assert!(Slot::new(6).is_none());
        assert_eq!(Slot::all().count(), FILE_SLOTS);
    }
}
