//! Hand-built card images for unit tests.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::Write;

use crate::block::{Cursor, BLOCK_SIZE, ENTRY_HEADER_SIZE};
use crate::checksum::{crc16_update, Crc16};
use crate::superblock::{FILE_NAME_LEN, FILE_SLOTS};

pub const NAMES: [&str; FILE_SLOTS] = ["data.fk", "log.txt", "gps.bin", "", "emergency", "debug.log"];
pub const VERSIONS: [u16; FILE_SLOTS] = [1, 7, 0x0102, 0, 42, 0xFFFF];

pub struct Image {
    pub bytes: Vec<u8>,
}

pub fn header_bytes(generation: u32, block: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.write_u8(1).unwrap();
    out.write_u32::<LittleEndian>(generation).unwrap();
    out.write_u32::<LittleEndian>(block).unwrap();
    out.write_u16::<LittleEndian>(0).unwrap();
    out.write_u32::<LittleEndian>(1_600_000_000).unwrap();
    for (name, version) in NAMES.iter().zip(VERSIONS) {
        let mut n = [0u8; FILE_NAME_LEN];
        n[..name.len()].copy_from_slice(name.as_bytes());
        out.write_all(&n).unwrap();
        out.write_u16::<LittleEndian>(version).unwrap();
        out.write_u32::<LittleEndian>(0).unwrap();
        out.write_u32::<LittleEndian>(0).unwrap();
        out.write_u32::<LittleEndian>(0).unwrap();
    }
    let crc = crc16_update(0, &out);
    out.write_u16::<LittleEndian>(crc).unwrap();
    out
}

impl Image {
    /// Zeroed image of `blocks` blocks whose second header copy is current.
    pub fn new(blocks: u32) -> Self {
        let mut bytes = vec![0u8; (blocks.max(1) * BLOCK_SIZE) as usize];
        let mut headers = header_bytes(1, blocks);
        headers.extend(header_bytes(2, blocks));
        bytes[..headers.len()].copy_from_slice(&headers);
        Self { bytes }
    }

    pub fn put_raw(&mut self, at: Cursor, raw: &[u8]) {
        let pos = at.position() as usize;
        self.bytes[pos..pos + raw.len()].copy_from_slice(raw);
    }

    /// Write a well-formed record and return the cursor just past it.
    pub fn put_record(&mut self, at: Cursor, slot: u8, payload: &[u8]) -> Cursor {
        let raw = record_bytes(slot, payload, VERSIONS[slot as usize]);
        self.put_raw(at, &raw);
        at.advance(raw.len() as u16)
    }
}

pub fn record_bytes(slot: u8, payload: &[u8], version: u16) -> Vec<u8> {
    let mut raw = vec![0u8; ENTRY_HEADER_SIZE];
    raw[0] = slot;
    LittleEndian::write_u16(&mut raw[1..3], payload.len() as u16);
    LittleEndian::write_u16(&mut raw[3..5], payload.len() as u16);
    let crc = Crc16::new(version).update(&raw[..5]).update(payload).finish();
    LittleEndian::write_u16(&mut raw[5..7], crc);
    raw.extend_from_slice(payload);
    raw
}
