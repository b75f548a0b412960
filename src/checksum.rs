//! Nibble-wise CRC-16 used by the fkfs writer.
//!
//! Every byte is folded in twice, low nibble first, through a 16-entry
//! table. The table is frozen: cards written by the firmware can only be
//! verified with exactly these values.

/// Lookup table for the reflected 0xA001 polynomial, one entry per nibble.
pub const CRC16_TABLE: [u16; 16] = [
    0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401,
    0xA001, 0x6C00, 0x7800, 0xB401, 0x5000, 0x9C01, 0x8801, 0x4400,
];

#[inline]
fn fold_nibble(crc: u16, nibble: u8) -> u16 {
    let r = CRC16_TABLE[(crc & 0xF) as usize];
    let crc = (crc >> 4) & 0x0FFF;
    crc ^ r ^ CRC16_TABLE[(nibble & 0xF) as usize]
}

/// Continue a checksum from `seed` over `data`.
///
/// An empty slice returns `seed` unchanged.
pub fn crc16_update(seed: u16, data: &[u8]) -> u16 {
    data.iter().fold(seed, |crc, &b| {
        let crc = fold_nibble(crc, b);
        fold_nibble(crc, b >> 4)
    })
}

/// Incremental form of [`crc16_update`] for checksums spanning several slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc16 {
    state: u16,
}

impl Crc16 {
    pub fn new(seed: u16) -> Self {
        Self { state: seed }
    }

    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.state = crc16_update(self.state, data);
        self
    }

    pub fn finish(&self) -> u16 {
        self.state
    }
}
