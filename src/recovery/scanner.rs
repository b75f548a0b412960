//! Block-range scanner.
//!
//! Walks every record from block 1 up to (not including) the header's
//! `block` count, handing valid payloads to a [`Demultiplexer`]. Corrupt or
//! unwritten regions are counted and logged, never returned as errors.
//!
//! ## Progress
//!
//! `scan()` accepts an optional [`ProgressFn`] callback, called once each
//! time the cursor enters a new block with `(block, total_blocks)`.

use log::debug;
use serde::Serialize;
use std::io::{self, Read, Seek};

use crate::block::{Cursor, SkipReason};
use crate::io_stream::{Demultiplexer, StreamSink};
use crate::recovery::walker::{decode, Outcome};
use crate::superblock::Superblock;

/// First block of the record region; block 0 holds the headers.
pub const FIRST_RECORD_BLOCK: u32 = 1;

pub type ProgressFn<'a> = dyn FnMut(u32 /*block*/, u32 /*total_blocks*/) + 'a;

/// Skipped regions broken down by cause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub bad_slot:          u64,
    pub bad_size:          u64,
    pub bad_available:     u64,
    pub checksum_mismatch: u64,
}

impl SkipCounts {
    fn record(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::BadSlot                   => self.bad_slot += 1,
            SkipReason::BadSize                   => self.bad_size += 1,
            SkipReason::BadAvailable              => self.bad_available += 1,
            SkipReason::ChecksumMismatch { .. }   => self.checksum_mismatch += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.bad_slot + self.bad_size + self.bad_available + self.checksum_mismatch
    }
}

/// Totals gathered over one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Block count taken from the current header.
    pub total_blocks:    u32,
    /// Blocks in which at least one position was decoded.
    pub blocks_visited:  u32,
    pub valid_records:   u64,
    pub skipped:         SkipCounts,
    /// Payload bytes handed to the demultiplexer.
    pub bytes_recovered: u64,
}

impl ScanReport {
    /// Summary line for display.
    pub fn summary(&self) -> String {
        format!(
            "{} record(s), {} byte(s) recovered from {}/{} block(s); {} region(s) skipped",
            self.valid_records,
            self.bytes_recovered,
            self.blocks_visited,
            self.total_blocks.saturating_sub(FIRST_RECORD_BLOCK),
            self.skipped.total(),
        )
    }
}

/// Scan the record region of `reader` described by `header`.
///
/// Returns `Err` only on I/O failure, of the medium or of an output stream.
/// Streams already opened by `demux` stay owned by it either way.
pub fn scan<R, S>(
    reader:       &mut R,
    header:       &Superblock,
    demux:        &mut Demultiplexer<S>,
    mut progress: Option<&mut ProgressFn<'_>>,
) -> io::Result<ScanReport>
where
    R: Read + Seek,
    S: StreamSink,
{
    let mut report = ScanReport { total_blocks: header.block, ..Default::default() };
    let mut cursor = Cursor::new(FIRST_RECORD_BLOCK, 0);
    let mut last_block = None;

    while cursor.block < header.block {
        if last_block != Some(cursor.block) {
            last_block = Some(cursor.block);
            report.blocks_visited += 1;
            if let Some(cb) = progress.as_mut() {
                cb(cursor.block, header.block);
            }
        }

        let decoded = decode(reader, header, cursor)?;
        match decoded.outcome {
            Outcome::Valid(record) => {
                demux.push(header, &record)?;
                report.valid_records += 1;
                report.bytes_recovered += record.payload.len() as u64;
            }
            Outcome::Skip(reason) => {
                debug!("skipping rest of block {} at {}: {:?}", cursor.block, decoded.at, reason);
                report.skipped.record(reason);
            }
        }
        cursor = decoded.next;
    }

    Ok(report)
}
