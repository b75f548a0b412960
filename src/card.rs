//! High-level [`Card`] API, the primary embedding surface.
//!
//! ```no_run
//! use fkfs_recover::card::{Card, RecoverOptions};
//!
//! let mut card = Card::open("card.img")?;
//! let recovery = card.recover(&RecoverOptions::default())?;
//! for file in &recovery.files {
//!     println!("{} ({} bytes)", file.name, file.bytes);
//! }
//! # Ok::<(), fkfs_recover::card::RecoverError>(())
//! ```

use chrono::Local;
use log::{info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::io_stream::{Demultiplexer, DirectorySink, DiscardSink, Finished, SlotSummary, StreamSink};
use crate::recovery::{scan, ProgressFn, ScanReport};
use crate::superblock::{read_selected, HeaderError, Superblock};

#[derive(Error, Debug)]
pub enum RecoverError {
    #[error("Header error: {0}")]
    Header(#[from] HeaderError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── RecoverOptions ───────────────────────────────────────────────────────────

/// Configuration for [`Card::recover`].
#[derive(Debug, Clone)]
pub struct RecoverOptions {
    pub output_dir: PathBuf,
    /// Prepended to every output name as `<prefix>_<name>`.
    /// `None` uses the current local time, `%Y%m%d_%H%M%S`.
    pub prefix:     Option<String>,
}

impl Default for RecoverOptions {
    fn default() -> Self {
        Self { output_dir: PathBuf::from("."), prefix: None }
    }
}

impl RecoverOptions {
    fn resolved_prefix(&self) -> String {
        self.prefix.clone().unwrap_or_else(default_prefix)
    }
}

/// Timestamp prefix used when none is configured.
pub fn default_prefix() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Outcome of a completed recovery.
#[derive(Debug, Clone, Serialize)]
pub struct Recovery {
    pub report: ScanReport,
    pub files:  Vec<SlotSummary>,
}

// ── Card ─────────────────────────────────────────────────────────────────────

/// An opened card image with its current header selected.
pub struct Card<R = File> {
    reader:  R,
    copies:  Vec<Superblock>,
    current: usize,
}

impl Card<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RecoverError> {
        let f = File::open(path.as_ref())?;
        Self::from_reader(f)
    }
}

impl<R: Read + Seek> Card<R> {
    pub fn from_reader(mut reader: R) -> Result<Self, RecoverError> {
        reader.seek(SeekFrom::Start(0))?;
        let (copies, current) = read_selected(&mut reader)?;
        let header = &copies[current];
        if !header.checksum_matches() {
            warn!(
                "header generation {} checksum mismatch (stored {:#06x}, computed {:#06x}); continuing",
                header.generation, header.crc, header.computed_crc(),
            );
        }
        Ok(Self { reader, copies, current })
    }

    /// The current header.
    pub fn header(&self) -> &Superblock {
        &self.copies[self.current]
    }

    /// Position of the current header among [`Card::copies`].
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Every decoded header copy, in on-disk order.
    pub fn copies(&self) -> &[Superblock] {
        &self.copies
    }

    /// Scan the card into an arbitrary sink.
    pub fn recover_into<S: StreamSink>(
        &mut self,
        sink:     S,
        progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<(ScanReport, Vec<Finished<S::Stream>>), RecoverError> {
        let mut demux = Demultiplexer::new(sink);
        let report = scan(&mut self.reader, &self.copies[self.current], &mut demux, progress)?;
        let finished = demux.finish()?;
        Ok((report, finished))
    }

    /// Recover every touched slot into `opts.output_dir`.
    pub fn recover(&mut self, opts: &RecoverOptions) -> Result<Recovery, RecoverError> {
        let sink = DirectorySink::new(&opts.output_dir, opts.resolved_prefix());
        let (report, finished) = self.recover_into(sink, None)?;
        let files: Vec<SlotSummary> = finished.into_iter().map(|f| f.summary).collect();
        for file in &files {
            info!("Saved {} ({} bytes)", file.name, file.bytes);
        }
        Ok(Recovery { report, files })
    }

    /// Walk the card without writing anything.
    pub fn scan(&mut self) -> Result<Recovery, RecoverError> {
        let (report, finished) = self.recover_into(DiscardSink, None)?;
        let files = finished.into_iter().map(|f| f.summary).collect();
        Ok(Recovery { report, files })
    }
}
