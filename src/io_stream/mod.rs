//! Per-slot output streams.
//!
//! [`Demultiplexer`] receives valid records in cursor order and appends each
//! payload to the stream of its file slot. Streams are opened lazily, on the
//! first record for a slot, through a [`StreamSink`]; the sink decides what a
//! stream is (a file on disk, a buffer in memory) and what it is called.
//!
//! # Sinks
//! - [`DirectorySink`] writes `<dir>/<prefix>_<name>` files.
//! - [`MemorySink`] keeps each slot in a `Vec<u8>`.
//! - [`DiscardSink`] counts bytes and drops them, for dry runs.

use log::info;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::recovery::walker::Record;
use crate::superblock::{FileDescriptor, Slot, Superblock, FILE_SLOTS};

// ── Sink ─────────────────────────────────────────────────────────────────────

/// Factory for per-slot output streams.
pub trait StreamSink {
    type Stream: Write;

    /// Open the stream for `slot`. Returns the name it will be reported under.
    fn create(&mut self, slot: Slot, file: &FileDescriptor) -> io::Result<(String, Self::Stream)>;
}

/// Display name for a slot: the descriptor name, or `slot<N>` when blank.
/// Path separators are replaced and `.`/`..` fall back to `slot<N>`, so the
/// name is always a single, ordinary path component.
pub fn slot_name(slot: Slot, file: &FileDescriptor) -> String {
    let name = file.name();
    if name.is_empty() || name == "." || name == ".." {
        return format!("slot{}", slot.index());
    }
    name.chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

/// Creates one file per slot inside a directory.
///
/// Two slots never share a file: a name already handed out gets a
/// `.slot<N>` suffix.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir:    PathBuf,
    prefix: String,
    taken:  HashSet<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self { dir: dir.into(), prefix: prefix.into(), taken: HashSet::new() }
    }

    /// Reserve the path the stream for `slot` is written to.
    fn reserve_path(&mut self, slot: Slot, file: &FileDescriptor) -> PathBuf {
        let mut name = slot_name(slot, file);
        if !self.prefix.is_empty() {
            name = format!("{}_{}", self.prefix, name);
        }
        let mut path = self.dir.join(&name);
        while self.taken.contains(&path) {
            name = format!("{}.slot{}", name, slot.index());
            path = self.dir.join(&name);
        }
        self.taken.insert(path.clone());
        path
    }
}

impl StreamSink for DirectorySink {
    type Stream = BufWriter<File>;

    fn create(&mut self, slot: Slot, file: &FileDescriptor) -> io::Result<(String, Self::Stream)> {
        let path = self.reserve_path(slot, file);
        info!("Exporting {}...", path.display());
        let f = File::create(&path)?;
        Ok((path.display().to_string(), BufWriter::new(f)))
    }
}

/// Keeps every slot in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink;

impl StreamSink for MemorySink {
    type Stream = Vec<u8>;

    fn create(&mut self, slot: Slot, file: &FileDescriptor) -> io::Result<(String, Self::Stream)> {
        Ok((slot_name(slot, file), Vec::new()))
    }
}

/// Drops every byte; only the per-slot counts survive.
#[derive(Debug, Clone, Default)]
pub struct DiscardSink;

impl StreamSink for DiscardSink {
    type Stream = io::Sink;

    fn create(&mut self, slot: Slot, file: &FileDescriptor) -> io::Result<(String, Self::Stream)> {
        Ok((slot_name(slot, file), io::sink()))
    }
}

// ── Demultiplexer ────────────────────────────────────────────────────────────

/// Final accounting for one touched slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotSummary {
    pub slot:  Slot,
    pub name:  String,
    pub bytes: u64,
}

/// A flushed stream together with its summary, handed back by
/// [`Demultiplexer::finish`]. Dropping it closes the stream.
#[derive(Debug)]
pub struct Finished<W> {
    pub summary: SlotSummary,
    pub stream:  W,
}

struct OutputStream<W> {
    name:   String,
    writer: W,
    bytes:  u64,
}

pub struct Demultiplexer<S: StreamSink> {
    sink:    S,
    streams: [Option<OutputStream<S::Stream>>; FILE_SLOTS],
}

impl<S: StreamSink> Demultiplexer<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, streams: std::array::from_fn(|_| None) }
    }

    /// Append `record`'s payload to its slot, opening the slot's stream first
    /// if this is the slot's first record.
    pub fn push(&mut self, header: &Superblock, record: &Record) -> io::Result<()> {
        let entry = &mut self.streams[record.slot.index()];
        let stream = match entry {
            Some(stream) => stream,
            None => {
                let (name, writer) = self.sink.create(record.slot, header.file(record.slot))?;
                entry.insert(OutputStream { name, writer, bytes: 0 })
            }
        };
        stream.writer.write_all(&record.payload)?;
        stream.bytes += record.payload.len() as u64;
        Ok(())
    }

    /// Bytes written so far for `slot`; `None` if the slot was never touched.
    pub fn bytes_written(&self, slot: Slot) -> Option<u64> {
        self.streams[slot.index()].as_ref().map(|s| s.bytes)
    }

    /// Slots opened so far, ascending.
    pub fn touched(&self) -> impl Iterator<Item = Slot> + '_ {
        Slot::all().filter(move |s| self.streams[s.index()].is_some())
    }

    /// Flush every open stream and hand them back in slot order.
    pub fn finish(self) -> io::Result<Vec<Finished<S::Stream>>> {
        let mut out = Vec::new();
        for (slot, stream) in Slot::all().zip(self.streams) {
            if let Some(mut stream) = stream {
                stream.writer.flush()?;
                out.push(Finished {
                    summary: SlotSummary { slot, name: stream.name, bytes: stream.bytes },
                    stream:  stream.writer,
                });
            }
        }
        Ok(out)
    }
}
