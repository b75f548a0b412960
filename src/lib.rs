pub mod checksum;
pub mod superblock;
pub mod block;
pub mod recovery;
pub mod io_stream;
pub mod card;

#[cfg(test)]
mod testutil;

pub use superblock::{Superblock, FileDescriptor, Slot};
pub use block::{Cursor, EntryHeader, SkipReason};
pub use card::{Card, RecoverOptions, RecoverError};
pub use recovery::{decode, scan, Outcome, ScanReport};
