//! Record recovery: the single-step walker and the block-range scanner that
//! drives it.

pub mod walker;
pub mod scanner;

pub use walker::{decode, Decoded, Outcome, Record};
pub use scanner::{scan, ProgressFn, ScanReport, SkipCounts};
