//! Watched-directory record store.
//!
//! The loader side scans the stream directory and rebuilds the current
//! record set; the writer side appends new record files atomically.

pub mod loader;
pub mod writer;

pub use loader::{LoadConfig, LoadOutcome, RecordLoader};
pub use writer::RecordWriter;
