//! Trace ingestion and output errors.
//!
//! Only failures that abort a run live here. Degenerate data (empty traces,
//! missing topology, zero predictions) is absorbed into zero values by the
//! analysis passes instead of surfacing as an error.

use std::path::PathBuf;

/// Fatal errors raised while reading a trace or writing the waveform.
///
/// The binary converts these into `anyhow::Error`; tests pattern-match on
/// the variants directly.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// The input trace could not be opened or read
    #[error("cannot read trace file {}", path.display())]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The waveform file could not be created or written
    #[error("cannot write waveform file {}", path.display())]
    WriteWaveform {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An interval record ends before it starts
    #[error("line {line}: interval ends at {end} before it starts at {start}")]
    InvalidInterval { line: usize, start: u64, end: u64 },

    /// A numeric field does not fit the integer type
    #[error("line {line}: invalid number '{text}'")]
    InvalidNumber { line: usize, text: String },
}
