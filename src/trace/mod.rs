//! Thread profile parsing, analysis and rendering.
//!
//! This module turns a multithreaded simulator's profile (`profile_threads.dat`)
//! into a text gantt report and a VCD waveform. Data flows one way:
//!
//! ```text
//! parse -> TraceStore -> { analyze, layout -> display, vcd }
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use profgantt::trace::{self, GanttOptions};
//!
//! let run = trace::run(&GanttOptions::new("profile_threads.dat"))?;
//! println!("{}", run.report);
//! ```

use std::path::PathBuf;

use crate::topology::{CpuTopology, scheduling_warnings};

pub mod analyze;
pub mod display;
pub mod error;
pub mod layout;
pub mod parse;
pub mod store;
pub mod vcd;

// Re-export main types for convenience
pub use analyze::{CpuUsage, LogRatioStats, TaskRatio, TraceStats, analyze};
pub use display::{Report, render};
pub use error::TraceError;
pub use layout::{Grid, LabelPolicy, LayoutOptions, build_grid, choose_scale, layout};
pub use parse::{IngestResult, UnrecognizedLine, parse_lines, read_trace};
pub use store::{Interval, Task, TraceStore, TraceStoreBuilder};
pub use vcd::{Waveform, encode, write_vcd};

/// Settings for one report run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GanttOptions {
    pub input: PathBuf,
    pub layout: LayoutOptions,
    /// Waveform destination; `None` skips the VCD
    pub vcd: Option<PathBuf>,
    /// Topology source; `None` or an unreadable file skips annotations
    pub cpuinfo: Option<PathBuf>,
}

impl GanttOptions {
    /// Defaults for `input`: automatic scale, no waveform, no topology.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            layout: LayoutOptions::default(),
            vcd: None,
            cpuinfo: None,
        }
    }
}

/// Output of a completed run.
#[derive(Debug)]
pub struct GanttRun {
    pub report: String,
    /// Also rendered at the end of `report`
    pub warnings: Vec<String>,
    pub unrecognized: Vec<UnrecognizedLine>,
    pub stats: TraceStats,
    /// Label conflicts left at the chosen scale
    pub conflicts: usize,
}

/// Read the trace, write the waveform if requested, and render the report.
pub fn run(options: &GanttOptions) -> Result<GanttRun, TraceError> {
    let ingest = read_trace(&options.input)?;
    let stats = analyze(&ingest);
    let grid = layout(&ingest.store, &options.layout);
    log::debug!(
        "Laid out {} threads at {} time units per column ({} conflicts)",
        grid.rows.len(),
        grid.time_per_char,
        grid.conflicts
    );

    if let Some(path) = &options.vcd {
        write_vcd(&encode(&ingest.store), path)?;
    }

    let topology = options.cpuinfo.as_deref().and_then(CpuTopology::read);
    let warnings = scheduling_warnings(&stats, topology.as_ref());
    let report = render(&Report {
        ingest: &ingest,
        stats: &stats,
        grid: &grid,
        topology: topology.as_ref(),
        warnings: &warnings,
    });

    Ok(GanttRun {
        report,
        warnings,
        unrecognized: ingest.unrecognized,
        stats,
        conflicts: grid.conflicts,
    })
}
