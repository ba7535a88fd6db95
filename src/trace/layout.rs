//! Timeline layout: map intervals onto a fixed character grid.
//!
//! Each thread becomes one row of [`Cell`]s where a cell covers
//! `time_per_char` time units. Every interval is drawn as a label such as
//! `[3----]` (the CPU id padded to the interval's column span). When labels
//! collide at a coarse scale the row degrades to start markers (`[`),
//! multi-start markers (`&`) and filler (`x`) instead of failing.
//!
//! When no scale is requested, [`choose_scale`] halves a candidate scale
//! until a trial grid has no collisions, then halves once more to leave room
//! for the label text.

use std::fmt::Write as _;

use super::store::TraceStore;

/// Columns the automatic scale search starts from.
const TARGET_COLUMNS: u64 = 40;

/// The automatic search stops shrinking once the scale reaches this floor.
const SEARCH_FLOOR: u64 = 10;

/// How labels wider than their interval's column span are drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum LabelPolicy {
    /// Draw the whole label, running past the interval's last column
    #[default]
    Overflow,
    /// Clip the label to the interval's column span
    Truncate,
}

/// Layout settings supplied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutOptions {
    /// Explicit time units per column; `None` or `Some(0)` searches
    pub scale: Option<u64>,
    pub label_policy: LabelPolicy,
}

/// State of one character column in a thread row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    /// CPU id digit, padding dash, or closing bracket of a label
    Label(char),
    /// Start of exactly one interval
    Start,
    /// More than one interval starts within this column's span
    MultiStart,
    /// Overlapped label text that no longer fits at this scale
    Filler,
}

impl Cell {
    pub fn glyph(self) -> char {
        match self {
            Cell::Empty => ' ',
            Cell::Label(c) => c,
            Cell::Start => '[',
            Cell::MultiStart => '&',
            Cell::Filler => 'x',
        }
    }

    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }

    /// How many interval starts this cell stands for.
    fn starts(self) -> usize {
        match self {
            Cell::Start => 1,
            Cell::MultiStart => 2,
            _ => 0,
        }
    }
}

/// One thread's row, from column 0 to its last occupied column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRow {
    pub thread: u64,
    pub cells: Vec<Cell>,
}

impl ThreadRow {
    pub fn render(&self) -> String {
        self.cells.iter().map(|c| c.glyph()).collect()
    }
}

/// All thread rows at a single scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    pub time_per_char: u64,
    pub rows: Vec<ThreadRow>,
    /// Labels that had to be collapsed because they overlapped
    pub conflicts: usize,
}

impl Grid {
    /// Widest row in columns.
    pub fn width(&self) -> usize {
        self.rows.iter().map(|r| r.cells.len()).max().unwrap_or(0)
    }

    /// Rows as text, one line per thread, without a trailing newline.
    pub fn render_rows(&self) -> String {
        let mut out = String::new();
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            write!(out, "{}", row.render()).unwrap();
        }
        out
    }
}

/// Pick the scale and build the grid at it.
pub fn layout(store: &TraceStore, options: &LayoutOptions) -> Grid {
    let time_per_char = choose_scale(store, options);
    build_grid(store, time_per_char, options.label_policy)
}

/// Choose the time units per column, searching when no scale was given.
///
/// The result is always at least 1.
pub fn choose_scale(store: &TraceStore, options: &LayoutOptions) -> u64 {
    if let Some(scale) = options.scale.filter(|&s| s > 0) {
        return scale;
    }

    let mut time_per_char = store.total_span() / TARGET_COLUMNS;
    while time_per_char > SEARCH_FLOOR {
        let trial = build_grid(store, time_per_char, options.label_policy);
        if trial.conflicts == 0 {
            break;
        }
        log::debug!(
            "scale {time_per_char}: {} label conflicts, halving",
            trial.conflicts
        );
        time_per_char /= 2;
    }

    // One more step so the CPU ids fit inside their labels
    (time_per_char / 2).max(1)
}

/// Lay out every thread at a fixed scale.
///
/// Deterministic: rows come out in ascending thread order and intervals are
/// placed in ascending start order.
pub fn build_grid(store: &TraceStore, time_per_char: u64, policy: LabelPolicy) -> Grid {
    let time_per_char = time_per_char.max(1);
    let mut conflicts = 0;

    let rows = store
        .thread_ids()
        .map(|thread| {
            let mut cells = Vec::new();
            for interval in store.thread_intervals(thread) {
                let start_col = (interval.start / time_per_char) as usize;
                let end_col = (interval.end / time_per_char) as usize;
                let label = label(interval.cpu, end_col - start_col + 1, policy);
                if place(&mut cells, start_col, &label) {
                    conflicts += 1;
                }
            }
            ThreadRow { thread, cells }
        })
        .collect();

    Grid {
        time_per_char,
        rows,
        conflicts,
    }
}

/// `[` + CPU id, padded with dashes to `width - 1`, then `]`.
fn label(cpu: u64, width: usize, policy: LabelPolicy) -> Vec<Cell> {
    let mut text = format!("[{cpu}");
    while text.len() < width.saturating_sub(1) {
        text.push('-');
    }
    text.push(']');
    if policy == LabelPolicy::Truncate {
        text.truncate(width.max(1));
    }

    text.chars()
        .enumerate()
        .map(|(i, c)| if i == 0 { Cell::Start } else { Cell::Label(c) })
        .collect()
}

/// Place a label at `start_col`, returning whether it conflicted.
///
/// Only the columns after `start_col` count as overlap: the previous
/// interval's closing bracket commonly shares the new start column.
fn place(cells: &mut Vec<Cell>, start_col: usize, label: &[Cell]) -> bool {
    let end_col = start_col + label.len();
    let overlapped =
        (start_col + 1..end_col).any(|c| cells.get(c).is_some_and(|cell| !cell.is_empty()));

    if !overlapped {
        if cells.len() < end_col {
            cells.resize(end_col, Cell::Empty);
        }
        cells[start_col..end_col].copy_from_slice(label);
        return false;
    }

    // An overlap means some cell past start_col is set, so the span exists
    let span_end = end_col.min(cells.len());
    let existing_starts: usize = cells[start_col..span_end].iter().map(|c| c.starts()).sum();

    if existing_starts >= 1 {
        cells[start_col] = Cell::MultiStart;
    } else {
        cells[start_col] = Cell::Start;
        for cell in &mut cells[start_col + 1..span_end] {
            if !cell.is_empty() {
                *cell = Cell::Filler;
            }
        }
    }
    true
}
