//! Parse profiler trace logs into a frozen [`TraceStore`].
//!
//! The profiler writes one record per line:
//!
//! ```text
//! VLPROF arg +verilator+prof+threads+window+2
//! VLPROF arg --threads 2
//! VLPROF stat yields 51
//! VLPROF mtask 6 start 1830 end 2132 elapsed 302 predict_time 290 cpu 2 on thread 1
//! rdtsc time = 8192 ticks
//! ```
//!
//! Lines starting with `#` are comments. Anything else is kept aside as
//! unrecognized so `--debug` can echo it; it never fails the parse.

use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use super::error::TraceError;
use super::store::{Interval, TraceStore, TraceStoreBuilder};

static INTERVAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^VLPROF mtask\s+(\d+)\s+start\s+(\d+)\s+end\s+(\d+)\s+elapsed\s+(\d+)\s+predict_time\s+(\d+)\s+cpu\s+(\d+)\s+on thread\s+(\d+)",
    )
    .unwrap()
});

// `+name+value` plusarg form; the name keeps every `+` except the last
static PLUSARG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^VLPROF arg\s+(\S+)\+([0-9.]+)\s*$").unwrap());

static ARG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^VLPROF arg\s+(\S+)\s+([0-9.]+)\s*([A-Za-z%]*)\s*$").unwrap()
});

static STAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^VLPROF stat\s+(\S+)\s+([0-9.]+(?:[eE][-+]?[0-9]+)?)\s*$").unwrap()
});

static CYCLE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"rdtsc time = (\d+) ticks").unwrap());

/// A line no record pattern matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognizedLine {
    pub line: usize,
    pub text: String,
}

/// Everything ingestion produces: the frozen store plus the global bags.
#[derive(Debug, Default)]
pub struct IngestResult {
    pub store: TraceStore,
    /// Argument echo, in the order the profiler printed it
    pub args: IndexMap<String, String>,
    /// Named counters such as `yields`
    pub stats: IndexMap<String, f64>,
    /// Ticks per unit of trace time, when the profiler reported it
    pub cycle_time: Option<u64>,
    pub unrecognized: Vec<UnrecognizedLine>,
}

impl IngestResult {
    /// Yield counter, 0 when the profiler did not report one.
    pub fn yields(&self) -> u64 {
        self.stats.get("yields").map_or(0, |&v| v as u64)
    }
}

/// Read and parse a trace file.
pub fn read_trace(path: &Path) -> Result<IngestResult, TraceError> {
    let content = std::fs::read_to_string(path).map_err(|source| TraceError::ReadInput {
        path: path.to_path_buf(),
        source,
    })?;
    let result = parse_lines(&content)?;
    log::info!(
        "Read {} intervals from {}",
        result.store.intervals().len(),
        path.display()
    );
    Ok(result)
}

/// Parse trace text. Any malformed interval aborts the whole parse.
pub fn parse_lines(input: &str) -> Result<IngestResult, TraceError> {
    let mut builder = TraceStoreBuilder::new();
    let mut result = IngestResult::default();

    for (idx, raw) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end();

        if line.trim_start().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        if let Some(caps) = INTERVAL_RE.captures(line) {
            let field = |i: usize| number::<u64>(line_no, &caps[i]);
            let interval = Interval {
                task: field(1)?,
                start: field(2)?,
                end: field(3)?,
                predicted: field(5)?,
                cpu: field(6)?,
                thread: field(7)?,
            };
            let elapsed = field(4)?;
            if interval.end >= interval.start && elapsed != interval.end - interval.start {
                log::debug!(
                    "line {line_no}: elapsed {elapsed} differs from end-start {}",
                    interval.end - interval.start
                );
            }
            builder.push(line_no, interval)?;
        } else if let Some(caps) = PLUSARG_RE.captures(line) {
            result.args.insert(caps[1].to_string(), caps[2].to_string());
        } else if let Some(caps) = ARG_RE.captures(line) {
            result
                .args
                .insert(caps[1].to_string(), format!("{}{}", &caps[2], &caps[3]));
        } else if let Some(caps) = STAT_RE.captures(line) {
            let value = number::<f64>(line_no, &caps[2])?;
            result.stats.insert(caps[1].to_string(), value);
        } else if let Some(caps) = CYCLE_TIME_RE.captures(line) {
            result.cycle_time = Some(number::<u64>(line_no, &caps[1])?);
        } else {
            log::debug!("line {line_no}: unrecognized: {line}");
            result.unrecognized.push(UnrecognizedLine {
                line: line_no,
                text: line.to_string(),
            });
        }
    }

    result.store = builder.finish();
    Ok(result)
}

fn number<T: FromStr>(line: usize, text: &str) -> Result<T, TraceError> {
    text.parse().map_err(|_| TraceError::InvalidNumber {
        line,
        text: text.to_string(),
    })
}
