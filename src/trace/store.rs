//! Frozen, indexable record of every parsed interval.
//!
//! Intervals are kept in one flat arena in ingestion order. Threads, tasks
//! and CPUs are secondary indices into that arena, so every downstream pass
//! reads the same immutable data without nested maps of records.

use std::collections::BTreeMap;

use super::error::TraceError;

/// One execution span of a task on a thread, pinned to a CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub thread: u64,
    pub task: u64,
    pub start: u64,
    pub end: u64,
    pub cpu: u64,
    /// Predicted duration carried by the record (feeds the task fold)
    pub predicted: u64,
}

impl Interval {
    /// Time units covered by this interval.
    ///
    /// Stores only ever hold intervals with `end >= start`.
    pub fn duration(&self) -> u64 {
        self.end - self.start
    }
}

/// Aggregate over every interval sharing a task id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: u64,
    /// Sum of interval durations across all executions
    pub elapsed_total: u64,
    /// Prediction from the most recently ingested record
    pub predicted_duration: u64,
    pub max_end: u64,
}

/// Busy time accumulated on one CPU across all threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cpu {
    pub id: u64,
    pub busy_time: u64,
}

/// Append-only handle used during ingestion.
///
/// `finish()` consumes the builder, so nothing can mutate the store once
/// analysis starts.
#[derive(Debug, Default)]
pub struct TraceStoreBuilder {
    intervals: Vec<Interval>,
}

impl TraceStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an interval, rejecting spans that end before they start.
    pub fn push(&mut self, line: usize, interval: Interval) -> Result<(), TraceError> {
        if interval.end < interval.start {
            return Err(TraceError::InvalidInterval {
                line,
                start: interval.start,
                end: interval.end,
            });
        }
        self.intervals.push(interval);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Freeze the arena and build the secondary indices.
    pub fn finish(self) -> TraceStore {
        let intervals = self.intervals;
        let mut by_thread: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
        let mut by_task: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
        let mut by_cpu: BTreeMap<u64, Vec<usize>> = BTreeMap::new();

        for (idx, interval) in intervals.iter().enumerate() {
            by_thread.entry(interval.thread).or_default().push(idx);
            by_task.entry(interval.task).or_default().push(idx);
            by_cpu.entry(interval.cpu).or_default().push(idx);
        }

        // Ties on start keep ingestion order, which keeps layout deterministic
        for indices in by_thread.values_mut() {
            indices.sort_by_key(|&idx| (intervals[idx].start, idx));
        }

        TraceStore {
            intervals,
            by_thread,
            by_task,
            by_cpu,
        }
    }
}

/// Read-only interval arena with per-thread, per-task and per-CPU indices.
#[derive(Debug, Default)]
pub struct TraceStore {
    intervals: Vec<Interval>,
    by_thread: BTreeMap<u64, Vec<usize>>,
    by_task: BTreeMap<u64, Vec<usize>>,
    by_cpu: BTreeMap<u64, Vec<usize>>,
}

impl TraceStore {
    /// Build a store from intervals, numbering them as lines from 1.
    pub fn from_intervals(
        intervals: impl IntoIterator<Item = Interval>,
    ) -> Result<Self, TraceError> {
        let mut builder = TraceStoreBuilder::new();
        for (idx, interval) in intervals.into_iter().enumerate() {
            builder.push(idx + 1, interval)?;
        }
        Ok(builder.finish())
    }

    /// All intervals in ingestion order.
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Thread ids in ascending order.
    pub fn thread_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.by_thread.keys().copied()
    }

    /// Intervals of one thread, sorted by start time.
    pub fn thread_intervals(&self, thread: u64) -> impl Iterator<Item = &Interval> + '_ {
        self.thread_entries(thread).map(|(_, interval)| interval)
    }

    /// Like [`Self::thread_intervals`], paired with each interval's arena index.
    pub fn thread_entries(&self, thread: u64) -> impl Iterator<Item = (usize, &Interval)> + '_ {
        self.by_thread
            .get(&thread)
            .into_iter()
            .flatten()
            .map(|&idx| (idx, &self.intervals[idx]))
    }

    pub fn thread_count(&self) -> usize {
        self.by_thread.len()
    }

    pub fn task_count(&self) -> usize {
        self.by_task.len()
    }

    /// Number of distinct CPUs that ran at least one interval.
    pub fn cpu_count(&self) -> usize {
        self.by_cpu.len()
    }

    /// Whole-trace extent: the latest interval end, or 0 for an empty trace.
    pub fn total_span(&self) -> u64 {
        self.intervals.iter().map(|i| i.end).max().unwrap_or(0)
    }

    /// Fold intervals into task aggregates, ascending by task id.
    pub fn tasks(&self) -> Vec<Task> {
        self.by_task
            .iter()
            .map(|(&id, indices)| {
                indices.iter().map(|&idx| &self.intervals[idx]).fold(
                    Task {
                        id,
                        elapsed_total: 0,
                        predicted_duration: 0,
                        max_end: 0,
                    },
                    |mut task, interval| {
                        task.elapsed_total =
                            task.elapsed_total.saturating_add(interval.duration());
                        task.predicted_duration = interval.predicted;
                        task.max_end = task.max_end.max(interval.end);
                        task
                    },
                )
            })
            .collect()
    }

    /// Busy time per CPU, ascending by CPU id.
    pub fn cpus(&self) -> Vec<Cpu> {
        self.by_cpu
            .iter()
            .map(|(&id, indices)| Cpu {
                id,
                busy_time: indices.iter().fold(0u64, |busy, &idx| {
                    busy.saturating_add(self.intervals[idx].duration())
                }),
            })
            .collect()
    }
}
