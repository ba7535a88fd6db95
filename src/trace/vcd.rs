//! Value-change dump (VCD) output for waveform viewers.
//!
//! Every thread, CPU and task gets one integer signal:
//!
//! - `thread<N>_mtask`: task running on the thread
//! - `cpu<N>_thread`: thread running on the CPU
//! - `mtask<N>_cpu`: CPU the task is running on
//!
//! plus a `parallelism` signal counting active intervals. Idle signals are
//! unknown (`bz`), never a numeric placeholder.
//!
//! [`encode`] builds the event stream as plain data; [`Waveform::write_to`]
//! serializes it.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::error::TraceError;
use super::store::TraceStore;

const SCOPE: &str = "gantt";

/// Signal groups, declared in this (alphabetical) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SignalGroup {
    Cpus,
    Stats,
    Tasks,
    Threads,
}

/// One declared signal. `id` is assigned in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub id: usize,
    pub group: SignalGroup,
    /// Thread, CPU or task id the signal belongs to (0 for `parallelism`)
    pub entity: u64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Set(u64),
    Clear,
}

/// A single value change, before same-time changes are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VcdEvent {
    pub time: u64,
    pub signal: usize,
    pub change: Change,
    /// Arena index of the interval that caused it; `None` for `parallelism`
    pub interval: Option<usize>,
}

/// Resolved values at one timestamp, ordered by signal id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub time: u64,
    pub values: Vec<(usize, Option<u64>)>,
}

/// Signals plus their time-ordered events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waveform {
    pub signals: Vec<Signal>,
    pub events: Vec<VcdEvent>,
    /// Bit width shared by every signal, enough for the largest value
    pub width: u32,
}

#[derive(Default)]
struct SignalTable {
    signals: Vec<Signal>,
    index: BTreeMap<(SignalGroup, u64), usize>,
}

impl SignalTable {
    fn get_or_insert(&mut self, group: SignalGroup, entity: u64) -> usize {
        if let Some(&id) = self.index.get(&(group, entity)) {
            return id;
        }
        let id = self.signals.len();
        let name = match group {
            SignalGroup::Cpus => format!("cpu{entity}_thread"),
            SignalGroup::Stats => "parallelism".to_string(),
            SignalGroup::Tasks => format!("mtask{entity}_cpu"),
            SignalGroup::Threads => format!("thread{entity}_mtask"),
        };
        self.signals.push(Signal {
            id,
            group,
            entity,
            name,
        });
        self.index.insert((group, entity), id);
        id
    }
}

/// Convert the trace into signals and value-change events.
pub fn encode(store: &TraceStore) -> Waveform {
    let mut table = SignalTable::default();
    let mut events = Vec::new();
    let mut parallelism: BTreeMap<u64, i64> = BTreeMap::new();

    for thread in store.thread_ids() {
        let thread_signal = table.get_or_insert(SignalGroup::Threads, thread);
        for (index, interval) in store.thread_entries(thread) {
            let cpu_signal = table.get_or_insert(SignalGroup::Cpus, interval.cpu);
            let task_signal = table.get_or_insert(SignalGroup::Tasks, interval.task);

            for (signal, value) in [
                (thread_signal, interval.task),
                (cpu_signal, thread),
                (task_signal, interval.cpu),
            ] {
                events.push(VcdEvent {
                    time: interval.start,
                    signal,
                    change: Change::Set(value),
                    interval: Some(index),
                });
                events.push(VcdEvent {
                    time: interval.end,
                    signal,
                    change: Change::Clear,
                    interval: Some(index),
                });
            }

            *parallelism.entry(interval.start).or_default() += 1;
            *parallelism.entry(interval.end).or_default() -= 1;
        }
    }

    let parallelism_signal = table.get_or_insert(SignalGroup::Stats, 0);
    let mut active: i64 = 0;
    // The first time point always gets a value, even with zero net change
    for (position, (&time, &delta)) in parallelism.iter().enumerate() {
        if delta == 0 && position > 0 {
            continue;
        }
        active += delta;
        events.push(VcdEvent {
            time,
            signal: parallelism_signal,
            change: Change::Set(active as u64),
            interval: None,
        });
    }

    // Stable: same-signal changes keep their emission order
    events.sort_by_key(|e| (e.time, e.signal));

    let max_value = events
        .iter()
        .filter_map(|e| match e.change {
            Change::Set(v) => Some(v),
            Change::Clear => None,
        })
        .max()
        .unwrap_or(0);

    Waveform {
        signals: table.signals,
        events,
        width: (u64::BITS - max_value.leading_zeros()).max(1),
    }
}

impl Waveform {
    /// Merge events into one frame per timestamp.
    ///
    /// A set wins over a clear at the same time unless the clear comes from
    /// the same interval (a zero-length interval). The first frame lists every
    /// signal, with unknown for those not yet driven.
    pub fn frames(&self) -> Vec<Frame> {
        let mut grouped: BTreeMap<u64, BTreeMap<usize, Vec<&VcdEvent>>> = BTreeMap::new();
        for event in &self.events {
            grouped
                .entry(event.time)
                .or_default()
                .entry(event.signal)
                .or_default()
                .push(event);
        }

        let mut frames = Vec::with_capacity(grouped.len());
        for (time, signals) in grouped {
            let mut resolved: BTreeMap<usize, Option<u64>> = signals
                .into_iter()
                .map(|(signal, events)| (signal, resolve(&events)))
                .collect();

            if frames.is_empty() {
                for signal in &self.signals {
                    resolved.entry(signal.id).or_insert(None);
                }
            }

            frames.push(Frame {
                time,
                values: resolved.into_iter().collect(),
            });
        }
        frames
    }

    /// Write the complete VCD document.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "$version Generated by profgantt $end")?;
        writeln!(out, "$timescale 1ns $end")?;
        writeln!(out)?;

        let mut groups: BTreeMap<SignalGroup, Vec<&Signal>> = BTreeMap::new();
        for signal in &self.signals {
            groups.entry(signal.group).or_default().push(signal);
        }

        writeln!(out, " $scope module {SCOPE} $end")?;
        for (group, mut signals) in groups {
            signals.sort_by_key(|s| s.entity);
            writeln!(out, "  $scope module {group} $end")?;
            for signal in signals {
                writeln!(
                    out,
                    "   $var wire {width} v{id:x} {name} [{msb}:0] $end",
                    width = self.width,
                    id = signal.id,
                    name = signal.name,
                    msb = self.width - 1,
                )?;
            }
            writeln!(out, "  $upscope $end")?;
        }
        writeln!(out, " $upscope $end")?;
        writeln!(out, "$enddefinitions $end")?;

        let frames = self.frames();
        if !frames.is_empty() {
            writeln!(out)?;
        }
        for frame in frames {
            writeln!(out, "#{}", frame.time)?;
            for (id, value) in frame.values {
                match value {
                    Some(v) => {
                        writeln!(out, "b{v:0width$b} v{id:x}", width = self.width as usize)?
                    }
                    None => writeln!(out, "bz v{id:x}")?,
                }
            }
        }
        Ok(())
    }
}

fn resolve(events: &[&VcdEvent]) -> Option<u64> {
    let cleared = |interval: Option<usize>| {
        events
            .iter()
            .any(|e| e.change == Change::Clear && e.interval == interval)
    };
    events.iter().rev().find_map(|e| match e.change {
        Change::Set(v) if e.interval.is_none() || !cleared(e.interval) => Some(v),
        _ => None,
    })
}

/// Write the waveform to `path`.
pub fn write_vcd(waveform: &Waveform, path: &Path) -> Result<(), TraceError> {
    let to_error = |source| TraceError::WriteWaveform {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(to_error)?;
    let mut out = BufWriter::new(file);
    waveform.write_to(&mut out).map_err(to_error)?;
    out.flush().map_err(to_error)?;
    log::info!(
        "Wrote {} signals, {} events to {}",
        waveform.signals.len(),
        waveform.events.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::store::Interval;

    fn store(intervals: &[(u64, u64, u64, u64, u64)]) -> TraceStore {
        TraceStore::from_intervals(intervals.iter().map(|&(thread, task, start, end, cpu)| {
            Interval {
                thread,
                task,
                start,
                end,
                cpu,
                predicted: 0,
            }
        }))
        .unwrap()
    }

    fn two_thread_example() -> TraceStore {
        store(&[(0, 1, 0, 10, 0), (1, 2, 0, 5, 1), (1, 3, 5, 10, 1)])
    }

    fn render(waveform: &Waveform) -> String {
        let mut out = Vec::new();
        waveform.write_to(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_two_thread_example_document() {
        let expected = [
            "$version Generated by profgantt $end",
            "$timescale 1ns $end",
            "",
            " $scope module gantt $end",
            "  $scope module cpus $end",
            "   $var wire 2 v1 cpu0_thread [1:0] $end",
            "   $var wire 2 v4 cpu1_thread [1:0] $end",
            "  $upscope $end",
            "  $scope module stats $end",
            "   $var wire 2 v7 parallelism [1:0] $end",
            "  $upscope $end",
            "  $scope module tasks $end",
            "   $var wire 2 v2 mtask1_cpu [1:0] $end",
            "   $var wire 2 v5 mtask2_cpu [1:0] $end",
            "   $var wire 2 v6 mtask3_cpu [1:0] $end",
            "  $upscope $end",
            "  $scope module threads $end",
            "   $var wire 2 v0 thread0_mtask [1:0] $end",
            "   $var wire 2 v3 thread1_mtask [1:0] $end",
            "  $upscope $end",
            " $upscope $end",
            "$enddefinitions $end",
            "",
            "#0",
            "b01 v0",
            "b00 v1",
            "b00 v2",
            "b10 v3",
            "b01 v4",
            "b01 v5",
            "bz v6",
            "b10 v7",
            "#5",
            "b11 v3",
            "b01 v4",
            "bz v5",
            "b01 v6",
            "#10",
            "bz v0",
            "bz v1",
            "bz v2",
            "bz v3",
            "bz v4",
            "bz v6",
            "b00 v7",
            "",
        ]
        .join("\n");

        assert_eq!(render(&encode(&two_thread_example())), expected);
    }

    #[test]
    fn test_empty_store_has_no_value_section() {
        let waveform = encode(&TraceStore::default());
        let output = render(&waveform);

        assert!(waveform.events.is_empty());
        assert!(output.ends_with("$enddefinitions $end\n"));
        assert!(!output.contains('#'));
        assert!(output.contains("parallelism"));
    }

    #[test]
    fn test_one_set_and_one_clear_per_interval_signal() {
        let store = two_thread_example();
        let waveform = encode(&store);

        for (index, interval) in store.intervals().iter().enumerate() {
            let own: Vec<&VcdEvent> = waveform
                .events
                .iter()
                .filter(|e| e.interval == Some(index))
                .collect();
            assert_eq!(own.len(), 6);

            let sets: Vec<_> = own.iter().filter(|e| matches!(e.change, Change::Set(_))).collect();
            let clears: Vec<_> = own.iter().filter(|e| e.change == Change::Clear).collect();
            assert_eq!(sets.len(), 3);
            assert_eq!(clears.len(), 3);
            assert!(sets.iter().all(|e| e.time == interval.start));
            assert!(clears.iter().all(|e| e.time == interval.end));
        }
    }

    #[test]
    fn test_parallelism_tracks_active_intervals() {
        let store = store(&[
            (0, 1, 0, 10, 0),
            (1, 2, 2, 6, 1),
            (2, 3, 4, 12, 2),
            (1, 4, 6, 9, 1),
        ]);
        let waveform = encode(&store);
        let parallelism = parallelism_id(&waveform);

        let mut current = None;
        for frame in waveform.frames() {
            if let Some(&(_, value)) = frame.values.iter().find(|(id, _)| *id == parallelism) {
                current = value;
            }
            let expected = store
                .intervals()
                .iter()
                .filter(|i| i.start <= frame.time && frame.time < i.end)
                .count() as u64;
            assert_eq!(current, Some(expected), "at time {}", frame.time);
        }
    }

    #[test]
    fn test_events_are_time_ordered() {
        let waveform = encode(&store(&[(1, 5, 30, 40, 0), (0, 6, 0, 35, 1), (0, 7, 35, 50, 0)]));
        let keys: Vec<(u64, usize)> = waveform.events.iter().map(|e| (e.time, e.signal)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    fn parallelism_id(waveform: &Waveform) -> usize {
        waveform
            .signals
            .iter()
            .find(|s| s.name == "parallelism")
            .unwrap()
            .id
    }

    #[test]
    fn test_zero_length_interval_leaves_signal_unknown() {
        let waveform = encode(&store(&[(0, 1, 5, 5, 0)]));
        let parallelism = parallelism_id(&waveform);
        let frames = waveform.frames();

        assert_eq!(frames.len(), 1);
        for &(id, value) in &frames[0].values {
            if id == parallelism {
                assert_eq!(value, Some(0));
            } else {
                assert_eq!(value, None, "signal v{id:x}");
            }
        }
    }

    #[test]
    fn test_parallelism_starts_at_zero_before_first_busy_interval() {
        let waveform = encode(&store(&[(0, 1, 0, 0, 0), (0, 2, 5, 9, 0)]));
        let parallelism = parallelism_id(&waveform);
        assert_eq!(parallelism, 4);

        let frames = waveform.frames();
        let value_at = |time: u64| {
            frames
                .iter()
                .find(|f| f.time == time)
                .and_then(|f| f.values.iter().find(|(id, _)| *id == parallelism))
                .map(|&(_, value)| value)
        };
        assert_eq!(value_at(0), Some(Some(0)));
        assert_eq!(value_at(5), Some(Some(1)));
        assert_eq!(value_at(9), Some(Some(0)));

        let output = render(&waveform);
        assert!(output.contains("#0\nbz v0\nbz v1\nbz v2\nbz v3\nb00 v4\n"), "{output}");
    }

    #[test]
    fn test_width_covers_largest_id() {
        let waveform = encode(&store(&[(0, 300, 0, 1, 2)]));
        assert_eq!(waveform.width, 9);
        assert!(render(&waveform).contains("b100101100 v0"));
    }

    #[test]
    fn test_write_vcd_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile_threads.vcd");
        write_vcd(&encode(&two_thread_example()), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("$version"));
    }

    #[test]
    fn test_write_vcd_unwritable_path() {
        let err = write_vcd(
            &encode(&TraceStore::default()),
            Path::new("/nonexistent/dir/out.vcd"),
        )
        .unwrap_err();
        assert!(matches!(err, TraceError::WriteWaveform { .. }));
    }
}
