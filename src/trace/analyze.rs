//! Scheduling efficiency and prediction accuracy over a frozen trace.

use super::parse::IngestResult;
use super::store::{Task, TraceStore};

/// Log-ratio of predicted to measured duration for one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRatio {
    pub task: u64,
    pub log_ratio: f64,
    /// Prediction as used in the ratio (zero predictions count as 1)
    pub predicted: u64,
    pub elapsed: u64,
}

/// Distribution of `ln(predicted / elapsed)` across tasks.
///
/// Every field is zero (and min/max are `None`) when no task ran for a
/// nonzero time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogRatioStats {
    pub count: usize,
    pub min: Option<TaskRatio>,
    pub max: Option<TaskRatio>,
    pub mean: f64,
    /// Population standard deviation
    pub stddev: f64,
    pub exp_stddev: f64,
}

/// Busy time of one CPU, optionally as a fraction of the cycle time.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuUsage {
    pub id: u64,
    pub busy_time: u64,
    pub utilization: Option<f64>,
}

/// Complete statistics for one trace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceStats {
    pub thread_count: usize,
    pub task_count: usize,
    pub cpu_count: usize,
    pub yields: u64,
    pub total_span: u64,
    pub longest_task_time: u64,
    pub all_thread_task_time: u64,
    pub longest_thread_efficiency: f64,
    pub all_thread_efficiency: f64,
    pub speedup: f64,
    pub log_ratio: LogRatioStats,
    pub cpus: Vec<CpuUsage>,
}

/// Reduce an ingested trace to its summary statistics.
pub fn analyze(ingest: &IngestResult) -> TraceStats {
    let store = &ingest.store;
    let tasks = store.tasks();

    let thread_count = store.thread_count();
    let total_span = store.total_span();
    let longest_task_time = tasks.iter().map(|t| t.elapsed_total).max().unwrap_or(0);
    let all_thread_task_time = tasks
        .iter()
        .fold(0u64, |total, t| total.saturating_add(t.elapsed_total));

    let longest_thread_efficiency = ratio(longest_task_time as f64, total_span as f64);
    let all_thread_efficiency = ratio(
        all_thread_task_time as f64,
        total_span as f64 * thread_count as f64,
    );

    TraceStats {
        thread_count,
        task_count: tasks.len(),
        cpu_count: store.cpu_count(),
        yields: ingest.yields(),
        total_span,
        longest_task_time,
        all_thread_task_time,
        longest_thread_efficiency,
        all_thread_efficiency,
        speedup: all_thread_efficiency * thread_count as f64,
        log_ratio: compute_log_ratio(&tasks),
        cpus: compute_cpu_usage(store, ingest.cycle_time),
    }
}

// Float math: spans near `u64::MAX` times the thread count overflow integers
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Log-ratio distribution over tasks that ran, in ascending task order.
fn compute_log_ratio(tasks: &[Task]) -> LogRatioStats {
    let ratios: Vec<TaskRatio> = tasks
        .iter()
        .filter(|t| t.elapsed_total > 0)
        .map(|t| {
            let predicted = t.predicted_duration.max(1);
            TaskRatio {
                task: t.id,
                log_ratio: (predicted as f64 / t.elapsed_total as f64).ln(),
                predicted,
                elapsed: t.elapsed_total,
            }
        })
        .collect();

    if ratios.is_empty() {
        return LogRatioStats::default();
    }

    let count = ratios.len() as f64;
    let mean = ratios.iter().map(|r| r.log_ratio).sum::<f64>() / count;
    let variance = ratios
        .iter()
        .map(|r| (r.log_ratio - mean).powi(2))
        .sum::<f64>()
        / count;
    let stddev = variance.sqrt();

    // Strict comparisons keep the first task on ties
    let mut min = &ratios[0];
    let mut max = &ratios[0];
    for r in &ratios[1..] {
        if r.log_ratio < min.log_ratio {
            min = r;
        }
        if r.log_ratio > max.log_ratio {
            max = r;
        }
    }

    LogRatioStats {
        count: ratios.len(),
        min: Some(min.clone()),
        max: Some(max.clone()),
        mean,
        stddev,
        exp_stddev: stddev.exp(),
    }
}

fn compute_cpu_usage(store: &TraceStore, cycle_time: Option<u64>) -> Vec<CpuUsage> {
    store
        .cpus()
        .into_iter()
        .map(|cpu| CpuUsage {
            id: cpu.id,
            busy_time: cpu.busy_time,
            utilization: cycle_time
                .filter(|&c| c > 0)
                .map(|c| cpu.busy_time as f64 / c as f64),
        })
        .collect()
}
