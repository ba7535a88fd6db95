//! Display formatting for the gantt report.

use std::fmt::Write as _;

use super::analyze::TraceStats;
use super::layout::Grid;
use super::parse::IngestResult;
use crate::topology::CpuTopology;

/// Everything the text report draws from.
pub struct Report<'a> {
    pub ingest: &'a IngestResult,
    pub stats: &'a TraceStats,
    pub grid: &'a Grid,
    pub topology: Option<&'a CpuTopology>,
    /// Advisory scheduling warnings, printed after the CPU table
    pub warnings: &'a [String],
}

/// Render the complete report to a string.
pub fn render(report: &Report<'_>) -> String {
    let mut out = String::new();

    render_header(&mut out);
    render_args(&mut out, report.ingest);
    render_gantt(&mut out, report.grid, report.stats.total_span);
    render_analysis(&mut out, report.stats);
    render_log_ratio(&mut out, report.stats);
    render_cpus(&mut out, report.stats, report.topology);
    render_warnings(&mut out, report.warnings);

    out
}

fn render_header(out: &mut String) {
    out.push_str("============================================================\n");
    out.push_str("                   THREAD GANTT REPORT\n");
    out.push_str("============================================================\n");
}

fn render_args(out: &mut String, ingest: &IngestResult) {
    out.push_str("\nARGUMENT SETTINGS\n");
    out.push_str("-----------------\n");
    if ingest.args.is_empty() {
        out.push_str("  (none recorded)\n");
    }
    for (name, value) in &ingest.args {
        writeln!(out, "  {name} {value}").unwrap();
    }
}

fn render_gantt(out: &mut String, grid: &Grid, total_span: u64) {
    out.push_str("\nTHREAD GANTT GRAPH\n");
    out.push_str("------------------\n");
    writeln!(
        out,
        "  Legend: one character width = {} time units",
        grid.time_per_char
    )
    .unwrap();
    out.push_str("  Legend: '&' = multiple tasks start within one character width\n");
    out.push_str("  Legend: 'x' = label text overlapped at this scale\n");

    if grid.rows.is_empty() {
        out.push_str("  (no intervals)\n");
        return;
    }

    let id_width = grid
        .rows
        .iter()
        .map(|r| r.thread.to_string().len())
        .max()
        .unwrap_or(1);
    // "t" + id + one space
    let prefix_width = id_width + 2;

    writeln!(
        out,
        "  {:prefix_width$}{}",
        "",
        ruler(total_span, grid.width())
    )
    .unwrap();
    for row in &grid.rows {
        writeln!(
            out,
            "  t{:<id_width$} {}",
            row.thread,
            row.render().trim_end()
        )
        .unwrap();
    }
}

/// `<-<span> total` padded with dashes so that, with the closing `->`, it
/// spans `width` columns. Never shorter than the label itself.
fn ruler(total_span: u64, width: usize) -> String {
    let mut ruler = format!("<-{total_span} total");
    while ruler.len() + 2 < width {
        ruler.push('-');
    }
    ruler.push_str("->");
    ruler
}

fn render_analysis(out: &mut String, stats: &TraceStats) {
    out.push_str("\nANALYSIS\n");
    out.push_str("--------\n");
    let rows: [(&str, String); 10] = [
        ("Total threads", stats.thread_count.to_string()),
        ("Total tasks", stats.task_count.to_string()),
        ("Total cpus used", stats.cpu_count.to_string()),
        ("Total yields", stats.yields.to_string()),
        ("Total eval time", format!("{} time units", stats.total_span)),
        (
            "Longest task time",
            format!("{} time units", stats.longest_task_time),
        ),
        (
            "All-thread task time",
            format!("{} time units", stats.all_thread_task_time),
        ),
        (
            "Longest-thread efficiency",
            format!("{:.1}%", stats.longest_thread_efficiency * 100.0),
        ),
        (
            "All-thread efficiency",
            format!("{:.1}%", stats.all_thread_efficiency * 100.0),
        ),
        ("All-thread speedup", format!("{:.2}", stats.speedup)),
    ];
    for (name, value) in rows {
        writeln!(out, "  {name:<25} = {value}").unwrap();
    }
}

fn render_log_ratio(out: &mut String, stats: &TraceStats) {
    out.push_str("\nPREDICTION ACCURACY\n");
    out.push_str("-------------------\n");
    let lr = &stats.log_ratio;

    for (label, ratio) in [("min", &lr.min), ("max", &lr.max)] {
        match ratio {
            Some(r) => writeln!(
                out,
                "  {label} log(p2e) = {:.3} from task {} (predict {}, elapsed {})",
                r.log_ratio, r.task, r.predicted, r.elapsed
            )
            .unwrap(),
            None => writeln!(out, "  {label} log(p2e) = {:.3}", 0.0).unwrap(),
        }
    }
    writeln!(out, "  mean         = {:.3}", lr.mean).unwrap();
    writeln!(out, "  stddev       = {:.3}", lr.stddev).unwrap();
    writeln!(out, "  e ^ stddev   = {:.3}", lr.exp_stddev).unwrap();
}

fn render_cpus(out: &mut String, stats: &TraceStats, topology: Option<&CpuTopology>) {
    out.push_str("\nCPUS\n");
    out.push_str("----\n");
    let header = format!(
        "{:>5} {:>12} {:>7} {:>7} {:>5}  {}",
        "CPU", "Busy", "Util", "Socket", "Core", "Model"
    );
    writeln!(out, "{header}").unwrap();

    for cpu in &stats.cpus {
        let info = topology.and_then(|t| t.get(cpu.id));
        let util = cpu
            .utilization
            .map_or_else(|| "-".to_string(), |u| format!("{:.1}%", u * 100.0));
        let socket = info
            .and_then(|i| i.socket)
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        let core = info
            .and_then(|i| i.core)
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        let model = info.and_then(|i| i.model_name.as_deref()).unwrap_or("");

        let line = format!(
            "{:>5} {:>12} {:>7} {:>7} {:>5}  {}",
            cpu.id, cpu.busy_time, util, socket, core, model
        );
        writeln!(out, "{}", line.trim_end()).unwrap();
    }
}

fn render_warnings(out: &mut String, warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    out.push_str("\nWARNINGS\n");
    out.push_str("--------\n");
    for warning in warnings {
        writeln!(out, "  {warning}").unwrap();
    }
}
