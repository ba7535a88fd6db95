//! Render a multithreaded profile as a text gantt report and a VCD waveform.
//!
//! # Usage
//!
//! ```bash
//! # Report on ./profile_threads.dat, writing ./profile_threads.vcd
//! profgantt
//!
//! # Fixed scale, no waveform
//! profgantt run/profile_threads.dat --scale 500 --no-vcd
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use profgantt::styling::{
    eprintln, error_message, format_error_chain, hint_message, println, progress_message,
    warning_message,
};
use profgantt::trace::{self, GanttOptions, LabelPolicy, LayoutOptions};

#[derive(Parser)]
#[command(name = "profgantt")]
#[command(about = "Gantt chart and waveform for a thread profile", long_about = None)]
#[command(version)]
struct Cli {
    /// Profile to read
    #[arg(default_value = "profile_threads.dat")]
    input: PathBuf,

    /// Time units per character column (0 picks automatically)
    #[arg(long, default_value_t = 0)]
    scale: u64,

    /// Waveform output file
    #[arg(long, default_value = "profile_threads.vcd")]
    vcd: PathBuf,

    /// Skip writing the waveform
    #[arg(long, conflicts_with = "vcd")]
    no_vcd: bool,

    /// CPU topology source used to annotate CPUs
    #[arg(long, default_value = "/proc/cpuinfo")]
    cpuinfo: PathBuf,

    /// How to draw labels wider than their interval (overflow, truncate)
    #[arg(long, default_value_t = LabelPolicy::Overflow)]
    label_policy: LabelPolicy,

    /// Show debug logging and unrecognized input lines
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn options(&self) -> GanttOptions {
        GanttOptions {
            input: self.input.clone(),
            layout: LayoutOptions {
                scale: (self.scale > 0).then_some(self.scale),
                label_policy: self.label_policy,
            },
            vcd: (!self.no_vcd).then(|| self.vcd.clone()),
            cpuinfo: Some(self.cpuinfo.clone()),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("{}", error_message(format_error_chain(&e)));
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let options = cli.options();
    let run = trace::run(&options)
        .with_context(|| format!("cannot report on {}", options.input.display()))?;

    if cli.debug {
        for line in &run.unrecognized {
            eprintln!("Unrecognized line {}: {}", line.line, line.text);
        }
    } else if !run.unrecognized.is_empty() {
        eprintln!(
            "{}",
            warning_message(format!(
                "Skipped {} unrecognized lines; run with --debug to list them",
                run.unrecognized.len()
            ))
        );
    }

    println!("{}", run.report);

    if let Some(path) = &options.vcd {
        eprintln!(
            "{}",
            progress_message(format!("Wrote waveform to {}", path.display()))
        );
    }

    if run.conflicts > 0 && options.layout.scale.is_some() {
        eprintln!(
            "{}",
            hint_message(format!(
                "{} labels overlap at this scale; lower --scale to separate them",
                run.conflicts
            ))
        );
    }

    Ok(())
}
