//! CPU topology from `/proc/cpuinfo`-style text.
//!
//! Topology is display-only: it annotates the per-CPU table and feeds the
//! advisory scheduling warnings. A missing or unreadable source simply means
//! no annotations.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::trace::TraceStats;

/// Attributes of one logical processor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuInfo {
    pub processor: u64,
    /// `physical id`
    pub socket: Option<u64>,
    /// `core id`
    pub core: Option<u64>,
    pub model_name: Option<String>,
}

/// Processor attributes keyed by processor index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuTopology {
    cpus: BTreeMap<u64, CpuInfo>,
}

impl CpuTopology {
    /// Read a topology file, returning `None` when it cannot be read or
    /// lists no processors.
    pub fn read(path: &Path) -> Option<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let topology = Self::parse(&content);
                if topology.is_empty() {
                    log::debug!("No processors listed in {}", path.display());
                    return None;
                }
                log::debug!(
                    "Read topology for {} processors from {}",
                    topology.len(),
                    path.display()
                );
                Some(topology)
            }
            Err(e) => {
                log::debug!("No CPU topology from {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Parse `key : value` blocks, each starting at a `processor` line.
    pub fn parse(content: &str) -> Self {
        let mut cpus = BTreeMap::new();
        let mut current: Option<CpuInfo> = None;

        for line in content.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            if key == "processor" {
                if let Some(done) = current.take() {
                    cpus.insert(done.processor, done);
                }
                current = value.parse().ok().map(|processor| CpuInfo {
                    processor,
                    ..Default::default()
                });
                continue;
            }

            match (key, current.as_mut()) {
                ("physical id", Some(cpu)) => cpu.socket = value.parse().ok(),
                ("core id", Some(cpu)) => cpu.core = value.parse().ok(),
                ("model name", Some(cpu)) => cpu.model_name = Some(value.to_string()),
                _ => {}
            }
        }
        if let Some(done) = current {
            cpus.insert(done.processor, done);
        }

        Self { cpus }
    }

    pub fn get(&self, processor: u64) -> Option<&CpuInfo> {
        self.cpus.get(&processor)
    }

    pub fn len(&self) -> usize {
        self.cpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cpus.is_empty()
    }
}

/// Advisory warnings about how the traced threads were placed.
///
/// Topology-derived warnings are skipped when no topology is available.
pub fn scheduling_warnings(stats: &TraceStats, topology: Option<&CpuTopology>) -> Vec<String> {
    let mut warnings = Vec::new();

    if stats.thread_count > stats.cpu_count {
        warnings.push(format!(
            "There were fewer CPUs ({}) than threads ({}); threads were likely time-sliced",
            stats.cpu_count, stats.thread_count
        ));
    }

    let Some(topology) = topology else {
        return warnings;
    };

    let mut cores: BTreeMap<(u64, u64), Vec<u64>> = BTreeMap::new();
    let mut sockets = BTreeSet::new();
    for cpu in &stats.cpus {
        let Some(info) = topology.get(cpu.id) else {
            continue;
        };
        if let Some(socket) = info.socket {
            sockets.insert(socket);
            if let Some(core) = info.core {
                cores.entry((socket, core)).or_default().push(cpu.id);
            }
        }
    }

    for ((socket, core), cpus) in &cores {
        if cpus.len() > 1 {
            let list: Vec<String> = cpus.iter().map(u64::to_string).collect();
            warnings.push(format!(
                "CPUs {} share hyperthreaded core {core} on socket {socket}",
                list.join(", ")
            ));
        }
    }

    if sockets.len() > 1 {
        warnings.push(format!(
            "Threads were scheduled across {} sockets; consider pinning to one socket",
            sockets.len()
        ));
    }

    warnings
}
