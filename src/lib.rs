pub mod styling;
pub mod topology;
pub mod trace;

// Re-export the report entry points for convenience
pub use trace::{GanttOptions, TraceError};
