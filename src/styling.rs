//! Styling for terminal output.
//!
//! Messages use `color-print` tags; `anstream` strips the escapes when
//! output is not a terminal or `NO_COLOR` is set:
//!
//! ```rust,ignore
//! use profgantt::styling::{eprintln, error_message};
//!
//! eprintln!("{}", error_message("cannot read trace file"));
//! ```

use color_print::cformat;

/// Auto-detecting println that respects NO_COLOR, CLICOLOR_FORCE, and terminal capabilities
pub use anstream::println;

/// Auto-detecting eprintln that respects NO_COLOR, CLICOLOR_FORCE, and terminal capabilities
pub use anstream::eprintln;

/// Error emoji: `cformat!("{ERROR_EMOJI} <red>message</>")`
pub const ERROR_EMOJI: &str = "❌";

/// Warning emoji: `cformat!("{WARNING_EMOJI} <yellow>message</>")`
pub const WARNING_EMOJI: &str = "🟡";

/// Hint emoji: `cformat!("{HINT_EMOJI} <dim>message</>")`
pub const HINT_EMOJI: &str = "💡";

/// Progress emoji: `cformat!("{PROGRESS_EMOJI} <cyan>message</>")`
pub const PROGRESS_EMOJI: &str = "🔄";

/// Format an error message with emoji and red styling
pub fn error_message(content: impl AsRef<str>) -> String {
    cformat!("{ERROR_EMOJI} <red>{}</>", content.as_ref())
}

/// Format a warning message with emoji and yellow styling
pub fn warning_message(content: impl AsRef<str>) -> String {
    cformat!("{WARNING_EMOJI} <yellow>{}</>", content.as_ref())
}

/// Format a hint message with emoji and dim styling
pub fn hint_message(content: impl AsRef<str>) -> String {
    cformat!("{HINT_EMOJI} <dim>{}</>", content.as_ref())
}

/// Format a progress message with emoji and cyan styling
pub fn progress_message(content: impl AsRef<str>) -> String {
    cformat!("{PROGRESS_EMOJI} <cyan>{}</>", content.as_ref())
}

/// Format an error with its cause chain, one cause per line.
pub fn format_error_chain(err: &anyhow::Error) -> String {
    let mut lines = vec![err.to_string()];
    lines.extend(err.chain().skip(1).map(|cause| format!("  caused by: {cause}")));
    lines.join("\n")
}
