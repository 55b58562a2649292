//! # Edge Assertions
//!
//! Runtime validation with configurable severity and halting behavior.
//!
//! Subsystems never decide on their own whether a failed check stops the
//! process. They describe the failure as an [`AssertInfo`] and hand it to an
//! [`AssertHandler`]; the handler answers "halt or continue" and [`report`]
//! acts on that answer.
//!
//! ## Severity
//!
//! | Level     | Logged | Halts                                  |
//! |-----------|--------|----------------------------------------|
//! | `Info`    | yes    | never                                  |
//! | `Warning` | yes    | never                                  |
//! | `Error`   | yes    | when the handler breaks on errors      |
//! | `Fatal`   | yes    | always (default handler)               |
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use edge_assert::{edge_verify, CapturingHandler};
//!
//! let handler = Arc::new(CapturingHandler::new());
//! if !edge_verify!(handler, alignment.is_power_of_two(), "bad alignment {alignment}") {
//!     return None;
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

mod handler;
mod macros;

pub use handler::{
    global_handler, reset_global_handler, set_global_handler, AssertCallback, CapturedAssert,
    CapturingHandler, DefaultHandler,
};

use std::fmt;

/// Severity of a failed check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssertLevel {
    /// Informational, never breaks.
    Info,
    /// Logged, execution continues.
    Warning,
    /// Breaks in debug-configured handlers.
    Error,
    /// Always breaks.
    Fatal,
}

impl AssertLevel {
    /// Tag printed in front of formatted reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Info => "[INFO]",
            Self::Warning => "[WARNING]",
            Self::Error => "[ERROR]",
            Self::Fatal => "[FATAL]",
        }
    }
}

/// Everything known about a failed check at the point of detection.
#[derive(Clone, Copy, Debug)]
pub struct AssertInfo<'a> {
    /// Source text of the condition that failed.
    pub condition: &'a str,
    /// Human-readable explanation.
    pub message: &'a str,
    /// Source file of the check.
    pub file: &'a str,
    /// Source line of the check.
    pub line: u32,
    /// Severity.
    pub level: AssertLevel,
}

impl fmt::Display for AssertInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Assertion Failed: {}", self.level.label(), self.condition)?;
        if !self.message.is_empty() {
            write!(f, " ({})", self.message)?;
        }
        write!(f, "\n  at {}:{}", self.file, self.line)
    }
}

/// Decides what happens when a check fails.
///
/// Implementations must be shareable across threads: one handler is usually
/// installed process-wide and cloned into every allocator.
pub trait AssertHandler: Send + Sync {
    /// Handles a failed check. Returns `true` if execution should halt.
    fn handle(&self, info: &AssertInfo<'_>) -> bool;
}

/// Passes `info` to `handler` and halts if the handler asks for it.
pub fn report(handler: &dyn AssertHandler, info: &AssertInfo<'_>) {
    if handler.handle(info) {
        debug_break();
    }
}

/// Stops the process at the point of failure.
///
/// Stable Rust has no portable breakpoint intrinsic, so this aborts; a
/// debugger attached to the process stops on the resulting signal.
pub fn debug_break() -> ! {
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn info(level: AssertLevel, message: &str) -> AssertInfo<'_> {
        AssertInfo {
            condition: "size <= capacity",
            message,
            file: "pool.rs",
            line: 42,
            level,
        }
    }

    #[test]
    fn test_format_with_message() {
        let text = info(AssertLevel::Error, "slot too small").to_string();
        assert_eq!(
            text,
            "[ERROR] Assertion Failed: size <= capacity (slot too small)\n  at pool.rs:42"
        );
    }

    #[test]
    fn test_format_without_message() {
        let text = info(AssertLevel::Fatal, "").to_string();
        assert_eq!(text, "[FATAL] Assertion Failed: size <= capacity\n  at pool.rs:42");
    }

    #[test]
    fn test_verify_passes_silently() {
        let handler = Arc::new(CapturingHandler::new());
        let value = 8usize;
        assert!(crate::edge_verify!(handler, value.is_power_of_two(), "not a power of two"));
        assert_eq!(handler.count(), 0);
    }

    #[test]
    fn test_verify_reports_failure() {
        let handler = Arc::new(CapturingHandler::new());
        let value = 12usize;
        let passed = crate::edge_verify!(handler, value.is_power_of_two(), "got {value}");
        assert!(!passed);

        let reports = handler.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].level, AssertLevel::Error);
        assert_eq!(reports[0].condition, "value.is_power_of_two()");
        assert_eq!(reports[0].message, "got 12");
        assert!(reports[0].file.ends_with("lib.rs"));
    }

    #[test]
    fn test_level_macros() {
        let handler = Arc::new(CapturingHandler::new());
        crate::edge_assert_warn!(handler, false, "warn");
        crate::edge_assert_fatal!(handler, false, "fatal");
        crate::edge_message!(handler, "note {}", 1);

        assert_eq!(handler.count_at(AssertLevel::Warning), 1);
        assert_eq!(handler.count_at(AssertLevel::Fatal), 1);
        assert_eq!(handler.count_at(AssertLevel::Info), 1);
    }

    #[test]
    fn test_debug_only_assert() {
        let handler = Arc::new(CapturingHandler::new());
        let passed = crate::edge_assert!(handler, 1 + 1 == 3, "math");
        if cfg!(debug_assertions) {
            assert!(!passed);
            assert_eq!(handler.count(), 1);
        } else {
            assert!(passed);
            assert_eq!(handler.count(), 0);
        }
    }
}
