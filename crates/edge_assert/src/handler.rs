//! # Assertion Handlers
//!
//! The stock handlers and the process-wide registry.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::{AssertHandler, AssertInfo, AssertLevel};

/// Host hook invoked for every report seen by a [`DefaultHandler`].
pub type AssertCallback = Box<dyn Fn(&AssertInfo<'_>) + Send + Sync>;

/// Logs through `tracing` and halts according to severity.
///
/// A host callback, if installed, sees every report after it is logged. The
/// callback cannot veto halting: the decision is made by severity alone.
pub struct DefaultHandler {
    /// Whether `Error` reports halt.
    break_on_error: bool,
    /// Optional host hook.
    callback: Option<AssertCallback>,
}

impl DefaultHandler {
    /// Creates a handler that breaks on errors in debug builds only.
    #[must_use]
    pub fn new() -> Self {
        Self {
            break_on_error: cfg!(debug_assertions),
            callback: None,
        }
    }

    /// Overrides whether `Error` reports halt.
    #[must_use]
    pub fn with_break_on_error(mut self, break_on_error: bool) -> Self {
        self.break_on_error = break_on_error;
        self
    }

    /// Installs a host callback.
    #[must_use]
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&AssertInfo<'_>) + Send + Sync + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Returns whether `Error` reports halt.
    #[inline]
    #[must_use]
    pub const fn break_on_error(&self) -> bool {
        self.break_on_error
    }

    /// Returns whether a report at `level` halts under this handler.
    #[must_use]
    pub const fn should_halt(&self, level: AssertLevel) -> bool {
        match level {
            AssertLevel::Fatal => true,
            AssertLevel::Error => self.break_on_error,
            AssertLevel::Warning | AssertLevel::Info => false,
        }
    }
}

impl Default for DefaultHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DefaultHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultHandler")
            .field("break_on_error", &self.break_on_error)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

impl AssertHandler for DefaultHandler {
    fn handle(&self, info: &AssertInfo<'_>) -> bool {
        match info.level {
            AssertLevel::Info => tracing::info!("{info}"),
            AssertLevel::Warning => tracing::warn!("{info}"),
            AssertLevel::Error | AssertLevel::Fatal => tracing::error!("{info}"),
        }

        if let Some(callback) = &self.callback {
            callback(info);
        }

        self.should_halt(info.level)
    }
}

/// Owned copy of a report, kept by [`CapturingHandler`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedAssert {
    /// Source text of the failed condition.
    pub condition: String,
    /// Explanation.
    pub message: String,
    /// Source file.
    pub file: String,
    /// Source line.
    pub line: u32,
    /// Severity.
    pub level: AssertLevel,
}

impl From<&AssertInfo<'_>> for CapturedAssert {
    fn from(info: &AssertInfo<'_>) -> Self {
        Self {
            condition: info.condition.to_owned(),
            message: info.message.to_owned(),
            file: info.file.to_owned(),
            line: info.line,
            level: info.level,
        }
    }
}

/// Records every report and never halts.
///
/// Useful for hosts that collect diagnostics for display, and for tests that
/// need to observe failure paths without stopping the process.
#[derive(Debug, Default)]
pub struct CapturingHandler {
    reports: Mutex<Vec<CapturedAssert>>,
}

impl CapturingHandler {
    /// Creates an empty handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every report received so far.
    #[must_use]
    pub fn reports(&self) -> Vec<CapturedAssert> {
        self.reports.lock().clone()
    }

    /// Number of reports received.
    #[must_use]
    pub fn count(&self) -> usize {
        self.reports.lock().len()
    }

    /// Number of reports received at `level`.
    #[must_use]
    pub fn count_at(&self, level: AssertLevel) -> usize {
        self.reports.lock().iter().filter(|r| r.level == level).count()
    }

    /// Returns whether any report's message contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.reports.lock().iter().any(|r| r.message.contains(needle))
    }

    /// Removes and returns every report received so far.
    pub fn take(&self) -> Vec<CapturedAssert> {
        std::mem::take(&mut *self.reports.lock())
    }
}

impl AssertHandler for CapturingHandler {
    fn handle(&self, info: &AssertInfo<'_>) -> bool {
        self.reports.lock().push(CapturedAssert::from(info));
        false
    }
}

/// Process-wide handler. `None` means the default has not been created yet.
static GLOBAL_HANDLER: RwLock<Option<Arc<dyn AssertHandler>>> = RwLock::new(None);

/// Returns the process-wide handler, creating a [`DefaultHandler`] on first use.
#[must_use]
pub fn global_handler() -> Arc<dyn AssertHandler> {
    if let Some(handler) = GLOBAL_HANDLER.read().as_ref() {
        return Arc::clone(handler);
    }

    let mut slot = GLOBAL_HANDLER.write();
    let handler = slot.get_or_insert_with(|| Arc::new(DefaultHandler::new()) as Arc<dyn AssertHandler>);
    Arc::clone(handler)
}

/// Replaces the process-wide handler.
///
/// Components that already cloned the previous handler keep using it.
pub fn set_global_handler(handler: Arc<dyn AssertHandler>) {
    *GLOBAL_HANDLER.write() = Some(handler);
}

/// Restores the default process-wide handler.
pub fn reset_global_handler() {
    *GLOBAL_HANDLER.write() = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn info(level: AssertLevel) -> AssertInfo<'static> {
        AssertInfo {
            condition: "ptr.is_some()",
            message: "",
            file: "handler.rs",
            line: 1,
            level,
        }
    }

    #[test]
    fn test_default_halt_policy() {
        let handler = DefaultHandler::new().with_break_on_error(false);
        assert!(!handler.handle(&info(AssertLevel::Info)));
        assert!(!handler.handle(&info(AssertLevel::Warning)));
        assert!(!handler.handle(&info(AssertLevel::Error)));
        assert!(handler.should_halt(AssertLevel::Fatal));

        let strict = DefaultHandler::new().with_break_on_error(true);
        assert!(strict.should_halt(AssertLevel::Error));
        assert!(!strict.should_halt(AssertLevel::Warning));
    }

    #[test]
    fn test_default_breaks_on_error_in_debug() {
        assert_eq!(DefaultHandler::new().break_on_error(), cfg!(debug_assertions));
    }

    #[test]
    fn test_callback_sees_reports() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let handler = DefaultHandler::new()
            .with_break_on_error(false)
            .with_callback(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            });

        handler.handle(&info(AssertLevel::Warning));
        handler.handle(&info(AssertLevel::Error));
        assert_eq!(seen.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_capturing_take_drains() {
        let handler = CapturingHandler::new();
        assert!(!handler.handle(&info(AssertLevel::Fatal)));
        assert_eq!(handler.take().len(), 1);
        assert_eq!(handler.count(), 0);
    }

    #[test]
    fn test_global_registry() {
        let capture = Arc::new(CapturingHandler::new());
        set_global_handler(capture.clone());

        let handler = global_handler();
        crate::report(&*handler, &info(AssertLevel::Error));
        assert_eq!(capture.count(), 1);

        reset_global_handler();
        let fresh = global_handler();
        assert!(!Arc::ptr_eq(&fresh, &handler));
    }
}
