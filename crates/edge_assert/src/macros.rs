//! Assertion macros.
//!
//! Every macro takes the handler first (anything that dereferences to an
//! [`AssertHandler`](crate::AssertHandler), such as an `Arc<dyn AssertHandler>`)
//! and evaluates to the condition's boolean so the caller can abort the
//! operation that failed.

#[doc(hidden)]
#[macro_export]
macro_rules! __edge_check {
    ($handler:expr, $level:expr, $cond:expr, $($arg:tt)+) => {{
        let passed: bool = $cond;
        if !passed {
            let message = ::std::format!($($arg)+);
            $crate::report(
                &*$handler,
                &$crate::AssertInfo {
                    condition: ::std::stringify!($cond),
                    message: &message,
                    file: ::std::file!(),
                    line: ::std::line!(),
                    level: $level,
                },
            );
        }
        passed
    }};
}

/// Checks `cond` at `Error` severity in every build configuration.
#[macro_export]
macro_rules! edge_verify {
    ($handler:expr, $cond:expr, $($arg:tt)+) => {
        $crate::__edge_check!($handler, $crate::AssertLevel::Error, $cond, $($arg)+)
    };
}

/// Checks `cond` at `Error` severity in debug builds only.
///
/// In release builds the condition is not evaluated and the macro yields
/// `true`.
#[macro_export]
macro_rules! edge_assert {
    ($handler:expr, $cond:expr, $($arg:tt)+) => {
        if ::std::cfg!(debug_assertions) {
            $crate::__edge_check!($handler, $crate::AssertLevel::Error, $cond, $($arg)+)
        } else {
            true
        }
    };
}

/// Checks `cond` at `Fatal` severity.
#[macro_export]
macro_rules! edge_assert_fatal {
    ($handler:expr, $cond:expr, $($arg:tt)+) => {
        $crate::__edge_check!($handler, $crate::AssertLevel::Fatal, $cond, $($arg)+)
    };
}

/// Checks `cond` at `Warning` severity.
#[macro_export]
macro_rules! edge_assert_warn {
    ($handler:expr, $cond:expr, $($arg:tt)+) => {
        $crate::__edge_check!($handler, $crate::AssertLevel::Warning, $cond, $($arg)+)
    };
}

/// Emits an `Info` report unconditionally.
#[macro_export]
macro_rules! edge_message {
    ($handler:expr, $($arg:tt)+) => {{
        let message = ::std::format!($($arg)+);
        $crate::report(
            &*$handler,
            &$crate::AssertInfo {
                condition: "message",
                message: &message,
                file: ::std::file!(),
                line: ::std::line!(),
                level: $crate::AssertLevel::Info,
            },
        );
    }};
}
