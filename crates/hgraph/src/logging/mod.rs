// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compile-time configurable logging.
//!
//! Four severity macros: `debug!`, `info!`, `warn!`, `error!`. With the
//! `logging` cargo feature disabled every macro expands to an empty
//! expression, so release builds that do not want a logger pay nothing.
//!
//! ```ignore
//! use hgraph::logging::{init_logger, ConsoleOutput, LogLevel};
//! use std::sync::Arc;
//!
//! init_logger(Arc::new(ConsoleOutput::new(LogLevel::Info)), LogLevel::Info);
//! hgraph::info!("session opened, {} well-known ids", 21);
//! ```

#[cfg(feature = "logging")]
pub mod logger;
#[cfg(feature = "logging")]
mod output;

#[cfg(feature = "logging")]
pub use logger::{flush_logger, init_logger};
#[cfg(feature = "logging")]
pub use output::{ConsoleOutput, FileOutput, LogLevel, Output};

/// Debug-level log message. Formatted like `println!`.
#[macro_export]
#[cfg(feature = "logging")]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::logging::logger::log_message(
            $crate::logging::LogLevel::Debug,
            &format!($($arg)*),
        );
    };
}

/// Info-level log message. Formatted like `println!`.
#[macro_export]
#[cfg(feature = "logging")]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::logging::logger::log_message(
            $crate::logging::LogLevel::Info,
            &format!($($arg)*),
        );
    };
}

/// Warning-level log message. Formatted like `println!`.
#[macro_export]
#[cfg(feature = "logging")]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::logging::logger::log_message(
            $crate::logging::LogLevel::Warning,
            &format!($($arg)*),
        );
    };
}

/// Error-level log message. Formatted like `println!`.
#[macro_export]
#[cfg(feature = "logging")]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::logging::logger::log_message(
            $crate::logging::LogLevel::Error,
            &format!($($arg)*),
        );
    };
}

/// No-op debug macro (logging feature disabled).
#[macro_export]
#[cfg(not(feature = "logging"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

/// No-op info macro (logging feature disabled).
#[macro_export]
#[cfg(not(feature = "logging"))]
macro_rules! info {
    ($($arg:tt)*) => {};
}

/// No-op warn macro (logging feature disabled).
#[macro_export]
#[cfg(not(feature = "logging"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}

/// No-op error macro (logging feature disabled).
#[macro_export]
#[cfg(not(feature = "logging"))]
macro_rules! error {
    ($($arg:tt)*) => {};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_compile() {
        crate::debug!("debug {}", 1);
        crate::info!("info {:?}", vec![1, 2]);
        crate::warn!("warn");
        crate::error!("error");
    }
}
