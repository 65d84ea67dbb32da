// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global logger state.

use super::output::{LogLevel, Output};
use std::io;
use std::sync::{Arc, OnceLock};

struct Logger {
    sink: Arc<dyn Output>,
    min_level: LogLevel,
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Install the global sink. The first call wins; later calls are ignored.
pub fn init_logger(sink: Arc<dyn Output>, min_level: LogLevel) {
    let _ = LOGGER.set(Logger { sink, min_level });
}

/// Emit a message at the given level. No-op until [`init_logger`] runs.
pub fn log_message(level: LogLevel, message: &str) {
    if let Some(logger) = LOGGER.get() {
        if level >= logger.min_level {
            logger.sink.write(level, message);
        }
    }
}

/// Flush the installed sink.
pub fn flush_logger() -> io::Result<()> {
    match LOGGER.get() {
        Some(logger) => logger.sink.flush(),
        None => Ok(()),
    }
}
