// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decode robustness: arbitrary bytes must produce a value or an error,
//! never a panic, an abort, or runaway allocation.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(reader) = hgraph::Reader::new(data) {
        let _ = reader.read();
    }
});
