// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publish-time transformation of raw result payloads.
//!
//! Result payloads arrive as instrumentation status streams. Before a
//! payload is handed to the event sink it is normalized to CRLF line
//! endings, and a synthetic `configuration=` status field is injected ahead
//! of each per-test status block so the downstream parser can attribute
//! every test to the configuration instance it ran on.

/// The line prefix that opens a per-test status block.
const TEST_STATUS_MARKER: &str = "INSTRUMENTATION_STATUS: test=";

/// The synthetic field injected ahead of each per-test status block.
const CONFIGURATION_FIELD: &str = "INSTRUMENTATION_STATUS: configuration=";

/// Transforms a raw result payload for publishing.
pub fn prepare_for_publish(raw: &str, configuration_display: &str) -> String {
    let normalized = raw.replace("\r\n", "\n");
    let mut out = String::with_capacity(normalized.len() + 4 * configuration_display.len());
    let mut first = true;
    for line in normalized.split('\n') {
        if !first {
            out.push_str("\r\n");
        }
        first = false;
        if line.starts_with(TEST_STATUS_MARKER) {
            out.push_str(CONFIGURATION_FIELD);
            out.push_str(configuration_display);
            out.push_str("\r\n");
        }
        out.push_str(line);
    }
    out
}
