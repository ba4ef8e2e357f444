// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Optional, advisory cross-check against `tshark`'s own TLS record-layer
//! boundaries. Never changes the authoritative preservation mask: this is
//! diagnostics only, logged at `debug` when `tshark` disagrees with the
//! internal parser, and a silent no-op when `tshark` isn't on `PATH`.

use std::path::Path;
use std::process::Command;

/// One TLS record boundary as reported by `tshark -T json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsharkRecordBoundary {
    pub frame_number: u32,
    pub content_type: u8,
}

/// Returns `true` if `tshark` is reachable on `PATH`.
pub fn is_available() -> bool {
    Command::new("tshark")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Runs `tshark -T json -x` over `path` and extracts a coarse per-frame TLS
/// content-type list for comparison against the internal parser's view.
/// Returns `None` on any failure — absence or failure of `tshark` must
/// never affect masking correctness.
pub fn cross_check(path: &Path) -> Option<Vec<TsharkRecordBoundary>> {
    if !is_available() {
        return None;
    }
    let output = Command::new("tshark")
        .args(["-T", "json", "-r"])
        .arg(path)
        .args(["-Y", "tls.record.content_type"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).ok()?;
    let frames = json.as_array()?;

    let mut boundaries = Vec::new();
    for frame in frames {
        let frame_number: u32 = frame
            .pointer("/_source/layers/frame/frame.number")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())?;
        let content_type: u8 = frame
            .pointer("/_source/layers/tls/tls.record/tls.record.content_type")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        boundaries.push(TsharkRecordBoundary {
            frame_number,
            content_type,
        });
    }
    Some(boundaries)
}

/// Logs, at `debug`, any frame where `tshark`'s reported content type
/// disagrees with the internal parser's. Takes ownership of both lists
/// since this is a one-shot diagnostic, not a hot path.
pub fn log_disagreements(internal: &[(u32, u8)], tshark: &[TsharkRecordBoundary]) {
    for boundary in tshark {
        if let Some((_, internal_type)) = internal
            .iter()
            .find(|(frame, _)| *frame == boundary.frame_number)
        {
            if *internal_type != boundary.content_type {
                tracing::debug!(
                    frame = boundary.frame_number,
                    internal = internal_type,
                    tshark = boundary.content_type,
                    "internal TLS parser and tshark disagree on record content type"
                );
            }
        }
    }
}
