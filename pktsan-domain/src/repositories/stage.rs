// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stage Interface
//!
//! A stage is a single file-to-file transformation. The executor drives an
//! ordered chain of stages, threading each stage's output path in as the
//! next stage's input path.
//!
//! Domain traits in this crate are synchronous: stage execution is CPU-bound
//! once its input is in memory, and the only suspension points are at
//! file-I/O boundaries, which the infrastructure layer handles however it
//! sees fit (a blocking call from a `tokio::task::spawn_blocking`, a plain
//! thread, or a `rayon` job when running a batch).

use std::path::Path;

use crate::error::PktsanError;
use crate::value_objects::StageStats;

/// A single pipeline stage: Dedup, Anon, or Mask.
///
/// Implementations live in the infrastructure crate, since producing a
/// `StageStats` requires reading and writing capture files.
pub trait Stage: Send {
    /// A short, stable name for logging and statistics (e.g. `"dedup"`).
    fn name(&self) -> &'static str;

    /// Runs this stage against `input`, writing its result to `output`.
    ///
    /// On success, `output` contains a complete, valid capture file in the
    /// same format as `input`. On failure, `output` must not be trusted —
    /// callers should not assume it is absent, but it may be partial.
    fn process_file(&mut self, input: &Path, output: &Path) -> Result<StageStats, PktsanError>;

    /// Cooperative cancellation hook: implementations should poll this
    /// periodically (e.g. once per packet) and return
    /// `PktsanError::Cancelled` promptly when it flips to `true`.
    fn set_stop_flag(&mut self, _flag: std::sync::Arc<std::sync::atomic::AtomicBool>) {}
}
