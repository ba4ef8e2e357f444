// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Progress reporting callback, used by both the CLI's console output and
//! any future non-console front end.

use crate::value_objects::StageStats;

/// Milestones the executor reports as a run progresses.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    PipelineStarted { total_files: usize },
    FileStarted { path: String },
    StageFinished { file: String, stats: StageStats },
    FileFinished { path: String },
    PipelineFinished,
    Log { level: LogLevel, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Receives progress events as the pipeline runs. Implementations must not
/// block the calling thread for long: the executor calls this synchronously
/// from the stage-processing loop.
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// An observer that discards every event, for tests and library callers
/// that don't want progress output.
pub struct NullProgressObserver;

impl ProgressObserver for NullProgressObserver {
    fn on_event(&self, _event: ProgressEvent) {}
}
