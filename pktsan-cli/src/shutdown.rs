// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Shutdown Coordination
//!
//! Listens for Ctrl-C on a dedicated single-threaded `tokio` runtime and
//! flips a [`StopFlag`] the pipeline's stage chain polls between packets
//! and between stages. The core stages themselves stay synchronous and
//! CPU-bound, suspending only at file-I/O boundaries, so the only place
//! `tokio` earns its keep is this signal listener — a poll rather than an
//! async broadcast, since nothing downstream awaits a shutdown future.

use std::thread;

use pktsan_core::pipeline::StopFlag;

/// Spawns a background OS thread running a minimal `tokio` runtime that
/// waits for Ctrl-C, then stops `flag`. The thread is intentionally leaked
/// (it exits with the process) rather than joined: there is nothing
/// meaningful to do with its `JoinHandle` once a single sanitize run ends.
pub fn install_ctrl_c_handler(flag: StopFlag) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::warn!("failed to start ctrl-c listener runtime: {e}");
                return;
            }
        };
        runtime.block_on(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("ctrl-c received, stopping after the current packet/stage");
                flag.stop();
            }
        });
    });
}
