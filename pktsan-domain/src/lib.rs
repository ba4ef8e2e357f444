// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # pktsan-domain
//!
//! Pure types and trait seams for the pktsan capture-sanitization pipeline:
//! no file I/O, no packet parsing, no third-party capture format crates.
//! Everything here is infrastructure-agnostic enough to unit test without a
//! single byte of a real capture file.
//!
//! - [`error`] — [`error::PktsanError`], the flat categorized error enum.
//! - [`value_objects`] — flow keys, TLS record shapes, preservation masks,
//!   IP mapping tables, stage statistics, and configuration structs.
//! - [`repositories`] — the [`repositories::Stage`] and
//!   [`repositories::ProgressObserver`] traits the infrastructure crate
//!   implements.

pub mod error;
pub mod repositories;
pub mod value_objects;

pub use error::PktsanError;
pub use repositories::{LogLevel, NullProgressObserver, ProgressEvent, ProgressObserver, Stage};
