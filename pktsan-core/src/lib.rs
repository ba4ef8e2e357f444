// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # pktsan-core
//!
//! Infrastructure for the pktsan packet sanitization pipeline: capture
//! file I/O (`io`), encapsulation-stack walking (`layers`), the three
//! sanitization stages (`stages`), ambient configuration/logging/metrics
//! (`infrastructure`), and the stage-chain orchestration that ties them
//! together into a runnable pipeline (`pipeline`).
//!
//! `pktsan-domain` defines the types and traits this crate implements
//! against; nothing here should leak infrastructure details back into the
//! domain crate.

pub mod infrastructure;
pub mod io;
pub mod layers;
pub mod pipeline;
pub mod stages;
