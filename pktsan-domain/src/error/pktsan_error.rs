// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! A flat, categorized error enum for the pktsan pipeline, in the same spirit
//! as a typical domain error taxonomy: every variant carries a human-readable
//! message, conversions from the standard library and `serde_json` are
//! provided for convenience, and each variant is tagged with a recovery
//! policy:
//!
//! - fatal-for-file (input unreadable, write failure, invalid configuration)
//! - fatal-for-pipeline (same, but stops the whole batch)
//! - warning (packet parse error, flow anomaly, TLS parse anomaly, checksum
//!   recompute failure) — recorded but never stops the pipeline.

use thiserror::Error;

/// Domain-specific errors for the pktsan processing system.
#[derive(Error, Debug, Clone)]
pub enum PktsanError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("input unreadable: {0}")]
    InputUnreadable(String),

    #[error("packet parse error: {0}")]
    PacketParseError(String),

    #[error("unsupported encapsulation: {0}")]
    UnsupportedEncapsulation(String),

    #[error("flow anomaly: {0}")]
    FlowAnomaly(String),

    #[error("TLS parse anomaly: {0}")]
    TlsParseAnomaly(String),

    #[error("checksum recomputation failed: {0}")]
    ChecksumRecomputeFailed(String),

    #[error("write error: {0}")]
    WriteError(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PktsanError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for errors that are warnings rather than fatal: the caller
    /// records them in `RunResult::errors` and keeps going rather than
    /// aborting the stage or the pipeline.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            PktsanError::PacketParseError(_)
                | PktsanError::UnsupportedEncapsulation(_)
                | PktsanError::FlowAnomaly(_)
                | PktsanError::TlsParseAnomaly(_)
                | PktsanError::ChecksumRecomputeFailed(_)
        )
    }

    /// Alias for [`Self::is_warning`], matching the error-handling table's
    /// own terminology.
    pub fn is_recoverable(&self) -> bool {
        self.is_warning()
    }

    /// Coarse category, useful for log fields and metrics labels.
    pub fn category(&self) -> &'static str {
        match self {
            PktsanError::InvalidConfiguration(_) => "configuration",
            PktsanError::InputUnreadable(_) => "input",
            PktsanError::PacketParseError(_) => "packet",
            PktsanError::UnsupportedEncapsulation(_) => "encapsulation",
            PktsanError::FlowAnomaly(_) => "flow",
            PktsanError::TlsParseAnomaly(_) => "tls",
            PktsanError::ChecksumRecomputeFailed(_) => "checksum",
            PktsanError::WriteError(_) => "io",
            PktsanError::Io(_) => "io",
            PktsanError::Serialization(_) => "serialization",
            PktsanError::Cancelled(_) => "cancellation",
            PktsanError::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for PktsanError {
    fn from(err: std::io::Error) -> Self {
        PktsanError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PktsanError {
    fn from(err: serde_json::Error) -> Self {
        PktsanError::Serialization(err.to_string())
    }
}
