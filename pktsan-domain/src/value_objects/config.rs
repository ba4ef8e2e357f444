// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Pipeline configuration surface: which stages run and their parameters.
//! This struct is the boundary the CLI/GUI layers are expected to produce;
//! the core only consumes it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DedupConfig {
    pub enabled: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { enabled: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnonConfig {
    pub enabled: bool,
}

impl Default for AnonConfig {
    fn default() -> Self {
        Self { enabled: false }
    }
}

/// Per-content-type preservation policy for the Mask stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct MaskPreservePolicy {
    pub handshake: bool,
    pub alert: bool,
    pub change_cipher_spec: bool,
    pub heartbeat: bool,
    /// When `false` (the default), application-data records are zeroed
    /// beyond their 5-byte header. When `true`, they are preserved whole.
    pub application_data: bool,
}

impl Default for MaskPreservePolicy {
    fn default() -> Self {
        Self {
            handshake: true,
            alert: true,
            change_cipher_spec: true,
            heartbeat: true,
            application_data: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MaskConfig {
    pub enabled: bool,
    #[serde(default)]
    pub preserve: MaskPreservePolicy,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            preserve: MaskPreservePolicy::default(),
        }
    }
}

/// Top-level configuration consumed by the pipeline executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub anon: AnonConfig,
    #[serde(default)]
    pub mask: MaskConfig,
}

impl PipelineConfig {
    /// A configuration with no stage enabled is invalid: refuse to start
    /// rather than run a no-op pipeline.
    pub fn validate(&self) -> Result<(), String> {
        if !self.dedup.enabled && !self.anon.enabled && !self.mask.enabled {
            return Err("no stages enabled".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_preserve_defaults_match_spec_table() {
        let policy = MaskPreservePolicy::default();
        assert!(policy.handshake);
        assert!(policy.alert);
        assert!(policy.change_cipher_spec);
        assert!(policy.heartbeat);
        assert!(!policy.application_data);
    }

    #[test]
    fn rejects_configuration_with_no_stages_enabled() {
        let cfg = PipelineConfig::default();
        assert!(cfg.validate().is_err());
    }
}
