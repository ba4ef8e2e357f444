// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Configuration
//!
//! Loads [`PipelineConfig`] from a layered source stack, mirroring the
//! teacher's file + environment-variable layering: an optional file (TOML,
//! YAML, or JSON, selected by extension) provides the base, and `PKTSAN_*`
//! environment variables override individual fields (e.g.
//! `PKTSAN_MASK__PRESERVE__APPLICATION_DATA=true`).

use std::path::Path;

use config::{Config, Environment, File};
use pktsan_domain::value_objects::PipelineConfig;
use pktsan_domain::PktsanError;

/// Loads a [`PipelineConfig`] from `path` (if given) layered under
/// `PKTSAN_`-prefixed environment variables, then validates it.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, PktsanError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }
    builder = builder.add_source(Environment::with_prefix("PKTSAN").separator("__"));

    let raw = builder
        .build()
        .map_err(|e| PktsanError::invalid_config(e.to_string()))?;
    let cfg: PipelineConfig = raw
        .try_deserialize()
        .map_err(|e| PktsanError::invalid_config(e.to_string()))?;
    cfg.validate().map_err(PktsanError::invalid_config)?;
    Ok(cfg)
}

/// Loads a default configuration (no file, only environment overrides and
/// struct defaults) and validates it.
pub fn default_config() -> Result<PipelineConfig, PktsanError> {
    load_config(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_toml_file_and_validates() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[dedup]\nenabled = true\n").unwrap();
        let cfg = load_config(Some(file.path())).unwrap();
        assert!(cfg.dedup.enabled);
        assert!(!cfg.anon.enabled);
    }

    #[test]
    fn rejects_config_with_no_stages_enabled() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[dedup]\nenabled = false\n").unwrap();
        assert!(load_config(Some(file.path())).is_err());
    }

    #[test]
    fn missing_file_path_falls_back_to_defaults_and_fails_validation() {
        assert!(default_config().is_err());
    }
}
