// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface Module
//!
//! ```text
//! 1. parser::parse_cli()     Parse CLI with clap
//! 2. validator::validate()   Security validation: path canonicalization, range checks
//! 3. ValidatedCli            Safe, validated arguments ready for pktsan-core
//! ```

pub mod parser;
pub mod validator;

pub use parser::{parse_cli, Cli, Commands};
pub use validator::{ParseError, SecureArgParser};

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub command: ValidatedCommand,
    pub verbose: bool,
    pub log_json: bool,
    pub metrics_addr: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ValidatedCommand {
    Sanitize {
        input: PathBuf,
        output: PathBuf,
        config: Option<PathBuf>,
        dedup: bool,
        anon: bool,
        mask: bool,
        preserve_handshake: Option<bool>,
        preserve_alert: Option<bool>,
        preserve_ccs: Option<bool>,
        preserve_heartbeat: Option<bool>,
        preserve_app_data: Option<bool>,
        dump_mapping: Option<PathBuf>,
        workers: Option<usize>,
    },
    Inspect {
        input: PathBuf,
        json: bool,
    },
    ValidateConfig {
        config: PathBuf,
    },
}

/// Parses and validates CLI arguments in one call.
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    validate_cli(parse_cli())
}

fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    let command = match cli.command {
        Commands::Sanitize {
            input,
            output,
            config,
            dedup,
            anon,
            mask,
            preserve_handshake,
            preserve_alert,
            preserve_ccs,
            preserve_heartbeat,
            preserve_app_data,
            dump_mapping,
            workers,
        } => {
            let validated_input = SecureArgParser::validate_existing_path(&input)?;
            let validated_output = SecureArgParser::validate_output_path(&output)?;
            let validated_config = config.as_deref().map(SecureArgParser::validate_existing_path).transpose()?;
            let validated_dump_mapping = dump_mapping
                .as_deref()
                .map(SecureArgParser::validate_output_path)
                .transpose()?;
            let validated_workers = SecureArgParser::validate_worker_count(workers)?;

            ValidatedCommand::Sanitize {
                input: validated_input,
                output: validated_output,
                config: validated_config,
                dedup,
                anon,
                mask,
                preserve_handshake,
                preserve_alert,
                preserve_ccs,
                preserve_heartbeat,
                preserve_app_data,
                dump_mapping: validated_dump_mapping,
                workers: validated_workers,
            }
        }
        Commands::Inspect { input, json } => {
            let validated_input = SecureArgParser::validate_existing_path(&input)?;
            ValidatedCommand::Inspect {
                input: validated_input,
                json,
            }
        }
        Commands::ValidateConfig { config } => {
            let validated_config = SecureArgParser::validate_existing_path(&config)?;
            ValidatedCommand::ValidateConfig { config: validated_config }
        }
    };

    Ok(ValidatedCli {
        command,
        verbose: cli.verbose,
        log_json: cli.log_json,
        metrics_addr: cli.metrics_addr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn rejects_sanitize_with_nonexistent_input() {
        let cli = Cli::try_parse_from(["pktsan", "sanitize", "/no/such.pcap", "-o", "out.pcap", "--dedup"]).unwrap();
        let result = validate_cli(cli);
        assert!(result.is_err());
    }

    #[test]
    fn accepts_sanitize_with_existing_input() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("out.pcap");
        let cli = Cli::try_parse_from([
            "pktsan",
            "sanitize",
            file.path().to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--dedup",
        ])
        .unwrap();
        assert!(validate_cli(cli).is_ok());
    }
}
