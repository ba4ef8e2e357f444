// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Secure Command-Line Argument Parsing
//!
//! Security-first validation applied after `clap` parsing and before any
//! path or numeric argument reaches the pipeline: length limits, dangerous
//! shell-metacharacter detection, path canonicalization, and protected
//! system directory checks.

use std::path::{Path, PathBuf};
use thiserror::Error;

const MAX_ARG_LENGTH: usize = 1000;
const MAX_PATH_LENGTH: usize = 4096;

const DANGEROUS_PATTERNS: &[&str] = &[
    "~", "$", "`", ";", "&", "|", ">", "<", "\n", "\r", "\0",
];

const PROTECTED_DIRS: &[&str] = &[
    "/etc", "/bin", "/sbin", "/usr/bin", "/usr/sbin", "/boot", "/sys", "/proc", "/dev",
];

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("argument too long (max {MAX_ARG_LENGTH} characters): {0}")]
    ArgumentTooLong(String),

    #[error("dangerous pattern detected in argument: {pattern} in {arg}")]
    DangerousPattern { pattern: String, arg: String },

    #[error("path exceeds maximum length (max {MAX_PATH_LENGTH})")]
    PathTooLong,

    #[error("access to protected system directory denied: {0}")]
    ProtectedDirectory(String),

    #[error("path does not exist: {0}")]
    PathNotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid argument value for {arg}: {reason}")]
    InvalidValue { arg: String, reason: String },
}

/// Security-first argument parser: validates strings and paths the same way
/// regardless of which `clap` subcommand produced them.
pub struct SecureArgParser;

impl SecureArgParser {
    pub fn validate_argument(arg: &str) -> Result<(), ParseError> {
        if arg.len() > MAX_ARG_LENGTH {
            return Err(ParseError::ArgumentTooLong(arg.chars().take(50).collect::<String>() + "..."));
        }
        for pattern in DANGEROUS_PATTERNS {
            if arg.contains(pattern) {
                return Err(ParseError::DangerousPattern {
                    pattern: pattern.to_string(),
                    arg: arg.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validates and canonicalizes a path that must already exist (input
    /// captures, configuration files).
    pub fn validate_existing_path(path: &Path) -> Result<PathBuf, ParseError> {
        let as_str = path.to_string_lossy();
        Self::validate_argument(&as_str).map_err(|e| match e {
            ParseError::ArgumentTooLong(_) => ParseError::InvalidPath(format!("path too long: {as_str}")),
            ParseError::DangerousPattern { pattern, .. } => {
                ParseError::InvalidPath(format!("path contains dangerous pattern '{pattern}': {as_str}"))
            }
            other => other,
        })?;

        let canonical = path.canonicalize().map_err(|e| {
            if !path.exists() {
                ParseError::PathNotFound(as_str.to_string())
            } else {
                ParseError::InvalidPath(format!("{as_str}: {e}"))
            }
        })?;

        Self::check_length_and_protection(&canonical)?;
        Ok(canonical)
    }

    /// Validates a path that need not exist yet (sanitize output, mapping
    /// dump target): string-level checks only, plus protected-directory
    /// rejection against whatever ancestor does exist.
    pub fn validate_output_path(path: &Path) -> Result<PathBuf, ParseError> {
        let as_str = path.to_string_lossy();
        Self::validate_argument(&as_str)?;
        if as_str.len() > MAX_PATH_LENGTH {
            return Err(ParseError::PathTooLong);
        }
        let probe = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = probe {
            if let Ok(canonical_parent) = parent.canonicalize() {
                Self::check_length_and_protection(&canonical_parent)?;
            }
        }
        Ok(path.to_path_buf())
    }

    fn check_length_and_protection(canonical: &Path) -> Result<(), ParseError> {
        if canonical.to_string_lossy().len() > MAX_PATH_LENGTH {
            return Err(ParseError::PathTooLong);
        }
        for protected in PROTECTED_DIRS {
            if canonical.starts_with(protected) {
                return Err(ParseError::ProtectedDirectory(canonical.display().to_string()));
            }
        }
        Ok(())
    }

    pub fn validate_worker_count(workers: Option<usize>) -> Result<Option<usize>, ParseError> {
        if let Some(w) = workers {
            if w == 0 || w > 256 {
                return Err(ParseError::InvalidValue {
                    arg: "workers".to_string(),
                    reason: "must be between 1 and 256".to_string(),
                });
            }
        }
        Ok(workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_safe_arguments() {
        assert!(SecureArgParser::validate_argument("safe-arg").is_ok());
        assert!(SecureArgParser::validate_argument("capture.pcap").is_ok());
        assert!(SecureArgParser::validate_argument("path/to/file").is_ok());
    }

    #[test]
    fn rejects_too_long_arguments() {
        let long_arg = "a".repeat(MAX_ARG_LENGTH + 1);
        assert!(matches!(
            SecureArgParser::validate_argument(&long_arg),
            Err(ParseError::ArgumentTooLong(_))
        ));
    }

    #[test]
    fn detects_dangerous_patterns() {
        for arg in ["$(whoami)", "`ls`", "file;rm -rf /", "file&bg", "file|pipe", "file>out", "file<in"] {
            assert!(
                matches!(SecureArgParser::validate_argument(arg), Err(ParseError::DangerousPattern { .. })),
                "failed to detect dangerous pattern in: {arg}"
            );
        }
    }

    #[test]
    fn rejects_nonexistent_input_path() {
        let result = SecureArgParser::validate_existing_path(Path::new("/no/such/capture.pcap"));
        assert!(matches!(result, Err(ParseError::PathNotFound(_)) | Err(ParseError::InvalidPath(_))));
    }

    #[test]
    fn accepts_existing_input_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = SecureArgParser::validate_existing_path(file.path());
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_protected_directory() {
        let result = SecureArgParser::validate_output_path(Path::new("/etc/pktsan-out.pcap"));
        assert!(matches!(result, Err(ParseError::ProtectedDirectory(_))));
    }

    #[test]
    fn enforces_worker_count_range() {
        assert!(SecureArgParser::validate_worker_count(Some(0)).is_err());
        assert!(SecureArgParser::validate_worker_count(Some(300)).is_err());
        assert!(SecureArgParser::validate_worker_count(Some(8)).unwrap() == Some(8));
        assert!(SecureArgParser::validate_worker_count(None).unwrap().is_none());
    }
}
