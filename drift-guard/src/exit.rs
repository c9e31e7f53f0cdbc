//! Exit-status contract.
//!
//! Automation must be able to distinguish "drift detected" from "could
//! not run", so fatal failures map to a code of their own. This module
//! only computes codes; process termination belongs to the shell layer
//! consuming the report.

use crate::error::DriftError;
use crate::report::{CheckStatus, Report};

/// No drift: every check passed.
pub const EXIT_PASS: u8 = 0;
/// Drift detected, or checks could not be decided.
pub const EXIT_DRIFT: u8 = 1;
/// Fatal run failure (connection or schema parse); no report exists.
pub const EXIT_FATAL: u8 = 2;

impl Report {
    /// Process-level status code for this report.
    pub fn exit_code(&self) -> u8 {
        match self.status {
            CheckStatus::Pass => EXIT_PASS,
            _ => EXIT_DRIFT,
        }
    }
}

/// Maps a full run outcome to the process-level status code.
///
/// # Examples
///
/// ```rust
/// use drift_guard::error::DriftError;
/// use drift_guard::exit::{exit_code, EXIT_FATAL};
///
/// let outcome = Err(DriftError::connection("orders_db", "refused"));
/// assert_eq!(exit_code(&outcome), EXIT_FATAL);
/// ```
pub fn exit_code(outcome: &Result<Report, DriftError>) -> u8 {
    match outcome {
        Ok(report) => report.exit_code(),
        Err(_) => EXIT_FATAL,
    }
}
