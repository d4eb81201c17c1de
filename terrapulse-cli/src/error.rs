//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use terrapulse::config::ConfigError;
use terrapulse::error::{ErrorKind, TaskFailure};
use terrapulse::geo::ValidationError;
use terrapulse::provider::HttpFailure;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Missing or invalid configuration
    Config(ConfigError),
    /// Failed to build the HTTP transport
    Http(HttpFailure),
    /// The request was rejected before submission
    InvalidRequest(ValidationError),
    /// The analysis task reached the Failed state
    AnalysisFailed(TaskFailure),
    /// The task did not settle within the polling deadline
    Timeout(u64),
    /// Failed to write a preview file
    FileWrite { path: String, error: std::io::Error },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Required environment variables:");
                eprintln!("  SH_CLIENT_ID       Sentinel Hub OAuth client id");
                eprintln!("  SH_CLIENT_SECRET   Sentinel Hub OAuth client secret");
                eprintln!("  GOOGLE_API_KEY     Gemini API key (truecolor mode only)");
            }
            CliError::AnalysisFailed(failure) if failure.kind == ErrorKind::AuthFailure => {
                eprintln!();
                eprintln!("The upstream rejected the configured credentials.");
                eprintln!("Check SH_CLIENT_ID / SH_CLIENT_SECRET (or GOOGLE_API_KEY) and retry.");
            }
            CliError::AnalysisFailed(failure) if failure.kind == ErrorKind::NoDataAvailable => {
                eprintln!();
                eprintln!("No usable satellite scene was found for the request.");
                eprintln!("Try different dates or a larger area.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(message) => {
                write!(f, "failed to initialize logging: {}", message)
            }
            CliError::Config(error) => write!(f, "configuration error: {}", error),
            CliError::Http(error) => write!(f, "failed to build HTTP client: {}", error),
            CliError::InvalidRequest(error) => write!(f, "invalid request: {}", error),
            CliError::AnalysisFailed(failure) => write!(f, "analysis failed: {}", failure),
            CliError::Timeout(secs) => {
                write!(f, "task did not finish within {} seconds", secs)
            }
            CliError::FileWrite { path, error } => {
                write!(f, "failed to write {}: {}", path, error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let error = CliError::Timeout(300);
        assert_eq!(error.to_string(), "task did not finish within 300 seconds");

        let error = CliError::InvalidRequest(ValidationError::LongitudeRange(200.0));
        assert!(error.to_string().contains("longitude 200"));
    }

    #[test]
    fn test_analysis_failure_message_carries_kind() {
        let error = CliError::AnalysisFailed(TaskFailure::new(
            ErrorKind::NoDataAvailable,
            "no cloud-free scene",
        ));
        assert!(error.to_string().contains("no_data_available"));
    }
}
