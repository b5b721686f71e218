//! # Error Types
//!
//! Custom error types for the drone dashboard using `thiserror`.

use thiserror::Error;

/// Main error type for the drone dashboard
#[derive(Debug, Error)]
pub enum DashboardError {
    /// The telemetry source could not open the connection address
    #[error("Connection failed: {0}")]
    Connection(String),

    /// No autopilot appeared within the bounded wait
    #[error("Timeout waiting for autopilot on {address} after {timeout_secs}s")]
    ConnectionTimeout { address: String, timeout_secs: u64 },

    /// The terminal output surface could not be initialized
    #[error("Failed to initialize terminal: {0}")]
    SurfaceInit(String),

    /// The render task terminated abnormally
    #[error("Render loop error: {0}")]
    Render(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DashboardError {
    /// True for the ConnectionFailure class (address unusable or no peer found).
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            DashboardError::Connection(_) | DashboardError::ConnectionTimeout { .. }
        )
    }
}

/// Result type alias for the drone dashboard
pub type Result<T> = std::result::Result<T, DashboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failure_class() {
        assert!(DashboardError::Connection("bad address".into()).is_connection_failure());
        assert!(DashboardError::ConnectionTimeout {
            address: "udpin:0.0.0.0:14540".into(),
            timeout_secs: 10,
        }
        .is_connection_failure());
        assert!(!DashboardError::SurfaceInit("no tty".into()).is_connection_failure());
    }

    #[test]
    fn test_timeout_message_names_address() {
        let err = DashboardError::ConnectionTimeout {
            address: "udpin:0.0.0.0:14540".into(),
            timeout_secs: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("udpin:0.0.0.0:14540"));
        assert!(msg.contains("10s"));
    }
}
