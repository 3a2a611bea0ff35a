//! Error types for twcbus
//!
//! Fetch failures are split into two kinds the scheduler cares about:
//! network failures (the charger did not answer in time, or at all) and
//! protocol failures (it answered with something we could not read).

use thiserror::Error;

/// Result type alias for twcbus operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Main error type for twcbus
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Connection refused, unreachable host, reset mid-transfer
    #[error("Network error: {message}")]
    Network { message: String },

    /// Request exceeded its deadline
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Response body was not the JSON we expected
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// D-Bus communication errors
    #[error("D-Bus error: {message}")]
    DBus { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Serialization/deserialization errors (config files)
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl BridgeError {
    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a new protocol error
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new D-Bus error
    pub fn dbus<S: Into<String>>(message: S) -> Self {
        Self::DBus {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// True for failures where the charger could not be reached.
    ///
    /// Host selection at startup moves on to the next candidate only for
    /// these; anything else means we reached a device and it misbehaved.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for BridgeError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::protocol(err.to_string())
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else if err.is_decode() || err.is_status() {
            Self::protocol(err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

impl From<zbus::Error> for BridgeError {
    fn from(err: zbus::Error) -> Self {
        Self::dbus(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BridgeError::network("refused");
        assert!(matches!(err, BridgeError::Network { .. }));

        let err = BridgeError::protocol("bad json");
        assert!(matches!(err, BridgeError::Protocol { .. }));

        let err = BridgeError::validation("hosts", "empty");
        assert!(matches!(err, BridgeError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = BridgeError::protocol("expected value at line 1");
        assert_eq!(err.to_string(), "Protocol error: expected value at line 1");

        let err = BridgeError::validation("hosts", "must not be empty");
        assert_eq!(err.to_string(), "Validation error: hosts - must not be empty");
    }

    #[test]
    fn test_network_classification() {
        assert!(BridgeError::network("x").is_network());
        assert!(BridgeError::timeout("x").is_network());
        assert!(!BridgeError::protocol("x").is_network());
        assert!(!BridgeError::config("x").is_network());
    }

    #[test]
    fn test_json_errors_are_protocol_errors() {
        let err: BridgeError = serde_json::from_str::<serde_json::Value>("{nope")
            .unwrap_err()
            .into();
        assert!(matches!(err, BridgeError::Protocol { .. }));
    }
}
