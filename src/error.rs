//! Error types for trust store reading and gauge registration.
//!
//! This module defines the errors that can occur while reading certificates
//! from a trust store and while registering expiration gauges.

use std::error;
use std::fmt;

/// Error type for certificate source and metric binding failures.
///
/// Reading a trust store collapses every underlying cause (I/O, parse,
/// wrong password, unknown container format) into a single `StoreRead`
/// variant carrying the original cause. A blank or absent trust store
/// configuration is not an error; it yields an empty certificate
/// collection instead.
#[derive(Debug)]
pub enum Error {
    /// Trust store could not be opened or parsed
    StoreRead {
        /// Path of the trust store that failed to load
        path: String,
        /// The underlying cause (I/O, parse, password mismatch, ...)
        source: Box<dyn error::Error + Send + Sync>,
    },

    /// Certificate field could not be extracted
    Certificate {
        /// Description of what went wrong
        reason: String,
    },

    /// Gauge registration rejected by the metrics registry
    Registration {
        /// Details reported by the registry
        details: String,
    },
}

impl Error {
    pub(crate) fn store_read(
        path: &str,
        source: impl Into<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Self::StoreRead {
            path: path.to_string(),
            source: source.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoreRead { path, source } => {
                write!(f, "Failed to read trust store '{}': {}", path, source)
            }
            Self::Certificate { reason } => {
                write!(f, "Certificate error: {}", reason)
            }
            Self::Registration { details } => {
                write!(f, "Gauge registration failed: {}", details)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::StoreRead { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<prometheus::Error> for Error {
    fn from(e: prometheus::Error) -> Self {
        Self::Registration {
            details: e.to_string(),
        }
    }
}

impl From<openssl::error::ErrorStack> for Error {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Self::Certificate {
            reason: e.to_string(),
        }
    }
}
