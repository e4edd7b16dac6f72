//! Error types for provider search operations.
//!
//! Any of these surfacing from a provider's stream ends that provider's
//! sequence only; the fan-out engine logs it and siblings keep producing.

use driftnet_core::MetadataError;
use thiserror::Error;

/// Errors that can occur while a provider produces results.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Request could not be sent or the response body not read.
    #[error("network error: {reason}")]
    Network {
        /// Transport failure detail
        reason: String,
    },

    /// Upstream answered with a non-success status.
    #[error("upstream responded {status}")]
    UpstreamStatus {
        /// HTTP status code
        status: u16,
    },

    /// Upstream body could not be parsed into results.
    #[error("parse error: {reason}")]
    Parse {
        /// Parser failure detail
        reason: String,
    },

    /// Upstream reported an application-level error.
    #[error("upstream error: {reason}")]
    Upstream {
        /// The upstream's error payload
        reason: String,
    },

    /// Upstream kept rate limiting us after every retry.
    #[error("rate limited after {attempts} attempts")]
    RateLimited {
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// A metadata lookup the provider depends on failed.
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

impl SearchError {
    pub(crate) fn network(error: reqwest::Error) -> Self {
        SearchError::Network {
            reason: error.to_string(),
        }
    }
}
