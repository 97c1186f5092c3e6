pub mod client;
pub mod prompt;
pub mod retry;
pub mod types;

pub use client::*;
pub use prompt::*;
pub use retry::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Vision service is not reachable at {0}")]
    Unreachable(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Vision service returned an error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed vision response: {0}")]
    MalformedResponse(String),

    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),
}

impl VisionError {
    /// Transport hiccups and server-side overload; worth another attempt.
    /// Content and client errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            VisionError::Unreachable(_) | VisionError::Timeout(_) | VisionError::Network(_) => true,
            VisionError::ApiError { status, .. } => *status == 429 || *status >= 500,
            VisionError::MalformedResponse(_) | VisionError::ClientBuild(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(VisionError::Timeout(60).is_transient());
        assert!(VisionError::Unreachable("x".into()).is_transient());
        assert!(VisionError::ApiError { status: 429, message: String::new() }.is_transient());
        assert!(VisionError::ApiError { status: 502, message: String::new() }.is_transient());
        assert!(!VisionError::ApiError { status: 400, message: String::new() }.is_transient());
        assert!(!VisionError::MalformedResponse("x".into()).is_transient());
    }
}
