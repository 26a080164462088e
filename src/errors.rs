// SPDX-License-Identifier: MPL-2.0

//! Error types for the capture client

use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type for camera acquisition
pub type AcquisitionResult<T> = Result<T, AcquisitionError>;

/// Result type for analysis submissions
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Main application error type
#[derive(Debug, Clone, Error)]
pub enum AppError {
    /// Camera acquisition errors
    #[error("Camera error: {0}")]
    Acquisition(#[from] AcquisitionError),
    /// Analysis request errors
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),
    /// Still image source errors (upload fallback, style references)
    #[error("Image source error: {0}")]
    Source(#[from] SourceError),
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Errors raised while obtaining a live camera stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquisitionError {
    /// The user or the system refused camera access
    #[error("Camera permission denied")]
    PermissionDenied,
    /// No camera matched the request
    #[error("No camera device found")]
    DeviceNotFound,
    /// A camera exists but cannot satisfy the requested constraints
    #[error("Camera constraints cannot be satisfied")]
    ConstraintsNotSatisfiable,
    /// No camera API is present on this platform
    #[error("Camera access is not supported on this platform")]
    NotSupported,
    /// Anything else (device busy, driver failure, ...)
    #[error("Camera error: {0}")]
    Unknown(String),
}

/// What the user can do about an acquisition failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remediation {
    /// Try starting the camera again
    Retry,
    /// Grant camera permission, then retry
    EnablePermission,
    /// Analyze a still image file instead of the live camera
    UseUploadFallback,
}

impl AcquisitionError {
    /// The remediation offered to the user for this failure
    pub fn remediation(&self) -> Remediation {
        match self {
            AcquisitionError::PermissionDenied => Remediation::EnablePermission,
            AcquisitionError::DeviceNotFound | AcquisitionError::NotSupported => {
                Remediation::UseUploadFallback
            }
            AcquisitionError::ConstraintsNotSatisfiable | AcquisitionError::Unknown(_) => {
                Remediation::Retry
            }
        }
    }

    /// Whether relaxing the constraints can possibly help
    pub fn is_retryable_with_relaxed_constraints(&self) -> bool {
        !matches!(
            self,
            AcquisitionError::PermissionDenied | AcquisitionError::NotSupported
        )
    }
}

impl std::fmt::Display for Remediation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Remediation::Retry => write!(f, "retry"),
            Remediation::EnablePermission => write!(f, "enable camera permission and retry"),
            Remediation::UseUploadFallback => write!(f, "upload a photo instead"),
        }
    }
}

/// Reasons a capture tick produced no frame
///
/// The scheduler waits for the next trigger. Only repeated encode failures
/// are reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CaptureSkipped {
    /// The surface has not produced a decodable frame yet
    #[error("video surface not ready")]
    NotReady,
    /// Another capture is still being encoded
    #[error("capture already pending")]
    Busy,
    /// The stream feeding the surface has ended
    #[error("video stream ended")]
    StreamEnded,
    /// A frame was read but could not be turned into a JPEG
    #[error("frame could not be encoded")]
    EncodeFailed,
}

/// Errors from the remote analysis endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// Non-success HTTP status
    #[error("analysis service returned HTTP {0}")]
    HttpStatus(u16),
    /// Successful response without any feedback items
    #[error("analysis service returned no feedback")]
    NoFeedback,
    /// Connection, timeout or transport failure
    #[error("network failure: {0}")]
    NetworkFailure(String),
    /// Body could not be decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AnalysisError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            AnalysisError::HttpStatus(status.as_u16())
        } else {
            AnalysisError::NetworkFailure(err.to_string())
        }
    }
}

/// Errors while loading a still image from disk
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// File could not be read
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },
    /// File is not a supported image
    #[error("unsupported image: {0}")]
    Unsupported(String),
    /// The style reference set already holds the maximum number of images
    #[error("style reference set is full ({0} images)")]
    StyleSetFull(usize),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Other(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remediation_mapping() {
        assert_eq!(
            AcquisitionError::PermissionDenied.remediation(),
            Remediation::EnablePermission
        );
        assert_eq!(
            AcquisitionError::NotSupported.remediation(),
            Remediation::UseUploadFallback
        );
        assert_eq!(
            AcquisitionError::DeviceNotFound.remediation(),
            Remediation::UseUploadFallback
        );
        assert_eq!(
            AcquisitionError::ConstraintsNotSatisfiable.remediation(),
            Remediation::Retry
        );
    }

    #[test]
    fn test_relaxed_retry_policy() {
        assert!(AcquisitionError::ConstraintsNotSatisfiable.is_retryable_with_relaxed_constraints());
        assert!(AcquisitionError::DeviceNotFound.is_retryable_with_relaxed_constraints());
        assert!(!AcquisitionError::PermissionDenied.is_retryable_with_relaxed_constraints());
        assert!(!AcquisitionError::NotSupported.is_retryable_with_relaxed_constraints());
    }

    #[test]
    fn test_app_error_wraps_analysis() {
        let err: AppError = AnalysisError::HttpStatus(500).into();
        assert_eq!(
            err.to_string(),
            "Analysis error: analysis service returned HTTP 500"
        );
    }
}
