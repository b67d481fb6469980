//! Centralized error types for the Sonority core library.
//!
//! Each protocol module owns its own `thiserror` enum; this module provides
//! the crate-wide [`SonorityError`] they all convert into, plus stable
//! machine-readable codes via [`ErrorCode`].

use serde::Serialize;
use thiserror::Error;

use crate::sonos::gena::GenaError;
use crate::sonos::soap::SoapError;
use crate::sonos::ssdp::DiscoveryError;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;
}

impl ErrorCode for DiscoveryError {
    fn code(&self) -> &'static str {
        match self {
            Self::SocketBind(_) => "socket_bind_failed",
            Self::SendSearch(_) => "ssdp_send_failed",
        }
    }
}

impl ErrorCode for SoapError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::HttpStatus(_, _) => "http_error_status",
            Self::Fault(_) => "soap_fault",
            Self::NoData => "soap_no_data",
            Self::Parse => "soap_parse_error",
        }
    }
}

impl ErrorCode for GenaError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::SubscriptionFailed(_) => "gena_subscription_failed",
            Self::RenewalFailed(_) => "gena_renewal_failed",
            Self::MissingSid => "gena_missing_sid",
            Self::NotSubscribed(_) => "gena_not_subscribed",
            Self::Pending(_) => "gena_subscription_pending",
            Self::InvalidMethod(_) => "gena_invalid_method",
        }
    }
}

/// Crate-wide error type.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum SonorityError {
    /// Device discovery failed (socket or network issues).
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// SOAP request to a device failed.
    #[error("SOAP request failed: {0}")]
    Soap(String),

    /// Event subscription request failed.
    #[error("Event subscription failed: {0}")]
    Gena(String),

    /// Device id is not in the known-device set.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Group id is not in the current topology.
    #[error("Group not found: {0}")]
    GroupNotFound(String),

    /// A command needs a selected group and none is selected.
    #[error("No group selected")]
    NoGroupSelected,

    /// Command arguments were out of range or malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration failed validation.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SonorityError {
    /// Returns a machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Discovery(_) => "discovery_failed",
            Self::Soap(_) => "soap_error",
            Self::Gena(_) => "gena_error",
            Self::DeviceNotFound(_) => "device_not_found",
            Self::GroupNotFound(_) => "group_not_found",
            Self::NoGroupSelected => "no_group_selected",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Configuration(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Type Aliases
// ─────────────────────────────────────────────────────────────────────────────

// Re-export Result type aliases from their defining modules
pub use crate::sonos::gena::GenaResult;
pub use crate::sonos::soap::SoapResult;
pub use crate::sonos::ssdp::DiscoveryResult;

/// Convenient Result alias for crate-wide operations.
pub type CoreResult<T> = Result<T, SonorityError>;

impl From<GenaError> for SonorityError {
    fn from(err: GenaError) -> Self {
        Self::Gena(err.to_string())
    }
}

impl From<SoapError> for SonorityError {
    fn from(err: SoapError) -> Self {
        Self::Soap(err.to_string())
    }
}

impl From<DiscoveryError> for SonorityError {
    fn from(err: DiscoveryError) -> Self {
        Self::Discovery(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soap_error_converts_with_message() {
        let err: SonorityError = SoapError::HttpStatus(500, "boom".into()).into();
        assert_eq!(err.code(), "soap_error");
        assert_eq!(err.to_string(), "SOAP request failed: HTTP error 500: boom");
    }

    #[test]
    fn module_errors_have_distinct_codes() {
        assert_eq!(SoapError::NoData.code(), "soap_no_data");
        assert_eq!(GenaError::MissingSid.code(), "gena_missing_sid");
        assert_eq!(SonorityError::NoGroupSelected.code(), "no_group_selected");
    }

    #[test]
    fn serializes_tagged() {
        let json = serde_json::to_value(SonorityError::GroupNotFound("RINCON_A".into())).unwrap();
        assert_eq!(json["type"], "GroupNotFound");
        assert_eq!(json["details"], "RINCON_A");
    }
}
