//! Unified error taxonomy for the thermal control plane.
//!
//! One enum, one family per error kind, each carrying enough context to
//! log and to show a user. Nothing in the control loop panics on an
//! expected failure path; only [`FanwallError::Fatal`] aborts the process,
//! and only at startup.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FanwallError>;

#[derive(Debug, Error)]
pub enum FanwallError {
    // -- Link (transient, transport/parse on serial) --
    #[error("powerboard link error on {port}: {reason}")]
    Link { port: String, reason: String },

    #[error("powerboard protocol error: {0}")]
    Protocol(#[from] fanwall_protocol::ProtocolError),

    #[error(transparent)]
    SerialIo(#[from] std::io::Error),

    // -- HandleUnavailable (quiet; absence is not failure) --
    #[error("handle unavailable: {0}")]
    HandleUnavailable(String),

    // -- ConfigLoad (recover with default + persist + warn) --
    #[error("failed to load config document {path}: {reason}")]
    ConfigLoad { path: String, reason: String },

    #[error("failed to parse JSON in {path}: {source}")]
    JsonParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write config document {path}: {reason}")]
    ConfigWrite { path: String, reason: String },

    // -- ValidationError (reject; previous state unchanged) --
    #[error("validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("duplicate name {name:?} in {scope}")]
    DuplicateName { scope: String, name: String },

    // -- Fatal (process start only) --
    #[error("fatal startup error: {0}")]
    Fatal(String),
}

impl FanwallError {
    pub fn link(port: impl Into<String>, reason: impl Into<String>) -> Self {
        FanwallError::Link {
            port: port.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        FanwallError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        FanwallError::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for the kinds §7 calls "quiet": downstream should treat the
    /// reading as absent, not surface a user-visible error.
    pub fn is_quiet(&self) -> bool {
        matches!(self, FanwallError::HandleUnavailable(_))
    }

    /// True for the kinds §7 calls transient: retried next tick, cached
    /// state left untouched.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FanwallError::Link { .. } | FanwallError::Protocol(_) | FanwallError::SerialIo(_)
        )
    }
}
