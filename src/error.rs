//! Error types.

use crate::record::RecordKind;
use axum::extract::rejection::JsonRejection;
use std::fmt;
use std::net::IpAddr;

/// Error enumerates the possible webhook error states.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned when a [`Record`][crate::record::Record] or a change-set fails validation. Always
    /// raised before any file in the managed directory is touched.
    #[error("invalid record \"{name}\": {reason}")]
    Validation { name: String, reason: String },

    /// Returned when a change-set is malformed as a whole, e.g. `updateOld` and `updateNew`
    /// have different lengths.
    #[error("invalid change-set: {0}")]
    InvalidChanges(String),

    /// Returned when a request body has the wrong shape, e.g. `/adjustendpoints` receives
    /// something other than a JSON array.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Returned when a step of a change-set fails. Wraps the underlying cause and names the
    /// record that was being processed. File changes made by earlier steps are not rolled back.
    #[error("failed to {action} {kind} record \"{name}\": {source}")]
    Apply {
        action: ApplyAction,
        kind: RecordKind,
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// Returned when the configured reload command can't be started or exits unsuccessfully.
    /// `detail` holds the captured diagnostic output of the command.
    #[error("reload command `{command}` failed: {detail}")]
    ReloadFailed { command: String, detail: String },

    /// Returned when the mutation serializer's worker is no longer running.
    #[error("change-set serializer is shut down")]
    SerializerClosed,

    /// Returned when clients request a response in a media type other than the webhook's.
    #[error("not acceptable")]
    NotAcceptable,

    /// Returned when a client's source IP isn't in a [`Config::acl`][`crate::config::Config::acl`]
    /// network.
    #[error("IP {0} is not authorized")]
    AuthForbidden(IpAddr),

    /// Returned when clients `POST` invalid JSON.
    #[error(transparent)]
    JsonExtractorRejection(#[from] JsonRejection),

    /// Returned when the loaded [`Config`][crate::config::Config] is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred: {0}")]
    IO(#[from] std::io::Error),

    /// Returned when processing JSON fails, e.g. when
    /// [trying to load a `Config`][crate::config::Config::try_from_file].
    #[error("invalid JSON: {0}")]
    InvalidJSON(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn validation(name: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// The change-set step that was running when an [`Error::Apply`] occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyAction {
    Delete,
    Write,
}

impl fmt::Display for ApplyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyAction::Delete => f.write_str("delete"),
            ApplyAction::Write => f.write_str("write"),
        }
    }
}
