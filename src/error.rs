use std::io;

use thiserror::Error;

use crate::learning_switch::{EventKind, SessionState};

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed frame: {len} bytes is too short for an ethernet header")]
    MalformedFrame { len: usize },
    #[error("unrecognized port status reason {0}")]
    UnrecognizedPortReason(u8),
    #[error("{event:?} is not valid while the session is {state:?}")]
    UnexpectedEvent {
        event: EventKind,
        state: SessionState,
    },
    #[error("command submission failed: {0}")]
    CommandSubmission(#[from] io::Error),
    #[error("switch session already closed")]
    SessionClosed,
    #[error("switch connection lost: {0}")]
    ConnectionLost(io::Error),
    #[error("unsupported OpenFlow version {0:#04x}")]
    UnsupportedVersion(u8),
    #[error("openflow codec error: {0}")]
    Codec(String),
}

impl Error {
    /// Whether the error means the switch can no longer be written to.
    pub fn is_submission_failure(&self) -> bool {
        matches!(self, Error::CommandSubmission(_) | Error::SessionClosed)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
