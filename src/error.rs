//! Error types and the sentinel status codes of the handle API.
//!
//! Rust callers get `Result<T, Error>`. The flat handle API never returns an
//! `Error`; it folds each one into a [`Status`] or a null handle.

use std::io;

/// Errors raised inside the relay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid or null handle")]
    InvalidHandle,

    #[error("instance has been terminated")]
    InstanceClosed,

    #[error("no event registered under id `{0}`")]
    UnknownEvent(String),

    #[error("owning-thread worker is not running")]
    WorkerStopped,

    #[error("marshalled command panicked on the owning thread")]
    CommandPanicked,

    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("terminal input error: {0}")]
    Terminal(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// SENTINELS
// =============================================================================

/// Status code returned by the handle API and the C ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    Ok = 1,
    Error = 0,
    InvalidHandle = -2,
    UnknownEvent = -3,
    WorkerStopped = -4,
}

impl Status {
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

impl From<&Error> for Status {
    fn from(err: &Error) -> Self {
        match err {
            Error::InvalidHandle | Error::InstanceClosed => Status::InvalidHandle,
            Error::UnknownEvent(_) => Status::UnknownEvent,
            Error::WorkerStopped => Status::WorkerStopped,
            Error::CommandPanicked | Error::Spawn(_) | Error::Terminal(_) => Status::Error,
        }
    }
}

impl<T> From<&Result<T>> for Status {
    fn from(res: &Result<T>) -> Self {
        match res {
            Ok(_) => Status::Ok,
            Err(e) => Status::from(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_errors() {
        assert_eq!(Status::from(&Error::InvalidHandle), Status::InvalidHandle);
        assert_eq!(Status::from(&Error::InstanceClosed), Status::InvalidHandle);
        assert_eq!(Status::from(&Error::UnknownEvent("go".into())), Status::UnknownEvent);
        assert_eq!(Status::from(&Error::WorkerStopped), Status::WorkerStopped);
        assert_eq!(Status::from(&Error::CommandPanicked), Status::Error);
    }

    #[test]
    fn test_status_from_result() {
        let ok: Result<u32> = Ok(3);
        assert!(Status::from(&ok).is_ok());

        let err: Result<u32> = Err(Error::WorkerStopped);
        assert_eq!(Status::from(&err), Status::WorkerStopped);
    }

    #[test]
    fn test_error_messages() {
        let err = Error::UnknownEvent("go".to_string());
        assert_eq!(err.to_string(), "no event registered under id `go`");
    }
}
