// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Error taxonomy: a hand-rolled enum with manual `Display`/
//! `std::error::Error`, rather than a derive-macro crate. `Success` is not a
//! variant — it is represented by `Ok(())`/`Ok(T)`.

use std::fmt;

use crate::na::NaError;

#[derive(Debug, Clone)]
pub enum Error {
    /// A public entry point was called with an invalid argument.
    InvalidParam(&'static str),

    /// A buffer was the wrong size for the operation.
    SizeError,

    /// An allocation failed.
    NoMem,

    /// Header verification failed, or a message could not be decoded.
    Protocol(ProtocolError),

    /// The registry has no handler for the requested operation id.
    NoMatch,

    /// Reserved for payload checksum validation; this core does not
    /// checksum payloads itself, that belongs to whatever serializes the
    /// payload above it, but the kind exists so that layer has somewhere to
    /// report into.
    ChecksumError,

    /// The completion-queue condvar, or an NA `progress`/`trigger` call,
    /// expired before anything completed.
    Timeout,

    /// Wraps any NA failure other than a timeout.
    Na(NaError),

    /// The handle was cancelled before its NA operation completed.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Generic decoding error: too short, or malformed.
    Decode,
    /// Header magic was right but the version field wasn't.
    WrongVersion,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParam(what) => write!(f, "invalid parameter: {what}"),
            Self::SizeError => write!(f, "buffer size error"),
            Self::NoMem => write!(f, "allocation failed"),
            Self::Protocol(e) => write!(f, "protocol error: {e}"),
            Self::NoMatch => write!(f, "no matching registered RPC"),
            Self::ChecksumError => write!(f, "checksum error"),
            Self::Timeout => write!(f, "operation timed out"),
            Self::Na(e) => write!(f, "NA error: {e}"),
            Self::Cancelled => write!(f, "operation was cancelled"),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode => write!(f, "error decoding header"),
            Self::WrongVersion => write!(f, "unsupported header version"),
        }
    }
}

impl From<NaError> for Error {
    fn from(e: NaError) -> Self {
        match e {
            NaError::Timeout => Self::Timeout,
            other => Self::Na(other),
        }
    }
}

/// Wire-level return codes carried in a [`crate::header::ResponseHeader`].
/// Only the kinds a server can legitimately return to a client before a
/// handler even runs are represented on the wire; once a handler has run it
/// reports its own result through the encoded reply payload.
pub mod wire {
    pub const SUCCESS: u32 = 0;
    pub const NO_MATCH: u32 = 1;
    pub const PROTOCOL_ERROR: u32 = 2;
    pub const INVALID_PARAM: u32 = 3;

    pub fn to_error(code: u32) -> Option<super::Error> {
        match code {
            SUCCESS => None,
            NO_MATCH => Some(super::Error::NoMatch),
            PROTOCOL_ERROR => Some(super::Error::Protocol(super::ProtocolError::Decode)),
            INVALID_PARAM => Some(super::Error::InvalidParam("remote rejected call")),
            _ => Some(super::Error::Protocol(super::ProtocolError::Decode)),
        }
    }

    pub fn from_error(err: &super::Error) -> u32 {
        match err {
            super::Error::NoMatch => NO_MATCH,
            super::Error::Protocol(_) => PROTOCOL_ERROR,
            super::Error::InvalidParam(_) => INVALID_PARAM,
            _ => PROTOCOL_ERROR,
        }
    }
}
