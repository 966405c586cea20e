// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The Network Abstraction (NA) collaborator contract.
//!
//! NA is treated as an external, unspecified layer providing two-sided
//! messaging (unexpected/expected sends and receives), addresses, and a
//! progress/trigger pair. This module pins that contract down as a trait so
//! the engine in the rest of this crate has something concrete to drive.
//! Real deployments are expected to implement [`Na`] against a fabric
//! (libfabric, UCX, ...); [`channel`] and [`socket`] ship two
//! software-only implementations used by this crate's own tests.

pub mod channel;
pub(crate) mod completion;
pub mod socket;

use std::fmt;

/// Errors reported by an NA backend, distinct from this crate's own
/// [`crate::error::Error`] taxonomy (an NA error becomes `Error::Na`
/// when it crosses into the core's callbacks).
#[derive(Debug, Clone)]
pub enum NaError {
    /// The backend's progress loop timed out without a completion.
    Timeout,
    /// The peer address or tag was not valid for this backend.
    InvalidAddr,
    /// The buffer supplied to a post call was the wrong size.
    SizeMismatch,
    /// Any other backend-internal failure.
    Other(String),
}

impl fmt::Display for NaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "NA operation timed out"),
            Self::InvalidAddr => write!(f, "invalid NA address"),
            Self::SizeMismatch => write!(f, "NA buffer size mismatch"),
            Self::Other(msg) => write!(f, "NA error: {msg}"),
        }
    }
}

impl std::error::Error for NaError {}

/// The outcome of one posted NA operation, delivered to its callback from
/// inside [`Na::trigger`].
pub struct NaCompletion<A> {
    /// The buffer that was posted, handed back to the caller. For a
    /// completed receive this holds the bytes that arrived; for a send it is
    /// just the original buffer, returned so ownership comes back to the
    /// handle.
    pub buf: Vec<u8>,
    /// Number of bytes actually transferred (meaningful for receives).
    pub actual_len: usize,
    /// For an unexpected receive, the address NA reports as the sender.
    pub source: Option<A>,
    /// For an unexpected receive, the tag NA reports for the message.
    pub tag: u32,
    /// Whether the operation succeeded.
    pub status: Result<(), NaError>,
}

/// A callback registered with a posted NA operation. Invoked at most once,
/// from within [`Na::trigger`].
pub type NaCallback<A> = Box<dyn FnOnce(NaCompletion<A>) + Send>;

/// The downward NA contract consumed by the core.
///
/// All `post_*` calls return immediately; completion is reported later by
/// invoking the supplied callback from [`Na::trigger`]. A backend must never
/// call a callback synchronously from within a `post_*` method — the core's
/// progress loop relies on callbacks only firing from `trigger`/`progress`.
pub trait Na: Send + Sync + 'static {
    /// Opaque peer address type for this backend.
    type Addr: Clone + Eq + Send + Sync + fmt::Debug + 'static;

    /// Maximum size, in bytes, of a message this backend can send/receive
    /// without the (out-of-scope) bulk-transfer path.
    fn max_expected_size(&self) -> usize;

    /// Largest tag value this backend supports for expected messages.
    fn max_tag(&self) -> u32;

    /// True if `addr` names this same endpoint (enables the loopback
    /// short-circuit in `forward`).
    fn addr_is_self(&self, addr: &Self::Addr) -> bool;

    /// True if this endpoint currently has a listener posted and should
    /// have its processing list refilled.
    fn is_listening(&self) -> bool;

    /// Post an unexpected receive: a receive with no prior knowledge of the
    /// sender. `buf` must be exactly `max_expected_size()` bytes.
    fn post_recv_unexpected(&self, buf: Vec<u8>, cb: NaCallback<Self::Addr>);

    /// Post an unexpected send to `peer`, tagged `tag` so the peer's
    /// eventual expected receive can be correlated with this message.
    fn post_send_unexpected(&self, buf: Vec<u8>, peer: Self::Addr, tag: u32, cb: NaCallback<Self::Addr>);

    /// Post an expected receive bound to `(peer, tag)`.
    fn post_recv_expected(&self, buf: Vec<u8>, peer: Self::Addr, tag: u32, cb: NaCallback<Self::Addr>);

    /// Post an expected send bound to `(peer, tag)`.
    fn post_send_expected(&self, buf: Vec<u8>, peer: Self::Addr, tag: u32, cb: NaCallback<Self::Addr>);

    /// Run up to `max_count` already-ready NA completion callbacks. Returns
    /// the number actually run. Must not block.
    fn trigger(&self, max_count: usize) -> usize;

    /// Block up to `timeout_ms` waiting for at least one operation to
    /// become ready for `trigger`. `Err(NaError::Timeout)` on expiry.
    fn progress(&self, timeout_ms: u32) -> Result<(), NaError>;
}
