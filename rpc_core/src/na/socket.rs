// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! An NA backend over a `socketpair(2)` Unix-domain byte pipe: a real
//! two-sided NA plugin backed by an actual file descriptor, for exercising
//! non-blocking progress against a genuine kernel object instead of an
//! in-process channel.
//!
//! A socketpair only ever has one possible peer, so `Addr` carries no
//! information; every message is prefixed on the wire with a 4-byte tag so
//! the receiving side can still report the tag to unexpected-receive
//! callbacks the way a tag-matching fabric would.

use std::collections::VecDeque;
use std::fmt;
use std::os::fd::{AsRawFd, OwnedFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};
use nix::unistd::{read, write};

use super::completion::NaCompletionQueue;
use super::{Na, NaCallback, NaCompletion, NaError};

/// The only possible peer of a [`SocketNa`]: the other end of its pipe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SocketAddr;

impl fmt::Display for SocketAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<socketpair peer>")
    }
}

const TAG_PREFIX: usize = 4;

struct PendingRecv {
    buf: Vec<u8>,
    /// Bytes of the 4-byte tag prefix read so far.
    tag_bytes: [u8; TAG_PREFIX],
    tag_done: usize,
    payload_done: usize,
    unexpected: bool,
    cb: NaCallback<SocketAddr>,
}

struct PendingSend {
    /// Tag prefix followed by the payload, written as one logical message.
    wire: Vec<u8>,
    done: usize,
    cb: NaCallback<SocketAddr>,
}

/// NA backend for one end of a `socketpair(2)` connection.
pub struct SocketNa {
    fd: OwnedFd,
    max_expected_size: usize,
    max_tag: u32,
    listening: AtomicBool,
    completions: NaCompletionQueue,
    recvs: Mutex<VecDeque<PendingRecv>>,
    sends: Mutex<VecDeque<PendingSend>>,
}

impl SocketNa {
    /// Create a connected pair of `SocketNa` backends, one per end.
    pub fn pair(max_expected_size: usize, max_tag: u32) -> nix::Result<(Self, Self)> {
        let (a, b) = socketpair(
            AddressFamily::Unix,
            SockType::Stream,
            None,
            SockFlag::empty(),
        )?;

        for fd in [a.as_raw_fd(), b.as_raw_fd()] {
            let flags = fcntl(fd, FcntlArg::F_GETFL)?;
            let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
            fcntl(fd, FcntlArg::F_SETFL(flags))?;
        }

        Ok((
            Self::new(a, max_expected_size, max_tag, false),
            Self::new(b, max_expected_size, max_tag, false),
        ))
    }

    fn new(fd: OwnedFd, max_expected_size: usize, max_tag: u32, listening: bool) -> Self {
        Self {
            fd,
            max_expected_size,
            max_tag,
            listening: AtomicBool::new(listening),
            completions: NaCompletionQueue::new(),
            recvs: Mutex::new(VecDeque::new()),
            sends: Mutex::new(VecDeque::new()),
        }
    }

    /// Toggle whether this endpoint reports itself as listening.
    pub fn set_listening(&self, listening: bool) {
        self.listening.store(listening, Ordering::Relaxed);
    }

    fn post_recv(&self, buf: Vec<u8>, unexpected: bool, tag: u32, cb: NaCallback<SocketAddr>) {
        // `tag` is only meaningful for expected receives (it picks which
        // pending send the caller is correlating with); unexpected receives
        // learn their tag from the wire.
        let _ = tag;
        let mut pending = PendingRecv {
            buf,
            tag_bytes: [0; TAG_PREFIX],
            tag_done: 0,
            payload_done: 0,
            unexpected,
            cb,
        };
        if !self.drive_recv(&mut pending) {
            self.recvs.lock().unwrap().push_back(pending);
        }
    }

    fn post_send(&self, buf: Vec<u8>, tag: u32, cb: NaCallback<SocketAddr>) {
        let mut wire = Vec::with_capacity(TAG_PREFIX + buf.len());
        wire.extend_from_slice(&tag.to_le_bytes());
        wire.extend_from_slice(&buf);

        let mut pending = PendingSend { wire, done: 0, cb };
        if !self.drive_send(&mut pending) {
            self.sends.lock().unwrap().push_back(pending);
        }
    }

    /// Try to make progress on one pending receive. Returns true if it
    /// completed (and pushed its completion).
    fn drive_recv(&self, pending: &mut PendingRecv) -> bool {
        while pending.tag_done < TAG_PREFIX {
            match read(&self.fd, &mut pending.tag_bytes[pending.tag_done..]) {
                Ok(0) => return false,
                Ok(n) => pending.tag_done += n,
                Err(Errno::EAGAIN) => return false,
                Err(e) => {
                    self.fail_recv(pending, NaError::Other(e.to_string()));
                    return true;
                }
            }
        }

        while pending.payload_done < pending.buf.len() {
            match read(&self.fd, &mut pending.buf[pending.payload_done..]) {
                Ok(0) => return false,
                Ok(n) => pending.payload_done += n,
                Err(Errno::EAGAIN) => return false,
                Err(e) => {
                    self.fail_recv(pending, NaError::Other(e.to_string()));
                    return true;
                }
            }
        }

        let tag = u32::from_le_bytes(pending.tag_bytes);
        let buf = std::mem::take(&mut pending.buf);
        let actual_len = pending.payload_done;
        let source = if pending.unexpected {
            Some(SocketAddr)
        } else {
            None
        };
        // Safety of the take: `pending` is dropped right after by the caller.
        let cb = take_cb(pending);
        self.completions.push(Box::new(move || {
            cb(NaCompletion {
                buf,
                actual_len,
                source,
                tag,
                status: Ok(()),
            })
        }));
        true
    }

    fn drive_send(&self, pending: &mut PendingSend) -> bool {
        while pending.done < pending.wire.len() {
            match write(&self.fd, &pending.wire[pending.done..]) {
                Ok(0) => return false,
                Ok(n) => pending.done += n,
                Err(Errno::EAGAIN) => return false,
                Err(e) => {
                    let cb = take_send_cb(pending);
                    self.completions.push(Box::new(move || {
                        cb(NaCompletion {
                            buf: Vec::new(),
                            actual_len: 0,
                            source: None,
                            tag: 0,
                            status: Err(NaError::Other(e.to_string())),
                        })
                    }));
                    return true;
                }
            }
        }

        let sent_len = pending.wire.len() - TAG_PREFIX;
        let cb = take_send_cb(pending);
        self.completions.push(Box::new(move || {
            cb(NaCompletion {
                buf: Vec::new(),
                actual_len: sent_len,
                source: None,
                tag: 0,
                status: Ok(()),
            })
        }));
        true
    }

    fn fail_recv(&self, pending: &mut PendingRecv, err: NaError) {
        let cb = take_cb(pending);
        self.completions.push(Box::new(move || {
            cb(NaCompletion {
                buf: Vec::new(),
                actual_len: 0,
                source: None,
                tag: 0,
                status: Err(err),
            })
        }));
    }

    /// Retry every pending send/recv once. Called from `progress`.
    fn pump(&self) {
        let mut recvs = self.recvs.lock().unwrap();
        let still_pending: VecDeque<PendingRecv> = recvs
            .drain(..)
            .filter_map(|mut p| if self.drive_recv(&mut p) { None } else { Some(p) })
            .collect();
        *recvs = still_pending;
        drop(recvs);

        let mut sends = self.sends.lock().unwrap();
        let still_pending: VecDeque<PendingSend> = sends
            .drain(..)
            .filter_map(|mut p| if self.drive_send(&mut p) { None } else { Some(p) })
            .collect();
        *sends = still_pending;
    }
}

/// Pulls the callback out of a `PendingRecv` being consumed. The struct has
/// no further use afterward.
fn take_cb(pending: &mut PendingRecv) -> NaCallback<SocketAddr> {
    std::mem::replace(&mut pending.cb, Box::new(|_| {}))
}

fn take_send_cb(pending: &mut PendingSend) -> NaCallback<SocketAddr> {
    std::mem::replace(&mut pending.cb, Box::new(|_| {}))
}

impl Na for SocketNa {
    type Addr = SocketAddr;

    fn max_expected_size(&self) -> usize {
        self.max_expected_size
    }

    fn max_tag(&self) -> u32 {
        self.max_tag
    }

    fn addr_is_self(&self, _addr: &Self::Addr) -> bool {
        false
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }

    fn post_recv_unexpected(&self, buf: Vec<u8>, cb: NaCallback<Self::Addr>) {
        self.post_recv(buf, true, 0, cb);
    }

    fn post_send_unexpected(
        &self,
        buf: Vec<u8>,
        _peer: Self::Addr,
        tag: u32,
        cb: NaCallback<Self::Addr>,
    ) {
        self.post_send(buf, tag, cb);
    }

    fn post_recv_expected(
        &self,
        buf: Vec<u8>,
        _peer: Self::Addr,
        tag: u32,
        cb: NaCallback<Self::Addr>,
    ) {
        self.post_recv(buf, false, tag, cb);
    }

    fn post_send_expected(
        &self,
        buf: Vec<u8>,
        _peer: Self::Addr,
        tag: u32,
        cb: NaCallback<Self::Addr>,
    ) {
        self.post_send(buf, tag, cb);
    }

    fn trigger(&self, max_count: usize) -> usize {
        self.completions.trigger(max_count)
    }

    fn progress(&self, timeout_ms: u32) -> Result<(), NaError> {
        let deadline =
            std::time::Instant::now() + std::time::Duration::from_millis(timeout_ms as u64);
        loop {
            self.pump();
            if self.completions.progress(0).is_ok() {
                return Ok(());
            }
            if std::time::Instant::now() >= deadline {
                return Err(NaError::Timeout);
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }
}
