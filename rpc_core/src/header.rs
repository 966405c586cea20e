// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Fixed-layout request/response header frames.
//!
//! These two frames are small and fixed-size, so they are hand-packed
//! rather than run through a generated codec: fixed byte offsets,
//! `to_le_bytes`/`from_le_bytes`.

use crate::error::{Error, ProtocolError};

const MAGIC: u32 = 0x4850_4301; // "HPC" + version byte, arbitrary but fixed
const VERSION: u16 = 1;

/// `[request_header | user_payload]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub id: u32,
    pub cookie: u32,
    pub flags: u16,
    /// Reserved extra-bulk handle identifier. Always 0: extra-buffer
    /// transport is not implemented by this core.
    pub extra_bulk: u32,
}

/// `[response_header | user_payload]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub cookie: u32,
    pub ret: u32,
}

/// Encoded size of a [`RequestHeader`]: magic(4) + version(2) + id(4) +
/// cookie(4) + flags(2) + extra_bulk(4).
pub const REQUEST_HEADER_SIZE: usize = 4 + 2 + 4 + 4 + 2 + 4;

/// Encoded size of a [`ResponseHeader`]: magic(4) + version(2) + cookie(4) +
/// ret(4).
pub const RESPONSE_HEADER_SIZE: usize = 4 + 2 + 4 + 4;

impl RequestHeader {
    pub fn new(id: u32, cookie: u32, extra_bulk: u32) -> Self {
        Self {
            id,
            cookie,
            flags: 0,
            extra_bulk,
        }
    }

    /// Write this header to `buf[..REQUEST_HEADER_SIZE]`.
    pub fn encode(&self, buf: &mut [u8]) {
        assert!(buf.len() >= REQUEST_HEADER_SIZE);
        let mut off = 0;
        buf[off..off + 4].copy_from_slice(&MAGIC.to_le_bytes());
        off += 4;
        buf[off..off + 2].copy_from_slice(&VERSION.to_le_bytes());
        off += 2;
        buf[off..off + 4].copy_from_slice(&self.id.to_le_bytes());
        off += 4;
        buf[off..off + 4].copy_from_slice(&self.cookie.to_le_bytes());
        off += 4;
        buf[off..off + 2].copy_from_slice(&self.flags.to_le_bytes());
        off += 2;
        buf[off..off + 4].copy_from_slice(&self.extra_bulk.to_le_bytes());
    }

    /// Read and verify a header from `buf[..REQUEST_HEADER_SIZE]`.
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < REQUEST_HEADER_SIZE {
            return Err(Error::Protocol(ProtocolError::Decode));
        }
        let mut off = 0;
        let magic = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let version = u16::from_le_bytes(buf[off..off + 2].try_into().unwrap());
        off += 2;
        verify(magic, version)?;

        let id = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let cookie = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let flags = u16::from_le_bytes(buf[off..off + 2].try_into().unwrap());
        off += 2;
        let extra_bulk = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());

        Ok(Self {
            id,
            cookie,
            flags,
            extra_bulk,
        })
    }
}

impl ResponseHeader {
    pub fn new(cookie: u32, ret: u32) -> Self {
        Self { cookie, ret }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        assert!(buf.len() >= RESPONSE_HEADER_SIZE);
        let mut off = 0;
        buf[off..off + 4].copy_from_slice(&MAGIC.to_le_bytes());
        off += 4;
        buf[off..off + 2].copy_from_slice(&VERSION.to_le_bytes());
        off += 2;
        buf[off..off + 4].copy_from_slice(&self.cookie.to_le_bytes());
        off += 4;
        buf[off..off + 4].copy_from_slice(&self.ret.to_le_bytes());
    }

    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < RESPONSE_HEADER_SIZE {
            return Err(Error::Protocol(ProtocolError::Decode));
        }
        let mut off = 0;
        let magic = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let version = u16::from_le_bytes(buf[off..off + 2].try_into().unwrap());
        off += 2;
        verify(magic, version)?;

        let cookie = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let ret = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());

        Ok(Self { cookie, ret })
    }
}

fn verify(magic: u32, version: u16) -> Result<(), Error> {
    if magic != MAGIC {
        return Err(Error::Protocol(ProtocolError::Decode));
    }
    if version != VERSION {
        return Err(Error::Protocol(ProtocolError::WrongVersion));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trip() {
        let h = RequestHeader::new(0xdead_beef, 42, 0);
        let mut buf = [0u8; REQUEST_HEADER_SIZE];
        h.encode(&mut buf);
        let decoded = RequestHeader::decode(&buf).unwrap();
        assert_eq!(h, decoded);
    }

    #[test]
    fn response_round_trip() {
        let h = ResponseHeader::new(7, 0);
        let mut buf = [0u8; RESPONSE_HEADER_SIZE];
        h.encode(&mut buf);
        let decoded = ResponseHeader::decode(&buf).unwrap();
        assert_eq!(h, decoded);
    }

    #[test]
    fn bad_magic_is_protocol_error() {
        let buf = [0u8; REQUEST_HEADER_SIZE];
        match RequestHeader::decode(&buf) {
            Err(Error::Protocol(ProtocolError::Decode)) => {}
            other => panic!("expected protocol decode error, got {other:?}"),
        }
    }
}
