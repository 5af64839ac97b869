//! X-MAC frame format
//!
//! Every frame starts with the same header:
//!
//! ```text
//! +--------+----------+-----------------+
//! | sender | receiver | payload ...     |
//! | 2 B    | 2 B      | 0..=121 B       |
//! +--------+----------+-----------------+
//! ```
//!
//! A frame without payload is a strobe. A strobe whose sender and receiver
//! are the same address is a strobe-ACK: the receiver of a strobe answers
//! with the strobing node's address in both fields.

use crate::address::{Address, ADDR_LEN};
use crate::radio::MAX_FRAME_LEN;

pub const HEADER_LEN: usize = 2 * ADDR_LEN;
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN - HEADER_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub sender: Address,
    pub receiver: Address,
}

/// What a received frame means to the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Wake-up request from `sender` to `receiver`.
    Strobe,
    /// Answer to a strobe, addressed back to the strobing node.
    StrobeAck,
    /// Upper-layer payload.
    Data,
}

impl Header {
    #[inline]
    pub const fn new(sender: Address, receiver: Address) -> Self {
        Self { sender, receiver }
    }

    /// The strobe-ACK answering a strobe sent by `strober`.
    #[inline]
    pub const fn strobe_ack(strober: Address) -> Self {
        Self {
            sender: strober,
            receiver: strober,
        }
    }

    #[inline]
    pub fn is_strobe_ack(&self) -> bool {
        self.sender == self.receiver
    }

    /// Write the header to the start of `buf` and return its length.
    pub fn encode(&self, buf: &mut [u8]) -> Option<usize> {
        if buf.len() < HEADER_LEN {
            return None;
        }

        buf[..ADDR_LEN].copy_from_slice(self.sender.as_bytes());
        buf[ADDR_LEN..HEADER_LEN].copy_from_slice(self.receiver.as_bytes());
        Some(HEADER_LEN)
    }

    /// Read the header in front of `buf`. Short reads yield `None`.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_LEN {
            return None;
        }

        let mut sender = [0; ADDR_LEN];
        let mut receiver = [0; ADDR_LEN];
        sender.copy_from_slice(&buf[..ADDR_LEN]);
        receiver.copy_from_slice(&buf[ADDR_LEN..HEADER_LEN]);

        Some(Self {
            sender: Address(sender),
            receiver: Address(receiver),
        })
    }
}

/// A received frame borrowed from a receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub header: Header,
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn parse(buf: &'a [u8]) -> Option<Self> {
        let header = Header::decode(buf)?;
        Some(Self {
            header,
            payload: &buf[HEADER_LEN..],
        })
    }

    pub fn kind(&self) -> FrameKind {
        if !self.payload.is_empty() {
            FrameKind::Data
        } else if self.header.is_strobe_ack() {
            FrameKind::StrobeAck
        } else {
            FrameKind::Strobe
        }
    }
}

/// Write header and payload into `buf`, returning the frame length.
pub fn encode_data(header: &Header, payload: &[u8], buf: &mut [u8]) -> Option<usize> {
    let len = HEADER_LEN + payload.len();
    if payload.len() > MAX_PAYLOAD_LEN || buf.len() < len {
        return None;
    }

    header.encode(buf)?;
    buf[HEADER_LEN..len].copy_from_slice(payload);
    Some(len)
}
