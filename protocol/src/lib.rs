// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! Wire codecs for LLDP-based link discovery on OpenFlow switches.
//!
//! This crate knows how to lay out an LLDP probe frame, how to pull the
//! sender's identity back out of one, and how to wrap probes and the
//! LLDP-to-controller flow into OpenFlow 1.0 and 1.3 messages.  It has no
//! knowledge of switches, ports or transports beyond the raw values handed
//! to it.

use thiserror::Error;

pub mod lldp;
pub mod macaddr;
pub mod openflow;
pub mod packet;
pub mod types;

pub use macaddr::MacAddr;
pub use openflow::ProtocolVersion;
pub use openflow::TransportMessage;
pub use types::DeviceId;

/// Errors raised while encoding or decoding discovery traffic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The switch speaks an OpenFlow version we can't build messages for.
    #[error("unsupported OpenFlow version: {0:#04x}")]
    UnsupportedVersion(u8),
    /// An inbound frame could not be parsed.  We make no attempt to tell a
    /// truncated frame from one built by some other LLDP speaker.
    #[error("malformed frame at byte {byte}: {message}")]
    MalformedFrame { message: String, byte: usize },
    /// An argument to an encoder was out of range for the wire format
    #[error("Invalid argument: {0}")]
    Invalid(String),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Utility function to generate a MalformedFrame error
pub fn malformed(byte: usize, message: impl ToString) -> CodecError {
    CodecError::MalformedFrame {
        message: message.to_string(),
        byte,
    }
}

/// Utility function to generate an Invalid error
pub fn invalid_error(message: impl ToString) -> CodecError {
    CodecError::Invalid(message.to_string())
}
