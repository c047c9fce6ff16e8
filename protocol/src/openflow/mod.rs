// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! The two OpenFlow dialects we can talk to a switch in.
//!
//! OpenFlow 1.0 and 1.3 disagree on nearly every structure we need: port
//! numbers are 16 bits in one and 32 in the other, matches are a fixed
//! struct with wildcard bits in 1.0 and a list of OXM TLVs in 1.3, and 1.3
//! wraps flow actions in instructions.  [`ProtocolVersion`] is resolved once
//! per switch from the version byte negotiated at handshake time and carries
//! all of the per-dialect knowledge.

use std::fmt;

use bytes::BufMut;
use bytes::BytesMut;

use crate::invalid_error;
use crate::malformed;
use crate::CodecError;
use crate::CodecResult;

pub mod of10;
pub mod of13;

pub const OFPT_PACKET_OUT: u8 = 13;
pub const OFPT_FLOW_MOD: u8 = 14;

pub const OFP_HEADER_LEN: usize = 8;
pub const OFP_NO_BUFFER: u32 = 0xffff_ffff;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolVersion {
    /// OpenFlow 1.0, wire version 0x01
    Of10,
    /// OpenFlow 1.3, wire version 0x04
    Of13,
}

impl TryFrom<u8> for ProtocolVersion {
    type Error = CodecError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            of10::OFP_VERSION => Ok(ProtocolVersion::Of10),
            of13::OFP_VERSION => Ok(ProtocolVersion::Of13),
            x => Err(CodecError::UnsupportedVersion(x)),
        }
    }
}

impl From<ProtocolVersion> for u8 {
    fn from(v: ProtocolVersion) -> u8 {
        v.wire_version()
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProtocolVersion::Of10 => write!(f, "OpenFlow 1.0"),
            ProtocolVersion::Of13 => write!(f, "OpenFlow 1.3"),
        }
    }
}

impl ProtocolVersion {
    pub const fn wire_version(self) -> u8 {
        match self {
            ProtocolVersion::Of10 => of10::OFP_VERSION,
            ProtocolVersion::Of13 => of13::OFP_VERSION,
        }
    }

    /// The port number a switch uses for its own local networking stack.
    /// LLDP probes are never sent out of it.
    pub const fn reserved_local_port(self) -> u32 {
        match self {
            ProtocolVersion::Of10 => of10::OFPP_LOCAL as u32,
            ProtocolVersion::Of13 => of13::OFPP_LOCAL,
        }
    }

    pub const fn controller_port(self) -> u32 {
        match self {
            ProtocolVersion::Of10 => of10::OFPP_CONTROLLER as u32,
            ProtocolVersion::Of13 => of13::OFPP_CONTROLLER,
        }
    }

    /// Width in octets of a port number on the wire
    pub const fn port_width(self) -> usize {
        match self {
            ProtocolVersion::Of10 => 2,
            ProtocolVersion::Of13 => 4,
        }
    }

    /// Encode `port` big-endian at this version's width.
    pub fn encode_port(self, port: u32) -> CodecResult<Vec<u8>> {
        match self {
            ProtocolVersion::Of10 => {
                Ok(of10_port(port)?.to_be_bytes().to_vec())
            }
            ProtocolVersion::Of13 => Ok(port.to_be_bytes().to_vec()),
        }
    }

    /// Decode a big-endian port number from the front of `data`.  Any
    /// octets beyond this version's width are ignored.
    pub fn decode_port(self, data: &[u8]) -> CodecResult<u32> {
        let width = self.port_width();
        match data.get(..width) {
            Some(b) => Ok(b.iter().fold(0u32, |acc, o| acc << 8 | *o as u32)),
            None => Err(malformed(
                0,
                format!("port id has {} octets, need {width}", data.len()),
            )),
        }
    }

    /// Build a PacketOut that emits `data` on `port`.
    pub fn packet_out(
        self,
        port: u32,
        data: Vec<u8>,
    ) -> CodecResult<TransportMessage> {
        match self {
            ProtocolVersion::Of10 => Ok(TransportMessage::Of10PacketOut(
                of10::PacketOut::new(of10_port(port)?, data),
            )),
            ProtocolVersion::Of13 => Ok(TransportMessage::Of13PacketOut(
                of13::PacketOut::new(port, data),
            )),
        }
    }

    /// Build the FlowMod that sends all LLDP traffic, optionally restricted
    /// to a single vlan, to the controller.
    pub fn flow_mod(
        self,
        priority: u16,
        eth_type: u16,
        vlan: Option<u16>,
    ) -> CodecResult<TransportMessage> {
        if let Some(vid) = vlan {
            if vid > 0xfff {
                return Err(invalid_error(format!(
                    "vlan id {vid} exceeds 12 bits"
                )));
            }
        }
        Ok(match self {
            ProtocolVersion::Of10 => TransportMessage::Of10FlowMod(
                of10::FlowMod::to_controller(priority, eth_type, vlan),
            ),
            ProtocolVersion::Of13 => TransportMessage::Of13FlowMod(
                of13::FlowMod::to_controller(priority, eth_type, vlan),
            ),
        })
    }
}

fn of10_port(port: u32) -> CodecResult<u16> {
    u16::try_from(port).map_err(|_| {
        invalid_error(format!("port {port} is too wide for OpenFlow 1.0"))
    })
}

/// A message ready to be handed to a switch's connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportMessage {
    Of10PacketOut(of10::PacketOut),
    Of10FlowMod(of10::FlowMod),
    Of13PacketOut(of13::PacketOut),
    Of13FlowMod(of13::FlowMod),
}

impl TransportMessage {
    pub fn version(&self) -> ProtocolVersion {
        match self {
            TransportMessage::Of10PacketOut(_)
            | TransportMessage::Of10FlowMod(_) => ProtocolVersion::Of10,
            TransportMessage::Of13PacketOut(_)
            | TransportMessage::Of13FlowMod(_) => ProtocolVersion::Of13,
        }
    }

    pub fn msg_type(&self) -> u8 {
        match self {
            TransportMessage::Of10PacketOut(_)
            | TransportMessage::Of13PacketOut(_) => OFPT_PACKET_OUT,
            TransportMessage::Of10FlowMod(_)
            | TransportMessage::Of13FlowMod(_) => OFPT_FLOW_MOD,
        }
    }

    /// Serialize the message, header included.  Transaction ids are owned by
    /// the connection, so the caller supplies one.
    pub fn deparse(&self, xid: u32) -> Vec<u8> {
        let mut body = BytesMut::new();
        match self {
            TransportMessage::Of10PacketOut(m) => m.deparse(&mut body),
            TransportMessage::Of10FlowMod(m) => m.deparse(&mut body),
            TransportMessage::Of13PacketOut(m) => m.deparse(&mut body),
            TransportMessage::Of13FlowMod(m) => m.deparse(&mut body),
        }

        let len = OFP_HEADER_LEN + body.len();
        let mut v = BytesMut::with_capacity(len);
        v.put_u8(self.version().wire_version());
        v.put_u8(self.msg_type());
        // Neither a probe nor a flow-mod comes anywhere near 64k
        v.put_u16(len as u16);
        v.put_u32(xid);
        v.put_slice(&body);
        v.to_vec()
    }
}

impl fmt::Display for TransportMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let v = self.version();
        match self {
            TransportMessage::Of10PacketOut(m) => {
                write!(f, "{v} PacketOut ({} bytes)", m.data.len())
            }
            TransportMessage::Of13PacketOut(m) => {
                write!(f, "{v} PacketOut ({} bytes)", m.data.len())
            }
            TransportMessage::Of10FlowMod(m) => {
                write!(f, "{v} FlowMod (priority {})", m.priority)
            }
            TransportMessage::Of13FlowMod(m) => {
                write!(f, "{v} FlowMod (priority {})", m.priority)
            }
        }
    }
}
