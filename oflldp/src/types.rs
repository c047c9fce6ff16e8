// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use protocol::DeviceId;
use protocol::TransportMessage;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::errors;
use crate::inventory::Device;

pub type DiscoveryResult<T> = Result<T, errors::DiscoveryError>;

/// Handle on a switch's control channel, as assigned by the transport.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConnectionId(pub uuid::Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        ConnectionId(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single port of a single switch, rendered as `dpid:port`.
#[derive(
    Clone,
    Copy,
    Debug,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Deserialize,
    JsonSchema,
    Serialize,
)]
pub struct InterfaceId {
    pub dpid: DeviceId,
    pub port: u32,
}

impl InterfaceId {
    pub fn new(dpid: DeviceId, port: u32) -> Self {
        InterfaceId { dpid, port }
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.dpid, self.port)
    }
}

impl FromStr for InterfaceId {
    type Err = errors::DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (dpid, port) = s.rsplit_once(':').ok_or_else(|| {
            errors::DiscoveryError::Invalid(format!("not an interface id: {s}"))
        })?;
        let port = port.parse::<u32>().map_err(|_| {
            errors::DiscoveryError::Invalid(format!("invalid port in {s}"))
        })?;
        Ok(InterfaceId::new(dpid.parse()?, port))
    }
}

/// A message to be written to a switch's control channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub destination: ConnectionId,
    pub message: TransportMessage,
}

/// Two interfaces found to be cabled together.  `interface_a` is where the
/// probe was received and `interface_b` is where it was sent from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, JsonSchema)]
pub struct LinkObserved {
    pub interface_a: InterfaceId,
    pub interface_b: InterfaceId,
    pub observed_at: DateTime<Utc>,
}

/// A frame a switch punted to us.
#[derive(Clone, Debug)]
pub struct InboundFrame {
    /// Snapshot of the switch the frame arrived on
    pub source: Device,
    pub in_port: u32,
    pub data: Vec<u8>,
}

/// Events delivered to us by the controller.
#[derive(Clone, Debug)]
pub enum InboundEvent {
    /// A switch finished its handshake and is ready for flow programming
    DeviceReady(Device),
    PacketIn(InboundFrame),
}
