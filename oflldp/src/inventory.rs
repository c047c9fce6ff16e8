// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! The switch and port inventory is owned by the controller we are embedded
//! in.  We only ever see it through the [`Inventory`] trait, and every lookup
//! returns a snapshot, so nothing here outlives a single tick or frame.

use std::collections::BTreeMap;

use protocol::DeviceId;
use protocol::MacAddr;
use protocol::ProtocolVersion;

use crate::types::ConnectionId;
use crate::types::DiscoveryResult;
use crate::types::InterfaceId;

pub trait Inventory: Send + Sync {
    /// All devices currently known, connected or not
    fn devices(&self) -> Vec<Device>;

    fn device(&self, id: DeviceId) -> Option<Device>;

    /// Set the discovery-eligible flag on an interface.  Returns false if
    /// the interface doesn't exist.
    fn set_discovery(&self, iface: &InterfaceId, enabled: bool) -> bool;
}

#[derive(Clone, Debug)]
pub struct Device {
    pub id: DeviceId,
    /// Wire version negotiated on the control channel, if the handshake has
    /// got that far.
    pub version: Option<u8>,
    pub connection: ConnectionId,
    pub connected: bool,
    pub ports: BTreeMap<u32, Port>,
}

impl Device {
    /// `Ok(None)` while the version is still unknown.
    pub fn protocol_version(&self) -> DiscoveryResult<Option<ProtocolVersion>> {
        match self.version {
            None => Ok(None),
            Some(v) => Ok(Some(ProtocolVersion::try_from(v)?)),
        }
    }

    pub fn port(&self, number: u32) -> Option<&Port> {
        self.ports.get(&number)
    }

    pub fn interface(&self, number: u32) -> Option<InterfaceId> {
        self.port(number).map(|p| InterfaceId::new(self.id, p.number))
    }
}

#[derive(Clone, Debug)]
pub struct Port {
    pub number: u32,
    pub mac: MacAddr,
    /// Link is up
    pub active: bool,
    /// Administratively enabled
    pub enabled: bool,
    /// Probes may be sent out of this port
    pub discovery: bool,
}
