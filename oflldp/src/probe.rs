// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

use protocol::lldp;
use protocol::DeviceId;
use protocol::MacAddr;
use protocol::ProtocolVersion;
use protocol::TransportMessage;

use crate::types::DiscoveryResult;

/// Build the PacketOut that emits a discovery probe on `port` of a switch
/// speaking wire version `version`.
pub fn build(
    version: u8,
    device_id: DeviceId,
    port: u32,
    mac: MacAddr,
    vlan: Option<u16>,
) -> DiscoveryResult<TransportMessage> {
    let version = ProtocolVersion::try_from(version)?;
    let frame = lldp::encode_probe(version, device_id, port, mac, vlan)?;
    Ok(version.packet_out(port, frame)?)
}
