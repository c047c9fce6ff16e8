// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! Construction and inspection of the LLDP probes used for link discovery.
//!
//! A probe is a minimal LLDPDU: a chassis-id carrying the sending switch's
//! datapath id, a port-id carrying the OpenFlow port number it was sent
//! from, a TTL and the end marker.  The port number is encoded at the width
//! of the sending switch's OpenFlow version, so decoding it requires knowing
//! which version the sender speaks.

use crate::malformed;
use crate::packet::find_tlv;
use crate::packet::LldpTlv;
use crate::packet::Packet;
use crate::types::Scope;
use crate::types::TlvType;
use crate::types::LLDP_TTL;
use crate::types::LOCALLY_ASSIGNED_SUBTYPE;
use crate::CodecResult;
use crate::DeviceId;
use crate::MacAddr;
use crate::ProtocolVersion;

const DEVICE_ID_LEN: usize = 8;

/// Build the ethernet frame announcing `port` of switch `device`.
pub fn encode_probe(
    version: ProtocolVersion,
    device: DeviceId,
    port: u32,
    mac: MacAddr,
    vlan: Option<u16>,
) -> CodecResult<Vec<u8>> {
    let mut packet = Packet::new(Scope::Bridge.into(), mac);
    if let Some(vid) = vlan {
        packet.set_vlan(vid)?;
    }

    packet.add_tlv(LldpTlv::with_subtype(
        TlvType::ChassisId,
        LOCALLY_ASSIGNED_SUBTYPE,
        &device.to_be_bytes(),
    )?);
    packet.add_tlv(LldpTlv::with_subtype(
        TlvType::PortId,
        LOCALLY_ASSIGNED_SUBTYPE,
        &version.encode_port(port)?,
    )?);
    packet.add_tlv(LldpTlv::new(TlvType::Ttl, &LLDP_TTL.to_be_bytes())?);
    packet.add_tlv(LldpTlv::new(TlvType::EndOfLLDPDU, &[])?);

    Ok(packet.deparse())
}

/// Extract the sender's datapath id from the LLDPDU following the ethernet
/// header.
pub fn decode_chassis_id(lldpdu: &[u8]) -> CodecResult<DeviceId> {
    let tlv = find_tlv(lldpdu, TlvType::ChassisId)?;
    let value = tlv.sub_value();
    match value.get(..DEVICE_ID_LEN) {
        Some(b) => {
            let mut id = [0u8; DEVICE_ID_LEN];
            id.copy_from_slice(b);
            Ok(DeviceId::from_be_bytes(id))
        }
        None => Err(malformed(
            0,
            format!(
                "chassis id has {} octets, need {DEVICE_ID_LEN}",
                value.len()
            ),
        )),
    }
}

/// Extract the sender's port number from the LLDPDU following the ethernet
/// header.  `version` is the version of the *sending* switch.
pub fn decode_port_id(
    lldpdu: &[u8],
    version: ProtocolVersion,
) -> CodecResult<u32> {
    let tlv = find_tlv(lldpdu, TlvType::PortId)?;
    version.decode_port(tlv.sub_value())
}
