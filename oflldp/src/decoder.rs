// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! Turns probes punted to us by one switch into links to another.
//!
//! A probe received on port `in_port` of switch A names, in its chassis-id
//! and port-id, the switch B and port it was sent from.  B's port number is
//! encoded at the width of B's OpenFlow version, so B has to be looked up
//! before its port-id can be read.

use chrono::Utc;
use protocol::lldp;
use protocol::packet::decode_ethernet;
use protocol::packet::ETHER_LLDP;
use slog::debug;
use slog::o;
use slog::trace;

use crate::errors::DiscoveryError;
use crate::inventory::Device;
use crate::inventory::Inventory;
use crate::types::DiscoveryResult;
use crate::types::InboundFrame;
use crate::types::InterfaceId;
use crate::types::LinkObserved;
use crate::Global;

fn resolve(device: &Device, port: u32) -> DiscoveryResult<InterfaceId> {
    device.interface(port).ok_or_else(|| {
        DiscoveryError::Missing(format!("no port {port} on {}", device.id))
    })
}

/// Decode a single inbound frame.  Frames that aren't LLDP at all yield
/// `Ok(None)`.  Every other failure is an error, and nothing is emitted.
pub fn decode(
    inventory: &dyn Inventory,
    frame: &InboundFrame,
) -> DiscoveryResult<Option<LinkObserved>> {
    let (hdr, lldpdu) = decode_ethernet(&frame.data)?;
    if hdr.eth_type != ETHER_LLDP {
        return Ok(None);
    }

    let dpid = lldp::decode_chassis_id(lldpdu)?;
    let device_a = &frame.source;
    let device_b = inventory
        .device(dpid)
        .ok_or(DiscoveryError::UnknownPeer(dpid))?;
    let version_b = device_b.protocol_version()?.ok_or_else(|| {
        DiscoveryError::Missing(format!("OpenFlow version of {dpid}"))
    })?;
    let port_b = lldp::decode_port_id(lldpdu, version_b)?;

    Ok(Some(LinkObserved {
        interface_a: resolve(device_a, frame.in_port)?,
        interface_b: resolve(&device_b, port_b)?,
        observed_at: Utc::now(),
    }))
}

/// Handle a PacketIn.  Anything we can't turn into a link is dropped with a
/// debug message.  Most of those will be LLDP frames from some other speaker
/// on the segment.
pub fn notify_uplink_detected(g: &Global, frame: &InboundFrame) {
    let log = g.log.new(o!(
        "unit" => "decoder",
        "dpid" => frame.source.id.to_string(),
        "in_port" => frame.in_port,
    ));

    match decode(g.inventory.as_ref(), frame) {
        Ok(Some(link)) => {
            debug!(log, "link detected: {} <-> {}",
                link.interface_a, link.interface_b);
            g.outbox.send_link(link);
        }
        Ok(None) => trace!(log, "ignoring non-lldp frame"),
        Err(e) => debug!(log, "dropping lldp frame: {e}"),
    }
}
