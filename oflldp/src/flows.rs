// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

use protocol::packet::ETHER_LLDP;
use protocol::ProtocolVersion;
use protocol::TransportMessage;
use slog::debug;
use slog::info;
use slog::o;
use slog::warn;

use crate::errors::DiscoveryError;
use crate::inventory::Device;
use crate::types::DiscoveryResult;
use crate::types::OutboundMessage;
use crate::Global;

/// Build the FlowMod that punts LLDP frames to the controller.
pub fn build(
    version: u8,
    priority: u16,
    vlan: Option<u16>,
) -> DiscoveryResult<TransportMessage> {
    let version = ProtocolVersion::try_from(version)?;
    version
        .flow_mod(priority, ETHER_LLDP, vlan)
        .map_err(|e| e.into())
}

/// Called each time a switch becomes ready.  The switch may have lost its
/// flow table across a reconnect, so we install unconditionally.
pub fn install_lldp_flow(g: &Global, device: &Device) {
    let log = g.log.new(o!(
        "unit" => "flow-installer",
        "dpid" => device.id.to_string(),
    ));

    let Some(version) = device.version else {
        debug!(log, "no OpenFlow version yet, skipping flow install");
        return;
    };

    match build(version, g.settings.flow_priority, g.settings.flow_vlan) {
        Ok(message) => {
            info!(log, "installing lldp flow"; "version" => version);
            g.outbox.send_message(OutboundMessage {
                destination: device.connection,
                message,
            });
        }
        Err(DiscoveryError::UnsupportedVersion(v)) => {
            warn!(log, "OpenFlow version {v:#04x} is not supported");
        }
        Err(e) => warn!(log, "failed to build lldp flow: {e}"),
    }
}
