// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

use slog::debug;

use crate::errors::DiscoveryError;
use crate::inventory::Inventory;
use crate::types::DiscoveryResult;
use crate::types::InterfaceId;
use crate::Global;

/// All interfaces we may send probes out of
pub fn discovery_interfaces(inventory: &dyn Inventory) -> Vec<InterfaceId> {
    inventory
        .devices()
        .iter()
        .flat_map(|d| {
            d.ports
                .values()
                .filter(|p| p.discovery)
                .map(|p| InterfaceId::new(d.id, p.number))
        })
        .collect()
}

/// Turn probing on or off for each of the named interfaces.  Every
/// interface that can be found is updated, even if some can't.  Empty
/// names are skipped.
pub fn set_discovery(
    g: &Global,
    names: &[String],
    enabled: bool,
) -> DiscoveryResult<()> {
    let inventory = g.inventory.as_ref();
    if inventory.devices().iter().all(|d| d.ports.is_empty()) {
        return Err(DiscoveryError::Missing(
            "No interfaces were found.".to_string(),
        ));
    }

    let mut missing = Vec::new();
    for name in names.iter().filter(|n| !n.is_empty()) {
        let found = match name.parse::<InterfaceId>() {
            Ok(iface) => inventory.set_discovery(&iface, enabled),
            Err(_) => false,
        };
        if found {
            debug!(g.log, "lldp {} on {name}",
                if enabled { "enabled" } else { "disabled" });
        } else {
            missing.push(name.clone());
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DiscoveryError::UnknownInterfaces(missing))
    }
}
