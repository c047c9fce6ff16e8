// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! An in-memory inventory and channel plumbing for unit tests.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use protocol::DeviceId;
use protocol::MacAddr;
use tokio::sync::mpsc;

use crate::inventory::Device;
use crate::inventory::Inventory;
use crate::inventory::Port;
use crate::outbox::Outbox;
use crate::types::ConnectionId;
use crate::types::InterfaceId;
use crate::types::LinkObserved;
use crate::types::OutboundMessage;
use crate::Global;
use crate::Settings;

pub fn log() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

/// A MAC derived from the device and port, so every port's is distinct.
pub fn mac(id: u64, port: u32) -> MacAddr {
    MacAddr::new(0xaa, 0xbb, 0xcc, id as u8, (port >> 8) as u8, port as u8)
}

pub fn port(number: u32, mac: MacAddr) -> Port {
    Port {
        number,
        mac,
        active: true,
        enabled: true,
        discovery: true,
    }
}

/// A connected device with every port eligible for discovery
pub fn device(id: u64, version: Option<u8>, ports: &[u32]) -> Device {
    Device {
        id: DeviceId(id),
        version,
        connection: ConnectionId::new(),
        connected: true,
        ports: ports.iter().map(|n| (*n, port(*n, mac(id, *n)))).collect(),
    }
}

#[derive(Default)]
pub struct FakeInventory {
    devices: Mutex<BTreeMap<DeviceId, Device>>,
}

impl FakeInventory {
    pub fn new(devices: Vec<Device>) -> Self {
        FakeInventory {
            devices: Mutex::new(
                devices.into_iter().map(|d| (d.id, d)).collect(),
            ),
        }
    }

    pub fn discovery(&self, iface: &InterfaceId) -> Option<bool> {
        self.devices
            .lock()
            .unwrap()
            .get(&iface.dpid)
            .and_then(|d| d.port(iface.port).map(|p| p.discovery))
    }
}

impl Inventory for FakeInventory {
    fn devices(&self) -> Vec<Device> {
        self.devices.lock().unwrap().values().cloned().collect()
    }

    fn device(&self, id: DeviceId) -> Option<Device> {
        self.devices.lock().unwrap().get(&id).cloned()
    }

    fn set_discovery(&self, iface: &InterfaceId, enabled: bool) -> bool {
        let mut devices = self.devices.lock().unwrap();
        match devices
            .get_mut(&iface.dpid)
            .and_then(|d| d.ports.get_mut(&iface.port))
        {
            Some(p) => {
                p.discovery = enabled;
                true
            }
            None => false,
        }
    }
}

pub struct Channels {
    pub outbox: Outbox,
    pub messages: mpsc::Receiver<OutboundMessage>,
    pub links: mpsc::Receiver<LinkObserved>,
}

pub fn channels(depth: usize) -> Channels {
    let (msg_tx, messages) = mpsc::channel(depth);
    let (link_tx, links) = mpsc::channel(depth);
    Channels {
        outbox: Outbox::new(&log(), msg_tx, link_tx),
        messages,
        links,
    }
}

/// Everything queued so far, without waiting for more
pub fn drain<T>(rx: &mut mpsc::Receiver<T>) -> Vec<T> {
    let mut all = Vec::new();
    while let Ok(m) = rx.try_recv() {
        all.push(m);
    }
    all
}

/// A `Global` over a fake inventory, with the receiving ends of its outputs
pub struct Harness {
    pub inventory: Arc<FakeInventory>,
    pub global: Global,
    pub messages: mpsc::Receiver<OutboundMessage>,
    pub links: mpsc::Receiver<LinkObserved>,
}

pub fn harness(devices: Vec<Device>, settings: Settings) -> Harness {
    let inventory = Arc::new(FakeInventory::new(devices));
    let c = channels(64);
    Harness {
        global: Global::new(&log(), settings, inventory.clone(), c.outbox)
            .unwrap(),
        inventory,
        messages: c.messages,
        links: c.links,
    }
}
