// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! LLDP-based link discovery for a controller managing OpenFlow switches.
//!
//! We periodically send an LLDP probe out of every eligible port of every
//! connected switch, and install a flow on each switch that punts received
//! LLDP frames back to us.  When a probe sent by one switch comes back to us
//! from another, the two ports it names are cabled together.
//!
//! The switch inventory and the connections to the switches belong to the
//! controller.  It hands us an [`Inventory`] and a pair of channels when
//! building the [`Global`], feeds us [`InboundEvent`]s, and drains the
//! [`OutboundMessage`]s and [`LinkObserved`]s we produce.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use common::LogFormat;
use slog::debug;
use slog::error;
use slog::info;
use slog::o;
use structopt::StructOpt;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use errors::DiscoveryError;
pub use inventory::Device;
pub use inventory::Inventory;
pub use inventory::Port;
pub use outbox::Outbox;
pub use types::ConnectionId;
pub use types::DiscoveryResult;
pub use types::InboundEvent;
pub use types::InboundFrame;
pub use types::InterfaceId;
pub use types::LinkObserved;
pub use types::OutboundMessage;

use scheduler::ProbeScheduler;

pub mod api_server;
pub mod decoder;
mod errors;
pub mod flows;
pub mod interfaces;
mod inventory;
mod outbox;
pub mod probe;
pub mod scheduler;
mod types;

#[cfg(test)]
mod testutil;

#[derive(Clone, Debug, StructOpt)]
pub struct Settings {
    #[structopt(
        long,
        default_value = "3",
        help = "seconds between two rounds of LLDP probes"
    )]
    pub polling_time: u64,

    #[structopt(
        long,
        default_value = "1000",
        help = "priority of the flow punting LLDP frames to the controller"
    )]
    pub flow_priority: u16,

    #[structopt(
        long,
        help = "vlan to tag probes with and to match in the LLDP flow"
    )]
    pub flow_vlan: Option<u16>,

    #[structopt(
        long = "listen-addr",
        short = "a",
        help = "SocketAddr the config API should listen on, \
                in addition to localhost:12231"
    )]
    pub listen_addresses: Vec<SocketAddr>,

    #[structopt(long, help = "run without the config API")]
    pub no_api: bool,

    #[structopt(long, help = "log file")]
    pub log_file: Option<String>,

    #[structopt(
        long,
        short = "l",
        default_value = "json",
        help = "format logs for 'human' or 'json' consumption"
    )]
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            polling_time: common::DEFAULT_POLLING_TIME,
            flow_priority: common::DEFAULT_FLOW_PRIORITY,
            flow_vlan: None,
            listen_addresses: Vec::new(),
            no_api: false,
            log_file: None,
            log_format: LogFormat::Json,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> DiscoveryResult<()> {
        if self.polling_time == 0 {
            return Err(DiscoveryError::InvalidConfiguration(
                "polling time must be at least one second".to_string(),
            ));
        }
        if let Some(vid) = self.flow_vlan {
            if !(1..=4094).contains(&vid) {
                return Err(DiscoveryError::InvalidConfiguration(format!(
                    "vlan id must be between 1 and 4094, not {vid}"
                )));
            }
        }
        Ok(())
    }

    /// Build the root logger these settings describe.
    pub fn logger(&self) -> anyhow::Result<slog::Logger> {
        common::log_init("oflldp", &self.log_file, self.log_format)
    }
}

/// A running config API: the manager task and the channel that tells it
/// to re-evaluate its listen addresses, or to exit when dropped.
struct ApiHandle {
    tx: watch::Sender<()>,
    manager: JoinHandle<()>,
}

/// All state for the discovery service
pub struct Global {
    /// Root of the tree of loggers
    pub log: slog::Logger,
    /// Settings we were started with.  The polling time may since have been
    /// changed through the scheduler.
    pub settings: Settings,
    /// The controller's view of the switches
    pub inventory: Arc<dyn Inventory>,
    pub outbox: Outbox,
    pub scheduler: ProbeScheduler,
    /// Addresses the config API listens on, other than localhost
    pub listen_addresses: Mutex<Vec<SocketAddr>>,
    api: Mutex<Option<ApiHandle>>,
}

impl Global {
    /// Fails if the settings don't validate, so a `Global` never programs
    /// switches with an out-of-range vlan.
    pub fn new(
        log: &slog::Logger,
        settings: Settings,
        inventory: Arc<dyn Inventory>,
        outbox: Outbox,
    ) -> DiscoveryResult<Self> {
        settings.validate()?;
        let scheduler = ProbeScheduler::new(
            log,
            inventory.clone(),
            settings.flow_vlan,
            outbox.clone(),
            Duration::from_secs(settings.polling_time),
        );
        Ok(Global {
            log: log.clone(),
            listen_addresses: Mutex::new(settings.listen_addresses.clone()),
            settings,
            inventory,
            outbox,
            scheduler,
            api: Mutex::new(None),
        })
    }

    /// Start probing and, unless disabled, serving the config API.
    pub async fn start(self: &Arc<Self>) {
        self.scheduler.start().await;

        if !self.settings.no_api {
            let mut api = self.api.lock().unwrap();
            if api.is_none() {
                let (tx, rx) = watch::channel(());
                let g = self.clone();
                let manager = tokio::task::spawn(async move {
                    api_server::api_server_manager(g, rx).await
                });
                *api = Some(ApiHandle { tx, manager });
            }
        }
        info!(self.log, "link discovery started");
    }

    /// Stop probing and close all API servers.  The controller should stop
    /// feeding us events first.
    pub async fn shutdown(&self) {
        let api = self.api.lock().unwrap().take();
        if let Some(ApiHandle { tx, manager }) = api {
            debug!(self.log, "shutting down API server");
            drop(tx);
            if let Err(e) = manager.await {
                error!(
                    self.log,
                    "while shutting down the api_server_manager: {e}"
                );
            }
        }
        self.scheduler.stop().await;
        info!(self.log, "link discovery stopped");
    }

    /// Replace the set of extra addresses the config API listens on.
    pub fn set_listen_addresses(&self, addrs: Vec<SocketAddr>) {
        *self.listen_addresses.lock().unwrap() = addrs;
        if let Some(api) = self.api.lock().unwrap().as_ref() {
            // The manager only exits once we drop the sender
            let _ = api.tx.send(());
        }
    }

    pub fn device_ready(&self, device: &Device) {
        flows::install_lldp_flow(self, device);
    }

    pub fn packet_in(&self, frame: &InboundFrame) {
        decoder::notify_uplink_detected(self, frame);
    }
}

/// Dispatch the controller's events until it closes the channel.
pub async fn event_loop(g: Arc<Global>, mut rx: mpsc::Receiver<InboundEvent>) {
    let log = g.log.new(o!("unit" => "event-loop"));
    while let Some(event) = rx.recv().await {
        match event {
            InboundEvent::DeviceReady(device) => g.device_ready(&device),
            InboundEvent::PacketIn(frame) => g.packet_in(&frame),
        }
    }
    debug!(log, "inbound channel closed");
}

#[cfg(test)]
mod tests {
    use protocol::lldp;
    use protocol::DeviceId;
    use protocol::MacAddr;
    use protocol::ProtocolVersion;
    use protocol::TransportMessage;

    use super::*;
    use crate::testutil;

    #[test]
    fn test_settings_defaults() {
        let s = Settings::from_iter(["oflldp"]);
        assert_eq!(s.polling_time, 3);
        assert_eq!(s.flow_priority, 1000);
        assert_eq!(s.flow_vlan, None);
        assert!(s.listen_addresses.is_empty());
        assert_eq!(s.log_format, LogFormat::Json);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_settings_args() {
        let s = Settings::from_iter([
            "oflldp",
            "--polling-time",
            "10",
            "--flow-vlan",
            "3799",
            "--flow-priority",
            "2000",
            "-a",
            "0.0.0.0:12231",
            "-a",
            "[::]:12231",
            "-l",
            "human",
        ]);
        assert_eq!(s.polling_time, 10);
        assert_eq!(s.flow_vlan, Some(3799));
        assert_eq!(s.flow_priority, 2000);
        assert_eq!(s.listen_addresses.len(), 2);
        assert_eq!(s.log_format, LogFormat::Human);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_settings_validate() {
        for s in [
            Settings {
                polling_time: 0,
                ..Default::default()
            },
            Settings {
                flow_vlan: Some(0),
                ..Default::default()
            },
            Settings {
                flow_vlan: Some(4095),
                ..Default::default()
            },
        ] {
            assert!(matches!(
                s.validate(),
                Err(DiscoveryError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_logger_to_file() {
        let path = std::env::temp_dir()
            .join(format!("oflldp-{}.log", uuid::Uuid::new_v4()));
        let settings = Settings {
            log_file: Some(path.display().to_string()),
            log_format: LogFormat::Human,
            ..Default::default()
        };
        let log = settings.logger().unwrap();
        info!(log, "logger ready");
        drop(log);
        assert!(path.exists());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_new_rejects_bad_settings() {
        let inventory = Arc::new(testutil::FakeInventory::new(vec![]));
        for settings in [
            Settings {
                polling_time: 0,
                ..Default::default()
            },
            Settings {
                flow_vlan: Some(5000),
                ..Default::default()
            },
        ] {
            let c = testutil::channels(1);
            assert!(matches!(
                Global::new(
                    &testutil::log(),
                    settings,
                    inventory.clone(),
                    c.outbox
                ),
                Err(DiscoveryError::InvalidConfiguration(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_event_loop() {
        let a = testutil::device(1, Some(0x04), &[3]);
        let b = testutil::device(2, Some(0x01), &[5]);
        let settings = Settings {
            no_api: true,
            ..Default::default()
        };
        let h = testutil::harness(vec![a.clone(), b.clone()], settings);
        let g = Arc::new(h.global);
        let (tx, rx) = mpsc::channel(8);
        let el = tokio::spawn(event_loop(g.clone(), rx));

        let probe = lldp::encode_probe(
            ProtocolVersion::Of13,
            DeviceId(1),
            3,
            MacAddr::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01),
            None,
        )
        .unwrap();
        tx.send(InboundEvent::DeviceReady(b.clone())).await.unwrap();
        tx.send(InboundEvent::PacketIn(InboundFrame {
            source: b.clone(),
            in_port: 5,
            data: probe,
        }))
        .await
        .unwrap();
        drop(tx);
        el.await.unwrap();

        let mut messages = h.messages;
        let sent = testutil::drain(&mut messages);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].destination, b.connection);
        assert!(matches!(sent[0].message, TransportMessage::Of10FlowMod(_)));

        let mut links = h.links;
        let links = testutil::drain(&mut links);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].interface_a, InterfaceId::new(DeviceId(2), 5));
        assert_eq!(links[0].interface_b, InterfaceId::new(DeviceId(1), 3));
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let settings = Settings {
            no_api: true,
            ..Default::default()
        };
        let h = testutil::harness(
            vec![testutil::device(1, Some(0x04), &[1])],
            settings,
        );
        let g = Arc::new(h.global);
        g.start().await;
        g.start().await;
        assert_eq!(g.scheduler.live_tasks(), 1);

        let mut messages = h.messages;
        let probe =
            tokio::time::timeout(Duration::from_secs(5), messages.recv())
                .await
                .unwrap()
                .unwrap();
        assert!(matches!(probe.message, TransportMessage::Of13PacketOut(_)));

        g.shutdown().await;
        assert_eq!(g.scheduler.live_tasks(), 0);
    }
}
