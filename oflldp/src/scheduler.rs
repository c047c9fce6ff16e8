// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! Periodic transmission of discovery probes.
//!
//! Each tick walks the whole inventory and emits one probe per eligible port
//! of every connected switch.  A tick never awaits, so the probing task can
//! only be cancelled between ticks and a probe round is never half sent.
//!
//! The polling interval can be changed while we run.  Changing it replaces
//! the probing task, and the replacement is serialized behind a single async
//! lock so that concurrent reconfigurations can't leave two tasks running.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use protocol::ProtocolVersion;
use slog::debug;
use slog::info;
use slog::o;
use slog::warn;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::errors::DiscoveryError;
use crate::inventory::Inventory;
use crate::inventory::Port;
use crate::outbox::Outbox;
use crate::probe;
use crate::types::DiscoveryResult;
use crate::types::OutboundMessage;

/// Whether a probe may be sent out of `port`.
pub fn eligible(port: &Port, version: ProtocolVersion) -> bool {
    port.discovery
        && port.active
        && port.enabled
        && port.number != version.reserved_local_port()
}

/// Run a single round of probing, returning the number of probes queued.
pub fn execute(
    log: &slog::Logger,
    inventory: &dyn Inventory,
    vlan: Option<u16>,
    outbox: &Outbox,
) -> usize {
    let mut sent = 0;
    for device in inventory.devices() {
        if !device.connected {
            continue;
        }
        let version = match device.protocol_version() {
            Ok(Some(v)) => v,
            // Still handshaking.  We'll get it next time around.
            Ok(None) => continue,
            Err(e) => {
                warn!(log, "skipping {}: {e}", device.id);
                continue;
            }
        };

        for port in device.ports.values() {
            if !eligible(port, version) {
                continue;
            }
            match probe::build(
                version.wire_version(),
                device.id,
                port.number,
                port.mac,
                vlan,
            ) {
                Ok(message) => {
                    outbox.send_message(OutboundMessage {
                        destination: device.connection,
                        message,
                    });
                    sent += 1;
                }
                Err(e) => {
                    debug!(log, "no probe for {}:{}: {e}",
                        device.id, port.number)
                }
            }
        }
    }
    sent
}

/// Everything a probing task needs to run a tick
#[derive(Clone)]
struct Prober {
    log: slog::Logger,
    inventory: Arc<dyn Inventory>,
    vlan: Option<u16>,
    outbox: Outbox,
}

impl Prober {
    async fn run(self, period: Duration, _live: LiveGuard) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let sent = execute(
                &self.log,
                self.inventory.as_ref(),
                self.vlan,
                &self.outbox,
            );
            debug!(self.log, "sent {sent} probes");
        }
    }
}

/// Counts a probing task as live from the moment it is spawned until its
/// future is dropped.
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn new(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        LiveGuard(live.clone())
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ProbeScheduler {
    log: slog::Logger,
    prober: Prober,
    interval: Mutex<Duration>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    live: Arc<AtomicUsize>,
}

/// Turn a user-supplied number of seconds into a polling period.
pub fn validate_interval(secs: i64) -> DiscoveryResult<Duration> {
    match u64::try_from(secs) {
        Ok(s) if s > 0 => Ok(Duration::from_secs(s)),
        _ => Err(DiscoveryError::InvalidConfiguration(format!(
            "polling time must be a positive number of seconds, not {secs}"
        ))),
    }
}

impl ProbeScheduler {
    pub fn new(
        log: &slog::Logger,
        inventory: Arc<dyn Inventory>,
        vlan: Option<u16>,
        outbox: Outbox,
        interval: Duration,
    ) -> Self {
        let log = log.new(o!("unit" => "probe-scheduler"));
        ProbeScheduler {
            prober: Prober {
                log: log.clone(),
                inventory,
                vlan,
                outbox,
            },
            log,
            interval: Mutex::new(interval),
            task: tokio::sync::Mutex::new(None),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn spawn(&self, period: Duration) -> JoinHandle<()> {
        let guard = LiveGuard::new(&self.live);
        tokio::spawn(self.prober.clone().run(period, guard))
    }

    async fn halt(&self, task: &mut Option<JoinHandle<()>>) {
        if let Some(hdl) = task.take() {
            hdl.abort();
            // Wait for the future to be dropped, not just cancelled
            let _ = hdl.await;
        }
    }

    /// Start probing at the current interval, if we aren't already.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.is_none() {
            let period = self.interval();
            info!(self.log, "starting probes every {}s", period.as_secs());
            *task = Some(self.spawn(period));
        }
    }

    /// Change the polling interval.  An invalid interval leaves the running
    /// task untouched.  If we are probing, the task is replaced so the new
    /// interval takes effect immediately.
    pub async fn set_interval(&self, secs: i64) -> DiscoveryResult<()> {
        let period = validate_interval(secs)?;

        let mut task = self.task.lock().await;
        *self.interval.lock().unwrap() = period;
        if task.is_some() {
            self.halt(&mut task).await;
            *task = Some(self.spawn(period));
        }
        info!(self.log, "polling time set to {secs}s");
        Ok(())
    }

    /// As [`ProbeScheduler::set_interval`], for a number of seconds that
    /// hasn't been parsed yet.
    pub async fn parse_interval(&self, secs: &str) -> DiscoveryResult<()> {
        let secs = secs.trim().parse::<i64>().map_err(|_| {
            DiscoveryError::InvalidConfiguration(format!(
                "polling time is not a number: {secs:?}"
            ))
        })?;
        self.set_interval(secs).await
    }

    pub fn interval(&self) -> Duration {
        *self.interval.lock().unwrap()
    }

    pub async fn stop(&self) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            info!(self.log, "stopping probes");
            self.halt(&mut task).await;
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }

    /// Number of probing tasks whose futures have not yet been dropped
    pub fn live_tasks(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use protocol::lldp;
    use protocol::packet::decode_ethernet;
    use protocol::DeviceId;
    use protocol::TransportMessage;

    use super::*;
    use crate::testutil;
    use crate::testutil::FakeInventory;

    // Pull the (device, port) a probe announces back out of it
    fn announced(msg: &OutboundMessage) -> (DeviceId, u32) {
        let (version, data) = match &msg.message {
            TransportMessage::Of10PacketOut(p) => {
                (ProtocolVersion::Of10, &p.data)
            }
            TransportMessage::Of13PacketOut(p) => {
                (ProtocolVersion::Of13, &p.data)
            }
            m => panic!("not a probe: {m:?}"),
        };
        let (_, lldpdu) = decode_ethernet(data).unwrap();
        (
            lldp::decode_chassis_id(lldpdu).unwrap(),
            lldp::decode_port_id(lldpdu, version).unwrap(),
        )
    }

    #[test]
    fn test_eligible_conditions() {
        let mac = testutil::mac(1, 1);
        for version in [ProtocolVersion::Of10, ProtocolVersion::Of13] {
            assert!(eligible(&testutil::port(1, mac), version));

            // Each condition on its own excludes the port
            let mut p = testutil::port(1, mac);
            p.discovery = false;
            assert!(!eligible(&p, version));

            let mut p = testutil::port(1, mac);
            p.active = false;
            assert!(!eligible(&p, version));

            let mut p = testutil::port(1, mac);
            p.enabled = false;
            assert!(!eligible(&p, version));

            let p = testutil::port(version.reserved_local_port(), mac);
            assert!(!eligible(&p, version));

            // Every combination of the four
            for bits in 0u8..16 {
                let mut p = testutil::port(1, mac);
                p.discovery = bits & 1 == 0;
                p.active = bits & 2 == 0;
                p.enabled = bits & 4 == 0;
                if bits & 8 != 0 {
                    p.number = version.reserved_local_port();
                }
                assert_eq!(eligible(&p, version), bits == 0, "bits {bits:04b}");
            }
        }
    }

    #[test]
    fn test_local_port_is_per_version() {
        // 1.0's LOCAL is an ordinary port number to a 1.3 switch
        let p = testutil::port(0xfffe, testutil::mac(1, 1));
        assert!(!eligible(&p, ProtocolVersion::Of10));
        assert!(eligible(&p, ProtocolVersion::Of13));
    }

    #[test]
    fn test_execute() {
        let mut skipped =
            testutil::device(1, Some(0x04), &[1, 2, 3, 4, 0xffff_fffe]);
        skipped.ports.get_mut(&1).unwrap().discovery = false;
        skipped.ports.get_mut(&2).unwrap().active = false;
        skipped.ports.get_mut(&3).unwrap().enabled = false;

        let mut disconnected = testutil::device(4, Some(0x04), &[1]);
        disconnected.connected = false;

        let of10 = testutil::device(2, Some(0x01), &[1, 2, 0xfffe]);
        let inventory = FakeInventory::new(vec![
            skipped.clone(),
            of10.clone(),
            disconnected,
            testutil::device(3, None, &[1]),
            testutil::device(5, Some(0x05), &[1]),
        ]);

        let mut c = testutil::channels(32);
        let sent = execute(&testutil::log(), &inventory, None, &c.outbox);
        assert_eq!(sent, 3);

        let msgs = testutil::drain(&mut c.messages);
        let got: BTreeSet<(DeviceId, u32)> =
            msgs.iter().map(announced).collect();
        let want = BTreeSet::from([
            (DeviceId(1), 4),
            (DeviceId(2), 1),
            (DeviceId(2), 2),
        ]);
        assert_eq!(got, want);

        for m in &msgs {
            let (id, _) = announced(m);
            let dest = if id == DeviceId(1) {
                skipped.connection
            } else {
                of10.connection
            };
            assert_eq!(m.destination, dest);
        }
    }

    #[test]
    fn test_execute_vlan() {
        let inventory =
            FakeInventory::new(vec![testutil::device(1, Some(0x01), &[7])]);
        let mut c = testutil::channels(4);
        execute(&testutil::log(), &inventory, Some(42), &c.outbox);
        let msgs = testutil::drain(&mut c.messages);
        let TransportMessage::Of10PacketOut(p) = &msgs[0].message else {
            panic!("expected an OpenFlow 1.0 PacketOut");
        };
        let (hdr, _) = decode_ethernet(&p.data).unwrap();
        assert_eq!(hdr.eth_8021q.map(|q| q.eth_vlan_tag), Some(42));
    }

    fn scheduler(
        interval: u64,
    ) -> (ProbeScheduler, tokio::sync::mpsc::Receiver<OutboundMessage>) {
        let inventory = Arc::new(FakeInventory::new(vec![testutil::device(
            1,
            Some(0x04),
            &[1],
        )]));
        let c = testutil::channels(64);
        let s = ProbeScheduler::new(
            &testutil::log(),
            inventory,
            None,
            c.outbox,
            Duration::from_secs(interval),
        );
        (s, c.messages)
    }

    #[test]
    fn test_validate_interval() {
        assert_eq!(validate_interval(3).unwrap(), Duration::from_secs(3));
        assert!(matches!(
            validate_interval(0),
            Err(DiscoveryError::InvalidConfiguration(_))
        ));
        assert!(validate_interval(-5).is_err());
    }

    #[tokio::test]
    async fn test_first_tick_probes() {
        let (s, mut rx) = scheduler(1);
        s.start().await;
        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(announced(&first), (DeviceId(1), 1));
        s.stop().await;
        assert_eq!(s.live_tasks(), 0);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (s, _rx) = scheduler(3);
        s.start().await;
        s.start().await;
        assert_eq!(s.live_tasks(), 1);
        s.stop().await;
        assert!(!s.is_running().await);
        assert_eq!(s.live_tasks(), 0);
    }

    #[tokio::test]
    async fn test_invalid_interval_keeps_task() {
        let (s, _rx) = scheduler(3);
        s.start().await;
        for bad in ["0", "-1", "abc", "", "3.5"] {
            assert!(matches!(
                s.parse_interval(bad).await,
                Err(DiscoveryError::InvalidConfiguration(_))
            ));
        }
        assert_eq!(s.interval(), Duration::from_secs(3));
        assert!(s.is_running().await);
        assert_eq!(s.live_tasks(), 1);
        s.stop().await;
    }

    #[tokio::test]
    async fn test_interval_while_stopped() {
        let (s, _rx) = scheduler(3);
        s.set_interval(5).await.unwrap();
        assert_eq!(s.interval(), Duration::from_secs(5));
        assert!(!s.is_running().await);
        assert_eq!(s.live_tasks(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reconfiguration() {
        let (s, _rx) = scheduler(3);
        let s = Arc::new(s);
        s.start().await;
        assert_eq!(s.live_tasks(), 1);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let s = s.clone();
            handles.push(tokio::spawn(async move {
                s.parse_interval("10").await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(s.interval(), Duration::from_secs(10));
        assert_eq!(s.live_tasks(), 1);
        s.stop().await;
        assert_eq!(s.live_tasks(), 0);
    }
}
