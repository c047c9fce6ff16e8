// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

use std::collections::BTreeSet;

pub mod logging;

pub use logging::log_init;
pub use logging::LogFormat;

/// The default port on which the discovery configuration API listens.
pub const DEFAULT_OFLLDP_PORT: u16 = 12231;

/// Default number of seconds between two rounds of LLDP probes.
pub const DEFAULT_POLLING_TIME: u64 = 3;

/// Default priority of the flow that punts LLDP frames to the controller.
pub const DEFAULT_FLOW_PRIORITY: u16 = 1000;

/// Given two slices, return two vectors holding only the items unique to
/// each one.
pub fn purge_common<T>(a: &[T], b: &[T]) -> (Vec<T>, Vec<T>)
where
    T: std::cmp::Ord + std::clone::Clone,
{
    let set_a: BTreeSet<T> = a.iter().cloned().collect();
    let set_b: BTreeSet<T> = b.iter().cloned().collect();
    let common: BTreeSet<T> = set_a.intersection(&set_b).cloned().collect();

    (
        a.iter().filter(|e| !common.contains(e)).cloned().collect(),
        b.iter().filter(|e| !common.contains(e)).cloned().collect(),
    )
}

#[test]
fn test_purge_listen_addrs() {
    use std::net::SocketAddr;

    let local: SocketAddr = "127.0.0.1:12231".parse().unwrap();
    let any: SocketAddr = "0.0.0.0:12231".parse().unwrap();
    let v6: SocketAddr = "[::1]:12231".parse().unwrap();

    let (add, remove) = purge_common(&[local, any], &[local, v6]);
    assert_eq!(add, vec![any]);
    assert_eq!(remove, vec![v6]);

    let (add, remove) = purge_common(&[local], &[local]);
    assert!(add.is_empty());
    assert!(remove.is_empty());
}
