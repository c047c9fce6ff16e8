// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::invalid_error;
use crate::CodecError;
use crate::MacAddr;

/// Time-to-live advertised in every probe, in seconds.
pub const LLDP_TTL: u16 = 120;

/// Datapath identifier of an OpenFlow switch.
///
/// This is what a probe carries in its chassis-id TLV, so it must uniquely
/// identify a switch across the whole controller.
#[derive(
    Clone,
    Copy,
    Debug,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Deserialize,
    JsonSchema,
    Serialize,
)]
pub struct DeviceId(pub u64);

impl DeviceId {
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_be_bytes(b: [u8; 8]) -> Self {
        DeviceId(u64::from_be_bytes(b))
    }
}

impl From<u64> for DeviceId {
    fn from(id: u64) -> Self {
        DeviceId(id)
    }
}

/// Rendered the way controllers usually print a dpid: eight colon-separated
/// hex octets.
impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = self.to_be_bytes();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

impl FromStr for DeviceId {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let octets: Vec<&str> = s.split(':').collect();
        if octets.len() != 8 {
            return Err(invalid_error(format!(
                "datapath id must have 8 octets: {s}"
            )));
        }
        let mut b = [0u8; 8];
        for (i, octet) in octets.iter().enumerate() {
            b[i] = u8::from_str_radix(octet, 16).map_err(|_| {
                invalid_error(format!("invalid octet in datapath id: {s}"))
            })?;
        }
        Ok(DeviceId::from_be_bytes(b))
    }
}

/// TLV Type values as defined in table 8-1.  We only ever emit or look for
/// the mandatory ones.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum TlvType {
    EndOfLLDPDU = 0,
    ChassisId,
    PortId,
    Ttl,
}

impl From<TlvType> for u8 {
    fn from(x: TlvType) -> u8 {
        x as u8
    }
}

impl fmt::Display for TlvType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TlvType::EndOfLLDPDU => write!(f, "EndOfLLDPDU"),
            TlvType::ChassisId => write!(f, "ChassisId"),
            TlvType::PortId => write!(f, "PortId"),
            TlvType::Ttl => write!(f, "TTL"),
        }
    }
}

/// Both the chassis-id and the port-id in our probes use the "locally
/// assigned" subtype (7 in tables 8-2 and 8-3), since neither a dpid nor an
/// OpenFlow port number fits any of the standard subtypes.
pub const LOCALLY_ASSIGNED_SUBTYPE: u8 = 7;

/// The propagation scope, and associated MAC addresses, is defined by
/// section 7.1.  Probes are always sent to the nearest-bridge address, so
/// they are never forwarded past the first switch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    Bridge,
    NonTPMRBridge,
    CustomerBridge,
}

impl From<Scope> for MacAddr {
    fn from(s: Scope) -> MacAddr {
        match s {
            Scope::Bridge => MacAddr::new(0x01, 0x80, 0xc2, 0x00, 0x00, 0x0E),
            Scope::NonTPMRBridge => {
                MacAddr::new(0x01, 0x80, 0xc2, 0x00, 0x00, 0x03)
            }
            Scope::CustomerBridge => {
                MacAddr::new(0x01, 0x80, 0xc2, 0x00, 0x00, 0x00)
            }
        }
    }
}

#[test]
fn verify_device_id() {
    let id = DeviceId(0x0000_0000_0000_0001);
    assert_eq!(id.to_string(), "00:00:00:00:00:00:00:01");
    assert_eq!("00:00:00:00:00:00:00:01".parse::<DeviceId>(), Ok(id));

    let id = DeviceId(0xdead_beef_0102_0304);
    assert_eq!(id.to_string().parse::<DeviceId>(), Ok(id));
    assert_eq!(
        id.to_be_bytes(),
        [0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0x03, 0x04]
    );

    assert!("00:00:00:01".parse::<DeviceId>().is_err());
    assert!("00:00:00:00:00:00:00:xx".parse::<DeviceId>().is_err());
}
