// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! OpenFlow 1.0 message bodies.

use bytes::BufMut;
use bytes::BytesMut;

use super::OFP_NO_BUFFER;

pub const OFP_VERSION: u8 = 0x01;

pub const OFPP_MAX: u16 = 0xff00;
pub const OFPP_CONTROLLER: u16 = 0xfffd;
pub const OFPP_LOCAL: u16 = 0xfffe;
pub const OFPP_NONE: u16 = 0xffff;

pub const OFPAT_OUTPUT: u16 = 0;
pub const OFP_ACTION_OUTPUT_LEN: u16 = 8;

pub const OFPFC_ADD: u16 = 0;

pub const OFP_MATCH_LEN: usize = 40;

pub const OFPFW_IN_PORT: u32 = 1 << 0;
pub const OFPFW_DL_VLAN: u32 = 1 << 1;
pub const OFPFW_DL_TYPE: u32 = 1 << 4;
pub const OFPFW_ALL: u32 = (1 << 22) - 1;

/// Send the packet out of a port.  `max_len` only matters when the port is
/// the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActionOutput {
    pub port: u16,
    pub max_len: u16,
}

impl ActionOutput {
    pub fn to_port(port: u16) -> Self {
        ActionOutput { port, max_len: 0 }
    }

    pub fn to_controller() -> Self {
        ActionOutput {
            port: OFPP_CONTROLLER,
            max_len: 0xffff,
        }
    }

    pub fn deparse(&self, v: &mut BytesMut) {
        v.put_u16(OFPAT_OUTPUT);
        v.put_u16(OFP_ACTION_OUTPUT_LEN);
        v.put_u16(self.port);
        v.put_u16(self.max_len);
    }
}

fn actions_len(actions: &[ActionOutput]) -> u16 {
    actions.len() as u16 * OFP_ACTION_OUTPUT_LEN
}

/// The fixed-size 1.0 match.  Only the fields we ever match on are
/// represented; every field left as `None` is wildcarded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Match {
    pub dl_vlan: Option<u16>,
    pub dl_type: Option<u16>,
}

impl Match {
    pub fn wildcards(&self) -> u32 {
        let mut w = OFPFW_ALL;
        if self.dl_vlan.is_some() {
            w &= !OFPFW_DL_VLAN;
        }
        if self.dl_type.is_some() {
            w &= !OFPFW_DL_TYPE;
        }
        w
    }

    pub fn deparse(&self, v: &mut BytesMut) {
        v.put_u32(self.wildcards());
        v.put_u16(0); // in_port
        v.put_slice(&[0u8; 6]); // dl_src
        v.put_slice(&[0u8; 6]); // dl_dst
        v.put_u16(self.dl_vlan.unwrap_or(0));
        v.put_u8(0); // dl_vlan_pcp
        v.put_u8(0); // pad
        v.put_u16(self.dl_type.unwrap_or(0));
        v.put_u8(0); // nw_tos
        v.put_u8(0); // nw_proto
        v.put_slice(&[0u8; 2]); // pad
        v.put_u32(0); // nw_src
        v.put_u32(0); // nw_dst
        v.put_u16(0); // tp_src
        v.put_u16(0); // tp_dst
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketOut {
    pub buffer_id: u32,
    pub in_port: u16,
    pub actions: Vec<ActionOutput>,
    pub data: Vec<u8>,
}

impl PacketOut {
    /// An unbuffered packet, injected by the controller, sent out of `port`.
    pub fn new(port: u16, data: Vec<u8>) -> Self {
        PacketOut {
            buffer_id: OFP_NO_BUFFER,
            in_port: OFPP_NONE,
            actions: vec![ActionOutput::to_port(port)],
            data,
        }
    }

    pub fn deparse(&self, v: &mut BytesMut) {
        v.put_u32(self.buffer_id);
        v.put_u16(self.in_port);
        v.put_u16(actions_len(&self.actions));
        for a in &self.actions {
            a.deparse(v);
        }
        v.put_slice(&self.data);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowMod {
    pub match_fields: Match,
    pub cookie: u64,
    pub command: u16,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub priority: u16,
    pub buffer_id: u32,
    pub out_port: u16,
    pub flags: u16,
    pub actions: Vec<ActionOutput>,
}

impl FlowMod {
    /// A permanent flow punting everything of `eth_type` to the controller.
    pub fn to_controller(
        priority: u16,
        eth_type: u16,
        vlan: Option<u16>,
    ) -> Self {
        FlowMod {
            match_fields: Match {
                dl_vlan: vlan,
                dl_type: Some(eth_type),
            },
            cookie: 0,
            command: OFPFC_ADD,
            idle_timeout: 0,
            hard_timeout: 0,
            priority,
            buffer_id: OFP_NO_BUFFER,
            out_port: OFPP_NONE,
            flags: 0,
            actions: vec![ActionOutput::to_controller()],
        }
    }

    pub fn deparse(&self, v: &mut BytesMut) {
        self.match_fields.deparse(v);
        v.put_u64(self.cookie);
        v.put_u16(self.command);
        v.put_u16(self.idle_timeout);
        v.put_u16(self.hard_timeout);
        v.put_u16(self.priority);
        v.put_u32(self.buffer_id);
        v.put_u16(self.out_port);
        v.put_u16(self.flags);
        for a in &self.actions {
            a.deparse(v);
        }
    }
}
