// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! OpenFlow 1.3 message bodies.

use bytes::BufMut;
use bytes::BytesMut;

use super::OFP_NO_BUFFER;

pub const OFP_VERSION: u8 = 0x04;

pub const OFPP_MAX: u32 = 0xffff_ff00;
pub const OFPP_CONTROLLER: u32 = 0xffff_fffd;
pub const OFPP_LOCAL: u32 = 0xffff_fffe;
pub const OFPP_ANY: u32 = 0xffff_ffff;
pub const OFPG_ANY: u32 = 0xffff_ffff;

/// Send the whole packet to the controller rather than buffering it
pub const OFPCML_NO_BUFFER: u16 = 0xffff;

pub const OFPAT_OUTPUT: u16 = 0;
pub const OFP_ACTION_OUTPUT_LEN: u16 = 16;

pub const OFPIT_APPLY_ACTIONS: u16 = 4;
pub const OFP_INSTRUCTION_HDR_LEN: u16 = 8;

pub const OFPFC_ADD: u8 = 0;

pub const OFPMT_OXM: u16 = 1;
pub const OFPXMC_OPENFLOW_BASIC: u16 = 0x8000;
pub const OFPVID_PRESENT: u16 = 0x1000;

/// The basic-class match fields we know how to express.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OxmField {
    EthType = 5,
    VlanVid = 6,
}

/// A single unmasked OpenFlow basic-class match entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OxmTlv {
    pub field: OxmField,
    pub value: Vec<u8>,
}

impl OxmTlv {
    pub fn eth_type(eth_type: u16) -> Self {
        OxmTlv {
            field: OxmField::EthType,
            value: eth_type.to_be_bytes().to_vec(),
        }
    }

    /// Match frames tagged with `vid`.  The present bit distinguishes a
    /// tagged frame from an untagged one.
    pub fn vlan_vid(vid: u16) -> Self {
        OxmTlv {
            field: OxmField::VlanVid,
            value: (vid | OFPVID_PRESENT).to_be_bytes().to_vec(),
        }
    }

    pub fn length(&self) -> usize {
        4 + self.value.len()
    }

    pub fn deparse(&self, v: &mut BytesMut) {
        v.put_u16(OFPXMC_OPENFLOW_BASIC);
        v.put_u8((self.field as u8) << 1);
        v.put_u8(self.value.len() as u8);
        v.put_slice(&self.value);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Match {
    pub oxm_fields: Vec<OxmTlv>,
}

impl Match {
    pub fn field(&self, field: OxmField) -> Option<&OxmTlv> {
        self.oxm_fields.iter().find(|t| t.field == field)
    }

    /// Length as recorded in the match header, which excludes padding
    pub fn length(&self) -> usize {
        4 + self.oxm_fields.iter().map(|t| t.length()).sum::<usize>()
    }

    pub fn deparse(&self, v: &mut BytesMut) {
        let len = self.length();
        v.put_u16(OFPMT_OXM);
        v.put_u16(len as u16);
        for t in &self.oxm_fields {
            t.deparse(v);
        }
        v.put_bytes(0, (8 - len % 8) % 8);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActionOutput {
    pub port: u32,
    pub max_len: u16,
}

impl ActionOutput {
    pub fn new(port: u32) -> Self {
        ActionOutput {
            port,
            max_len: OFPCML_NO_BUFFER,
        }
    }

    pub fn deparse(&self, v: &mut BytesMut) {
        v.put_u16(OFPAT_OUTPUT);
        v.put_u16(OFP_ACTION_OUTPUT_LEN);
        v.put_u32(self.port);
        v.put_u16(self.max_len);
        v.put_bytes(0, 6);
    }
}

fn actions_len(actions: &[ActionOutput]) -> u16 {
    actions.len() as u16 * OFP_ACTION_OUTPUT_LEN
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    ApplyActions(Vec<ActionOutput>),
}

impl Instruction {
    pub fn deparse(&self, v: &mut BytesMut) {
        match self {
            Instruction::ApplyActions(actions) => {
                v.put_u16(OFPIT_APPLY_ACTIONS);
                v.put_u16(OFP_INSTRUCTION_HDR_LEN + actions_len(actions));
                v.put_bytes(0, 4);
                for a in actions {
                    a.deparse(v);
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketOut {
    pub buffer_id: u32,
    pub in_port: u32,
    pub actions: Vec<ActionOutput>,
    pub data: Vec<u8>,
}

impl PacketOut {
    pub fn new(port: u32, data: Vec<u8>) -> Self {
        PacketOut {
            buffer_id: OFP_NO_BUFFER,
            in_port: OFPP_CONTROLLER,
            actions: vec![ActionOutput::new(port)],
            data,
        }
    }

    pub fn deparse(&self, v: &mut BytesMut) {
        v.put_u32(self.buffer_id);
        v.put_u32(self.in_port);
        v.put_u16(actions_len(&self.actions));
        v.put_bytes(0, 6);
        for a in &self.actions {
            a.deparse(v);
        }
        v.put_slice(&self.data);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowMod {
    pub cookie: u64,
    pub cookie_mask: u64,
    pub table_id: u8,
    pub command: u8,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub priority: u16,
    pub buffer_id: u32,
    pub out_port: u32,
    pub out_group: u32,
    pub flags: u16,
    pub match_fields: Match,
    pub instructions: Vec<Instruction>,
}

impl FlowMod {
    /// A permanent flow in table 0 punting everything of `eth_type` to the
    /// controller.
    pub fn to_controller(
        priority: u16,
        eth_type: u16,
        vlan: Option<u16>,
    ) -> Self {
        let mut oxm_fields = vec![OxmTlv::eth_type(eth_type)];
        if let Some(vid) = vlan {
            oxm_fields.push(OxmTlv::vlan_vid(vid));
        }
        FlowMod {
            cookie: 0,
            cookie_mask: 0,
            table_id: 0,
            command: OFPFC_ADD,
            idle_timeout: 0,
            hard_timeout: 0,
            priority,
            buffer_id: OFP_NO_BUFFER,
            out_port: OFPP_ANY,
            out_group: OFPG_ANY,
            flags: 0,
            match_fields: Match { oxm_fields },
            instructions: vec![Instruction::ApplyActions(vec![
                ActionOutput::new(OFPP_CONTROLLER),
            ])],
        }
    }

    pub fn deparse(&self, v: &mut BytesMut) {
        v.put_u64(self.cookie);
        v.put_u64(self.cookie_mask);
        v.put_u8(self.table_id);
        v.put_u8(self.command);
        v.put_u16(self.idle_timeout);
        v.put_u16(self.hard_timeout);
        v.put_u16(self.priority);
        v.put_u32(self.buffer_id);
        v.put_u32(self.out_port);
        v.put_u32(self.out_group);
        v.put_u16(self.flags);
        v.put_bytes(0, 2);
        self.match_fields.deparse(v);
        for i in &self.instructions {
            i.deparse(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_oxm_layout() {
        let mut v = BytesMut::new();
        OxmTlv::eth_type(0x88cc).deparse(&mut v);
        OxmTlv::vlan_vid(100).deparse(&mut v);
        assert_eq!(v.to_vec(), hex!("8000 0a02 88cc 8000 0c02 1064").to_vec());
    }

    #[test]
    fn test_match_padding() {
        let m = Match {
            oxm_fields: vec![OxmTlv::eth_type(0x88cc)],
        };
        let mut v = BytesMut::new();
        m.deparse(&mut v);
        assert_eq!(m.length(), 10);
        assert_eq!(
            v.to_vec(),
            hex!("0001 000a 8000 0a02 88cc 0000 0000 0000").to_vec()
        );

        let m = Match {
            oxm_fields: vec![OxmTlv::eth_type(0x88cc), OxmTlv::vlan_vid(1)],
        };
        let mut v = BytesMut::new();
        m.deparse(&mut v);
        assert_eq!(m.length(), 16);
        assert_eq!(v.len(), 16);
        assert_eq!(m.field(OxmField::VlanVid).unwrap().value, vec![0x10, 0x01]);
    }

    #[test]
    fn test_packet_out_layout() {
        let p = PacketOut::new(5, vec![0xde, 0xad]);
        let mut v = BytesMut::new();
        p.deparse(&mut v);
        assert_eq!(
            v.to_vec(),
            hex!(
                "
                ffff ffff ffff fffd 0010 0000 0000 0000
                0000 0010 0000 0005 ffff 0000 0000 0000
                dead
            "
            )
            .to_vec()
        );
    }

    #[test]
    fn test_flow_mod_layout() {
        let f = FlowMod::to_controller(1000, 0x88cc, Some(3799));
        let mut v = BytesMut::new();
        f.deparse(&mut v);
        let expected = hex!(
            "
            0000 0000 0000 0000 0000 0000 0000 0000
            0000 0000 0000 03e8 ffff ffff ffff ffff
            ffff ffff 0000 0000
            0001 0010 8000 0a02 88cc 8000 0c02 1ed7
            0004 0018 0000 0000
            0000 0010 ffff fffd ffff 0000 0000 0000
        "
        );
        assert_eq!(v.to_vec(), expected.to_vec());
    }
}
