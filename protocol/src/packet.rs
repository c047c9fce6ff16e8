// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

use bytes::BufMut;
use bytes::BytesMut;

use crate::invalid_error;
use crate::malformed;
use crate::types::TlvType;
use crate::CodecResult;
use crate::MacAddr;

pub const ETHER_VLAN: u16 = 0x8100;
pub const ETHER_LLDP: u16 = 0x88cc;
pub const ETHER_LEN: u16 = 14;
pub const ETHER_8021Q_LEN: u16 = 4;

/// An ethernet frame carrying an LLDPDU.
#[derive(Clone, Debug)]
pub struct Packet {
    pub eth_hdr: EthHdr,
    pub lldp_data: Vec<LldpTlv>,
}

impl Packet {
    pub fn new(eth_dmac: MacAddr, eth_smac: MacAddr) -> Packet {
        Packet {
            eth_hdr: EthHdr {
                eth_dmac,
                eth_smac,
                eth_8021q: None,
                eth_type: ETHER_LLDP,
                eth_size: ETHER_LEN,
            },
            lldp_data: Vec::new(),
        }
    }

    /// Tag the frame with an 802.1Q header carrying `vid`.
    pub fn set_vlan(&mut self, vid: u16) -> CodecResult<()> {
        if vid > 0xfff {
            return Err(invalid_error(format!("vlan id {vid} exceeds 12 bits")));
        }
        if self.eth_hdr.eth_8021q.is_none() {
            self.eth_hdr.eth_size += ETHER_8021Q_LEN;
        }
        self.eth_hdr.eth_8021q = Some(EthQHdr {
            eth_pcp: 0,
            eth_dei: 0,
            eth_vlan_tag: vid,
        });
        Ok(())
    }

    pub fn add_tlv(&mut self, tlv: LldpTlv) {
        self.lldp_data.push(tlv);
    }

    pub fn deparse(&self) -> Vec<u8> {
        let lldp_size: usize =
            self.lldp_data.iter().map(|t| 2 + t.lldp_tlv_octets.len()).sum();
        let mut v =
            BytesMut::with_capacity(self.eth_hdr.eth_size as usize + lldp_size);
        self.eth_hdr.deparse(&mut v);
        for tlv in &self.lldp_data {
            tlv.deparse(&mut v);
        }
        v.to_vec()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EthQHdr {
    pub eth_pcp: u8,       // 802.1q Priority code point
    pub eth_dei: u8,       // 802.1q Drop eligible indicator
    pub eth_vlan_tag: u16, // 802.1q VID
}

impl From<EthQHdr> for u16 {
    fn from(x: EthQHdr) -> Self {
        ((x.eth_pcp as u16) << 13) | ((x.eth_dei as u16) << 12) | x.eth_vlan_tag
    }
}

impl From<u16> for EthQHdr {
    fn from(x: u16) -> Self {
        EthQHdr {
            eth_pcp: ((x >> 13) & 0x07) as u8,
            eth_dei: ((x >> 12) & 0x01) as u8,
            eth_vlan_tag: x & 0xfff,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EthHdr {
    pub eth_dmac: MacAddr,
    pub eth_smac: MacAddr,
    pub eth_8021q: Option<EthQHdr>,
    pub eth_type: u16,
    /// Size of the header on the wire, including any 802.1Q tag
    pub eth_size: u16,
}

impl EthHdr {
    pub fn parse(data: &[u8]) -> CodecResult<EthHdr> {
        if data.len() < ETHER_LEN as usize {
            return Err(malformed(data.len(), "ethernet header too short"));
        }
        let mut eth_hdr = EthHdr {
            eth_dmac: MacAddr::from_slice(&data[0..6]),
            eth_smac: MacAddr::from_slice(&data[6..12]),
            eth_8021q: None,
            eth_type: get_u16(data, 12),
            eth_size: ETHER_LEN,
        };

        if eth_hdr.eth_type == ETHER_VLAN {
            eth_hdr.eth_size += ETHER_8021Q_LEN;
            if data.len() < eth_hdr.eth_size as usize {
                return Err(malformed(data.len(), "vlan header too short"));
            }
            eth_hdr.eth_8021q = Some(get_u16(data, 14).into());
            eth_hdr.eth_type = get_u16(data, 16);
        }
        Ok(eth_hdr)
    }

    pub fn deparse(&self, v: &mut BytesMut) {
        v.put_slice(&self.eth_dmac.octets());
        v.put_slice(&self.eth_smac.octets());
        if let Some(q) = self.eth_8021q {
            v.put_u16(ETHER_VLAN);
            v.put_u16(q.into());
        }
        v.put_u16(self.eth_type);
    }
}

/// Parse the ethernet header of `data`, returning the header and whatever
/// follows it.
pub fn decode_ethernet(data: &[u8]) -> CodecResult<(EthHdr, &[u8])> {
    let hdr = EthHdr::parse(data)?;
    Ok((hdr, &data[hdr.eth_size as usize..]))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LldpTlv {
    pub lldp_tlv_type: u8,  // 7 bits
    pub lldp_tlv_size: u16, // 9 bits
    pub lldp_tlv_octets: Vec<u8>,
}

impl LldpTlv {
    pub fn new(tlv_type: impl Into<u8>, tlv_data: &[u8]) -> CodecResult<Self> {
        let tlv_type = tlv_type.into();
        let tlv_size = tlv_data.len();
        if tlv_type & 0x80 != 0 {
            Err(invalid_error("Invalid tlv_type"))
        } else if tlv_size > 511 {
            Err(invalid_error("tlv_data exceeds 511 octets"))
        } else {
            Ok(LldpTlv {
                lldp_tlv_type: tlv_type,
                lldp_tlv_size: tlv_size as u16,
                lldp_tlv_octets: tlv_data.into(),
            })
        }
    }

    /// Build a TLV whose payload is a one-octet subtype followed by `data`,
    /// the layout shared by the chassis-id and port-id TLVs.
    pub fn with_subtype(
        tlv_type: TlvType,
        subtype: u8,
        data: &[u8],
    ) -> CodecResult<Self> {
        let mut octets = Vec::with_capacity(data.len() + 1);
        octets.push(subtype);
        octets.extend_from_slice(data);
        LldpTlv::new(tlv_type, &octets)
    }

    /// The payload following the subtype octet, for TLVs that have one.
    pub fn sub_value(&self) -> &[u8] {
        self.lldp_tlv_octets.get(1..).unwrap_or(&[])
    }

    /// Parse the TLV at `offset`, returning it and the offset of the next one.
    pub fn parse(data: &[u8], offset: usize) -> CodecResult<(LldpTlv, usize)> {
        if data.len() < offset + 2 {
            return Err(malformed(offset, "lldp tlv prefix too short"));
        }

        let word = get_u16(data, offset);
        let lldp_tlv_type = (word >> 9) as u8;
        let lldp_tlv_size = word & 0x1ff;
        let start = offset + 2;
        let end = start + lldp_tlv_size as usize;

        if end > data.len() {
            return Err(malformed(offset, "lldp tlv too short"));
        }
        Ok((
            LldpTlv {
                lldp_tlv_type,
                lldp_tlv_size,
                lldp_tlv_octets: data[start..end].to_vec(),
            },
            end,
        ))
    }

    pub fn deparse(&self, v: &mut BytesMut) {
        v.put_u16((self.lldp_tlv_type as u16) << 9 | self.lldp_tlv_size);
        v.put_slice(&self.lldp_tlv_octets);
    }
}

/// Walk the TLVs of an LLDPDU looking for the first one of `tlv_type`.
pub fn find_tlv(data: &[u8], tlv_type: TlvType) -> CodecResult<LldpTlv> {
    let mut offset = 0;
    loop {
        if offset >= data.len() {
            return Err(malformed(offset, format!("no {tlv_type} tlv")));
        }
        let (tlv, next) = LldpTlv::parse(data, offset)?;
        if tlv.lldp_tlv_type == tlv_type as u8 {
            return Ok(tlv);
        }
        if tlv.lldp_tlv_type == TlvType::EndOfLLDPDU as u8 {
            return Err(malformed(offset, format!("no {tlv_type} tlv")));
        }
        offset = next;
    }
}

// Callers have already checked that two bytes are available at `offset`.
fn get_u16(data: &[u8], offset: usize) -> u16 {
    (data[offset] as u16) << 8 | data[offset + 1] as u16
}
