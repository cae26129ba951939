use std::fmt;
use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// Length of an untagged ethernet header.
pub const ETH_HEADER_LEN: usize = 14;

/// Bias added to a VLAN id in a match field to mark the tag as present.
pub const VLAN_PRESENT: u16 = 0x1000;

/// Match value selecting frames that carry no VLAN tag.
pub const VLAN_NONE: u16 = 0x0000;

#[repr(u16)]
enum EthTyp {
    EthTypVLAN = 0x8100,
    EthTypLLDP = 0x88cc,
}

/// A 48-bit ethernet hardware address.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub(crate) fn read(bytes: &mut Cursor<&[u8]>) -> std::io::Result<MacAddr> {
        let mut arr = [0; 6];
        bytes.read_exact(&mut arr)?;
        Ok(MacAddr(arr))
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> MacAddr {
        MacAddr(octets)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

/// VLAN match value carrying an explicit presence flag.
///
/// A tag with id 0 is a legal tagged frame and must not be confused with an
/// untagged one, so tagged ids are encoded with `VLAN_PRESENT` added.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VlanMatch {
    Untagged,
    Tagged(u16),
}

impl VlanMatch {
    pub fn of_tag(tag: Option<u16>) -> VlanMatch {
        match tag {
            Some(vid) => VlanMatch::Tagged(vid & 0x0fff),
            None => VlanMatch::Untagged,
        }
    }

    /// The value to place in an OXM `vlan_vid` field.
    pub fn to_int(self) -> u16 {
        match self {
            VlanMatch::Untagged => VLAN_NONE,
            VlanMatch::Tagged(vid) => vid + VLAN_PRESENT,
        }
    }

    pub fn of_int(v: u16) -> VlanMatch {
        if v & VLAN_PRESENT != 0 {
            VlanMatch::Tagged(v & 0x0fff)
        } else {
            VlanMatch::Untagged
        }
    }
}

/// Ethernet-level summary of a frame handed to the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    pub dl_dst: MacAddr,
    pub dl_src: MacAddr,
    /// Ethertype of the payload, after any VLAN tag.
    pub dl_typ: u16,
    pub dl_vlan: Option<u16>,
}

impl FrameInfo {
    pub fn vlan_match(&self) -> VlanMatch {
        VlanMatch::of_tag(self.dl_vlan)
    }
}

/// Outcome of classifying a frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    Frame(FrameInfo),
    /// Link-layer discovery traffic: no learning and no forwarding.
    Ignorable,
}

/// Parse the ethernet header (and a single 802.1Q tag, if present) of `buf`.
pub fn classify(buf: &[u8]) -> Result<Classification> {
    let malformed = |_: std::io::Error| Error::MalformedFrame { len: buf.len() };
    if buf.len() < ETH_HEADER_LEN {
        return Err(Error::MalformedFrame { len: buf.len() });
    }
    let mut bytes = Cursor::new(buf);
    let dst = MacAddr::read(&mut bytes).map_err(malformed)?;
    let src = MacAddr::read(&mut bytes).map_err(malformed)?;
    let outer = bytes.read_u16::<BigEndian>().map_err(malformed)?;
    if outer == EthTyp::EthTypLLDP as u16 {
        return Ok(Classification::Ignorable);
    }
    let (tag, typ) = if outer == EthTyp::EthTypVLAN as u16 {
        let tci = bytes.read_u16::<BigEndian>().map_err(malformed)?;
        let typ = bytes.read_u16::<BigEndian>().map_err(malformed)?;
        (Some(tci & 0x0fff), typ)
    } else {
        (None, outer)
    };
    if typ == EthTyp::EthTypLLDP as u16 {
        return Ok(Classification::Ignorable);
    }
    Ok(Classification::Frame(FrameInfo {
        dl_dst: dst,
        dl_src: src,
        dl_typ: typ,
        dl_vlan: tag,
    }))
}
