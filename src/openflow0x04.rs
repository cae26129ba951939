use std::io::{self, BufRead, Cursor, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::bits::{pad8, test_bit};
use crate::flow::{Action, FlowDelete, FlowRule, Pattern, PseudoPort, Timeout};
use crate::installer::{Command, PacketOut, Payload};
use crate::packet::{MacAddr, VlanMatch};

/// Protocol version byte for OpenFlow 1.3.
pub const OFP_VERSION: u8 = 0x04;

/// Buffer id meaning "no buffer".
const OFP_NO_BUFFER: u32 = 0xffff_ffff;

/// Group id wildcard used by deletes.
const OFPG_ANY: u32 = 0xffff_ffff;

/// OpenFlow 1.3 message type codes, used by headers to identify meaning of the rest of a message.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MsgCode {
    Hello,
    Error,
    EchoReq,
    EchoResp,
    Experimenter,
    FeaturesReq,
    FeaturesResp,
    GetConfigReq,
    GetConfigResp,
    SetConfig,
    PacketIn,
    FlowRemoved,
    PortStatus,
    PacketOut,
    FlowMod,
    GroupMod,
    PortMod,
    TableMod,
    MultipartReq,
    MultipartResp,
    BarrierReq,
    BarrierResp,
}

impl MsgCode {
    pub fn of_int(t: u8) -> Option<MsgCode> {
        use self::MsgCode::*;
        let code = match t {
            0 => Hello,
            1 => Error,
            2 => EchoReq,
            3 => EchoResp,
            4 => Experimenter,
            5 => FeaturesReq,
            6 => FeaturesResp,
            7 => GetConfigReq,
            8 => GetConfigResp,
            9 => SetConfig,
            10 => PacketIn,
            11 => FlowRemoved,
            12 => PortStatus,
            13 => PacketOut,
            14 => FlowMod,
            15 => GroupMod,
            16 => PortMod,
            17 => TableMod,
            18 => MultipartReq,
            19 => MultipartResp,
            20 => BarrierReq,
            21 => BarrierResp,
            _ => return None,
        };
        Some(code)
    }
}

#[repr(u32)]
enum OfpPort {
    OFPPMax = 0xffff_ff00,
    OFPPInPort = 0xffff_fff8,
    OFPPTable = 0xffff_fff9,
    OFPPNormal = 0xffff_fffa,
    OFPPFlood = 0xffff_fffb,
    OFPPAll = 0xffff_fffc,
    OFPPController = 0xffff_fffd,
    OFPPLocal = 0xffff_fffe,
    OFPPAny = 0xffff_ffff,
}

impl PseudoPort {
    fn to_int(self) -> u32 {
        match self {
            PseudoPort::PhysicalPort(p) => p,
            PseudoPort::InPort => OfpPort::OFPPInPort as u32,
            PseudoPort::Table => OfpPort::OFPPTable as u32,
            PseudoPort::Normal => OfpPort::OFPPNormal as u32,
            PseudoPort::Flood => OfpPort::OFPPFlood as u32,
            PseudoPort::AllPorts => OfpPort::OFPPAll as u32,
            PseudoPort::Controller(_) => OfpPort::OFPPController as u32,
            PseudoPort::Local => OfpPort::OFPPLocal as u32,
            PseudoPort::Any => OfpPort::OFPPAny as u32,
        }
    }

    fn make(p: u32, len: u16) -> io::Result<PseudoPort> {
        let pp = match p {
            p if p == OfpPort::OFPPInPort as u32 => PseudoPort::InPort,
            p if p == OfpPort::OFPPTable as u32 => PseudoPort::Table,
            p if p == OfpPort::OFPPNormal as u32 => PseudoPort::Normal,
            p if p == OfpPort::OFPPFlood as u32 => PseudoPort::Flood,
            p if p == OfpPort::OFPPAll as u32 => PseudoPort::AllPorts,
            p if p == OfpPort::OFPPController as u32 => PseudoPort::Controller(len),
            p if p == OfpPort::OFPPLocal as u32 => PseudoPort::Local,
            p if p == OfpPort::OFPPAny as u32 => PseudoPort::Any,
            p if p <= OfpPort::OFPPMax as u32 => PseudoPort::PhysicalPort(p),
            p => return Err(invalid(format!("unsupported port number {:#x}", p))),
        };
        Ok(pp)
    }
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// OXM TLV fields understood by this controller.
#[repr(u8)]
enum OxmField {
    InPort = 0,
    EthDst = 3,
    EthSrc = 4,
    VlanVid = 6,
}

const OFPXMC_OPENFLOW_BASIC: u16 = 0x8000;
const OFPMT_OXM: u16 = 1;

fn oxm_header(field: OxmField, len: u8) -> u32 {
    ((OFPXMC_OPENFLOW_BASIC as u32) << 16) | ((field as u32) << 9) | len as u32
}

impl Pattern {
    fn oxm_len(&self) -> usize {
        let mut len = 0;
        if self.in_port.is_some() {
            len += 4 + 4;
        }
        if self.dl_dst.is_some() {
            len += 4 + 6;
        }
        if self.dl_src.is_some() {
            len += 4 + 6;
        }
        if self.dl_vlan.is_some() {
            len += 4 + 2;
        }
        len
    }

    /// Size of the `ofp_match` structure including trailing padding.
    fn size_of(&self) -> usize {
        let len = 4 + self.oxm_len();
        len + pad8(len)
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> io::Result<()> {
        let len = 4 + self.oxm_len();
        bytes.write_u16::<BigEndian>(OFPMT_OXM)?;
        bytes.write_u16::<BigEndian>(len as u16)?;
        if let Some(p) = self.in_port {
            bytes.write_u32::<BigEndian>(oxm_header(OxmField::InPort, 4))?;
            bytes.write_u32::<BigEndian>(p)?;
        }
        if let Some(mac) = self.dl_dst {
            bytes.write_u32::<BigEndian>(oxm_header(OxmField::EthDst, 6))?;
            bytes.write_all(&mac.octets())?;
        }
        if let Some(mac) = self.dl_src {
            bytes.write_u32::<BigEndian>(oxm_header(OxmField::EthSrc, 6))?;
            bytes.write_all(&mac.octets())?;
        }
        if let Some(vlan) = self.dl_vlan {
            bytes.write_u32::<BigEndian>(oxm_header(OxmField::VlanVid, 2))?;
            bytes.write_u16::<BigEndian>(vlan.to_int())?;
        }
        bytes.write_all(&vec![0; pad8(len)])
    }

    /// Parse an `ofp_match`, keeping the fields this controller knows and
    /// skipping the rest.
    pub fn parse(bytes: &mut Cursor<&[u8]>) -> io::Result<Pattern> {
        let typ = bytes.read_u16::<BigEndian>()?;
        if typ != OFPMT_OXM {
            return Err(invalid(format!("unsupported match type {}", typ)));
        }
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if len < 4 {
            return Err(invalid(format!("match length {} too short", len)));
        }
        let mut oxms = vec![0; len - 4];
        bytes.read_exact(&mut oxms)?;
        bytes.consume(pad8(len));

        let mut pattern = Pattern::match_all();
        let mut fields = Cursor::new(&oxms[..]);
        while (fields.position() as usize) < oxms.len() {
            let header = fields.read_u32::<BigEndian>()?;
            let class = (header >> 16) as u16;
            let field = ((header >> 9) & 0x7f) as u8;
            let has_mask = test_bit(8, header);
            let field_len = (header & 0xff) as u64;
            if class != OFPXMC_OPENFLOW_BASIC || has_mask {
                fields.set_position(fields.position() + field_len);
                continue;
            }
            match field {
                f if f == OxmField::InPort as u8 => {
                    pattern.in_port = Some(fields.read_u32::<BigEndian>()?)
                }
                f if f == OxmField::EthDst as u8 => pattern.dl_dst = Some(MacAddr::read(&mut fields)?),
                f if f == OxmField::EthSrc as u8 => pattern.dl_src = Some(MacAddr::read(&mut fields)?),
                f if f == OxmField::VlanVid as u8 => {
                    pattern.dl_vlan = Some(VlanMatch::of_int(fields.read_u16::<BigEndian>()?))
                }
                _ => fields.set_position(fields.position() + field_len),
            }
        }
        Ok(pattern)
    }
}

#[repr(u16)]
enum OfpActionType {
    OFPATOutput = 0,
}

const ACTION_OUTPUT_LEN: usize = 16;

impl Action {
    fn size_of(&self) -> usize {
        match *self {
            Action::Output(_) => ACTION_OUTPUT_LEN,
        }
    }

    fn size_of_sequence(actions: &[Action]) -> usize {
        actions.iter().map(Action::size_of).sum()
    }

    fn parse(bytes: &mut Cursor<&[u8]>) -> io::Result<Action> {
        let typ = bytes.read_u16::<BigEndian>()?;
        let len = bytes.read_u16::<BigEndian>()?;
        if typ != OfpActionType::OFPATOutput as u16 {
            return Err(invalid(format!("unsupported action type {} ({} bytes)", typ, len)));
        }
        let port = bytes.read_u32::<BigEndian>()?;
        let max_len = bytes.read_u16::<BigEndian>()?;
        bytes.consume(6);
        Ok(Action::Output(PseudoPort::make(port, max_len)?))
    }

    /// Parse the action list occupying the rest of `bytes`.
    pub fn parse_sequence(bytes: &mut Cursor<&[u8]>) -> io::Result<Vec<Action>> {
        let mut actions = vec![];
        while (bytes.position() as usize) < bytes.get_ref().len() {
            actions.push(Action::parse(bytes)?);
        }
        Ok(actions)
    }

    /// Controller outputs go last so the switch applies everything else first.
    fn move_controller_last(acts: &[Action]) -> Vec<Action> {
        let (to_ctrl, mut not_to_ctrl): (Vec<Action>, Vec<Action>) = acts
            .iter()
            .copied()
            .partition(|act| matches!(act, Action::Output(PseudoPort::Controller(_))));
        not_to_ctrl.extend(to_ctrl);
        not_to_ctrl
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> io::Result<()> {
        match *self {
            Action::Output(pp) => {
                bytes.write_u16::<BigEndian>(OfpActionType::OFPATOutput as u16)?;
                bytes.write_u16::<BigEndian>(self.size_of() as u16)?;
                bytes.write_u32::<BigEndian>(pp.to_int())?;
                bytes.write_u16::<BigEndian>(match pp {
                    PseudoPort::Controller(max_len) => max_len,
                    _ => 0,
                })?;
                bytes.write_all(&[0; 6])
            }
        }
    }
}

const OFPIT_APPLY_ACTIONS: u16 = 4;

/// Switch features.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwitchFeatures {
    pub datapath_id: u64,
    pub num_buffers: u32,
    pub num_tables: u8,
    pub auxiliary_id: u8,
    pub capabilities: u32,
}

impl SwitchFeatures {
    fn parse(bytes: &mut Cursor<&[u8]>) -> io::Result<SwitchFeatures> {
        let datapath_id = bytes.read_u64::<BigEndian>()?;
        let num_buffers = bytes.read_u32::<BigEndian>()?;
        let num_tables = bytes.read_u8()?;
        let auxiliary_id = bytes.read_u8()?;
        bytes.consume(2);
        let capabilities = bytes.read_u32::<BigEndian>()?;
        Ok(SwitchFeatures {
            datapath_id,
            num_buffers,
            num_tables,
            auxiliary_id,
            capabilities,
        })
    }
}

/// Type of modification to perform on a flow table.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowModCmd {
    AddFlow,
    ModFlow,
    ModStrictFlow,
    DeleteFlow,
    DeleteStrictFlow,
}

/// Represents modifications to a flow table from the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowMod {
    pub command: FlowModCmd,
    pub pattern: Pattern,
    pub priority: u16,
    pub actions: Vec<Action>,
    pub cookie: u64,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
    pub apply_to_packet: Option<u32>,
    pub out_port: PseudoPort,
}

impl FlowMod {
    const FIXED_LEN: usize = 40;

    fn instructions_len(&self) -> usize {
        if self.actions.is_empty() {
            0
        } else {
            8 + Action::size_of_sequence(&self.actions)
        }
    }

    fn size_of(&self) -> usize {
        FlowMod::FIXED_LEN + self.pattern.size_of() + self.instructions_len()
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> io::Result<()> {
        bytes.write_u64::<BigEndian>(self.cookie)?;
        bytes.write_u64::<BigEndian>(0)?;
        bytes.write_u8(0)?;
        bytes.write_u8(self.command as u8)?;
        bytes.write_u16::<BigEndian>(self.idle_timeout.to_int())?;
        bytes.write_u16::<BigEndian>(self.hard_timeout.to_int())?;
        bytes.write_u16::<BigEndian>(self.priority)?;
        bytes.write_u32::<BigEndian>(self.apply_to_packet.unwrap_or(OFP_NO_BUFFER))?;
        bytes.write_u32::<BigEndian>(self.out_port.to_int())?;
        bytes.write_u32::<BigEndian>(OFPG_ANY)?;
        bytes.write_u16::<BigEndian>(0)?;
        bytes.write_all(&[0; 2])?;
        self.pattern.marshal(bytes)?;
        if !self.actions.is_empty() {
            bytes.write_u16::<BigEndian>(OFPIT_APPLY_ACTIONS)?;
            bytes.write_u16::<BigEndian>(self.instructions_len() as u16)?;
            bytes.write_all(&[0; 4])?;
            for act in Action::move_controller_last(&self.actions) {
                if act == Action::Output(PseudoPort::Table) {
                    return Err(invalid("OFPP_TABLE not allowed in installed flow".into()));
                }
                act.marshal(bytes)?;
            }
        }
        Ok(())
    }
}

impl From<FlowRule> for FlowMod {
    fn from(rule: FlowRule) -> FlowMod {
        FlowMod {
            command: FlowModCmd::AddFlow,
            pattern: rule.pattern,
            priority: rule.priority,
            actions: rule.actions,
            cookie: 0,
            idle_timeout: rule.idle_timeout,
            hard_timeout: Timeout::Permanent,
            apply_to_packet: rule.buffer_id,
            out_port: PseudoPort::Any,
        }
    }
}

impl From<FlowDelete> for FlowMod {
    fn from(del: FlowDelete) -> FlowMod {
        FlowMod {
            command: FlowModCmd::DeleteFlow,
            pattern: del.pattern,
            priority: 0,
            actions: vec![],
            cookie: 0,
            idle_timeout: Timeout::Permanent,
            hard_timeout: Timeout::Permanent,
            apply_to_packet: None,
            out_port: del.out_port,
        }
    }
}

impl PacketOut {
    fn size_of(&self) -> usize {
        let data = match self.output_payload {
            Payload::Buffered(_) => 0,
            Payload::NotBuffered(ref buf) => buf.len(),
        };
        16 + Action::size_of_sequence(&self.apply_actions) + data
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> io::Result<()> {
        bytes.write_u32::<BigEndian>(match self.output_payload {
            Payload::Buffered(n) => n,
            Payload::NotBuffered(_) => OFP_NO_BUFFER,
        })?;
        bytes.write_u32::<BigEndian>(self.in_port)?;
        bytes.write_u16::<BigEndian>(Action::size_of_sequence(&self.apply_actions) as u16)?;
        bytes.write_all(&[0; 6])?;
        for act in Action::move_controller_last(&self.apply_actions) {
            act.marshal(bytes)?;
        }
        if let Payload::NotBuffered(ref buf) = self.output_payload {
            bytes.write_all(buf)?;
        }
        Ok(())
    }
}

/// Represents packets received by the datapath and sent to the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketIn {
    pub buffer_id: Option<u32>,
    /// Length of the frame on the wire; `data` may hold less.
    pub total_len: u16,
    pub reason: u8,
    pub table_id: u8,
    pub cookie: u64,
    pub in_port: u32,
    pub data: Vec<u8>,
}

impl PacketIn {
    fn parse(bytes: &mut Cursor<&[u8]>) -> io::Result<PacketIn> {
        let buffer_id = match bytes.read_u32::<BigEndian>()? {
            OFP_NO_BUFFER => None,
            n => Some(n),
        };
        let total_len = bytes.read_u16::<BigEndian>()?;
        let reason = bytes.read_u8()?;
        let table_id = bytes.read_u8()?;
        let cookie = bytes.read_u64::<BigEndian>()?;
        let pattern = Pattern::parse(bytes)?;
        let in_port = pattern
            .in_port
            .ok_or_else(|| invalid("packet-in match has no in_port".into()))?;
        bytes.consume(2);
        let mut data = vec![];
        bytes.read_to_end(&mut data)?;
        Ok(PacketIn {
            buffer_id,
            total_len,
            reason,
            table_id,
            cookie,
            in_port,
            data,
        })
    }
}

/// Flags to indicate behavior of the physical port.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PortConfig {
    pub port_down: bool,
    pub no_recv: bool,
    pub no_fwd: bool,
    pub no_packet_in: bool,
}

/// Current state of a physical port. Not configurable by the controller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PortState {
    pub link_down: bool,
    pub blocked: bool,
    pub live: bool,
}

/// Description of a port.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PortDesc {
    pub port_no: u32,
    pub hw_addr: MacAddr,
    pub name: String,
    pub config: PortConfig,
    pub state: PortState,
    pub curr_speed: u32,
    pub max_speed: u32,
}

impl PortDesc {
    fn parse(bytes: &mut Cursor<&[u8]>) -> io::Result<PortDesc> {
        let port_no = bytes.read_u32::<BigEndian>()?;
        bytes.consume(4);
        let hw_addr = MacAddr::read(bytes)?;
        bytes.consume(2);
        let name = {
            let mut arr = [0; 16];
            bytes.read_exact(&mut arr)?;
            let end = arr.iter().position(|&b| b == 0).unwrap_or(arr.len());
            String::from_utf8_lossy(&arr[..end]).into_owned()
        };
        let config = {
            let d = bytes.read_u32::<BigEndian>()?;
            PortConfig {
                port_down: test_bit(0, d),
                no_recv: test_bit(2, d),
                no_fwd: test_bit(5, d),
                no_packet_in: test_bit(6, d),
            }
        };
        let state = {
            let d = bytes.read_u32::<BigEndian>()?;
            PortState {
                link_down: test_bit(0, d),
                blocked: test_bit(1, d),
                live: test_bit(2, d),
            }
        };
        // curr, advertised, supported, peer
        bytes.consume(16);
        let curr_speed = bytes.read_u32::<BigEndian>()?;
        let max_speed = bytes.read_u32::<BigEndian>()?;
        Ok(PortDesc {
            port_no,
            hw_addr,
            name,
            config,
            state,
            curr_speed,
            max_speed,
        })
    }
}

/// What changed about a physical port.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PortReason {
    PortAdd,
    PortDelete,
    PortModify,
    Other(u8),
}

impl PortReason {
    pub fn of_int(r: u8) -> PortReason {
        match r {
            0 => PortReason::PortAdd,
            1 => PortReason::PortDelete,
            2 => PortReason::PortModify,
            r => PortReason::Other(r),
        }
    }
}

/// A physical port has changed in the datapath.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortStatus {
    pub reason: PortReason,
    pub desc: PortDesc,
}

impl PortStatus {
    fn parse(bytes: &mut Cursor<&[u8]>) -> io::Result<PortStatus> {
        let reason = PortReason::of_int(bytes.read_u8()?);
        bytes.consume(7);
        let desc = PortDesc::parse(bytes)?;
        Ok(PortStatus { reason, desc })
    }
}

/// Error reported by the switch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorMsg {
    pub typ: u16,
    pub code: u16,
    pub data: Vec<u8>,
}

impl ErrorMsg {
    fn parse(bytes: &mut Cursor<&[u8]>) -> io::Result<ErrorMsg> {
        let typ = bytes.read_u16::<BigEndian>()?;
        let code = bytes.read_u16::<BigEndian>()?;
        let mut data = vec![];
        bytes.read_to_end(&mut data)?;
        Ok(ErrorMsg { typ, code, data })
    }
}

/// Encapsulates handling of OpenFlow 1.3 messages.
pub mod message {
    use super::*;
    use crate::error::{Error, Result};
    use crate::ofp_header::OfpHeader;
    use crate::ofp_message::OfpMessage;

    /// Abstractions of OpenFlow messages mapping to message codes.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Message {
        Hello,
        Error(ErrorMsg),
        EchoRequest(Vec<u8>),
        EchoReply(Vec<u8>),
        FeaturesReq,
        FeaturesReply(SwitchFeatures),
        FlowMod(FlowMod),
        PacketIn(PacketIn),
        PacketOut(PacketOut),
        PortStatus(PortStatus),
        /// A message this controller does not act on.
        Unhandled(u8),
    }

    impl Message {
        /// Map `Message` to associated OpenFlow message type code `MsgCode`.
        fn msg_code_of_message(msg: &Message) -> Option<MsgCode> {
            let code = match *msg {
                Message::Hello => MsgCode::Hello,
                Message::Error(_) => MsgCode::Error,
                Message::EchoRequest(_) => MsgCode::EchoReq,
                Message::EchoReply(_) => MsgCode::EchoResp,
                Message::FeaturesReq => MsgCode::FeaturesReq,
                Message::FeaturesReply(_) => MsgCode::FeaturesResp,
                Message::FlowMod(_) => MsgCode::FlowMod,
                Message::PacketIn(_) => MsgCode::PacketIn,
                Message::PacketOut(_) => MsgCode::PacketOut,
                Message::PortStatus(_) => MsgCode::PortStatus,
                Message::Unhandled(_) => return None,
            };
            Some(code)
        }

        /// Return the byte-size of a controller-to-switch `Message`.
        fn size_of(msg: &Message) -> Option<usize> {
            let body = match *msg {
                Message::Hello | Message::FeaturesReq => 0,
                Message::EchoRequest(ref buf) | Message::EchoReply(ref buf) => buf.len(),
                Message::FlowMod(ref flow_mod) => flow_mod.size_of(),
                Message::PacketOut(ref po) => po.size_of(),
                _ => return None,
            };
            Some(OfpHeader::SIZE + body)
        }

        /// Marshal the OpenFlow message `msg`.
        fn marshal_body(msg: &Message, bytes: &mut Vec<u8>) -> io::Result<()> {
            match *msg {
                Message::Hello | Message::FeaturesReq => Ok(()),
                Message::EchoRequest(ref buf) | Message::EchoReply(ref buf) => bytes.write_all(buf),
                Message::FlowMod(ref flow_mod) => flow_mod.marshal(bytes),
                Message::PacketOut(ref po) => po.marshal(bytes),
                _ => Err(invalid(format!("{:?} is not sent by a controller", msg))),
            }
        }
    }

    impl From<Command> for Message {
        fn from(cmd: Command) -> Message {
            match cmd {
                Command::FlowAdd(rule) => Message::FlowMod(rule.into()),
                Command::FlowDelete(del) => Message::FlowMod(del.into()),
                Command::PacketOut(po) => Message::PacketOut(po),
            }
        }
    }

    impl OfpMessage for Message {
        fn marshal(xid: u32, msg: Message) -> Result<Vec<u8>> {
            let (code, size) = match (Self::msg_code_of_message(&msg), Self::size_of(&msg)) {
                (Some(code), Some(size)) => (code, size),
                _ => return Err(Error::Codec(format!("cannot marshal {:?}", msg))),
            };
            if size > u16::MAX as usize {
                return Err(Error::Codec(format!("message of {} bytes is too long", size)));
            }
            let hdr = OfpHeader::new(OFP_VERSION, code as u8, size as u16, xid);
            let mut bytes = Vec::with_capacity(size);
            OfpHeader::marshal(&mut bytes, hdr).map_err(|e| Error::Codec(e.to_string()))?;
            Message::marshal_body(&msg, &mut bytes).map_err(|e| Error::Codec(e.to_string()))?;
            Ok(bytes)
        }

        fn parse(header: &OfpHeader, buf: &[u8]) -> Result<(u32, Message)> {
            let mut bytes = Cursor::new(buf);
            let msg = match header.type_code() {
                Some(MsgCode::Hello) => Ok(Message::Hello),
                Some(MsgCode::Error) => ErrorMsg::parse(&mut bytes).map(Message::Error),
                Some(MsgCode::EchoReq) => Ok(Message::EchoRequest(buf.to_vec())),
                Some(MsgCode::EchoResp) => Ok(Message::EchoReply(buf.to_vec())),
                Some(MsgCode::FeaturesResp) => {
                    SwitchFeatures::parse(&mut bytes).map(Message::FeaturesReply)
                }
                Some(MsgCode::PacketIn) => PacketIn::parse(&mut bytes).map(Message::PacketIn),
                Some(MsgCode::PortStatus) => {
                    PortStatus::parse(&mut bytes).map(Message::PortStatus)
                }
                _ => Ok(Message::Unhandled(header.type_byte())),
            };
            let msg = msg.map_err(|e| {
                Error::Codec(format!("type {} (xid {}): {}", header.type_byte(), header.xid(), e))
            })?;
            Ok((header.xid(), msg))
        }
    }
}
