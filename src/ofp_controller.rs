//! Per-connection OpenFlow 1.3 session driving a `LearningSwitch`.

use std::io::{self, Read, Write};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::installer::{Command, Datapath};
use crate::learning_switch::{Event, LearningSwitch};
use crate::mac_learning::SwitchRegistry;
use crate::ofp_header::OfpHeader;
use crate::ofp_message::OfpMessage;
use crate::openflow0x04::message::Message;
use crate::openflow0x04::OFP_VERSION;

/// A connection to one switch, carrying OpenFlow 1.3 messages both ways.
pub struct OfpChannel<S> {
    stream: S,
    next_xid: u32,
}

impl<S: Read + Write> OfpChannel<S> {
    pub fn new(stream: S) -> OfpChannel<S> {
        OfpChannel {
            stream,
            next_xid: 1,
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Send a message to the switch with the given transaction id.
    pub fn send_message(&mut self, xid: u32, msg: Message) -> Result<()> {
        let bytes = Message::marshal(xid, msg)?;
        self.stream.write_all(&bytes)?;
        Ok(())
    }

    /// Read the next message. `None` once the switch has hung up.
    pub fn recv(&mut self) -> Result<Option<(u32, Message)>> {
        let mut buf = [0; OfpHeader::SIZE];
        match self.stream.read_exact(&mut buf) {
            Ok(()) => (),
            Err(ref e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(Error::ConnectionLost(e)),
        }
        let header = OfpHeader::parse(&buf);
        if header.length() < OfpHeader::SIZE {
            return Err(Error::Codec(format!("header length {} too short", header.length())));
        }
        let mut body = vec![0; header.length() - OfpHeader::SIZE];
        self.stream
            .read_exact(&mut body)
            .map_err(Error::ConnectionLost)?;
        let hello = header.type_code() == Some(crate::openflow0x04::MsgCode::Hello);
        // a hello advertises the highest version the switch speaks
        if (hello && header.version() < OFP_VERSION) || (!hello && header.version() != OFP_VERSION) {
            return Err(Error::UnsupportedVersion(header.version()));
        }
        Message::parse(&header, &body).map(Some)
    }

    fn next_xid(&mut self) -> u32 {
        let xid = self.next_xid;
        self.next_xid = self.next_xid.wrapping_add(1);
        xid
    }
}

impl<S: Read + Write> Datapath for OfpChannel<S> {
    fn send(&mut self, cmd: Command) -> Result<()> {
        let xid = self.next_xid();
        self.send_message(xid, cmd.into())
    }
}

/// Perform the handshake and then handle messages from the switch until it
/// disconnects. The switch is detached from `registry` when this returns.
pub fn handle_client_connected<S: Read + Write>(
    stream: S,
    registry: Arc<SwitchRegistry>,
    config: &Config,
) -> Result<()> {
    let mut switch = LearningSwitch::new(registry, OfpChannel::new(stream), config);
    let result = run(&mut switch);
    switch.close();
    result
}

fn run<S: Read + Write>(switch: &mut LearningSwitch<OfpChannel<S>>) -> Result<()> {
    switch
        .installer_mut()
        .datapath_mut()
        .send_message(0, Message::Hello)?;
    loop {
        let (xid, msg) = match switch.installer_mut().datapath_mut().recv()? {
            Some(m) => m,
            None => {
                info!("switch {:?} closed the connection", switch.dpid());
                return Ok(());
            }
        };
        match msg {
            Message::Hello => {
                debug!("hello from switch, requesting features");
                switch
                    .installer_mut()
                    .datapath_mut()
                    .send_message(xid, Message::FeaturesReq)?
            }
            Message::EchoRequest(buf) => switch
                .installer_mut()
                .datapath_mut()
                .send_message(xid, Message::EchoReply(buf))?,
            Message::EchoReply(_) => (),
            Message::Error(err) => warn!(
                "switch {:?} reported error type {} code {} (xid {})",
                switch.dpid(),
                err.typ,
                err.code,
                xid
            ),
            Message::FeaturesReply(features) => {
                dispatch(switch, Event::SwitchFeatures(features))?
            }
            Message::PacketIn(pkt) => dispatch(switch, Event::PacketIn(pkt))?,
            Message::PortStatus(sts) => dispatch(switch, Event::PortStatus(sts))?,
            Message::Unhandled(code) => debug!("ignoring message type {} (xid {})", code, xid),
            other => debug!("unexpected message from switch: {:?}", other),
        }
    }
}

/// Hand `event` to the switch. Only failures to reach the switch end the
/// session; anything else is logged.
fn dispatch<S: Read + Write>(
    switch: &mut LearningSwitch<OfpChannel<S>>,
    event: Event,
) -> Result<()> {
    match switch.handle(event) {
        Err(e) if e.is_submission_failure() => Err(e),
        Err(e) => {
            warn!("switch {:?}: {}", switch.dpid(), e);
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use byteorder::{BigEndian, WriteBytesExt};

    use super::*;
    use crate::flow::{Action, PseudoPort};
    use crate::openflow0x04::MsgCode;
    use crate::packet::tests::{frame, HOST_A, HOST_B};

    /// Scripted switch: reads come from `input`, writes land in `output`.
    struct Script {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Script {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn msg(version: u8, code: MsgCode, xid: u32, body: &[u8]) -> Vec<u8> {
        let mut bytes = vec![];
        OfpHeader::marshal(
            &mut bytes,
            OfpHeader::new(version, code as u8, (8 + body.len()) as u16, xid),
        )
        .unwrap();
        bytes.extend_from_slice(body);
        bytes
    }

    fn features_body(dpid: u64) -> Vec<u8> {
        let mut body = vec![];
        body.write_u64::<BigEndian>(dpid).unwrap();
        body.write_u32::<BigEndian>(256).unwrap();
        body.extend_from_slice(&[254, 0, 0, 0]);
        body.write_u32::<BigEndian>(0).unwrap();
        body.write_u32::<BigEndian>(0).unwrap();
        body
    }

    fn packet_in_body(in_port: u32, data: &[u8]) -> Vec<u8> {
        let mut body = vec![];
        body.write_u32::<BigEndian>(0xffff_ffff).unwrap();
        body.write_u16::<BigEndian>(data.len() as u16).unwrap();
        body.extend_from_slice(&[0, 0]);
        body.write_u64::<BigEndian>(0).unwrap();
        // OXM match holding only in_port, padded to 16
        body.write_u16::<BigEndian>(1).unwrap();
        body.write_u16::<BigEndian>(12).unwrap();
        body.write_u32::<BigEndian>(0x8000_0004).unwrap();
        body.write_u32::<BigEndian>(in_port).unwrap();
        body.extend_from_slice(&[0; 4]);
        body.extend_from_slice(&[0; 2]);
        body.extend_from_slice(data);
        body
    }

    fn run_script(input: Vec<u8>) -> (Arc<SwitchRegistry>, Result<()>, Vec<u8>) {
        let registry = Arc::new(SwitchRegistry::new());
        let mut switch = LearningSwitch::new(
            registry.clone(),
            OfpChannel::new(Script {
                input: Cursor::new(input),
                output: vec![],
            }),
            &Config::default(),
        );
        let result = run(&mut switch);
        let output = switch.installer().datapath().get_ref().output.clone();
        (registry, result, output)
    }

    #[test]
    fn handshake_installs_table_miss_and_floods() {
        let mut input = msg(4, MsgCode::Hello, 1, &[]);
        input.extend(msg(4, MsgCode::EchoReq, 2, b"ping"));
        input.extend(msg(4, MsgCode::FeaturesResp, 3, &features_body(1)));
        let data = frame(HOST_B, HOST_A, None, 0x0800);
        input.extend(msg(4, MsgCode::PacketIn, 0, &packet_in_body(1, &data)));
        let (registry, result, output) = run_script(input);
        result.unwrap();
        assert_eq!(registry.len(), 1);

        let codes: Vec<u8> = {
            let mut codes = vec![];
            let mut rest = &output[..];
            while rest.len() >= 8 {
                let len = u16::from_be_bytes([rest[2], rest[3]]) as usize;
                codes.push(rest[1]);
                rest = &rest[len..];
            }
            codes
        };
        assert_eq!(
            codes,
            vec![
                MsgCode::Hello as u8,
                MsgCode::FeaturesReq as u8,
                MsgCode::EchoResp as u8,
                MsgCode::FlowMod as u8,
                MsgCode::PacketOut as u8,
            ]
        );
        assert_eq!(&output[output.len() - data.len()..], &data[..]);
    }

    #[test]
    fn old_switches_are_refused() {
        let (registry, result, _) = run_script(msg(1, MsgCode::Hello, 1, &[]));
        assert!(matches!(result, Err(Error::UnsupportedVersion(1))));
        assert!(registry.is_empty());
    }

    #[test]
    fn packet_in_before_features_keeps_session() {
        let data = frame(HOST_B, HOST_A, None, 0x0800);
        let mut input = msg(4, MsgCode::PacketIn, 0, &packet_in_body(1, &data));
        input.extend(msg(4, MsgCode::FeaturesResp, 3, &features_body(9)));
        let (registry, result, _) = run_script(input);
        result.unwrap();
        assert!(registry.get(9).is_some());
    }

    #[test]
    fn channel_submits_commands() {
        let mut channel = OfpChannel::new(Script {
            input: Cursor::new(vec![]),
            output: vec![],
        });
        channel
            .send(Command::FlowAdd(crate::flow::FlowRule::table_miss()))
            .unwrap();
        let out = &channel.get_ref().output;
        assert_eq!(out[0], OFP_VERSION);
        assert_eq!(out[1], MsgCode::FlowMod as u8);
        assert_eq!(&out[4..8], &1u32.to_be_bytes());
        let action = &out[out.len() - 16..];
        assert_eq!(
            Action::parse_sequence(&mut Cursor::new(action)).unwrap(),
            vec![Action::Output(PseudoPort::Controller(0xffff))]
        );
    }
}
