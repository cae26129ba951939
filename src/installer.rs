use log::{debug, info, warn};

use crate::error::Result;
use crate::flow::{Action, FlowDelete, FlowRule};

/// The frame a packet-out should emit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// A frame held in a switch buffer.
    Buffered(u32),
    /// A frame carried explicitly in the message.
    NotBuffered(Vec<u8>),
}

/// Instructs the switch to send a frame out immediately.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketOut {
    pub output_payload: Payload,
    pub in_port: u32,
    pub apply_actions: Vec<Action>,
}

/// Commands issued to a switch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    FlowAdd(FlowRule),
    FlowDelete(FlowDelete),
    PacketOut(PacketOut),
}

/// Outbound half of a switch session.
///
/// Submission is fire-and-forget: `Ok` means the command was handed over, not
/// that the switch acknowledged it.
pub trait Datapath {
    fn send(&mut self, cmd: Command) -> Result<()>;
}

/// Issues flow and packet-out commands for one switch.
pub struct FlowRuleInstaller<D> {
    dpid: u64,
    datapath: D,
}

impl<D: Datapath> FlowRuleInstaller<D> {
    pub fn new(dpid: u64, datapath: D) -> FlowRuleInstaller<D> {
        FlowRuleInstaller { dpid, datapath }
    }

    pub fn dpid(&self) -> u64 {
        self.dpid
    }

    pub fn set_dpid(&mut self, dpid: u64) {
        self.dpid = dpid;
    }

    pub fn datapath(&self) -> &D {
        &self.datapath
    }

    pub fn datapath_mut(&mut self) -> &mut D {
        &mut self.datapath
    }

    pub fn install_table_miss(&mut self) -> Result<()> {
        info!("switch {:016x}: installing table-miss rule", self.dpid);
        self.install(FlowRule::table_miss())
    }

    /// Add `rule`. A buffered rule also makes the switch release that buffer
    /// through the new rule.
    pub fn install(&mut self, rule: FlowRule) -> Result<()> {
        debug!(
            "switch {:016x}: add flow priority {} {:?} -> {:?}",
            self.dpid, rule.priority, rule.pattern, rule.actions
        );
        self.datapath.send(Command::FlowAdd(rule))
    }

    /// Remove every rule matching on ingress `port` and every rule outputting
    /// to it. Deleting nothing is not an error.
    ///
    /// Both deletes are always attempted; the first failure is returned.
    pub fn delete_by_port(&mut self, port: u32) -> Result<()> {
        info!("switch {:016x}: deleting flows for port {}", self.dpid, port);
        let by_in_port = self
            .datapath
            .send(Command::FlowDelete(FlowDelete::by_in_port(port)));
        if let Err(ref e) = by_in_port {
            warn!(
                "switch {:016x}: deleting flows from port {} failed: {}",
                self.dpid, port, e
            );
        }
        let by_out_port = self
            .datapath
            .send(Command::FlowDelete(FlowDelete::by_out_port(port)));
        by_in_port.and(by_out_port)
    }

    pub fn packet_out(&mut self, pkt: PacketOut) -> Result<()> {
        debug!(
            "switch {:016x}: packet out from port {} -> {:?}",
            self.dpid, pkt.in_port, pkt.apply_actions
        );
        self.datapath.send(Command::PacketOut(pkt))
    }
}
