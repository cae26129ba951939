//! In-memory switch for exercising the controller without a socket.

use crate::error::{Error, Result};
use crate::flow::{FlowDelete, FlowRule};
use crate::installer::{Command, Datapath, PacketOut};

/// A single flow table with OpenFlow add/delete semantics.
///
/// Adding a rule with the same match and priority as an existing one replaces
/// it. Deletes are non-strict and ignore priority.
#[derive(Debug, Default)]
pub struct SimulatedSwitch {
    flows: Vec<FlowRule>,
    packets_out: Vec<PacketOut>,
    /// Buffers released through a flow add instead of a packet-out.
    released_buffers: Vec<u32>,
    commands: usize,
    closed: bool,
}

impl SimulatedSwitch {
    pub fn new() -> SimulatedSwitch {
        SimulatedSwitch::default()
    }

    pub fn flows(&self) -> &[FlowRule] {
        &self.flows
    }

    pub fn packets_out(&self) -> &[PacketOut] {
        &self.packets_out
    }

    pub fn released_buffers(&self) -> &[u32] {
        &self.released_buffers
    }

    /// Total commands accepted so far.
    pub fn commands(&self) -> usize {
        self.commands
    }

    /// Rules whose match constrains the ingress port to `port`.
    pub fn flows_from_port(&self, port: u32) -> Vec<&FlowRule> {
        self.flows
            .iter()
            .filter(|r| r.pattern.in_port == Some(port))
            .collect()
    }

    /// Rules with an action outputting to `port`.
    pub fn flows_to_port(&self, port: u32) -> Vec<&FlowRule> {
        self.flows
            .iter()
            .filter(|r| r.actions.iter().any(|a| a.outputs_to(port)))
            .collect()
    }

    /// Make every later command fail as if the connection had dropped.
    pub fn close(&mut self) {
        self.closed = true;
    }

    fn add(&mut self, mut rule: FlowRule) {
        if let Some(buffer_id) = rule.buffer_id.take() {
            self.released_buffers.push(buffer_id);
        }
        let existing = self
            .flows
            .iter()
            .position(|r| r.priority == rule.priority && r.pattern == rule.pattern);
        match existing {
            Some(i) => self.flows[i] = rule,
            None => self.flows.push(rule),
        }
    }

    fn delete(&mut self, del: &FlowDelete) {
        self.flows.retain(|r| !del.selects(r));
    }
}

impl Datapath for SimulatedSwitch {
    fn send(&mut self, cmd: Command) -> Result<()> {
        if self.closed {
            return Err(Error::SessionClosed);
        }
        self.commands += 1;
        match cmd {
            Command::FlowAdd(rule) => self.add(rule),
            Command::FlowDelete(del) => self.delete(&del),
            Command::PacketOut(pkt) => self.packets_out.push(pkt),
        }
        Ok(())
    }
}
