//! Flow rule descriptors handed to the installer.
//!
//! Rules are closed types: a `Pattern` only has the fields this controller
//! matches on and an `Action` only the output kinds it emits.

use crate::packet::{FrameInfo, MacAddr, VlanMatch};

/// Seconds a learned rule may sit unused before the switch evicts it.
pub const IDLE_TIMEOUT: u16 = 300;

/// Priority of the match-all rule that punts unmatched frames to the controller.
pub const TABLE_MISS_PRIORITY: u16 = 0;

/// Priority of rules installed from learned hosts.
pub const LEARNED_PRIORITY: u16 = 1;

/// Controller output `max_len` asking the switch to send the whole frame
/// instead of buffering it.
pub const CONTROLLER_NO_BUFFER: u16 = 0xffff;

/// Port behavior.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PseudoPort {
    PhysicalPort(u32),
    InPort,
    Table,
    Normal,
    Flood,
    AllPorts,
    /// Send to the controller, capturing at most `max_len` bytes.
    Controller(u16),
    Local,
    Any,
}

impl PseudoPort {
    /// Physical port number, if this is one.
    pub fn physical(&self) -> Option<u32> {
        match *self {
            PseudoPort::PhysicalPort(p) => Some(p),
            _ => None,
        }
    }
}

/// Actions associated with flows and packets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Output(PseudoPort),
}

impl Action {
    pub fn outputs_to(&self, port: u32) -> bool {
        match *self {
            Action::Output(pp) => pp.physical() == Some(port),
        }
    }
}

/// How long before a flow entry expires.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Timeout {
    Permanent,
    ExpiresAfter(u16),
}

impl Timeout {
    pub fn of_int(tm: u16) -> Timeout {
        match tm {
            0 => Timeout::Permanent,
            d => Timeout::ExpiresAfter(d),
        }
    }

    pub fn to_int(self) -> u16 {
        match self {
            Timeout::Permanent => 0,
            Timeout::ExpiresAfter(d) => d,
        }
    }
}

/// Fields to match against flows. `None` wildcards the field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Pattern {
    pub in_port: Option<u32>,
    pub dl_dst: Option<MacAddr>,
    pub dl_src: Option<MacAddr>,
    pub dl_vlan: Option<VlanMatch>,
}

impl Pattern {
    pub fn match_all() -> Pattern {
        Pattern::default()
    }

    pub fn is_match_all(&self) -> bool {
        *self == Pattern::match_all()
    }

    /// Whether every field constrained by `self` is constrained identically in
    /// `other`. This is the OpenFlow non-strict delete relation.
    pub fn covers(&self, other: &Pattern) -> bool {
        fn field<T: PartialEq>(sel: &Option<T>, rule: &Option<T>) -> bool {
            match sel {
                None => true,
                Some(_) => sel == rule,
            }
        }
        field(&self.in_port, &other.in_port)
            && field(&self.dl_dst, &other.dl_dst)
            && field(&self.dl_src, &other.dl_src)
            && field(&self.dl_vlan, &other.dl_vlan)
    }
}

/// A flow entry to add to a switch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowRule {
    pub priority: u16,
    pub pattern: Pattern,
    pub actions: Vec<Action>,
    pub idle_timeout: Timeout,
    /// Switch buffer to release through the new rule once it is installed.
    pub buffer_id: Option<u32>,
}

impl FlowRule {
    /// The lowest-priority rule sending every unmatched frame, unbuffered, to
    /// the controller.
    pub fn table_miss() -> FlowRule {
        FlowRule {
            priority: TABLE_MISS_PRIORITY,
            pattern: Pattern::match_all(),
            actions: vec![Action::Output(PseudoPort::Controller(CONTROLLER_NO_BUFFER))],
            idle_timeout: Timeout::Permanent,
            buffer_id: None,
        }
    }

    /// Forwarding rule for frames like `frame` arriving on `in_port`, sending
    /// them out of `out_port`.
    pub fn learned(
        in_port: u32,
        frame: &FrameInfo,
        out_port: u32,
        buffer_id: Option<u32>,
    ) -> FlowRule {
        FlowRule {
            priority: LEARNED_PRIORITY,
            pattern: Pattern {
                in_port: Some(in_port),
                dl_dst: Some(frame.dl_dst),
                dl_src: Some(frame.dl_src),
                dl_vlan: Some(frame.vlan_match()),
            },
            actions: vec![Action::Output(PseudoPort::PhysicalPort(out_port))],
            idle_timeout: Timeout::ExpiresAfter(IDLE_TIMEOUT),
            buffer_id,
        }
    }
}

/// Non-strict delete: removes every rule whose match is covered by `pattern`
/// and, unless `out_port` is `Any`, which has an action outputting there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowDelete {
    pub pattern: Pattern,
    pub out_port: PseudoPort,
}

impl FlowDelete {
    /// Rules matching frames that arrive on `port`, at any priority.
    pub fn by_in_port(port: u32) -> FlowDelete {
        FlowDelete {
            pattern: Pattern {
                in_port: Some(port),
                ..Pattern::match_all()
            },
            out_port: PseudoPort::Any,
        }
    }

    /// Rules forwarding out of `port`.
    pub fn by_out_port(port: u32) -> FlowDelete {
        FlowDelete {
            pattern: Pattern::match_all(),
            out_port: PseudoPort::PhysicalPort(port),
        }
    }

    pub fn selects(&self, rule: &FlowRule) -> bool {
        if !self.pattern.covers(&rule.pattern) {
            return false;
        }
        match self.out_port {
            PseudoPort::Any => true,
            PseudoPort::PhysicalPort(p) => rule.actions.iter().any(|a| a.outputs_to(p)),
            pp => rule.actions.iter().any(|a| *a == Action::Output(pp)),
        }
    }
}
