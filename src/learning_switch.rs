use std::sync::Arc;

use log::{debug, info, trace, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::flow::{Action, FlowRule, PseudoPort};
use crate::installer::{Datapath, FlowRuleInstaller, PacketOut, Payload};
use crate::mac_learning::{SharedTable, SwitchRegistry};
use crate::openflow0x04::{PacketIn, PortReason, PortStatus, SwitchFeatures};
use crate::packet::{self, Classification, FrameInfo};

/// Lifecycle of a switch session as seen by the controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    FeaturesNegotiated,
    Active,
    Closed,
}

/// Kinds of event delivered to a `LearningSwitch`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    SwitchFeatures,
    PacketIn,
    PortStatus,
}

impl EventKind {
    /// The only session state in which an event of this kind is handled.
    pub fn valid_in(self) -> SessionState {
        match self {
            EventKind::SwitchFeatures => SessionState::Connecting,
            EventKind::PacketIn => SessionState::Active,
            EventKind::PortStatus => SessionState::Active,
        }
    }
}

/// Events from a switch session, delivered in arrival order.
#[derive(Debug)]
pub enum Event {
    /// Feature negotiation finished; the switch is identified.
    SwitchFeatures(SwitchFeatures),
    PacketIn(PacketIn),
    PortStatus(PortStatus),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match *self {
            Event::SwitchFeatures(_) => EventKind::SwitchFeatures,
            Event::PacketIn(_) => EventKind::PacketIn,
            Event::PortStatus(_) => EventKind::PortStatus,
        }
    }
}

/// Where a frame should go.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// Destination is known to sit behind this port.
    Forward(u32),
    /// Destination unknown: send out of every port.
    Flood,
}

impl Route {
    fn action(self) -> Action {
        match self {
            Route::Forward(p) => Action::Output(PseudoPort::PhysicalPort(p)),
            Route::Flood => Action::Output(PseudoPort::AllPorts),
        }
    }
}

/// Implements L2 learning switch functionality for one switch session.
///
/// The switch punts unmatched frames to the controller, which learns the
/// source host's port. If the destination is already known a flow entry is
/// pushed so that later frames of the same flow stay in the switch; otherwise
/// the frame is flooded.
pub struct LearningSwitch<D> {
    registry: Arc<SwitchRegistry>,
    known_hosts: Option<SharedTable>,
    installer: FlowRuleInstaller<D>,
    state: SessionState,
    purge_on_port_delete: bool,
}

impl<D: Datapath> LearningSwitch<D> {
    pub fn new(registry: Arc<SwitchRegistry>, datapath: D, config: &Config) -> LearningSwitch<D> {
        LearningSwitch {
            registry,
            known_hosts: None,
            installer: FlowRuleInstaller::new(0, datapath),
            state: SessionState::Connecting,
            purge_on_port_delete: config.purge_learned_on_port_delete,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Datapath id, once features have been negotiated.
    pub fn dpid(&self) -> Option<u64> {
        self.known_hosts.as_ref().map(|_| self.installer.dpid())
    }

    pub fn installer(&self) -> &FlowRuleInstaller<D> {
        &self.installer
    }

    pub fn installer_mut(&mut self) -> &mut FlowRuleInstaller<D> {
        &mut self.installer
    }

    /// Dispatch `event` to its handler, rejecting it if the session is not in
    /// the state the event belongs to.
    pub fn handle(&mut self, event: Event) -> Result<()> {
        let kind = event.kind();
        if kind.valid_in() != self.state {
            return Err(Error::UnexpectedEvent {
                event: kind,
                state: self.state,
            });
        }
        match event {
            Event::SwitchFeatures(features) => self.switch_connected(features),
            Event::PacketIn(pkt) => self.packet_in(pkt),
            Event::PortStatus(sts) => self.port_status(sts),
        }
    }

    /// End the session and discard everything learned for the switch, unless
    /// a newer session for the same datapath has taken the table over.
    pub fn close(&mut self) {
        if let Some(table) = self.known_hosts.take() {
            let dpid = self.installer.dpid();
            if self.registry.detach_if(dpid, &table) {
                info!("switch {:016x} disconnected", dpid);
            } else {
                info!("switch {:016x}: stale session closed", dpid);
            }
        }
        self.state = SessionState::Closed;
    }

    fn switch_connected(&mut self, features: SwitchFeatures) -> Result<()> {
        let dpid = features.datapath_id;
        info!(
            "switch {:016x} connected: {} buffers, {} tables",
            dpid, features.num_buffers, features.num_tables
        );
        self.state = SessionState::FeaturesNegotiated;
        self.installer.set_dpid(dpid);
        self.known_hosts = Some(self.registry.connect(dpid));
        self.installer.install_table_miss()?;
        self.state = SessionState::Active;
        Ok(())
    }

    /// Learn the source host and pick a route for the destination. `None` if
    /// the session has no table yet.
    fn learn_and_route(&self, in_port: u32, frame: &FrameInfo) -> Option<Route> {
        let table = self.known_hosts.as_ref()?;
        let mut table = table.lock();
        table.learn(frame.dl_src, in_port);
        Some(match table.lookup(&frame.dl_dst) {
            Some(p) => Route::Forward(p),
            None => Route::Flood,
        })
    }

    fn packet_in(&mut self, pkt: PacketIn) -> Result<()> {
        let dpid = self.installer.dpid();
        if pkt.data.len() < pkt.total_len as usize {
            debug!(
                "switch {:016x}: packet truncated: only {} of {} bytes",
                dpid,
                pkt.data.len(),
                pkt.total_len
            );
        }
        let frame = match packet::classify(&pkt.data) {
            Ok(Classification::Frame(frame)) => frame,
            Ok(Classification::Ignorable) => {
                trace!("switch {:016x}: ignoring lldp frame on port {}", dpid, pkt.in_port);
                return Ok(());
            }
            Err(e) => {
                warn!("switch {:016x}: dropping packet-in on port {}: {}", dpid, pkt.in_port, e);
                return Ok(());
            }
        };
        if let Some(vid) = frame.dl_vlan {
            info!(
                "switch {:016x}: packet in {} -> {} port {} vlan {}",
                dpid, frame.dl_src, frame.dl_dst, pkt.in_port, vid
            );
        }

        let route = self
            .learn_and_route(pkt.in_port, &frame)
            .ok_or(Error::SessionClosed)?;
        let actions = vec![route.action()];

        if let Route::Forward(out_port) = route {
            debug!(
                "switch {:016x}: installing rule for {} to {} via port {}",
                dpid, frame.dl_src, frame.dl_dst, out_port
            );
            let rule = FlowRule::learned(pkt.in_port, &frame, out_port, pkt.buffer_id);
            self.installer.install(rule)?;
            if pkt.buffer_id.is_some() {
                // the switch releases its buffered copy through the new rule
                return Ok(());
            }
        } else {
            debug!("switch {:016x}: flooding to {}", dpid, frame.dl_dst);
        }

        let output_payload = match pkt.buffer_id {
            Some(buffer_id) => Payload::Buffered(buffer_id),
            None => Payload::NotBuffered(pkt.data),
        };
        self.installer.packet_out(PacketOut {
            output_payload,
            in_port: pkt.in_port,
            apply_actions: actions,
        })
    }

    fn port_status(&mut self, sts: PortStatus) -> Result<()> {
        let dpid = self.installer.dpid();
        let port_no = sts.desc.port_no;
        match sts.reason {
            PortReason::PortAdd => info!("switch {:016x}: port added {}", dpid, port_no),
            PortReason::PortModify => info!("switch {:016x}: port modified {}", dpid, port_no),
            PortReason::PortDelete => {
                info!("switch {:016x}: port deleted {}", dpid, port_no);
                if self.purge_on_port_delete {
                    if let Some(table) = self.known_hosts.as_ref() {
                        let purged = table.lock().forget_port(port_no);
                        debug!("switch {:016x}: forgot {} hosts on port {}", dpid, purged, port_no);
                    }
                }
                self.installer.delete_by_port(port_no)?;
            }
            PortReason::Other(code) => {
                info!(
                    "switch {:016x}: illegal port state {}: {}",
                    dpid,
                    port_no,
                    Error::UnrecognizedPortReason(code)
                );
            }
        }
        Ok(())
    }
}
