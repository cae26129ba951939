use std::sync::Arc;

use rust_l2ctl::config::Config;
use rust_l2ctl::flow::{Action, FlowRule, Pattern, PseudoPort, Timeout};
use rust_l2ctl::installer::{Payload, PacketOut};
use rust_l2ctl::learning_switch::{Event, LearningSwitch};
use rust_l2ctl::mac_learning::SwitchRegistry;
use rust_l2ctl::openflow0x04::{PacketIn, PortDesc, PortReason, PortStatus, SwitchFeatures};
use rust_l2ctl::packet::{MacAddr, VlanMatch};
use rust_l2ctl::sim::SimulatedSwitch;

const AA_BB: MacAddr = MacAddr([0xaa, 0xbb, 0, 0, 0, 0]);
const CC_DD: MacAddr = MacAddr([0xcc, 0xdd, 0, 0, 0, 0]);
const EE_FF: MacAddr = MacAddr([0xee, 0xff, 0, 0, 0, 0]);

fn frame(dst: MacAddr, src: MacAddr, vlan: Option<u16>, typ: u16) -> Vec<u8> {
    let mut buf = vec![];
    buf.extend_from_slice(&dst.octets());
    buf.extend_from_slice(&src.octets());
    if let Some(vid) = vlan {
        buf.extend_from_slice(&[0x81, 0x00]);
        buf.extend_from_slice(&vid.to_be_bytes());
    }
    buf.extend_from_slice(&typ.to_be_bytes());
    buf.extend_from_slice(&[0; 46]);
    buf
}

fn packet_in(in_port: u32, data: Vec<u8>) -> Event {
    Event::PacketIn(PacketIn {
        buffer_id: None,
        total_len: data.len() as u16,
        reason: 0,
        table_id: 0,
        cookie: 0,
        in_port,
        data,
    })
}

fn connect(dpid: u64, registry: &Arc<SwitchRegistry>) -> LearningSwitch<SimulatedSwitch> {
    let mut sw = LearningSwitch::new(registry.clone(), SimulatedSwitch::new(), &Config::default());
    sw.handle(Event::SwitchFeatures(SwitchFeatures {
        datapath_id: dpid,
        num_buffers: 0,
        num_tables: 1,
        auxiliary_id: 0,
        capabilities: 0,
    }))
    .unwrap();
    sw
}

#[test]
fn two_host_conversation() {
    let registry = Arc::new(SwitchRegistry::new());
    let mut sw = connect(1, &registry);
    assert_eq!(sw.installer().datapath().flows(), &[FlowRule::table_miss()]);

    let first = frame(CC_DD, AA_BB, None, 0x0800);
    sw.handle(packet_in(1, first.clone())).unwrap();
    {
        let dp = sw.installer().datapath();
        assert_eq!(registry.attach(1).lock().lookup(&AA_BB), Some(1));
        assert_eq!(dp.flows().len(), 1);
        assert_eq!(
            dp.packets_out(),
            &[PacketOut {
                output_payload: Payload::NotBuffered(first),
                in_port: 1,
                apply_actions: vec![Action::Output(PseudoPort::AllPorts)],
            }]
        );
    }

    sw.handle(packet_in(2, frame(AA_BB, CC_DD, None, 0x0800))).unwrap();
    let dp = sw.installer().datapath();
    assert_eq!(registry.attach(1).lock().lookup(&CC_DD), Some(2));
    let learned = FlowRule {
        priority: 1,
        pattern: Pattern {
            in_port: Some(2),
            dl_dst: Some(AA_BB),
            dl_src: Some(CC_DD),
            dl_vlan: Some(VlanMatch::Untagged),
        },
        actions: vec![Action::Output(PseudoPort::PhysicalPort(1))],
        idle_timeout: Timeout::ExpiresAfter(300),
        buffer_id: None,
    };
    assert_eq!(dp.flows(), &[FlowRule::table_miss(), learned]);
    assert_eq!(dp.packets_out().len(), 2);
    assert_eq!(
        dp.packets_out()[1].apply_actions,
        vec![Action::Output(PseudoPort::PhysicalPort(1))]
    );
}

#[test]
fn repeated_table_miss_is_idempotent() {
    let registry = Arc::new(SwitchRegistry::new());
    let mut sw = connect(1, &registry);
    let once = sw.installer().datapath().flows().to_vec();
    sw.installer_mut().install_table_miss().unwrap();
    assert_eq!(sw.installer().datapath().flows(), &once[..]);
}

#[test]
fn tagged_traffic_matches_with_presence_bit() {
    let registry = Arc::new(SwitchRegistry::new());
    let mut sw = connect(1, &registry);
    sw.handle(packet_in(1, frame(CC_DD, AA_BB, Some(10), 0x0800))).unwrap();
    sw.handle(packet_in(2, frame(AA_BB, CC_DD, Some(10), 0x0800))).unwrap();
    let rule = sw.installer().datapath().flows_from_port(2)[0].clone();
    assert_eq!(rule.pattern.dl_vlan.map(VlanMatch::to_int), Some(4106));

    sw.handle(packet_in(2, frame(AA_BB, EE_FF, Some(0), 0x0800))).unwrap();
    let tagged_zero = sw
        .installer()
        .datapath()
        .flows()
        .iter()
        .find(|r| r.pattern.dl_src == Some(EE_FF))
        .cloned()
        .unwrap();
    assert_eq!(tagged_zero.pattern.dl_vlan, Some(VlanMatch::Tagged(0)));
    assert_eq!(tagged_zero.pattern.dl_vlan.map(VlanMatch::to_int), Some(4096));
}

#[test]
fn lldp_is_never_learned_or_forwarded() {
    let registry = Arc::new(SwitchRegistry::new());
    let mut sw = connect(1, &registry);
    sw.handle(packet_in(1, frame(CC_DD, AA_BB, None, 0x88cc))).unwrap();
    sw.handle(packet_in(1, frame(CC_DD, AA_BB, Some(3), 0x88cc))).unwrap();
    assert!(registry.attach(1).lock().is_empty());
    assert_eq!(sw.installer().datapath().commands(), 1);
    assert!(sw.installer().datapath().packets_out().is_empty());
}

#[test]
fn port_delete_removes_rules_both_ways() {
    let registry = Arc::new(SwitchRegistry::new());
    let mut sw = connect(1, &registry);
    // hosts on ports 3, 4 and 5 talk to each other
    let hosts = [(3, AA_BB), (4, CC_DD), (5, EE_FF)];
    for &(port, src) in &hosts {
        sw.handle(packet_in(port, frame(MacAddr([0xff; 6]), src, None, 0x0806)))
            .unwrap();
    }
    for &(port, src) in &hosts {
        for &(_, dst) in &hosts {
            if src != dst {
                sw.handle(packet_in(port, frame(dst, src, None, 0x0800))).unwrap();
            }
        }
    }
    {
        let dp = sw.installer().datapath();
        assert!(!dp.flows_from_port(3).is_empty());
        assert!(!dp.flows_to_port(3).is_empty());
    }

    sw.handle(Event::PortStatus(PortStatus {
        reason: PortReason::PortDelete,
        desc: PortDesc {
            port_no: 3,
            ..PortDesc::default()
        },
    }))
    .unwrap();
    let dp = sw.installer().datapath();
    assert!(dp.flows_from_port(3).is_empty());
    assert!(dp.flows_to_port(3).is_empty());
    // rules between 4 and 5 and the table-miss rule survive
    assert_eq!(dp.flows().len(), 3);
}

#[test]
fn switches_learn_independently() {
    let registry = Arc::new(SwitchRegistry::new());
    let mut one = connect(1, &registry);
    let mut two = connect(2, &registry);
    one.handle(packet_in(1, frame(CC_DD, AA_BB, None, 0x0800))).unwrap();
    two.handle(packet_in(7, frame(AA_BB, CC_DD, None, 0x0800))).unwrap();
    // AA:BB is only known on switch 1, so switch 2 floods
    assert_eq!(two.installer().datapath().flows().len(), 1);
    assert_eq!(registry.attach(2).lock().lookup(&AA_BB), None);

    two.close();
    assert!(registry.get(2).is_none());
    assert_eq!(registry.attach(1).lock().lookup(&AA_BB), Some(1));
}
