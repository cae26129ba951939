use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::packet::MacAddr;

/// Per-switch map from host MAC address to the port it was last seen on.
///
/// Entries never expire; they live as long as the switch stays attached to the
/// `SwitchRegistry`.
#[derive(Debug, Default)]
pub struct MacLearningTable {
    known_hosts: HashMap<MacAddr, u32>,
}

impl MacLearningTable {
    pub fn new() -> MacLearningTable {
        MacLearningTable::default()
    }

    /// Record that `mac` was seen on `port`, overwriting any earlier port.
    pub fn learn(&mut self, mac: MacAddr, port: u32) {
        if let Some(old) = self.known_hosts.insert(mac, port) {
            if old != port {
                debug!("host {} moved from port {} to {}", mac, old, port);
            }
        }
    }

    pub fn lookup(&self, mac: &MacAddr) -> Option<u32> {
        self.known_hosts.get(mac).copied()
    }

    /// Drop every host recorded against `port`. Returns how many were dropped.
    pub fn forget_port(&mut self, port: u32) -> usize {
        let before = self.known_hosts.len();
        self.known_hosts.retain(|_, p| *p != port);
        before - self.known_hosts.len()
    }

    pub fn len(&self) -> usize {
        self.known_hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known_hosts.is_empty()
    }
}

pub type SharedTable = Arc<Mutex<MacLearningTable>>;

/// Process-wide registry of learning tables keyed by datapath id.
///
/// The registry lock is only held to insert, remove or clone a handle. Each
/// table is locked solely by the session that owns its switch.
#[derive(Debug, Default)]
pub struct SwitchRegistry {
    tables: Mutex<HashMap<u64, SharedTable>>,
}

impl SwitchRegistry {
    pub fn new() -> SwitchRegistry {
        SwitchRegistry::default()
    }

    /// Return the table for `dpid`, creating an empty one on first contact.
    pub fn attach(&self, dpid: u64) -> SharedTable {
        let mut tables = self.tables.lock();
        tables
            .entry(dpid)
            .or_insert_with(|| Arc::new(Mutex::new(MacLearningTable::new())))
            .clone()
    }

    /// Register a fresh, empty table for `dpid`, replacing whatever an
    /// earlier session left behind.
    pub fn connect(&self, dpid: u64) -> SharedTable {
        let table = Arc::new(Mutex::new(MacLearningTable::new()));
        if let Some(old) = self.tables.lock().insert(dpid, table.clone()) {
            debug!(
                "switch {:016x}: replaced table holding {} hosts from a previous session",
                dpid,
                old.lock().len()
            );
        }
        table
    }

    /// Discard the table for `dpid`.
    pub fn detach(&self, dpid: u64) -> bool {
        self.tables.lock().remove(&dpid).is_some()
    }

    /// Discard the table for `dpid` only if it is still `table`. A session
    /// that lost its switch to a newer connection leaves that one alone.
    pub fn detach_if(&self, dpid: u64, table: &SharedTable) -> bool {
        let mut tables = self.tables.lock();
        match tables.get(&dpid) {
            Some(current) if Arc::ptr_eq(current, table) => {
                tables.remove(&dpid);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, dpid: u64) -> Option<SharedTable> {
        self.tables.lock().get(&dpid).cloned()
    }

    pub fn len(&self) -> usize {
        self.tables.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.lock().is_empty()
    }
}
