//! The status tree: the latest known state of the monitored host.
//!
//! Every type here is a plain value. The reducer owns the only mutable copy;
//! everyone else works with clones.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusTree {
    pub host: HostStatus,
    pub device: DeviceStatus,
    pub dmr_id: DmrIdStatus,
    pub dmr_net: DmrNetStatus,
    pub dmr_rf: DmrRfStatus,
}

/// Host process lifecycle. At most one of `starting` and `running` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostStatus {
    pub starting: bool,
    pub running: bool,
    /// Signal name from the last exit line, e.g. `SIGTERM`.
    pub exited_signal: Option<String>,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStatus {
    pub opening: bool,
    pub open: bool,
    pub protocol: DeviceProtocol,
}

/// Firmware identification reported by the modem once it is open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceProtocol {
    pub version: String,
    pub description: String,
    pub build_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DmrIdStatus {
    pub lookup_thread_running: bool,
}

/// DMR network login sequence. The stages are mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DmrNetStatus {
    pub opening: bool,
    pub sending_authorization: bool,
    pub sending_configuration: bool,
    pub open: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DmrRfStatus {
    /// Receive activity keyed by slot number.
    pub rx: BTreeMap<u8, SlotState>,
    /// Transmit activity. The host logs nothing this tree tracks yet.
    pub tx: BTreeMap<u8, SlotState>,
}

/// Voice activity on one DMR time slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlotState {
    pub receiving: bool,
    pub rx_start: Option<NaiveDateTime>,
    pub elapsed_seconds: f64,
    pub slot_number: u8,
    pub source_id: String,
    pub destination_id: String,
    /// Percentage, as the host reports it.
    pub bit_error_rate: f64,
}

impl SlotState {
    pub fn new(slot_number: u8) -> Self {
        Self {
            slot_number,
            ..Self::default()
        }
    }
}

impl StatusTree {
    pub fn rx_slot(&self, slot: u8) -> Option<&SlotState> {
        self.dmr_rf.rx.get(&slot)
    }
}
