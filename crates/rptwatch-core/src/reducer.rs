//! Status reducer: folds the event stream into a [`StatusTree`].
//!
//! Each [`EventKind`] is bound to one [`Strategy`] by [`strategy`]:
//!
//! | Strategy  | Kinds                         | Effect                                   |
//! |-----------|-------------------------------|------------------------------------------|
//! | `Reset`   | `host_*`, `device_*`, `dmr_net_*` | subtree replaced by its default, then the event's fields set |
//! | `InPlace` | `dmr_id_*`, `dmr_rf_rx_*`     | only the fields the event carries change |
//!
//! Phase subtrees are memoryless: a new phase never inherits fields from the
//! previous one. The id thread flag and slot state are continuous, so they are
//! edited where they stand. A voice header resets its own slot, which is a
//! field-level reset inside an in-place subtree.
//!
//! Events are applied strictly in arrival order. Nothing here fails; an event
//! missing a field its transition needs is skipped with a warning.

use tracing::warn;

use crate::status::{DeviceStatus, DmrNetStatus, HostStatus, SlotState, StatusTree};
use crate::types::{EventKind, LogEvent};

/// The part of the tree an event kind touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subtree {
    Host,
    Device,
    DmrId,
    DmrNet,
    DmrRfRx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Replace the subtree with its default before applying the event.
    Reset(Subtree),
    /// Update fields of the subtree in place.
    InPlace(Subtree),
}

impl Strategy {
    pub const fn subtree(self) -> Subtree {
        match self {
            Strategy::Reset(subtree) | Strategy::InPlace(subtree) => subtree,
        }
    }
}

/// Transition table: which strategy each event kind uses.
pub const fn strategy(kind: EventKind) -> Strategy {
    use EventKind::*;
    match kind {
        HostStarting | HostRunning | HostExited => Strategy::Reset(Subtree::Host),
        DeviceOpening | DeviceClosing | DeviceProtocol => Strategy::Reset(Subtree::Device),
        DmrNetOpening
        | DmrNetClosing
        | DmrNetSendingAuthorization
        | DmrNetSendingConfiguration
        | DmrNetLoggedIn => Strategy::Reset(Subtree::DmrNet),
        DmrIdThreadStarted | DmrIdThreadStopped => Strategy::InPlace(Subtree::DmrId),
        DmrRfRxVoiceHeader | DmrRfRxVoiceFrame | DmrRfRxVoiceEnd => {
            Strategy::InPlace(Subtree::DmrRfRx)
        }
    }
}

/// Single owner of the mutable [`StatusTree`].
#[derive(Debug, Default)]
pub struct StatusReducer {
    tree: StatusTree,
}

impl StatusReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of the current tree.
    pub fn snapshot(&self) -> &StatusTree {
        &self.tree
    }

    pub fn into_tree(self) -> StatusTree {
        self.tree
    }

    pub fn apply(&mut self, event: &LogEvent) {
        match strategy(event.kind) {
            Strategy::Reset(subtree) => self.reset(subtree),
            Strategy::InPlace(_) => {}
        }
        self.assign(event);
    }

    fn reset(&mut self, subtree: Subtree) {
        match subtree {
            Subtree::Host => self.tree.host = HostStatus::default(),
            Subtree::Device => self.tree.device = DeviceStatus::default(),
            Subtree::DmrNet => self.tree.dmr_net = DmrNetStatus::default(),
            Subtree::DmrId | Subtree::DmrRfRx => {}
        }
    }

    fn assign(&mut self, event: &LogEvent) {
        let tree = &mut self.tree;
        match event.kind {
            EventKind::HostStarting => {
                tree.host.starting = true;
                tree.host.version = text(event, "version");
            }
            EventKind::HostRunning => {
                tree.host.running = true;
                tree.host.version = text(event, "version");
            }
            EventKind::HostExited => {
                tree.host.exited_signal = event.text("signal").map(str::to_string);
                tree.host.version = text(event, "version");
            }
            EventKind::DeviceOpening => tree.device.opening = true,
            EventKind::DeviceClosing => {}
            EventKind::DeviceProtocol => {
                tree.device.open = true;
                tree.device.protocol.version = text(event, "version");
                tree.device.protocol.description = text(event, "description");
                tree.device.protocol.build_id = text(event, "git_id");
            }
            EventKind::DmrNetOpening => tree.dmr_net.opening = true,
            EventKind::DmrNetClosing => {}
            EventKind::DmrNetSendingAuthorization => tree.dmr_net.sending_authorization = true,
            EventKind::DmrNetSendingConfiguration => tree.dmr_net.sending_configuration = true,
            EventKind::DmrNetLoggedIn => tree.dmr_net.open = true,
            EventKind::DmrIdThreadStarted => tree.dmr_id.lookup_thread_running = true,
            EventKind::DmrIdThreadStopped => tree.dmr_id.lookup_thread_running = false,
            EventKind::DmrRfRxVoiceHeader => {
                let Some(slot) = slot_of(event) else { return };
                let state = tree.dmr_rf.rx.entry(slot).or_default();
                *state = SlotState::new(slot);
                state.receiving = true;
                state.rx_start = Some(event.timestamp);
                state.source_id = text(event, "source");
                state.destination_id = text(event, "destination");
            }
            EventKind::DmrRfRxVoiceFrame => {
                let Some(slot) = slot_of(event) else { return };
                let state = tree
                    .dmr_rf
                    .rx
                    .entry(slot)
                    .or_insert_with(|| SlotState::new(slot));
                // Header line was missed: treat the first frame as the start.
                if state.rx_start.is_none() {
                    state.receiving = true;
                    state.rx_start = Some(event.timestamp);
                }
                if let Some(ber) = event.float("ber") {
                    state.bit_error_rate = ber;
                }
            }
            EventKind::DmrRfRxVoiceEnd => {
                let Some(slot) = slot_of(event) else { return };
                let state = tree
                    .dmr_rf
                    .rx
                    .entry(slot)
                    .or_insert_with(|| SlotState::new(slot));
                if state.rx_start.is_none() {
                    state.rx_start = Some(event.timestamp);
                }
                state.receiving = false;
                if let Some(ber) = event.float("ber") {
                    state.bit_error_rate = ber;
                }
                if let Some(seconds) = event.float("seconds") {
                    state.elapsed_seconds = seconds;
                }
            }
        }
    }
}

fn text(event: &LogEvent, name: &str) -> String {
    event.text(name).unwrap_or_default().to_string()
}

fn slot_of(event: &LogEvent) -> Option<u8> {
    let slot = event.int("slot").and_then(|s| u8::try_from(s).ok());
    if slot.is_none() {
        warn!(kind = %event.kind, "event without a usable slot number skipped");
    }
    slot
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
