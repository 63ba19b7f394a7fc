//! The mission transfer state machine.
//!
//! One transaction at a time: download, upload, clear, or set-current. The
//! machine is sans-io: every entry point returns the effects to apply
//! (messages to send, status lines, list mutations) and the driver owns the
//! wall clock. `handle_timeout` is called when the protocol deadline
//! expires; accepted progress events advance `timer_generation`, which tells
//! the driver to re-arm the deadline and restores the retry budget.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::item::MissionItem;
use super::wire::{ItemEncoding, SenderId, WireCommand, COMP_ID_AUTOPILOT};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Protocol timeout between accepted progress events.
    pub timeout_ms: u64,
    /// Minimum spacing between outbound messages, for slow peers.
    pub min_send_gap_ms: u64,
    /// Resends after the initial attempt before a transaction aborts.
    pub max_retries: u8,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            min_send_gap_ms: 20,
            max_retries: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Idle,
    /// Download: awaiting MISSION_COUNT.
    GetList,
    /// Download: fetching items in sequence.
    GetListGetItems,
    /// Upload: count sent, awaiting the first request.
    SendList,
    /// Upload: answering integer-typed item requests.
    SendItemsInt,
    /// Upload: answering float-typed item requests.
    SendItemsFloat,
    /// Awaiting the clear-all acknowledgement.
    ClearList,
    /// Awaiting confirmation of a new current waypoint.
    SetCurrent,
}

/// What the facade must do in response to a machine entry point.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send(WireCommand),
    Status(String),
    /// The vehicle answered the read: drop the draft before mirroring.
    ClearEditable,
    /// An in-sequence item arrived during a download.
    Downloaded {
        item: MissionItem,
        mirror_to_edit: bool,
    },
    DownloadFinished,
    UploadFinished,
    ClearFinished,
    /// The vehicle confirmed a set-current with this sequence.
    CurrentConfirmed { seq: u16 },
    /// Retries exhausted; the transaction was dropped.
    Aborted { download: bool },
}

#[derive(Debug)]
pub struct TransferMachine {
    state: TransferState,
    partner: SenderId,
    expected_seq: u16,
    count: u16,
    retries_left: u8,
    read_to_edit: bool,
    download_request: ItemEncoding,
    upload_buffer: Vec<MissionItem>,
    timer_generation: u64,
    policy: RetryPolicy,
}

impl TransferMachine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            state: TransferState::Idle,
            partner: idle_partner(),
            expected_seq: 0,
            count: 0,
            retries_left: 0,
            read_to_edit: false,
            download_request: ItemEncoding::Int,
            upload_buffer: Vec::new(),
            timer_generation: 0,
            policy,
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == TransferState::Idle
    }

    pub fn timer_armed(&self) -> bool {
        self.state != TransferState::Idle
    }

    pub fn timer_generation(&self) -> u64 {
        self.timer_generation
    }

    #[cfg(test)]
    pub(crate) fn retries_left(&self) -> u8 {
        self.retries_left
    }

    /// Restart the protocol timer and restore the retry budget. Called on
    /// transaction start and on every accepted progress event.
    fn arm_timer(&mut self) {
        self.retries_left = self.policy.max_retries;
        self.timer_generation += 1;
    }

    fn reset(&mut self) {
        self.state = TransferState::Idle;
        self.partner = idle_partner();
        self.expected_seq = 0;
        self.count = 0;
        self.upload_buffer.clear();
    }

    // -----------------------------------------------------------------------
    // Transaction starts (facade guards on `is_idle` and an online target)
    // -----------------------------------------------------------------------

    pub fn start_download(&mut self, partner: SenderId, read_to_edit: bool) -> Vec<Effect> {
        self.state = TransferState::GetList;
        self.partner = partner;
        self.expected_seq = 0;
        self.count = 0;
        self.read_to_edit = read_to_edit;
        self.download_request = ItemEncoding::Int;
        self.arm_timer();
        vec![
            Effect::Status(String::from("Requesting waypoint list...")),
            Effect::Send(WireCommand::RequestList),
        ]
    }

    pub fn start_upload(&mut self, partner: SenderId, items: Vec<MissionItem>) -> Vec<Effect> {
        let mut buffer = items;
        let mut have_current = false;
        for (index, item) in buffer.iter_mut().enumerate() {
            item.seq = index as u16;
            if item.current {
                if have_current {
                    item.current = false;
                } else {
                    have_current = true;
                }
            }
        }
        if !have_current {
            if let Some(last) = buffer.last_mut() {
                // The vehicle requires a current waypoint.
                last.current = true;
            }
        }
        self.count = buffer.len() as u16;
        self.upload_buffer = buffer;
        self.expected_seq = 0;
        self.state = TransferState::SendList;
        self.partner = partner;
        self.arm_timer();
        vec![
            Effect::Status(String::from("Starting to transmit waypoints...")),
            Effect::Send(WireCommand::Count { count: self.count }),
        ]
    }

    pub fn start_clear(&mut self, partner: SenderId) -> Vec<Effect> {
        self.state = TransferState::ClearList;
        self.partner = partner;
        self.expected_seq = 0;
        self.arm_timer();
        vec![
            Effect::Status(String::from("Clearing waypoint list...")),
            Effect::Send(WireCommand::ClearAll),
        ]
    }

    pub fn start_set_current(&mut self, partner: SenderId, seq: u16) -> Vec<Effect> {
        self.state = TransferState::SetCurrent;
        self.partner = partner;
        self.expected_seq = seq;
        self.arm_timer();
        vec![
            Effect::Status(String::from("Updating target waypoint...")),
            Effect::Send(WireCommand::SetCurrent { seq }),
        ]
    }

    // -----------------------------------------------------------------------
    // Inbound handlers
    // -----------------------------------------------------------------------

    pub fn handle_count(&mut self, sender: SenderId, count: u16) -> Vec<Effect> {
        if self.state != TransferState::GetList || sender.system_id != self.partner.system_id {
            debug!(
                state = ?self.state,
                system_id = sender.system_id,
                "rejecting MISSION_COUNT"
            );
            return Vec::new();
        }
        self.arm_timer();

        let mut effects = Vec::new();
        if self.read_to_edit {
            // The draft survives until the vehicle answers; now it is safe
            // to drop it for the incoming mission.
            effects.push(Effect::ClearEditable);
        }
        if count == 0 {
            effects.push(Effect::Status(String::from("done.")));
            effects.push(Effect::DownloadFinished);
            self.reset();
        } else {
            self.count = count;
            self.expected_seq = 0;
            self.state = TransferState::GetListGetItems;
            effects.push(self.retrieving_status(0));
            effects.push(Effect::Send(self.item_request(0)));
        }
        effects
    }

    pub fn handle_item(&mut self, sender: SenderId, item: MissionItem) -> Vec<Effect> {
        if self.state != TransferState::GetListGetItems
            || sender.system_id != self.partner.system_id
        {
            debug!(
                state = ?self.state,
                system_id = sender.system_id,
                seq = item.seq,
                "rejecting MISSION_ITEM"
            );
            return Vec::new();
        }
        if item.seq != self.expected_seq {
            // Stale or duplicated frame; the running timer covers recovery.
            warn!(expected = self.expected_seq, got = item.seq, "waypoint sequence mismatch");
            return vec![Effect::Status(String::from(
                "Waypoint ID mismatch, rejecting waypoint",
            ))];
        }
        self.arm_timer();

        let mut effects = vec![Effect::Downloaded {
            item,
            mirror_to_edit: self.read_to_edit,
        }];
        self.expected_seq += 1;
        if self.expected_seq < self.count {
            effects.push(self.retrieving_status(self.expected_seq));
            effects.push(Effect::Send(self.item_request(self.expected_seq)));
        } else {
            effects.push(Effect::Send(WireCommand::Ack { kind: 0 }));
            effects.push(Effect::Status(String::from("done.")));
            effects.push(Effect::DownloadFinished);
            self.reset();
        }
        effects
    }

    pub fn handle_request(
        &mut self,
        sender: SenderId,
        seq: u16,
        encoding: ItemEncoding,
    ) -> Vec<Effect> {
        let in_window = match self.state {
            TransferState::SendList => seq == 0,
            TransferState::SendItemsInt | TransferState::SendItemsFloat => {
                seq == self.expected_seq || seq == self.expected_seq + 1
            }
            _ => false,
        };
        if sender.system_id != self.partner.system_id || !in_window {
            debug!(
                state = ?self.state,
                system_id = sender.system_id,
                seq,
                "rejecting MISSION_REQUEST"
            );
            return Vec::new();
        }
        if seq >= self.count {
            debug!(seq, count = self.count, "peer requested a waypoint that does not exist");
            return Vec::new();
        }
        self.arm_timer();
        self.state = match encoding {
            ItemEncoding::Int => TransferState::SendItemsInt,
            ItemEncoding::Float => TransferState::SendItemsFloat,
        };
        self.expected_seq = seq;
        vec![
            Effect::Status(format!(
                "Sending waypoint ID {seq} of {} total",
                self.count
            )),
            Effect::Send(self.item_send(seq)),
        ]
    }

    pub fn handle_ack(&mut self, sender: SenderId, kind: u8) -> Vec<Effect> {
        let component_ok = sender.component_id == self.partner.component_id
            || sender.component_id == COMP_ID_AUTOPILOT;
        if sender.system_id != self.partner.system_id || !component_ok {
            debug!(system_id = sender.system_id, "rejecting MISSION_ACK");
            return Vec::new();
        }
        match self.state {
            TransferState::SendList | TransferState::SendItemsInt | TransferState::SendItemsFloat
                if kind == 0 && self.count > 0 && self.expected_seq == self.count - 1 =>
            {
                self.reset();
                vec![
                    Effect::Status(String::from("done.")),
                    Effect::UploadFinished,
                ]
            }
            TransferState::ClearList => {
                self.reset();
                vec![Effect::Status(String::from("done.")), Effect::ClearFinished]
            }
            _ => {
                debug!(state = ?self.state, kind, "ignoring MISSION_ACK");
                Vec::new()
            }
        }
    }

    pub fn handle_current(&mut self, sender: SenderId, seq: u16) -> Vec<Effect> {
        // CURRENT doubles as telemetry; the machine only consumes it while a
        // set-current transaction is pending.
        if self.state != TransferState::SetCurrent || sender.system_id != self.partner.system_id {
            return Vec::new();
        }
        self.reset();
        vec![Effect::CurrentConfirmed { seq }]
    }

    // -----------------------------------------------------------------------
    // Timer
    // -----------------------------------------------------------------------

    pub fn handle_timeout(&mut self) -> Vec<Effect> {
        if self.state == TransferState::Idle {
            return Vec::new();
        }
        if self.retries_left == 0 {
            warn!(state = ?self.state, "transfer timed out, aborting");
            let download = matches!(
                self.state,
                TransferState::GetList | TransferState::GetListGetItems
            );
            self.reset();
            return vec![
                Effect::Status(String::from("Operation timed out.")),
                Effect::Aborted { download },
            ];
        }

        self.retries_left -= 1;
        // Restart the deadline without restoring the retry budget.
        self.timer_generation += 1;
        if self.state == TransferState::GetListGetItems {
            // Some stacks never answer the integer request form; fall back
            // to the float form for the rest of this transaction.
            self.download_request = ItemEncoding::Float;
        }
        let resend = match self.state {
            TransferState::GetList => WireCommand::RequestList,
            TransferState::GetListGetItems => self.item_request(self.expected_seq),
            TransferState::SendList => WireCommand::Count { count: self.count },
            TransferState::SendItemsInt | TransferState::SendItemsFloat => {
                self.item_send(self.expected_seq)
            }
            TransferState::ClearList => WireCommand::ClearAll,
            TransferState::SetCurrent => WireCommand::SetCurrent {
                seq: self.expected_seq,
            },
            TransferState::Idle => return Vec::new(),
        };
        warn!(state = ?self.state, retries_left = self.retries_left, "protocol timeout, retrying");
        vec![
            Effect::Status(format!(
                "Timeout, retrying (retries left: {})",
                self.retries_left
            )),
            Effect::Send(resend),
        ]
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn item_request(&self, seq: u16) -> WireCommand {
        match self.download_request {
            ItemEncoding::Int => WireCommand::RequestInt { seq },
            ItemEncoding::Float => WireCommand::Request { seq },
        }
    }

    /// The upload item at `seq`, encoded for the variant the peer last used.
    fn item_send(&self, seq: u16) -> WireCommand {
        let item = self.upload_buffer[seq as usize].clone();
        match self.state {
            TransferState::SendItemsFloat => WireCommand::ItemFloat(item),
            _ => WireCommand::ItemInt(item),
        }
    }

    fn retrieving_status(&self, seq: u16) -> Effect {
        Effect::Status(format!(
            "Retrieving waypoint ID {seq} of {} total",
            self.count
        ))
    }
}

fn idle_partner() -> SenderId {
    SenderId {
        system_id: 0,
        component_id: COMP_ID_AUTOPILOT,
    }
}
