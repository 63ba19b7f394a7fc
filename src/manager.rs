//! The waypoint manager facade: the editable draft, the view-only snapshot,
//! the transfer machine, and the live signals, behind one reactive surface.
//!
//! The manager is a single-threaded reactive component. It is driven by
//! facade calls, decoded inbound wire events, and timer expiry; outbound
//! messages accumulate in an outbox that the driver drains (with pacing) and
//! observers receive a [`ManagerEvent`] stream.

use std::path::Path;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ManagerConfig;
use crate::error::ManagerError;
use crate::events::{ManagerEvent, SignalSink};
use crate::live::LiveSignals;
use crate::mission::file;
use crate::mission::item::MissionItem;
use crate::mission::list::{self, DualList};
use crate::mission::recommend;
use crate::mission::transfer::{Effect, RetryPolicy, TransferMachine, TransferState};
use crate::mission::wire::{SenderId, WireCommand, WireEvent};
use crate::settings::{SettingsStore, StoredSettings};

/// Autopilot families the manager distinguishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AutopilotKind {
    #[default]
    Unknown,
    Generic,
    ArduPilotMega,
    Px4,
}

impl AutopilotKind {
    pub(crate) fn from_mav(autopilot: mavlink::common::MavAutopilot) -> Self {
        use mavlink::common::MavAutopilot;
        match autopilot {
            MavAutopilot::MAV_AUTOPILOT_GENERIC => AutopilotKind::Generic,
            MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA => AutopilotKind::ArduPilotMega,
            MavAutopilot::MAV_AUTOPILOT_PX4 => AutopilotKind::Px4,
            _ => AutopilotKind::Unknown,
        }
    }
}

/// Identity of the linked vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VehicleTarget {
    pub system_id: u8,
    pub component_id: u8,
}

/// Capability for the one-shot "offline editing" notification, so the core
/// never reaches into UI globals.
pub trait OfflineNotice: Send {
    /// Called once, when the first editable item is created with no vehicle
    /// link.
    fn offline_editing_started(&mut self);
}

/// Default notifier that only logs.
#[derive(Debug, Default)]
pub struct LogOfflineNotice;

impl OfflineNotice for LogOfflineNotice {
    fn offline_editing_started(&mut self) {
        info!("offline waypoint editing: save the mission to a file before connecting");
    }
}

pub struct WaypointManager {
    config: ManagerConfig,
    lists: DualList,
    machine: TransferMachine,
    live: LiveSignals,
    target: Option<VehicleTarget>,
    autopilot: AutopilotKind,
    signals: SignalSink,
    notifier: Box<dyn OfflineNotice>,
    settings_store: SettingsStore,
    default_rel_altitude: f64,
    offline_notice_sent: bool,
    outbox: Vec<WireCommand>,
}

impl WaypointManager {
    /// Create a manager. `target` is `None` for offline editing (no
    /// transfers, full editing and persistence).
    pub fn new(
        config: ManagerConfig,
        target: Option<VehicleTarget>,
    ) -> (Self, mpsc::UnboundedReceiver<ManagerEvent>) {
        Self::with_notifier(config, target, Box::new(LogOfflineNotice))
    }

    pub fn with_notifier(
        config: ManagerConfig,
        target: Option<VehicleTarget>,
        notifier: Box<dyn OfflineNotice>,
    ) -> (Self, mpsc::UnboundedReceiver<ManagerEvent>) {
        let (signals, events) = SignalSink::new();
        let settings_store = SettingsStore::new(config.settings_path.clone());
        let default_rel_altitude = settings_store.load().default_rel_altitude;
        let machine = TransferMachine::new(config.retry_policy);
        let manager = Self {
            config,
            lists: DualList::default(),
            machine,
            live: LiveSignals::default(),
            target,
            autopilot: AutopilotKind::Unknown,
            signals,
            notifier,
            settings_store,
            default_rel_altitude,
            offline_notice_sent: false,
            outbox: Vec::new(),
        };
        (manager, events)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn count(&self) -> usize {
        self.lists.editable().len()
    }

    pub fn get(&self, seq: u16) -> Option<&MissionItem> {
        self.lists.editable().get(seq)
    }

    pub fn items(&self) -> &[MissionItem] {
        self.lists.editable().items()
    }

    pub fn view_only_items(&self) -> &[MissionItem] {
        self.lists.view_only().items()
    }

    pub fn current_editable(&self) -> Option<&MissionItem> {
        self.lists.current_editable()
    }

    pub fn transfer_state(&self) -> TransferState {
        self.machine.state()
    }

    pub fn is_online(&self) -> bool {
        self.target.is_some()
    }

    pub fn autopilot(&self) -> AutopilotKind {
        self.autopilot
    }

    pub fn default_rel_altitude(&self) -> f64 {
        self.default_rel_altitude
    }

    pub fn global_frame_items(&self) -> Vec<&MissionItem> {
        list::global_frame_items(self.items())
    }

    pub fn navigation_items(&self) -> Vec<&MissionItem> {
        list::navigation_items(self.items())
    }

    pub fn global_navigation_items(&self) -> Vec<&MissionItem> {
        list::global_navigation_items(self.items())
    }

    pub fn local_frame_items(&self) -> Vec<&MissionItem> {
        list::local_frame_items(self.items())
    }

    pub fn global_frame_index_of(&self, seq: u16) -> Option<usize> {
        list::global_frame_index_of(self.items(), seq)
    }

    pub fn navigation_index_of(&self, seq: u16) -> Option<usize> {
        list::navigation_index_of(self.items(), seq)
    }

    pub fn global_navigation_index_of(&self, seq: u16) -> Option<usize> {
        list::global_navigation_index_of(self.items(), seq)
    }

    pub fn local_frame_index_of(&self, seq: u16) -> Option<usize> {
        list::local_frame_index_of(self.items(), seq)
    }

    // -----------------------------------------------------------------------
    // Local editing
    // -----------------------------------------------------------------------

    /// Append a new item with recommended defaults. Returns a copy of the
    /// stored item, sequence stamped.
    pub fn create_item(&mut self, enforce_first_active: bool) -> MissionItem {
        let editable = self.lists.editable().items();
        let frame = recommend::frame(editable, self.is_online());
        let mut item = MissionItem {
            frame,
            ..MissionItem::default()
        };
        item.z = recommend::altitude(editable, frame, self.default_rel_altitude);
        item.set_acceptance_radius(recommend::acceptance_radius(
            editable,
            self.config.default_acceptance_radius,
        ));
        let seq = self.add_editable(item.clone(), enforce_first_active);
        item.seq = seq;
        item.current = self
            .lists
            .editable()
            .get(seq)
            .map(|stored| stored.current)
            .unwrap_or(false);
        item
    }

    /// Append a caller-built item. Returns the stamped sequence.
    pub fn add_editable(&mut self, item: MissionItem, enforce_first_active: bool) -> u16 {
        if self.lists.editable().is_empty() && !self.is_online() && !self.offline_notice_sent {
            self.offline_notice_sent = true;
            self.notifier.offline_editing_started();
        }
        let seq = self.lists.add_editable(item, enforce_first_active);
        self.signals.emit(ManagerEvent::EditableListChanged);
        seq
    }

    pub fn remove(&mut self, seq: u16) -> Result<(), ManagerError> {
        if !self.lists.remove_editable(seq) {
            return Err(ManagerError::OutOfRange(seq));
        }
        self.signals.emit(ManagerEvent::EditableListChanged);
        Ok(())
    }

    pub fn move_item(&mut self, from: u16, to: u16) -> Result<(), ManagerError> {
        if !self.lists.move_editable(from, to) {
            return Err(ManagerError::OutOfRange(from.max(to)));
        }
        self.signals.emit(ManagerEvent::EditableListChanged);
        Ok(())
    }

    pub fn clear_editable(&mut self) {
        self.lists.clear_editable();
        self.signals.emit(ManagerEvent::EditableListChanged);
    }

    pub fn set_current_editable(&mut self, seq: u16) -> Result<(), ManagerError> {
        if !self.machine.is_idle() {
            warn!(state = ?self.machine.state(), "set_current_editable during a transfer");
            return Err(ManagerError::TransferBusy);
        }
        if !self.lists.set_current_editable(seq) {
            return Err(ManagerError::OutOfRange(seq));
        }
        self.signals.emit(ManagerEvent::EditableListChanged);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Write the draft in sequence order. An unwritable path is a silent
    /// no-op apart from the log line.
    pub fn save(&self, path: &Path) {
        if let Err(err) = std::fs::write(path, file::format_mission(self.items())) {
            warn!(%err, path = %path.display(), "could not write waypoint file");
        }
    }

    /// Load the draft from a file, replacing it. Returns the number of items
    /// loaded; a malformed tail yields partial success with a status event.
    /// An unopenable path is a silent no-op: the draft is left untouched and
    /// zero items are reported.
    pub fn load(&mut self, path: &Path) -> Result<usize, ManagerError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) => {
                warn!(%err, path = %path.display(), "could not open waypoint file");
                return Ok(0);
            }
        };
        self.lists.clear_editable();
        self.signals.emit(ManagerEvent::EditableListChanged);
        let parsed = match file::parse_mission(&contents) {
            Ok(parsed) => parsed,
            Err(message) => {
                self.signals
                    .status(format!("Waypoint file is corrupt: {message}"));
                return Err(ManagerError::FileFormat(message));
            }
        };
        if parsed.truncated {
            self.signals
                .status("The waypoint file is corrupted. Load operation only partly successful.");
        }
        let loaded = parsed.items.len();
        self.lists.replace_editable(parsed.items);
        self.signals.emit(ManagerEvent::EditableListChanged);
        Ok(loaded)
    }

    pub fn set_default_rel_altitude(&mut self, altitude: f64) {
        self.default_rel_altitude = altitude;
        self.settings_store.save(&StoredSettings {
            default_rel_altitude: altitude,
        });
    }

    // -----------------------------------------------------------------------
    // Transfers
    // -----------------------------------------------------------------------

    fn transfer_target(&self) -> Result<SenderId, ManagerError> {
        let Some(target) = self.target else {
            warn!("transfer requested with no vehicle link");
            return Err(ManagerError::Offline);
        };
        if !self.machine.is_idle() {
            warn!(state = ?self.machine.state(), "transfer requested while another is in progress");
            return Err(ManagerError::TransferBusy);
        }
        Ok(SenderId {
            system_id: target.system_id,
            component_id: target.component_id,
        })
    }

    /// Download the vehicle's mission into the view-only list, optionally
    /// mirroring it into the draft once the vehicle answers.
    pub fn read_from_vehicle(&mut self, read_to_edit: bool) -> Result<(), ManagerError> {
        let partner = self.transfer_target()?;
        // The old snapshot goes now; the draft survives until the vehicle's
        // count arrives, so a dead link cannot destroy it.
        self.lists.clear_view_only();
        self.signals.emit(ManagerEvent::ViewOnlyListChanged);
        let effects = self.machine.start_download(partner, read_to_edit);
        self.apply_effects(effects);
        Ok(())
    }

    /// Upload the draft. An empty draft erases the vehicle's mission.
    pub fn write_to_vehicle(&mut self) -> Result<(), ManagerError> {
        let partner = self.transfer_target()?;
        let effects = if self.lists.editable().is_empty() {
            self.machine.start_clear(partner)
        } else {
            let items = self.lists.editable().items().to_vec();
            self.machine.start_upload(partner, items)
        };
        self.apply_effects(effects);
        Ok(())
    }

    pub fn clear_on_vehicle(&mut self) -> Result<(), ManagerError> {
        let partner = self.transfer_target()?;
        let effects = self.machine.start_clear(partner);
        self.apply_effects(effects);
        Ok(())
    }

    /// Ask the vehicle to adopt view-only item `seq` as current.
    pub fn set_current_on_vehicle(&mut self, seq: u16) -> Result<(), ManagerError> {
        if seq as usize >= self.lists.view_only().len() {
            return Err(ManagerError::OutOfRange(seq));
        }
        let partner = self.transfer_target()?;
        let effects = self.machine.start_set_current(partner, seq);
        self.apply_effects(effects);
        Ok(())
    }

    /// Single-shot guided-mode target. Not a transfer: fires even while a
    /// transfer runs and never touches the state machine.
    pub fn goto(&mut self, item: &MissionItem) -> Result<(), ManagerError> {
        if self.target.is_none() {
            warn!("goto requested with no vehicle link");
            return Err(ManagerError::Offline);
        }
        if self.autopilot != AutopilotKind::ArduPilotMega {
            warn!(autopilot = ?self.autopilot, "goto requires an ArduPilot-family autopilot");
            return Err(ManagerError::GuidedUnsupported);
        }
        self.outbox.push(WireCommand::Goto(item.clone()));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Inbound events (driver entry points)
    // -----------------------------------------------------------------------

    pub fn handle_event(&mut self, sender: SenderId, event: WireEvent) {
        match event {
            WireEvent::Count { count } => {
                let effects = self.machine.handle_count(sender, count);
                self.apply_effects(effects);
            }
            WireEvent::Item { item, encoding: _ } => {
                let effects = self.machine.handle_item(sender, item);
                self.apply_effects(effects);
            }
            WireEvent::Request { seq, encoding } => {
                let effects = self.machine.handle_request(sender, seq, encoding);
                self.apply_effects(effects);
            }
            WireEvent::Ack { kind } => {
                let effects = self.machine.handle_ack(sender, kind);
                self.apply_effects(effects);
            }
            WireEvent::Current { seq } => {
                if self.is_from_vehicle(sender) {
                    let effects = self.machine.handle_current(sender, seq);
                    self.apply_effects(effects);
                    self.live.on_current(seq, &self.signals);
                }
            }
            WireEvent::Reached { seq } => {
                if self.is_from_vehicle(sender) {
                    self.live.on_reached(seq, &self.signals);
                }
            }
        }
    }

    pub fn handle_local_position(&mut self, x: f64, y: f64, z: f64) {
        self.live
            .on_local_position(self.lists.current_editable(), x, y, z, &self.signals);
    }

    pub fn handle_global_position(&mut self, latitude_deg: f64, longitude_deg: f64, altitude_m: f64) {
        self.live.on_global_position(
            self.lists.current_editable(),
            latitude_deg,
            longitude_deg,
            altitude_m,
            &self.signals,
        );
    }

    pub fn handle_heartbeat(&mut self, sender: SenderId, autopilot: AutopilotKind) {
        if self.is_from_vehicle(sender) {
            self.autopilot = autopilot;
        }
    }

    /// The protocol deadline expired.
    pub fn handle_timer_expired(&mut self) {
        let effects = self.machine.handle_timeout();
        self.apply_effects(effects);
    }

    pub fn timer_armed(&self) -> bool {
        self.machine.timer_armed()
    }

    pub(crate) fn timer_generation(&self) -> u64 {
        self.machine.timer_generation()
    }

    /// Drain pending outbound messages, in send order.
    pub fn take_outbox(&mut self) -> Vec<WireCommand> {
        std::mem::take(&mut self.outbox)
    }

    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        self.config.retry_policy
    }

    pub(crate) fn target_system(&self) -> u8 {
        self.target.map(|target| target.system_id).unwrap_or(0)
    }

    pub(crate) fn target_component(&self) -> u8 {
        self.target.map(|target| target.component_id).unwrap_or(0)
    }

    fn is_from_vehicle(&self, sender: SenderId) -> bool {
        self.target
            .map(|target| target.system_id == sender.system_id)
            .unwrap_or(false)
    }

    fn apply_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(command) => self.outbox.push(command),
                Effect::Status(message) => self.signals.status(message),
                Effect::ClearEditable => {
                    self.lists.clear_editable();
                    self.signals.emit(ManagerEvent::EditableListChanged);
                }
                Effect::Downloaded {
                    item,
                    mirror_to_edit,
                } => {
                    self.lists.push_view_only(item.clone());
                    self.signals.emit(ManagerEvent::ViewOnlyListChanged);
                    if mirror_to_edit {
                        self.lists.push_downloaded_editable(item);
                        self.signals.emit(ManagerEvent::EditableListChanged);
                    }
                }
                Effect::DownloadFinished => {
                    self.live.reset();
                }
                Effect::UploadFinished => {
                    // Refresh the view-only list with what the vehicle now
                    // holds.
                    if let Err(err) = self.read_from_vehicle(false) {
                        debug!(%err, "post-upload refresh not started");
                    }
                }
                Effect::ClearFinished => {}
                Effect::CurrentConfirmed { seq } => {
                    self.lists.confirm_view_only_current(seq);
                    self.signals.emit(ManagerEvent::ViewOnlyListChanged);
                }
                Effect::Aborted { download } => {
                    if download {
                        // A half-fetched snapshot is not a mission.
                        self.lists.clear_view_only();
                        self.signals.emit(ManagerEvent::ViewOnlyListChanged);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::item::MissionFrame;
    use crate::mission::wire::ItemEncoding;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const VEHICLE: VehicleTarget = VehicleTarget {
        system_id: 1,
        component_id: 1,
    };

    fn vehicle_sender() -> SenderId {
        SenderId {
            system_id: 1,
            component_id: 1,
        }
    }

    fn online() -> (WaypointManager, mpsc::UnboundedReceiver<ManagerEvent>) {
        WaypointManager::new(ManagerConfig::default(), Some(VEHICLE))
    }

    fn offline() -> (WaypointManager, mpsc::UnboundedReceiver<ManagerEvent>) {
        WaypointManager::new(ManagerConfig::default(), None)
    }

    fn waypoint(seq: u16, current: bool) -> MissionItem {
        MissionItem {
            seq,
            current,
            x: 47.39 + seq as f64 * 0.001,
            y: 8.54,
            z: 10.0,
            ..MissionItem::default()
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ManagerEvent>) -> Vec<ManagerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn feed_item(manager: &mut WaypointManager, item: MissionItem) {
        manager.handle_event(
            vehicle_sender(),
            WireEvent::Item {
                item,
                encoding: ItemEncoding::Int,
            },
        );
    }

    #[test]
    fn transfers_require_idle_and_online() {
        let (mut manager, _events) = online();
        manager.read_from_vehicle(false).unwrap();
        assert!(matches!(
            manager.read_from_vehicle(false),
            Err(ManagerError::TransferBusy)
        ));
        assert!(matches!(
            manager.clear_on_vehicle(),
            Err(ManagerError::TransferBusy)
        ));

        let (mut manager, _events) = offline();
        assert!(matches!(
            manager.read_from_vehicle(false),
            Err(ManagerError::Offline)
        ));
    }

    #[test]
    fn read_to_edit_mirrors_and_places_current_reference() {
        let (mut manager, mut events) = online();
        manager.add_editable(waypoint(0, false), false);

        manager.read_from_vehicle(true).unwrap();
        // The draft survives until the vehicle answers.
        assert_eq!(manager.count(), 1);
        assert_eq!(manager.take_outbox(), vec![WireCommand::RequestList]);

        manager.handle_event(vehicle_sender(), WireEvent::Count { count: 2 });
        assert_eq!(manager.count(), 0);
        assert_eq!(
            manager.take_outbox(),
            vec![WireCommand::RequestInt { seq: 0 }]
        );

        feed_item(&mut manager, waypoint(0, false));
        feed_item(&mut manager, waypoint(1, true));

        assert_eq!(manager.view_only_items().len(), 2);
        assert_eq!(manager.count(), 2);
        let current = manager.current_editable().expect("mirrored current item");
        assert_eq!(current.seq, 1);
        assert!(current.current);
        assert_eq!(manager.transfer_state(), TransferState::Idle);

        let events = drain(&mut events);
        assert!(events.contains(&ManagerEvent::Status(String::from("done."))));
        let outbox = manager.take_outbox();
        assert_eq!(outbox, vec![
            WireCommand::RequestInt { seq: 1 },
            WireCommand::Ack { kind: 0 },
        ]);
    }

    #[test]
    fn plain_read_leaves_draft_alone() {
        let (mut manager, _events) = online();
        manager.add_editable(waypoint(0, false), false);
        manager.read_from_vehicle(false).unwrap();
        manager.handle_event(vehicle_sender(), WireEvent::Count { count: 1 });
        feed_item(&mut manager, waypoint(0, true));
        assert_eq!(manager.count(), 1);
        assert_eq!(manager.view_only_items().len(), 1);
        assert!(manager.current_editable().is_none());
    }

    #[test]
    fn empty_draft_upload_becomes_clear_all() {
        let (mut manager, _events) = online();
        manager.write_to_vehicle().unwrap();
        assert_eq!(manager.transfer_state(), TransferState::ClearList);
        assert_eq!(manager.take_outbox(), vec![WireCommand::ClearAll]);
    }

    #[test]
    fn upload_ack_triggers_refresh_read() {
        let (mut manager, _events) = online();
        manager.add_editable(waypoint(0, false), false);
        manager.write_to_vehicle().unwrap();
        assert_eq!(manager.take_outbox(), vec![WireCommand::Count { count: 1 }]);

        manager.handle_event(
            vehicle_sender(),
            WireEvent::Request {
                seq: 0,
                encoding: ItemEncoding::Int,
            },
        );
        let outbox = manager.take_outbox();
        assert!(matches!(&outbox[..], [WireCommand::ItemInt(_)]));

        manager.handle_event(vehicle_sender(), WireEvent::Ack { kind: 0 });
        // The completed upload starts a fresh read of the vehicle's list.
        assert_eq!(manager.transfer_state(), TransferState::GetList);
        assert_eq!(manager.take_outbox(), vec![WireCommand::RequestList]);
    }

    #[test]
    fn set_current_confirmation_updates_view_only_flags() {
        let (mut manager, mut events) = online();
        manager.read_from_vehicle(false).unwrap();
        manager.handle_event(vehicle_sender(), WireEvent::Count { count: 2 });
        feed_item(&mut manager, waypoint(0, true));
        feed_item(&mut manager, waypoint(1, false));
        manager.take_outbox();
        drain(&mut events);

        assert!(matches!(
            manager.set_current_on_vehicle(7),
            Err(ManagerError::OutOfRange(7))
        ));

        manager.set_current_on_vehicle(1).unwrap();
        assert_eq!(manager.take_outbox(), vec![WireCommand::SetCurrent { seq: 1 }]);

        manager.handle_event(vehicle_sender(), WireEvent::Current { seq: 1 });
        assert_eq!(manager.transfer_state(), TransferState::Idle);
        assert_eq!(manager.view_only_items()[1].current, true);
        assert_eq!(manager.view_only_items()[0].current, false);
        assert!(drain(&mut events).contains(&ManagerEvent::CurrentWaypointChanged(1)));
    }

    #[test]
    fn current_events_are_deduplicated_and_reset_by_downloads() {
        let (mut manager, mut events) = online();
        manager.handle_event(vehicle_sender(), WireEvent::Current { seq: 2 });
        manager.handle_event(vehicle_sender(), WireEvent::Current { seq: 2 });
        let seen = drain(&mut events);
        assert_eq!(
            seen.iter()
                .filter(|e| matches!(e, ManagerEvent::CurrentWaypointChanged(_)))
                .count(),
            1
        );

        // A stranger's CURRENT is ignored entirely.
        manager.handle_event(
            SenderId {
                system_id: 9,
                component_id: 1,
            },
            WireEvent::Current { seq: 3 },
        );
        assert!(drain(&mut events).is_empty());
    }

    #[test]
    fn reached_reports_status() {
        let (mut manager, mut events) = online();
        manager.handle_event(vehicle_sender(), WireEvent::Reached { seq: 4 });
        let seen = drain(&mut events);
        assert!(seen.contains(&ManagerEvent::WaypointReached(4)));
        assert!(seen.contains(&ManagerEvent::Status(String::from("Reached waypoint 4"))));
    }

    #[test]
    fn goto_requires_ardupilot_family_but_not_idle() {
        let (mut manager, _events) = online();
        let item = waypoint(0, false);
        assert!(matches!(
            manager.goto(&item),
            Err(ManagerError::GuidedUnsupported)
        ));

        manager.handle_heartbeat(vehicle_sender(), AutopilotKind::ArduPilotMega);
        manager.read_from_vehicle(false).unwrap();
        manager.take_outbox();
        manager.goto(&item).unwrap();
        assert!(matches!(
            &manager.take_outbox()[..],
            [WireCommand::Goto(_)]
        ));

        let (mut manager, _events) = offline();
        assert!(matches!(manager.goto(&item), Err(ManagerError::Offline)));
    }

    #[test]
    fn download_abort_drops_partial_snapshot() {
        let (mut manager, mut events) = online();
        manager.read_from_vehicle(false).unwrap();
        manager.handle_event(vehicle_sender(), WireEvent::Count { count: 3 });
        feed_item(&mut manager, waypoint(0, false));
        assert_eq!(manager.view_only_items().len(), 1);

        for _ in 0..6 {
            manager.handle_timer_expired();
        }
        assert_eq!(manager.transfer_state(), TransferState::Idle);
        assert!(manager.view_only_items().is_empty());
        assert!(drain(&mut events)
            .contains(&ManagerEvent::Status(String::from("Operation timed out."))));
    }

    struct CountingNotice(Arc<AtomicUsize>);

    impl OfflineNotice for CountingNotice {
        fn offline_editing_started(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn offline_notice_fires_once_for_the_first_item() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (mut manager, _events) = WaypointManager::with_notifier(
            ManagerConfig::default(),
            None,
            Box::new(CountingNotice(hits.clone())),
        );
        manager.create_item(true);
        manager.create_item(false);
        manager.clear_editable();
        manager.create_item(false);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let hits_online = Arc::new(AtomicUsize::new(0));
        let (mut manager, _events) = WaypointManager::with_notifier(
            ManagerConfig::default(),
            Some(VEHICLE),
            Box::new(CountingNotice(hits_online.clone())),
        );
        manager.create_item(true);
        assert_eq!(hits_online.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn create_item_applies_recommendations() {
        let (mut manager, _events) = offline();
        let home = manager.create_item(true);
        assert_eq!(home.frame, MissionFrame::Global);
        assert_eq!(home.z, 0.0);
        assert!(home.current);
        assert_eq!(home.acceptance_radius(), 5.0);

        let second = manager.create_item(false);
        assert_eq!(second.frame, MissionFrame::GlobalRelativeAlt);
        assert_eq!(second.z as f64, manager.default_rel_altitude());
        assert_eq!(second.seq, 1);
        assert!(!second.current);
    }

    #[test]
    fn set_current_editable_is_guarded_by_idle() {
        let (mut manager, _events) = online();
        manager.add_editable(waypoint(0, false), false);
        manager.add_editable(waypoint(1, false), false);
        manager.read_from_vehicle(false).unwrap();
        assert!(matches!(
            manager.set_current_editable(1),
            Err(ManagerError::TransferBusy)
        ));

        for _ in 0..6 {
            manager.handle_timer_expired();
        }
        manager.set_current_editable(1).unwrap();
        assert_eq!(manager.current_editable().map(|item| item.seq), Some(1));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mission.waypoints");

        let (mut manager, _events) = offline();
        manager.add_editable(waypoint(0, false), true);
        manager.add_editable(waypoint(1, false), false);
        manager.save(&path);

        let (mut fresh, mut events) = offline();
        assert_eq!(fresh.load(&path).unwrap(), 2);
        assert_eq!(fresh.items(), manager.items());
        assert_eq!(fresh.current_editable().map(|item| item.seq), Some(0));
        assert!(!drain(&mut events)
            .iter()
            .any(|event| matches!(event, ManagerEvent::Status(_))));
    }

    #[test]
    fn file_open_failures_are_silent_no_ops() {
        let dir = tempfile::tempdir().unwrap();
        let (mut manager, mut events) = offline();
        manager.add_editable(waypoint(0, false), true);
        drain(&mut events);

        // A missing file leaves the draft untouched, with no status event.
        let missing = dir.path().join("missing.waypoints");
        assert_eq!(manager.load(&missing).unwrap(), 0);
        assert_eq!(manager.count(), 1);
        assert!(drain(&mut events).is_empty());

        // An unwritable destination (a directory) is a no-op too.
        manager.save(dir.path());
        assert_eq!(manager.count(), 1);
        assert!(drain(&mut events).is_empty());
    }

    #[test]
    fn load_reports_partial_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mission.waypoints");
        std::fs::write(
            &path,
            "QGC WPL 110\r\n0\t0\t3\t16\t0\t0\t0\t0\t47.1\t8.1\t10\t1\r\nbroken\r\n",
        )
        .unwrap();

        let (mut manager, mut events) = offline();
        assert_eq!(manager.load(&path).unwrap(), 1);
        assert!(drain(&mut events).iter().any(|event| matches!(
            event,
            ManagerEvent::Status(message) if message.contains("partly successful")
        )));

        std::fs::write(&path, "NOT A MISSION\r\n").unwrap();
        assert!(matches!(
            manager.load(&path),
            Err(ManagerError::FileFormat(_))
        ));
        assert_eq!(manager.count(), 0);
    }

    #[test]
    fn distance_signal_tracks_local_current_item() {
        let (mut manager, mut events) = offline();
        let mut target = waypoint(0, false);
        target.frame = MissionFrame::LocalNed;
        target.x = 3.0;
        target.y = 4.0;
        target.z = 0.0;
        manager.add_editable(target, true);
        drain(&mut events);

        manager.handle_local_position(0.0, 0.0, 0.0);
        assert_eq!(
            drain(&mut events),
            vec![ManagerEvent::DistanceToCurrentChanged(5.0)]
        );
    }
}
