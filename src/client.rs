//! Cloneable async handle to a manager running on its own event loop.

use std::path::Path;
use std::sync::Arc;

use mavlink::common::MavMessage;
use mavlink::MavHeader;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::command::Command;
use crate::config::ManagerConfig;
use crate::error::ManagerError;
use crate::event_loop::{run_event_loop, LinkChannels, ListWatches};
use crate::events::ManagerEvent;
use crate::manager::{VehicleTarget, WaypointManager};
use crate::mission::item::MissionItem;
use crate::mission::list;

/// Async handle to a waypoint manager.
///
/// `WaypointClient` is `Clone + Send + Sync`; clones share the same event
/// loop. When the last clone is dropped, the loop is cancelled.
#[derive(Clone)]
pub struct WaypointClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    command_tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
    editable: watch::Receiver<Vec<MissionItem>>,
    view_only: watch::Receiver<Vec<MissionItem>>,
    // Keeps an offline manager's inbound channel open.
    _offline_inbound: Option<mpsc::Sender<(MavHeader, MavMessage)>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl WaypointClient {
    /// Spawn the event loop over an established link to `target`.
    pub fn spawn(
        config: ManagerConfig,
        target: VehicleTarget,
        link: LinkChannels,
    ) -> (Self, mpsc::UnboundedReceiver<ManagerEvent>) {
        Self::spawn_inner(config, Some(target), link, None)
    }

    /// Spawn an offline manager: no transfers, full editing and persistence.
    pub fn spawn_offline(config: ManagerConfig) -> (Self, mpsc::UnboundedReceiver<ManagerEvent>) {
        let (out_tx, mut out_rx) = mpsc::channel(1);
        let (in_tx, in_rx) = mpsc::channel(1);
        // An offline manager queues nothing, but the channel still needs a
        // live receiver.
        tokio::spawn(async move { while out_rx.recv().await.is_some() {} });
        let link = LinkChannels {
            outbound: out_tx,
            inbound: in_rx,
        };
        Self::spawn_inner(config, None, link, Some(in_tx))
    }

    fn spawn_inner(
        config: ManagerConfig,
        target: Option<VehicleTarget>,
        link: LinkChannels,
        offline_inbound: Option<mpsc::Sender<(MavHeader, MavMessage)>>,
    ) -> (Self, mpsc::UnboundedReceiver<ManagerEvent>) {
        let (manager, events) = WaypointManager::new(config, target);
        let (command_tx, command_rx) = mpsc::channel(32);
        let (editable_tx, editable_rx) = watch::channel(Vec::new());
        let (view_tx, view_rx) = watch::channel(Vec::new());
        let cancel = CancellationToken::new();

        tokio::spawn(run_event_loop(
            manager,
            link,
            command_rx,
            ListWatches {
                editable: editable_tx,
                view_only: view_tx,
            },
            cancel.clone(),
        ));

        let client = Self {
            inner: Arc::new(ClientInner {
                command_tx,
                cancel,
                editable: editable_rx,
                view_only: view_rx,
                _offline_inbound: offline_inbound,
            }),
        };
        (client, events)
    }

    // -----------------------------------------------------------------------
    // Transfers
    // -----------------------------------------------------------------------

    pub async fn read_from_vehicle(&self, read_to_edit: bool) -> Result<(), ManagerError> {
        self.send(|reply| Command::ReadFromVehicle {
            read_to_edit,
            reply,
        })
        .await?
    }

    pub async fn write_to_vehicle(&self) -> Result<(), ManagerError> {
        self.send(|reply| Command::WriteToVehicle { reply }).await?
    }

    pub async fn clear_on_vehicle(&self) -> Result<(), ManagerError> {
        self.send(|reply| Command::ClearOnVehicle { reply }).await?
    }

    pub async fn set_current_on_vehicle(&self, seq: u16) -> Result<(), ManagerError> {
        self.send(|reply| Command::SetCurrentOnVehicle { seq, reply })
            .await?
    }

    pub async fn goto(&self, item: MissionItem) -> Result<(), ManagerError> {
        self.send(|reply| Command::Goto { item, reply }).await?
    }

    // -----------------------------------------------------------------------
    // Local editing
    // -----------------------------------------------------------------------

    pub async fn create_item(&self, enforce_first_active: bool) -> Result<MissionItem, ManagerError> {
        self.send(|reply| Command::CreateItem {
            enforce_first_active,
            reply,
        })
        .await
    }

    pub async fn add_editable(
        &self,
        item: MissionItem,
        enforce_first_active: bool,
    ) -> Result<u16, ManagerError> {
        self.send(|reply| Command::AddEditable {
            item,
            enforce_first_active,
            reply,
        })
        .await
    }

    pub async fn remove(&self, seq: u16) -> Result<(), ManagerError> {
        self.send(|reply| Command::Remove { seq, reply }).await?
    }

    pub async fn move_item(&self, from: u16, to: u16) -> Result<(), ManagerError> {
        self.send(|reply| Command::MoveItem { from, to, reply })
            .await?
    }

    pub async fn clear_editable(&self) -> Result<(), ManagerError> {
        self.send(|reply| Command::ClearEditable { reply }).await
    }

    pub async fn set_current_editable(&self, seq: u16) -> Result<(), ManagerError> {
        self.send(|reply| Command::SetCurrentEditable { seq, reply })
            .await?
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), ManagerError> {
        let path = path.as_ref().to_path_buf();
        self.send(|reply| Command::Save { path, reply }).await
    }

    pub async fn load(&self, path: impl AsRef<Path>) -> Result<usize, ManagerError> {
        let path = path.as_ref().to_path_buf();
        self.send(|reply| Command::Load { path, reply }).await?
    }

    pub async fn set_default_rel_altitude(&self, altitude: f64) -> Result<(), ManagerError> {
        self.send(|reply| Command::SetDefaultRelAltitude { altitude, reply })
            .await
    }

    // -----------------------------------------------------------------------
    // Queries (watch snapshots)
    // -----------------------------------------------------------------------

    pub fn editable(&self) -> Vec<MissionItem> {
        self.inner.editable.borrow().clone()
    }

    pub fn view_only(&self) -> Vec<MissionItem> {
        self.inner.view_only.borrow().clone()
    }

    pub fn count(&self) -> usize {
        self.inner.editable.borrow().len()
    }

    pub fn get(&self, seq: u16) -> Option<MissionItem> {
        self.inner.editable.borrow().get(seq as usize).cloned()
    }

    /// Subscribe to editable-list snapshots.
    pub fn editable_watch(&self) -> watch::Receiver<Vec<MissionItem>> {
        self.inner.editable.clone()
    }

    /// Subscribe to view-only-list snapshots.
    pub fn view_only_watch(&self) -> watch::Receiver<Vec<MissionItem>> {
        self.inner.view_only.clone()
    }

    pub fn global_frame_items(&self) -> Vec<MissionItem> {
        cloned(list::global_frame_items(&self.inner.editable.borrow()))
    }

    pub fn navigation_items(&self) -> Vec<MissionItem> {
        cloned(list::navigation_items(&self.inner.editable.borrow()))
    }

    pub fn global_navigation_items(&self) -> Vec<MissionItem> {
        cloned(list::global_navigation_items(&self.inner.editable.borrow()))
    }

    pub fn local_frame_items(&self) -> Vec<MissionItem> {
        cloned(list::local_frame_items(&self.inner.editable.borrow()))
    }

    pub fn global_frame_index_of(&self, seq: u16) -> Option<usize> {
        list::global_frame_index_of(&self.inner.editable.borrow(), seq)
    }

    pub fn navigation_index_of(&self, seq: u16) -> Option<usize> {
        list::navigation_index_of(&self.inner.editable.borrow(), seq)
    }

    pub fn global_navigation_index_of(&self, seq: u16) -> Option<usize> {
        list::global_navigation_index_of(&self.inner.editable.borrow(), seq)
    }

    pub fn local_frame_index_of(&self, seq: u16) -> Option<usize> {
        list::local_frame_index_of(&self.inner.editable.borrow(), seq)
    }

    /// Gracefully stop the event loop.
    pub async fn shutdown(self) {
        let _ = self.inner.command_tx.send(Command::Shutdown).await;
    }

    // -----------------------------------------------------------------------

    async fn send<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ManagerError> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(make(tx))
            .await
            .map_err(|_| ManagerError::Disconnected)?;
        rx.await.map_err(|_| ManagerError::Disconnected)
    }
}

fn cloned(items: Vec<&MissionItem>) -> Vec<MissionItem> {
    items.into_iter().cloned().collect()
}
