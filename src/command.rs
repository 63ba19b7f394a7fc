use std::path::PathBuf;

use tokio::sync::oneshot;

use crate::error::ManagerError;
use crate::mission::item::MissionItem;

pub(crate) enum Command {
    ReadFromVehicle {
        read_to_edit: bool,
        reply: oneshot::Sender<Result<(), ManagerError>>,
    },
    WriteToVehicle {
        reply: oneshot::Sender<Result<(), ManagerError>>,
    },
    ClearOnVehicle {
        reply: oneshot::Sender<Result<(), ManagerError>>,
    },
    SetCurrentOnVehicle {
        seq: u16,
        reply: oneshot::Sender<Result<(), ManagerError>>,
    },
    Goto {
        item: MissionItem,
        reply: oneshot::Sender<Result<(), ManagerError>>,
    },
    CreateItem {
        enforce_first_active: bool,
        reply: oneshot::Sender<MissionItem>,
    },
    AddEditable {
        item: MissionItem,
        enforce_first_active: bool,
        reply: oneshot::Sender<u16>,
    },
    Remove {
        seq: u16,
        reply: oneshot::Sender<Result<(), ManagerError>>,
    },
    MoveItem {
        from: u16,
        to: u16,
        reply: oneshot::Sender<Result<(), ManagerError>>,
    },
    ClearEditable {
        reply: oneshot::Sender<()>,
    },
    SetCurrentEditable {
        seq: u16,
        reply: oneshot::Sender<Result<(), ManagerError>>,
    },
    Save {
        path: PathBuf,
        reply: oneshot::Sender<()>,
    },
    Load {
        path: PathBuf,
        reply: oneshot::Sender<Result<usize, ManagerError>>,
    },
    SetDefaultRelAltitude {
        altitude: f64,
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}
