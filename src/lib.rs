pub use mavlink;

pub mod client;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod events;
pub mod manager;
pub mod mission;

mod command;
mod live;
mod settings;

pub use client::WaypointClient;
pub use config::ManagerConfig;
pub use error::ManagerError;
pub use event_loop::{connect, LinkChannels};
pub use events::ManagerEvent;
pub use manager::{
    AutopilotKind, LogOfflineNotice, OfflineNotice, VehicleTarget, WaypointManager,
};

pub use mission::{
    format_mission, parse_mission, DualList, ItemEncoding, MissionFrame, MissionItem, MissionList,
    ParsedMission, RetryPolicy, SenderId, TransferMachine, TransferState, WireCommand, WireEvent,
    NAV_CMD_BOUNDARY, NAV_WAYPOINT,
};
