pub mod file;
pub mod item;
pub mod list;
pub(crate) mod recommend;
pub mod transfer;
pub mod wire;

pub use file::{format_mission, parse_mission, ParsedMission};
pub use item::{MissionFrame, MissionItem, NAV_CMD_BOUNDARY, NAV_WAYPOINT};
pub use list::{DualList, MissionList};
pub use transfer::{RetryPolicy, TransferMachine, TransferState};
pub use wire::{ItemEncoding, SenderId, WireCommand, WireEvent};
