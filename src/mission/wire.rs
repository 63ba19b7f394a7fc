//! The narrow boundary between domain mission items and decoded MAVLink
//! messages.
//!
//! Global-frame coordinates travel as 1e7 fixed-point integers on the int
//! wire form and as plain degrees on the float form; local-frame coordinates
//! pass through unscaled in both directions. `z` is a float in both forms.

use mavlink::common::{self, MavMissionResult, MavMissionType};
use mavlink::MavHeader;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use super::item::{MissionFrame, MissionItem};
use crate::error::ManagerError;

/// Fixed-point scale for global-frame latitude/longitude on the wire.
const COORD_SCALE: f64 = 1e7;

/// MAV_COMP_ID_AUTOPILOT1; accepted as a fallback sender component for ACKs.
pub(crate) const COMP_ID_AUTOPILOT: u8 = 1;

/// Identity of a message sender, from the MAVLink header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderId {
    pub system_id: u8,
    pub component_id: u8,
}

/// Which wire form an item or item-request arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemEncoding {
    Int,
    Float,
}

/// Outbound protocol messages the manager emits.
#[derive(Debug, Clone, PartialEq)]
pub enum WireCommand {
    RequestList,
    Request { seq: u16 },
    RequestInt { seq: u16 },
    Count { count: u16 },
    ItemInt(MissionItem),
    ItemFloat(MissionItem),
    Ack { kind: u8 },
    ClearAll,
    SetCurrent { seq: u16 },
    Goto(MissionItem),
}

/// Inbound protocol events, decoded from the codec.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    Count { count: u16 },
    Item { item: MissionItem, encoding: ItemEncoding },
    Request { seq: u16, encoding: ItemEncoding },
    Ack { kind: u8 },
    Current { seq: u16 },
    Reached { seq: u16 },
}

/// Natural coordinate to wire integer. Global frames scale to 1e7
/// fixed-point with round-to-nearest so the conversion is bijective on the
/// fixed-point grid; local frames are passed through.
pub(crate) fn scale_coord(value: f64, frame: MissionFrame) -> i32 {
    if frame.is_global() {
        (value * COORD_SCALE).round() as i32
    } else {
        value as i32
    }
}

/// Wire integer back to the natural coordinate.
pub(crate) fn unscale_coord(value: i32, frame: MissionFrame) -> f64 {
    if frame.is_global() {
        value as f64 / COORD_SCALE
    } else {
        value as f64
    }
}

fn to_mav_frame(frame: MissionFrame) -> common::MavFrame {
    match frame {
        MissionFrame::Global => common::MavFrame::MAV_FRAME_GLOBAL,
        MissionFrame::LocalNed => common::MavFrame::MAV_FRAME_LOCAL_NED,
        MissionFrame::Mission => common::MavFrame::MAV_FRAME_MISSION,
        MissionFrame::GlobalRelativeAlt => common::MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT,
        MissionFrame::LocalEnu => common::MavFrame::MAV_FRAME_LOCAL_ENU,
        MissionFrame::GlobalTerrainAlt => common::MavFrame::MAV_FRAME_GLOBAL_TERRAIN_ALT,
        MissionFrame::Other => common::MavFrame::MAV_FRAME_MISSION,
    }
}

#[allow(deprecated)]
fn from_mav_frame(frame: common::MavFrame) -> MissionFrame {
    match frame {
        common::MavFrame::MAV_FRAME_GLOBAL | common::MavFrame::MAV_FRAME_GLOBAL_INT => {
            MissionFrame::Global
        }
        common::MavFrame::MAV_FRAME_LOCAL_NED => MissionFrame::LocalNed,
        common::MavFrame::MAV_FRAME_MISSION => MissionFrame::Mission,
        common::MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT
        | common::MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT => MissionFrame::GlobalRelativeAlt,
        common::MavFrame::MAV_FRAME_LOCAL_ENU => MissionFrame::LocalEnu,
        common::MavFrame::MAV_FRAME_GLOBAL_TERRAIN_ALT
        | common::MavFrame::MAV_FRAME_GLOBAL_TERRAIN_ALT_INT => MissionFrame::GlobalTerrainAlt,
        _ => MissionFrame::Other,
    }
}

fn mav_cmd(command: u16) -> Result<common::MavCmd, ManagerError> {
    FromPrimitive::from_u16(command).ok_or(ManagerError::UnsupportedCommand(command))
}

fn item_int_data(
    item: &MissionItem,
    target_system: u8,
    target_component: u8,
) -> Result<common::MISSION_ITEM_INT_DATA, ManagerError> {
    Ok(common::MISSION_ITEM_INT_DATA {
        param1: item.param1,
        param2: item.param2,
        param3: item.param3,
        param4: item.param4,
        x: scale_coord(item.x, item.frame),
        y: scale_coord(item.y, item.frame),
        z: item.z,
        seq: item.seq,
        command: mav_cmd(item.command)?,
        target_system,
        target_component,
        frame: to_mav_frame(item.frame),
        current: u8::from(item.current),
        autocontinue: u8::from(item.autocontinue),
        mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
    })
}

#[allow(deprecated)]
fn item_float_data(
    item: &MissionItem,
    target_system: u8,
    target_component: u8,
) -> Result<common::MISSION_ITEM_DATA, ManagerError> {
    Ok(common::MISSION_ITEM_DATA {
        param1: item.param1,
        param2: item.param2,
        param3: item.param3,
        param4: item.param4,
        x: item.x as f32,
        y: item.y as f32,
        z: item.z,
        seq: item.seq,
        command: mav_cmd(item.command)?,
        target_system,
        target_component,
        frame: to_mav_frame(item.frame),
        current: u8::from(item.current),
        autocontinue: u8::from(item.autocontinue),
        mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
    })
}

pub(crate) fn item_from_int(data: &common::MISSION_ITEM_INT_DATA) -> MissionItem {
    let frame = from_mav_frame(data.frame);
    MissionItem {
        seq: data.seq,
        frame,
        command: data.command as u16,
        current: data.current > 0,
        autocontinue: data.autocontinue > 0,
        param1: data.param1,
        param2: data.param2,
        param3: data.param3,
        param4: data.param4,
        x: unscale_coord(data.x, frame),
        y: unscale_coord(data.y, frame),
        z: data.z,
    }
}

#[allow(deprecated)]
pub(crate) fn item_from_float(data: &common::MISSION_ITEM_DATA) -> MissionItem {
    MissionItem {
        seq: data.seq,
        frame: from_mav_frame(data.frame),
        command: data.command as u16,
        current: data.current > 0,
        autocontinue: data.autocontinue > 0,
        param1: data.param1,
        param2: data.param2,
        param3: data.param3,
        param4: data.param4,
        x: data.x as f64,
        y: data.y as f64,
        z: data.z,
    }
}

fn mission_result(kind: u8) -> MavMissionResult {
    if kind == 0 {
        MavMissionResult::MAV_MISSION_ACCEPTED
    } else {
        MavMissionResult::MAV_MISSION_ERROR
    }
}

fn ack_kind(result: MavMissionResult) -> u8 {
    u8::from(result != MavMissionResult::MAV_MISSION_ACCEPTED)
}

/// Encode an outbound command for the given vehicle target.
#[allow(deprecated)]
pub(crate) fn encode_command(
    command: &WireCommand,
    target_system: u8,
    target_component: u8,
) -> Result<common::MavMessage, ManagerError> {
    let message = match command {
        WireCommand::RequestList => {
            common::MavMessage::MISSION_REQUEST_LIST(common::MISSION_REQUEST_LIST_DATA {
                target_system,
                target_component,
                mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
            })
        }
        WireCommand::Request { seq } => {
            common::MavMessage::MISSION_REQUEST(common::MISSION_REQUEST_DATA {
                seq: *seq,
                target_system,
                target_component,
                mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
            })
        }
        WireCommand::RequestInt { seq } => {
            common::MavMessage::MISSION_REQUEST_INT(common::MISSION_REQUEST_INT_DATA {
                seq: *seq,
                target_system,
                target_component,
                mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
            })
        }
        WireCommand::Count { count } => {
            common::MavMessage::MISSION_COUNT(common::MISSION_COUNT_DATA {
                count: *count,
                target_system,
                target_component,
                mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
                opaque_id: 0,
            })
        }
        WireCommand::ItemInt(item) => {
            common::MavMessage::MISSION_ITEM_INT(item_int_data(item, target_system, target_component)?)
        }
        WireCommand::ItemFloat(item) => {
            common::MavMessage::MISSION_ITEM(item_float_data(item, target_system, target_component)?)
        }
        WireCommand::Ack { kind } => common::MavMessage::MISSION_ACK(common::MISSION_ACK_DATA {
            target_system,
            target_component,
            mavtype: mission_result(*kind),
            mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
            opaque_id: 0,
        }),
        WireCommand::ClearAll => {
            common::MavMessage::MISSION_CLEAR_ALL(common::MISSION_CLEAR_ALL_DATA {
                target_system,
                target_component,
                mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
            })
        }
        WireCommand::SetCurrent { seq } => {
            common::MavMessage::MISSION_SET_CURRENT(common::MISSION_SET_CURRENT_DATA {
                seq: *seq,
                target_system,
                target_component,
            })
        }
        WireCommand::Goto(item) => {
            // Guided-mode single shot: the magic current value 2, outside any
            // stored mission, hence seq 0 and no autocontinue.
            let mut data = item_int_data(item, target_system, target_component)?;
            data.seq = 0;
            data.current = 2;
            data.autocontinue = 0;
            common::MavMessage::MISSION_ITEM_INT(data)
        }
    };
    Ok(message)
}

/// Decode an inbound mission-protocol message. Returns `None` for message
/// kinds the mission manager does not consume.
#[allow(deprecated)]
pub(crate) fn decode_message(
    header: &MavHeader,
    message: &common::MavMessage,
) -> Option<(SenderId, WireEvent)> {
    let sender = SenderId {
        system_id: header.system_id,
        component_id: header.component_id,
    };
    let event = match message {
        common::MavMessage::MISSION_COUNT(data) => WireEvent::Count { count: data.count },
        common::MavMessage::MISSION_ITEM_INT(data) => WireEvent::Item {
            item: item_from_int(data),
            encoding: ItemEncoding::Int,
        },
        common::MavMessage::MISSION_ITEM(data) => WireEvent::Item {
            item: item_from_float(data),
            encoding: ItemEncoding::Float,
        },
        common::MavMessage::MISSION_REQUEST_INT(data) => WireEvent::Request {
            seq: data.seq,
            encoding: ItemEncoding::Int,
        },
        common::MavMessage::MISSION_REQUEST(data) => WireEvent::Request {
            seq: data.seq,
            encoding: ItemEncoding::Float,
        },
        common::MavMessage::MISSION_ACK(data) => WireEvent::Ack {
            kind: ack_kind(data.mavtype),
        },
        common::MavMessage::MISSION_CURRENT(data) => WireEvent::Current { seq: data.seq },
        common::MavMessage::MISSION_ITEM_REACHED(data) => WireEvent::Reached { seq: data.seq },
        _ => return None,
    };
    Some((sender, event))
}
