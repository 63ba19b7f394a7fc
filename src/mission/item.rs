use serde::{Deserialize, Serialize};

/// MAV_CMD code of NAV_WAYPOINT, the default action for new items.
pub const NAV_WAYPOINT: u16 = 16;

/// Commands below this boundary (MAV_CMD_NAV_LAST) are navigation commands,
/// i.e. their semantic is a position target.
pub const NAV_CMD_BOUNDARY: u16 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionFrame {
    Global,
    LocalNed,
    Mission,
    GlobalRelativeAlt,
    LocalEnu,
    GlobalTerrainAlt,
    Other,
}

impl MissionFrame {
    pub fn is_global(self) -> bool {
        matches!(
            self,
            MissionFrame::Global | MissionFrame::GlobalRelativeAlt | MissionFrame::GlobalTerrainAlt
        )
    }

    pub fn is_local(self) -> bool {
        matches!(self, MissionFrame::LocalNed | MissionFrame::LocalEnu)
    }

    /// Numeric MAV_FRAME code, as used by the `QGC WPL` text format.
    pub fn code(self) -> u8 {
        match self {
            MissionFrame::Global => 0,
            MissionFrame::LocalNed => 1,
            MissionFrame::Mission => 2,
            MissionFrame::GlobalRelativeAlt => 3,
            MissionFrame::LocalEnu => 4,
            MissionFrame::GlobalTerrainAlt => 10,
            MissionFrame::Other => 2,
        }
    }

    /// Decode a MAV_FRAME code. The `_INT` variants collapse onto their
    /// float-form counterparts.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 | 5 => Some(MissionFrame::Global),
            1 => Some(MissionFrame::LocalNed),
            2 => Some(MissionFrame::Mission),
            3 | 6 => Some(MissionFrame::GlobalRelativeAlt),
            4 => Some(MissionFrame::LocalEnu),
            10 | 11 => Some(MissionFrame::GlobalTerrainAlt),
            _ => None,
        }
    }
}

/// One entry in the ordered mission program.
///
/// `x` and `y` are kept in natural units: decimal degrees for global frames,
/// metres for local frames. The wire layer owns the fixed-point conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionItem {
    pub seq: u16,
    pub frame: MissionFrame,
    pub command: u16,
    pub current: bool,
    pub autocontinue: bool,
    pub param1: f32,
    pub param2: f32,
    pub param3: f32,
    pub param4: f32,
    pub x: f64,
    pub y: f64,
    pub z: f32,
}

impl Default for MissionItem {
    fn default() -> Self {
        Self {
            seq: 0,
            frame: MissionFrame::GlobalRelativeAlt,
            command: NAV_WAYPOINT,
            current: false,
            autocontinue: true,
            param1: 0.0,
            param2: 0.0,
            param3: 0.0,
            param4: 0.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }
}

impl MissionItem {
    pub fn is_navigation(&self) -> bool {
        self.command < NAV_CMD_BOUNDARY
    }

    /// Acceptance radius in metres. Navigation commands carry it in param2;
    /// other commands have none.
    pub fn acceptance_radius(&self) -> f64 {
        if self.is_navigation() {
            self.param2 as f64
        } else {
            0.0
        }
    }

    pub fn set_acceptance_radius(&mut self, radius: f64) {
        if self.is_navigation() {
            self.param2 = radius as f32;
        }
    }
}
