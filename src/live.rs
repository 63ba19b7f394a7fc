//! Live mission-execution signals derived from vehicle telemetry.

use crate::events::{ManagerEvent, SignalSink};
use crate::mission::item::MissionItem;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Default)]
pub(crate) struct LiveSignals {
    /// Last current-waypoint sequence reported to observers; duplicates from
    /// the vehicle's periodic CURRENT stream are suppressed.
    last_reported_current: Option<u16>,
}

impl LiveSignals {
    /// Local-frame position update: publish the 3D Euclidean distance to the
    /// current editable waypoint when it lives in a local frame.
    pub(crate) fn on_local_position(
        &self,
        current: Option<&MissionItem>,
        x: f64,
        y: f64,
        z: f64,
        signals: &SignalSink,
    ) {
        let Some(item) = current else { return };
        if !item.frame.is_local() {
            return;
        }
        let dx = x - item.x;
        let dy = y - item.y;
        let dz = z - item.z as f64;
        signals.emit(ManagerEvent::DistanceToCurrentChanged(
            (dx * dx + dy * dy + dz * dz).sqrt(),
        ));
    }

    /// Global position update: great-circle ground distance combined with
    /// the altitude difference. For relative-altitude frames the altitude
    /// term is approximate; good enough for a convenience display signal.
    pub(crate) fn on_global_position(
        &self,
        current: Option<&MissionItem>,
        latitude_deg: f64,
        longitude_deg: f64,
        altitude_m: f64,
        signals: &SignalSink,
    ) {
        let Some(item) = current else { return };
        if !item.frame.is_global() {
            return;
        }
        let ground = haversine_m(latitude_deg, longitude_deg, item.x, item.y);
        let dz = altitude_m - item.z as f64;
        signals.emit(ManagerEvent::DistanceToCurrentChanged(
            (ground * ground + dz * dz).sqrt(),
        ));
    }

    pub(crate) fn on_current(&mut self, seq: u16, signals: &SignalSink) {
        if self.last_reported_current != Some(seq) {
            self.last_reported_current = Some(seq);
            signals.emit(ManagerEvent::CurrentWaypointChanged(seq));
        }
    }

    pub(crate) fn on_reached(&self, seq: u16, signals: &SignalSink) {
        signals.emit(ManagerEvent::WaypointReached(seq));
        signals.status(format!("Reached waypoint {seq}"));
    }

    /// Forget the dedup state, e.g. after the mission on the vehicle was
    /// replaced.
    pub(crate) fn reset(&mut self) {
        self.last_reported_current = None;
    }
}

fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1) = (lat1.to_radians(), lon1.to_radians());
    let (lat2, lon2) = (lat2.to_radians(), lon2.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}
