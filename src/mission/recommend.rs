//! Defaults for newly created editable items, derived from the tail of the
//! draft and the stored user defaults.

use super::item::{MissionFrame, MissionItem};

/// Frame for the next item. Established missions inherit from the last item;
/// short ones get the relative frame. Offline, the very first item is the
/// absolute-altitude home position.
pub(crate) fn frame(editable: &[MissionItem], online: bool) -> MissionFrame {
    if !online && editable.is_empty() {
        return MissionFrame::Global;
    }
    match editable {
        [] | [_] => MissionFrame::GlobalRelativeAlt,
        [.., last] => last.frame,
    }
}

/// Altitude for the next item, in the semantics of `frame`.
pub(crate) fn altitude(
    editable: &[MissionItem],
    frame: MissionFrame,
    default_rel_altitude: f64,
) -> f32 {
    match editable {
        [] => 0.0,
        [only] => {
            if frame == MissionFrame::Global {
                // First waypoint above an absolute-altitude home.
                only.z + default_rel_altitude as f32
            } else {
                default_rel_altitude as f32
            }
        }
        [.., last] => last.z,
    }
}

/// Acceptance radius for the next item.
pub(crate) fn acceptance_radius(editable: &[MissionItem], default_radius: f64) -> f64 {
    editable
        .last()
        .map(MissionItem::acceptance_radius)
        .unwrap_or(default_radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(frame: MissionFrame, z: f32) -> MissionItem {
        MissionItem {
            frame,
            z,
            ..MissionItem::default()
        }
    }

    #[test]
    fn offline_first_item_is_absolute_home() {
        assert_eq!(frame(&[], false), MissionFrame::Global);
        assert_eq!(frame(&[], true), MissionFrame::GlobalRelativeAlt);
    }

    #[test]
    fn second_item_is_relative_then_inherit() {
        let home = item(MissionFrame::Global, 488.0);
        assert_eq!(frame(&[home.clone()], false), MissionFrame::GlobalRelativeAlt);
        assert_eq!(frame(&[home.clone()], true), MissionFrame::GlobalRelativeAlt);

        let tail = item(MissionFrame::LocalNed, -2.0);
        assert_eq!(frame(&[home.clone(), tail.clone()], false), MissionFrame::LocalNed);
        assert_eq!(frame(&[home, tail], true), MissionFrame::LocalNed);
    }

    #[test]
    fn altitude_over_absolute_home_adds_default() {
        let home = item(MissionFrame::Global, 488.0);
        assert_eq!(altitude(&[home], MissionFrame::Global, 20.0), 508.0);
        assert_eq!(altitude(&[], MissionFrame::Global, 20.0), 0.0);
    }

    #[test]
    fn relative_altitude_defaults_then_inherits() {
        let home = item(MissionFrame::Global, 488.0);
        assert_eq!(altitude(&[home.clone()], MissionFrame::GlobalRelativeAlt, 20.0), 20.0);
        let second = item(MissionFrame::GlobalRelativeAlt, 35.0);
        assert_eq!(
            altitude(&[home, second], MissionFrame::GlobalRelativeAlt, 20.0),
            35.0
        );
        assert_eq!(altitude(&[], MissionFrame::GlobalRelativeAlt, 20.0), 0.0);
    }

    #[test]
    fn radius_inherits_from_last_item() {
        assert_eq!(acceptance_radius(&[], 5.0), 5.0);
        let mut last = item(MissionFrame::GlobalRelativeAlt, 10.0);
        last.set_acceptance_radius(12.0);
        assert_eq!(acceptance_radius(&[last], 5.0), 12.0);
    }
}
