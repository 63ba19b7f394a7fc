use super::item::{MissionFrame, MissionItem};

/// An owning, ordered waypoint container.
///
/// Sequence numbers are list positions: after every mutation, `seq == index`
/// holds for all items. At most one item carries the `current` flag.
#[derive(Debug, Default, Clone)]
pub struct MissionList {
    items: Vec<MissionItem>,
}

impl MissionList {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, seq: u16) -> Option<&MissionItem> {
        self.items.get(seq as usize)
    }

    pub fn items(&self) -> &[MissionItem] {
        &self.items
    }

    pub fn last(&self) -> Option<&MissionItem> {
        self.items.last()
    }

    /// Sequence of the item flagged current, if any.
    pub fn current_seq(&self) -> Option<u16> {
        self.items.iter().find(|item| item.current).map(|item| item.seq)
    }

    /// Append, stamping the new item's sequence. Returns the stamped value.
    pub(crate) fn push(&mut self, mut item: MissionItem) -> u16 {
        let seq = self.items.len() as u16;
        item.seq = seq;
        self.items.push(item);
        seq
    }

    /// Remove by sequence. If the removed item was current, the flag is
    /// promoted to its successor, else its predecessor, else dropped.
    pub(crate) fn remove(&mut self, seq: u16) -> Option<MissionItem> {
        let index = seq as usize;
        if index >= self.items.len() {
            return None;
        }
        let removed = self.items.remove(index);
        if removed.current {
            if index < self.items.len() {
                self.items[index].current = true;
            } else if index > 0 {
                self.items[index - 1].current = true;
            }
        }
        self.restamp(index);
        Some(removed)
    }

    /// Reorder an item, keeping its `current` flag with it.
    pub(crate) fn move_item(&mut self, from: u16, to: u16) -> bool {
        let (from, to) = (from as usize, to as usize);
        if from == to || from >= self.items.len() || to >= self.items.len() {
            return false;
        }
        let item = self.items.remove(from);
        self.items.insert(to, item);
        self.restamp(from.min(to));
        true
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }

    /// Make exactly one item current. Fails when `seq` is out of range.
    pub(crate) fn set_current(&mut self, seq: u16) -> bool {
        if seq as usize >= self.items.len() {
            return false;
        }
        self.mark_current(seq);
        true
    }

    /// Flag the item whose sequence equals `seq`; every other item loses the
    /// flag. A sequence with no match leaves no current item.
    pub(crate) fn mark_current(&mut self, seq: u16) {
        for item in &mut self.items {
            item.current = item.seq == seq;
        }
    }

    /// Replace the whole list, re-stamping sequences. Only the first
    /// incoming `current` flag survives.
    pub(crate) fn replace(&mut self, items: Vec<MissionItem>) {
        self.items = items;
        let mut have_current = false;
        for (index, item) in self.items.iter_mut().enumerate() {
            item.seq = index as u16;
            if item.current {
                if have_current {
                    item.current = false;
                } else {
                    have_current = true;
                }
            }
        }
    }

    fn restamp(&mut self, from: usize) {
        for index in from..self.items.len() {
            self.items[index].seq = index as u16;
        }
    }
}

// ---------------------------------------------------------------------------
// Filtered views
// ---------------------------------------------------------------------------
// Free functions over slices so the async client can apply them to watch
// snapshots as well.

pub fn global_frame_items(items: &[MissionItem]) -> Vec<&MissionItem> {
    items.iter().filter(|item| item.frame.is_global()).collect()
}

pub fn navigation_items(items: &[MissionItem]) -> Vec<&MissionItem> {
    items.iter().filter(|item| item.is_navigation()).collect()
}

pub fn global_navigation_items(items: &[MissionItem]) -> Vec<&MissionItem> {
    items
        .iter()
        .filter(|item| item.frame.is_global() && item.is_navigation())
        .collect()
}

pub fn local_frame_items(items: &[MissionItem]) -> Vec<&MissionItem> {
    items.iter().filter(|item| item.frame.is_local()).collect()
}

/// Position of the item with sequence `seq` within the filtered view, or
/// `None` when the item is absent or filtered out.
fn filtered_index_of(
    items: &[MissionItem],
    seq: u16,
    keep: impl Fn(&MissionItem) -> bool,
) -> Option<usize> {
    items
        .iter()
        .filter(|item| keep(item))
        .position(|item| item.seq == seq)
}

pub fn global_frame_index_of(items: &[MissionItem], seq: u16) -> Option<usize> {
    filtered_index_of(items, seq, |item| item.frame.is_global())
}

pub fn navigation_index_of(items: &[MissionItem], seq: u16) -> Option<usize> {
    filtered_index_of(items, seq, MissionItem::is_navigation)
}

pub fn global_navigation_index_of(items: &[MissionItem], seq: u16) -> Option<usize> {
    filtered_index_of(items, seq, |item| {
        item.frame.is_global() && item.is_navigation()
    })
}

pub fn local_frame_index_of(items: &[MissionItem], seq: u16) -> Option<usize> {
    filtered_index_of(items, seq, |item| item.frame.is_local())
}

// ---------------------------------------------------------------------------
// Dual list
// ---------------------------------------------------------------------------

/// The editable draft paired with the view-only snapshot of the vehicle's
/// mission.
///
/// The "current editable" back-reference is an index, never a pointer; it is
/// invalidated when its item is removed or the draft cleared, and shifted
/// when other items move around it.
#[derive(Debug, Default)]
pub struct DualList {
    editable: MissionList,
    view_only: MissionList,
    current_editable: Option<u16>,
}

impl DualList {
    pub fn editable(&self) -> &MissionList {
        &self.editable
    }

    pub fn view_only(&self) -> &MissionList {
        &self.view_only
    }

    pub fn current_editable(&self) -> Option<&MissionItem> {
        self.current_editable.and_then(|seq| self.editable.get(seq))
    }

    pub fn current_editable_seq(&self) -> Option<u16> {
        self.current_editable
    }

    pub(crate) fn add_editable(&mut self, item: MissionItem, enforce_first_active: bool) -> u16 {
        let first = self.editable.is_empty();
        let seq = self.editable.push(item);
        if enforce_first_active && first {
            self.editable.mark_current(seq);
            self.current_editable = Some(seq);
        }
        seq
    }

    /// Append an item mirrored from a download, keeping its `current` flag
    /// so the back-reference ends up on the vehicle's current item.
    pub(crate) fn push_downloaded_editable(&mut self, item: MissionItem) -> u16 {
        let current = item.current;
        let seq = self.editable.push(item);
        if current {
            self.current_editable = Some(seq);
        }
        seq
    }

    pub(crate) fn remove_editable(&mut self, seq: u16) -> bool {
        if self.editable.remove(seq).is_none() {
            return false;
        }
        self.current_editable = match self.current_editable {
            Some(current) if current == seq => None,
            Some(current) if current > seq => Some(current - 1),
            other => other,
        };
        true
    }

    pub(crate) fn move_editable(&mut self, from: u16, to: u16) -> bool {
        if !self.editable.move_item(from, to) {
            return false;
        }
        self.current_editable = self
            .current_editable
            .map(|current| shifted_index(current, from, to));
        true
    }

    pub(crate) fn clear_editable(&mut self) {
        self.editable.clear();
        self.current_editable = None;
    }

    pub(crate) fn set_current_editable(&mut self, seq: u16) -> bool {
        if !self.editable.set_current(seq) {
            return false;
        }
        self.current_editable = Some(seq);
        true
    }

    pub(crate) fn replace_editable(&mut self, items: Vec<MissionItem>) {
        self.editable.replace(items);
        self.current_editable = self.editable.current_seq();
    }

    pub(crate) fn clear_view_only(&mut self) {
        self.view_only.clear();
    }

    pub(crate) fn push_view_only(&mut self, item: MissionItem) {
        self.view_only.push(item);
    }

    /// Apply a vehicle-confirmed current sequence to the view-only list:
    /// exactly the matching item becomes current, or none at all.
    pub(crate) fn confirm_view_only_current(&mut self, seq: u16) {
        self.view_only.mark_current(seq);
    }
}

/// Where an index lands after the item at `from` moved to `to`.
fn shifted_index(index: u16, from: u16, to: u16) -> u16 {
    if index == from {
        to
    } else if from < index && index <= to {
        index - 1
    } else if to <= index && index < from {
        index + 1
    } else {
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waypoint(frame: MissionFrame, command: u16) -> MissionItem {
        MissionItem {
            frame,
            command,
            ..MissionItem::default()
        }
    }

    fn list_of(count: usize) -> MissionList {
        let mut list = MissionList::default();
        for _ in 0..count {
            list.push(MissionItem::default());
        }
        list
    }

    fn assert_contiguous(list: &MissionList) {
        for (index, item) in list.items().iter().enumerate() {
            assert_eq!(item.seq, index as u16);
        }
    }

    #[test]
    fn push_stamps_sequences() {
        let list = list_of(3);
        assert_contiguous(&list);
    }

    #[test]
    fn remove_restamps_suffix() {
        let mut list = list_of(4);
        assert!(list.remove(1).is_some());
        assert_eq!(list.len(), 3);
        assert_contiguous(&list);
        assert!(list.remove(9).is_none());
    }

    #[test]
    fn removing_current_promotes_successor_then_predecessor() {
        let mut list = list_of(3);
        list.set_current(1);
        list.remove(1);
        assert_eq!(list.current_seq(), Some(1)); // old seq 2, now at index 1

        let mut list = list_of(2);
        list.set_current(1);
        list.remove(1);
        assert_eq!(list.current_seq(), Some(0));

        let mut list = list_of(1);
        list.set_current(0);
        list.remove(0);
        assert_eq!(list.current_seq(), None);
    }

    #[test]
    fn move_preserves_current_flag_and_restamps() {
        let mut list = list_of(4);
        list.set_current(1);
        assert!(list.move_item(1, 3));
        assert_contiguous(&list);
        assert_eq!(list.current_seq(), Some(3));

        assert!(list.move_item(3, 0));
        assert_eq!(list.current_seq(), Some(0));
        assert!(!list.move_item(2, 2));
        assert!(!list.move_item(0, 7));
    }

    #[test]
    fn at_most_one_current() {
        let mut list = list_of(3);
        list.set_current(0);
        list.set_current(2);
        let flagged = list.items().iter().filter(|item| item.current).count();
        assert_eq!(flagged, 1);
        assert_eq!(list.current_seq(), Some(2));
    }

    #[test]
    fn replace_keeps_first_current_only() {
        let mut list = MissionList::default();
        let mut a = MissionItem::default();
        a.current = true;
        let mut b = MissionItem::default();
        b.current = true;
        list.replace(vec![a, b]);
        assert_eq!(list.current_seq(), Some(0));
        assert_contiguous(&list);
    }

    #[test]
    fn filtered_views_and_indices() {
        let mut list = MissionList::default();
        list.push(waypoint(MissionFrame::Global, 16));
        list.push(waypoint(MissionFrame::LocalNed, 16));
        list.push(waypoint(MissionFrame::GlobalRelativeAlt, 203));
        list.push(waypoint(MissionFrame::GlobalRelativeAlt, 16));

        let items = list.items();
        assert_eq!(global_frame_items(items).len(), 3);
        assert_eq!(navigation_items(items).len(), 3);
        assert_eq!(global_navigation_items(items).len(), 2);
        assert_eq!(local_frame_items(items).len(), 1);

        assert_eq!(global_frame_index_of(items, 3), Some(2));
        assert_eq!(global_navigation_index_of(items, 3), Some(1));
        assert_eq!(local_frame_index_of(items, 1), Some(0));
        assert_eq!(local_frame_index_of(items, 0), None);
        assert_eq!(navigation_index_of(items, 2), None);
    }

    #[test]
    fn dual_list_pointer_follows_edits() {
        let mut lists = DualList::default();
        lists.add_editable(MissionItem::default(), true);
        lists.add_editable(MissionItem::default(), true);
        assert_eq!(lists.current_editable_seq(), Some(0));

        assert!(lists.set_current_editable(1));
        assert_eq!(lists.current_editable_seq(), Some(1));

        // Removing an earlier item shifts the reference down.
        lists.add_editable(MissionItem::default(), false);
        assert!(lists.remove_editable(0));
        assert_eq!(lists.current_editable_seq(), Some(0));

        // Removing the referenced item invalidates it, even though the flag
        // is promoted.
        assert!(lists.remove_editable(0));
        assert_eq!(lists.current_editable_seq(), None);
        assert_eq!(lists.editable().current_seq(), Some(0));
    }

    #[test]
    fn dual_list_pointer_follows_moves() {
        let mut lists = DualList::default();
        for _ in 0..4 {
            lists.add_editable(MissionItem::default(), false);
        }
        assert!(lists.set_current_editable(1));

        lists.move_editable(1, 3);
        assert_eq!(lists.current_editable_seq(), Some(3));
        lists.move_editable(0, 3);
        assert_eq!(lists.current_editable_seq(), Some(2));
        assert_eq!(lists.editable().current_seq(), Some(2));
    }

    #[test]
    fn clear_invalidates_pointer() {
        let mut lists = DualList::default();
        lists.add_editable(MissionItem::default(), true);
        lists.clear_editable();
        assert_eq!(lists.current_editable_seq(), None);
        assert!(lists.editable().is_empty());
    }

    #[test]
    fn confirm_view_only_current_is_exclusive() {
        let mut lists = DualList::default();
        for _ in 0..3 {
            lists.push_view_only(MissionItem::default());
        }
        lists.confirm_view_only_current(2);
        assert_eq!(lists.view_only().current_seq(), Some(2));
        lists.confirm_view_only_current(9);
        assert_eq!(lists.view_only().current_seq(), None);
    }
}
