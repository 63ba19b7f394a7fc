use tokio::sync::mpsc;

/// Unified event stream for everything the manager reports to observers.
///
/// UI layers receive all manager activity through a single channel: status
/// strings, list-change notifications, and live mission-execution signals.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
    /// Human-readable protocol status line.
    Status(String),
    /// The editable draft changed (add, remove, move, clear, load, mirror).
    EditableListChanged,
    /// The view-only snapshot changed (download progress or completion).
    ViewOnlyListChanged,
    /// The vehicle reported a new current waypoint sequence.
    CurrentWaypointChanged(u16),
    /// The vehicle reported reaching a waypoint.
    WaypointReached(u16),
    /// Distance from the vehicle to the current editable waypoint, metres.
    DistanceToCurrentChanged(f64),
}

/// Writer side of the event stream. Sends never block; a dropped receiver
/// silently discards events.
#[derive(Debug, Clone)]
pub(crate) struct SignalSink {
    tx: mpsc::UnboundedSender<ManagerEvent>,
}

impl SignalSink {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<ManagerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub(crate) fn emit(&self, event: ManagerEvent) {
        let _ = self.tx.send(event);
    }

    pub(crate) fn status(&self, message: impl Into<String>) {
        self.emit(ManagerEvent::Status(message.into()));
    }
}
