#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("a transfer is already in progress")]
    TransferBusy,
    #[error("no vehicle link; offline editing only")]
    Offline,
    #[error("waypoint {0} out of range")]
    OutOfRange(u16),
    #[error("guided mode not supported by this autopilot")]
    GuidedUnsupported,
    #[error("unsupported MAV_CMD value {0}")]
    UnsupportedCommand(u16),
    #[error("waypoint file is corrupt: {0}")]
    FileFormat(String),
    #[error("manager task stopped")]
    Disconnected,
}
