use thiserror::Error;

/// Raw error code reported by a platform flash or partition primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("platform error 0x{code:x}")]
pub struct PlatformError {
    pub code: i32,
}

impl PlatformError {
    pub fn new(code: i32) -> Self {
        Self { code }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out")]
    Timeout,
    #[error("read failed: {0}")]
    Read(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PartitionError {
    #[error("no OTA boot partition, device is not OTA capable")]
    NotOtaCapable,
    #[error("no partition eligible for the update")]
    NoTarget,
}

/// Why an update check or attempt did not apply a new image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateError {
    #[error("no server url configured, update checking disabled")]
    ConfigDisabled,
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("partition unavailable: {0}")]
    PartitionUnavailable(#[from] PartitionError),
    #[error("failed to open flash session: {0}")]
    SessionBegin(PlatformError),
    #[error("flash write failed ({written} of {received} bytes written)")]
    FlashWrite { written: usize, received: usize },
    #[error("image rejected when closing flash session: {0}")]
    ImageRejected(PlatformError),
    #[error("failed to set boot partition: {0}")]
    Commit(PlatformError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    #[error("running version is {len} bytes, at most {max} fit")]
    VersionTooLong { len: usize, max: usize },
}

/// A stored configuration the updater cannot use. Update checks are turned
/// off instead of failing start-up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("firmware template {0:?} has no {{version}} placeholder")]
    InvalidTemplate(String),
}
